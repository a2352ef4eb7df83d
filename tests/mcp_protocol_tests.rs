//! MCP Protocol Compliance Tests
//!
//! Drives the framework backend end-to-end against a mock ioBroker.

use iobroker_mcp::config::ServerConfig;
use iobroker_mcp::tools::ToolResultExt;
use iobroker_mcp::IoBrokerBackend;
use pretty_assertions::assert_eq;
use pulseengine_mcp_protocol::{CallToolRequestParam, PaginatedRequestParam};
use pulseengine_mcp_server::backend::McpBackend;
use rstest::*;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::{Duration, Instant};
use wiremock::matchers::{method, path};
use wiremock::{Mock, ResponseTemplate};

mod common;
use common::{fast_lifecycle, registry_for, MockIoBrokerServer};

fn backend_for(mock_server: &MockIoBrokerServer) -> IoBrokerBackend {
    IoBrokerBackend::new(registry_for(
        Arc::new(mock_server.client()),
        fast_lifecycle(50),
    ))
}

fn call(name: &str, arguments: Value) -> CallToolRequestParam {
    CallToolRequestParam {
        name: name.to_string(),
        arguments: Some(arguments),
    }
}

#[tokio::test]
async fn test_initialize_from_config_and_health_check() {
    let mock_server = MockIoBrokerServer::start().await;
    let config = ServerConfig {
        iobroker: mock_server.config(),
        ..ServerConfig::default()
    };

    let backend = IoBrokerBackend::initialize(config).await.unwrap();
    backend.health_check().await.unwrap();

    let info = backend.get_server_info();
    assert_eq!(info.server_info.name, "iobroker-mcp-server");
    assert!(info.capabilities.tools.is_some());
}

#[tokio::test]
async fn test_health_check_fails_without_rest_api() {
    let mock_server = MockIoBrokerServer::start_empty().await;
    mock_server
        .mock_error_response("GET", "/", 503, "starting")
        .await;
    let backend = backend_for(&mock_server);

    assert!(backend.health_check().await.is_err());
}

#[tokio::test]
async fn test_tools_list_names_every_tool() {
    let mock_server = MockIoBrokerServer::start().await;
    let backend = backend_for(&mock_server);

    let listed = backend
        .list_tools(PaginatedRequestParam { cursor: None })
        .await
        .unwrap();

    let names: Vec<&str> = listed.tools.iter().map(|tool| tool.name.as_str()).collect();
    assert_eq!(
        names,
        vec![
            "getState",
            "setState",
            "getStates",
            "getStateInfo",
            "getObject",
            "getObjects",
            "createObject",
            "updateObject",
            "deleteObject",
            "sendTo",
            "startScript",
            "stopScript",
            "controlAdapter",
            "getAdapterInstances",
            "readLogs",
            "logMessage",
            "readFile",
            "writeFile",
            "getHistory",
        ]
    );
    assert!(listed.next_cursor.is_none());

    for tool in &listed.tools {
        assert_eq!(tool.input_schema["type"], json!("object"), "{}", tool.name);
    }
}

#[rstest]
#[case("getState", json!({}))]
#[case("getState", json!({"id": ""}))]
#[case("setState", json!({"id": "a.0.b"}))]
#[case("sendTo", json!({"instance": "zigbee.0"}))]
#[case("startScript", json!({"scriptId": "  "}))]
#[case("getHistory", json!({"id": "sensor.temp", "options": {"start": "soon"}}))]
#[case("getHistory", json!({"id": "sensor.temp", "options": {"step": "often"}}))]
#[case("createObject", json!({"id": "0_userdata.0.x", "type": "state"}))]
#[case("controlAdapter", json!({"instance": "hue.0", "action": "pause"}))]
#[case("updateObject", json!({"id": "0_userdata.0.x"}))]
#[tokio::test]
async fn test_invalid_arguments_make_no_network_call(#[case] tool: &str, #[case] arguments: Value) {
    let mock_server = MockIoBrokerServer::start_empty().await;
    let backend = backend_for(&mock_server);

    let result = backend.call_tool(call(tool, arguments)).await.unwrap();

    assert!(result.failed());
    let text = result.text();
    assert!(text.starts_with("Error: "), "{text}");
    assert!(mock_server.received_paths().await.is_empty());
}

#[tokio::test]
async fn test_tool_call_success_result() {
    let mock_server = MockIoBrokerServer::start().await;
    mock_server
        .mock_state("system.adapter.admin.0.alive", json!(true))
        .await;
    let backend = backend_for(&mock_server);

    let result = backend
        .call_tool(call("getState", json!({"id": "system.adapter.admin.0.alive"})))
        .await
        .unwrap();

    assert!(!result.failed());
    let state: Value = serde_json::from_str(&result.text()).unwrap();
    assert_eq!(state["val"], json!(true));
}

#[tokio::test]
async fn test_unknown_tool_is_a_failed_result() {
    let mock_server = MockIoBrokerServer::start().await;
    let backend = backend_for(&mock_server);

    let result = backend
        .call_tool(CallToolRequestParam {
            name: "deleteEverything".to_string(),
            arguments: None,
        })
        .await
        .unwrap();

    assert!(result.failed());
    assert!(result.text().contains("Unknown tool: deleteEverything"));
}

#[tokio::test]
async fn test_slow_call_does_not_block_others() {
    let mock_server = MockIoBrokerServer::start().await;
    mock_server
        .add_mock(
            Mock::given(method("GET"))
                .and(path("/v1/state/slow.0.value"))
                .respond_with(
                    ResponseTemplate::new(200)
                        .set_body_json(json!({"val": 1}))
                        .set_delay(Duration::from_millis(800)),
                ),
        )
        .await;
    mock_server.mock_state("fast.0.value", json!(2)).await;
    let backend = Arc::new(backend_for(&mock_server));

    let slow = {
        let backend = backend.clone();
        tokio::spawn(async move {
            backend
                .call_tool(call("getState", json!({"id": "slow.0.value"})))
                .await
        })
    };
    tokio::time::sleep(Duration::from_millis(50)).await;

    let started = Instant::now();
    let fast = backend
        .call_tool(call("getState", json!({"id": "fast.0.value"})))
        .await
        .unwrap();
    assert!(!fast.failed(), "{}", fast.text());
    assert!(started.elapsed() < Duration::from_millis(600));

    let slow = slow.await.unwrap().unwrap();
    assert!(!slow.failed(), "{}", slow.text());
}
