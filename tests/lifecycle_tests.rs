//! Adapter lifecycle reinterpretation of `sendTo` over HTTP

use iobroker_mcp::config::LifecycleConfig;
use iobroker_mcp::lifecycle::{ActionSequencer, AdapterLifecycleAction};
use iobroker_mcp::tools::ToolResultExt;
use iobroker_mcp::IoBrokerError;
use pretty_assertions::assert_eq;
use rstest::*;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, ResponseTemplate};

mod common;
use common::{fast_lifecycle, registry_for, MockIoBrokerServer};

async fn failing_send_to(mock_server: &MockIoBrokerServer) {
    mock_server
        .add_mock(
            Mock::given(method("POST"))
                .and(path("/v1/command/sendTo"))
                .respond_with(ResponseTemplate::new(500).set_body_json(json!({"error": "unknown command"}))),
        )
        .await;
}

async fn enabled_write(mock_server: &MockIoBrokerServer, adapter: &str, enabled: bool, times: u64) {
    mock_server
        .add_mock(
            Mock::given(method("POST"))
                .and(path("/v1/command/extendObject"))
                .and(body_partial_json(json!({
                    "id": format!("system.adapter.{adapter}"),
                    "obj": {"common": {"enabled": enabled}}
                })))
                .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": adapter})))
                .expect(times),
        )
        .await;
}

/// `enabled` flags of the extendObject bodies, in arrival order
async fn enabled_writes(mock_server: &MockIoBrokerServer) -> Vec<(String, bool)> {
    mock_server
        .server
        .received_requests()
        .await
        .unwrap_or_default()
        .iter()
        .filter(|request| request.url.path() == "/v1/command/extendObject")
        .filter_map(|request| serde_json::from_slice::<Value>(&request.body).ok())
        .filter_map(|body| {
            Some((
                body["id"].as_str()?.to_string(),
                body["obj"]["common"]["enabled"].as_bool()?,
            ))
        })
        .collect()
}

#[rstest]
#[tokio::test]
async fn test_restart_disables_then_enables(#[with(50)] fast_lifecycle: LifecycleConfig) {
    let mock_server = MockIoBrokerServer::start().await;
    failing_send_to(&mock_server).await;
    enabled_write(&mock_server, "zigbee.0", false, 1).await;
    enabled_write(&mock_server, "zigbee.0", true, 1).await;

    let registry = registry_for(Arc::new(mock_server.client()), fast_lifecycle);
    let response = registry
        .call("sendTo", json!({"instance": "zigbee.0", "command": "restart"}))
        .await;

    assert!(!response.failed(), "{}", response.text());
    assert_eq!(response.text(), "✅ Adapter zigbee.0 restarted successfully");
    assert_eq!(
        enabled_writes(&mock_server).await,
        vec![("system.adapter.zigbee.0".to_string(), false), ("system.adapter.zigbee.0".to_string(), true)]
    );
}

#[rstest]
#[case("start", true, "started")]
#[case("stop", false, "stopped")]
#[tokio::test]
async fn test_start_and_stop_write_once(
    #[case] command: &str,
    #[case] enabled: bool,
    #[case] verb: &str,
) {
    let mock_server = MockIoBrokerServer::start().await;
    failing_send_to(&mock_server).await;
    enabled_write(&mock_server, "shelly.0", enabled, 1).await;
    enabled_write(&mock_server, "shelly.0", !enabled, 0).await;

    let registry = registry_for(Arc::new(mock_server.client()), fast_lifecycle(50));
    let response = registry
        .call("sendTo", json!({"instance": "shelly.0", "command": command}))
        .await;

    assert_eq!(response.text(), format!("✅ Adapter shelly.0 {verb} successfully"));
}

#[tokio::test]
async fn test_successful_send_to_is_not_reinterpreted() {
    let mock_server = MockIoBrokerServer::start().await;
    mock_server
        .add_mock(
            Mock::given(method("POST"))
                .and(path("/v1/command/sendTo"))
                .and(body_partial_json(json!({"adapterInstance": "admin.0", "command": "restart"})))
                .respond_with(ResponseTemplate::new(200).set_body_json(json!({"result": "ok"})))
                .expect(1),
        )
        .await;
    enabled_write(&mock_server, "admin.0", false, 0).await;

    let registry = registry_for(Arc::new(mock_server.client()), fast_lifecycle(50));
    let response = registry
        .call("sendTo", json!({"instance": "admin.0", "command": "restart"}))
        .await;

    assert!(!response.failed());
    assert!(response.text().starts_with("Message sent to admin.0 with command \"restart\""));
}

#[tokio::test]
async fn test_enable_failure_names_phase() {
    let mock_server = MockIoBrokerServer::start().await;
    failing_send_to(&mock_server).await;
    enabled_write(&mock_server, "mqtt.0", false, 1).await;
    mock_server
        .add_mock(
            Mock::given(method("POST"))
                .and(path("/v1/command/extendObject"))
                .and(body_partial_json(json!({"obj": {"common": {"enabled": true}}})))
                .respond_with(ResponseTemplate::new(500).set_body_json(json!({"error": "db offline"})))
                .expect(1),
        )
        .await;

    let sequencer = ActionSequencer::new(Arc::new(mock_server.client()), fast_lifecycle(50));
    let err = sequencer
        .execute("mqtt.0", AdapterLifecycleAction::Restart)
        .await
        .unwrap_err();

    match &err {
        IoBrokerError::LifecycleActionFailed { target, phase, .. } => {
            assert_eq!(target, "mqtt.0");
            assert_eq!(phase, "enable");
        }
        other => panic!("expected LifecycleActionFailed, got {other:?}"),
    }
    assert!(err.to_string().contains("db offline"));
}

#[tokio::test]
async fn test_concurrent_restarts_of_one_adapter_do_not_interleave() {
    let mock_server = MockIoBrokerServer::start().await;
    enabled_write(&mock_server, "hue.0", false, 2).await;
    enabled_write(&mock_server, "hue.0", true, 2).await;

    let config = LifecycleConfig {
        settle_interval: Duration::from_millis(100),
        ..LifecycleConfig::default()
    };
    let sequencer = Arc::new(ActionSequencer::new(Arc::new(mock_server.client()), config));

    let first = {
        let sequencer = sequencer.clone();
        tokio::spawn(async move {
            sequencer
                .execute("hue.0", AdapterLifecycleAction::Restart)
                .await
        })
    };
    let second = {
        let sequencer = sequencer.clone();
        tokio::spawn(async move {
            sequencer
                .execute("hue.0", AdapterLifecycleAction::Restart)
                .await
        })
    };
    first.await.unwrap().unwrap();
    second.await.unwrap().unwrap();

    let flags: Vec<bool> = enabled_writes(&mock_server)
        .await
        .into_iter()
        .map(|(_, enabled)| enabled)
        .collect();
    assert_eq!(flags, vec![false, true, false, true]);
}
