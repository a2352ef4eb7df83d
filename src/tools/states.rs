//! State tools: read and write single states, list states by pattern,
//! inspect a state together with its object definition

use crate::error::Result;
use crate::router::Operation;
use crate::tools::{entry_count, parse_args, pretty, require_non_empty, text_result, tool, ToolContext};
use pulseengine_mcp_protocol::{CallToolResult, Tool};
use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::{json, Map, Value};

#[derive(Debug, Deserialize, JsonSchema)]
pub struct GetStateRequest {
    #[schemars(description = "State ID, e.g. 'javascript.0.myState' or 'hm-rpc.0.ABC123.1.STATE'")]
    pub id: String,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct SetStateRequest {
    #[schemars(description = "State ID to write")]
    pub id: String,
    #[schemars(description = "Value to set (boolean, number, string or object)")]
    pub value: Value,
    #[serde(default)]
    #[schemars(description = "Acknowledge flag, default false")]
    pub ack: bool,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct GetStatesRequest {
    #[serde(default)]
    #[schemars(description = "Pattern to filter states, e.g. 'javascript.0.*'. Defaults to '*'")]
    pub pattern: Option<String>,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct GetStateInfoRequest {
    #[schemars(description = "State ID")]
    pub id: String,
}

/// State fields reported by `getStateInfo`
const STATE_FIELDS: [&str; 7] = ["val", "ack", "ts", "lc", "from", "q", "expire"];

/// Object fields reported by `getStateInfo`
const OBJECT_FIELDS: [&str; 3] = ["type", "common", "native"];

fn pick(value: &Value, fields: &[&str]) -> Value {
    let picked: Map<String, Value> = fields
        .iter()
        .filter_map(|field| Some((field.to_string(), value.get(*field)?.clone())))
        .collect();
    Value::Object(picked)
}

pub fn definitions() -> Vec<Tool> {
    vec![
        tool::<GetStateRequest>("getState", "Get the current value of an ioBroker state"),
        tool::<SetStateRequest>("setState", "Set the value of an ioBroker state"),
        tool::<GetStatesRequest>(
            "getStates",
            "Get multiple ioBroker states matching a pattern",
        ),
        tool::<GetStateInfoRequest>(
            "getStateInfo",
            "Get detailed information about a state including its object definition",
        ),
    ]
}

pub async fn get_state(ctx: &ToolContext, arguments: Value) -> Result<CallToolResult> {
    let request: GetStateRequest = parse_args(arguments)?;
    require_non_empty("id", &request.id)?;

    let state = ctx
        .router
        .execute(&Operation::GetState { id: request.id })
        .await?;
    Ok(text_result(pretty(&state)))
}

pub async fn set_state(ctx: &ToolContext, arguments: Value) -> Result<CallToolResult> {
    let request: SetStateRequest = parse_args(arguments)?;
    require_non_empty("id", &request.id)?;

    let response = ctx
        .router
        .execute(&Operation::SetState {
            id: request.id.clone(),
            value: request.value.clone(),
            ack: request.ack,
        })
        .await?;

    Ok(text_result(format!(
        "State {} set to {} (ack: {}). Response: {}",
        request.id, request.value, request.ack, response
    )))
}

pub async fn get_states(ctx: &ToolContext, arguments: Value) -> Result<CallToolResult> {
    let request: GetStatesRequest = parse_args(arguments)?;
    let pattern = request
        .pattern
        .filter(|p| !p.trim().is_empty())
        .unwrap_or_else(|| "*".to_string());

    let states = ctx
        .router
        .execute(&Operation::GetStates {
            pattern: pattern.clone(),
        })
        .await?;

    Ok(text_result(format!(
        "Found {} states matching pattern \"{}\":\n{}",
        entry_count(&states),
        pattern,
        pretty(&states)
    )))
}

pub async fn get_state_info(ctx: &ToolContext, arguments: Value) -> Result<CallToolResult> {
    let request: GetStateInfoRequest = parse_args(arguments)?;
    require_non_empty("id", &request.id)?;
    let id = request.id;

    let get_state = Operation::GetState { id: id.clone() };
    let get_object = Operation::GetObject { id: id.clone() };
    let (state, object) = tokio::join!(
        ctx.router.execute_optional(&get_state),
        ctx.router.execute_optional(&get_object),
    );
    let (state, object) = (state?, object?);

    let info = json!({
        "id": id,
        "exists": state.is_some(),
        "state": state.as_ref().map(|state| pick(state, &STATE_FIELDS)),
        "object": object.as_ref().map(|object| pick(object, &OBJECT_FIELDS)),
    });
    Ok(text_result(pretty(&info)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::IoBrokerError;
    use crate::mock::RecordingClient;
    use crate::tools::tests::context_with;
    use crate::tools::ToolResultExt;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_get_state_pretty_prints_payload() {
        let client = Arc::new(RecordingClient::with_responder(|_| {
            Ok(json!({"val": 21.5, "ack": true}))
        }));
        let response = get_state(&context_with(client.clone()), json!({"id": "sensor.temp"}))
            .await
            .unwrap();
        assert!(response.text().contains("21.5"));
        assert_eq!(client.calls()[0].path(), "/v1/state/sensor.temp");
    }

    #[tokio::test]
    async fn test_set_state_echoes_value_and_ack() {
        let client = Arc::new(RecordingClient::with_responder(|_| Ok(json!({"id": "x"}))));
        let response = set_state(
            &context_with(client),
            json!({"id": "javascript.0.light", "value": true, "ack": true}),
        )
        .await
        .unwrap();
        assert_eq!(
            response.text(),
            r#"State javascript.0.light set to true (ack: true). Response: {"id":"x"}"#
        );
    }

    #[tokio::test]
    async fn test_empty_id_is_rejected() {
        let client = Arc::new(RecordingClient::new());
        let err = get_state(&context_with(client.clone()), json!({"id": ""}))
            .await
            .unwrap_err();
        assert!(matches!(err, IoBrokerError::InvalidParameters(_)));
        assert_eq!(client.call_count(), 0);
    }

    #[tokio::test]
    async fn test_get_states_counts_entries() {
        let client = Arc::new(RecordingClient::with_responder(|_| {
            Ok(json!({"a.0.x": {"val": 1}, "a.0.y": {"val": 2}}))
        }));
        let response = get_states(&context_with(client.clone()), json!({}))
            .await
            .unwrap();
        assert!(response.text().starts_with("Found 2 states matching pattern \"*\""));
        assert_eq!(client.calls()[0].query_value("filter"), Some("*"));
    }

    #[tokio::test]
    async fn test_state_info_combines_state_and_object() {
        let client = Arc::new(RecordingClient::with_responder(|call| match call.path() {
            "/v1/state/hm-rpc.0.ABC.1.TEMPERATURE" => Ok(json!({
                "val": 21.5, "ack": true, "ts": 1, "lc": 1, "from": "system.adapter.hm-rpc.0",
                "q": 0, "user": "system.user.admin"
            })),
            _ => Ok(json!({
                "_id": "hm-rpc.0.ABC.1.TEMPERATURE",
                "type": "state",
                "common": {"role": "value.temperature", "unit": "°C"},
                "native": {},
                "acl": {"owner": "system.user.admin"}
            })),
        }));
        let response = get_state_info(
            &context_with(client.clone()),
            json!({"id": "hm-rpc.0.ABC.1.TEMPERATURE"}),
        )
        .await
        .unwrap();

        let info: Value = serde_json::from_str(&response.text()).unwrap();
        assert_eq!(info["exists"], json!(true));
        assert_eq!(info["state"]["val"], json!(21.5));
        assert!(info["state"].get("user").is_none());
        assert_eq!(info["object"]["common"]["unit"], json!("°C"));
        assert!(info["object"].get("acl").is_none());
        assert_eq!(client.call_count(), 2);
    }

    #[tokio::test]
    async fn test_state_info_for_missing_state() {
        let client = Arc::new(RecordingClient::with_responder(|call| {
            Err(IoBrokerError::NotFound {
                target: call.path().to_string(),
                body: String::new(),
            })
        }));
        let response = get_state_info(&context_with(client), json!({"id": "nothing.here"}))
            .await
            .unwrap();

        let info: Value = serde_json::from_str(&response.text()).unwrap();
        assert_eq!(
            info,
            json!({"id": "nothing.here", "exists": false, "state": null, "object": null})
        );
    }
}
