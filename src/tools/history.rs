//! History tool

use crate::error::Result;
use crate::history::HistoryOptions;
use crate::tools::{parse_args, require_non_empty, text_result, tool, ToolContext};
use pulseengine_mcp_protocol::{CallToolResult, Tool};
use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::Value;

#[derive(Debug, Deserialize, JsonSchema)]
pub struct GetHistoryRequest {
    #[schemars(description = "State ID with history enabled, e.g. 'hm-rpc.0.ABC.1.TEMPERATURE'")]
    pub id: String,
    #[serde(default)]
    #[schemars(description = "Query options; start and end accept \"now\", \"5m\", \"2h\", \"3d\", \"1w\", ISO dates or milliseconds")]
    pub options: HistoryOptions,
}

pub fn definitions() -> Vec<Tool> {
    vec![tool::<GetHistoryRequest>(
        "getHistory",
        "Get historical values of a state with a numeric summary",
    )]
}

pub async fn get_history(ctx: &ToolContext, arguments: Value) -> Result<CallToolResult> {
    let request: GetHistoryRequest = parse_args(arguments)?;
    require_non_empty("id", &request.id)?;

    let result = ctx.history.query(&request.id, &request.options).await?;
    let body = serde_json::to_string_pretty(&result)?;
    Ok(text_result(format!(
        "Found {} history entries for {}:\n{}",
        result.points.len(),
        result.state_id,
        body
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::IoBrokerError;
    use crate::mock::RecordingClient;
    use crate::tools::tests::context_with;
    use crate::tools::ToolResultExt;
    use serde_json::json;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_history_text() {
        let client = Arc::new(RecordingClient::with_responder(|_| {
            Ok(json!([{"ts": 1_755_338_000_000_i64, "val": 10}, {"ts": 1_755_338_100_000_i64, "val": 30}]))
        }));
        let response = get_history(
            &context_with(client),
            json!({"id": "sensor.temp", "options": {"start": "1h"}}),
        )
        .await
        .unwrap();

        let text = response.text();
        assert!(text.starts_with("Found 2 history entries for sensor.temp:"));
        assert!(text.contains("\"avg\": 20.0"));
        assert!(text.contains("\"period\""));
    }

    #[tokio::test]
    async fn test_invalid_time_is_rejected_before_query() {
        let client = Arc::new(RecordingClient::new());
        let err = get_history(
            &context_with(client.clone()),
            json!({"id": "sensor.temp", "options": {"start": "soon"}}),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, IoBrokerError::InvalidTimeFormat { .. }));
        assert_eq!(client.call_count(), 0);
    }
}
