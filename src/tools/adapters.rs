//! Adapter tools: sendTo messages, instance control and script control

use crate::error::Result;
use crate::lifecycle::{adapter_object_id, is_alive, AdapterLifecycleAction};
use crate::router::operation::SCRIPT_ENGINE_INSTANCE;
use crate::router::Operation;
use crate::tools::{
    error_result, parse_args, pretty, require_non_empty, text_result, tool, ToolContext,
};
use pulseengine_mcp_protocol::{CallToolResult, Tool};
use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::warn;

const ADAPTER_PREFIX: &str = "system.adapter.";

#[derive(Debug, Deserialize, JsonSchema)]
pub struct SendToRequest {
    #[schemars(description = "Adapter instance, e.g. 'telegram.0' or 'hm-rpc.0'")]
    pub instance: String,
    #[schemars(description = "Command name. 'start', 'stop' and 'restart' control the adapter itself")]
    pub command: String,
    #[serde(default)]
    #[schemars(description = "Message payload passed to the adapter")]
    pub message: Option<Value>,
}

#[derive(Debug, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ScriptRequest {
    #[schemars(description = "Script ID, e.g. 'script.js.common.myScript'")]
    pub script_id: String,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct ControlAdapterRequest {
    #[schemars(description = "Adapter instance, e.g. 'hm-rpc.0' or 'system.adapter.hm-rpc.0'")]
    pub instance: String,
    #[schemars(description = "Action to perform")]
    pub action: ControlAction,
}

#[derive(Debug, Clone, Copy, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum ControlAction {
    Start,
    Stop,
    Restart,
}

impl From<ControlAction> for AdapterLifecycleAction {
    fn from(action: ControlAction) -> Self {
        match action {
            ControlAction::Start => Self::Start,
            ControlAction::Stop => Self::Stop,
            ControlAction::Restart => Self::Restart,
        }
    }
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct AdapterInstancesRequest {
    #[serde(default)]
    #[schemars(description = "Adapter name, e.g. 'hm-rpc'. All instances when omitted")]
    pub adapter: Option<String>,
}

pub fn definitions() -> Vec<Tool> {
    vec![
        tool::<SendToRequest>(
            "sendTo",
            "Send a command to an adapter instance, including start, stop and restart",
        ),
        tool::<ScriptRequest>("startScript", "Start a JavaScript script"),
        tool::<ScriptRequest>("stopScript", "Stop a JavaScript script"),
        tool::<ControlAdapterRequest>(
            "controlAdapter",
            "Start, stop or restart an adapter instance",
        ),
        tool::<AdapterInstancesRequest>(
            "getAdapterInstances",
            "List adapter instances with their enabled and alive status",
        ),
    ]
}

pub async fn send_to(ctx: &ToolContext, arguments: Value) -> Result<CallToolResult> {
    let request: SendToRequest = parse_args(arguments)?;
    require_non_empty("instance", &request.instance)?;
    require_non_empty("command", &request.command)?;

    let outcome = ctx
        .router
        .dispatch(&Operation::SendTo {
            instance: request.instance.clone(),
            command: request.command.clone(),
            message: request.message,
        })
        .await;

    if let Some(lifecycle) = &outcome.lifecycle {
        return Ok(text_result(format!("✅ {}", lifecycle.summary())));
    }

    let response = outcome.into_result()?;
    Ok(text_result(format!(
        "Message sent to {} with command \"{}\". Response: {}",
        request.instance, request.command, response
    )))
}

pub async fn start_script(ctx: &ToolContext, arguments: Value) -> Result<CallToolResult> {
    let request: ScriptRequest = parse_args(arguments)?;
    require_non_empty("scriptId", &request.script_id)?;
    let script_id = request.script_id;

    let error = match ctx
        .router
        .execute(&Operation::StartScript {
            script_id: script_id.clone(),
        })
        .await
    {
        Ok(response) => {
            return Ok(text_result(format!(
                "Script {script_id} start command sent. Response: {response}"
            )))
        }
        Err(error) => error,
    };

    warn!("Starting script {} failed: {}", script_id, error);
    let alive_id = format!("{}.alive", adapter_object_id(SCRIPT_ENGINE_INSTANCE));
    let text = match ctx.router.execute(&Operation::GetState { id: alive_id }).await {
        Ok(state) if !is_alive(&state) => format!(
            "{SCRIPT_ENGINE_INSTANCE} adapter is not running. Cannot start script {script_id}. \
             Please start the javascript adapter first."
        ),
        Ok(_) => format!(
            "Error starting script {script_id}: {error}. JavaScript adapter is running but script command failed."
        ),
        Err(_) => format!(
            "Error starting script {script_id}: {error}. Could not check javascript adapter status."
        ),
    };
    Ok(error_result(text))
}

pub async fn stop_script(ctx: &ToolContext, arguments: Value) -> Result<CallToolResult> {
    let request: ScriptRequest = parse_args(arguments)?;
    require_non_empty("scriptId", &request.script_id)?;

    let response = ctx
        .router
        .execute(&Operation::StopScript {
            script_id: request.script_id.clone(),
        })
        .await?;
    Ok(text_result(format!(
        "Script {} stop command sent. Response: {}",
        request.script_id, response
    )))
}

pub async fn control_adapter(ctx: &ToolContext, arguments: Value) -> Result<CallToolResult> {
    let request: ControlAdapterRequest = parse_args(arguments)?;
    let instance = request
        .instance
        .trim()
        .trim_start_matches(ADAPTER_PREFIX)
        .to_string();
    require_non_empty("instance", &instance)?;

    let existing = ctx
        .router
        .execute_optional(&Operation::GetObject {
            id: adapter_object_id(&instance),
        })
        .await?;
    if existing.is_none() {
        return Ok(error_result(format!("Adapter instance {instance} not found")));
    }

    let outcome = ctx
        .router
        .sequencer()
        .execute(&instance, request.action.into())
        .await?;
    Ok(text_result(format!("✅ {}", outcome.summary())))
}

pub async fn get_adapter_instances(ctx: &ToolContext, arguments: Value) -> Result<CallToolResult> {
    let request: AdapterInstancesRequest = parse_args(arguments)?;
    let adapter = request.adapter.as_deref().map(str::trim).filter(|a| !a.is_empty());
    let pattern = match adapter {
        Some(adapter) => format!("{ADAPTER_PREFIX}{adapter}.*"),
        None => format!("{ADAPTER_PREFIX}*"),
    };

    let objects = ctx
        .router
        .execute(&Operation::GetObjects {
            pattern,
            object_type: Some("instance".to_string()),
        })
        .await?;
    let instances = instance_summaries(&objects);

    if instances.is_empty() {
        return Ok(text_result(match adapter {
            Some(adapter) => format!("No adapter instances found for adapter: {adapter}"),
            None => "No adapter instances found".to_string(),
        }));
    }
    Ok(text_result(pretty(&Value::Array(instances))))
}

/// Instance objects arrive keyed by id or as a plain list
fn instance_summaries(objects: &Value) -> Vec<Value> {
    let entries: Vec<&Value> = match objects {
        Value::Object(map) => map.values().collect(),
        Value::Array(list) => list.iter().collect(),
        _ => Vec::new(),
    };
    entries
        .into_iter()
        .filter(|obj| obj["type"] == "instance")
        .map(|obj| {
            let common = &obj["common"];
            json!({
                "_id": obj["_id"],
                "enabled": common["enabled"],
                "host": common["host"],
                "mode": common["mode"],
                "name": common["name"],
                "version": common["version"],
                "alive": common["alive"],
                "connected": common["connected"],
            })
        })
        .collect()
}
