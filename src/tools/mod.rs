//! MCP tool implementations for ioBroker
//!
//! Every tool has a JSON schema derived from its argument struct and a handler
//! producing a text result. Arguments are validated before any network call;
//! failures become error results instead of escaping the call.

pub mod adapters;
pub mod history;
pub mod objects;
pub mod states;
pub mod system;

use crate::client::IoBrokerClient;
use crate::config::LifecycleConfig;
use crate::error::{IoBrokerError, Result};
use crate::history::HistoryAggregator;
use crate::lifecycle::ActionSequencer;
use crate::router::CommandRouter;
use crate::time::TimeResolver;
use pulseengine_mcp_protocol::{CallToolResult, Content, Tool};
use schemars::JsonSchema;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, warn};

/// Describe a tool whose arguments are `T`
pub fn tool<T: JsonSchema>(name: &str, description: &str) -> Tool {
    Tool {
        name: name.to_string(),
        description: description.to_string(),
        input_schema: schema_for::<T>(),
    }
}

/// JSON schema of an argument struct
pub fn schema_for<T: JsonSchema>() -> Value {
    let mut schema =
        serde_json::to_value(schemars::schema_for!(T)).unwrap_or(Value::Null);
    if let Value::Object(map) = &mut schema {
        map.remove("$schema");
        map.remove("title");
    }
    schema
}

/// Successful result with one text block
pub fn text_result<S: Into<String>>(text: S) -> CallToolResult {
    CallToolResult::success(vec![Content::text(text.into())])
}

/// Error result with one text block
pub fn error_result<S: Into<String>>(text: S) -> CallToolResult {
    CallToolResult::error_text(text.into())
}

/// Error result for a failed call
pub fn failure(error: &IoBrokerError) -> CallToolResult {
    error_result(format!("Error: {error}"))
}

/// Accessors over tool results
pub trait ToolResultExt {
    /// Concatenated text of all text blocks
    fn text(&self) -> String;
    fn failed(&self) -> bool;
}

impl ToolResultExt for CallToolResult {
    fn text(&self) -> String {
        self.content
            .iter()
            .filter_map(|content| match content {
                Content::Text { text, .. } => Some(text.as_str()),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    fn failed(&self) -> bool {
        self.is_error.unwrap_or(false)
    }
}

/// Shared tool context for all MCP tools
#[derive(Debug, Clone)]
pub struct ToolContext {
    pub router: Arc<CommandRouter>,
    pub history: Arc<HistoryAggregator>,
}

impl ToolContext {
    /// Wire the router, sequencer and history aggregator around one client
    pub fn new(
        client: Arc<dyn IoBrokerClient>,
        lifecycle: LifecycleConfig,
        resolver: TimeResolver,
    ) -> Self {
        let sequencer = Arc::new(ActionSequencer::new(client.clone(), lifecycle));
        Self {
            router: Arc::new(CommandRouter::new(client.clone(), sequencer)),
            history: Arc::new(HistoryAggregator::new(client, resolver)),
        }
    }
}

/// Decode tool arguments, mapping failures to `InvalidParameters`
pub fn parse_args<T: DeserializeOwned>(arguments: Value) -> Result<T> {
    let arguments = match arguments {
        Value::Null => Value::Object(Default::default()),
        other => other,
    };
    serde_json::from_value(arguments).map_err(|e| IoBrokerError::invalid_parameters(e.to_string()))
}

/// Reject empty identifiers before anything is sent
pub fn require_non_empty(field: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(IoBrokerError::invalid_parameters(format!(
            "{field} must not be empty"
        )));
    }
    Ok(())
}

/// Pretty-printed JSON for result text
pub fn pretty(value: &Value) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
}

/// Number of entries in a map or list payload
pub fn entry_count(value: &Value) -> usize {
    match value {
        Value::Object(map) => map.len(),
        Value::Array(items) => items.len(),
        Value::Null => 0,
        _ => 1,
    }
}

/// Registry dispatching `tools/call` requests by name
#[derive(Debug, Clone)]
pub struct ToolRegistry {
    context: ToolContext,
}

impl ToolRegistry {
    pub fn new(context: ToolContext) -> Self {
        Self { context }
    }

    pub fn context(&self) -> &ToolContext {
        &self.context
    }

    /// All tool definitions, in a stable order
    pub fn definitions(&self) -> Vec<Tool> {
        let mut definitions = states::definitions();
        definitions.extend(objects::definitions());
        definitions.extend(adapters::definitions());
        definitions.extend(system::definitions());
        definitions.extend(history::definitions());
        definitions
    }

    /// Run a tool; every outcome becomes a response
    pub async fn call(&self, name: &str, arguments: Value) -> CallToolResult {
        debug!("Calling tool {}", name);
        let ctx = &self.context;

        let result = match name {
            "getState" => states::get_state(ctx, arguments).await,
            "setState" => states::set_state(ctx, arguments).await,
            "getStates" => states::get_states(ctx, arguments).await,
            "getStateInfo" => states::get_state_info(ctx, arguments).await,
            "getObject" => objects::get_object(ctx, arguments).await,
            "getObjects" => objects::get_objects(ctx, arguments).await,
            "createObject" => objects::create_object(ctx, arguments).await,
            "updateObject" => objects::update_object(ctx, arguments).await,
            "deleteObject" => objects::delete_object(ctx, arguments).await,
            "sendTo" => adapters::send_to(ctx, arguments).await,
            "startScript" => adapters::start_script(ctx, arguments).await,
            "stopScript" => adapters::stop_script(ctx, arguments).await,
            "controlAdapter" => adapters::control_adapter(ctx, arguments).await,
            "getAdapterInstances" => adapters::get_adapter_instances(ctx, arguments).await,
            "readLogs" => system::read_logs(ctx, arguments).await,
            "logMessage" => system::log_message(ctx, arguments).await,
            "readFile" => system::read_file(ctx, arguments).await,
            "writeFile" => system::write_file(ctx, arguments).await,
            "getHistory" => history::get_history(ctx, arguments).await,
            _ => Err(IoBrokerError::invalid_parameters(format!(
                "Unknown tool: {name}"
            ))),
        };

        result.unwrap_or_else(|e| {
            warn!("Tool {} failed: {}", name, e);
            failure(&e)
        })
    }
}
