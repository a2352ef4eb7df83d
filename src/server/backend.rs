//! ioBroker backend for the MCP framework
//!
//! The framework owns the wire protocol and transport. This backend answers
//! its requests from the tool registry; resources, prompts and completion
//! are not offered.

use crate::client::{IoBrokerClient, IoBrokerHttpClient};
use crate::config::ServerConfig;
use crate::error::IoBrokerError;
use crate::time::TimeResolver;
use crate::tools::{ToolContext, ToolRegistry, ToolResultExt};
use async_trait::async_trait;
use pulseengine_mcp_protocol::*;
use pulseengine_mcp_server::backend::{BackendError, McpBackend};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Server name reported during the MCP handshake
pub const SERVER_NAME: &str = "iobroker-mcp-server";

impl From<IoBrokerError> for BackendError {
    fn from(err: IoBrokerError) -> Self {
        match err {
            IoBrokerError::TransportFailure { .. } => BackendError::connection(err.to_string()),
            IoBrokerError::Config(msg) => BackendError::configuration(msg),
            IoBrokerError::Unauthorized { .. } | IoBrokerError::Forbidden { .. } => {
                BackendError::configuration(err.to_string())
            }
            IoBrokerError::Protocol(msg) => BackendError::not_supported(msg),
            _ => BackendError::internal(err.to_string()),
        }
    }
}

/// MCP backend exposing the ioBroker tools
#[derive(Clone)]
pub struct IoBrokerBackend {
    registry: ToolRegistry,
}

impl IoBrokerBackend {
    pub fn new(registry: ToolRegistry) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    fn unsupported(what: &str) -> BackendError {
        IoBrokerError::protocol(format!("{what} are not supported by this server")).into()
    }
}

#[async_trait]
impl McpBackend for IoBrokerBackend {
    type Error = BackendError;
    type Config = ServerConfig;

    async fn initialize(config: Self::Config) -> std::result::Result<Self, Self::Error> {
        info!("🚀 Initializing ioBroker backend");
        config.validate()?;
        let client: Arc<dyn IoBrokerClient> = Arc::new(IoBrokerHttpClient::new(&config.iobroker)?);
        let context = ToolContext::new(client, config.lifecycle, TimeResolver::system());
        Ok(Self::new(ToolRegistry::new(context)))
    }

    fn get_server_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: ProtocolVersion::default(),
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation {
                name: SERVER_NAME.to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
            },
            instructions: Some(
                "ioBroker home automation via MCP. Use tools to read and write states, \
                 inspect objects, control adapters and scripts, and query history."
                    .to_string(),
            ),
        }
    }

    async fn health_check(&self) -> std::result::Result<(), Self::Error> {
        match self.registry.context().router.client().health_check().await {
            Ok(()) => Ok(()),
            Err(e) => {
                error!("❌ ioBroker health check failed: {}", e);
                Err(e.into())
            }
        }
    }

    async fn list_tools(
        &self,
        _params: PaginatedRequestParam,
    ) -> std::result::Result<ListToolsResult, Self::Error> {
        let tools = self.registry.definitions();
        debug!("Listed {} tools", tools.len());
        Ok(ListToolsResult {
            tools,
            next_cursor: None,
        })
    }

    async fn call_tool(
        &self,
        params: CallToolRequestParam,
    ) -> std::result::Result<CallToolResult, Self::Error> {
        let arguments = params.arguments.unwrap_or(serde_json::Value::Null);
        let result = self.registry.call(&params.name, arguments).await;
        if !result.failed() {
            info!("✅ Tool {} executed successfully", params.name);
        }
        Ok(result)
    }

    async fn list_resources(
        &self,
        _params: PaginatedRequestParam,
    ) -> std::result::Result<ListResourcesResult, Self::Error> {
        Ok(ListResourcesResult {
            resources: Vec::new(),
            next_cursor: None,
        })
    }

    async fn read_resource(
        &self,
        params: ReadResourceRequestParam,
    ) -> std::result::Result<ReadResourceResult, Self::Error> {
        warn!("Resource {} requested", params.uri);
        Err(Self::unsupported("Resources"))
    }

    async fn list_resource_templates(
        &self,
        _params: PaginatedRequestParam,
    ) -> std::result::Result<ListResourceTemplatesResult, Self::Error> {
        Ok(ListResourceTemplatesResult {
            resource_templates: Vec::new(),
            next_cursor: None,
        })
    }

    async fn list_prompts(
        &self,
        _params: PaginatedRequestParam,
    ) -> std::result::Result<ListPromptsResult, Self::Error> {
        Ok(ListPromptsResult {
            prompts: Vec::new(),
            next_cursor: None,
        })
    }

    async fn get_prompt(
        &self,
        params: GetPromptRequestParam,
    ) -> std::result::Result<GetPromptResult, Self::Error> {
        warn!("Prompt {} requested", params.name);
        Err(Self::unsupported("Prompts"))
    }

    async fn subscribe(
        &self,
        _params: SubscribeRequestParam,
    ) -> std::result::Result<(), Self::Error> {
        Err(Self::unsupported("Subscriptions"))
    }

    async fn unsubscribe(
        &self,
        _params: UnsubscribeRequestParam,
    ) -> std::result::Result<(), Self::Error> {
        Err(Self::unsupported("Subscriptions"))
    }

    async fn complete(
        &self,
        _params: CompleteRequestParam,
    ) -> std::result::Result<CompleteResult, Self::Error> {
        Err(Self::unsupported("Completions"))
    }

    async fn set_level(
        &self,
        params: SetLevelRequestParam,
    ) -> std::result::Result<(), Self::Error> {
        // Filtering is fixed at startup by RUST_LOG and the logging config
        debug!("Ignoring log level change to {}", params.level);
        Ok(())
    }

    async fn handle_custom_method(
        &self,
        method: &str,
        _params: serde_json::Value,
    ) -> std::result::Result<serde_json::Value, Self::Error> {
        warn!("❓ Unknown custom method: {}", method);
        Err(IoBrokerError::protocol(format!("Unknown method: {method}")).into())
    }
}
