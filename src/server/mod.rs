//! MCP server hosting
//!
//! Tool calls are served through the pulseengine MCP framework over stdio.

pub mod backend;

pub use backend::{IoBrokerBackend, SERVER_NAME};

use pulseengine_mcp_server::backend::McpBackend;
use pulseengine_mcp_server::ServerConfig as McpServerConfig;
use pulseengine_mcp_transport::TransportConfig;

/// Framework configuration for a stdio-hosted backend
///
/// Authentication is off: the stdio peer is the process that spawned us.
pub fn stdio_config(backend: &IoBrokerBackend) -> McpServerConfig {
    let mut auth_config = pulseengine_mcp_auth::default_config();
    auth_config.enabled = false;

    McpServerConfig {
        server_info: backend.get_server_info(),
        auth_config,
        transport_config: TransportConfig::Stdio,
        ..Default::default()
    }
}
