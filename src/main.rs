//! ioBroker MCP Server - Main Entry Point
//!
//! Verifies that the ioBroker REST API is reachable, then serves the MCP
//! tools over stdio.

use iobroker_mcp::{
    logging, server, time::TimeResolver, IoBrokerBackend, IoBrokerClient, IoBrokerHttpClient,
    ServerConfig, ToolContext, ToolRegistry,
};
use pulseengine_mcp_server::McpServer;

use anyhow::Context;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};

/// ioBroker MCP Server Configuration
#[derive(Parser, Debug)]
#[command(name = "iobroker-mcp-server")]
#[command(about = "MCP server for ioBroker states, objects, adapters and history")]
#[command(version = env!("CARGO_PKG_VERSION"))]
struct Config {
    /// Optional TOML configuration file
    #[arg(long, env = "IOBROKER_CONFIG")]
    config: Option<PathBuf>,

    /// ioBroker host
    #[arg(long, env = "IOBROKER_HOST")]
    host: Option<String>,

    /// REST API adapter port
    #[arg(long, env = "IOBROKER_PORT")]
    port: Option<u16>,

    /// http or https
    #[arg(long, env = "IOBROKER_PROTOCOL")]
    protocol: Option<String>,

    /// Basic auth user
    #[arg(long, env = "IOBROKER_USER")]
    user: Option<String>,

    /// Basic auth password
    #[arg(long, env = "IOBROKER_PASSWORD", hide_env_values = true)]
    password: Option<String>,

    /// Per-request timeout, e.g. "30s"
    #[arg(long, value_parser = humantime_serde::re::humantime::parse_duration)]
    timeout: Option<Duration>,

    /// Pause between disable and enable of an adapter restart, e.g. "300ms"
    #[arg(long, value_parser = humantime_serde::re::humantime::parse_duration)]
    settle: Option<Duration>,

    /// Poll the adapter's alive state before re-enabling it on restart
    #[arg(long)]
    confirm_stop: bool,

    /// Enable debug logging
    #[arg(long)]
    debug: bool,

    /// Emit logs as JSON
    #[arg(long)]
    json_logs: bool,
}

impl Config {
    /// Apply command line overrides on top of file and environment settings
    fn server_config(&self) -> iobroker_mcp::Result<ServerConfig> {
        let mut config = ServerConfig::load(self.config.as_deref())?;

        if let Some(host) = &self.host {
            config.iobroker.host = host.clone();
        }
        if let Some(port) = self.port {
            config.iobroker.port = port;
        }
        if let Some(protocol) = &self.protocol {
            config.iobroker.protocol = protocol.to_lowercase();
        }
        if let Some(user) = &self.user {
            config.iobroker.username = Some(user.clone());
        }
        if let Some(password) = &self.password {
            config.iobroker.password = Some(password.clone());
        }
        if let Some(timeout) = self.timeout {
            config.iobroker.timeout = timeout;
        }
        if let Some(settle) = self.settle {
            config.lifecycle.settle_interval = settle;
        }
        if self.confirm_stop {
            config.lifecycle.confirm_stop = true;
        }
        if self.json_logs {
            config.logging.json_format = true;
        }

        config.validate()?;
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Config::parse();
    let config = cli.server_config().context("Invalid configuration")?;
    let _log_guard = logging::init_logging(&config.logging, cli.debug)
        .context("Failed to initialize logging")?;

    let client = IoBrokerHttpClient::new(&config.iobroker).context("Failed to create client")?;
    info!("🔌 Connecting to ioBroker at {}...", client.base_url());

    if let Err(e) = client.health_check().await {
        error!("❌ Failed to connect to ioBroker: {}", e);
        error!("Please check that ioBroker is running, the REST API adapter is enabled, host and port are correct and no firewall blocks the connection");
        std::process::exit(1);
    }
    info!("✅ Successfully connected to ioBroker");

    let client: Arc<dyn IoBrokerClient> = Arc::new(client);
    let context = ToolContext::new(client, config.lifecycle.clone(), TimeResolver::system());
    let backend = IoBrokerBackend::new(ToolRegistry::new(context));

    let server_config = server::stdio_config(&backend);
    let mut server = McpServer::new(backend, server_config)
        .await
        .context("Failed to create MCP server")?;

    info!("🔗 Serving MCP over stdio");
    server.run().await.context("MCP server stopped with an error")?;

    info!("👋 ioBroker MCP Server stopped");
    Ok(())
}
