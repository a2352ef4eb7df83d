//! System tools: logs and files

use crate::error::Result;
use crate::router::Operation;
use crate::tools::{parse_args, pretty, require_non_empty, text_result, tool, ToolContext};
use pulseengine_mcp_protocol::{CallToolResult, Tool};
use base64::Engine;
use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::Value;
use std::fmt;

#[derive(Debug, Deserialize, JsonSchema)]
pub struct ReadLogsRequest {
    #[serde(default)]
    #[schemars(description = "Host name, defaults to 'localhost'")]
    pub host: Option<String>,
}

/// Severity of a log entry written through `logMessage`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    #[default]
    Info,
    Warn,
    Error,
    Debug,
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let level = match self {
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
            Self::Debug => "debug",
        };
        f.write_str(level)
    }
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct LogMessageRequest {
    #[schemars(description = "Log message text")]
    pub text: String,
    #[serde(default)]
    #[schemars(description = "Log level: info, warn, error or debug. Defaults to info")]
    pub level: Option<LogLevel>,
}

#[derive(Debug, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ReadFileRequest {
    #[schemars(description = "Adapter name, e.g. 'vis.0'")]
    pub adapter: String,
    #[schemars(description = "File path within the adapter storage")]
    pub file_name: String,
    #[serde(default)]
    #[schemars(description = "Read as binary")]
    pub binary: bool,
}

#[derive(Debug, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct WriteFileRequest {
    #[schemars(description = "Adapter name, e.g. 'vis.0'")]
    pub adapter: String,
    #[schemars(description = "File path within the adapter storage")]
    pub file_name: String,
    #[schemars(description = "File content")]
    pub data: String,
    #[serde(default)]
    #[schemars(description = "Write as binary")]
    pub binary: bool,
}

pub fn definitions() -> Vec<Tool> {
    vec![
        tool::<ReadLogsRequest>("readLogs", "List the log files of an ioBroker host"),
        tool::<LogMessageRequest>("logMessage", "Write an entry to the ioBroker log"),
        tool::<ReadFileRequest>("readFile", "Read a file from an adapter's storage"),
        tool::<WriteFileRequest>("writeFile", "Write a file to an adapter's storage"),
    ]
}

pub async fn read_logs(ctx: &ToolContext, arguments: Value) -> Result<CallToolResult> {
    let request: ReadLogsRequest = parse_args(arguments)?;
    let host = request
        .host
        .filter(|h| !h.trim().is_empty())
        .unwrap_or_else(|| "localhost".to_string());

    let logs = ctx
        .router
        .execute(&Operation::ReadLogs { host: host.clone() })
        .await?;
    Ok(text_result(format!(
        "Log files for host {host}:\n{}",
        pretty(&logs)
    )))
}

pub async fn log_message(ctx: &ToolContext, arguments: Value) -> Result<CallToolResult> {
    let request: LogMessageRequest = parse_args(arguments)?;
    require_non_empty("text", &request.text)?;
    let level = request.level.unwrap_or_default();

    let response = ctx
        .router
        .execute(&Operation::LogMessage {
            text: request.text.clone(),
            level: level.to_string(),
        })
        .await?;
    Ok(text_result(format!(
        "Log entry added with level \"{level}\": {}. Response: {response}",
        request.text
    )))
}

pub async fn read_file(ctx: &ToolContext, arguments: Value) -> Result<CallToolResult> {
    let request: ReadFileRequest = parse_args(arguments)?;
    require_non_empty("adapter", &request.adapter)?;
    require_non_empty("fileName", &request.file_name)?;

    let content = ctx
        .router
        .execute(&Operation::ReadFile {
            adapter: request.adapter.clone(),
            file_name: request.file_name.clone(),
            binary: request.binary,
        })
        .await?;
    Ok(text_result(format!(
        "File content from {}/{}:\n{}",
        request.adapter,
        request.file_name,
        pretty(&content)
    )))
}

pub async fn write_file(ctx: &ToolContext, arguments: Value) -> Result<CallToolResult> {
    let request: WriteFileRequest = parse_args(arguments)?;
    require_non_empty("adapter", &request.adapter)?;
    require_non_empty("fileName", &request.file_name)?;

    let data64 = base64::engine::general_purpose::STANDARD.encode(request.data.as_bytes());
    let response = ctx
        .router
        .execute(&Operation::WriteFile {
            adapter: request.adapter.clone(),
            file_name: request.file_name.clone(),
            data64,
            binary: request.binary,
        })
        .await?;
    Ok(text_result(format!(
        "File written to {}/{}. Response: {response}",
        request.adapter, request.file_name
    )))
}
