//! Error types for the ioBroker MCP server
//!
//! This module provides the crate-wide error enum, structured error codes and
//! the helpers tool handlers use to turn failures into user-facing text.

use crate::client::ErrorCategory;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias for ioBroker operations
pub type Result<T> = std::result::Result<T, IoBrokerError>;

/// Error types for ioBroker MCP operations
#[derive(Error, Debug)]
pub enum IoBrokerError {
    /// A time expression could not be resolved
    #[error("Invalid time value: {expression}. Supported formats: \"now\", \"5m\", \"2h\", \"3d\", \"1w\", ISO date, or milliseconds")]
    InvalidTimeFormat { expression: String },

    /// Tool arguments failed validation
    #[error("Invalid parameters: {0}")]
    InvalidParameters(String),

    /// The platform answered 404
    #[error("Not found: {target}{}", format_upstream(None, .body))]
    NotFound { target: String, body: String },

    /// The platform answered 401
    #[error("Authentication failed for {target}. Please check your ioBroker credentials{}", format_upstream(Some(401), .body))]
    Unauthorized { target: String, body: String },

    /// The platform answered 403
    #[error("Access denied for {target}. Please check your ioBroker user permissions{}", format_upstream(Some(403), .body))]
    Forbidden { target: String, body: String },

    /// Timeout, connection error, 5xx or any other unexpected status
    #[error("Transport failure for {target}: {message}{}", format_status(.status))]
    TransportFailure {
        target: String,
        status: Option<u16>,
        message: String,
    },

    /// Primary and fallback call paths both failed
    #[error("Command {command} failed: {fallback_error}")]
    CommandFailed {
        command: String,
        fallback_error: Box<IoBrokerError>,
        primary_error: Option<Box<IoBrokerError>>,
    },

    /// The ranged history query failed
    #[error("Error getting history for {state_id} ({start}..{end}): {source}")]
    HistoryQueryFailed {
        state_id: String,
        start: i64,
        end: i64,
        #[source]
        source: Box<IoBrokerError>,
    },

    /// An enable/disable write of a lifecycle action failed
    #[error("{action} of adapter {target} failed during {phase} write: {source}")]
    LifecycleActionFailed {
        target: String,
        action: String,
        phase: String,
        #[source]
        source: Box<IoBrokerError>,
    },

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// JSON parsing errors
    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Tool-calling protocol errors
    #[error("MCP protocol error: {0}")]
    Protocol(String),
}

fn format_upstream(status: Option<u16>, body: &str) -> String {
    match (status, body.is_empty()) {
        (_, true) => String::new(),
        (Some(status), false) => format!(" (Status: {status}): {body}"),
        (None, false) => format!(": {body}"),
    }
}

fn format_status(status: &Option<u16>) -> String {
    match status {
        Some(status) => format!(" (Status: {status})"),
        None => String::new(),
    }
}

/// Structured error code for machine-readable error handling
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    // Input errors (1400-1499)
    InvalidTimeFormat,
    InvalidParameters,

    // Platform answers (1300-1399)
    NotFound,

    // Authentication errors (1100-1199)
    Unauthorized,
    Forbidden,

    // Transport errors (1000-1099)
    TransportFailure,

    // Service errors (1600-1699)
    CommandFailed,
    HistoryQueryFailed,
    LifecycleActionFailed,

    // Configuration errors (1200-1299)
    ConfigurationInvalid,

    // Protocol errors (1700-1799)
    MessageMalformed,
    ProtocolViolation,

    // Internal errors (1900-1999)
    InternalError,
}

impl ErrorCode {
    /// Get numeric error code
    pub fn as_number(&self) -> u32 {
        match self {
            ErrorCode::TransportFailure => 1001,
            ErrorCode::Unauthorized => 1101,
            ErrorCode::Forbidden => 1103,
            ErrorCode::ConfigurationInvalid => 1202,
            ErrorCode::NotFound => 1301,
            ErrorCode::InvalidTimeFormat => 1401,
            ErrorCode::InvalidParameters => 1402,
            ErrorCode::CommandFailed => 1601,
            ErrorCode::HistoryQueryFailed => 1602,
            ErrorCode::LifecycleActionFailed => 1603,
            ErrorCode::ProtocolViolation => 1701,
            ErrorCode::MessageMalformed => 1703,
            ErrorCode::InternalError => 1901,
        }
    }

    /// Get error category
    pub fn category(&self) -> &'static str {
        match self.as_number() {
            1000..=1099 => "transport",
            1100..=1199 => "authentication",
            1200..=1299 => "configuration",
            1300..=1399 => "platform",
            1400..=1499 => "input",
            1600..=1699 => "service",
            1700..=1799 => "protocol",
            1900..=1999 => "internal",
            _ => "unknown",
        }
    }
}

impl IoBrokerError {
    /// Create an invalid parameters error
    pub fn invalid_parameters<S: Into<String>>(msg: S) -> Self {
        Self::InvalidParameters(msg.into())
    }

    /// Create an invalid time format error
    pub fn invalid_time<S: Into<String>>(expression: S) -> Self {
        Self::InvalidTimeFormat {
            expression: expression.into(),
        }
    }

    /// Create a configuration error
    pub fn config<S: Into<String>>(msg: S) -> Self {
        Self::Config(msg.into())
    }

    /// Create a protocol error
    pub fn protocol<S: Into<String>>(msg: S) -> Self {
        Self::Protocol(msg.into())
    }

    /// Create a transport failure without an upstream status
    pub fn transport<T: Into<String>, S: Into<String>>(target: T, msg: S) -> Self {
        Self::TransportFailure {
            target: target.into(),
            status: None,
            message: msg.into(),
        }
    }

    /// Map the error to its structured error code
    pub fn to_error_code(&self) -> ErrorCode {
        match self {
            IoBrokerError::InvalidTimeFormat { .. } => ErrorCode::InvalidTimeFormat,
            IoBrokerError::InvalidParameters(_) => ErrorCode::InvalidParameters,
            IoBrokerError::NotFound { .. } => ErrorCode::NotFound,
            IoBrokerError::Unauthorized { .. } => ErrorCode::Unauthorized,
            IoBrokerError::Forbidden { .. } => ErrorCode::Forbidden,
            IoBrokerError::TransportFailure { .. } => ErrorCode::TransportFailure,
            IoBrokerError::CommandFailed { .. } => ErrorCode::CommandFailed,
            IoBrokerError::HistoryQueryFailed { .. } => ErrorCode::HistoryQueryFailed,
            IoBrokerError::LifecycleActionFailed { .. } => ErrorCode::LifecycleActionFailed,
            IoBrokerError::Config(_) => ErrorCode::ConfigurationInvalid,
            IoBrokerError::Json(_) => ErrorCode::MessageMalformed,
            IoBrokerError::Io(_) => ErrorCode::InternalError,
            IoBrokerError::Protocol(_) => ErrorCode::ProtocolViolation,
        }
    }

    /// Upstream HTTP status, when the platform answered at all
    pub fn status(&self) -> Option<u16> {
        match self {
            IoBrokerError::NotFound { .. } => Some(404),
            IoBrokerError::Unauthorized { .. } => Some(401),
            IoBrokerError::Forbidden { .. } => Some(403),
            IoBrokerError::TransportFailure { status, .. } => *status,
            IoBrokerError::CommandFailed { fallback_error, .. } => fallback_error.status(),
            IoBrokerError::HistoryQueryFailed { source, .. }
            | IoBrokerError::LifecycleActionFailed { source, .. } => source.status(),
            _ => None,
        }
    }

    /// Check if the error is an authentication or authorization error
    pub fn is_auth_error(&self) -> bool {
        ErrorCategory::of(self).is_access_denied()
    }

    /// Production-safe JSON representation used in structured logs
    pub fn to_json(&self) -> serde_json::Value {
        let code = self.to_error_code();
        serde_json::json!({
            "code": code,
            "code_number": code.as_number(),
            "category": code.category(),
            "message": self.to_string(),
            "status": self.status(),
            "routing": ErrorCategory::of(self),
            "is_auth_error": self.is_auth_error(),
        })
    }
}

/// Macro for easy structured error logging
#[macro_export]
macro_rules! log_structured_error {
    ($error:expr, $component:expr, $operation:expr) => {
        tracing::error!(
            component = $component,
            operation = $operation,
            error = %$error.to_json(),
            "{}",
            $error
        )
    };
}

impl From<url::ParseError> for IoBrokerError {
    fn from(err: url::ParseError) -> Self {
        IoBrokerError::Config(format!("Invalid URL: {err}"))
    }
}

impl From<config::ConfigError> for IoBrokerError {
    fn from(err: config::ConfigError) -> Self {
        IoBrokerError::Config(err.to_string())
    }
}

// Lets the framework's structured logging classify tool failures
impl pulseengine_mcp_logging::ErrorClassification for IoBrokerError {
    fn error_type(&self) -> &str {
        match self {
            IoBrokerError::InvalidTimeFormat { .. } => "invalid_time_error",
            IoBrokerError::InvalidParameters(_) => "invalid_parameters_error",
            IoBrokerError::NotFound { .. } => "not_found_error",
            IoBrokerError::Unauthorized { .. } => "authentication_error",
            IoBrokerError::Forbidden { .. } => "permission_denied_error",
            IoBrokerError::TransportFailure { .. } => "transport_error",
            IoBrokerError::CommandFailed { .. } => "command_error",
            IoBrokerError::HistoryQueryFailed { .. } => "history_error",
            IoBrokerError::LifecycleActionFailed { .. } => "lifecycle_error",
            IoBrokerError::Config(_) => "config_error",
            IoBrokerError::Json(_) => "json_error",
            IoBrokerError::Io(_) => "io_error",
            IoBrokerError::Protocol(_) => "mcp_protocol_error",
        }
    }

    fn is_retryable(&self) -> bool {
        ErrorCategory::of(self).allows_fallback()
    }

    fn is_timeout(&self) -> bool {
        matches!(
            self,
            IoBrokerError::TransportFailure { status: None, message, .. }
                if message.starts_with("request timed out")
        )
    }

    fn is_auth_error(&self) -> bool {
        self.is_auth_error()
    }

    fn is_connection_error(&self) -> bool {
        matches!(self, IoBrokerError::TransportFailure { status: None, .. })
    }
}
