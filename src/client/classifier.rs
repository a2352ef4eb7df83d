//! Error classification for REST failures
//!
//! Maps HTTP status codes and reqwest transport errors onto the domain error
//! categories the command router uses to decide whether a fallback call path
//! may be tried.

use crate::error::IoBrokerError;
use serde::Serialize;
use std::fmt;

/// Routing-relevant category of a failed call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ErrorCategory {
    /// 404, terminal
    NotFound,
    /// 401, terminal
    Unauthorized,
    /// 403, terminal
    Forbidden,
    /// Timeout, connection error, 5xx or other status; fallback allowed
    TransportFailure,
    /// The fallback call path failed as well
    CommandFailed,
    /// Validation, configuration or decoding problems raised locally
    Local,
}

impl ErrorCategory {
    /// Categorize an error returned by a client call
    pub fn of(error: &IoBrokerError) -> Self {
        match error {
            IoBrokerError::NotFound { .. } => Self::NotFound,
            IoBrokerError::Unauthorized { .. } => Self::Unauthorized,
            IoBrokerError::Forbidden { .. } => Self::Forbidden,
            IoBrokerError::TransportFailure { .. } => Self::TransportFailure,
            IoBrokerError::CommandFailed { .. } => Self::CommandFailed,
            _ => Self::Local,
        }
    }

    /// Whether the router may try its secondary call path
    pub fn allows_fallback(&self) -> bool {
        matches!(self, Self::TransportFailure)
    }

    /// Authentication or authorization failure
    pub fn is_access_denied(&self) -> bool {
        matches!(self, Self::Unauthorized | Self::Forbidden)
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::NotFound => "not_found",
            Self::Unauthorized => "unauthorized",
            Self::Forbidden => "forbidden",
            Self::TransportFailure => "transport_failure",
            Self::CommandFailed => "command_failed",
            Self::Local => "local",
        };
        f.write_str(name)
    }
}

/// Classify a non-success HTTP status with its raw body
pub fn classify_status(target: &str, status: u16, body: &str) -> IoBrokerError {
    let body = extract_error_message(body);
    match status {
        404 => IoBrokerError::NotFound {
            target: target.to_string(),
            body,
        },
        401 => IoBrokerError::Unauthorized {
            target: target.to_string(),
            body,
        },
        403 => IoBrokerError::Forbidden {
            target: target.to_string(),
            body,
        },
        _ => IoBrokerError::TransportFailure {
            target: target.to_string(),
            status: Some(status),
            message: if body.is_empty() {
                format!("HTTP error {status}")
            } else {
                body
            },
        },
    }
}

/// Classify a reqwest error that produced no usable response
pub fn classify_transport(target: &str, error: &reqwest::Error) -> IoBrokerError {
    let message = if error.is_timeout() {
        format!("request timed out: {error}")
    } else if error.is_connect() {
        format!("connection failed: {error}")
    } else {
        format!("HTTP request failed: {error}")
    };

    IoBrokerError::TransportFailure {
        target: target.to_string(),
        status: error.status().map(|s| s.as_u16()),
        message,
    }
}

/// The REST API reports errors as `{"error": "..."}`; fall back to the raw body
fn extract_error_message(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|value| {
            value
                .get("error")
                .and_then(|e| e.as_str())
                .map(str::to_string)
        })
        .unwrap_or_else(|| body.trim().to_string())
}
