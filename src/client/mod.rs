//! ioBroker REST client abstractions
//!
//! Every component talks to the platform through [`IoBrokerClient`], a single
//! injected transport. The concrete reqwest implementation lives in
//! [`http_client`]; tests substitute recording fakes or mocks.

pub mod classifier;
pub mod http_client;

pub use classifier::ErrorCategory;
pub use http_client::IoBrokerHttpClient;

use crate::error::Result;
use async_trait::async_trait;
use serde_json::Value;
use std::fmt;

/// A single REST request against the ioBroker REST API
#[derive(Debug, Clone, PartialEq)]
pub enum RestCall {
    /// `GET path?query`
    Get {
        path: String,
        query: Vec<(String, String)>,
    },
    /// `POST path` with a JSON body
    Post { path: String, body: Value },
}

impl RestCall {
    /// Plain GET without query parameters
    pub fn get<P: Into<String>>(path: P) -> Self {
        Self::Get {
            path: path.into(),
            query: Vec::new(),
        }
    }

    /// POST with a JSON body
    pub fn post<P: Into<String>>(path: P, body: Value) -> Self {
        Self::Post {
            path: path.into(),
            body,
        }
    }

    /// Resource-addressed call: `/v1/<resource>/<encoded id>`
    pub fn resource(resource: &str, id: &str) -> Self {
        Self::get(format!("/v1/{resource}/{}", urlencoding::encode(id)))
    }

    /// Command-style GET: `/v1/command/<name>?params`
    pub fn command_get(name: &str) -> Self {
        Self::get(format!("/v1/command/{name}"))
    }

    /// Command-style POST: `/v1/command/<name>` with JSON params
    pub fn command_post(name: &str, params: Value) -> Self {
        Self::post(format!("/v1/command/{name}"), params)
    }

    /// Append a query parameter (no-op for POST calls)
    pub fn with_query<K: Into<String>, V: Into<String>>(mut self, key: K, value: V) -> Self {
        if let Self::Get { query, .. } = &mut self {
            query.push((key.into(), value.into()));
        }
        self
    }

    /// Request path without query
    pub fn path(&self) -> &str {
        match self {
            Self::Get { path, .. } | Self::Post { path, .. } => path,
        }
    }

    /// HTTP method name
    pub fn method(&self) -> &'static str {
        match self {
            Self::Get { .. } => "GET",
            Self::Post { .. } => "POST",
        }
    }

    /// Value of a query parameter, if present
    pub fn query_value(&self, key: &str) -> Option<&str> {
        match self {
            Self::Get { query, .. } => query
                .iter()
                .find(|(k, _)| k == key)
                .map(|(_, v)| v.as_str()),
            Self::Post { .. } => None,
        }
    }
}

impl fmt::Display for RestCall {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.method(), self.path())
    }
}

/// Transport used by the router, sequencer and history aggregator
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait IoBrokerClient: Send + Sync {
    /// Execute one REST call and return the decoded body
    ///
    /// Failures are already classified into [`crate::error::IoBrokerError`]
    /// categories (see [`classifier`]).
    async fn execute(&self, call: &RestCall) -> Result<Value>;

    /// Verify the platform is reachable
    async fn health_check(&self) -> Result<()>;
}

impl fmt::Debug for dyn IoBrokerClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("IoBrokerClient")
    }
}
