//! HTTP client implementation for the ioBroker REST API
//!
//! This module provides the reqwest-based transport: one client built at
//! startup with the base URL, optional basic authentication and a fixed
//! per-request timeout, shared read-only for the process lifetime.

use crate::client::classifier::{classify_status, classify_transport};
use crate::client::{IoBrokerClient, RestCall};
use crate::config::IoBrokerConfig;
use crate::error::{IoBrokerError, Result};
use async_trait::async_trait;
use base64::Engine;
use reqwest::{Client, ClientBuilder};
use serde_json::Value;
use tracing::{debug, warn};
use url::Url;

/// HTTP client for the ioBroker REST API adapter
#[derive(Debug, Clone)]
pub struct IoBrokerHttpClient {
    /// HTTP client instance
    client: Client,

    /// Base URL, e.g. `http://localhost:8087/`
    base_url: Url,
}

impl IoBrokerHttpClient {
    /// Create a new HTTP client
    pub fn new(config: &IoBrokerConfig) -> Result<Self> {
        let mut client_builder = ClientBuilder::new()
            .timeout(config.timeout)
            .user_agent(format!("iobroker-mcp-rust/{}", env!("CARGO_PKG_VERSION")));

        if !config.verify_ssl {
            warn!("SSL verification disabled - this is insecure for production use");
            client_builder = client_builder.danger_accept_invalid_certs(true);
        }

        if let Some((username, password)) = config.credentials() {
            let auth_header = format!(
                "Basic {}",
                base64::engine::general_purpose::STANDARD.encode(format!("{username}:{password}"))
            );
            let mut default_headers = reqwest::header::HeaderMap::new();
            let header_value =
                reqwest::header::HeaderValue::from_str(&auth_header).map_err(|e| {
                    IoBrokerError::config(format!("Invalid authorization header: {e}"))
                })?;
            default_headers.insert(reqwest::header::AUTHORIZATION, header_value);
            client_builder = client_builder.default_headers(default_headers);
        }

        let client = client_builder
            .build()
            .map_err(|e| IoBrokerError::config(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: config.base_url()?,
        })
    }

    /// Base URL requests are resolved against
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Build URL for API endpoint
    fn build_url(&self, call: &RestCall) -> Result<Url> {
        let mut url = self.base_url.join(call.path()).map_err(|e| {
            IoBrokerError::invalid_parameters(format!("Invalid URL path {}: {e}", call.path()))
        })?;

        if let RestCall::Get { query, .. } = call {
            if !query.is_empty() {
                let mut pairs = url.query_pairs_mut();
                for (key, value) in query {
                    pairs.append_pair(key, value);
                }
            }
        }

        Ok(url)
    }

    /// Decode a response body: JSON when possible, otherwise the raw text
    fn parse_body(text: &str) -> Value {
        if text.trim().is_empty() {
            return Value::Null;
        }
        serde_json::from_str(text).unwrap_or_else(|_| Value::String(text.to_string()))
    }
}

#[async_trait]
impl IoBrokerClient for IoBrokerHttpClient {
    async fn execute(&self, call: &RestCall) -> Result<Value> {
        let url = self.build_url(call)?;
        let target = call.path();
        debug!("{} {}", call.method(), url);

        let request = match call {
            RestCall::Get { .. } => self.client.get(url),
            RestCall::Post { body, .. } => self.client.post(url).json(body),
        };

        let response = request
            .send()
            .await
            .map_err(|e| classify_transport(target, &e))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| classify_transport(target, &e))?;

        if !status.is_success() {
            debug!("{} {} answered {}", call.method(), target, status);
            return Err(classify_status(target, status.as_u16(), &text));
        }

        Ok(Self::parse_body(&text))
    }

    async fn health_check(&self) -> Result<()> {
        debug!("Performing health check against {}", self.base_url);
        self.execute(&RestCall::get("/")).await.map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn client() -> IoBrokerHttpClient {
        IoBrokerHttpClient::new(&IoBrokerConfig::default()).unwrap()
    }

    #[test]
    fn test_build_url_with_query() {
        let call = RestCall::command_get("getStates").with_query("pattern", "hm-rpc.0.*");
        let url = client().build_url(&call).unwrap();
        assert_eq!(
            url.as_str(),
            "http://localhost:8087/v1/command/getStates?pattern=hm-rpc.0.*"
        );
    }

    #[test]
    fn test_build_url_keeps_encoded_ids() {
        let call = RestCall::resource("state", "a b");
        let url = client().build_url(&call).unwrap();
        assert_eq!(url.path(), "/v1/state/a%20b");
    }

    #[test]
    fn test_parse_body_variants() {
        assert_eq!(
            IoBrokerHttpClient::parse_body(r#"{"val": 1}"#),
            json!({"val": 1})
        );
        assert_eq!(IoBrokerHttpClient::parse_body("OK"), json!("OK"));
        assert_eq!(IoBrokerHttpClient::parse_body(""), Value::Null);
    }
}
