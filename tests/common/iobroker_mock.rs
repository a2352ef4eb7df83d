//! WireMock-based ioBroker REST API mocking infrastructure
//!
//! Provides a mock HTTP server that answers like the ioBroker `rest-api`
//! adapter so tests run without a real installation.

use iobroker_mcp::config::IoBrokerConfig;
use iobroker_mcp::IoBrokerHttpClient;
use serde_json::{json, Value};
use std::time::Duration;
use wiremock::{
    matchers::{method, path},
    Mock, MockServer, ResponseTemplate,
};

/// Mock ioBroker REST API for testing
pub struct MockIoBrokerServer {
    pub server: MockServer,
}

impl MockIoBrokerServer {
    /// Start a mock server answering the connectivity check
    pub async fn start() -> Self {
        let server = MockServer::start().await;
        let mock_server = Self { server };
        mock_server.mock_root().await;
        mock_server
    }

    /// Start a mock server without any default endpoints
    pub async fn start_empty() -> Self {
        Self {
            server: MockServer::start().await,
        }
    }

    async fn mock_root(&self) {
        Mock::given(method("GET"))
            .and(path("/"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "name": "rest-api",
                "version": "2.0.0"
            })))
            .mount(&self.server)
            .await;
    }

    pub fn uri(&self) -> String {
        self.server.uri()
    }

    /// Connection settings pointing at this server
    pub fn config(&self) -> IoBrokerConfig {
        let address = self.server.address();
        IoBrokerConfig {
            host: address.ip().to_string(),
            port: address.port(),
            timeout: Duration::from_secs(5),
            ..IoBrokerConfig::default()
        }
    }

    /// HTTP client connected to this server
    pub fn client(&self) -> IoBrokerHttpClient {
        IoBrokerHttpClient::new(&self.config()).expect("client for mock server")
    }

    /// Add a custom mock
    pub async fn add_mock(&self, mock: Mock) {
        mock.mount(&self.server).await;
    }

    /// Answer `GET /v1/state/{id}` with a state body
    pub async fn mock_state(&self, id: &str, value: Value) {
        Mock::given(method("GET"))
            .and(path(format!("/v1/state/{id}")))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "val": value,
                "ack": true,
                "ts": 1_755_338_400_000_i64,
                "from": "system.adapter.test.0"
            })))
            .mount(&self.server)
            .await;
    }

    /// Answer `http_method path` with `status` and a JSON error body
    pub async fn mock_error_response(&self, http_method: &str, at: &str, status: u16, message: &str) {
        Mock::given(method(http_method))
            .and(path(at))
            .respond_with(ResponseTemplate::new(status).set_body_json(json!({ "error": message })))
            .mount(&self.server)
            .await;
    }

    /// Paths of all requests received so far
    pub async fn received_paths(&self) -> Vec<String> {
        self.server
            .received_requests()
            .await
            .unwrap_or_default()
            .iter()
            .map(|request| request.url.path().to_string())
            .collect()
    }
}

/// History samples `{ts, val}` spaced one minute apart, ending at `end`
pub fn history_samples(end: i64, values: &[f64]) -> Value {
    let count = values.len() as i64;
    Value::Array(
        values
            .iter()
            .enumerate()
            .map(|(i, val)| json!({ "ts": end - (count - i as i64) * 60_000, "val": val }))
            .collect(),
    )
}
