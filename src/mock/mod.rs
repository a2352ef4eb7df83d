//! Mock implementations for testing
//!
//! [`RecordingClient`] stands in for the REST transport: it answers every call
//! through a scripted responder and records what was issued and when, so
//! tests can assert on call order and timing under paused tokio time.

use crate::client::{IoBrokerClient, RestCall};
use crate::error::Result;
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Mutex;
use std::time::Duration;
use tokio::time::Instant;

/// Scripted answer for a REST call
pub type Responder = Box<dyn Fn(&RestCall) -> Result<Value> + Send + Sync>;

/// A call as seen by the mock
#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub call: RestCall,
    pub issued_at: Instant,
}

/// Mock ioBroker client recording every call
pub struct RecordingClient {
    calls: Mutex<Vec<RecordedCall>>,
    responder: Responder,
    latency: Duration,
}

impl Default for RecordingClient {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordingClient {
    /// Answer every call with `null`
    pub fn new() -> Self {
        Self::with_responder(|_| Ok(Value::Null))
    }

    /// Answer calls through `responder`
    pub fn with_responder<F>(responder: F) -> Self
    where
        F: Fn(&RestCall) -> Result<Value> + Send + Sync + 'static,
    {
        Self {
            calls: Mutex::new(Vec::new()),
            responder: Box::new(responder),
            latency: Duration::ZERO,
        }
    }

    /// Simulated round-trip time of every call
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Calls in the order they were issued
    pub fn calls(&self) -> Vec<RestCall> {
        self.recorded().into_iter().map(|r| r.call).collect()
    }

    /// Calls with their issue instants
    pub fn recorded(&self) -> Vec<RecordedCall> {
        self.calls
            .lock()
            .map(|calls| calls.clone())
            .unwrap_or_default()
    }

    pub fn call_count(&self) -> usize {
        self.recorded().len()
    }
}

#[async_trait]
impl IoBrokerClient for RecordingClient {
    async fn execute(&self, call: &RestCall) -> Result<Value> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(RecordedCall {
                call: call.clone(),
                issued_at: Instant::now(),
            });
        }

        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }

        (self.responder)(call)
    }

    async fn health_check(&self) -> Result<()> {
        self.execute(&RestCall::get("/")).await.map(|_| ())
    }
}
