//! ioBroker MCP Server implementation in Rust
//!
//! This crate exposes the states, objects, adapters, scripts, files and
//! history of an ioBroker installation as MCP tools, translating each tool
//! call into requests against the ioBroker REST API adapter.
//!
//! # Features
//!
//! - 19 MCP tools served over stdio by the pulseengine MCP framework
//! - Fallback from resource-addressed to command-style REST endpoints
//! - Adapter start/stop/restart sequencing with per-adapter exclusion
//! - History queries with relative time expressions and numeric summaries

// Core modules
pub mod client;
pub mod config;
pub mod error;
pub mod history;
pub mod lifecycle;
pub mod logging;
pub mod router;
pub mod server;
pub mod time;
pub mod tools;

// Test support modules - available for both unit tests and integration tests
#[cfg(any(test, feature = "test-utils"))]
pub mod mock;

// Re-export main types for convenience
pub use client::{IoBrokerClient, IoBrokerHttpClient, RestCall};
pub use config::ServerConfig;
pub use error::{IoBrokerError, Result};
pub use server::IoBrokerBackend;
pub use tools::{ToolContext, ToolRegistry};
