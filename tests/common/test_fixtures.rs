//! Test fixtures and utilities for consistent test setup
//!
//! Provides reusable clocks, configuration and environment helpers using
//! rstest fixtures.

use iobroker_mcp::config::LifecycleConfig;
use iobroker_mcp::time::TimeResolver;
use iobroker_mcp::{IoBrokerClient, ToolContext, ToolRegistry};
use rstest::*;
use std::sync::Arc;
use std::time::Duration;

/// 2025-08-16T10:00:00Z
pub const FROZEN_NOW: i64 = 1_755_338_400_000;

/// Resolver frozen at [`FROZEN_NOW`]
#[fixture]
pub fn frozen_resolver() -> TimeResolver {
    TimeResolver::fixed(FROZEN_NOW)
}

/// Lifecycle settings with a short settle interval for real-time tests
#[fixture]
pub fn fast_lifecycle(#[default(50)] settle_ms: u64) -> LifecycleConfig {
    LifecycleConfig {
        settle_interval: Duration::from_millis(settle_ms),
        ..LifecycleConfig::default()
    }
}

/// Tool registry around `client` with a frozen clock
pub fn registry_for(client: Arc<dyn IoBrokerClient>, lifecycle: LifecycleConfig) -> ToolRegistry {
    ToolRegistry::new(ToolContext::new(client, lifecycle, frozen_resolver()))
}

/// Every variable the configuration layer reads, cleared
pub fn cleared_env_vars() -> Vec<(&'static str, Option<&'static str>)> {
    vec![
        ("IOBROKER_HOST", None),
        ("IOBROKER_PORT", None),
        ("IOBROKER_PROTOCOL", None),
        ("IOBROKER_USER", None),
        ("IOBROKER_PASSWORD", None),
        ("IOBROKER_TIMEOUT", None),
        ("IOBROKER_RESTART_SETTLE", None),
        ("IOBROKER_LOG_FILE", None),
        ("RUST_LOG", None),
    ]
}

/// Cleared environment with `overrides` applied on top
pub fn env_vars_with(
    overrides: &[(&'static str, &'static str)],
) -> Vec<(&'static str, Option<&'static str>)> {
    let mut vars = cleared_env_vars();
    for (key, value) in overrides {
        vars.retain(|(k, _)| k != key);
        vars.push((key, Some(value)));
    }
    vars
}
