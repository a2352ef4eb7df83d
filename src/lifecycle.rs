//! Adapter lifecycle sequencing
//!
//! Start, stop and restart are expressed as writes of the `common.enabled`
//! flag on `system.adapter.<instance>`. A restart is a disable write, a settle
//! pause and an enable write. At most one action per adapter instance is in
//! flight at any time.

use crate::client::{IoBrokerClient, RestCall};
use crate::config::LifecycleConfig;
use crate::error::{IoBrokerError, Result};
use crate::router::operation::Operation;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};

/// Lifecycle action on an adapter instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AdapterLifecycleAction {
    Start,
    Stop,
    Restart,
}

impl AdapterLifecycleAction {
    /// Parse a `sendTo` command name
    pub fn from_command(command: &str) -> Option<Self> {
        match command {
            "start" => Some(Self::Start),
            "stop" => Some(Self::Stop),
            "restart" => Some(Self::Restart),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::Stop => "stop",
            Self::Restart => "restart",
        }
    }

    fn past_tense(&self) -> &'static str {
        match self {
            Self::Start => "started",
            Self::Stop => "stopped",
            Self::Restart => "restarted",
        }
    }
}

impl fmt::Display for AdapterLifecycleAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Desired value of an adapter's `common.enabled` flag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AdapterState {
    Enabled,
    Disabled,
}

impl AdapterState {
    pub fn enabled(&self) -> bool {
        matches!(self, Self::Enabled)
    }

    /// Name of the write half, as reported in failures
    pub fn phase(&self) -> &'static str {
        match self {
            Self::Enabled => "enable",
            Self::Disabled => "disable",
        }
    }
}

/// Result of a completed lifecycle action
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LifecycleOutcome {
    pub target: String,
    pub action: AdapterLifecycleAction,
    /// Writes issued, in order
    pub writes: Vec<AdapterState>,
    /// `Some` only when stop confirmation polling ran
    pub stop_confirmed: Option<bool>,
}

impl LifecycleOutcome {
    pub fn summary(&self) -> String {
        format!("Adapter {} {} successfully", self.target, self.action.past_tense())
    }
}

/// Object id of an adapter instance
pub fn adapter_object_id(target: &str) -> String {
    format!("system.adapter.{target}")
}

/// Executes lifecycle actions with per-target mutual exclusion
pub struct ActionSequencer {
    client: Arc<dyn IoBrokerClient>,
    config: LifecycleConfig,
    target_locks: RwLock<HashMap<String, Arc<Mutex<()>>>>,
}

impl fmt::Debug for ActionSequencer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActionSequencer")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl ActionSequencer {
    pub fn new(client: Arc<dyn IoBrokerClient>, config: LifecycleConfig) -> Self {
        Self {
            client,
            config,
            target_locks: RwLock::new(HashMap::new()),
        }
    }

    pub fn config(&self) -> &LifecycleConfig {
        &self.config
    }

    /// Get or create the lock serializing actions on `target`
    async fn target_lock(&self, target: &str) -> Arc<Mutex<()>> {
        if let Some(lock) = self.target_locks.read().await.get(target) {
            return lock.clone();
        }

        let mut locks = self.target_locks.write().await;
        locks
            .entry(target.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Drop the map entry for `target` once no caller holds its lock
    async fn release_lock(&self, target: &str, lock: Arc<Mutex<()>>) {
        drop(lock);
        let mut locks = self.target_locks.write().await;
        if locks
            .get(target)
            .is_some_and(|lock| Arc::strong_count(lock) == 1)
        {
            locks.remove(target);
        }
    }

    /// Run `action` against adapter instance `target`
    ///
    /// A failed write halts the sequence; nothing is rolled back.
    pub async fn execute(
        &self,
        target: &str,
        action: AdapterLifecycleAction,
    ) -> Result<LifecycleOutcome> {
        if target.trim().is_empty() {
            return Err(IoBrokerError::invalid_parameters(
                "adapter instance must not be empty",
            ));
        }

        let lock = self.target_lock(target).await;
        let result = {
            let _guard = lock.lock().await;
            self.run(target, action).await
        };
        self.release_lock(target, lock).await;
        result
    }

    async fn run(&self, target: &str, action: AdapterLifecycleAction) -> Result<LifecycleOutcome> {
        info!("🔄 Running {} on adapter {}", action, target);

        let mut outcome = LifecycleOutcome {
            target: target.to_string(),
            action,
            writes: Vec::new(),
            stop_confirmed: None,
        };

        match action {
            AdapterLifecycleAction::Start => {
                self.write(target, action, AdapterState::Enabled).await?;
                outcome.writes.push(AdapterState::Enabled);
            }
            AdapterLifecycleAction::Stop => {
                self.write(target, action, AdapterState::Disabled).await?;
                outcome.writes.push(AdapterState::Disabled);
            }
            AdapterLifecycleAction::Restart => {
                self.write(target, action, AdapterState::Disabled).await?;
                outcome.writes.push(AdapterState::Disabled);

                tokio::time::sleep(self.config.settle_interval).await;

                if self.config.confirm_stop {
                    outcome.stop_confirmed = Some(self.confirm_stopped(target).await);
                }

                self.write(target, action, AdapterState::Enabled).await?;
                outcome.writes.push(AdapterState::Enabled);
            }
        }

        info!("✅ {}", outcome.summary());
        Ok(outcome)
    }

    async fn write(
        &self,
        target: &str,
        action: AdapterLifecycleAction,
        state: AdapterState,
    ) -> Result<()> {
        let operation = Operation::ExtendObject {
            id: adapter_object_id(target),
            obj: json!({ "common": { "enabled": state.enabled() } }),
        };
        debug!("{} write for {} ({})", state.phase(), target, action);

        self.client
            .execute(&operation.primary_call())
            .await
            .map(|_| ())
            .map_err(|source| IoBrokerError::LifecycleActionFailed {
                target: target.to_string(),
                action: action.to_string(),
                phase: state.phase().to_string(),
                source: Box::new(source),
            })
    }

    /// Poll `<adapter>.alive` until it reads false or attempts run out
    async fn confirm_stopped(&self, target: &str) -> bool {
        let alive_id = format!("{}.alive", adapter_object_id(target));
        let call = RestCall::resource("state", &alive_id);
        let attempts = self.config.confirm_attempts.max(1);

        for attempt in 1..=attempts {
            match self.client.execute(&call).await {
                Ok(value) if !is_alive(&value) => {
                    debug!("Adapter {} reported stopped after {} poll(s)", target, attempt);
                    return true;
                }
                Ok(_) => debug!("Adapter {} still alive (poll {})", target, attempt),
                Err(e) => debug!("Polling {} failed: {}", alive_id, e),
            }

            if attempt < attempts {
                tokio::time::sleep(self.config.confirm_interval).await;
            }
        }

        warn!(
            "Adapter {} did not report stopped after {} poll(s), enabling anyway",
            target, attempts
        );
        false
    }
}

/// Interpret a state body (`{"val": true, ...}` or a bare value) as alive
pub(crate) fn is_alive(value: &Value) -> bool {
    let val = value.get("val").unwrap_or(value);
    match val {
        Value::Bool(alive) => *alive,
        Value::String(s) => s == "true",
        Value::Number(n) => n.as_f64().is_some_and(|n| n != 0.0),
        _ => false,
    }
}
