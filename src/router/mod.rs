//! Command routing with fallback and lifecycle reinterpretation
//!
//! The router issues an operation's primary call and, depending on how it
//! failed, either surfaces the error, retries once through the command-style
//! endpoint, or hands a failed `sendTo` start/stop/restart over to the
//! [`ActionSequencer`]. The decision is the pure table in [`next_action`].

pub mod operation;

pub use operation::{Operation, OperationKind};

use crate::client::{ErrorCategory, IoBrokerClient};
use crate::error::{IoBrokerError, Result};
use crate::lifecycle::{ActionSequencer, AdapterLifecycleAction, LifecycleOutcome};
use crate::log_structured_error;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{debug, warn};

/// What to do after the primary call failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NextAction {
    /// Surface the classified primary error
    Fail,
    /// Try the command-style call path
    Fallback,
    /// Run the adapter lifecycle action instead
    Lifecycle(AdapterLifecycleAction),
}

/// Dispatch table: `(operation, failure category) -> next action`
///
/// `lifecycle` is the action a `sendTo` command names, if any.
pub fn next_action(
    kind: OperationKind,
    category: ErrorCategory,
    lifecycle: Option<AdapterLifecycleAction>,
) -> NextAction {
    match (kind, category, lifecycle) {
        (_, category, _) if category.is_access_denied() => NextAction::Fail,
        (_, ErrorCategory::Local, _) => NextAction::Fail,
        (OperationKind::SendTo, _, Some(action)) => NextAction::Lifecycle(action),
        (kind, category, _) if category.allows_fallback() && kind.has_fallback() => {
            NextAction::Fallback
        }
        _ => NextAction::Fail,
    }
}

/// Result of routing one operation
#[derive(Debug)]
pub struct DispatchOutcome {
    pub operation: OperationKind,
    /// Produced by the fallback call or a lifecycle reinterpretation
    pub via_fallback: bool,
    pub result: Result<Value>,
    /// Message of the failed primary call, kept for diagnostics
    pub primary_error: Option<String>,
    pub lifecycle: Option<LifecycleOutcome>,
}

impl DispatchOutcome {
    fn primary(operation: OperationKind, result: Result<Value>) -> Self {
        Self {
            operation,
            via_fallback: false,
            result,
            primary_error: None,
            lifecycle: None,
        }
    }

    pub fn succeeded(&self) -> bool {
        self.result.is_ok()
    }

    pub fn into_result(self) -> Result<Value> {
        self.result
    }
}

/// Routes operations to the REST API
#[derive(Debug, Clone)]
pub struct CommandRouter {
    client: Arc<dyn IoBrokerClient>,
    sequencer: Arc<ActionSequencer>,
}

impl CommandRouter {
    pub fn new(client: Arc<dyn IoBrokerClient>, sequencer: Arc<ActionSequencer>) -> Self {
        Self { client, sequencer }
    }

    pub fn client(&self) -> &Arc<dyn IoBrokerClient> {
        &self.client
    }

    pub fn sequencer(&self) -> &Arc<ActionSequencer> {
        &self.sequencer
    }

    /// Route `operation`, returning the payload or the final error
    pub async fn execute(&self, operation: &Operation) -> Result<Value> {
        self.dispatch(operation).await.into_result()
    }

    /// Like [`execute`](Self::execute), with "not found" and empty bodies as `None`
    pub async fn execute_optional(&self, operation: &Operation) -> Result<Option<Value>> {
        match self.execute(operation).await {
            Ok(Value::Null) => Ok(None),
            Ok(payload) => Ok(Some(payload)),
            Err(e) if ErrorCategory::of(&e) == ErrorCategory::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Route `operation` and report how the result was obtained
    pub async fn dispatch(&self, operation: &Operation) -> DispatchOutcome {
        let kind = operation.kind();
        let primary = operation.primary_call();

        let primary_error = match self.client.execute(&primary).await {
            Ok(payload) => return DispatchOutcome::primary(kind, Ok(payload)),
            Err(e) => e,
        };

        let category = ErrorCategory::of(&primary_error);
        let lifecycle = operation.lifecycle_action();
        let action = next_action(kind, category, lifecycle.as_ref().map(|(_, a)| *a));
        debug!("{} failed with {}: {:?}", primary, category, action);

        match (action, operation.fallback_call(), lifecycle) {
            (NextAction::Fallback, Some(fallback), _) => {
                warn!(
                    "{} via {} failed ({}), falling back to {}",
                    kind, primary, primary_error, fallback
                );

                match self.client.execute(&fallback).await {
                    Ok(payload) => DispatchOutcome {
                        operation: kind,
                        via_fallback: true,
                        result: Ok(payload),
                        primary_error: Some(primary_error.to_string()),
                        lifecycle: None,
                    },
                    Err(fallback_error) => {
                        let primary_message = primary_error.to_string();
                        let error = IoBrokerError::CommandFailed {
                            command: kind.command_name().to_string(),
                            fallback_error: Box::new(fallback_error),
                            primary_error: Some(Box::new(primary_error)),
                        };
                        log_structured_error!(error, "router", kind.command_name());
                        DispatchOutcome {
                            operation: kind,
                            via_fallback: true,
                            result: Err(error),
                            primary_error: Some(primary_message),
                            lifecycle: None,
                        }
                    }
                }
            }
            (NextAction::Lifecycle(action), _, Some((target, _))) => {
                warn!(
                    "sendTo {} on {} failed ({}), applying it as adapter lifecycle action",
                    action, target, primary_error
                );

                let primary_message = Some(primary_error.to_string());
                match self.sequencer.execute(&target, action).await {
                    Ok(outcome) => DispatchOutcome {
                        operation: kind,
                        via_fallback: true,
                        result: Ok(json!({
                            "message": outcome.summary(),
                            "target": outcome.target,
                            "action": outcome.action,
                            "writes": outcome.writes,
                        })),
                        primary_error: primary_message,
                        lifecycle: Some(outcome),
                    },
                    Err(error) => {
                        log_structured_error!(error, "router", "lifecycle");
                        DispatchOutcome {
                            operation: kind,
                            via_fallback: true,
                            result: Err(error),
                            primary_error: primary_message,
                            lifecycle: None,
                        }
                    }
                }
            }
            _ => DispatchOutcome::primary(kind, Err(primary_error)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::{MockIoBrokerClient, RestCall};
    use crate::config::LifecycleConfig;
    use crate::lifecycle::AdapterState;
    use crate::mock::RecordingClient;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    fn router_with(client: Arc<dyn IoBrokerClient>) -> CommandRouter {
        let sequencer = Arc::new(ActionSequencer::new(
            client.clone(),
            LifecycleConfig::default(),
        ));
        CommandRouter::new(client, sequencer)
    }

    fn classified(status: u16, target: &str) -> IoBrokerError {
        crate::client::classifier::classify_status(target, status, "")
    }

    #[rstest]
    #[case(OperationKind::GetState, ErrorCategory::TransportFailure, None, NextAction::Fallback)]
    #[case(OperationKind::GetState, ErrorCategory::NotFound, None, NextAction::Fail)]
    #[case(OperationKind::GetState, ErrorCategory::Unauthorized, None, NextAction::Fail)]
    #[case(OperationKind::GetState, ErrorCategory::Forbidden, None, NextAction::Fail)]
    #[case(OperationKind::SetState, ErrorCategory::TransportFailure, None, NextAction::Fallback)]
    #[case(OperationKind::GetObjects, ErrorCategory::TransportFailure, None, NextAction::Fallback)]
    #[case(OperationKind::ReadLogs, ErrorCategory::TransportFailure, None, NextAction::Fail)]
    #[case(OperationKind::SendTo, ErrorCategory::TransportFailure, None, NextAction::Fail)]
    #[case(
        OperationKind::SendTo,
        ErrorCategory::TransportFailure,
        Some(AdapterLifecycleAction::Restart),
        NextAction::Lifecycle(AdapterLifecycleAction::Restart)
    )]
    #[case(
        OperationKind::SendTo,
        ErrorCategory::NotFound,
        Some(AdapterLifecycleAction::Stop),
        NextAction::Lifecycle(AdapterLifecycleAction::Stop)
    )]
    #[case(
        OperationKind::SendTo,
        ErrorCategory::Forbidden,
        Some(AdapterLifecycleAction::Start),
        NextAction::Fail
    )]
    fn test_dispatch_table(
        #[case] kind: OperationKind,
        #[case] category: ErrorCategory,
        #[case] lifecycle: Option<AdapterLifecycleAction>,
        #[case] expected: NextAction,
    ) {
        assert_eq!(next_action(kind, category, lifecycle), expected);
    }

    #[rstest]
    #[case(404)]
    #[case(401)]
    #[case(403)]
    #[tokio::test]
    async fn test_terminal_statuses_never_reach_fallback(#[case] status: u16) {
        let mut mock = MockIoBrokerClient::new();
        mock.expect_execute()
            .withf(|call| call.path().starts_with("/v1/state/"))
            .times(1)
            .returning(move |call| Err(classified(status, call.path())));
        mock.expect_execute()
            .withf(|call| call.path().starts_with("/v1/command/"))
            .times(0);

        let router = router_with(Arc::new(mock));
        let outcome = router
            .dispatch(&Operation::GetState {
                id: "hm-rpc.0.ABC".into(),
            })
            .await;

        assert!(!outcome.succeeded());
        assert!(!outcome.via_fallback);
        assert_eq!(outcome.result.unwrap_err().status(), Some(status));
    }

    #[tokio::test]
    async fn test_transport_failure_uses_fallback() {
        let mut mock = MockIoBrokerClient::new();
        mock.expect_execute()
            .withf(|call| call.path() == "/v1/state/a.b")
            .times(1)
            .returning(|call| Err(classified(503, call.path())));
        mock.expect_execute()
            .withf(|call| call.path() == "/v1/command/getState" && call.query_value("id") == Some("a.b"))
            .times(1)
            .returning(|_| Ok(json!({"val": 42, "ack": true})));

        let router = router_with(Arc::new(mock));
        let outcome = router
            .dispatch(&Operation::GetState { id: "a.b".into() })
            .await;

        assert!(outcome.via_fallback);
        assert!(outcome.primary_error.as_deref().unwrap_or_default().contains("503"));
        assert_eq!(outcome.into_result().unwrap(), json!({"val": 42, "ack": true}));
    }

    #[tokio::test]
    async fn test_optional_execution_treats_not_found_as_absent() {
        let client = Arc::new(RecordingClient::with_responder(|call| match call.path() {
            "/v1/object/missing" => Err(classified(404, call.path())),
            "/v1/object/empty" => Ok(Value::Null),
            "/v1/object/locked" => Err(classified(403, call.path())),
            _ => Ok(json!({"type": "state"})),
        }));
        let router = router_with(client.clone());
        let object = |id: &str| Operation::GetObject { id: id.into() };

        assert_eq!(router.execute_optional(&object("missing")).await.unwrap(), None);
        assert_eq!(router.execute_optional(&object("empty")).await.unwrap(), None);
        assert_eq!(
            router.execute_optional(&object("present")).await.unwrap(),
            Some(json!({"type": "state"}))
        );
        assert!(matches!(
            router.execute_optional(&object("locked")).await,
            Err(IoBrokerError::Forbidden { .. })
        ));
        assert_eq!(client.call_count(), 4);
    }

    #[tokio::test]
    async fn test_fallback_failure_reports_fallback_error() {
        let client = Arc::new(RecordingClient::with_responder(|call| {
            if call.path().starts_with("/v1/command/") {
                Err(IoBrokerError::transport(call.path(), "fallback refused"))
            } else {
                Err(IoBrokerError::transport(call.path(), "primary timed out"))
            }
        }));
        let router = router_with(client.clone());

        let err = router
            .execute(&Operation::GetObject {
                id: "system.config".into(),
            })
            .await
            .unwrap_err();

        match &err {
            IoBrokerError::CommandFailed {
                command,
                primary_error,
                ..
            } => {
                assert_eq!(command, "getObject");
                assert!(primary_error
                    .as_ref()
                    .map(|e| e.to_string().contains("primary timed out"))
                    .unwrap_or(false));
            }
            other => panic!("unexpected error {other:?}"),
        }
        assert!(err.to_string().contains("fallback refused"));
        assert_eq!(client.call_count(), 2);
    }

    #[tokio::test]
    async fn test_operation_without_fallback_surfaces_primary_error() {
        let client = Arc::new(RecordingClient::with_responder(|call| {
            Err(IoBrokerError::transport(call.path(), "connection reset"))
        }));
        let router = router_with(client.clone());

        let err = router
            .execute(&Operation::ReadLogs {
                host: "localhost".into(),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, IoBrokerError::TransportFailure { .. }));
        assert_eq!(client.call_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_send_to_restart_becomes_lifecycle_action() {
        let client = Arc::new(RecordingClient::with_responder(|call| {
            if call.path() == "/v1/command/sendTo" {
                Err(IoBrokerError::transport(call.path(), "no response from instance"))
            } else {
                Ok(Value::Null)
            }
        }));
        let router = router_with(client.clone());

        let outcome = router
            .dispatch(&Operation::SendTo {
                instance: "hm-rpc.0".into(),
                command: "restart".into(),
                message: None,
            })
            .await;

        assert!(outcome.via_fallback);
        let lifecycle = outcome.lifecycle.clone().unwrap();
        assert_eq!(
            lifecycle.writes,
            vec![AdapterState::Disabled, AdapterState::Enabled]
        );
        let paths: Vec<String> = client.calls().iter().map(RestCall::to_string).collect();
        assert_eq!(
            paths,
            vec![
                "POST /v1/command/sendTo",
                "POST /v1/command/extendObject",
                "POST /v1/command/extendObject",
            ]
        );
        assert!(outcome.into_result().unwrap()["message"]
            .as_str()
            .unwrap()
            .contains("hm-rpc.0"));
    }

    #[tokio::test]
    async fn test_forbidden_send_to_is_not_reinterpreted() {
        let client = Arc::new(RecordingClient::with_responder(|call| {
            Err(classified(403, call.path()))
        }));
        let router = router_with(client.clone());

        let err = router
            .execute(&Operation::SendTo {
                instance: "hm-rpc.0".into(),
                command: "stop".into(),
                message: None,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, IoBrokerError::Forbidden { .. }));
        assert_eq!(client.call_count(), 1);
    }
}
