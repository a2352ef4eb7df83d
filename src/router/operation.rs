//! Abstract operations and their REST call paths
//!
//! Each [`Operation`] knows its primary resource-addressed call and, where the
//! REST API offers a second endpoint convention, the command-style fallback.

use crate::client::RestCall;
use crate::lifecycle::AdapterLifecycleAction;
use serde_json::{json, Value};
use std::fmt;

/// Script engine instance used by `startScript` and `stopScript`
pub const SCRIPT_ENGINE_INSTANCE: &str = "javascript.0";

/// Operation discriminant used by the dispatch table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperationKind {
    GetState,
    SetState,
    GetStates,
    GetObject,
    GetObjects,
    SendTo,
    StartScript,
    StopScript,
    ReadLogs,
    LogMessage,
    ReadFile,
    WriteFile,
    ExtendObject,
    SetObject,
    DeleteObject,
}

impl OperationKind {
    /// Command name on the `/v1/command/` surface
    pub fn command_name(&self) -> &'static str {
        match self {
            Self::GetState => "getState",
            Self::SetState => "setState",
            Self::GetStates => "getStates",
            Self::GetObject => "getObject",
            Self::GetObjects => "getObjects",
            Self::SendTo => "sendTo",
            Self::StartScript => "startScript",
            Self::StopScript => "stopScript",
            Self::ReadLogs => "readLogs",
            Self::LogMessage => "log",
            Self::ReadFile => "readFile",
            Self::WriteFile => "writeFile64",
            Self::ExtendObject => "extendObject",
            Self::SetObject => "setObject",
            Self::DeleteObject => "delObject",
        }
    }

    /// Whether a command-style secondary call path exists
    pub fn has_fallback(&self) -> bool {
        matches!(
            self,
            Self::GetState | Self::SetState | Self::GetStates | Self::GetObject | Self::GetObjects
        )
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.command_name())
    }
}

/// An abstract platform operation requested by a tool
#[derive(Debug, Clone, PartialEq)]
pub enum Operation {
    GetState {
        id: String,
    },
    SetState {
        id: String,
        value: Value,
        ack: bool,
    },
    GetStates {
        pattern: String,
    },
    GetObject {
        id: String,
    },
    GetObjects {
        pattern: String,
        object_type: Option<String>,
    },
    SendTo {
        instance: String,
        command: String,
        message: Option<Value>,
    },
    StartScript {
        script_id: String,
    },
    StopScript {
        script_id: String,
    },
    ReadLogs {
        host: String,
    },
    LogMessage {
        text: String,
        level: String,
    },
    ReadFile {
        adapter: String,
        file_name: String,
        binary: bool,
    },
    WriteFile {
        adapter: String,
        file_name: String,
        data64: String,
        binary: bool,
    },
    ExtendObject {
        id: String,
        obj: Value,
    },
    /// Create or replace a whole object
    SetObject {
        id: String,
        obj: Value,
    },
    DeleteObject {
        id: String,
    },
}

impl Operation {
    pub fn kind(&self) -> OperationKind {
        match self {
            Self::GetState { .. } => OperationKind::GetState,
            Self::SetState { .. } => OperationKind::SetState,
            Self::GetStates { .. } => OperationKind::GetStates,
            Self::GetObject { .. } => OperationKind::GetObject,
            Self::GetObjects { .. } => OperationKind::GetObjects,
            Self::SendTo { .. } => OperationKind::SendTo,
            Self::StartScript { .. } => OperationKind::StartScript,
            Self::StopScript { .. } => OperationKind::StopScript,
            Self::ReadLogs { .. } => OperationKind::ReadLogs,
            Self::LogMessage { .. } => OperationKind::LogMessage,
            Self::ReadFile { .. } => OperationKind::ReadFile,
            Self::WriteFile { .. } => OperationKind::WriteFile,
            Self::ExtendObject { .. } => OperationKind::ExtendObject,
            Self::SetObject { .. } => OperationKind::SetObject,
            Self::DeleteObject { .. } => OperationKind::DeleteObject,
        }
    }

    /// Identifier the operation acts on, used in error messages
    pub fn target(&self) -> String {
        match self {
            Self::GetState { id }
            | Self::SetState { id, .. }
            | Self::GetObject { id }
            | Self::ExtendObject { id, .. }
            | Self::SetObject { id, .. }
            | Self::DeleteObject { id } => id.clone(),
            Self::GetStates { pattern } | Self::GetObjects { pattern, .. } => pattern.clone(),
            Self::SendTo { instance, .. } => instance.clone(),
            Self::StartScript { script_id } | Self::StopScript { script_id } => script_id.clone(),
            Self::ReadLogs { host } => host.clone(),
            Self::LogMessage { level, .. } => level.clone(),
            Self::ReadFile {
                adapter, file_name, ..
            }
            | Self::WriteFile {
                adapter, file_name, ..
            } => format!("{adapter}/{file_name}"),
        }
    }

    /// Lifecycle action a failed `sendTo` may be reinterpreted as
    pub fn lifecycle_action(&self) -> Option<(String, AdapterLifecycleAction)> {
        match self {
            Self::SendTo {
                instance, command, ..
            } => AdapterLifecycleAction::from_command(command).map(|a| (instance.clone(), a)),
            _ => None,
        }
    }

    /// The resource-addressed (or only) call
    pub fn primary_call(&self) -> RestCall {
        match self {
            Self::GetState { id } => RestCall::resource("state", id),
            Self::SetState { id, value, ack } => RestCall::resource("state", id)
                .with_query("value", json!({ "val": value, "ack": ack }).to_string()),
            Self::GetStates { pattern } => RestCall::get("/v1/states").with_query("filter", pattern),
            Self::GetObject { id } => RestCall::resource("object", id),
            Self::GetObjects {
                pattern,
                object_type,
            } => {
                let call = RestCall::get("/v1/objects").with_query("filter", pattern);
                match object_type {
                    Some(object_type) => call.with_query("type", object_type),
                    None => call,
                }
            }
            Self::SendTo {
                instance,
                command,
                message,
            } => send_to(instance, command, message.clone().unwrap_or(Value::Null)),
            Self::StartScript { script_id } => send_to(
                SCRIPT_ENGINE_INSTANCE,
                "startScript",
                json!({ "scriptId": script_id }),
            ),
            Self::StopScript { script_id } => send_to(
                SCRIPT_ENGINE_INSTANCE,
                "stopScript",
                json!({ "scriptId": script_id }),
            ),
            Self::ReadLogs { host } => RestCall::command_get("readLogs").with_query("host", host),
            Self::LogMessage { text, level } => RestCall::command_get("log")
                .with_query("text", text)
                .with_query("level", level),
            Self::ReadFile {
                adapter,
                file_name,
                binary,
            } => RestCall::command_get("readFile")
                .with_query("adapter", adapter)
                .with_query("fileName", file_name)
                .with_query("binary", binary.to_string()),
            Self::WriteFile {
                adapter,
                file_name,
                data64,
                binary,
            } => RestCall::command_post(
                "writeFile64",
                json!({
                    "adapter": adapter,
                    "fileName": file_name,
                    "data64": data64,
                    "options": { "binary": binary },
                }),
            ),
            Self::ExtendObject { id, obj } => {
                RestCall::command_post("extendObject", json!({ "id": id, "obj": obj }))
            }
            Self::SetObject { id, obj } => {
                RestCall::command_post("setObject", json!({ "id": id, "obj": obj }))
            }
            Self::DeleteObject { id } => RestCall::command_post("delObject", json!({ "id": id })),
        }
    }

    /// The command-style secondary call, if this operation has one
    pub fn fallback_call(&self) -> Option<RestCall> {
        let call = match self {
            Self::GetState { id } => RestCall::command_get("getState").with_query("id", id),
            Self::SetState { id, value, ack } => RestCall::command_post(
                "setState",
                json!({ "id": id, "state": { "val": value, "ack": ack } }),
            ),
            Self::GetStates { pattern } => {
                RestCall::command_get("getStates").with_query("pattern", pattern)
            }
            Self::GetObject { id } => RestCall::command_get("getObject").with_query("id", id),
            Self::GetObjects { pattern, .. } => {
                RestCall::command_get("getObjects").with_query("list", pattern)
            }
            _ => return None,
        };
        Some(call)
    }
}

fn send_to(instance: &str, command: &str, message: Value) -> RestCall {
    RestCall::command_post(
        "sendTo",
        json!({
            "adapterInstance": instance,
            "command": command,
            "message": message,
        }),
    )
}
