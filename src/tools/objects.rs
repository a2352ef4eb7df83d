//! Object tools: read, create, update and delete object definitions

use crate::error::{IoBrokerError, Result};
use crate::router::Operation;
use crate::tools::{
    entry_count, error_result, parse_args, pretty, require_non_empty, text_result, tool, ToolContext,
};
use pulseengine_mcp_protocol::{CallToolResult, Tool};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

#[derive(Debug, Deserialize, JsonSchema)]
pub struct GetObjectRequest {
    #[schemars(description = "Object ID, e.g. 'system.adapter.admin.0'")]
    pub id: String,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct GetObjectsRequest {
    #[serde(default)]
    #[schemars(description = "Pattern to filter objects, e.g. 'hm-rpc.0.*'. Defaults to '*'")]
    pub pattern: Option<String>,
    #[serde(default, rename = "type")]
    #[schemars(description = "Object type filter: state, channel, device, adapter, instance")]
    pub object_type: Option<String>,
}

/// Kinds of object `createObject` may create
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum CreatableType {
    State,
    Channel,
    Device,
    Folder,
}

impl CreatableType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::State => "state",
            Self::Channel => "channel",
            Self::Device => "device",
            Self::Folder => "folder",
        }
    }
}

/// `common` section of a new object
#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct CommonProperties {
    #[schemars(description = "Object name")]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schemars(description = "Object role, e.g. 'switch' or 'value.temperature'")]
    pub role: Option<String>,
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    #[schemars(description = "Value type for states: boolean, number, string, object")]
    pub value_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub read: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub write: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct CreateObjectRequest {
    #[schemars(description = "Object ID, e.g. '0_userdata.0.myLamp'")]
    pub id: String,
    #[serde(rename = "type")]
    #[schemars(description = "Object type: state, channel, device or folder")]
    pub object_type: CreatableType,
    #[schemars(description = "Common object properties")]
    pub common: CommonProperties,
    #[serde(default)]
    #[schemars(description = "Native object properties")]
    pub native: Option<Map<String, Value>>,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct UpdateObjectRequest {
    #[schemars(description = "Object ID")]
    pub id: String,
    #[serde(default)]
    #[schemars(description = "Common properties to merge into the object")]
    pub common: Option<Map<String, Value>>,
    #[serde(default)]
    #[schemars(description = "Native properties to merge into the object")]
    pub native: Option<Map<String, Value>>,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct DeleteObjectRequest {
    #[schemars(description = "Object ID to delete")]
    pub id: String,
}

pub fn definitions() -> Vec<Tool> {
    vec![
        tool::<GetObjectRequest>("getObject", "Get an ioBroker object definition"),
        tool::<GetObjectsRequest>(
            "getObjects",
            "Get multiple ioBroker objects matching a pattern and optional type",
        ),
        tool::<CreateObjectRequest>("createObject", "Create a new ioBroker object"),
        tool::<UpdateObjectRequest>(
            "updateObject",
            "Merge common and native properties into an existing ioBroker object",
        ),
        tool::<DeleteObjectRequest>("deleteObject", "Delete an ioBroker object"),
    ]
}

pub async fn get_object(ctx: &ToolContext, arguments: Value) -> Result<CallToolResult> {
    let request: GetObjectRequest = parse_args(arguments)?;
    require_non_empty("id", &request.id)?;

    let object = ctx
        .router
        .execute(&Operation::GetObject { id: request.id })
        .await?;
    Ok(text_result(pretty(&object)))
}

pub async fn get_objects(ctx: &ToolContext, arguments: Value) -> Result<CallToolResult> {
    let request: GetObjectsRequest = parse_args(arguments)?;
    let pattern = request
        .pattern
        .filter(|p| !p.trim().is_empty())
        .unwrap_or_else(|| "*".to_string());
    let object_type = request.object_type.filter(|t| !t.trim().is_empty());

    let objects = ctx
        .router
        .execute(&Operation::GetObjects {
            pattern: pattern.clone(),
            object_type: object_type.clone(),
        })
        .await?;

    let type_suffix = object_type
        .map(|t| format!(" of type \"{t}\""))
        .unwrap_or_default();
    Ok(text_result(format!(
        "Found {} objects matching pattern \"{}\"{}:\n{}",
        entry_count(&objects),
        pattern,
        type_suffix,
        pretty(&objects)
    )))
}

pub async fn create_object(ctx: &ToolContext, arguments: Value) -> Result<CallToolResult> {
    let request: CreateObjectRequest = parse_args(arguments)?;
    require_non_empty("id", &request.id)?;
    require_non_empty("common.name", &request.common.name)?;

    let obj = json!({
        "_id": request.id,
        "type": request.object_type,
        "common": request.common,
        "native": request.native.unwrap_or_default(),
    });
    ctx.router
        .execute(&Operation::SetObject {
            id: request.id.clone(),
            obj,
        })
        .await?;

    Ok(text_result(format!(
        "Successfully created object {} of type {}",
        request.id,
        request.object_type.as_str()
    )))
}

/// Merges through `extendObject` so concurrent edits of other keys survive
pub async fn update_object(ctx: &ToolContext, arguments: Value) -> Result<CallToolResult> {
    let request: UpdateObjectRequest = parse_args(arguments)?;
    require_non_empty("id", &request.id)?;
    if request.common.is_none() && request.native.is_none() {
        return Err(IoBrokerError::invalid_parameters(
            "at least one of common or native is required",
        ));
    }

    let existing = ctx
        .router
        .execute_optional(&Operation::GetObject {
            id: request.id.clone(),
        })
        .await?;
    if existing.is_none() {
        return Ok(error_result(format!("Object {} not found", request.id)));
    }

    let mut obj = Map::new();
    if let Some(common) = request.common {
        obj.insert("common".to_string(), Value::Object(common));
    }
    if let Some(native) = request.native {
        obj.insert("native".to_string(), Value::Object(native));
    }
    ctx.router
        .execute(&Operation::ExtendObject {
            id: request.id.clone(),
            obj: Value::Object(obj),
        })
        .await?;

    Ok(text_result(format!("Successfully updated object {}", request.id)))
}

pub async fn delete_object(ctx: &ToolContext, arguments: Value) -> Result<CallToolResult> {
    let request: DeleteObjectRequest = parse_args(arguments)?;
    require_non_empty("id", &request.id)?;

    ctx.router
        .execute(&Operation::DeleteObject {
            id: request.id.clone(),
        })
        .await?;
    Ok(text_result(format!("Successfully deleted object {}", request.id)))
}
