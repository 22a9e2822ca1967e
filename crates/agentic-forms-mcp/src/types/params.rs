//! Typed `params` for the requests the server understands.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use super::error::{McpError, McpResult};

/// Decode request params, treating an absent object as an empty one.
pub fn parse_params<T: DeserializeOwned>(params: Option<Value>) -> McpResult<T> {
    let value = params.unwrap_or_else(|| Value::Object(Map::new()));
    serde_json::from_value(value).map_err(|e| McpError::InvalidParams(e.to_string()))
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientInfo {
    pub name: String,
    #[serde(default)]
    pub version: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitializeParams {
    pub protocol_version: String,
    /// Kept opaque; the server does not act on client capabilities.
    #[serde(default)]
    pub capabilities: Value,
    pub client_info: ClientInfo,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCallParams {
    pub name: String,
    #[serde(default = "empty_object", deserialize_with = "object_or_null")]
    pub arguments: Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceReadParams {
    pub uri: String,
}

fn empty_object() -> Value {
    Value::Object(Map::new())
}

fn object_or_null<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Value, D::Error> {
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.unwrap_or_else(empty_object))
}
