//! `form_schema` tool. Return the most recent extracted schema.

use serde_json::{json, Value};

use crate::session::SharedSession;
use crate::types::{McpResult, ToolCallResult, ToolDefinition};

pub fn definition() -> ToolDefinition {
    ToolDefinition::new(
        "form_schema",
        "Latest successfully extracted form schema",
        json!({
            "type": "object",
            "properties": {}
        }),
    )
}

pub async fn execute(_args: Value, session: &SharedSession) -> McpResult<ToolCallResult> {
    let session = session.lock().await;
    match session.latest() {
        Some(schema) => Ok(ToolCallResult::json(schema)),
        None => Ok(ToolCallResult::error("No form schema has been extracted yet")),
    }
}
