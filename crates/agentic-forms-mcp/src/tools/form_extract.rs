//! `form_extract` tool. Run an extraction pass now.

use serde_json::{json, Value};

use crate::session::SharedSession;
use crate::types::{McpResult, ToolCallResult, ToolDefinition};

pub fn definition() -> ToolDefinition {
    ToolDefinition::new(
        "form_extract",
        "Extract the form schema of the current page immediately. \
        Returns {\"skipped\": true} when a pass is running or one started \
        less than the minimum interval ago.",
        json!({
            "type": "object",
            "properties": {}
        }),
    )
}

pub async fn execute(_args: Value, session: &SharedSession) -> McpResult<ToolCallResult> {
    let manager = session.lock().await.manager();

    match manager.extract_now().await {
        Ok(Some(schema)) => {
            session.lock().await.set_latest(schema.clone());
            Ok(ToolCallResult::json(&schema))
        }
        Ok(None) => Ok(ToolCallResult::json(&json!({
            "skipped": true,
            "reason": "extraction in progress or rate limited",
        }))),
        Err(e) => Ok(ToolCallResult::error(format!("Extraction failed: {e}"))),
    }
}
