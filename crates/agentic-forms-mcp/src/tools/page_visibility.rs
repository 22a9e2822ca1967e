//! `page_visibility` tool. Report that the page was hidden or shown.

use serde::Deserialize;
use serde_json::{json, Value};

use crate::session::SharedSession;
use crate::types::{parse_params, McpResult, ToolCallResult, ToolDefinition};

#[derive(Debug, Deserialize)]
struct VisibilityParams {
    visible: bool,
}

pub fn definition() -> ToolDefinition {
    ToolDefinition::new(
        "page_visibility",
        "Hidden pages stop observing mutations and drop pending extractions; \
        visible pages resume observing",
        json!({
            "type": "object",
            "properties": {
                "visible": { "type": "boolean" }
            },
            "required": ["visible"]
        }),
    )
}

pub async fn execute(args: Value, session: &SharedSession) -> McpResult<ToolCallResult> {
    let params: VisibilityParams = parse_params(Some(args))?;

    let manager = session.lock().await.manager();
    manager.set_visibility(params.visible)?;
    let status = manager.status().await?;

    Ok(ToolCallResult::json(&json!({
        "visible": params.visible,
        "observing": status.observing,
    })))
}
