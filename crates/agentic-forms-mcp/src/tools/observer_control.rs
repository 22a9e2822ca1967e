//! `observer_control` tool. Start or stop mutation observation.

use serde::Deserialize;
use serde_json::{json, Value};

use crate::session::SharedSession;
use crate::types::{parse_params, McpResult, ToolCallResult, ToolDefinition};

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "lowercase")]
enum Action {
    Start,
    Stop,
}

#[derive(Debug, Deserialize)]
struct ControlParams {
    action: Action,
}

pub fn definition() -> ToolDefinition {
    ToolDefinition::new(
        "observer_control",
        "Start or stop reacting to page mutations",
        json!({
            "type": "object",
            "properties": {
                "action": { "type": "string", "enum": ["start", "stop"] }
            },
            "required": ["action"]
        }),
    )
}

pub async fn execute(args: Value, session: &SharedSession) -> McpResult<ToolCallResult> {
    let params: ControlParams = parse_params(Some(args))?;

    let manager = session.lock().await.manager();
    match params.action {
        Action::Start => manager.start_observing()?,
        Action::Stop => manager.stop_observing()?,
    }
    let status = manager.status().await?;

    Ok(ToolCallResult::json(&json!({
        "observing": status.observing,
    })))
}
