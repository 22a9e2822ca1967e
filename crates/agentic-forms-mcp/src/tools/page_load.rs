//! `page_load` tool. Replace the current page with a new snapshot.

use serde_json::{json, Value};

use crate::session::{PageSnapshot, SharedSession};
use crate::types::{parse_params, McpResult, ToolCallResult, ToolDefinition};

pub fn definition() -> ToolDefinition {
    ToolDefinition::new(
        "page_load",
        "Load a page snapshot. Every form control in it counts as newly added, \
        so a mutation-triggered extraction follows after the debounce delay.",
        json!({
            "type": "object",
            "properties": {
                "html": { "type": "string", "description": "Full page markup" },
                "url": { "type": "string", "description": "Page URL reported in schemas" },
                "viewport": {
                    "type": "object",
                    "properties": {
                        "width": { "type": "number" },
                        "height": { "type": "number" }
                    }
                },
                "rects": {
                    "type": "array",
                    "description": "Layout boxes applied to every element matching each selector",
                    "items": {
                        "type": "object",
                        "properties": {
                            "selector": { "type": "string" },
                            "x": { "type": "number" },
                            "y": { "type": "number" },
                            "width": { "type": "number" },
                            "height": { "type": "number" }
                        },
                        "required": ["selector", "x", "y", "width", "height"]
                    }
                }
            },
            "required": ["html"]
        }),
    )
}

pub async fn execute(args: Value, session: &SharedSession) -> McpResult<ToolCallResult> {
    let snapshot: PageSnapshot = parse_params(Some(args))?;

    let (record, url, manager) = {
        let mut session = session.lock().await;
        let record = session.load_page(snapshot)?;
        (record, session.url(), session.manager())
    };

    let controls = record.added_nodes.len();
    manager.observe_mutations(vec![record])?;
    let status = manager.status().await?;

    Ok(ToolCallResult::json(&json!({
        "url": url,
        "controls": controls,
        "extraction_scheduled": status.debounce_remaining_ms.is_some(),
    })))
}
