//! `page_mutate` tool. Replace the page snapshot and report a mutation batch.

use serde::Deserialize;
use serde_json::{json, Value};

use agentic_forms::{manager::is_relevant, MutationRecord};

use crate::session::{PageSnapshot, SharedSession};
use crate::types::{parse_params, McpResult, ToolCallResult, ToolDefinition};

#[derive(Debug, Deserialize)]
struct MutateParams {
    #[serde(flatten)]
    snapshot: PageSnapshot,
    #[serde(default)]
    records: Option<Vec<MutationRecord>>,
}

pub fn definition() -> ToolDefinition {
    ToolDefinition::new(
        "page_mutate",
        "Swap in an updated snapshot of the current page and deliver a mutation batch. \
        When records are omitted they are derived from the controls that changed.",
        json!({
            "type": "object",
            "properties": {
                "html": { "type": "string" },
                "url": { "type": "string" },
                "viewport": { "type": "object" },
                "rects": { "type": "array", "items": { "type": "object" } },
                "records": {
                    "type": "array",
                    "items": {
                        "type": "object",
                        "properties": {
                            "kind": { "type": "string", "enum": ["child_list", "attributes", "character_data"] },
                            "added_nodes": { "type": "array", "items": { "type": "object" } },
                            "removed_nodes": { "type": "array", "items": { "type": "object" } }
                        }
                    }
                }
            },
            "required": ["html"]
        }),
    )
}

pub async fn execute(args: Value, session: &SharedSession) -> McpResult<ToolCallResult> {
    let params: MutateParams = parse_params(Some(args))?;

    let (records, bulk_limit, manager) = {
        let mut session = session.lock().await;
        let records = session.mutate_page(params.snapshot, params.records)?;
        let bulk_limit = session.config().scheduler.bulk_mutation_limit;
        (records, bulk_limit, session.manager())
    };

    let count = records.len();
    let relevant = is_relevant(&records, bulk_limit);
    manager.observe_mutations(records)?;
    let status = manager.status().await?;

    Ok(ToolCallResult::json(&json!({
        "records": count,
        "relevant": relevant,
        "extraction_scheduled": status.debounce_remaining_ms.is_some(),
    })))
}
