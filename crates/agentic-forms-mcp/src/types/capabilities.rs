//! Server identity and the `initialize` result.

use serde::{Deserialize, Serialize};

use agentic_forms::SchedulerConfig;

pub const MCP_VERSION: &str = "2024-11-05";
pub const SERVER_NAME: &str = "agentic-forms-mcp";
pub const SERVER_VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerInfo {
    pub name: String,
    pub version: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListChanged {
    pub list_changed: bool,
}

/// Tools and resources are static, so neither advertises list changes.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServerCapabilities {
    pub tools: ListChanged,
    pub resources: ListChanged,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitializeResult {
    pub protocol_version: String,
    pub capabilities: ServerCapabilities,
    pub server_info: ServerInfo,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instructions: Option<String>,
}

impl InitializeResult {
    /// Handshake reply; the instructions quote the active timing so the
    /// client knows how long a mutation-triggered schema can take.
    pub fn for_scheduler(scheduler: &SchedulerConfig) -> Self {
        let instructions = format!(
            "AgenticForms extracts a schema of the fillable fields on a page. \
             Load a page snapshot with page_load, report changes with page_mutate, \
             and read results with form_extract or form_schema. \
             Mutation-triggered extractions run {}ms after the last relevant change \
             (at most {}ms after the first) and arrive as notifications/forms/* messages. \
             Passes start at most once every {}ms.",
            scheduler.debounce_ms, scheduler.max_delay_ms, scheduler.min_interval_ms
        );

        Self {
            protocol_version: MCP_VERSION.to_string(),
            capabilities: ServerCapabilities::default(),
            server_info: ServerInfo {
                name: SERVER_NAME.to_string(),
                version: SERVER_VERSION.to_string(),
            },
            instructions: Some(instructions),
        }
    }
}
