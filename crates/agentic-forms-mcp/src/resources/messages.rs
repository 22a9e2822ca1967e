//! Resource: forms://messages

use serde_json::json;

use agentic_forms::ExtractionMessage;

use crate::session::SharedSession;
use crate::types::{McpResult, ReadResourceResult};

use super::MESSAGES_URI;

pub async fn read_messages(session: &SharedSession) -> McpResult<ReadResourceResult> {
    let session = session.lock().await;
    let messages: Vec<&ExtractionMessage> = session.messages().collect();

    let body = json!({
        "count": messages.len(),
        "messages": messages,
    });

    ReadResourceResult::json(MESSAGES_URI, &body)
}
