//! Server-to-client notifications.

use agentic_forms::ExtractionMessage;
use serde_json::json;

use super::message::JsonRpcNotification;

pub const FORMS_EXTRACTED: &str = "notifications/forms/extracted";
pub const FORMS_FAILED: &str = "notifications/forms/failed";

/// Wrap an extraction result as a JSON-RPC notification.
pub fn extraction_notification(message: &ExtractionMessage) -> JsonRpcNotification {
    match message {
        ExtractionMessage::FormsExtracted { schema, trigger } => JsonRpcNotification::new(
            FORMS_EXTRACTED,
            Some(json!({
                "trigger": trigger,
                "field_count": schema.fields.len(),
                "schema": schema,
            })),
        ),
        ExtractionMessage::ExtractionFailed { error, trigger } => JsonRpcNotification::new(
            FORMS_FAILED,
            Some(json!({
                "trigger": trigger,
                "error": error,
            })),
        ),
    }
}
