//! Resource registration and dispatch.

use crate::session::SharedSession;
use crate::types::{McpError, McpResult, ReadResourceResult, ResourceDefinition};

use super::{messages, schema, status, MESSAGES_URI, SCHEMA_LATEST_URI, STATUS_URI};

pub struct ResourceRegistry;

impl ResourceRegistry {
    pub fn list_resources() -> Vec<ResourceDefinition> {
        vec![
            ResourceDefinition::json(
                SCHEMA_LATEST_URI,
                "Latest form schema",
                "Most recent successful extraction of the current page",
            ),
            ResourceDefinition::json(
                MESSAGES_URI,
                "Extraction messages",
                "Recent extraction results and failures",
            ),
            ResourceDefinition::json(STATUS_URI, "Extraction status", "Page and scheduler state"),
        ]
    }

    pub async fn read(uri: &str, session: &SharedSession) -> McpResult<ReadResourceResult> {
        match uri {
            SCHEMA_LATEST_URI => schema::read_latest(session).await,
            MESSAGES_URI => messages::read_messages(session).await,
            STATUS_URI => status::read_status(session).await,
            _ => Err(McpError::ResourceNotFound(uri.to_string())),
        }
    }
}
