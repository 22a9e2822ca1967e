//! Resource: forms://schema/latest

use crate::session::SharedSession;
use crate::types::{McpError, McpResult, ReadResourceResult};

use super::SCHEMA_LATEST_URI;

pub async fn read_latest(session: &SharedSession) -> McpResult<ReadResourceResult> {
    let session = session.lock().await;
    let schema = session.latest().ok_or_else(|| {
        McpError::ResourceNotFound(format!("{SCHEMA_LATEST_URI} (nothing extracted yet)"))
    })?;

    ReadResourceResult::json(SCHEMA_LATEST_URI, schema)
}
