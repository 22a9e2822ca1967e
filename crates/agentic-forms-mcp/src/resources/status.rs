//! Resource: forms://status

use serde_json::json;

use crate::session::SharedSession;
use crate::types::{McpResult, ReadResourceResult};

use super::STATUS_URI;

pub async fn read_status(session: &SharedSession) -> McpResult<ReadResourceResult> {
    let (url, page_loads, loaded_at, has_schema, manager) = {
        let session = session.lock().await;
        (
            session.url(),
            session.page_loads(),
            session.loaded_at(),
            session.latest().is_some(),
            session.manager(),
        )
    };
    let status = manager.status().await?;

    let body = json!({
        "url": url,
        "page_loads": page_loads,
        "loaded_at": loaded_at.map(|t| t.to_rfc3339()),
        "has_schema": has_schema,
        "manager": status,
    });

    ReadResourceResult::json(STATUS_URI, &body)
}
