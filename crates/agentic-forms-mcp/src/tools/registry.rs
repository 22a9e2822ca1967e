//! Tool registration and dispatch.

use serde_json::Value;

use crate::session::SharedSession;
use crate::types::{McpError, McpResult, ToolCallResult, ToolDefinition};

use super::{
    form_extract, form_schema, observer_control, page_load, page_mutate, page_visibility,
};

pub struct ToolRegistry;

impl ToolRegistry {
    pub fn list_tools() -> Vec<ToolDefinition> {
        vec![
            page_load::definition(),
            page_mutate::definition(),
            page_visibility::definition(),
            observer_control::definition(),
            form_extract::definition(),
            form_schema::definition(),
        ]
    }

    pub async fn call(
        name: &str,
        args: Value,
        session: &SharedSession,
    ) -> McpResult<ToolCallResult> {
        match name {
            "page_load" => page_load::execute(args, session).await,
            "page_mutate" => page_mutate::execute(args, session).await,
            "page_visibility" => page_visibility::execute(args, session).await,
            "observer_control" => observer_control::execute(args, session).await,
            "form_extract" => form_extract::execute(args, session).await,
            "form_schema" => form_schema::execute(args, session).await,
            _ => Err(McpError::ToolNotFound(name.to_string())),
        }
    }
}
