//! Newline-delimited JSON framing.

use crate::types::{JsonRpcMessage, McpError, McpResult};

/// Parse one line as a JSON-RPC message.
pub fn parse_message(line: &str) -> McpResult<JsonRpcMessage> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return Err(McpError::ParseError("Empty message".to_string()));
    }

    serde_json::from_str(trimmed).map_err(|e| McpError::ParseError(e.to_string()))
}

/// Serialize a value to one JSON line with a trailing newline.
pub fn frame_message(value: &serde_json::Value) -> McpResult<String> {
    let mut json = serde_json::to_string(value).map_err(McpError::Json)?;
    json.push('\n');
    Ok(json)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_is_single_line() {
        let framed = frame_message(&serde_json::json!({"a": "line\nbreak"})).unwrap();
        assert_eq!(framed.matches('\n').count(), 1);
        assert!(framed.ends_with('\n'));
    }

    #[test]
    fn test_parse_rejects_blank_and_garbage() {
        assert!(matches!(parse_message("   "), Err(McpError::ParseError(_))));
        assert!(matches!(parse_message("{not json"), Err(McpError::ParseError(_))));
        assert!(parse_message(r#"{"jsonrpc":"2.0","id":1,"method":"ping"}"#).is_ok());
    }
}
