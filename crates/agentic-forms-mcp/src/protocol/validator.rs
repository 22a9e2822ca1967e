//! Envelope checks applied before dispatch.

use serde_json::Value;

use crate::types::{JsonRpcRequest, McpError, McpResult, JSONRPC_VERSION};

pub fn validate_request(request: &JsonRpcRequest) -> McpResult<()> {
    if request.jsonrpc != JSONRPC_VERSION {
        return Err(McpError::InvalidRequest(format!(
            "jsonrpc must be \"{JSONRPC_VERSION}\", got \"{}\"",
            request.jsonrpc
        )));
    }

    match request.method.as_str() {
        "" => return Err(McpError::InvalidRequest("empty method".to_string())),
        m if m.starts_with("rpc.") => {
            return Err(McpError::InvalidRequest(format!("reserved method: {m}")))
        }
        _ => {}
    }

    // Positional params are legal JSON-RPC but no method here takes them.
    match &request.params {
        None | Some(Value::Object(_)) => Ok(()),
        Some(other) => Err(McpError::InvalidParams(format!(
            "params must be an object, got {}",
            kind(other)
        ))),
    }
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::RequestId;
    use serde_json::json;

    fn request(jsonrpc: &str, method: &str, params: Option<Value>) -> JsonRpcRequest {
        JsonRpcRequest {
            jsonrpc: jsonrpc.to_string(),
            id: RequestId::Number(1),
            method: method.to_string(),
            params,
        }
    }

    #[test]
    fn test_envelope_rules() {
        assert!(validate_request(&request("2.0", "ping", None)).is_ok());
        assert!(validate_request(&request("2.0", "tools/list", Some(json!({})))).is_ok());

        assert!(matches!(
            validate_request(&request("1.0", "ping", None)),
            Err(McpError::InvalidRequest(_))
        ));
        assert!(matches!(
            validate_request(&request("2.0", "", None)),
            Err(McpError::InvalidRequest(_))
        ));
        assert!(matches!(
            validate_request(&request("2.0", "rpc.discover", None)),
            Err(McpError::InvalidRequest(_))
        ));
        assert!(matches!(
            validate_request(&request("2.0", "tools/call", Some(json!(["page_load"])))),
            Err(McpError::InvalidParams(_))
        ));
    }
}
