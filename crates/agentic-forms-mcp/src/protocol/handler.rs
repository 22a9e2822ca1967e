//! Request dispatcher: receives JSON-RPC messages and routes them to tools
//! and resources.

use std::rc::Rc;

use serde::Serialize;
use serde_json::{json, Value};
use tokio::sync::{mpsc, Mutex};

use agentic_forms::ExtractionConfig;

use crate::resources::ResourceRegistry;
use crate::session::{spawn_message_forwarder, PageSession, SharedSession};
use crate::tools::ToolRegistry;
use crate::types::*;

use super::negotiation::NegotiatedCapabilities;
use super::validator::validate_request;

pub struct ProtocolHandler {
    session: SharedSession,
    capabilities: Mutex<NegotiatedCapabilities>,
}

impl ProtocolHandler {
    pub fn new(session: SharedSession) -> Self {
        Self {
            session,
            capabilities: Mutex::new(NegotiatedCapabilities::default()),
        }
    }

    /// Create a session and its notification stream. Must be called inside
    /// a `LocalSet`.
    pub fn start(config: ExtractionConfig) -> (Self, mpsc::UnboundedReceiver<JsonRpcNotification>) {
        let (session, messages) = PageSession::start(config);
        let session = Rc::new(Mutex::new(session));
        let notifications = spawn_message_forwarder(Rc::clone(&session), messages);
        (Self::new(session), notifications)
    }

    pub fn session(&self) -> &SharedSession {
        &self.session
    }

    /// Returns the response to write back, if the message expects one.
    pub async fn handle_message(&self, msg: JsonRpcMessage) -> Option<Value> {
        match msg {
            JsonRpcMessage::Request(request) => Some(self.handle_request(request).await),
            JsonRpcMessage::Notification(notification) => {
                self.handle_notification(notification).await;
                None
            }
            JsonRpcMessage::Response(_) | JsonRpcMessage::Error(_) => {
                tracing::warn!("Ignoring response from client; the server sends no requests");
                None
            }
        }
    }

    async fn handle_request(&self, request: JsonRpcRequest) -> Value {
        let id = request.id.clone();
        let outcome = match validate_request(&request) {
            Ok(()) => self.dispatch(request).await,
            Err(e) => Err(e),
        };

        let envelope = match outcome {
            Ok(result) => serde_json::to_value(JsonRpcResponse::new(id, result)),
            Err(e) => {
                tracing::debug!(code = e.code(), "Request failed: {e}");
                serde_json::to_value(e.to_json_rpc_error(id))
            }
        };
        envelope.unwrap_or_default()
    }

    async fn dispatch(&self, request: JsonRpcRequest) -> McpResult<Value> {
        let params = request.params;
        match request.method.as_str() {
            "initialize" => {
                let params: InitializeParams = parse_params(params)?;
                let scheduler = self.session.lock().await.config().scheduler.clone();
                let result = self.capabilities.lock().await.negotiate(params, &scheduler);
                to_result(result)
            }
            "shutdown" => {
                tracing::info!("Shutdown requested");
                let manager = self.session.lock().await.manager();
                manager.stop_observing()?;
                Ok(json!({}))
            }
            "ping" => Ok(json!({})),

            "tools/list" => to_result(ToolListResult {
                tools: ToolRegistry::list_tools(),
                next_cursor: None,
            }),
            "tools/call" => {
                let call: ToolCallParams = parse_params(params)?;
                tracing::debug!(tool = %call.name, "Tool call");
                to_result(ToolRegistry::call(&call.name, call.arguments, &self.session).await?)
            }

            "resources/list" => to_result(ResourceListResult {
                resources: ResourceRegistry::list_resources(),
                next_cursor: None,
            }),
            "resources/templates/list" => Ok(json!({ "resourceTemplates": [] })),
            "resources/read" => {
                let read: ResourceReadParams = parse_params(params)?;
                to_result(ResourceRegistry::read(&read.uri, &self.session).await?)
            }

            other => Err(McpError::MethodNotFound(other.to_string())),
        }
    }

    async fn handle_notification(&self, notification: JsonRpcNotification) {
        match notification.method.as_str() {
            "initialized" | "notifications/initialized" => {
                self.capabilities.lock().await.mark_initialized();
            }
            "notifications/cancelled" | "$/cancelRequest" => {
                // Requests complete synchronously relative to the client, nothing to cancel.
                tracing::debug!("Cancellation notification ignored");
            }
            other => tracing::debug!("Unknown notification: {other}"),
        }
    }
}

fn to_result(value: impl Serialize) -> McpResult<Value> {
    serde_json::to_value(value).map_err(|e| McpError::InternalError(e.to_string()))
}
