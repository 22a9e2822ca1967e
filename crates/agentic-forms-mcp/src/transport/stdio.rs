//! Stdio transport: JSON-RPC requests on stdin, responses and
//! notifications on stdout.

use serde_json::Value;
use tokio::io::{AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;

use crate::protocol::ProtocolHandler;
use crate::types::{JsonRpcError, JsonRpcNotification, McpError, McpResult};

use super::framing;

pub struct StdioTransport {
    handler: ProtocolHandler,
    notifications: Option<mpsc::UnboundedReceiver<JsonRpcNotification>>,
}

impl StdioTransport {
    pub fn new(handler: ProtocolHandler) -> Self {
        Self {
            handler,
            notifications: None,
        }
    }

    /// Also forward server-initiated notifications to stdout.
    pub fn with_notifications(
        mut self,
        notifications: mpsc::UnboundedReceiver<JsonRpcNotification>,
    ) -> Self {
        self.notifications = Some(notifications);
        self
    }

    /// Run until stdin closes.
    pub async fn run(mut self) -> McpResult<()> {
        let stdin = tokio::io::stdin();
        let mut stdout = tokio::io::stdout();
        let mut lines = BufReader::new(stdin).lines();
        let mut notifications = self.notifications.take();

        tracing::info!("Stdio transport started");

        loop {
            tokio::select! {
                read = lines.next_line() => {
                    let Some(line) = read.map_err(McpError::Io)? else {
                        tracing::info!("EOF on stdin, shutting down");
                        break;
                    };
                    let trimmed = line.trim();
                    if trimmed.is_empty() {
                        continue;
                    }
                    if let Some(response) = self.respond(trimmed).await? {
                        write_frame(&mut stdout, &response).await?;
                    }
                }
                Some(notification) = next_notification(&mut notifications) => {
                    let value = serde_json::to_value(notification)
                        .map_err(|e| McpError::InternalError(e.to_string()))?;
                    write_frame(&mut stdout, &value).await?;
                }
            }
        }

        Ok(())
    }

    async fn respond(&self, line: &str) -> McpResult<Option<Value>> {
        match framing::parse_message(line) {
            Ok(msg) => Ok(self.handler.handle_message(msg).await),
            Err(e) => {
                tracing::warn!("Parse error: {e}");
                let error_response = JsonRpcError::without_id(e.code(), e.to_string());
                let value = serde_json::to_value(error_response)
                    .map_err(|e| McpError::InternalError(e.to_string()))?;
                Ok(Some(value))
            }
        }
    }
}

async fn next_notification(
    notifications: &mut Option<mpsc::UnboundedReceiver<JsonRpcNotification>>,
) -> Option<JsonRpcNotification> {
    match notifications {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}

async fn write_frame<W: AsyncWrite + Unpin>(out: &mut W, value: &Value) -> McpResult<()> {
    let framed = framing::frame_message(value)?;
    out.write_all(framed.as_bytes())
        .await
        .map_err(McpError::Io)?;
    out.flush().await.map_err(McpError::Io)
}
