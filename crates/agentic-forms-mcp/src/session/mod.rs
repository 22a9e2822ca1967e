//! Page session: the current document snapshot and its extraction manager.

pub mod page;

pub use page::{PageSession, PageSnapshot, RectOverride, SharedSession};

use tokio::sync::mpsc;

use agentic_forms::ExtractionMessage;

use crate::types::{extraction_notification, JsonRpcNotification};

/// Drain extraction results into the session log and turn each into a
/// client notification. Must run inside a `LocalSet`.
pub fn spawn_message_forwarder(
    session: SharedSession,
    mut messages: mpsc::UnboundedReceiver<ExtractionMessage>,
) -> mpsc::UnboundedReceiver<JsonRpcNotification> {
    let (notify, notifications) = mpsc::unbounded_channel();

    tokio::task::spawn_local(async move {
        while let Some(message) = messages.recv().await {
            let notification = extraction_notification(&message);
            session.lock().await.record(message);
            if notify.send(notification).is_err() {
                tracing::debug!("Notification receiver dropped");
            }
        }
        tracing::debug!("Extraction message stream closed");
    });

    notifications
}
