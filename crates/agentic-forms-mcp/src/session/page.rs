//! Page snapshot lifecycle, message log, and latest schema.

use std::collections::VecDeque;
use std::rc::Rc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, Mutex};

use agentic_forms::{
    ChannelConsumer, DocumentExtraction, DomHost, ExtractedFormSchema, ExtractionConfig,
    ExtractionManager, ExtractionMessage, FormExtractor, FormsResult, HtmlDocument,
    MutationRecord, Rect, SharedDocument, Viewport,
};

/// Outbound messages kept for `forms://messages`.
pub const MESSAGE_LOG_LIMIT: usize = 50;

pub type SharedSession = Rc<Mutex<PageSession>>;

/// Layout box for every element matching `selector`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RectOverride {
    pub selector: String,
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

/// A serialized page: markup plus the layout the browser reported.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageSnapshot {
    pub html: String,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub viewport: Option<Viewport>,
    #[serde(default)]
    pub rects: Vec<RectOverride>,
}

pub struct PageSession {
    config: ExtractionConfig,
    document: SharedDocument<HtmlDocument>,
    manager: ExtractionManager,
    latest: Option<ExtractedFormSchema>,
    messages: VecDeque<ExtractionMessage>,
    loaded_at: Option<DateTime<Utc>>,
    page_loads: u64,
}

impl PageSession {
    /// Start with a blank page. Spawns the extraction manager, so this must
    /// be called inside a `LocalSet`.
    pub fn start(config: ExtractionConfig) -> (Self, mpsc::UnboundedReceiver<ExtractionMessage>) {
        let document = SharedDocument::new(HtmlDocument::from_html(""));
        let task = Rc::new(DocumentExtraction::new(
            FormExtractor::from_config(&config),
            document.clone(),
        ));
        let (consumer, messages) = ChannelConsumer::channel();
        let manager = ExtractionManager::spawn(task, Rc::new(consumer), config.scheduler.clone());

        tracing::info!(
            debounce_ms = config.scheduler.debounce_ms,
            observing = config.scheduler.observe_mutations,
            "Page session started"
        );

        let session = Self {
            config,
            document,
            manager,
            latest: None,
            messages: VecDeque::new(),
            loaded_at: None,
            page_loads: 0,
        };
        (session, messages)
    }

    pub fn config(&self) -> &ExtractionConfig {
        &self.config
    }

    /// A handle to the manager that can be used without holding the session lock.
    pub fn manager(&self) -> ExtractionManager {
        self.manager.clone()
    }

    pub fn url(&self) -> String {
        self.document.url()
    }

    pub fn document(&self) -> Rc<HtmlDocument> {
        self.document.snapshot()
    }

    fn build_document(&self, snapshot: PageSnapshot, default_url: String) -> FormsResult<HtmlDocument> {
        let url = snapshot.url.unwrap_or(default_url);
        let viewport = snapshot.viewport.unwrap_or_default();
        let mut document = HtmlDocument::parse(&snapshot.html, url, viewport);
        for r in &snapshot.rects {
            let matched =
                document.set_rect_for_selector(&r.selector, Rect::new(r.x, r.y, r.width, r.height))?;
            if matched == 0 {
                tracing::debug!("Rect override '{}' matched nothing", r.selector);
            }
        }
        Ok(document)
    }

    /// Replace the page with a freshly loaded one. Returns the mutation
    /// record describing every control in it.
    pub fn load_page(&mut self, snapshot: PageSnapshot) -> FormsResult<MutationRecord> {
        let document = self.build_document(snapshot, "about:blank".to_string())?;
        let record = MutationRecord::document_loaded(&document);
        tracing::info!(
            url = document.url(),
            controls = record.added_nodes.len(),
            "Page loaded"
        );
        self.document.replace(document);
        self.page_loads += 1;
        self.loaded_at = Some(Utc::now());
        Ok(record)
    }

    /// Swap in a new snapshot of the same page. Without explicit records the
    /// batch is derived from the controls that differ between snapshots.
    pub fn mutate_page(
        &mut self,
        snapshot: PageSnapshot,
        records: Option<Vec<MutationRecord>>,
    ) -> FormsResult<Vec<MutationRecord>> {
        let previous = self.document.snapshot();
        let document = self.build_document(snapshot, previous.url().to_string())?;
        let records = records
            .unwrap_or_else(|| vec![MutationRecord::between(previous.as_ref(), &document)]);
        self.document.replace(document);
        Ok(records)
    }

    /// Log an outbound message; successful ones become the latest schema.
    pub fn record(&mut self, message: ExtractionMessage) {
        if let ExtractionMessage::FormsExtracted { schema, .. } = &message {
            self.latest = Some(schema.clone());
        }
        self.messages.push_back(message);
        while self.messages.len() > MESSAGE_LOG_LIMIT {
            self.messages.pop_front();
        }
    }

    pub fn set_latest(&mut self, schema: ExtractedFormSchema) {
        self.latest = Some(schema);
    }

    pub fn latest(&self) -> Option<&ExtractedFormSchema> {
        self.latest.as_ref()
    }

    pub fn messages(&self) -> impl Iterator<Item = &ExtractionMessage> {
        self.messages.iter()
    }

    pub fn page_loads(&self) -> u64 {
        self.page_loads
    }

    pub fn loaded_at(&self) -> Option<DateTime<Utc>> {
        self.loaded_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use agentic_forms::Trigger;
    use tokio::task::LocalSet;

    #[tokio::test]
    async fn test_message_log_is_bounded() {
        LocalSet::new()
            .run_until(async {
                let (mut session, _messages) = PageSession::start(ExtractionConfig::default());
                for i in 0..60 {
                    session.record(ExtractionMessage::ExtractionFailed {
                        error: format!("failure {i}"),
                        trigger: Trigger::MutationObserver,
                    });
                }
                assert_eq!(session.messages().count(), MESSAGE_LOG_LIMIT);
                assert!(session.latest().is_none());

                session.record(ExtractionMessage::FormsExtracted {
                    schema: ExtractedFormSchema::empty("about:blank", Trigger::Manual),
                    trigger: Trigger::Manual,
                });
                assert!(session.latest().is_some());
            })
            .await;
    }

    #[tokio::test]
    async fn test_mutate_derives_records_and_keeps_url() {
        LocalSet::new()
            .run_until(async {
                let (mut session, _messages) = PageSession::start(ExtractionConfig::default());
                session
                    .load_page(PageSnapshot {
                        html: r#"<input name="q">"#.into(),
                        url: Some("https://shop.example/search".into()),
                        viewport: None,
                        rects: Vec::new(),
                    })
                    .unwrap();

                let records = session
                    .mutate_page(
                        PageSnapshot {
                            html: r#"<input name="q"><input name="zip">"#.into(),
                            url: None,
                            viewport: None,
                            rects: Vec::new(),
                        },
                        None,
                    )
                    .unwrap();
                assert_eq!(records.len(), 1);
                assert!(records[0].touches_form_control());
                assert_eq!(session.url(), "https://shop.example/search");
            })
            .await;
    }
}
