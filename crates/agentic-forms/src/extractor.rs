//! One full extraction pass over a document.

use std::cell::RefCell;
use std::rc::Rc;
use std::time::Instant;

use async_trait::async_trait;
use chrono::Utc;
use futures::future::join_all;
use tracing::{debug, info, warn};

use crate::config::ExtractionConfig;
use crate::dom::{self, DomHost, NodeId};
use crate::label::LabelAssociator;
use crate::selector::{HelperCache, SelectorGenerator};
use crate::types::{
    ExtractedFieldSchema, ExtractedFormSchema, FieldAttributes, FieldOption, FormsError,
    FormsResult, LabelResult, SelectorResult, Trigger,
};

/// Visible, enabled, fillable controls.
pub const DISCOVERY_SELECTOR: &str = r#"input:not([type="hidden"]):not([disabled]), select:not([disabled]), textarea:not([disabled])"#;

/// Label and selector for one control.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedField {
    pub label: LabelResult,
    pub selector: SelectorResult,
}

/// Per-element inference seam.
#[async_trait(?Send)]
pub trait FieldResolver {
    async fn resolve(&self, host: &dyn DomHost, control: NodeId) -> FormsResult<ResolvedField>;
}

/// Label association plus selector generation.
pub struct DefaultFieldResolver {
    labels: LabelAssociator,
    selectors: SelectorGenerator,
}

impl DefaultFieldResolver {
    pub fn new(labels: LabelAssociator, selectors: SelectorGenerator) -> Self {
        Self { labels, selectors }
    }

    pub fn from_config(config: &ExtractionConfig) -> Self {
        Self::new(
            LabelAssociator::new(config.labels.clone(), config.geometry.clone()),
            SelectorGenerator::new(config.selectors.clone(), HelperCache::builtin()),
        )
    }
}

#[async_trait(?Send)]
impl FieldResolver for DefaultFieldResolver {
    async fn resolve(&self, host: &dyn DomHost, control: NodeId) -> FormsResult<ResolvedField> {
        let label = self.labels.associate(host, control);
        let selector = self.selectors.generate(host, control).await;
        Ok(ResolvedField { label, selector })
    }
}

/// Discovers controls and builds the field schema for each.
pub struct FormExtractor {
    resolver: Rc<dyn FieldResolver>,
}

impl Default for FormExtractor {
    fn default() -> Self {
        Self::from_config(&ExtractionConfig::default())
    }
}

impl FormExtractor {
    pub fn new(resolver: Rc<dyn FieldResolver>) -> Self {
        Self { resolver }
    }

    pub fn from_config(config: &ExtractionConfig) -> Self {
        Self::new(Rc::new(DefaultFieldResolver::from_config(config)))
    }

    /// Controls eligible for extraction, in document order.
    pub fn discover(host: &dyn DomHost) -> FormsResult<Vec<NodeId>> {
        let candidates = host
            .query_selector_all(DISCOVERY_SELECTOR)
            .map_err(|e| FormsError::Discovery(e.to_string()))?;
        let total = candidates.len();
        let visible: Vec<NodeId> = candidates
            .into_iter()
            .filter(|node| dom::is_visible(host, *node))
            .collect();
        debug!(total, visible = visible.len(), "Discovered form controls");
        Ok(visible)
    }

    /// Run one pass. Individual controls that fail are logged and left out.
    pub async fn extract(
        &self,
        host: &dyn DomHost,
        trigger: Trigger,
    ) -> FormsResult<ExtractedFormSchema> {
        let started = Instant::now();
        let controls = Self::discover(host)?;

        if controls.is_empty() {
            info!(%trigger, "No form controls found");
            return Ok(ExtractedFormSchema::empty(host.url(), trigger));
        }

        let passes = controls
            .iter()
            .enumerate()
            .map(|(index, node)| self.extract_field(host, index, *node));
        let results = join_all(passes).await;

        let mut fields = Vec::with_capacity(results.len());
        for result in results {
            match result {
                Ok(field) => fields.push(field),
                Err(e) => warn!("Skipping field: {e}"),
            }
        }

        info!(
            %trigger,
            fields = fields.len(),
            discovered = controls.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Extraction pass complete"
        );

        Ok(ExtractedFormSchema {
            fields,
            url: host.url().to_string(),
            timestamp: Utc::now(),
            trigger,
        })
    }

    async fn extract_field(
        &self,
        host: &dyn DomHost,
        index: usize,
        control: NodeId,
    ) -> FormsResult<ExtractedFieldSchema> {
        let element_type = host.tag_name(control).ok_or_else(|| FormsError::Element {
            index,
            message: "node is not an element".to_string(),
        })?;

        let resolved = self
            .resolver
            .resolve(host, control)
            .await
            .map_err(|e| match e {
                FormsError::Element { .. } => e,
                other => FormsError::Element {
                    index,
                    message: other.to_string(),
                },
            })?;

        let options = if element_type == "select" {
            select_options(host, control)?
        } else {
            None
        };

        Ok(ExtractedFieldSchema {
            index,
            label: resolved.label,
            selector: resolved.selector,
            element_type,
            attributes: read_attributes(host, control),
            options,
            bounding_box: host.bounding_box(control),
        })
    }
}

fn read_attributes(host: &dyn DomHost, control: NodeId) -> FieldAttributes {
    let get = |name: &str| host.attribute(control, name);
    FieldAttributes {
        name: get("name"),
        id: get("id"),
        input_type: get("type"),
        placeholder: get("placeholder"),
        required: get("required").is_some(),
        autocomplete: get("autocomplete"),
        aria_label: get("aria-label"),
        aria_labelledby: get("aria-labelledby"),
    }
}

/// `(value, text)` pairs; an option without `value` uses its text.
fn select_options(host: &dyn DomHost, select: NodeId) -> FormsResult<Option<Vec<FieldOption>>> {
    let options: Vec<FieldOption> = host
        .query_selector_all_within(select, "option")?
        .into_iter()
        .map(|option| {
            let text = dom::collapse_whitespace(&host.text_content(option));
            let value = host.attribute(option, "value").unwrap_or_else(|| text.clone());
            FieldOption { value, text }
        })
        .collect();

    Ok((!options.is_empty()).then_some(options))
}

/// A replaceable document shared between the page driver and the manager.
///
/// Passes run against a snapshot handle, so replacing the document while a
/// pass is in flight never disturbs it.
pub struct SharedDocument<D> {
    current: Rc<RefCell<Rc<D>>>,
}

impl<D> Clone for SharedDocument<D> {
    fn clone(&self) -> Self {
        Self {
            current: Rc::clone(&self.current),
        }
    }
}

impl<D: DomHost> SharedDocument<D> {
    pub fn new(document: D) -> Self {
        Self {
            current: Rc::new(RefCell::new(Rc::new(document))),
        }
    }

    /// Swap in a new snapshot, returning the old one.
    pub fn replace(&self, document: D) -> Rc<D> {
        self.current.replace(Rc::new(document))
    }

    pub fn snapshot(&self) -> Rc<D> {
        Rc::clone(&self.current.borrow())
    }

    pub fn url(&self) -> String {
        self.current.borrow().url().to_string()
    }
}

/// Something the manager can run on demand.
#[async_trait(?Send)]
pub trait ExtractionTask {
    async fn extract(&self, trigger: Trigger) -> FormsResult<ExtractedFormSchema>;
}

/// Binds a [`FormExtractor`] to a [`SharedDocument`].
pub struct DocumentExtraction<D> {
    extractor: FormExtractor,
    document: SharedDocument<D>,
}

impl<D: DomHost> DocumentExtraction<D> {
    pub fn new(extractor: FormExtractor, document: SharedDocument<D>) -> Self {
        Self {
            extractor,
            document,
        }
    }
}

#[async_trait(?Send)]
impl<D: DomHost + 'static> ExtractionTask for DocumentExtraction<D> {
    async fn extract(&self, trigger: Trigger) -> FormsResult<ExtractedFormSchema> {
        let host = self.document.snapshot();
        self.extractor.extract(host.as_ref(), trigger).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::HtmlDocument;
    use crate::types::{LabelSource, Rect};
    use std::cell::Cell;

    const BOX: &str = "left: 100px; top: 50px; width: 200px; height: 30px";

    fn field(attrs: &str) -> String {
        format!(r#"<input {attrs} style="{BOX}">"#)
    }

    struct CountingResolver {
        calls: Cell<usize>,
        fail_on: Option<String>,
    }

    #[async_trait(?Send)]
    impl FieldResolver for CountingResolver {
        async fn resolve(&self, host: &dyn DomHost, control: NodeId) -> FormsResult<ResolvedField> {
            self.calls.set(self.calls.get() + 1);
            let name = host.attribute(control, "name").unwrap_or_default();
            if self.fail_on.as_deref() == Some(name.as_str()) {
                return Err(FormsError::Helper("resolver exploded".into()));
            }
            Ok(ResolvedField {
                label: LabelResult::new(name.clone(), 0.9, LabelSource::AriaLabel),
                selector: SelectorResult {
                    primary: format!("[name=\"{name}\"]"),
                    fallbacks: Vec::new(),
                    confidence: 1.0,
                },
            })
        }
    }

    fn counting(fail_on: Option<&str>) -> Rc<CountingResolver> {
        Rc::new(CountingResolver {
            calls: Cell::new(0),
            fail_on: fail_on.map(String::from),
        })
    }

    #[tokio::test]
    async fn test_zero_controls_skip_resolver() {
        let doc = HtmlDocument::parse(
            "<p>No form here</p>",
            "https://shop.example/about",
            Default::default(),
        );
        let resolver = counting(None);
        let extractor = FormExtractor::new(resolver.clone());

        let schema = extractor.extract(&doc, Trigger::Manual).await.unwrap();
        assert!(schema.fields.is_empty());
        assert_eq!(schema.url, "https://shop.example/about");
        assert_eq!(schema.trigger, Trigger::Manual);
        assert_eq!(resolver.calls.get(), 0);
    }

    #[tokio::test]
    async fn test_failing_element_is_skipped_in_order() {
        let html: String = ["a", "b", "c", "d", "e"]
            .iter()
            .map(|n| field(&format!(r#"name="{n}""#)))
            .collect();
        let doc = HtmlDocument::from_html(&html);
        let resolver = counting(Some("c"));
        let extractor = FormExtractor::new(resolver.clone());

        let schema = extractor
            .extract(&doc, Trigger::MutationObserver)
            .await
            .unwrap();
        let names: Vec<_> = schema
            .fields
            .iter()
            .map(|f| f.attributes.name.clone().unwrap())
            .collect();
        assert_eq!(names, vec!["a", "b", "d", "e"]);
        let indices: Vec<_> = schema.fields.iter().map(|f| f.index).collect();
        assert_eq!(indices, vec![0, 1, 3, 4]);
        assert_eq!(resolver.calls.get(), 5);
    }

    #[tokio::test]
    async fn test_hidden_disabled_and_invisible_excluded() {
        let html = [
            field(r#"name="visible""#),
            field(r#"type="hidden" name="token""#),
            field(r#"name="off" disabled"#),
            format!(r#"<div style="display: none">{}</div>"#, field(r#"name="collapsed""#)),
            format!(r#"<input name="ghost" style="{BOX}; opacity: 0">"#),
            r#"<input name="unsized">"#.to_string(),
            format!(r#"<textarea name="notes" style="{BOX}"></textarea>"#),
        ]
        .concat();
        let doc = HtmlDocument::from_html(&html);

        let controls = FormExtractor::discover(&doc).unwrap();
        let names: Vec<_> = controls
            .iter()
            .map(|n| doc.attribute(*n, "name").unwrap())
            .collect();
        assert_eq!(names, vec!["visible", "notes"]);
    }

    #[tokio::test]
    async fn test_full_pass_with_default_resolver() {
        let html = format!(
            r#"<form style="left: 0px; top: 0px; width: 800px; height: 400px">
                <label for="email" style="left: 100px; top: 20px; width: 60px; height: 20px">Email</label>
                <input id="email" name="email" type="email" required autocomplete="email"
                    style="left: 100px; top: 50px; width: 200px; height: 30px">
                <select name="country" style="left: 100px; top: 120px; width: 200px; height: 30px">
                    <option value="">Choose</option>
                    <option value="fr">France</option>
                    <option>Spain</option>
                </select>
                <select name="empty" aria-label="Empty list" style="left: 100px; top: 190px; width: 200px; height: 30px"></select>
            </form>"#
        );
        let doc = HtmlDocument::parse(&html, "https://shop.example/checkout", Default::default());
        let schema = FormExtractor::default()
            .extract(&doc, Trigger::Manual)
            .await
            .unwrap();

        assert_eq!(schema.fields.len(), 3);
        let email = &schema.fields[0];
        assert_eq!(email.element_type, "input");
        assert_eq!(email.label.label, "Email");
        assert_eq!(email.label.source, LabelSource::ForAttribute);
        assert_eq!(email.selector.primary, "input#email");
        assert!(email.attributes.required);
        assert_eq!(email.attributes.input_type.as_deref(), Some("email"));
        assert_eq!(email.bounding_box, Rect::new(100.0, 50.0, 200.0, 30.0));
        assert!(email.options.is_none());

        let country = &schema.fields[1];
        let options = country.options.as_ref().unwrap();
        assert_eq!(options.len(), 3);
        assert_eq!(options[1], FieldOption { value: "fr".into(), text: "France".into() });
        assert_eq!(options[2], FieldOption { value: "Spain".into(), text: "Spain".into() });

        let empty = &schema.fields[2];
        assert!(empty.options.is_none());
        assert_eq!(empty.label.label, "Empty list");

        let json = serde_json::to_value(&schema).unwrap();
        assert!(json["fields"][2]["options"].is_null());
        assert_eq!(json["trigger"], "manual");
    }

    #[tokio::test]
    async fn test_shared_document_replace() {
        let shared = SharedDocument::new(HtmlDocument::from_html(&field(r#"name="one""#)));
        let task = DocumentExtraction::new(FormExtractor::default(), shared.clone());
        assert_eq!(task.extract(Trigger::Manual).await.unwrap().fields.len(), 1);

        shared.replace(HtmlDocument::from_html(
            &[field(r#"name="one""#), field(r#"name="two""#)].concat(),
        ));
        assert_eq!(task.extract(Trigger::Manual).await.unwrap().fields.len(), 2);
    }
}
