//! Ranked CSS selector generation for form controls.
//!
//! Candidates come from three tiers (test-automation and identity
//! attributes, the optional unique-selector helper, structural positions),
//! are re-scored against the live document, and the best one becomes the
//! primary with up to three fallbacks.

pub mod css;
pub mod helper;

use std::collections::HashSet;

use tracing::{debug, warn};

use crate::config::SelectorConfig;
use crate::dom::{self, DomHost, NodeId};
use crate::types::{clamp_unit, round4, SelectorCandidate, SelectorResult, SelectorSource};

pub use helper::{HelperCache, HelperLoader, HelperOptions, PathFinder, SelectorHelper};

use css::{escape_attr_value, escape_identifier, is_stable_id};
use helper::nth_of_type;

/// Identity attributes in priority order with their base confidence.
const MANUAL_ATTRIBUTES: [(&str, f64, SelectorSource); 7] = [
    ("data-testid", 0.99, SelectorSource::DataTestid),
    ("data-cy", 0.98, SelectorSource::DataCy),
    ("data-test", 0.97, SelectorSource::DataTest),
    ("data-automation-id", 0.95, SelectorSource::DataAutomationId),
    ("id", 0.90, SelectorSource::Id),
    ("name", 0.85, SelectorSource::Name),
    ("autocomplete", 0.80, SelectorSource::Autocomplete),
];

const TAG_QUALIFIED_BONUS: f64 = 0.01;
const TAG_TYPE_CONFIDENCE: f64 = 0.4;
const PARENT_NTH_CONFIDENCE: f64 = 0.3;
const FORM_NTH_CONFIDENCE: f64 = 0.35;
const MANUAL_UNIQUE_BOOST: f64 = 0.10;
const OTHER_UNIQUE_BOOST: f64 = 0.05;
const AMBIGUOUS_CAP: f64 = 0.4;
const NO_MATCH_CONFIDENCE: f64 = 0.1;

/// Builds a [`SelectorResult`] for a control.
pub struct SelectorGenerator {
    config: SelectorConfig,
    helper: HelperCache,
    options: HelperOptions,
}

impl Default for SelectorGenerator {
    fn default() -> Self {
        Self::new(SelectorConfig::default(), HelperCache::builtin())
    }
}

impl SelectorGenerator {
    pub fn new(config: SelectorConfig, helper: HelperCache) -> Self {
        Self {
            config,
            helper,
            options: HelperOptions::default(),
        }
    }

    /// Generator that only uses attribute and structural candidates.
    pub fn without_helper(config: SelectorConfig) -> Self {
        Self::new(config, HelperCache::disabled())
    }

    pub fn with_options(mut self, options: HelperOptions) -> Self {
        self.options = options;
        self
    }

    pub fn helper_cache(&self) -> &HelperCache {
        &self.helper
    }

    /// Generate the ranked selector for `target`. Never fails: with no
    /// usable candidate the universal control selector is returned.
    pub async fn generate(&self, host: &dyn DomHost, target: NodeId) -> SelectorResult {
        let ranked = self.ranked_candidates(host, target).await;
        self.select(ranked)
    }

    /// All surviving candidates after validation, best first.
    pub async fn ranked_candidates(
        &self,
        host: &dyn DomHost,
        target: NodeId,
    ) -> Vec<SelectorCandidate> {
        let mut candidates = manual_candidates(host, target);
        candidates.extend(self.helper_candidates(host, target).await);
        candidates.extend(structural_candidates(host, target));

        let mut validated = validate(host, target, candidates);
        validated.retain(|c| c.confidence > NO_MATCH_CONFIDENCE);
        validated.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));

        let mut seen = HashSet::new();
        validated.retain(|c| seen.insert(c.selector.clone()));
        validated
    }

    async fn helper_candidates(&self, host: &dyn DomHost, target: NodeId) -> Vec<SelectorCandidate> {
        let attempt = async {
            let helper = self.helper.get().await?;
            helper.generate(host, target, &self.options).await
        };

        match tokio::time::timeout(self.config.helper_timeout(), attempt).await {
            Ok(Ok(selector)) if !selector.trim().is_empty() => vec![SelectorCandidate::new(
                selector,
                self.config.helper_confidence,
                SelectorSource::Helper,
            )],
            Ok(Ok(_)) => Vec::new(),
            Ok(Err(e)) => {
                debug!("Selector helper produced nothing: {e:#}");
                Vec::new()
            }
            Err(_) => {
                warn!(
                    "Selector helper timed out after {}ms",
                    self.config.helper_timeout_ms
                );
                Vec::new()
            }
        }
    }

    /// Primary is the best candidate. Fallbacks prefer candidates that rely
    /// on a different attribute or strategy than anything already chosen,
    /// then fill remaining slots in rank order without reusing an identity
    /// attribute.
    fn select(&self, ranked: Vec<SelectorCandidate>) -> SelectorResult {
        let Some(primary) = ranked.first() else {
            return SelectorResult::universal();
        };

        let mut used = vec![primary.source];
        let mut fallbacks: Vec<&SelectorCandidate> = Vec::new();
        for candidate in &ranked[1..] {
            if fallbacks.len() == self.config.max_fallbacks {
                break;
            }
            if !used.contains(&candidate.source) {
                used.push(candidate.source);
                fallbacks.push(candidate);
            }
        }
        for candidate in &ranked[1..] {
            if fallbacks.len() == self.config.max_fallbacks {
                break;
            }
            // A bare and a tag-qualified selector on the same attribute share an anchor.
            let same_anchor = candidate.source.is_manual() && used.contains(&candidate.source);
            if !same_anchor && !fallbacks.iter().any(|f| f.selector == candidate.selector) {
                fallbacks.push(candidate);
            }
        }
        fallbacks.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));

        SelectorResult {
            primary: primary.selector.clone(),
            fallbacks: fallbacks.into_iter().map(|c| c.selector.clone()).collect(),
            confidence: primary.confidence,
        }
    }
}

/// Tag-qualified and bare selectors from identity attributes.
fn manual_candidates(host: &dyn DomHost, target: NodeId) -> Vec<SelectorCandidate> {
    let Some(tag) = host.tag_name(target) else {
        return Vec::new();
    };
    let mut out = Vec::new();

    for (attr, base, source) in MANUAL_ATTRIBUTES {
        let Some(value) = host.attribute(target, attr).filter(|v| !v.trim().is_empty()) else {
            continue;
        };
        let bare = if attr == "id" {
            if !is_stable_id(&value) {
                debug!("Skipping unstable id '{value}'");
                continue;
            }
            format!("#{}", escape_identifier(&value))
        } else {
            format!("[{attr}=\"{}\"]", escape_attr_value(&value))
        };
        out.push(SelectorCandidate::new(
            format!("{tag}{bare}"),
            base + TAG_QUALIFIED_BONUS,
            source,
        ));
        out.push(SelectorCandidate::new(bare, base, source));
    }
    out
}

/// Low-confidence positional fallbacks.
fn structural_candidates(host: &dyn DomHost, target: NodeId) -> Vec<SelectorCandidate> {
    let Some(tag) = host.tag_name(target) else {
        return Vec::new();
    };
    let mut out = Vec::new();

    let tag_type = match host.attribute(target, "type").filter(|t| !t.is_empty()) {
        Some(t) => format!("{tag}[type=\"{}\"]", escape_attr_value(&t)),
        None => tag.clone(),
    };
    out.push(SelectorCandidate::new(
        tag_type,
        TAG_TYPE_CONFIDENCE,
        SelectorSource::TagType,
    ));

    let nth = nth_of_type(host, target);
    if let (Some(parent), Some(n)) = (host.parent_element(target), nth) {
        if let Some(parent_tag) = host.tag_name(parent) {
            out.push(SelectorCandidate::new(
                format!("{parent_tag} > {tag}:nth-of-type({n})"),
                PARENT_NTH_CONFIDENCE,
                SelectorSource::ParentNth,
            ));
        }
    }

    let form = dom::ancestors(host, target).find(|a| host.tag_name(*a).as_deref() == Some("form"));
    if let (Some(form), Some(n)) = (form, nth) {
        out.push(SelectorCandidate::new(
            format!("{} {tag}:nth-of-type({n})", form_scope(host, form)),
            FORM_NTH_CONFIDENCE,
            SelectorSource::FormNth,
        ));
    }
    out
}

fn form_scope(host: &dyn DomHost, form: NodeId) -> String {
    if let Some(id) = host.attribute(form, "id").filter(|id| is_stable_id(id)) {
        return format!("form#{}", escape_identifier(&id));
    }
    if let Some(name) = host.attribute(form, "name").filter(|n| !n.is_empty()) {
        return format!("form[name=\"{}\"]", escape_attr_value(&name));
    }
    "form".to_string()
}

/// Re-score candidates by how they match the live document.
///
/// A detached target cannot be checked, so candidates pass through
/// unchanged apart from the low-confidence cut.
fn validate(
    host: &dyn DomHost,
    target: NodeId,
    candidates: Vec<SelectorCandidate>,
) -> Vec<SelectorCandidate> {
    if !host.is_connected(target) {
        debug!("Target detached, skipping selector validation");
        return candidates
            .into_iter()
            .filter(|c| c.confidence > NO_MATCH_CONFIDENCE)
            .collect();
    }

    candidates
        .into_iter()
        .filter_map(|mut c| {
            let matches = match host.query_selector_all(&c.selector) {
                Ok(m) => m,
                Err(e) => {
                    debug!("Dropping candidate: {e}");
                    return None;
                }
            };
            c.confidence = if matches.len() == 1 && matches[0] == target {
                let boost = if c.source.is_manual() {
                    MANUAL_UNIQUE_BOOST
                } else {
                    OTHER_UNIQUE_BOOST
                };
                round4(clamp_unit(c.confidence + boost))
            } else if matches.len() > 1 && matches.contains(&target) {
                AMBIGUOUS_CAP.min(c.confidence * 0.5)
            } else {
                NO_MATCH_CONFIDENCE
            };
            Some(c)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::HtmlDocument;
    use crate::types::SelectorSource;
    use async_trait::async_trait;
    use std::rc::Rc;
    use std::time::Duration;

    fn generator() -> SelectorGenerator {
        SelectorGenerator::without_helper(SelectorConfig::default())
    }

    fn first(doc: &HtmlDocument, selector: &str) -> NodeId {
        doc.query_selector_all(selector).unwrap()[0]
    }

    #[tokio::test]
    async fn test_testid_primary_with_id_and_name_fallbacks() {
        let doc = HtmlDocument::from_html(
            r#"<form><input data-testid="x" id="y" name="z"><input name="other"></form>"#,
        );
        let target = first(&doc, "input");
        let result = generator().generate(&doc, target).await;

        assert_eq!(result.primary, r#"input[data-testid="x"]"#);
        assert_eq!(result.confidence, 1.0);
        assert!(result.fallbacks.len() <= 3);
        assert!(result.fallbacks.iter().any(|f| f.contains("#y")), "{result:?}");
        assert!(result.fallbacks.iter().any(|f| f.contains(r#"[name="z"]"#)), "{result:?}");
        for selector in std::iter::once(&result.primary).chain(&result.fallbacks) {
            assert_eq!(doc.query_selector_all(selector).unwrap(), vec![target], "{selector}");
        }
    }

    #[tokio::test]
    async fn test_manual_boost_exceeds_structural_boost() {
        let doc = HtmlDocument::from_html(r#"<form><input name="email"><textarea></textarea></form>"#);
        let ranked = generator()
            .ranked_candidates(&doc, first(&doc, "input"))
            .await;

        let name = ranked
            .iter()
            .find(|c| c.selector == r#"input[name="email"]"#)
            .unwrap();
        assert!((name.confidence - 0.96).abs() < 1e-9);

        let tag_type = ranked
            .iter()
            .find(|c| c.source == SelectorSource::TagType)
            .unwrap();
        assert_eq!(tag_type.selector, "input");
        assert!((tag_type.confidence - 0.45).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_ambiguous_candidates_penalized() {
        let doc = HtmlDocument::from_html(
            r#"<form><input name="qty" id="q1x"><input name="qty"></form>"#,
        );
        let ranked = generator()
            .ranked_candidates(&doc, first(&doc, "input"))
            .await;
        let name = ranked
            .iter()
            .find(|c| c.selector == r#"[name="qty"]"#)
            .unwrap();
        assert!((name.confidence - 0.4).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_unstable_id_skipped() {
        let doc = HtmlDocument::from_html(r#"<input id="ember1234" name="q">"#);
        let ranked = generator()
            .ranked_candidates(&doc, first(&doc, "input"))
            .await;
        assert!(ranked.iter().all(|c| c.source != SelectorSource::Id));
        assert_eq!(ranked[0].selector, r#"input[name="q"]"#);
    }

    #[tokio::test]
    async fn test_id_is_escaped() {
        let doc = HtmlDocument::from_html(r#"<input id="user.email">"#);
        let result = generator().generate(&doc, first(&doc, "input")).await;
        assert_eq!(result.primary, r"input#user\.email");
    }

    #[tokio::test]
    async fn test_detached_target_keeps_unvalidated_candidates() {
        let mut doc = HtmlDocument::from_html(r#"<form><input name="gone"></form>"#);
        let target = first(&doc, "input");
        doc.remove(target);

        let result = generator().generate(&doc, target).await;
        assert_eq!(result.primary, r#"input[name="gone"]"#);
        assert!((result.confidence - 0.86).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_detached_manual_tiers_keep_base_confidence() {
        let mut doc = HtmlDocument::from_html(
            r#"<form><input id="y" name="z" autocomplete="email" data-automation-id="w"></form>"#,
        );
        let target = first(&doc, "input");
        doc.remove(target);

        let ranked = generator().ranked_candidates(&doc, target).await;
        let confidence = |selector: &str| {
            ranked
                .iter()
                .find(|c| c.selector == selector)
                .map(|c| c.confidence)
        };
        assert_eq!(confidence(r#"[data-automation-id="w"]"#), Some(0.95));
        assert_eq!(confidence("#y"), Some(0.90));
        assert_eq!(confidence(r#"[name="z"]"#), Some(0.85));
        assert_eq!(confidence(r#"[autocomplete="email"]"#), Some(0.80));
        assert_eq!(confidence(r#"input[data-automation-id="w"]"#), Some(0.95 + 0.01));
    }

    #[tokio::test]
    async fn test_fallbacks_never_repeat_an_anchor() {
        let mut doc = HtmlDocument::from_html(r#"<form><input data-testid="x"></form>"#);
        let target = first(&doc, "input");
        doc.remove(target);

        let result = generator().generate(&doc, target).await;
        assert_eq!(result.primary, r#"input[data-testid="x"]"#);
        assert!(
            result.fallbacks.iter().all(|f| !f.contains("data-testid")),
            "{result:?}"
        );
        assert!(!result.fallbacks.is_empty());
    }

    #[tokio::test]
    async fn test_structural_candidates() {
        let doc = HtmlDocument::from_html(
            r#"<form id="checkout"><div><input type="text"><input type="text"></div></form>"#,
        );
        let target = doc.query_selector_all("input").unwrap()[1];
        let ranked = generator().ranked_candidates(&doc, target).await;

        let parent = ranked
            .iter()
            .find(|c| c.source == SelectorSource::ParentNth)
            .unwrap();
        assert_eq!(parent.selector, "div > input:nth-of-type(2)");
        assert!((parent.confidence - 0.35).abs() < 1e-9);

        let scoped = ranked
            .iter()
            .find(|c| c.source == SelectorSource::FormNth)
            .unwrap();
        assert_eq!(scoped.selector, "form#checkout input:nth-of-type(2)");
        assert!((scoped.confidence - 0.4).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_builtin_helper_candidate() {
        let doc = HtmlDocument::from_html(
            r#"<div class="billing"><input></div><div class="shipping"><input></div>"#,
        );
        let target = doc.query_selector_all("input").unwrap()[1];
        let result = SelectorGenerator::default().generate(&doc, target).await;
        assert_eq!(result.primary, "div.shipping > input");
        assert!((result.confidence - 0.85).abs() < 1e-9);
    }

    struct StuckHelper;

    #[async_trait(?Send)]
    impl SelectorHelper for StuckHelper {
        async fn generate(
            &self,
            _host: &dyn DomHost,
            _target: NodeId,
            _options: &HelperOptions,
        ) -> anyhow::Result<String> {
            tokio::time::sleep(Duration::from_secs(30)).await;
            Ok("#never".to_string())
        }
    }

    struct StuckLoader;

    #[async_trait(?Send)]
    impl HelperLoader for StuckLoader {
        async fn load(&self) -> anyhow::Result<Rc<dyn SelectorHelper>> {
            Ok(Rc::new(StuckHelper))
        }
    }

    struct BrokenLoader;

    #[async_trait(?Send)]
    impl HelperLoader for BrokenLoader {
        async fn load(&self) -> anyhow::Result<Rc<dyn SelectorHelper>> {
            anyhow::bail!("blocked by content security policy")
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_helper_timeout_yields_no_helper_candidates() {
        let doc = HtmlDocument::from_html(r#"<input name="q">"#);
        let generator =
            SelectorGenerator::new(SelectorConfig::default(), HelperCache::new(Rc::new(StuckLoader)));
        let ranked = generator.ranked_candidates(&doc, first(&doc, "input")).await;
        assert!(ranked.iter().all(|c| c.source != SelectorSource::Helper));
        assert_eq!(ranked[0].selector, r#"input[name="q"]"#);
    }

    #[tokio::test]
    async fn test_helper_load_failure_yields_no_helper_candidates() {
        let doc = HtmlDocument::from_html(r#"<input name="q">"#);
        let generator =
            SelectorGenerator::new(SelectorConfig::default(), HelperCache::new(Rc::new(BrokenLoader)));
        let ranked = generator.ranked_candidates(&doc, first(&doc, "input")).await;
        assert!(ranked.iter().all(|c| c.source != SelectorSource::Helper));
        assert!(!ranked.is_empty());
    }

    #[tokio::test]
    async fn test_no_usable_candidate_falls_back_to_universal() {
        let mut doc = HtmlDocument::from_html(r#"<input>"#);
        let target = first(&doc, "input");
        doc.remove(target);

        let result = generator().generate(&doc, target).await;
        // Only structural candidates remain for a bare detached input.
        assert_eq!(result.primary, "input");

        let empty = generator().select(Vec::new());
        assert_eq!(empty, SelectorResult::universal());
    }

    #[tokio::test]
    async fn test_confidences_within_unit_range() {
        let doc = HtmlDocument::from_html(
            r#"<form><input data-testid="a" data-cy="b" data-test="c" data-automation-id="d"
                id="e" name="f" autocomplete="email"></form>"#,
        );
        let ranked = generator().ranked_candidates(&doc, first(&doc, "input")).await;
        assert!(ranked.iter().all(|c| (0.0..=1.0).contains(&c.confidence)));
    }
}
