//! Label resolution for a form control.
//!
//! Seven strategies run in a fixed order. The first one whose confidence
//! exceeds the early-exit threshold wins outright, even if a later strategy
//! would have scored higher. When none clears the threshold the highest
//! score wins, ties going to the earlier strategy.

use std::sync::OnceLock;

use regex::Regex;

use crate::config::{GeometryConfig, LabelConfig};
use crate::dom::{self, DomHost, NodeId};
use crate::geometry::validate_label_proximity;
use crate::types::{LabelResult, LabelSource};

const FOR_ATTRIBUTE_CONFIDENCE: f64 = 0.95;
const WRAPPING_LABEL_CONFIDENCE: f64 = 0.9;
const ARIA_CONFIDENCE: f64 = 0.85;
const PLACEHOLDER_CONFIDENCE: f64 = 0.5;
const ANCESTOR_TEXT_FLOOR: f64 = 0.3;
const ANCESTOR_TEXT_SCALE: f64 = 0.6;

type Strategy = fn(&LabelAssociator, &dyn DomHost, NodeId) -> Option<LabelResult>;

const STRATEGIES: [(LabelSource, Strategy); 7] = [
    (LabelSource::ForAttribute, LabelAssociator::by_for_attribute),
    (LabelSource::WrappingLabel, LabelAssociator::by_wrapping_label),
    (LabelSource::AriaLabel, LabelAssociator::by_aria_label),
    (LabelSource::AriaLabelledby, LabelAssociator::by_aria_labelledby),
    (LabelSource::Placeholder, LabelAssociator::by_placeholder),
    (LabelSource::Geometric, LabelAssociator::by_nearest_text),
    (LabelSource::AncestorText, LabelAssociator::by_ancestor_text),
];

/// A label decision plus the strategies that were actually evaluated.
#[derive(Debug, Clone)]
pub struct LabelResolution {
    pub result: LabelResult,
    pub evaluated: Vec<LabelSource>,
}

/// Resolves the most plausible human-readable label for a control.
#[derive(Debug, Clone, Default)]
pub struct LabelAssociator {
    labels: LabelConfig,
    geometry: GeometryConfig,
}

impl LabelAssociator {
    pub fn new(labels: LabelConfig, geometry: GeometryConfig) -> Self {
        Self { labels, geometry }
    }

    /// Best label for `control`; never fails, falls back to a sentinel.
    pub fn associate(&self, host: &dyn DomHost, control: NodeId) -> LabelResult {
        self.resolve(host, control).result
    }

    pub fn resolve(&self, host: &dyn DomHost, control: NodeId) -> LabelResolution {
        let mut evaluated = Vec::with_capacity(STRATEGIES.len());
        let mut best: Option<LabelResult> = None;

        for (source, strategy) in STRATEGIES {
            evaluated.push(source);
            let Some(result) = strategy(self, host, control) else {
                continue;
            };
            tracing::debug!(
                source = %source,
                confidence = result.confidence,
                label = %result.label,
                "label strategy matched"
            );

            if result.confidence > self.labels.early_exit_threshold {
                return LabelResolution { result, evaluated };
            }
            let better = best
                .as_ref()
                .map_or(true, |b| result.confidence > b.confidence);
            if better {
                best = Some(result);
            }
        }

        let result = best
            .filter(|b| b.confidence > 0.0)
            .unwrap_or_else(LabelResult::unlabeled);
        LabelResolution { result, evaluated }
    }

    fn by_for_attribute(&self, host: &dyn DomHost, control: NodeId) -> Option<LabelResult> {
        let id = non_empty(host.attribute(control, "id"))?;
        let labels = host.query_selector_all("label[for]").ok()?;
        labels
            .into_iter()
            .filter(|label| host.attribute(*label, "for").as_deref() == Some(id.as_str()))
            .map(|label| dom::text_without_controls(host, label))
            .find(|text| !text.is_empty())
            .map(|text| LabelResult::new(text, FOR_ATTRIBUTE_CONFIDENCE, LabelSource::ForAttribute))
    }

    fn by_wrapping_label(&self, host: &dyn DomHost, control: NodeId) -> Option<LabelResult> {
        let label = dom::ancestors(host, control)
            .take(self.labels.wrapping_label_depth)
            .find(|a| host.tag_name(*a).as_deref() == Some("label"))?;
        let text = dom::text_without_controls(host, label);
        (!text.is_empty())
            .then(|| LabelResult::new(text, WRAPPING_LABEL_CONFIDENCE, LabelSource::WrappingLabel))
    }

    fn by_aria_label(&self, host: &dyn DomHost, control: NodeId) -> Option<LabelResult> {
        let text = non_empty(host.attribute(control, "aria-label"))?;
        Some(LabelResult::new(text, ARIA_CONFIDENCE, LabelSource::AriaLabel))
    }

    fn by_aria_labelledby(&self, host: &dyn DomHost, control: NodeId) -> Option<LabelResult> {
        let ids = host.attribute(control, "aria-labelledby")?;
        let parts: Vec<String> = ids
            .split_whitespace()
            .filter_map(|id| host.element_by_id(id))
            .map(|el| dom::collapse_whitespace(&host.text_content(el)))
            .filter(|text| !text.is_empty())
            .collect();
        if parts.is_empty() {
            return None;
        }
        Some(LabelResult::new(
            parts.join(" "),
            ARIA_CONFIDENCE,
            LabelSource::AriaLabelledby,
        ))
    }

    fn by_placeholder(&self, host: &dyn DomHost, control: NodeId) -> Option<LabelResult> {
        let text = non_empty(host.attribute(control, "placeholder"))?;
        Some(LabelResult::new(text, PLACEHOLDER_CONFIDENCE, LabelSource::Placeholder))
    }

    /// Nearest rendered text, ranked by centre distance and then validated
    /// geometrically in ascending order.
    fn by_nearest_text(&self, host: &dyn DomHost, control: NodeId) -> Option<LabelResult> {
        let control_rect = host.bounding_box(control);
        if control_rect.is_degenerate() {
            return None;
        }
        let root = self.search_root(host, control);
        let (cx, cy) = control_rect.center();

        let mut candidates: Vec<(f64, String, crate::types::Rect)> =
            dom::text_nodes_within(host, root, control)
                .into_iter()
                .filter_map(|node| {
                    let text = dom::collapse_whitespace(&host.text_content(node));
                    let len = text.chars().count();
                    if len == 0 || len > self.labels.neighbor_text_max_len {
                        return None;
                    }
                    let rect = host.bounding_box(node);
                    if rect.is_degenerate() {
                        return None;
                    }
                    let (tx, ty) = rect.center();
                    let distance = ((tx - cx).powi(2) + (ty - cy).powi(2)).sqrt();
                    Some((distance, text, rect))
                })
                .collect();

        candidates.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal));
        candidates.truncate(self.labels.neighbor_candidates);

        candidates.into_iter().find_map(|(distance, text, rect)| {
            let verdict = validate_label_proximity(
                &control_rect,
                &rect,
                host.viewport(),
                &self.geometry,
                self.geometry.proximity_threshold,
            );
            verdict.is_valid.then(|| {
                LabelResult::new(text, verdict.confidence, LabelSource::Geometric)
                    .with_debug(format!("distance={distance:.0} {}", verdict.reason))
            })
        })
    }

    /// Nearest form-like or tall ancestor, else the whole document.
    fn search_root(&self, host: &dyn DomHost, control: NodeId) -> NodeId {
        dom::ancestors(host, control)
            .take(self.labels.search_root_depth)
            .find(|a| {
                is_form_like(host, *a)
                    || host.bounding_box(*a).height > self.labels.search_root_min_height
            })
            .unwrap_or_else(|| host.root())
    }

    fn by_ancestor_text(&self, host: &dyn DomHost, control: NodeId) -> Option<LabelResult> {
        let control_rect = host.bounding_box(control);
        dom::ancestors(host, control)
            .take(self.labels.ancestor_text_depth)
            .find_map(|ancestor| {
                let text = dom::text_without_controls(host, ancestor);
                let len = text.chars().count();
                if len < self.labels.ancestor_text_min_len
                    || len > self.labels.ancestor_text_max_len
                    || looks_generated(&text)
                {
                    return None;
                }
                let verdict = validate_label_proximity(
                    &control_rect,
                    &host.bounding_box(ancestor),
                    host.viewport(),
                    &self.geometry,
                    self.geometry.proximity_threshold,
                );
                if verdict.confidence <= 0.0 {
                    return None;
                }
                let confidence =
                    (verdict.confidence * ANCESTOR_TEXT_SCALE).max(ANCESTOR_TEXT_FLOOR);
                Some(
                    LabelResult::new(text, confidence, LabelSource::AncestorText)
                        .with_debug(verdict.reason),
                )
            })
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| dom::collapse_whitespace(&v))
        .filter(|v| !v.is_empty())
}

fn is_form_like(host: &dyn DomHost, node: NodeId) -> bool {
    matches!(host.tag_name(node).as_deref(), Some("form") | Some("fieldset"))
        || host.attribute(node, "role").as_deref() == Some("form")
}

/// Text that reads like an identifier or a number rather than a label.
fn looks_generated(text: &str) -> bool {
    static HEX_ID: OnceLock<Regex> = OnceLock::new();
    static NUMERIC: OnceLock<Regex> = OnceLock::new();
    let hex = HEX_ID.get_or_init(|| {
        Regex::new(r"(?i)^(0x)?[0-9a-f]{6,}$|^[0-9a-f]{8}(-[0-9a-f]{4}){3}-[0-9a-f]{12}$")
            .expect("hex id regex is valid")
    });
    let numeric = NUMERIC
        .get_or_init(|| Regex::new(r"^[\d\s.,:/#+-]+$").expect("numeric regex is valid"));
    let hex_like = hex.is_match(text) && text.chars().any(|c| c.is_ascii_digit());
    hex_like || numeric.is_match(text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::HtmlDocument;

    fn resolve(html: &str, control_id: &str) -> LabelResolution {
        let doc = HtmlDocument::from_html(html);
        let control = doc.element_by_id(control_id).expect("control exists");
        LabelAssociator::default().resolve(&doc, control)
    }

    #[test]
    fn test_for_attribute_short_circuits() {
        let r = resolve(
            r#"<label for="e">L</label><input id="e" placeholder="ignored" aria-label="also ignored">"#,
            "e",
        );
        assert_eq!(r.result.label, "L");
        assert_eq!(r.result.source, LabelSource::ForAttribute);
        assert!(r.result.confidence >= 0.9);
        assert_eq!(r.evaluated, vec![LabelSource::ForAttribute]);
    }

    #[test]
    fn test_wrapping_label_strips_controls() {
        let r = resolve(
            r#"<label> Email address <span><input id="e"></span></label>"#,
            "e",
        );
        assert_eq!(r.result.label, "Email address");
        assert_eq!(r.result.source, LabelSource::WrappingLabel);
        assert_eq!(r.result.confidence, 0.9);
    }

    #[test]
    fn test_wrapping_label_depth_limit() {
        let r = resolve(
            r#"<label>Too far<div><div><div><input id="e"></div></div></div></label>"#,
            "e",
        );
        assert_ne!(r.result.source, LabelSource::WrappingLabel);
    }

    #[test]
    fn test_aria_labelledby_joins_in_listed_order() {
        let r = resolve(
            r#"<span id="a">First</span><span id="b">Name</span>
               <input id="e" aria-labelledby="b missing a">"#,
            "e",
        );
        assert_eq!(r.result.label, "Name First");
        assert_eq!(r.result.source, LabelSource::AriaLabelledby);
    }

    #[test]
    fn test_placeholder_only() {
        let r = resolve(
            r#"<input id="e" placeholder="First Name" style="left:100px;top:50px;width:150px;height:30px">"#,
            "e",
        );
        assert_eq!(r.result.source, LabelSource::Placeholder);
        assert!(r.result.confidence > 0.4 && r.result.confidence < 0.8);
        assert_eq!(r.evaluated.len(), 7);
    }

    #[test]
    fn test_nothing_usable_returns_sentinel() {
        let r = resolve(
            r#"<input id="e" style="left:100px;top:50px;width:150px;height:30px">"#,
            "e",
        );
        assert_eq!(r.result, LabelResult::unlabeled());
    }

    #[test]
    fn test_first_over_threshold_wins_not_global_max() {
        // The nearby text would score 0.97, but aria-label clears 0.7 first.
        let r = resolve(
            r#"<span style="left:100px;top:20px;width:80px;height:20px">Email</span>
               <input id="e" aria-label="Work email"
                      style="left:100px;top:45px;width:200px;height:30px">"#,
            "e",
        );
        assert_eq!(r.result.source, LabelSource::AriaLabel);
        assert_eq!(r.result.label, "Work email");
        assert_eq!(r.evaluated.last(), Some(&LabelSource::AriaLabel));
    }

    #[test]
    fn test_geometric_neighbor() {
        let r = resolve(
            r#"<div><span style="left:100px;top:20px;width:80px;height:20px">Email</span>
               <span style="left:600px;top:600px;width:80px;height:20px">Footer</span>
               <input id="e" style="left:100px;top:45px;width:200px;height:30px"></div>"#,
            "e",
        );
        assert_eq!(r.result.source, LabelSource::Geometric);
        assert_eq!(r.result.label, "Email");
        assert!(r.result.confidence > 0.9);
        assert!(r.result.debug.is_some());
    }

    #[test]
    fn test_ancestor_text_beats_placeholder_when_no_early_exit() {
        // The span has no layout of its own, so only the container text works.
        let r = resolve(
            r#"<div style="left:90px;top:40px;width:300px;height:50px">
                 <span>Phone</span>
                 <input id="e" placeholder="555-0100"
                        style="left:150px;top:50px;width:200px;height:30px">
               </div>"#,
            "e",
        );
        assert_eq!(r.result.source, LabelSource::AncestorText);
        assert_eq!(r.result.label, "Phone");
        assert!((r.result.confidence - 0.6).abs() < 1e-9);
    }

    #[test]
    fn test_ancestor_text_rejects_generated_looking_text() {
        let r = resolve(
            r#"<div style="left:90px;top:40px;width:300px;height:50px">
                 <i>12345</i>
                 <input id="e" style="left:150px;top:50px;width:200px;height:30px">
               </div>"#,
            "e",
        );
        assert_eq!(r.result.source, LabelSource::Fallback);
    }

    #[test]
    fn test_looks_generated() {
        assert!(looks_generated("a3f9c2d1"));
        assert!(looks_generated("2024-01-01"));
        assert!(looks_generated("42"));
        assert!(!looks_generated("Email"));
        assert!(!looks_generated("facade"));
    }

    #[test]
    fn test_confidences_in_unit_range() {
        let html = r#"<form style="left:0px;top:0px;width:800px;height:400px">
            <label for="a">A</label><input id="a" style="left:10px;top:10px;width:100px;height:20px">
            <label>B <input id="b" style="left:10px;top:40px;width:100px;height:20px"></label>
            <input id="c" placeholder="C" style="left:10px;top:70px;width:100px;height:20px">
            <input id="d" style="left:10px;top:100px;width:100px;height:20px">
        </form>"#;
        let doc = HtmlDocument::from_html(html);
        let associator = LabelAssociator::default();
        for id in ["a", "b", "c", "d"] {
            let control = doc.element_by_id(id).unwrap();
            let result = associator.associate(&doc, control);
            assert!((0.0..=1.0).contains(&result.confidence), "{id}: {result:?}");
        }
    }
}
