//! Host-environment abstraction over a rendered document.
//!
//! Everything the pipeline needs from a browser (selector queries, tree
//! navigation, text, attributes, layout boxes, computed style) goes through
//! [`DomHost`], so scoring and strategy logic can be exercised against
//! synthetic fixtures without a rendering engine.

pub mod html;

pub use html::HtmlDocument;

use crate::types::{FormsResult, Rect, Viewport};

/// Opaque handle to a node of the current document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub(crate) usize);

impl NodeId {
    pub fn index(&self) -> usize {
        self.0
    }
}

/// Coarse node classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    Element,
    Text,
    Other,
}

/// The subset of computed style the pipeline reads.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ComputedStyle {
    pub display_none: bool,
    pub visibility_hidden: bool,
    pub opacity: f64,
}

impl Default for ComputedStyle {
    fn default() -> Self {
        Self {
            display_none: false,
            visibility_hidden: false,
            opacity: 1.0,
        }
    }
}

impl ComputedStyle {
    pub fn is_rendered(&self) -> bool {
        !self.display_none && !self.visibility_hidden && self.opacity > 0.0
    }
}

/// Read-only view of a live document. Methods never mutate the tree.
pub trait DomHost {
    /// URL of the page the document was loaded from.
    fn url(&self) -> &str;

    fn viewport(&self) -> Viewport;

    /// The document element (`<html>`).
    fn root(&self) -> NodeId;

    /// All attached elements matching `selector`, in document order.
    fn query_selector_all(&self, selector: &str) -> FormsResult<Vec<NodeId>>;

    /// Matching descendants of `scope` (excluding `scope`), in document order.
    fn query_selector_all_within(&self, scope: NodeId, selector: &str)
        -> FormsResult<Vec<NodeId>>;

    fn element_by_id(&self, id: &str) -> Option<NodeId>;

    fn parent_element(&self, node: NodeId) -> Option<NodeId>;

    /// Child nodes, text nodes included.
    fn children(&self, node: NodeId) -> Vec<NodeId>;

    fn kind(&self, node: NodeId) -> NodeKind;

    /// Lowercase tag name, `None` for non-elements.
    fn tag_name(&self, node: NodeId) -> Option<String>;

    fn attribute(&self, node: NodeId, name: &str) -> Option<String>;

    fn attributes(&self, node: NodeId) -> Vec<(String, String)>;

    /// Concatenated descendant text, like DOM `textContent`.
    fn text_content(&self, node: NodeId) -> String;

    /// Rendered box; the all-zero rect when the node has no layout.
    fn bounding_box(&self, node: NodeId) -> Rect;

    fn computed_style(&self, node: NodeId) -> ComputedStyle;

    fn is_connected(&self, node: NodeId) -> bool;
}

/// Tags treated as fillable form controls.
pub const FORM_CONTROL_TAGS: [&str; 3] = ["input", "select", "textarea"];

/// Subtrees that never contribute visible text.
const NON_RENDERED_TAGS: [&str; 4] = ["script", "style", "noscript", "template"];

pub fn is_form_control_tag(tag: &str) -> bool {
    FORM_CONTROL_TAGS
        .iter()
        .any(|t| t.eq_ignore_ascii_case(tag))
}

pub fn is_form_control(host: &dyn DomHost, node: NodeId) -> bool {
    host.tag_name(node)
        .is_some_and(|tag| is_form_control_tag(&tag))
}

/// Iterator over the parent-element chain of a node (nearest first).
pub struct Ancestors<'a> {
    host: &'a dyn DomHost,
    next: Option<NodeId>,
}

impl Iterator for Ancestors<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        let current = self.next?;
        self.next = self.host.parent_element(current);
        Some(current)
    }
}

pub fn ancestors(host: &dyn DomHost, node: NodeId) -> Ancestors<'_> {
    Ancestors {
        host,
        next: host.parent_element(node),
    }
}

/// True if `node` is `ancestor` or sits inside it.
pub fn contains(host: &dyn DomHost, ancestor: NodeId, node: NodeId) -> bool {
    node == ancestor || ancestors(host, node).any(|a| a == ancestor)
}

/// Collapse runs of whitespace to single spaces and trim.
pub fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Visible text of `node` with nested form controls stripped out.
pub fn text_without_controls(host: &dyn DomHost, node: NodeId) -> String {
    let mut out = String::new();
    collect_text(host, node, &mut out);
    collapse_whitespace(&out)
}

fn collect_text(host: &dyn DomHost, node: NodeId, out: &mut String) {
    match host.kind(node) {
        NodeKind::Text => {
            out.push_str(&host.text_content(node));
            out.push(' ');
        }
        NodeKind::Element => {
            if let Some(tag) = host.tag_name(node) {
                if is_form_control_tag(&tag) || NON_RENDERED_TAGS.contains(&tag.as_str()) {
                    return;
                }
            }
            for child in host.children(node) {
                collect_text(host, child, out);
            }
        }
        NodeKind::Other => {}
    }
}

/// Text nodes under `root` in document order, skipping the subtree of
/// `exclude` and anything inside non-rendered elements.
pub fn text_nodes_within(host: &dyn DomHost, root: NodeId, exclude: NodeId) -> Vec<NodeId> {
    let mut found = Vec::new();
    let mut stack = vec![root];
    while let Some(node) = stack.pop() {
        if node == exclude {
            continue;
        }
        match host.kind(node) {
            NodeKind::Text => found.push(node),
            NodeKind::Element => {
                let skip = host
                    .tag_name(node)
                    .is_some_and(|tag| NON_RENDERED_TAGS.contains(&tag.as_str()));
                if !skip {
                    let children = host.children(node);
                    stack.extend(children.into_iter().rev());
                }
            }
            NodeKind::Other => {}
        }
    }
    found
}

/// Computed-style and size visibility gate used by discovery.
pub fn is_visible(host: &dyn DomHost, node: NodeId) -> bool {
    host.computed_style(node).is_rendered() && crate::geometry::has_valid_dimensions(host, node)
}
