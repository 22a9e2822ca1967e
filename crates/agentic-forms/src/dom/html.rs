//! Static-layout [`DomHost`] backed by the `scraper` HTML parser.
//!
//! Layout is not computed. Boxes come from inline absolute-position styles
//! (`left`, `top`, `width`, `height` in px) or from explicit overrides, which
//! is how a browser-side snapshot serializes `getBoundingClientRect()`.

use std::collections::{HashMap, HashSet};

use scraper::{ElementRef, Html, Node, Selector};

use super::{ComputedStyle, DomHost, NodeId, NodeKind};
use crate::types::{FormsError, FormsResult, Rect, Viewport};

/// A parsed HTML document with per-element layout boxes.
pub struct HtmlDocument {
    html: Html,
    url: String,
    viewport: Viewport,
    nodes: Vec<ego_tree::NodeId>,
    index: HashMap<ego_tree::NodeId, NodeId>,
    rects: HashMap<NodeId, Rect>,
    detached: HashSet<NodeId>,
}

impl HtmlDocument {
    /// Parse a full HTML document.
    pub fn parse(source: &str, url: impl Into<String>, viewport: Viewport) -> Self {
        let html = Html::parse_document(source);

        let mut nodes = Vec::new();
        let mut index = HashMap::new();
        for node in html.tree.root().descendants() {
            index.insert(node.id(), NodeId(nodes.len()));
            nodes.push(node.id());
        }

        let mut doc = Self {
            html,
            url: url.into(),
            viewport,
            nodes,
            index,
            rects: HashMap::new(),
            detached: HashSet::new(),
        };
        doc.rects = doc.inline_rects();
        doc
    }

    /// Parse with a blank URL and the default viewport.
    pub fn from_html(source: &str) -> Self {
        Self::parse(source, "about:blank", Viewport::default())
    }

    /// Override the layout box of one node.
    pub fn set_rect(&mut self, node: NodeId, rect: Rect) {
        self.rects.insert(node, rect);
    }

    /// Override the layout box of every element matching `selector`.
    /// Returns how many elements were updated.
    pub fn set_rect_for_selector(&mut self, selector: &str, rect: Rect) -> FormsResult<usize> {
        let matches = self.query_selector_all(selector)?;
        for node in &matches {
            self.rects.insert(*node, rect);
        }
        Ok(matches.len())
    }

    /// Detach a subtree. Queries skip it and `is_connected` reports false.
    pub fn remove(&mut self, node: NodeId) {
        let Some(root) = self.node_ref(node) else {
            return;
        };
        let removed: Vec<NodeId> = root
            .descendants()
            .filter_map(|n| self.index.get(&n.id()).copied())
            .collect();
        self.detached.extend(removed);
    }

    pub fn set_viewport(&mut self, viewport: Viewport) {
        self.viewport = viewport;
    }

    fn node_ref(&self, node: NodeId) -> Option<ego_tree::NodeRef<'_, Node>> {
        let id = self.nodes.get(node.0)?;
        self.html.tree.get(*id)
    }

    fn element(&self, node: NodeId) -> Option<ElementRef<'_>> {
        self.node_ref(node).and_then(ElementRef::wrap)
    }

    fn handle(&self, id: ego_tree::NodeId) -> Option<NodeId> {
        self.index.get(&id).copied()
    }

    fn parse_selector(selector: &str) -> FormsResult<Selector> {
        Selector::parse(selector).map_err(|e| FormsError::InvalidSelector {
            selector: selector.to_string(),
            message: e.to_string(),
        })
    }

    fn inline_rects(&self) -> HashMap<NodeId, Rect> {
        let mut rects = HashMap::new();
        for (i, id) in self.nodes.iter().enumerate() {
            let Some(el) = self.html.tree.get(*id).and_then(ElementRef::wrap) else {
                continue;
            };
            if let Some(rect) = el.value().attr("style").and_then(rect_from_style) {
                rects.insert(NodeId(i), rect);
            }
        }
        rects
    }

    fn own_style(&self, node: NodeId) -> Option<HashMap<String, String>> {
        self.element(node)
            .and_then(|el| el.value().attr("style").map(parse_style))
    }
}

impl DomHost for HtmlDocument {
    fn url(&self) -> &str {
        &self.url
    }

    fn viewport(&self) -> Viewport {
        self.viewport
    }

    fn root(&self) -> NodeId {
        let root = self.html.root_element().id();
        self.handle(root).unwrap_or(NodeId(0))
    }

    fn query_selector_all(&self, selector: &str) -> FormsResult<Vec<NodeId>> {
        let parsed = Self::parse_selector(selector)?;
        Ok(self
            .html
            .select(&parsed)
            .filter_map(|el| self.handle(el.id()))
            .filter(|n| !self.detached.contains(n))
            .collect())
    }

    fn query_selector_all_within(
        &self,
        scope: NodeId,
        selector: &str,
    ) -> FormsResult<Vec<NodeId>> {
        let parsed = Self::parse_selector(selector)?;
        let Some(scope_el) = self.element(scope) else {
            return Ok(Vec::new());
        };
        Ok(scope_el
            .select(&parsed)
            .filter_map(|el| self.handle(el.id()))
            .filter(|n| *n != scope && !self.detached.contains(n))
            .collect())
    }

    fn element_by_id(&self, id: &str) -> Option<NodeId> {
        self.html
            .tree
            .root()
            .descendants()
            .filter_map(ElementRef::wrap)
            .find(|el| {
                el.value().attr("id") == Some(id)
                    && self
                        .handle(el.id())
                        .is_some_and(|n| !self.detached.contains(&n))
            })
            .and_then(|el| self.handle(el.id()))
    }

    fn parent_element(&self, node: NodeId) -> Option<NodeId> {
        let parent = self.node_ref(node)?.parent()?;
        if parent.value().is_element() {
            self.handle(parent.id())
        } else {
            None
        }
    }

    fn children(&self, node: NodeId) -> Vec<NodeId> {
        self.node_ref(node)
            .map(|n| n.children().filter_map(|c| self.handle(c.id())).collect())
            .unwrap_or_default()
    }

    fn kind(&self, node: NodeId) -> NodeKind {
        match self.node_ref(node).map(|n| n.value()) {
            Some(Node::Element(_)) => NodeKind::Element,
            Some(Node::Text(_)) => NodeKind::Text,
            _ => NodeKind::Other,
        }
    }

    fn tag_name(&self, node: NodeId) -> Option<String> {
        self.element(node)
            .map(|el| el.value().name().to_ascii_lowercase())
    }

    fn attribute(&self, node: NodeId, name: &str) -> Option<String> {
        self.element(node)
            .and_then(|el| el.value().attr(name).map(String::from))
    }

    fn attributes(&self, node: NodeId) -> Vec<(String, String)> {
        self.element(node)
            .map(|el| {
                el.value()
                    .attrs()
                    .map(|(k, v)| (k.to_string(), v.to_string()))
                    .collect()
            })
            .unwrap_or_default()
    }

    fn text_content(&self, node: NodeId) -> String {
        let Some(node_ref) = self.node_ref(node) else {
            return String::new();
        };
        match node_ref.value() {
            Node::Text(text) => {
                let text: &str = text;
                text.to_string()
            }
            Node::Element(_) => ElementRef::wrap(node_ref)
                .map(|el| el.text().collect::<String>())
                .unwrap_or_default(),
            _ => String::new(),
        }
    }

    fn bounding_box(&self, node: NodeId) -> Rect {
        if self.detached.contains(&node) || !self.computed_style(node).is_rendered() {
            return Rect::default();
        }
        match self.kind(node) {
            NodeKind::Element => self.rects.get(&node).copied().unwrap_or_default(),
            NodeKind::Text => self
                .parent_element(node)
                .and_then(|p| self.rects.get(&p).copied())
                .unwrap_or_default(),
            NodeKind::Other => Rect::default(),
        }
    }

    /// Inline styles only. `display: none` on any ancestor hides the node,
    /// `visibility` inherits from the nearest ancestor that sets it, and
    /// opacity multiplies down the chain.
    fn computed_style(&self, node: NodeId) -> ComputedStyle {
        let mut style = ComputedStyle::default();
        let mut visibility_set = false;

        let start = match self.kind(node) {
            NodeKind::Element => Some(node),
            _ => self.parent_element(node),
        };
        let mut current = start;
        while let Some(n) = current {
            if let Some(props) = self.own_style(n) {
                if props.get("display").is_some_and(|v| v == "none") {
                    style.display_none = true;
                }
                if !visibility_set {
                    if let Some(v) = props.get("visibility") {
                        style.visibility_hidden = v == "hidden" || v == "collapse";
                        visibility_set = true;
                    }
                }
                if let Some(opacity) = props.get("opacity").and_then(|v| v.parse::<f64>().ok()) {
                    style.opacity *= opacity.clamp(0.0, 1.0);
                }
            }
            if self.attribute(n, "hidden").is_some() {
                style.display_none = true;
            }
            current = self.parent_element(n);
        }
        style
    }

    fn is_connected(&self, node: NodeId) -> bool {
        node.0 < self.nodes.len() && !self.detached.contains(&node)
    }
}

/// Parse an inline `style` attribute into lowercase property/value pairs.
fn parse_style(style: &str) -> HashMap<String, String> {
    style
        .split(';')
        .filter_map(|decl| {
            let (prop, value) = decl.split_once(':')?;
            let value = value.trim().trim_end_matches("!important").trim();
            Some((prop.trim().to_ascii_lowercase(), value.to_ascii_lowercase()))
        })
        .collect()
}

fn parse_px(value: &str) -> Option<f64> {
    value.trim().trim_end_matches("px").trim().parse().ok()
}

fn rect_from_style(style: &str) -> Option<Rect> {
    let props = parse_style(style);
    let width = props.get("width").and_then(|v| parse_px(v))?;
    let height = props.get("height").and_then(|v| parse_px(v))?;
    let x = props.get("left").and_then(|v| parse_px(v)).unwrap_or(0.0);
    let y = props.get("top").and_then(|v| parse_px(v)).unwrap_or(0.0);
    Some(Rect::new(x, y, width, height))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_inline_style_layout() {
        let doc = HtmlDocument::from_html(
            r#"<input id="a" style="left: 100px; top: 50px; width: 150px; height: 30px">"#,
        );
        let input = doc.element_by_id("a").unwrap();
        assert_eq!(doc.bounding_box(input), Rect::new(100.0, 50.0, 150.0, 30.0));
    }

    #[test]
    fn test_text_node_uses_parent_box() {
        let doc = HtmlDocument::from_html(
            r#"<span id="s" style="left:5px;top:6px;width:7px;height:8px">hi</span>"#,
        );
        let span = doc.element_by_id("s").unwrap();
        let text = doc.children(span)[0];
        assert_eq!(doc.kind(text), NodeKind::Text);
        assert_eq!(doc.bounding_box(text), Rect::new(5.0, 6.0, 7.0, 8.0));
    }

    #[test]
    fn test_hidden_ancestor_zeroes_layout() {
        let doc = HtmlDocument::from_html(
            r#"<div style="display:none"><input id="a" style="width:10px;height:10px"></div>
               <input id="b" style="width:10px;height:10px;opacity:0">"#,
        );
        let a = doc.element_by_id("a").unwrap();
        let b = doc.element_by_id("b").unwrap();
        assert!(doc.computed_style(a).display_none);
        assert_eq!(doc.bounding_box(a), Rect::default());
        assert_eq!(doc.computed_style(b).opacity, 0.0);
    }

    #[test]
    fn test_invalid_selector_is_error() {
        let doc = HtmlDocument::from_html("<input>");
        assert!(matches!(
            doc.query_selector_all("input[[["),
            Err(FormsError::InvalidSelector { .. })
        ));
    }

    #[test]
    fn test_remove_detaches_subtree() {
        let mut doc = HtmlDocument::from_html(r#"<div id="d"><input id="i"></div>"#);
        let div = doc.element_by_id("d").unwrap();
        let input = doc.element_by_id("i").unwrap();
        doc.remove(div);
        assert!(!doc.is_connected(input));
        assert!(doc.query_selector_all("input").unwrap().is_empty());
        assert!(doc.element_by_id("i").is_none());
    }

    #[test]
    fn test_set_rect_for_selector() {
        let mut doc = HtmlDocument::from_html(r#"<input name="a"><input name="b">"#);
        let count = doc
            .set_rect_for_selector("input", Rect::new(1.0, 2.0, 3.0, 4.0))
            .unwrap();
        assert_eq!(count, 2);
        let inputs = doc.query_selector_all("input").unwrap();
        assert_eq!(doc.bounding_box(inputs[1]), Rect::new(1.0, 2.0, 3.0, 4.0));
    }

    #[test]
    fn test_query_within_excludes_scope() {
        let doc = HtmlDocument::from_html(r#"<div id="outer"><div id="inner"></div></div>"#);
        let outer = doc.element_by_id("outer").unwrap();
        let inner = doc.element_by_id("inner").unwrap();
        assert_eq!(doc.query_selector_all_within(outer, "div").unwrap(), vec![inner]);
    }
}
