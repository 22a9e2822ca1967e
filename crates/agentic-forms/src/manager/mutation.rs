//! Mutation batches and the form-relevance pre-filter.

use scraper::{ElementRef, Html};
use serde::{Deserialize, Serialize};

use crate::dom::{is_form_control_tag, DomHost, FORM_CONTROL_TAGS};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MutationKind {
    #[default]
    ChildList,
    Attributes,
    CharacterData,
}

/// A node added to or removed from the document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MutatedNode {
    /// Uppercase element name (`INPUT`, `DIV`) or `#text`.
    pub node_name: String,
    /// Whether the subtree under this node holds a form control.
    #[serde(default)]
    pub contains_form_control: bool,
}

impl MutatedNode {
    pub fn new(node_name: impl Into<String>, contains_form_control: bool) -> Self {
        Self {
            node_name: node_name.into(),
            contains_form_control,
        }
    }

    /// True if the node is itself a control or wraps one.
    pub fn is_or_contains_form_control(&self) -> bool {
        is_form_control_tag(&self.node_name) || self.contains_form_control
    }

    /// Top-level nodes of an HTML fragment, as a mutation observer would
    /// report them when the fragment is inserted.
    pub fn from_fragment(fragment: &str) -> Vec<MutatedNode> {
        let html = Html::parse_fragment(fragment);
        let root = html.root_element();
        root.children()
            .filter_map(|child| {
                if let Some(el) = ElementRef::wrap(child) {
                    let contains = el
                        .descendants()
                        .skip(1)
                        .filter_map(ElementRef::wrap)
                        .any(|d| is_form_control_tag(d.value().name()));
                    Some(MutatedNode::new(el.value().name().to_ascii_uppercase(), contains))
                } else if child.value().is_text() {
                    Some(MutatedNode::new("#text", false))
                } else {
                    None
                }
            })
            .collect()
    }
}

/// One mutation-observer record.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct MutationRecord {
    #[serde(default)]
    pub kind: MutationKind,
    #[serde(default)]
    pub added_nodes: Vec<MutatedNode>,
    #[serde(default)]
    pub removed_nodes: Vec<MutatedNode>,
}

impl MutationRecord {
    pub fn child_list(added_nodes: Vec<MutatedNode>, removed_nodes: Vec<MutatedNode>) -> Self {
        Self {
            kind: MutationKind::ChildList,
            added_nodes,
            removed_nodes,
        }
    }

    pub fn touches_form_control(&self) -> bool {
        self.added_nodes
            .iter()
            .chain(&self.removed_nodes)
            .any(MutatedNode::is_or_contains_form_control)
    }

    /// Record describing a whole document being inserted.
    pub fn document_loaded(document: &dyn DomHost) -> Self {
        Self::child_list(control_nodes(document), Vec::new())
    }

    /// Record describing one document snapshot replacing another. Only the
    /// controls that differ between the two are reported.
    pub fn between(old: &dyn DomHost, new: &dyn DomHost) -> Self {
        let before = control_signatures(old);
        let after = control_signatures(new);

        let added = after
            .iter()
            .filter(|s| !before.contains(s))
            .map(|s| MutatedNode::new(s.0.to_ascii_uppercase(), false))
            .collect();
        let removed = before
            .iter()
            .filter(|s| !after.contains(s))
            .map(|s| MutatedNode::new(s.0.to_ascii_uppercase(), false))
            .collect();
        Self::child_list(added, removed)
    }
}

type Signature = (String, Option<String>, Option<String>, Option<String>);

fn control_signatures(host: &dyn DomHost) -> Vec<Signature> {
    let selector = FORM_CONTROL_TAGS.join(", ");
    host.query_selector_all(&selector)
        .unwrap_or_default()
        .into_iter()
        .filter_map(|node| {
            Some((
                host.tag_name(node)?,
                host.attribute(node, "id"),
                host.attribute(node, "name"),
                host.attribute(node, "type"),
            ))
        })
        .collect()
}

fn control_nodes(host: &dyn DomHost) -> Vec<MutatedNode> {
    control_signatures(host)
        .into_iter()
        .map(|s| MutatedNode::new(s.0.to_ascii_uppercase(), false))
        .collect()
}

/// A batch qualifies when it is not a bulk rewrite and at least one record
/// adds or removes a form control.
pub fn is_relevant(records: &[MutationRecord], bulk_limit: usize) -> bool {
    if records.len() > bulk_limit {
        return false;
    }
    records.iter().any(MutationRecord::touches_form_control)
}
