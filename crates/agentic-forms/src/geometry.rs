//! Spatial plausibility scoring between a control and a candidate label.
//!
//! Everything here is pure and total: malformed geometry never panics, it
//! just scores zero.

use serde::{Deserialize, Serialize};

use crate::config::GeometryConfig;
use crate::dom::{DomHost, NodeId};
use crate::types::{clamp_unit, Rect, Viewport};

const VERTICAL_WEIGHT: f64 = 0.6;
const HORIZONTAL_WEIGHT: f64 = 0.4;
const SAME_ROW_BONUS: f64 = 0.2;

/// Outcome of a proximity check.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProximityVerdict {
    pub is_valid: bool,
    pub confidence: f64,
    pub reason: String,
}

impl ProximityVerdict {
    fn rejected(reason: impl Into<String>) -> Self {
        Self {
            is_valid: false,
            confidence: 0.0,
            reason: reason.into(),
        }
    }
}

/// Where a second box sits relative to a first one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Layout {
    Above,
    Below,
    Left,
    Right,
    Overlapping,
    Distant,
}

/// Gap between nearest horizontal edges, 0 when the boxes overlap vertically.
pub fn vertical_distance(a: &Rect, b: &Rect) -> f64 {
    if a.bottom() < b.top() {
        b.top() - a.bottom()
    } else if b.bottom() < a.top() {
        a.top() - b.bottom()
    } else {
        0.0
    }
}

/// Difference between left edges.
pub fn horizontal_alignment(a: &Rect, b: &Rect) -> f64 {
    (a.left() - b.left()).abs()
}

pub fn same_row(a: &Rect, b: &Rect, tolerance: f64) -> bool {
    (a.center().1 - b.center().1).abs() <= tolerance
}

/// Score how plausible it is that `text` labels `control`.
pub fn validate_label_proximity(
    control: &Rect,
    text: &Rect,
    viewport: Viewport,
    config: &GeometryConfig,
    threshold: f64,
) -> ProximityVerdict {
    if control.is_degenerate() {
        return ProximityVerdict::rejected("control has no rendered size");
    }
    if text.is_degenerate() {
        return ProximityVerdict::rejected("candidate has no rendered size");
    }
    let screen = viewport.rect();
    if !control.intersects(&screen) || !text.intersects(&screen) {
        return ProximityVerdict::rejected("outside viewport");
    }

    let vd = vertical_distance(control, text);
    let ha = horizontal_alignment(control, text);
    if vd > config.max_vertical_distance || ha > config.max_horizontal_distance {
        return ProximityVerdict::rejected(format!("out of range (dy={vd:.0}, dx={ha:.0})"));
    }

    let row = same_row(control, text, config.same_row_tolerance);
    let mut score = VERTICAL_WEIGHT * (1.0 - vd / config.max_vertical_distance).max(0.0)
        + HORIZONTAL_WEIGHT * (1.0 - ha / config.max_horizontal_distance).max(0.0);
    if row {
        score += SAME_ROW_BONUS;
    }
    let confidence = clamp_unit(score);

    ProximityVerdict {
        is_valid: confidence >= threshold,
        confidence,
        reason: format!("dy={vd:.0} dx={ha:.0} same_row={row}"),
    }
}

/// Visibility gate: the node renders with non-zero width and height.
pub fn has_valid_dimensions(host: &dyn DomHost, node: NodeId) -> bool {
    let rect = host.bounding_box(node);
    rect.width > 0.0 && rect.height > 0.0
}

/// Classify where `other` sits relative to `anchor`. Diagnostic only.
pub fn layout_relationship(anchor: &Rect, other: &Rect, config: &GeometryConfig) -> Layout {
    if anchor.is_degenerate() || other.is_degenerate() {
        return Layout::Distant;
    }
    if anchor.intersects(other) {
        return Layout::Overlapping;
    }

    let vd = vertical_distance(anchor, other);
    let ha = horizontal_alignment(anchor, other);
    if vd > config.max_vertical_distance || ha > config.max_horizontal_distance {
        return Layout::Distant;
    }

    if same_row(anchor, other, config.same_row_tolerance) || vd == 0.0 {
        if other.right() <= anchor.left() {
            Layout::Left
        } else {
            Layout::Right
        }
    } else if other.bottom() <= anchor.top() {
        Layout::Above
    } else {
        Layout::Below
    }
}
