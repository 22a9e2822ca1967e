//! Core data types for extracted form schemas.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A rendered bounding box in viewport coordinates (CSS pixels).
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn left(&self) -> f64 {
        self.x
    }

    pub fn top(&self) -> f64 {
        self.y
    }

    pub fn right(&self) -> f64 {
        self.x + self.width
    }

    pub fn bottom(&self) -> f64 {
        self.y + self.height
    }

    pub fn center(&self) -> (f64, f64) {
        (self.x + self.width / 2.0, self.y + self.height / 2.0)
    }

    /// True for zero/negative extents, non-finite values, or the all-zero sentinel.
    pub fn is_degenerate(&self) -> bool {
        let finite = [self.x, self.y, self.width, self.height]
            .iter()
            .all(|v| v.is_finite());
        !finite || self.width <= 0.0 || self.height <= 0.0
    }

    pub fn intersects(&self, other: &Rect) -> bool {
        self.left() < other.right()
            && other.left() < self.right()
            && self.top() < other.bottom()
            && other.top() < self.bottom()
    }
}

/// Size of the visible viewport.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Viewport {
    pub width: f64,
    pub height: f64,
}

impl Viewport {
    pub fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }

    pub fn rect(&self) -> Rect {
        Rect::new(0.0, 0.0, self.width, self.height)
    }
}

impl Default for Viewport {
    fn default() -> Self {
        Self::new(1280.0, 800.0)
    }
}

/// Which label strategy produced a [`LabelResult`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LabelSource {
    ForAttribute,
    WrappingLabel,
    AriaLabel,
    AriaLabelledby,
    Placeholder,
    Geometric,
    AncestorText,
    Fallback,
}

impl LabelSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            LabelSource::ForAttribute => "for-attribute",
            LabelSource::WrappingLabel => "wrapping-label",
            LabelSource::AriaLabel => "aria-label",
            LabelSource::AriaLabelledby => "aria-labelledby",
            LabelSource::Placeholder => "placeholder",
            LabelSource::Geometric => "geometric",
            LabelSource::AncestorText => "ancestor-text",
            LabelSource::Fallback => "fallback",
        }
    }
}

impl std::fmt::Display for LabelSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The label chosen for a field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabelResult {
    pub label: String,
    pub confidence: f64,
    pub source: LabelSource,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub debug: Option<String>,
}

impl LabelResult {
    pub fn new(label: impl Into<String>, confidence: f64, source: LabelSource) -> Self {
        Self {
            label: label.into(),
            confidence: clamp_unit(confidence),
            source,
            debug: None,
        }
    }

    pub fn with_debug(mut self, note: impl Into<String>) -> Self {
        self.debug = Some(note.into());
        self
    }

    /// Result used when no strategy finds anything.
    pub fn unlabeled() -> Self {
        Self::new("Unlabeled Field", 0.1, LabelSource::Fallback)
    }
}

/// Which selector strategy produced a [`SelectorCandidate`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SelectorSource {
    DataTestid,
    DataCy,
    DataTest,
    DataAutomationId,
    Id,
    Name,
    Autocomplete,
    Helper,
    TagType,
    ParentNth,
    FormNth,
    Universal,
}

impl SelectorSource {
    /// Manual attribute strategies get the larger uniqueness boost.
    pub fn is_manual(&self) -> bool {
        matches!(
            self,
            SelectorSource::DataTestid
                | SelectorSource::DataCy
                | SelectorSource::DataTest
                | SelectorSource::DataAutomationId
                | SelectorSource::Id
                | SelectorSource::Name
                | SelectorSource::Autocomplete
        )
    }
}

/// One selector guess with its trust score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectorCandidate {
    pub selector: String,
    pub confidence: f64,
    pub source: SelectorSource,
}

impl SelectorCandidate {
    pub fn new(selector: impl Into<String>, confidence: f64, source: SelectorSource) -> Self {
        Self {
            selector: selector.into(),
            confidence: clamp_unit(confidence),
            source,
        }
    }
}

/// The chosen selector plus ordered fallbacks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectorResult {
    pub primary: String,
    pub fallbacks: Vec<String>,
    pub confidence: f64,
}

impl SelectorResult {
    pub const UNIVERSAL: &'static str = "input, select, textarea";

    pub fn universal() -> Self {
        Self {
            primary: Self::UNIVERSAL.to_string(),
            fallbacks: Vec::new(),
            confidence: 0.1,
        }
    }
}

/// Attributes captured for every field.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FieldAttributes {
    pub name: Option<String>,
    pub id: Option<String>,
    #[serde(rename = "type")]
    pub input_type: Option<String>,
    pub placeholder: Option<String>,
    pub required: bool,
    pub autocomplete: Option<String>,
    pub aria_label: Option<String>,
    pub aria_labelledby: Option<String>,
}

/// One `<option>` of a selection list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldOption {
    pub value: String,
    pub text: String,
}

/// Schema for one discovered control.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractedFieldSchema {
    /// Discovery-order position within this pass only.
    pub index: usize,
    pub label: LabelResult,
    pub selector: SelectorResult,
    pub element_type: String,
    pub attributes: FieldAttributes,
    pub options: Option<Vec<FieldOption>>,
    pub bounding_box: Rect,
}

/// What caused an extraction pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Trigger {
    Manual,
    MutationObserver,
}

impl std::fmt::Display for Trigger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Trigger::Manual => f.write_str("manual"),
            Trigger::MutationObserver => f.write_str("mutation-observer"),
        }
    }
}

/// Result of one extraction pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractedFormSchema {
    pub fields: Vec<ExtractedFieldSchema>,
    pub url: String,
    pub timestamp: DateTime<Utc>,
    pub trigger: Trigger,
}

impl ExtractedFormSchema {
    pub fn empty(url: impl Into<String>, trigger: Trigger) -> Self {
        Self {
            fields: Vec::new(),
            url: url.into(),
            timestamp: Utc::now(),
            trigger,
        }
    }
}

/// Clamp a score into `[0, 1]`, mapping NaN to 0.
pub fn clamp_unit(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}

/// Round to four decimal places.
pub fn round4(value: f64) -> f64 {
    (value * 10_000.0).round() / 10_000.0
}

/// Errors that can occur in the forms library.
#[derive(thiserror::Error, Debug)]
pub enum FormsError {
    #[error("Invalid selector '{selector}': {message}")]
    InvalidSelector { selector: String, message: String },

    #[error("Discovery failed: {0}")]
    Discovery(String),

    #[error("Element {index} failed: {message}")]
    Element { index: usize, message: String },

    #[error("Selector helper error: {0}")]
    Helper(String),

    #[error("Document error: {0}")]
    Document(String),

    #[error("Config error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Extraction manager has shut down")]
    ManagerClosed,
}

/// Convenience result type.
pub type FormsResult<T> = Result<T, FormsError>;
