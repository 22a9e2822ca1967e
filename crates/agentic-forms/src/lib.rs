//! AgenticForms: form field discovery, label and selector inference, and debounced re-extraction.

pub mod config;
pub mod dom;
pub mod extractor;
pub mod geometry;
pub mod label;
pub mod manager;
pub mod selector;
pub mod types;

pub use config::{ExtractionConfig, GeometryConfig, LabelConfig, SchedulerConfig, SelectorConfig};
pub use dom::{DomHost, HtmlDocument, NodeId};
pub use extractor::{
    DefaultFieldResolver, DocumentExtraction, ExtractionTask, FieldResolver, FormExtractor,
    ResolvedField, SharedDocument,
};
pub use geometry::{validate_label_proximity, ProximityVerdict};
pub use label::LabelAssociator;
pub use manager::{
    ChannelConsumer, ExtractionManager, ExtractionMessage, ManagerStatus, MutatedNode,
    MutationRecord, SchemaConsumer,
};
pub use selector::{HelperCache, HelperLoader, SelectorGenerator, SelectorHelper};
pub use types::*;
