//! MCP resource implementations.

pub mod messages;
pub mod registry;
pub mod schema;
pub mod status;

pub use registry::ResourceRegistry;

pub const SCHEMA_LATEST_URI: &str = "forms://schema/latest";
pub const MESSAGES_URI: &str = "forms://messages";
pub const STATUS_URI: &str = "forms://status";
