//! MCP tool implementations.

pub mod form_extract;
pub mod form_schema;
pub mod observer_control;
pub mod page_load;
pub mod page_mutate;
pub mod page_visibility;
pub mod registry;

pub use registry::ToolRegistry;
