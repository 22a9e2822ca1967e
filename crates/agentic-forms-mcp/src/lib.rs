//! AgenticForms MCP server: form schema extraction over stdio for LLM agents.

pub mod config;
pub mod protocol;
pub mod resources;
pub mod session;
pub mod tools;
pub mod transport;
pub mod types;

pub use config::{load_config, resolve_config_path};
pub use protocol::ProtocolHandler;
pub use session::{PageSession, PageSnapshot, SharedSession};
pub use transport::StdioTransport;
