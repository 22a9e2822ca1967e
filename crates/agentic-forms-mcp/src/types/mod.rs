//! MCP data types used by the server.

pub mod capabilities;
pub mod error;
pub mod message;
pub mod notification;
pub mod params;
pub mod response;

pub use capabilities::*;
pub use error::*;
pub use message::*;
pub use notification::*;
pub use params::*;
pub use response::*;
