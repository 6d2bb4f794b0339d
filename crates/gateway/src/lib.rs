// # -----------------------------
// # crates/gateway/src/lib.rs
// # -----------------------------
//! Sandboxed, policy-gated file access for MCP clients.
//!
//! [`Dispatcher`] is the entry point: it rate-limits, bounds concurrency and applies
//! per-tool timeouts, then hands the call to the [`Gateway`] operation handlers.

mod dispatch;
mod error;
mod handlers;
pub mod limits;
mod result;
pub mod schema;

pub use dispatch::Dispatcher;
pub use error::{ErrorClass, GateError};
pub use handlers::Gateway;
pub use result::{TextContent, ToolResult};
pub use schema::{tool_definitions, ToolCall, ToolName};
