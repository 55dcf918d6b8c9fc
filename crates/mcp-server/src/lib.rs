//! # mcp-server
//!
//! MCP (Model Context Protocol) server exposing a Swagger/OpenAPI described
//! API as five tools. Supports stdio and HTTP transports.

mod error;
pub mod protocol;
mod server;
pub mod tools;
pub mod transport;

pub use error::ToolError;
pub use protocol::{McpError, McpMessage, RequestHandler};
pub use server::{McpServer, ServerMode};
pub use tools::{tool_definitions, ToolExecutor};
pub use transport::{HttpTransport, StdioTransport};
