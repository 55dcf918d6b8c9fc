//! Tool definitions and execution

mod definitions;
mod executor;

pub use definitions::tool_definitions;
pub use executor::ToolExecutor;
