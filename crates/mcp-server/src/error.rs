//! Error types for tool calls

use api_client::ClientError;
use thiserror::Error;

/// Why a tool call failed; reported to the agent as an error result
#[derive(Error, Debug)]
pub enum ToolError {
    #[error("{0}")]
    InvalidArguments(String),

    #[error("Unknown tool: {0}")]
    UnknownTool(String),

    /// A session operation failed while running `action`
    #[error("Failed to {action}: {source}")]
    Failed {
        action: &'static str,
        #[source]
        source: ClientError,
    },

    #[error(transparent)]
    Client(#[from] ClientError),
}

impl ToolError {
    pub(crate) fn failed(action: &'static str) -> impl FnOnce(ClientError) -> Self {
        move |source| Self::Failed { action, source }
    }
}
