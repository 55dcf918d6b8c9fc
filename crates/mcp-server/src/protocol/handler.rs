//! MCP request handler

use api_client::ApiSession;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use super::types::*;
use crate::tools::{tool_definitions, ToolExecutor};

/// Handler for MCP requests. Takes `&self` so concurrent calls can share it.
pub struct RequestHandler {
    tool_executor: ToolExecutor,
    server_name: String,
    server_version: String,
    initialized: AtomicBool,
}

impl RequestHandler {
    pub fn new(session: Arc<ApiSession>) -> Self {
        Self {
            tool_executor: ToolExecutor::new(session),
            server_name: "Swagger MCP".to_string(),
            server_version: env!("CARGO_PKG_VERSION").to_string(),
            initialized: AtomicBool::new(false),
        }
    }

    pub fn session(&self) -> &Arc<ApiSession> {
        self.tool_executor.session()
    }

    /// Whether `initialize` has been received
    pub fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::Acquire)
    }

    /// Handle an incoming message; notifications and stray responses yield `None`
    pub async fn handle(&self, message: McpMessage) -> Option<McpMessage> {
        let McpMessage {
            jsonrpc,
            id,
            method,
            params,
            result,
            error,
        } = message;

        let Some(method) = method else {
            if result.is_some() || error.is_some() {
                debug!("Received unexpected response");
                return None;
            }
            return id.map(|id| McpMessage::error_response(Some(id), McpError::invalid_request()));
        };

        if jsonrpc != JSONRPC_VERSION {
            warn!("Rejecting message with jsonrpc version {:?}", jsonrpc);
            return id.map(|id| McpMessage::error_response(Some(id), McpError::invalid_request()));
        }

        let Some(id) = id else {
            self.handle_notification(&method, params);
            return None;
        };

        debug!(method = %method, "Handling request");

        let result = match method.as_str() {
            "initialize" => self.handle_initialize(params),
            "ping" => Ok(serde_json::json!({})),
            "tools/list" => self.handle_tools_list(),
            "tools/call" => self.handle_tools_call(params).await,
            _ => Err(McpError::method_not_found(&method)),
        };

        Some(match result {
            Ok(result) => McpMessage::response(id, result),
            Err(error) => McpMessage::error_response(Some(id), error),
        })
    }

    fn handle_notification(&self, method: &str, params: Option<Value>) {
        match method {
            "notifications/initialized" | "initialized" => info!("Client initialized"),
            "notifications/cancelled" => {
                // the transport aborts the task; nothing to do here
                match parse_params::<CancelledParams>(params) {
                    Ok(cancelled) => debug!(
                        request_id = %cancelled.request_id,
                        reason = cancelled.reason.as_deref().unwrap_or(""),
                        "Request cancelled"
                    ),
                    Err(e) => debug!("Malformed cancellation: {}", e.message),
                }
            }
            _ => debug!("Unknown notification: {}", method),
        }
    }

    fn handle_initialize(&self, params: Option<Value>) -> Result<Value, McpError> {
        let params: InitializeParams = match params {
            Some(params) => parse_params(Some(params))?,
            None => InitializeParams::default(),
        };

        match &params.client_info {
            Some(client) => info!(
                "Initializing session with client: {} v{}",
                client.name, client.version
            ),
            None => info!("Initializing session"),
        }
        if let Some(version) = params
            .protocol_version
            .as_deref()
            .filter(|version| *version != MCP_VERSION)
        {
            warn!("Client requested protocol {}, answering with {}", version, MCP_VERSION);
        }

        self.initialized.store(true, Ordering::Release);

        to_value(InitializeResult {
            protocol_version: MCP_VERSION.to_string(),
            capabilities: ServerCapabilities::default(),
            server_info: ServerInfo {
                name: self.server_name.clone(),
                version: self.server_version.clone(),
            },
        })
    }

    fn handle_tools_list(&self) -> Result<Value, McpError> {
        to_value(ToolsListResult {
            tools: tool_definitions(),
        })
    }

    async fn handle_tools_call(&self, params: Option<Value>) -> Result<Value, McpError> {
        let params: ToolCallParams = parse_params(params)?;

        let result = match self
            .tool_executor
            .execute(&params.name, params.arguments)
            .await
        {
            Ok(result) => result,
            Err(e) => {
                error!("Tool {} failed: {}", params.name, e);
                ToolCallResult::error(e.to_string())
            }
        };

        to_value(result)
    }
}

fn parse_params<T: DeserializeOwned>(params: Option<Value>) -> Result<T, McpError> {
    let params = params.ok_or_else(|| McpError::invalid_params("Missing params"))?;
    serde_json::from_value(params).map_err(|e| McpError::invalid_params(e.to_string()))
}

fn to_value<T: serde::Serialize>(value: T) -> Result<Value, McpError> {
    serde_json::to_value(value).map_err(|e| McpError::internal_error(e.to_string()))
}
