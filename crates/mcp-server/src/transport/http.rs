//! HTTP transport for MCP

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing::{debug, error, info};

use crate::protocol::{McpError, McpMessage, RequestHandler};

/// HTTP transport for MCP protocol
pub struct HttpTransport {
    handler: Arc<RequestHandler>,
    port: u16,
}

impl HttpTransport {
    pub fn new(handler: Arc<RequestHandler>, port: u16) -> Self {
        Self { handler, port }
    }

    /// Bind and serve; a bind failure is returned to the caller
    pub async fn run(&self) -> std::io::Result<()> {
        let addr = format!("0.0.0.0:{}", self.port);
        info!("Starting MCP HTTP server on {}", addr);

        let listener = tokio::net::TcpListener::bind(&addr).await?;
        axum::serve(listener, router(self.handler.clone())).await
    }
}

/// Routes: `GET /` and `GET /health` for liveness, `POST /mcp` for JSON-RPC
pub fn router(handler: Arc<RequestHandler>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(health))
        .route("/health", get(health))
        .route("/mcp", post(handle_mcp_request))
        .layer(cors)
        .with_state(handler)
}

async fn health() -> &'static str {
    "OK"
}

/// Bodies that are not a JSON-RPC message get a parse error, as on stdio
async fn handle_mcp_request(State(handler): State<Arc<RequestHandler>>, body: String) -> Response {
    let message: McpMessage = match serde_json::from_str(&body) {
        Ok(message) => message,
        Err(e) => {
            error!("Failed to parse message: {}", e);
            return Json(McpMessage::error_response(None, McpError::parse_error())).into_response();
        }
    };

    debug!("HTTP request: {:?}", message.method);

    match handler.handle(message).await {
        Some(response) => Json(response).into_response(),
        None => StatusCode::ACCEPTED.into_response(),
    }
}
