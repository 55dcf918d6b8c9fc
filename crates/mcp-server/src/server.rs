//! Main MCP server orchestration

use api_client::ApiSession;
use std::sync::Arc;
use tracing::{info, warn};

use crate::protocol::RequestHandler;
use crate::transport::{HttpTransport, StdioTransport};

/// Server mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ServerMode {
    /// stdio transport
    #[default]
    Stdio,
    /// HTTP transport
    Http { port: u16 },
}

/// MCP server
pub struct McpServer {
    handler: Arc<RequestHandler>,
    mode: ServerMode,
}

impl McpServer {
    pub fn new(session: Arc<ApiSession>) -> Self {
        Self {
            handler: Arc::new(RequestHandler::new(session)),
            mode: ServerMode::default(),
        }
    }

    /// Set the server mode
    pub fn with_mode(mut self, mode: ServerMode) -> Self {
        self.mode = mode;
        self
    }

    /// Try to load the API description before serving. Returns whether a
    /// document is now cached; failures only warn, the agent can still call
    /// `fetch_swagger_info` later.
    pub async fn discover_on_startup(&self) -> bool {
        let session = self.handler.session();
        let config = session.config();

        let source = match (&config.docs_url, &config.base_url) {
            (Some(_), _) => "API_DOCS_URL",
            (None, Some(_)) => "API_BASE_URL",
            (None, None) => return false,
        };

        info!("Attempting to fetch Swagger documentation using {}", source);
        match session.discover(None).await {
            Ok(_) => true,
            Err(e) => {
                warn!("Could not automatically fetch Swagger documentation: {}", e);
                info!("The AI will need to explicitly call fetch_swagger_info with the correct URL");
                false
            }
        }
    }

    /// Run the server
    pub async fn run(&self) -> std::io::Result<()> {
        match self.mode {
            ServerMode::Stdio => {
                info!("Starting MCP server in stdio mode");
                StdioTransport::new(self.handler.clone()).run().await
            }
            ServerMode::Http { port } => {
                info!("Starting MCP server in HTTP mode on port {}", port);
                HttpTransport::new(self.handler.clone(), port).run().await
            }
        }
    }
}
