//! Swagger MCP server
//!
//! Exposes a Swagger/OpenAPI described HTTP API to MCP clients as five tools:
//! document discovery, endpoint listing, endpoint details, request execution
//! and coarse response validation.
//!
//! Logs go to stderr; in stdio mode stdout carries only protocol messages.

use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};

use api_client::{ApiConfig, ApiSession, DEFAULT_CONFIG_PATH, DEFAULT_SERVER_NAME, DEFAULT_TIMEOUT_SECS};
use mcp_server::{McpServer, ServerMode};

/// Swagger MCP - call any Swagger/OpenAPI described API through MCP tools
#[derive(Parser, Debug)]
#[command(name = "swagger-mcp-server")]
#[command(version)]
#[command(about = "Swagger MCP - expose a Swagger/OpenAPI described API as MCP tools")]
struct Args {
    /// Tool-scoped config file with `servers.<name>.env` entries
    #[arg(long, env = "MCP_CONFIG_PATH", default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Server entry to read from the config file
    #[arg(long, env = "MCP_SERVER_NAME", default_value = DEFAULT_SERVER_NAME)]
    server_name: String,

    /// Run in stdio mode (default)
    #[arg(long, conflicts_with = "http")]
    stdio: bool,

    /// Run in HTTP mode
    #[arg(long)]
    http: bool,

    /// Port for HTTP server
    #[arg(long, default_value_t = 3000)]
    port: u16,

    /// Timeout for each outbound API request, in seconds
    #[arg(long, env = "API_TIMEOUT_SECS", default_value_t = DEFAULT_TIMEOUT_SECS)]
    timeout_secs: u64,

    /// Skip fetching the API description at start-up
    #[arg(long)]
    no_discover: bool,
}

impl Args {
    fn mode(&self) -> ServerMode {
        if self.http {
            ServerMode::Http { port: self.port }
        } else {
            ServerMode::Stdio
        }
    }
}

fn init_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();

    std::panic::set_hook(Box::new(|panic| {
        error!("Panic: {}", panic);
    }));
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    init_logging();

    let config = ApiConfig::load(&args.config, &args.server_name)
        .with_timeout(Duration::from_secs(args.timeout_secs));
    config.log_summary();

    let session = Arc::new(
        ApiSession::new(config).map_err(|e| format!("Failed to initialize API session: {}", e))?,
    );

    let mode = args.mode();
    let server = McpServer::new(session).with_mode(mode);

    if !args.no_discover {
        server.discover_on_startup().await;
    }

    match mode {
        ServerMode::Stdio => info!("Swagger MCP server running on stdio"),
        ServerMode::Http { port } => info!("Swagger MCP server running on http://localhost:{}", port),
    }

    server
        .run()
        .await
        .map_err(|e| format!("MCP transport failed: {}", e))?;

    Ok(())
}
