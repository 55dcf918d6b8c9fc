//! stdio transport for MCP
//!
//! Newline-delimited JSON-RPC. Every request runs on its own task so slow API
//! calls do not hold up the rest of the session; responses go through a single
//! writer task so lines never interleave.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::task::AbortHandle;
use tracing::{debug, error, info, warn};

use crate::protocol::{error_codes, CancelledParams, McpError, McpMessage, RequestHandler};

type InFlight = Arc<Mutex<HashMap<String, AbortHandle>>>;

/// stdio transport for MCP protocol
pub struct StdioTransport {
    handler: Arc<RequestHandler>,
}

impl StdioTransport {
    pub fn new(handler: Arc<RequestHandler>) -> Self {
        Self { handler }
    }

    /// Serve stdin/stdout until stdin closes
    pub async fn run(&self) -> std::io::Result<()> {
        info!("Starting MCP server on stdio");
        self.serve(BufReader::new(tokio::io::stdin()), tokio::io::stdout())
            .await
    }

    /// Serve one session; returns once `reader` hits EOF and every in-flight
    /// request has answered or been cancelled
    pub async fn serve<R, W>(&self, reader: R, writer: W) -> std::io::Result<()>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let (tx, rx) = mpsc::unbounded_channel();
        let writer_task = tokio::spawn(write_messages(writer, rx));
        let in_flight: InFlight = Arc::default();

        let mut lines = reader.lines();
        while let Some(line) = lines.next_line().await? {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            debug!("Received: {}", line);

            let message: McpMessage = match serde_json::from_str(line) {
                Ok(message) => message,
                Err(e) => {
                    error!("Failed to parse message: {}", e);
                    let _ = tx.send(McpMessage::error_response(None, McpError::parse_error()));
                    continue;
                }
            };

            if message.is_request() {
                self.dispatch(message, &tx, &in_flight);
                continue;
            }

            if message.method.as_deref() == Some("notifications/cancelled") {
                cancel(&message, &in_flight);
            }
            if let Some(response) = self.handler.handle(message).await {
                let _ = tx.send(response);
            }
        }

        info!("EOF received, shutting down");
        drop(tx);

        match writer_task.await {
            Ok(result) => result,
            Err(e) => Err(std::io::Error::new(std::io::ErrorKind::Other, e)),
        }
    }

    /// Run a request on its own task. An id that is still in flight is
    /// rejected so cancellation and cleanup always reach the right task.
    fn dispatch(&self, message: McpMessage, tx: &UnboundedSender<McpMessage>, in_flight: &InFlight) {
        let id = message.id.clone().unwrap_or_default();
        let key = id.to_string();

        let task = {
            let mut running = lock(in_flight);
            if running.contains_key(&key) {
                warn!(request_id = %key, "Rejecting request with an id that is still in flight");
                let _ = tx.send(McpMessage::error_response(
                    Some(id),
                    McpError::new(
                        error_codes::INVALID_REQUEST,
                        format!("Request id {} is already in use", key),
                    ),
                ));
                return;
            }

            let handler = self.handler.clone();
            let task = tokio::spawn(async move { handler.handle(message).await });
            running.insert(key.clone(), task.abort_handle());
            task
        };

        let tx = tx.clone();
        let in_flight = in_flight.clone();
        tokio::spawn(async move {
            let outcome = task.await;
            lock(&in_flight).remove(&key);

            let response = match outcome {
                Ok(response) => response,
                Err(e) if e.is_cancelled() => {
                    debug!(request_id = %key, "Request aborted, no response sent");
                    None
                }
                Err(e) => {
                    error!(request_id = %key, "Request handler panicked: {}", e);
                    Some(McpMessage::error_response(
                        Some(id),
                        McpError::internal_error("Internal error while handling request"),
                    ))
                }
            };

            if let Some(response) = response {
                let _ = tx.send(response);
            }
        });
    }
}

fn cancel(message: &McpMessage, in_flight: &InFlight) {
    let Some(params) = message
        .params
        .clone()
        .and_then(|params| serde_json::from_value::<CancelledParams>(params).ok())
    else {
        return;
    };

    let key = params.request_id.to_string();
    match lock(in_flight).remove(&key) {
        Some(handle) => {
            info!(request_id = %key, "Cancelling in-flight request");
            handle.abort();
        }
        None => debug!(request_id = %key, "Cancellation for unknown or finished request"),
    }
}

fn lock(in_flight: &InFlight) -> std::sync::MutexGuard<'_, HashMap<String, AbortHandle>> {
    // poisoning cannot leave a map of abort handles inconsistent
    in_flight.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

async fn write_messages<W>(mut writer: W, mut rx: UnboundedReceiver<McpMessage>) -> std::io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    while let Some(message) = rx.recv().await {
        let line = serde_json::to_string(&message)?;
        debug!("Sending: {}", line);
        if let Err(e) = write_line(&mut writer, &line).await {
            warn!("Failed to write response: {}", e);
            return Err(e);
        }
    }
    Ok(())
}

async fn write_line<W: AsyncWrite + Unpin>(writer: &mut W, line: &str) -> std::io::Result<()> {
    writer.write_all(line.as_bytes()).await?;
    writer.write_all(b"\n").await?;
    writer.flush().await
}
