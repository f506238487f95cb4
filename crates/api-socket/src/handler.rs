//! Connection Handler
//!
//! One request, one execution, at most one response, then close.

use crate::codec::{decode_request, write_response};
use crate::error::{ConnectionError, ErrorCategory, ProtocolError};
use sockproc_core::constants::{DEFAULT_REQUEST_TIMEOUT, MAX_LINE_LEN};
use sockproc_core::port::CommandExecutor;
use sockproc_core::Termination;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt, BufStream};
use tokio::time::timeout;
use tracing::{debug, info, warn};

/// Per-connection limits
#[derive(Debug, Clone)]
pub struct HandlerConfig {
    /// Longest accepted request line, delimiter included
    pub max_line: usize,
    /// Time allowed for the whole request frame to arrive
    pub request_timeout: Duration,
}

impl Default for HandlerConfig {
    fn default() -> Self {
        Self {
            max_line: MAX_LINE_LEN,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }
}

/// What happened to a connection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandlerOutcome {
    /// A response was written for a command that ended this way
    Responded(Termination),
    /// The connection was closed without a response
    Dropped(ErrorCategory),
}

/// Handler with injected executor
pub struct ConnectionHandler {
    executor: Arc<dyn CommandExecutor>,
    config: HandlerConfig,
}

impl ConnectionHandler {
    pub fn new(executor: Arc<dyn CommandExecutor>, config: HandlerConfig) -> Self {
        Self { executor, config }
    }

    /// Serve exactly one request on `stream` and close it
    ///
    /// Errors never leave this function: a connection that cannot be answered is
    /// closed with nothing written.
    pub async fn handle<S>(&self, stream: S) -> HandlerOutcome
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let mut stream = BufStream::new(stream);

        let outcome = match self.serve(&mut stream).await {
            Ok(termination) => HandlerOutcome::Responded(termination),
            Err(e) => {
                let category = e.category();
                match &e {
                    ConnectionError::Protocol(ProtocolError::Incomplete) => {
                        debug!(error = %e, "Connection closed without a request")
                    }
                    _ => warn!(error = %e, category = category.as_str(), "Dropping connection"),
                }
                HandlerOutcome::Dropped(category)
            }
        };

        if let Err(e) = stream.shutdown().await {
            debug!(error = %e, "Shutdown of connection failed");
        }
        outcome
    }

    async fn serve<S>(&self, stream: &mut BufStream<S>) -> Result<Termination, ConnectionError>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let limit = self.config.request_timeout;
        let request = timeout(limit, decode_request(stream, self.config.max_line))
            .await
            .map_err(|_| ConnectionError::RequestTimeout(limit))??;

        debug!(
            command = %request.command_lossy(),
            input_len = request.input_len(),
            "Request decoded"
        );

        let outcome = self.executor.execute(request).await?;
        write_response(stream, &outcome).await?;

        info!(
            status = %outcome.termination,
            stdout_len = outcome.stdout.len(),
            stderr_len = outcome.stderr.len(),
            duration_ms = outcome.duration_ms,
            "Response sent"
        );

        Ok(outcome.termination)
    }
}
