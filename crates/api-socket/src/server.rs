//! Socket Server
//!
//! Accept loop: every connection runs in its own tokio task. A task that
//! panics or fails is logged and forgotten; siblings and the loop carry on.

use crate::handler::{ConnectionHandler, HandlerConfig, HandlerOutcome};
use crate::listener::Listener;
use sockproc_core::application::{panic_message, ShutdownToken};
use sockproc_core::constants::{ACCEPT_ERROR_BACKOFF, SHUTDOWN_GRACE};
use sockproc_core::port::CommandExecutor;
use std::io;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::{JoinError, JoinSet};
use tracing::{debug, error, info, info_span, warn, Instrument};
use uuid::Uuid;

/// Server Configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub handler: HandlerConfig,
    /// How long in-flight connections may run after shutdown is requested
    pub shutdown_grace: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            handler: HandlerConfig::default(),
            shutdown_grace: SHUTDOWN_GRACE,
        }
    }
}

/// Socket Server
pub struct SocketServer {
    handler: Arc<ConnectionHandler>,
    shutdown_grace: Duration,
}

impl SocketServer {
    pub fn new(executor: Arc<dyn CommandExecutor>, config: ServerConfig) -> Self {
        Self {
            handler: Arc::new(ConnectionHandler::new(executor, config.handler)),
            shutdown_grace: config.shutdown_grace,
        }
    }

    /// Serve until `shutdown` fires, then drain and close the listener
    ///
    /// The listener's socket file (if any) is removed before returning.
    pub async fn run(&self, listener: Listener, mut shutdown: ShutdownToken) -> io::Result<()> {
        let addr = listener.local_addr()?;
        info!(addr = %addr, "Accepting connections");

        let mut connections: JoinSet<HandlerOutcome> = JoinSet::new();

        loop {
            tokio::select! {
                _ = shutdown.wait() => {
                    info!(in_flight = connections.len(), "Shutdown requested, no longer accepting");
                    break;
                }
                accepted = listener.accept() => match accepted {
                    Ok((stream, peer)) => {
                        let handler = self.handler.clone();
                        let span = info_span!("connection", id = %Uuid::new_v4(), peer = %peer);
                        connections.spawn(async move { handler.handle(stream).await }.instrument(span));
                    }
                    Err(e) => {
                        // Usually descriptor exhaustion; back off instead of spinning
                        error!(error = %e, "Accept failed");
                        tokio::time::sleep(ACCEPT_ERROR_BACKOFF).await;
                    }
                },
                Some(joined) = connections.join_next(), if !connections.is_empty() => {
                    log_joined(joined);
                }
            }
        }

        self.drain(&mut connections).await;
        listener.close()
    }

    async fn drain(&self, connections: &mut JoinSet<HandlerOutcome>) {
        if connections.is_empty() {
            return;
        }

        let drained = tokio::time::timeout(self.shutdown_grace, async {
            while let Some(joined) = connections.join_next().await {
                log_joined(joined);
            }
        })
        .await;

        if drained.is_err() {
            warn!(
                remaining = connections.len(),
                grace_ms = self.shutdown_grace.as_millis() as u64,
                "Aborting connections still running after shutdown grace"
            );
            connections.abort_all();
        }
    }
}

fn log_joined(joined: Result<HandlerOutcome, JoinError>) {
    match joined {
        Ok(outcome) => debug!(outcome = ?outcome, "Connection finished"),
        Err(e) if e.is_panic() => {
            let panic_msg = panic_message(&*e.into_panic());
            error!(panic_msg = %panic_msg, "Connection task panicked");
        }
        Err(e) => debug!(error = %e, "Connection task cancelled"),
    }
}
