//! sockproc - Main Entry Point
//!
//! Binds the socket, detaches, then serves until SIGINT or SIGTERM.

mod config;
mod logging;
mod pidfile;

use anyhow::{Context, Result};
use clap::Parser;
use config::Args;
use pidfile::PidFile;
use sockproc_api_socket::{BoundListener, SocketServer};
use sockproc_core::application::shutdown_channel;
use sockproc_core::VERSION;
use std::sync::Arc;
use tokio::signal::unix::{signal, SignalKind};
use tracing::info;

fn main() -> Result<()> {
    let args = Args::parse();
    args.validate()?;

    // Bind while still attached, so a taken address fails the launch visibly
    let bound = BoundListener::bind(&args.listen)
        .with_context(|| format!("cannot listen on {}", args.listen))?;

    if !args.foreground {
        daemonize()?;
    }

    let _pidfile = args
        .pidfile
        .as_ref()
        .map(PidFile::create)
        .transpose()
        .context("cannot write pid file")?;

    let _log_guard = logging::init(args.log_file.as_deref())?;

    info!(
        version = VERSION,
        listen = %args.listen,
        foreground = args.foreground,
        workdir = ?args.workdir,
        "sockproc starting"
    );

    // The runtime's worker threads must be created after the fork
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("cannot start tokio runtime")?;

    runtime.block_on(serve(&args, bound))?;

    info!("Shutdown complete.");
    Ok(())
}

async fn serve(args: &Args, bound: BoundListener) -> Result<()> {
    let listener = bound
        .into_tokio()
        .context("cannot register listener with the runtime")?;

    let mut sigterm = signal(SignalKind::terminate()).context("cannot install SIGTERM handler")?;
    let mut sigint = signal(SignalKind::interrupt()).context("cannot install SIGINT handler")?;

    let server = SocketServer::new(Arc::new(args.executor()), args.server_config());
    let (shutdown_tx, shutdown_rx) = shutdown_channel();

    let run = server.run(listener, shutdown_rx);
    tokio::pin!(run);

    let received = tokio::select! {
        result = &mut run => return result.context("server stopped unexpectedly"),
        _ = sigterm.recv() => "SIGTERM",
        _ = sigint.recv() => "SIGINT",
    };

    info!(signal = received, "Shutdown signal received. Exiting gracefully...");
    shutdown_tx.shutdown();

    run.await.context("server shutdown failed")
}

/// Detach from the terminal, keeping the working directory
#[cfg(target_os = "linux")]
fn daemonize() -> Result<()> {
    nix::unistd::daemon(true, false).context("cannot daemonize")
}

#[cfg(not(target_os = "linux"))]
fn daemonize() -> Result<()> {
    anyhow::bail!("background mode is only supported on Linux; pass --foreground")
}
