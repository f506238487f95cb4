//! Logging setup
//!
//! `SOCKPROC_LOG_FORMAT=json` selects JSON lines; anything else is pretty.
//! `RUST_LOG` overrides the default filter.

use anyhow::{Context, Result};
use std::fs::OpenOptions;
use std::path::Path;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const DEFAULT_FILTER: &str = "sockproc=info";

/// Install the global subscriber
///
/// With a log file, records go through a background writer whose guard must be
/// kept alive until exit so buffered lines are flushed.
pub fn init(log_file: Option<&Path>) -> Result<Option<WorkerGuard>> {
    let log_format = std::env::var("SOCKPROC_LOG_FORMAT").unwrap_or_else(|_| "pretty".to_string());

    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(DEFAULT_FILTER))
        .context("Failed to create env filter")?;

    let (writer, guard, ansi) = match log_file {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("cannot open log file {}", path.display()))?;
            let (non_blocking, guard) = tracing_appender::non_blocking(file);
            (BoxMakeWriter::new(non_blocking), Some(guard), false)
        }
        None => (BoxMakeWriter::new(std::io::stderr), None, true),
    };

    let registry = tracing_subscriber::registry().with(env_filter);
    match log_format.as_str() {
        "json" => registry
            .with(fmt::layer().json().with_writer(writer))
            .try_init()?,
        _ => registry
            .with(fmt::layer().pretty().with_ansi(ansi).with_writer(writer))
            .try_init()?,
    }

    Ok(guard)
}
