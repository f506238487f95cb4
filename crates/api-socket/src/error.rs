//! Connection Error Types
//!
//! Every error here ends the connection without a response; the category only
//! decides how loudly it is logged.

use sockproc_core::port::ExecutionError;
use std::io;
use std::time::Duration;
use thiserror::Error;

/// Errors while decoding a request frame
#[derive(Error, Debug)]
pub enum ProtocolError {
    #[error("connection closed before a complete request was read")]
    Incomplete,

    #[error("request line exceeds {limit} bytes")]
    LineTooLong { limit: usize },

    #[error("invalid input length: {0:?}")]
    InvalidLength(String),

    #[error("command contains a NUL byte")]
    InvalidCommand,

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

/// Errors that end one connection
#[derive(Error, Debug)]
pub enum ConnectionError {
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("no complete request within {0:?}")]
    RequestTimeout(Duration),

    #[error("execution error: {0}")]
    Execution(#[from] ExecutionError),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

/// Error taxonomy for logging
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Peer went away or the socket failed
    Transport,
    /// Bytes arrived but do not form a request
    Malformed,
    /// The command could not be started or its pipes failed
    Spawn,
}

impl ErrorCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCategory::Transport => "transport",
            ErrorCategory::Malformed => "malformed",
            ErrorCategory::Spawn => "spawn",
        }
    }
}

impl ConnectionError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            ConnectionError::Protocol(ProtocolError::Incomplete)
            | ConnectionError::Protocol(ProtocolError::Io(_))
            | ConnectionError::RequestTimeout(_)
            | ConnectionError::Io(_) => ErrorCategory::Transport,
            ConnectionError::Protocol(_) => ErrorCategory::Malformed,
            ConnectionError::Execution(_) => ErrorCategory::Spawn,
        }
    }
}
