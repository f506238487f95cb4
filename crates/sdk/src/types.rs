//! SDK Response Types

use std::fmt;

/// How the remote command ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoteStatus {
    /// Exit code; 128 + N when the command was killed by signal N
    Code(i32),
    /// The daemon killed the command for running too long
    TimedOut,
}

impl RemoteStatus {
    pub fn code(&self) -> Option<i32> {
        match self {
            RemoteStatus::Code(code) => Some(*code),
            RemoteStatus::TimedOut => None,
        }
    }

    pub fn success(&self) -> bool {
        matches!(self, RemoteStatus::Code(0))
    }
}

impl fmt::Display for RemoteStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RemoteStatus::Code(code) => write!(f, "{}", code),
            RemoteStatus::TimedOut => f.write_str("timeout"),
        }
    }
}

/// Result of one remote command
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    pub status: RemoteStatus,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.status.success()
    }

    pub fn stdout_lossy(&self) -> String {
        String::from_utf8_lossy(&self.stdout).into_owned()
    }

    pub fn stderr_lossy(&self) -> String {
        String::from_utf8_lossy(&self.stderr).into_owned()
    }
}
