// Execution Outcome Domain Model

use std::fmt;
use std::process::ExitStatus;

use crate::buffer::OutputBuffer;
use crate::constants::SIGNAL_STATUS_OFFSET;

/// How the child process ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    /// Normal exit with the given code
    Exited(i32),
    /// Terminated by the given signal
    Signaled(i32),
    /// Stopped by the timeout escalation (SIGTERM, then SIGKILL)
    TimedOut,
}

impl Termination {
    pub fn from_exit_status(status: ExitStatus) -> Self {
        if let Some(code) = status.code() {
            return Self::Exited(code);
        }

        #[cfg(unix)]
        {
            use std::os::unix::process::ExitStatusExt;
            if let Some(signal) = status.signal() {
                return Self::Signaled(signal);
            }
        }

        Self::Exited(-1)
    }

    /// Numeric status as reported on the wire; `None` for a timed-out child
    pub fn code(&self) -> Option<i32> {
        match self {
            Self::Exited(code) => Some(*code),
            Self::Signaled(signal) => Some(SIGNAL_STATUS_OFFSET + signal),
            Self::TimedOut => None,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Exited(0))
    }
}

/// Renders the value of the `status:` response line
impl fmt::Display for Termination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.code() {
            Some(code) => write!(f, "{}", code),
            None => write!(f, "timeout"),
        }
    }
}

/// Everything collected from one finished child
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionOutcome {
    pub termination: Termination,
    pub stdout: OutputBuffer,
    pub stderr: OutputBuffer,
    pub duration_ms: u64,
}

impl ExecutionOutcome {
    pub fn new(termination: Termination, stdout: OutputBuffer, stderr: OutputBuffer) -> Self {
        Self {
            termination,
            stdout,
            stderr,
            duration_ms: 0,
        }
    }

    pub fn with_duration_ms(mut self, duration_ms: u64) -> Self {
        self.duration_ms = duration_ms;
        self
    }
}
