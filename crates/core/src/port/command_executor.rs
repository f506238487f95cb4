// Command Executor Port
// Abstraction over "run one request to completion" (shell subprocess in production)

use crate::domain::{ExecutionOutcome, Request};
use async_trait::async_trait;
use thiserror::Error;

/// Execution errors
///
/// Any of these aborts the session: the connection is closed without a response.
#[derive(Error, Debug)]
pub enum ExecutionError {
    #[error("Spawn failed: {0}")]
    SpawnFailed(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Command Executor trait
///
/// Implementations:
/// - ShellExecutor (infra-system): spawns `<shell> <flag> <command>` with piped stdio
/// - MockCommandExecutor: canned outcomes for handler tests
#[async_trait]
pub trait CommandExecutor: Send + Sync {
    /// Run the request's command to completion and collect its output
    ///
    /// # Errors
    /// - ExecutionError::SpawnFailed if the child cannot be started
    /// - ExecutionError::Io if a pipe or the child wait fails
    async fn execute(&self, request: Request) -> Result<ExecutionOutcome, ExecutionError>;
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use crate::buffer::OutputBuffer;
    use crate::domain::Termination;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Mock executor behavior
    #[derive(Debug, Clone)]
    pub enum MockBehavior {
        /// Exit 0 with the request input on stdout and the command on stderr
        Echo,
        /// Always return this outcome
        Outcome(ExecutionOutcome),
        /// Always fail with message
        Fail(String),
        /// Panic with message (for fault isolation testing)
        Panic(String),
    }

    /// Mock Command Executor for testing
    pub struct MockCommandExecutor {
        behavior: MockBehavior,
        call_count: AtomicUsize,
    }

    impl MockCommandExecutor {
        pub fn new(behavior: MockBehavior) -> Self {
            Self {
                behavior,
                call_count: AtomicUsize::new(0),
            }
        }
        pub fn new_echo() -> Self {
            Self::new(MockBehavior::Echo)
        }
        pub fn new_fail(message: impl Into<String>) -> Self {
            Self::new(MockBehavior::Fail(message.into()))
        }
        pub fn new_panic_inducing(message: impl Into<String>) -> Self {
            Self::new(MockBehavior::Panic(message.into()))
        }
        pub fn call_count(&self) -> usize {
            self.call_count.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl CommandExecutor for MockCommandExecutor {
        async fn execute(&self, request: Request) -> Result<ExecutionOutcome, ExecutionError> {
            self.call_count.fetch_add(1, Ordering::SeqCst);

            match &self.behavior {
                MockBehavior::Echo => Ok(ExecutionOutcome::new(
                    Termination::Exited(0),
                    OutputBuffer::from(request.input.as_deref().unwrap_or_default()),
                    OutputBuffer::from(request.command.as_slice()),
                )),
                MockBehavior::Outcome(outcome) => Ok(outcome.clone()),
                MockBehavior::Fail(msg) => Err(ExecutionError::SpawnFailed(msg.clone())),
                MockBehavior::Panic(msg) => {
                    panic!("{}", msg); // Actually panic for fault isolation testing
                }
            }
        }
    }
}
