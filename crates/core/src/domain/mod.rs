// Domain Layer - per-connection values, never shared across connections

pub mod outcome;
pub mod request;

// Re-exports
pub use outcome::{ExecutionOutcome, Termination};
pub use request::Request;
