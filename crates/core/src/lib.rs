// sockproc Core - Domain values, output buffering & ports
// NO socket or process dependencies: those live in api-socket and infra-system

pub mod application;
pub mod buffer;
pub mod constants;
pub mod domain;
pub mod port;

pub use buffer::OutputBuffer;
pub use domain::{ExecutionOutcome, Request, Termination};
pub use port::{CommandExecutor, ExecutionError};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
