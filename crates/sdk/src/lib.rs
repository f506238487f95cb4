//! sockproc SDK - Rust Client Library
//!
//! Runs shell commands through a sockproc daemon.
//!
//! # Example
//!
//! ```no_run
//! use sockproc_sdk::{RemoteStatus, SockprocClient};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = SockprocClient::tcp(13000);
//!
//!     let output = client.execute("echo hello; exit 3", None).await?;
//!
//!     assert_eq!(output.status, RemoteStatus::Code(3));
//!     println!("{}", output.stdout_lossy());
//!
//!     Ok(())
//! }
//! ```

mod client;
mod error;
mod types;
mod wire;

pub use client::SockprocClient;
pub use error::{Result, SdkError};
pub use types::{CommandOutput, RemoteStatus};
