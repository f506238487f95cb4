//! Socket API Layer
//!
//! Line-framed request / length-prefixed response protocol served over a
//! UNIX-domain or loopback TCP socket. One request and one response per
//! connection.

pub mod codec;
pub mod error;
pub mod handler;
pub mod listener;
pub mod server;

pub use codec::{decode_request, encode_response, write_response};
pub use error::{ConnectionError, ErrorCategory, ProtocolError};
pub use handler::{ConnectionHandler, HandlerConfig, HandlerOutcome};
pub use listener::{BoundListener, ListenAddr, Listener};
pub use server::{ServerConfig, SocketServer};
