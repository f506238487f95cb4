// Application Layer - lifecycle helpers shared by the server and the daemon

pub mod panic_guard;
pub mod shutdown;

// Re-exports
pub use panic_guard::panic_message;
pub use shutdown::{shutdown_channel, ShutdownSender, ShutdownToken};
