// sockproc Infrastructure - System Adapters
// Implements: CommandExecutor (shell subprocess with piped stdio)

pub mod executor;
pub mod launcher;

pub use executor::ShellExecutor;
pub use launcher::{EnvPolicy, LaunchError, ShellConfig, ShellLauncher, SpawnedChild};
