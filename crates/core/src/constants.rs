// Shared constants (no magic values in adapters)
use std::time::Duration;

/// Capacity of one output buffer segment (16 KiB)
pub const SEGMENT_CAPACITY: usize = 16384;

/// Size of a single read from a child's stdout/stderr pipe
pub const DRAIN_CHUNK_SIZE: usize = 8192;

/// Size of a single write into a child's stdin pipe
pub const INPUT_CHUNK_SIZE: usize = 2048;

/// Upper bound for one request line, delimiter included
pub const MAX_LINE_LEN: usize = 2048;

/// Request line delimiter
pub const LINE_DELIMITER: &[u8] = b"\r\n";

/// Shell used to interpret every command
pub const DEFAULT_SHELL: &str = "/bin/sh";

/// Flag telling the shell to read the command from its next argument
pub const DEFAULT_SHELL_FLAG: &str = "-c";

/// Time a client gets to send a complete request (30 seconds)
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Wait between SIGTERM and SIGKILL when a command overruns its timeout (5 seconds)
pub const GRACEFUL_KILL_TIMEOUT: Duration = Duration::from_secs(5);

/// How often a signalled process group is checked for survivors (20ms)
pub const GROUP_EXIT_POLL_INTERVAL: Duration = Duration::from_millis(20);

/// Pause after a failed accept (e.g. descriptor exhaustion) before retrying (100ms)
pub const ACCEPT_ERROR_BACKOFF: Duration = Duration::from_millis(100);

/// Time in-flight connections get to finish after shutdown is requested (5 seconds)
pub const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// Exit status reported when the shell binary does not exist (shell convention)
pub const EXIT_SHELL_NOT_FOUND: i32 = 127;

/// Exit status reported when the shell binary cannot be executed (shell convention)
pub const EXIT_SHELL_NOT_EXECUTABLE: i32 = 126;

/// Offset added to a signal number to form the reported status (shell convention)
pub const SIGNAL_STATUS_OFFSET: i32 = 128;
