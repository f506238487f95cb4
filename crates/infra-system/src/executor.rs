// Shell executor - one execution session per request
// reason: tokio for concurrent pipe I/O, nix to signal the command's process group
use async_trait::async_trait;
use nix::errno::Errno;
use nix::sys::signal::{killpg, Signal};
use nix::unistd::Pid;
use std::io;
use std::time::{Duration, Instant};
use tokio::io::AsyncWriteExt;
use tokio::process::{Child, ChildStdin};
use tokio::time::{sleep, timeout, timeout_at};
use tracing::{debug, info, warn};

use sockproc_core::constants::{
    GRACEFUL_KILL_TIMEOUT, GROUP_EXIT_POLL_INTERVAL, INPUT_CHUNK_SIZE,
};
use sockproc_core::domain::{ExecutionOutcome, Request, Termination};
use sockproc_core::port::{CommandExecutor, ExecutionError};
use sockproc_core::OutputBuffer;

use crate::launcher::{LaunchError, ShellLauncher, SpawnedChild};

/// Runs each request as a shell subprocess and collects its output
///
/// stdin feeding, stdout draining, stderr draining and the child wait all make
/// progress concurrently, so a command may fill either pipe (or block on
/// stdin) without stalling the others.
///
/// Timeouts and abandoned sessions are enforced on the shell's whole process
/// group, so grandchildren and background jobs go down with it.
pub struct ShellExecutor {
    launcher: ShellLauncher,
    timeout: Option<Duration>,
    kill_grace: Duration,
}

impl ShellExecutor {
    /// Create an executor without a timeout
    ///
    /// # Example
    /// ```ignore
    /// let executor = ShellExecutor::new(ShellLauncher::default())
    ///     .with_timeout(Some(Duration::from_secs(60)));
    /// ```
    pub fn new(launcher: ShellLauncher) -> Self {
        Self {
            launcher,
            timeout: None,
            kill_grace: GRACEFUL_KILL_TIMEOUT,
        }
    }

    /// Bound the whole session; `None` waits for the child indefinitely
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Time between SIGTERM and SIGKILL, also used to bound the final drain
    pub fn with_kill_grace(mut self, kill_grace: Duration) -> Self {
        self.kill_grace = kill_grace;
        self
    }

    /// Outcome for a shell that failed to exec after the fork
    fn exec_failure(&self, err: &LaunchError, code: i32) -> ExecutionOutcome {
        let message = format!("sockproc: {}\n", err);
        ExecutionOutcome::new(
            Termination::Exited(code),
            OutputBuffer::new(),
            OutputBuffer::from(message.as_bytes()),
        )
    }

    /// Feed input, drain both pipes and reap the child
    async fn run_session(
        &self,
        spawned: SpawnedChild,
        input: &[u8],
    ) -> Result<(Termination, OutputBuffer, OutputBuffer), ExecutionError> {
        let pgid = spawned.pgid();
        let SpawnedChild {
            mut child,
            stdin,
            mut stdout,
            mut stderr,
            ..
        } = spawned;
        let mut group = GroupGuard::new(pgid);
        let mut out = OutputBuffer::new();
        let mut err = OutputBuffer::new();

        let session = async {
            let (_, _, _, status) = tokio::try_join!(
                feed_input(stdin, input),
                out.fill_from(&mut stdout),
                err.fill_from(&mut stderr),
                child.wait(),
            )?;
            Ok::<_, io::Error>(Termination::from_exit_status(status))
        };

        let termination = match self.timeout {
            None => session.await?,
            Some(limit) => match timeout(limit, session).await {
                Ok(result) => result?,
                Err(_) => {
                    // The shell may be gone already while a background job holds the pipes
                    let exited = child.try_wait()?;
                    warn!(
                        pgid = %pgid,
                        timeout_ms = limit.as_millis() as u64,
                        shell_exited = exited.is_some(),
                        "Command exceeded timeout, terminating process group"
                    );
                    self.kill_group(&mut child, pgid).await?;

                    // Whatever is still buffered in the pipes
                    let remaining = timeout(self.kill_grace, async {
                        tokio::try_join!(out.fill_from(&mut stdout), err.fill_from(&mut stderr))
                    })
                    .await;
                    if remaining.is_err() {
                        warn!("Output pipes still open after kill, returning partial output");
                    }

                    match exited {
                        Some(status) => Termination::from_exit_status(status),
                        None => Termination::TimedOut,
                    }
                }
            },
        };

        group.disarm();
        Ok((termination, out, err))
    }

    /// SIGTERM the whole process group, then SIGKILL whatever outlives the grace period
    async fn kill_group(&self, child: &mut Child, pgid: Pid) -> io::Result<()> {
        let deadline = tokio::time::Instant::now() + self.kill_grace;

        info!(pgid = %pgid, "Sending SIGTERM to process group");
        signal_group(pgid, Signal::SIGTERM);

        // Reap the shell first; after that only its descendants keep the group alive
        if timeout_at(deadline, child.wait()).await.is_ok() {
            while group_alive(pgid) && tokio::time::Instant::now() < deadline {
                sleep(GROUP_EXIT_POLL_INTERVAL).await;
            }
        }

        if group_alive(pgid) {
            warn!(pgid = %pgid, "Process group survived SIGTERM, sending SIGKILL");
            signal_group(pgid, Signal::SIGKILL);
        } else {
            info!(pgid = %pgid, "Process group exited after SIGTERM");
        }

        // Cached status if the shell was already reaped
        child.wait().await?;
        Ok(())
    }
}

/// SIGKILLs the command's process group unless the session finished
///
/// Fires when the session future is dropped (connection task aborted) or
/// bails out on an I/O error. `kill_on_drop` only reaches the shell itself.
struct GroupGuard {
    pgid: Pid,
    armed: bool,
}

impl GroupGuard {
    fn new(pgid: Pid) -> Self {
        Self { pgid, armed: true }
    }

    fn disarm(&mut self) {
        self.armed = false;
    }
}

impl Drop for GroupGuard {
    fn drop(&mut self) {
        if self.armed {
            debug!(pgid = %self.pgid, "Session abandoned, killing process group");
            signal_group(self.pgid, Signal::SIGKILL);
        }
    }
}

/// Signal every member of the group; an empty group is not an error
fn signal_group(pgid: Pid, signal: Signal) {
    match killpg(pgid, signal) {
        Ok(()) | Err(Errno::ESRCH) => {}
        Err(e) => warn!(pgid = %pgid, signal = ?signal, error = %e, "Failed to signal process group"),
    }
}

fn group_alive(pgid: Pid) -> bool {
    killpg(pgid, None).is_ok()
}

/// Write the request payload to the child's stdin, then close it
async fn feed_input(mut stdin: ChildStdin, input: &[u8]) -> io::Result<()> {
    for chunk in input.chunks(INPUT_CHUNK_SIZE) {
        match stdin.write_all(chunk).await {
            Ok(()) => {}
            // Child stopped reading (or exited); the rest of the input is discarded
            Err(e) if e.kind() == io::ErrorKind::BrokenPipe => {
                debug!(input_len = input.len(), "Child closed stdin early");
                return Ok(());
            }
            Err(e) => return Err(e),
        }
    }

    // EOF for the child
    drop(stdin);
    Ok(())
}

#[async_trait]
impl CommandExecutor for ShellExecutor {
    async fn execute(&self, request: Request) -> Result<ExecutionOutcome, ExecutionError> {
        let start = Instant::now();
        let command = request.command_lossy();

        info!(
            command = %command,
            input_len = request.input_len(),
            timeout_ms = ?self.timeout.map(|t| t.as_millis() as u64),
            "Starting command execution"
        );

        let spawned = match self.launcher.spawn(&request.command) {
            Ok(spawned) => spawned,
            Err(e) => match e.exit_code() {
                Some(code) => {
                    warn!(command = %command, error = %e, status = code, "Shell could not be executed");
                    return Ok(self.exec_failure(&e, code));
                }
                None => return Err(ExecutionError::SpawnFailed(e.to_string())),
            },
        };
        let pid = spawned.pid;

        let input = request.input.as_deref().unwrap_or_default();
        let (termination, stdout, stderr) = self.run_session(spawned, input).await?;

        let duration_ms = start.elapsed().as_millis() as u64;

        info!(
            command = %command,
            pid = pid,
            duration_ms = %duration_ms,
            status = %termination,
            stdout_len = stdout.len(),
            stderr_len = stderr.len(),
            "Command execution completed"
        );

        Ok(ExecutionOutcome::new(termination, stdout, stderr).with_duration_ms(duration_ms))
    }
}
