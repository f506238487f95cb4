// Shell launcher - spawns `<shell> <flag> <command>` with all three stdio streams piped
// reason: nix for the process group id handed to the executor
//
// std/tokio create every descriptor close-on-exec, so the listening and client
// sockets never reach the shell. Only the three pipe ends are dup'ed onto 0/1/2.
use std::ffi::{OsStr, OsString};
use std::io;
use std::os::unix::ffi::OsStrExt;
use std::path::PathBuf;
use std::process::Stdio;
use nix::unistd::Pid;
use thiserror::Error;
use tokio::process::{Child, ChildStderr, ChildStdin, ChildStdout, Command};
use tracing::debug;

use sockproc_core::constants::{
    DEFAULT_SHELL, DEFAULT_SHELL_FLAG, EXIT_SHELL_NOT_EXECUTABLE, EXIT_SHELL_NOT_FOUND,
};

/// Which environment the shell receives
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnvPolicy {
    /// Pass the daemon's environment through unchanged
    Inherit,
    /// Start from an empty environment and copy only these variables
    Allowlist(Vec<String>),
}

/// Shell invocation settings
#[derive(Debug, Clone)]
pub struct ShellConfig {
    pub shell_path: PathBuf,
    pub shell_flag: String,
    pub env: EnvPolicy,
    pub working_dir: Option<PathBuf>,
}

impl Default for ShellConfig {
    fn default() -> Self {
        Self {
            shell_path: PathBuf::from(DEFAULT_SHELL),
            shell_flag: DEFAULT_SHELL_FLAG.to_string(),
            env: EnvPolicy::Inherit,
            working_dir: None,
        }
    }
}

/// Launch errors
#[derive(Error, Debug)]
pub enum LaunchError {
    /// The shell image could not be executed in the child
    #[error("cannot execute {shell}: {source}")]
    Exec {
        shell: String,
        #[source]
        source: io::Error,
    },

    /// The configured working directory is missing or not a directory
    #[error("working directory {dir} is unusable: {source}")]
    WorkingDir {
        dir: String,
        #[source]
        source: io::Error,
    },

    /// Pipe, fork or descriptor allocation failed
    #[error("spawn failed: {0}")]
    Resource(#[source] io::Error),
}

impl LaunchError {
    /// Status to report for failures that happen after the fork, if any
    pub fn exit_code(&self) -> Option<i32> {
        match self {
            LaunchError::Exec { source, .. } if source.kind() == io::ErrorKind::NotFound => {
                Some(EXIT_SHELL_NOT_FOUND)
            }
            LaunchError::Exec { .. } => Some(EXIT_SHELL_NOT_EXECUTABLE),
            LaunchError::WorkingDir { .. } | LaunchError::Resource(_) => None,
        }
    }
}

/// A running child and the parent-side ends of its pipes
///
/// The shell leads its own process group (pgid == pid), so everything it
/// forks can be signalled together. The shell alone is killed if this value
/// (or the `Child` taken out of it) is dropped before being reaped.
pub struct SpawnedChild {
    pub child: Child,
    pub pid: u32,
    pub stdin: ChildStdin,
    pub stdout: ChildStdout,
    pub stderr: ChildStderr,
}

impl SpawnedChild {
    /// Process group of the shell and its descendants
    pub fn pgid(&self) -> Pid {
        Pid::from_raw(self.pid as i32)
    }
}

/// Spawns shell-interpreted commands
#[derive(Debug, Clone, Default)]
pub struct ShellLauncher {
    config: ShellConfig,
}

impl ShellLauncher {
    pub fn new(config: ShellConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ShellConfig {
        &self.config
    }

    /// Copy the allowlisted variables out of the daemon's environment
    fn filter_env(&self, allowlist: &[String]) -> Vec<(String, OsString)> {
        allowlist
            .iter()
            .filter_map(|name| std::env::var_os(name).map(|value| (name.clone(), value)))
            .collect()
    }

    /// A failed chdir and a failed exec both surface as ENOENT/EACCES from spawn
    fn classify(&self, err: io::Error) -> LaunchError {
        if let Some(dir) = &self.config.working_dir {
            if !dir.is_dir() {
                return LaunchError::WorkingDir {
                    dir: dir.display().to_string(),
                    source: err,
                };
            }
        }

        match err.kind() {
            io::ErrorKind::NotFound | io::ErrorKind::PermissionDenied => LaunchError::Exec {
                shell: self.config.shell_path.display().to_string(),
                source: err,
            },
            _ => LaunchError::Resource(err),
        }
    }

    /// Spawn `<shell> <flag> <command>` with piped stdin/stdout/stderr
    pub fn spawn(&self, command: &[u8]) -> Result<SpawnedChild, LaunchError> {
        let mut cmd = Command::new(&self.config.shell_path);
        cmd.arg(&self.config.shell_flag)
            .arg(OsStr::from_bytes(command))
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .process_group(0)
            .kill_on_drop(true);

        if let Some(dir) = &self.config.working_dir {
            cmd.current_dir(dir);
        }

        if let EnvPolicy::Allowlist(names) = &self.config.env {
            cmd.env_clear().envs(self.filter_env(names));
        }

        let mut child = cmd.spawn().map_err(|e| self.classify(e))?;

        let (Some(pid), Some(stdin), Some(stdout), Some(stderr)) = (
            child.id(),
            child.stdin.take(),
            child.stdout.take(),
            child.stderr.take(),
        ) else {
            return Err(LaunchError::Resource(io::Error::new(
                io::ErrorKind::Other,
                "spawned shell is missing its pid or a stdio pipe",
            )));
        };

        debug!(pid = pid, shell = %self.config.shell_path.display(), "Spawned shell");

        Ok(SpawnedChild {
            child,
            pid,
            stdin,
            stdout,
            stderr,
        })
    }
}
