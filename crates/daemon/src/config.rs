//! Command-line configuration
//!
//! Every option can also come from a `SOCKPROC_*` environment variable.

use clap::Parser;
use sockproc_api_socket::{HandlerConfig, ListenAddr, ServerConfig};
use sockproc_core::constants::{
    DEFAULT_REQUEST_TIMEOUT, DEFAULT_SHELL, DEFAULT_SHELL_FLAG, GRACEFUL_KILL_TIMEOUT,
    MAX_LINE_LEN, SHUTDOWN_GRACE,
};
use sockproc_infra_system::{EnvPolicy, ShellConfig, ShellExecutor, ShellLauncher};
use std::path::PathBuf;
use std::time::Duration;

/// Run shell commands on behalf of clients of a local socket
#[derive(Parser, Debug, Clone)]
#[command(name = "sockproc", version, about)]
pub struct Args {
    /// UNIX socket path, or a TCP port number to listen on 127.0.0.1
    #[arg(env = "SOCKPROC_LISTEN")]
    pub listen: ListenAddr,

    /// Write the daemon's pid here
    #[arg(env = "SOCKPROC_PIDFILE")]
    pub pidfile: Option<PathBuf>,

    /// Stay attached to the terminal
    #[arg(long, env = "SOCKPROC_FOREGROUND")]
    pub foreground: bool,

    /// Shell used to interpret commands
    #[arg(long, env = "SOCKPROC_SHELL", default_value = DEFAULT_SHELL)]
    pub shell: PathBuf,

    /// Flag that makes the shell read the command from its next argument
    #[arg(
        long,
        env = "SOCKPROC_SHELL_FLAG",
        default_value = DEFAULT_SHELL_FLAG,
        allow_hyphen_values = true
    )]
    pub shell_flag: String,

    /// Kill commands running longer than this (no limit when unset)
    #[arg(long, env = "SOCKPROC_TIMEOUT_MS")]
    pub timeout_ms: Option<u64>,

    /// Wait between SIGTERM and SIGKILL for a timed-out command
    #[arg(long, env = "SOCKPROC_KILL_GRACE_MS", default_value_t = GRACEFUL_KILL_TIMEOUT.as_millis() as u64)]
    pub kill_grace_ms: u64,

    /// Drop clients that take longer than this to send a full request
    #[arg(long, env = "SOCKPROC_REQUEST_TIMEOUT_MS", default_value_t = DEFAULT_REQUEST_TIMEOUT.as_millis() as u64)]
    pub request_timeout_ms: u64,

    /// Longest accepted request line, CRLF included
    #[arg(long, env = "SOCKPROC_MAX_LINE", default_value_t = MAX_LINE_LEN)]
    pub max_line: usize,

    /// Run commands in this directory instead of the daemon's own
    #[arg(long, env = "SOCKPROC_WORKDIR")]
    pub workdir: Option<PathBuf>,

    /// Pass only these environment variables to commands (comma separated)
    #[arg(long, env = "SOCKPROC_ENV_ALLOWLIST", value_delimiter = ',')]
    pub env_allowlist: Vec<String>,

    /// Append logs to this file instead of stderr
    #[arg(long, env = "SOCKPROC_LOG_FILE")]
    pub log_file: Option<PathBuf>,
}

impl Args {
    /// Checks clap cannot express; run before binding anything
    pub fn validate(&self) -> anyhow::Result<()> {
        if let Some(dir) = &self.workdir {
            anyhow::ensure!(
                dir.is_dir(),
                "working directory {} is not a directory",
                dir.display()
            );
        }
        Ok(())
    }

    pub fn shell_config(&self) -> ShellConfig {
        let env = if self.env_allowlist.is_empty() {
            EnvPolicy::Inherit
        } else {
            EnvPolicy::Allowlist(self.env_allowlist.clone())
        };

        ShellConfig {
            shell_path: self.shell.clone(),
            shell_flag: self.shell_flag.clone(),
            env,
            working_dir: self.workdir.clone(),
        }
    }

    pub fn executor(&self) -> ShellExecutor {
        ShellExecutor::new(ShellLauncher::new(self.shell_config()))
            .with_timeout(self.timeout_ms.map(Duration::from_millis))
            .with_kill_grace(Duration::from_millis(self.kill_grace_ms))
    }

    pub fn server_config(&self) -> ServerConfig {
        ServerConfig {
            handler: HandlerConfig {
                max_line: self.max_line,
                request_timeout: Duration::from_millis(self.request_timeout_ms),
            },
            shutdown_grace: SHUTDOWN_GRACE,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    fn parse(argv: &[&str]) -> Args {
        Args::try_parse_from(argv).unwrap()
    }

    #[test]
    fn test_cli_definition_is_consistent() {
        Args::command().debug_assert();
    }

    #[test]
    fn test_defaults() {
        let args = parse(&["sockproc", "/tmp/sockproc.sock"]);

        assert_eq!(
            args.listen,
            ListenAddr::Unix(PathBuf::from("/tmp/sockproc.sock"))
        );
        assert_eq!(args.pidfile, None);
        assert!(!args.foreground);
        assert_eq!(args.timeout_ms, None);
        assert_eq!(args.max_line, MAX_LINE_LEN);

        let shell = args.shell_config();
        assert_eq!(shell.shell_path, PathBuf::from("/bin/sh"));
        assert_eq!(shell.shell_flag, "-c");
        assert_eq!(shell.env, EnvPolicy::Inherit);
        assert_eq!(shell.working_dir, None);

        let server = args.server_config();
        assert_eq!(server.handler.request_timeout, DEFAULT_REQUEST_TIMEOUT);
    }

    #[test]
    fn test_port_pidfile_and_foreground() {
        let args = parse(&["sockproc", "13000", "/tmp/sockproc.pid", "--foreground"]);

        assert_eq!(args.listen, ListenAddr::Tcp(13000));
        assert_eq!(args.pidfile, Some(PathBuf::from("/tmp/sockproc.pid")));
        assert!(args.foreground);
    }

    #[test]
    fn test_foreground_may_precede_positionals() {
        let args = parse(&["sockproc", "--foreground", "13000"]);

        assert!(args.foreground);
        assert_eq!(args.pidfile, None);
    }

    #[test]
    fn test_execution_options() {
        let args = parse(&[
            "sockproc",
            "13000",
            "--shell",
            "/bin/bash",
            "--shell-flag",
            "-lc",
            "--timeout-ms",
            "2500",
            "--max-line",
            "4096",
            "--env-allowlist",
            "PATH,HOME",
        ]);

        assert_eq!(args.timeout_ms, Some(2500));
        assert_eq!(args.server_config().handler.max_line, 4096);

        let shell = args.shell_config();
        assert_eq!(shell.shell_path, PathBuf::from("/bin/bash"));
        assert_eq!(shell.shell_flag, "-lc");
        assert_eq!(
            shell.env,
            EnvPolicy::Allowlist(vec!["PATH".to_string(), "HOME".to_string()])
        );
    }

    #[test]
    fn test_workdir_reaches_shell_config() {
        let args = parse(&["sockproc", "13000", "--workdir", "/"]);

        assert!(args.validate().is_ok());
        assert_eq!(args.shell_config().working_dir, Some(PathBuf::from("/")));
    }

    #[test]
    fn test_missing_workdir_fails_validation() {
        let args = parse(&["sockproc", "13000", "--workdir", "/nonexistent/sockproc-workdir"]);

        let err = args.validate().unwrap_err();

        assert!(err.to_string().contains("/nonexistent/sockproc-workdir"));
    }

    #[test]
    fn test_missing_listen_address_is_an_error() {
        assert!(Args::try_parse_from(["sockproc"]).is_err());
    }

    #[test]
    fn test_port_out_of_range_is_an_error() {
        assert!(Args::try_parse_from(["sockproc", "99999"]).is_err());
    }
}
