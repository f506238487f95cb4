//! The sockproc binary itself: startup order and signal-driven shutdown

use nix::sys::signal::{kill, Signal};
use nix::unistd::Pid;
use std::io::{Read, Write};
use std::os::unix::net::UnixStream;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::time::{Duration, Instant};

const STARTUP_TIMEOUT: Duration = Duration::from_secs(10);
const EXIT_TIMEOUT: Duration = Duration::from_secs(10);

/// A foreground daemon process, killed if a test fails before stopping it
struct DaemonProcess {
    child: Option<Child>,
}

impl DaemonProcess {
    fn spawn(args: &[&Path]) -> Self {
        let child = Command::new(env!("CARGO_BIN_EXE_sockproc"))
            .args(args)
            .arg("--foreground")
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .expect("start sockproc");
        Self { child: Some(child) }
    }

    fn pid(&self) -> u32 {
        self.child.as_ref().map(Child::id).unwrap_or_default()
    }

    fn signal(&self, signal: Signal) {
        kill(Pid::from_raw(self.pid() as i32), signal).expect("signal sockproc");
    }

    fn wait_for_exit(&mut self) -> ExitStatus {
        let mut child = self.child.take().expect("daemon already reaped");
        let deadline = Instant::now() + EXIT_TIMEOUT;
        loop {
            if let Some(status) = child.try_wait().expect("poll sockproc") {
                return status;
            }
            if Instant::now() > deadline {
                let _ = child.kill();
                panic!("sockproc did not exit in time");
            }
            std::thread::sleep(Duration::from_millis(20));
        }
    }
}

impl Drop for DaemonProcess {
    fn drop(&mut self) {
        if let Some(mut child) = self.child.take() {
            let _ = child.kill();
            let _ = child.wait();
        }
    }
}

fn temp_path(tag: &str, extension: &str) -> PathBuf {
    std::env::temp_dir().join(format!(
        "sockproc-bin-{}-{}.{}",
        tag,
        std::process::id(),
        extension
    ))
}

fn wait_for_socket(path: &Path) {
    let deadline = Instant::now() + STARTUP_TIMEOUT;
    while UnixStream::connect(path).is_err() {
        assert!(Instant::now() < deadline, "sockproc never started listening");
        std::thread::sleep(Duration::from_millis(20));
    }
}

fn exchange(path: &Path, request: &[u8]) -> Vec<u8> {
    let mut stream = UnixStream::connect(path).unwrap();
    stream.write_all(request).unwrap();
    stream.shutdown(std::net::Shutdown::Write).unwrap();
    let mut response = Vec::new();
    stream.read_to_end(&mut response).unwrap();
    response
}

fn assert_clean_exit_on(signal: Signal, tag: &str) {
    let socket = temp_path(tag, "sock");
    let pidfile = temp_path(tag, "pid");
    let mut daemon = DaemonProcess::spawn(&[&socket, &pidfile]);

    wait_for_socket(&socket);

    // A served request means the pid file is written and signal handlers are in place
    assert_eq!(exchange(&socket, b"echo hi\r\n"), b"status:0\n3\nhi\n0\n");
    assert_eq!(
        std::fs::read_to_string(&pidfile).unwrap(),
        daemon.pid().to_string()
    );

    daemon.signal(signal);
    let status = daemon.wait_for_exit();

    assert!(status.success(), "exit status {:?}", status);
    assert!(!socket.exists());
    assert!(!pidfile.exists());
}

#[test]
fn test_sigterm_removes_socket_and_pidfile() {
    assert_clean_exit_on(Signal::SIGTERM, "term");
}

#[test]
fn test_sigint_removes_socket_and_pidfile() {
    assert_clean_exit_on(Signal::SIGINT, "int");
}

#[test]
fn test_taken_address_fails_before_pidfile_is_written() {
    let socket = temp_path("taken", "sock");
    let first_pidfile = temp_path("taken-first", "pid");
    let second_pidfile = temp_path("taken-second", "pid");
    let mut first = DaemonProcess::spawn(&[&socket, &first_pidfile]);
    wait_for_socket(&socket);

    let mut second = DaemonProcess::spawn(&[&socket, &second_pidfile]);
    let status = second.wait_for_exit();

    assert!(!status.success());
    assert!(!second_pidfile.exists());
    // The running daemon keeps its socket and pid file
    assert_eq!(exchange(&socket, b"echo still\r\n"), b"status:0\n6\nstill\n0\n");
    assert!(first_pidfile.exists());

    first.signal(Signal::SIGTERM);
    assert!(first.wait_for_exit().success());
    assert!(!socket.exists());
}
