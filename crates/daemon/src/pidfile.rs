//! Pid file, removed when dropped

use std::io;
use std::path::{Path, PathBuf};
use tracing::warn;

#[derive(Debug)]
pub struct PidFile {
    path: PathBuf,
}

impl PidFile {
    /// Write the current process id to `path`, replacing any previous content
    pub fn create(path: impl Into<PathBuf>) -> io::Result<Self> {
        let path = path.into();
        std::fs::write(&path, std::process::id().to_string())?;
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for PidFile {
    fn drop(&mut self) {
        match std::fs::remove_file(&self.path) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => warn!(path = %self.path.display(), error = %e, "Failed to remove pid file"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_pid_path(tag: &str) -> PathBuf {
        std::env::temp_dir().join(format!("sockproc-{}-{}.pid", tag, std::process::id()))
    }

    #[test]
    fn test_writes_own_pid() {
        let path = temp_pid_path("write");
        let pidfile = PidFile::create(&path).unwrap();

        let content = std::fs::read_to_string(pidfile.path()).unwrap();
        assert_eq!(content, std::process::id().to_string());
    }

    #[test]
    fn test_removed_on_drop() {
        let path = temp_pid_path("drop");
        let pidfile = PidFile::create(&path).unwrap();
        assert!(path.exists());

        drop(pidfile);

        assert!(!path.exists());
    }

    #[test]
    fn test_already_removed_is_fine() {
        let path = temp_pid_path("gone");
        let pidfile = PidFile::create(&path).unwrap();
        std::fs::remove_file(&path).unwrap();

        drop(pidfile);

        assert!(!path.exists());
    }

    #[test]
    fn test_unwritable_location_is_an_error() {
        let path = std::env::temp_dir()
            .join("sockproc-no-such-dir")
            .join("daemon.pid");

        assert!(PidFile::create(path).is_err());
    }
}
