//! Listener
//!
//! Accept-capable socket on either a UNIX-domain path or a loopback TCP port.
//! Binding is split from the runtime so the daemon can bind before it
//! daemonizes and only then hand the socket to tokio.

use std::fmt;
use std::io;
use std::net::Ipv4Addr;
use std::os::unix::fs::FileTypeExt;
use std::os::unix::net::{UnixListener as StdUnixListener, UnixStream as StdUnixStream};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::{TcpListener, UnixListener};
use tracing::{info, warn};

/// Byte stream of an accepted connection, whatever the transport
pub trait AsyncStream: AsyncRead + AsyncWrite + Unpin + Send {}

impl<T> AsyncStream for T where T: AsyncRead + AsyncWrite + Unpin + Send {}

pub type Connection = Box<dyn AsyncStream>;

/// Where to listen
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListenAddr {
    /// UNIX-domain socket at this path
    Unix(PathBuf),
    /// TCP port on 127.0.0.1
    Tcp(u16),
}

impl ListenAddr {
    /// All-digit text is a TCP port, anything else a socket path (`~` expanded)
    pub fn parse(s: &str) -> Result<Self, String> {
        if s.is_empty() {
            return Err("empty listen address".to_string());
        }

        if s.bytes().all(|b| b.is_ascii_digit()) {
            return s
                .parse::<u16>()
                .map(ListenAddr::Tcp)
                .map_err(|e| format!("invalid TCP port {:?}: {}", s, e));
        }

        Ok(ListenAddr::Unix(PathBuf::from(
            shellexpand::tilde(s).into_owned(),
        )))
    }
}

impl FromStr for ListenAddr {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for ListenAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ListenAddr::Unix(path) => write!(f, "unix:{}", path.display()),
            ListenAddr::Tcp(port) => write!(f, "{}:{}", Ipv4Addr::LOCALHOST, port),
        }
    }
}

fn remove_socket_if_exists(socket_path: &Path) -> io::Result<()> {
    match std::fs::remove_file(socket_path) {
        Ok(()) => Ok(()),
        Err(error) if error.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(error) => Err(error),
    }
}

/// Bind a UNIX socket, replacing a stale socket file left by a dead daemon
fn bind_unix(socket_path: &Path) -> io::Result<StdUnixListener> {
    match StdUnixListener::bind(socket_path) {
        Ok(listener) => Ok(listener),
        Err(bind_error) if bind_error.kind() == io::ErrorKind::AddrInUse => {
            let is_socket = std::fs::symlink_metadata(socket_path)
                .map(|meta| meta.file_type().is_socket())
                .unwrap_or(false);
            if !is_socket {
                return Err(io::Error::new(
                    io::ErrorKind::AlreadyExists,
                    format!("{} exists and is not a socket", socket_path.display()),
                ));
            }

            if StdUnixStream::connect(socket_path).is_ok() {
                return Err(io::Error::new(
                    io::ErrorKind::AddrInUse,
                    format!("daemon already running at {}", socket_path.display()),
                ));
            }

            warn!(path = %socket_path.display(), "Removing stale socket");
            remove_socket_if_exists(socket_path)?;
            StdUnixListener::bind(socket_path)
        }
        Err(bind_error) => Err(bind_error),
    }
}

/// A socket bound with std, not yet registered with a runtime
#[derive(Debug)]
pub enum BoundListener {
    Unix {
        listener: StdUnixListener,
        path: PathBuf,
    },
    Tcp(std::net::TcpListener),
}

impl BoundListener {
    pub fn bind(addr: &ListenAddr) -> io::Result<Self> {
        match addr {
            ListenAddr::Unix(path) => Ok(BoundListener::Unix {
                listener: bind_unix(path)?,
                path: path.clone(),
            }),
            ListenAddr::Tcp(port) => Ok(BoundListener::Tcp(std::net::TcpListener::bind((
                Ipv4Addr::LOCALHOST,
                *port,
            ))?)),
        }
    }

    /// Register with the current tokio runtime
    pub fn into_tokio(self) -> io::Result<Listener> {
        match self {
            BoundListener::Unix { listener, path } => {
                listener.set_nonblocking(true)?;
                Ok(Listener::Unix {
                    listener: UnixListener::from_std(listener)?,
                    path,
                })
            }
            BoundListener::Tcp(listener) => {
                listener.set_nonblocking(true)?;
                Ok(Listener::Tcp(TcpListener::from_std(listener)?))
            }
        }
    }
}

/// Accepting socket, shared read-only by the accept loop
#[derive(Debug)]
pub enum Listener {
    Unix { listener: UnixListener, path: PathBuf },
    Tcp(TcpListener),
}

impl Listener {
    /// Bind and register in one step (inside a runtime)
    pub async fn bind(addr: &ListenAddr) -> io::Result<Self> {
        BoundListener::bind(addr)?.into_tokio()
    }

    /// Accept one connection; the second value describes the peer for logging
    pub async fn accept(&self) -> io::Result<(Connection, String)> {
        match self {
            Listener::Unix { listener, .. } => {
                let (stream, _) = listener.accept().await?;
                let stream: Connection = Box::new(stream);
                Ok((stream, "unix".to_string()))
            }
            Listener::Tcp(listener) => {
                let (stream, peer) = listener.accept().await?;
                let stream: Connection = Box::new(stream);
                Ok((stream, peer.to_string()))
            }
        }
    }

    /// The address actually bound (resolves port 0)
    pub fn local_addr(&self) -> io::Result<ListenAddr> {
        match self {
            Listener::Unix { path, .. } => Ok(ListenAddr::Unix(path.clone())),
            Listener::Tcp(listener) => Ok(ListenAddr::Tcp(listener.local_addr()?.port())),
        }
    }

    /// Stop listening and remove the socket file, if any
    pub fn close(self) -> io::Result<()> {
        match self {
            Listener::Unix { listener, path } => {
                drop(listener);
                remove_socket_if_exists(&path)?;
                info!(path = %path.display(), "Removed socket file");
                Ok(())
            }
            Listener::Tcp(_) => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    fn temp_socket_path(tag: &str) -> PathBuf {
        std::env::temp_dir().join(format!(
            "sockproc-{}-{}-{}.sock",
            tag,
            std::process::id(),
            uuid::Uuid::new_v4().simple()
        ))
    }

    #[test]
    fn test_parse_port() {
        assert_eq!(ListenAddr::parse("9527"), Ok(ListenAddr::Tcp(9527)));
    }

    #[test]
    fn test_parse_path() {
        assert_eq!(
            ListenAddr::parse("/tmp/sockproc.sock"),
            Ok(ListenAddr::Unix(PathBuf::from("/tmp/sockproc.sock")))
        );
        assert_eq!(
            "./run/shell.sock".parse::<ListenAddr>(),
            Ok(ListenAddr::Unix(PathBuf::from("./run/shell.sock")))
        );
    }

    #[test]
    fn test_parse_rejects_bad_input() {
        assert!(ListenAddr::parse("").is_err());
        assert!(ListenAddr::parse("70000").is_err());
    }

    #[test]
    fn test_display() {
        assert_eq!(ListenAddr::Tcp(80).to_string(), "127.0.0.1:80");
        assert_eq!(
            ListenAddr::Unix(PathBuf::from("/tmp/s")).to_string(),
            "unix:/tmp/s"
        );
    }

    #[tokio::test]
    async fn test_tcp_listener_accepts_on_loopback() {
        let listener = Listener::bind(&ListenAddr::Tcp(0)).await.unwrap();
        let ListenAddr::Tcp(port) = listener.local_addr().unwrap() else {
            panic!("expected a TCP address");
        };
        assert_ne!(port, 0);

        let client = tokio::spawn(async move {
            let mut stream = tokio::net::TcpStream::connect((Ipv4Addr::LOCALHOST, port))
                .await
                .unwrap();
            stream.write_all(b"ping").await.unwrap();
        });

        let (mut conn, peer) = listener.accept().await.unwrap();
        let mut buf = Vec::new();
        conn.read_to_end(&mut buf).await.unwrap();
        client.await.unwrap();

        assert_eq!(buf, b"ping");
        assert!(peer.starts_with("127.0.0.1:"));
    }

    #[tokio::test]
    async fn test_unix_listener_close_removes_path() {
        let path = temp_socket_path("close");
        let listener = Listener::bind(&ListenAddr::Unix(path.clone())).await.unwrap();
        assert!(path.exists());

        listener.close().unwrap();

        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_stale_socket_is_replaced() {
        let path = temp_socket_path("stale");
        // A bound-then-dropped std listener leaves its socket file behind
        drop(StdUnixListener::bind(&path).unwrap());
        assert!(path.exists());

        let listener = Listener::bind(&ListenAddr::Unix(path.clone())).await.unwrap();

        listener.close().unwrap();
    }

    #[tokio::test]
    async fn test_live_socket_is_not_replaced() {
        let path = temp_socket_path("live");
        let first = Listener::bind(&ListenAddr::Unix(path.clone())).await.unwrap();

        let err = Listener::bind(&ListenAddr::Unix(path.clone()))
            .await
            .unwrap_err();

        assert_eq!(err.kind(), io::ErrorKind::AddrInUse);
        first.close().unwrap();
    }

    #[tokio::test]
    async fn test_regular_file_is_not_removed() {
        let path = temp_socket_path("file");
        std::fs::write(&path, b"keep me").unwrap();

        let err = Listener::bind(&ListenAddr::Unix(path.clone()))
            .await
            .unwrap_err();

        assert_eq!(err.kind(), io::ErrorKind::AlreadyExists);
        assert_eq!(std::fs::read(&path).unwrap(), b"keep me");
        std::fs::remove_file(&path).unwrap();
    }
}
