//! Shared harness: a real server with the shell executor on a real socket

#![allow(dead_code)]

use sockproc_api_socket::{ListenAddr, Listener, ServerConfig, SocketServer};
use sockproc_core::application::{shutdown_channel, ShutdownSender};
use sockproc_infra_system::{ShellConfig, ShellExecutor, ShellLauncher};
use sockproc_sdk::SockprocClient;
use std::io;
use std::net::Ipv4Addr;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::task::JoinHandle;

pub struct TestDaemon {
    pub addr: ListenAddr,
    shutdown: ShutdownSender,
    handle: JoinHandle<io::Result<()>>,
}

impl TestDaemon {
    pub async fn tcp() -> Self {
        Self::start(ListenAddr::Tcp(0), default_executor(), ServerConfig::default()).await
    }

    pub async fn unix() -> Self {
        Self::start(
            ListenAddr::Unix(temp_socket_path()),
            default_executor(),
            ServerConfig::default(),
        )
        .await
    }

    pub async fn start(addr: ListenAddr, executor: ShellExecutor, config: ServerConfig) -> Self {
        let listener = Listener::bind(&addr).await.expect("bind test listener");
        let addr = listener.local_addr().expect("local addr");

        let (shutdown, token) = shutdown_channel();
        let server = SocketServer::new(Arc::new(executor), config);
        let handle = tokio::spawn(async move { server.run(listener, token).await });

        Self {
            addr,
            shutdown,
            handle,
        }
    }

    pub fn client(&self) -> SockprocClient {
        match &self.addr {
            ListenAddr::Tcp(port) => SockprocClient::tcp(*port),
            ListenAddr::Unix(path) => SockprocClient::unix(path.clone()),
        }
    }

    /// Send raw bytes, half-close, return everything the server wrote back
    pub async fn raw_exchange(&self, request: &[u8]) -> Vec<u8> {
        match &self.addr {
            ListenAddr::Tcp(port) => {
                let stream = tokio::net::TcpStream::connect((Ipv4Addr::LOCALHOST, *port))
                    .await
                    .expect("connect tcp");
                exchange(stream, request).await
            }
            ListenAddr::Unix(path) => {
                let stream = tokio::net::UnixStream::connect(path)
                    .await
                    .expect("connect unix");
                exchange(stream, request).await
            }
        }
    }

    pub async fn stop(self) {
        self.shutdown.shutdown();
        self.handle
            .await
            .expect("server task panicked")
            .expect("server returned an error");
    }
}

async fn exchange<S>(mut stream: S, request: &[u8]) -> Vec<u8>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    stream.write_all(request).await.expect("write request");
    stream.shutdown().await.expect("half-close");
    let mut response = Vec::new();
    match stream.read_to_end(&mut response).await {
        Ok(_) => {}
        // A server that drops a request it did not fully read may reset
        Err(e) if e.kind() == io::ErrorKind::ConnectionReset => {}
        Err(e) => panic!("read response: {}", e),
    }
    response
}

pub fn default_executor() -> ShellExecutor {
    ShellExecutor::new(ShellLauncher::new(ShellConfig::default()))
}

pub fn temp_socket_path() -> PathBuf {
    std::env::temp_dir().join(format!(
        "sockproc-it-{}-{}.sock",
        std::process::id(),
        uuid::Uuid::new_v4().simple()
    ))
}

/// Deterministic binary payload of `len` bytes, NUL and high bytes included
pub fn payload(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i * 31 % 251) as u8).collect()
}
