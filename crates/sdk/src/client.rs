//! sockproc Client Implementation

use crate::error::{Result, SdkError};
use crate::types::CommandOutput;
use crate::wire::{encode_request, parse_response};
use std::net::Ipv4Addr;
use std::path::PathBuf;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::{TcpStream, UnixStream};

#[derive(Debug, Clone)]
enum Endpoint {
    Tcp(u16),
    Unix(PathBuf),
}

/// sockproc daemon client
///
/// Each [`execute`](Self::execute) opens its own connection; the daemon
/// serves exactly one command per connection.
///
/// # Example
///
/// ```no_run
/// use sockproc_sdk::SockprocClient;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let client = SockprocClient::unix("/tmp/sockproc.sock");
/// let output = client.execute("wc -c", Some(&b"hello"[..])).await?;
/// assert_eq!(output.stdout_lossy().trim(), "5");
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct SockprocClient {
    endpoint: Endpoint,
    timeout: Option<Duration>,
}

impl SockprocClient {
    /// Daemon listening on a TCP port of 127.0.0.1
    pub fn tcp(port: u16) -> Self {
        Self {
            endpoint: Endpoint::Tcp(port),
            timeout: None,
        }
    }

    /// Daemon listening on a UNIX-domain socket
    pub fn unix(path: impl Into<PathBuf>) -> Self {
        Self {
            endpoint: Endpoint::Unix(path.into()),
            timeout: None,
        }
    }

    /// Give up on a request that has not completed within `timeout`
    ///
    /// The remote command keeps running; only this client stops waiting.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Run `command` remotely, feeding it `input` on stdin
    ///
    /// # Errors
    ///
    /// * `SdkError::Connection` - the daemon is not reachable
    /// * `SdkError::NoResponse` - the daemon closed without answering
    ///   (malformed request or a command it could not start)
    /// * `SdkError::Protocol` - the response could not be parsed
    pub async fn execute(
        &self,
        command: impl AsRef<[u8]>,
        input: Option<&[u8]>,
    ) -> Result<CommandOutput> {
        let frame = encode_request(command.as_ref(), input)?;

        let exchange = self.send(&frame);
        let response = match self.timeout {
            Some(limit) => tokio::time::timeout(limit, exchange)
                .await
                .map_err(|_| SdkError::Timeout(limit))??,
            None => exchange.await?,
        };

        parse_response(&response)
    }

    async fn send(&self, frame: &[u8]) -> Result<Vec<u8>> {
        match &self.endpoint {
            Endpoint::Tcp(port) => {
                let stream = TcpStream::connect((Ipv4Addr::LOCALHOST, *port))
                    .await
                    .map_err(|e| {
                        SdkError::Connection(format!("127.0.0.1:{}: {}", port, e))
                    })?;
                round_trip(stream, frame).await
            }
            Endpoint::Unix(path) => {
                let stream = UnixStream::connect(path).await.map_err(|e| {
                    SdkError::Connection(format!("{}: {}", path.display(), e))
                })?;
                round_trip(stream, frame).await
            }
        }
    }
}

/// Write the request, half-close, and read until the daemon closes
async fn round_trip<S>(mut stream: S, frame: &[u8]) -> Result<Vec<u8>>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    stream.write_all(frame).await?;
    stream.flush().await?;
    // The daemon reads an optional length line; EOF tells it there is none
    stream.shutdown().await?;

    let mut response = Vec::new();
    stream.read_to_end(&mut response).await?;
    Ok(response)
}
