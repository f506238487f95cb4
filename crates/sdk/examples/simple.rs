//! Simple SDK Example
//!
//! # Usage
//!
//! 1. Start the daemon:
//!    ```bash
//!    cargo run --package sockproc-daemon -- 13000 --foreground
//!    ```
//!
//! 2. Run this example:
//!    ```bash
//!    cargo run --example simple
//!    ```

use sockproc_sdk::{RemoteStatus, SockprocClient};
use std::time::Duration;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let client = SockprocClient::tcp(13000).with_timeout(Duration::from_secs(10));

    println!("1. Plain command");
    let output = client.execute("uname -a", None).await?;
    println!("   status: {}", output.status);
    print!("   stdout: {}", output.stdout_lossy());

    println!("2. Command with input");
    let output = client
        .execute("tr a-z A-Z", Some(&b"shout this\n"[..]))
        .await?;
    print!("   stdout: {}", output.stdout_lossy());

    println!("3. Failing command");
    let output = client.execute("ls /no/such/dir", None).await?;
    match output.status {
        RemoteStatus::Code(code) => println!("   exit code: {}", code),
        RemoteStatus::TimedOut => println!("   timed out"),
    }
    print!("   stderr: {}", output.stderr_lossy());

    Ok(())
}
