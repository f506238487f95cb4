//! Wire Codec
//!
//! Request:
//! ```text
//! <command>\r\n
//! [<input-byte-count>\r\n
//!  <input-byte-count raw bytes>]
//! ```
//! Response:
//! ```text
//! status:<status>\n
//! <stdout-byte-count>\n<stdout bytes>
//! <stderr-byte-count>\n<stderr bytes>
//! ```
//! Output blocks are length-prefixed, so arbitrary bytes round-trip unchanged.

use sockproc_core::constants::LINE_DELIMITER;
use sockproc_core::{ExecutionOutcome, OutputBuffer, Request};
use std::io;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::debug;

use crate::error::ProtocolError;

/// Read one `\r\n`-terminated line of at most `max_line` bytes (delimiter included).
///
/// Returns `Ok(None)` if the stream ends before any byte of the line arrives.
/// A lone `\n` is part of the line.
async fn read_line<R>(reader: &mut R, max_line: usize) -> Result<Option<Vec<u8>>, ProtocolError>
where
    R: AsyncBufRead + Unpin,
{
    let mut line = Vec::new();

    loop {
        let available = reader.fill_buf().await?;
        if available.is_empty() {
            return if line.is_empty() {
                Ok(None)
            } else {
                Err(ProtocolError::Incomplete)
            };
        }

        let consumed = match available.iter().position(|&b| b == b'\n') {
            Some(i) => i + 1,
            None => available.len(),
        };
        line.extend_from_slice(&available[..consumed]);
        reader.consume(consumed);

        if line.ends_with(LINE_DELIMITER) {
            if line.len() > max_line {
                return Err(ProtocolError::LineTooLong { limit: max_line });
            }
            line.truncate(line.len() - LINE_DELIMITER.len());
            return Ok(Some(line));
        }

        if line.len() >= max_line {
            return Err(ProtocolError::LineTooLong { limit: max_line });
        }
    }
}

fn parse_length(line: &[u8]) -> Result<usize, ProtocolError> {
    let text = std::str::from_utf8(line)
        .map_err(|_| ProtocolError::InvalidLength(String::from_utf8_lossy(line).into_owned()))?
        .trim();

    if text.is_empty() {
        return Ok(0);
    }

    text.parse::<usize>()
        .map_err(|_| ProtocolError::InvalidLength(text.to_string()))
}

/// Decode one request from the connection
///
/// The payload is read up to its declared length. If the peer closes early,
/// the bytes that did arrive become the input. Bytes after the payload are
/// left unread.
pub async fn decode_request<R>(reader: &mut R, max_line: usize) -> Result<Request, ProtocolError>
where
    R: AsyncBufRead + Unpin,
{
    let command = read_line(reader, max_line)
        .await?
        .ok_or(ProtocolError::Incomplete)?;

    if command.contains(&0) {
        return Err(ProtocolError::InvalidCommand);
    }

    let declared = match read_line(reader, max_line).await? {
        Some(line) => parse_length(&line)?,
        None => 0,
    };

    let mut request = Request::new(command);
    if declared > 0 {
        let mut payload = Vec::new();
        let received = (&mut *reader)
            .take(declared as u64)
            .read_to_end(&mut payload)
            .await?;

        if received < declared {
            debug!(
                declared = declared,
                received = received,
                "Peer closed before the full payload arrived"
            );
        }
        request = request.with_input(payload);
    }

    Ok(request)
}

fn block_header(buffer: &OutputBuffer) -> String {
    format!("{}\n", buffer.len())
}

fn status_line(outcome: &ExecutionOutcome) -> String {
    format!("status:{}\n", outcome.termination)
}

/// Serialize an outcome into a single response frame
pub fn encode_response(outcome: &ExecutionOutcome) -> Vec<u8> {
    let mut frame = Vec::with_capacity(64 + outcome.stdout.len() + outcome.stderr.len());

    frame.extend_from_slice(status_line(outcome).as_bytes());
    for buffer in [&outcome.stdout, &outcome.stderr] {
        frame.extend_from_slice(block_header(buffer).as_bytes());
        for segment in buffer.segments() {
            frame.extend_from_slice(segment);
        }
    }

    frame
}

/// Stream a response frame segment by segment, then flush
///
/// Produces the same bytes as [`encode_response`] without assembling them first.
pub async fn write_response<W>(writer: &mut W, outcome: &ExecutionOutcome) -> io::Result<()>
where
    W: AsyncWrite + Unpin + ?Sized,
{
    writer.write_all(status_line(outcome).as_bytes()).await?;
    for buffer in [&outcome.stdout, &outcome.stderr] {
        writer.write_all(block_header(buffer).as_bytes()).await?;
        buffer.write_to(writer).await?;
    }
    writer.flush().await
}
