//! Request framing and response parsing

use crate::error::{Result, SdkError};
use crate::types::{CommandOutput, RemoteStatus};

const STATUS_PREFIX: &[u8] = b"status:";

/// Frame a request: the command line, then the input block if there is any
pub(crate) fn encode_request(command: &[u8], input: Option<&[u8]>) -> Result<Vec<u8>> {
    if command.windows(2).any(|w| w == b"\r\n") {
        return Err(SdkError::InvalidCommand(
            "command must not contain CRLF".to_string(),
        ));
    }
    if command.contains(&0) {
        return Err(SdkError::InvalidCommand(
            "command must not contain NUL".to_string(),
        ));
    }

    let input = input.unwrap_or_default();
    let mut frame = Vec::with_capacity(command.len() + input.len() + 24);
    frame.extend_from_slice(command);
    frame.extend_from_slice(b"\r\n");
    if !input.is_empty() {
        frame.extend_from_slice(format!("{}\r\n", input.len()).as_bytes());
        frame.extend_from_slice(input);
    }
    Ok(frame)
}

/// Parse a complete response as read until the daemon closed the connection
pub(crate) fn parse_response(bytes: &[u8]) -> Result<CommandOutput> {
    if bytes.is_empty() {
        return Err(SdkError::NoResponse);
    }

    let mut rest = bytes;
    let status_line = take_line(&mut rest)?;
    let status = status_line
        .strip_prefix(STATUS_PREFIX)
        .ok_or_else(|| protocol("response does not start with status:", status_line))?;
    let status = parse_status(status)?;

    let stdout = take_block(&mut rest)?;
    let stderr = take_block(&mut rest)?;

    if !rest.is_empty() {
        return Err(SdkError::Protocol(format!(
            "{} unexpected bytes after stderr",
            rest.len()
        )));
    }

    Ok(CommandOutput {
        status,
        stdout,
        stderr,
    })
}

fn protocol(message: &str, got: &[u8]) -> SdkError {
    SdkError::Protocol(format!("{}: {:?}", message, String::from_utf8_lossy(got)))
}

fn parse_status(text: &[u8]) -> Result<RemoteStatus> {
    if text == b"timeout" {
        return Ok(RemoteStatus::TimedOut);
    }
    std::str::from_utf8(text)
        .ok()
        .and_then(|s| s.parse::<i32>().ok())
        .map(RemoteStatus::Code)
        .ok_or_else(|| protocol("invalid status", text))
}

fn take_line<'a>(rest: &mut &'a [u8]) -> Result<&'a [u8]> {
    let end = rest
        .iter()
        .position(|&b| b == b'\n')
        .ok_or_else(|| protocol("unterminated header line", rest))?;
    let line = &rest[..end];
    *rest = &rest[end + 1..];
    Ok(line)
}

fn take_block(rest: &mut &[u8]) -> Result<Vec<u8>> {
    let header = take_line(rest)?;
    let len = std::str::from_utf8(header)
        .ok()
        .and_then(|s| s.parse::<usize>().ok())
        .ok_or_else(|| protocol("invalid block length", header))?;

    if rest.len() < len {
        return Err(SdkError::Protocol(format!(
            "block truncated: expected {} bytes, got {}",
            len,
            rest.len()
        )));
    }

    let (block, tail) = rest.split_at(len);
    *rest = tail;
    Ok(block.to_vec())
}
