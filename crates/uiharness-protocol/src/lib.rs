//! Wire protocol for the uiharness automation channel
//!
//! Clients talk to an application under test over TCP using newline-delimited
//! request lines (`{"cmd":"click","id":"btn_ok"}`) and receive one response
//! line per request. Screenshot responses are a header line followed by a raw
//! PNG payload whose length is declared in the header.

use std::time::Duration;
use thiserror::Error;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt, AsyncWriteExt};

pub mod command;
pub mod decoder;
pub mod response;

pub use command::{Command, MAX_ID_LEN, Point, RequestError, UNKNOWN_COMMAND};
pub use decoder::{DecodeError, WireDecoder};
pub use response::{ErrorReason, Response, Status};

/// Default TCP port of the automation server
pub const DEFAULT_PORT: u16 = 12345;

/// Maximum request or response line length (64 KiB)
pub const MAX_LINE_LEN: usize = 64 * 1024;

/// Maximum screenshot payload a client accepts (64 MiB)
pub const MAX_PAYLOAD_LEN: usize = 64 * 1024 * 1024;

/// Whole milliseconds in `duration`, saturating at `u64::MAX`
pub fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

/// Protocol errors
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Connection closed")]
    ConnectionClosed,
    #[error("Message too large: {0} bytes")]
    MessageTooLarge(usize),
    #[error("Decode error: {0}")]
    Decode(#[from] DecodeError),
    #[error("Unexpected response: {0}")]
    UnexpectedResponse(String),
}

/// Read one newline-terminated line
///
/// The newline is not included. A final line without a newline is returned
/// as-is when the peer closes the connection; a clean close with nothing
/// buffered yields [`ProtocolError::ConnectionClosed`]. Lines longer than
/// [`MAX_LINE_LEN`] are consumed up to their newline and reported as
/// [`ProtocolError::MessageTooLarge`], leaving the stream aligned on the next
/// line.
pub async fn read_line<R: AsyncBufRead + Unpin>(reader: &mut R) -> Result<String, ProtocolError> {
    let mut line = Vec::new();
    let mut dropped = 0usize;

    loop {
        let (used, finished) = {
            let available = reader.fill_buf().await?;
            if available.is_empty() {
                if line.is_empty() && dropped == 0 {
                    return Err(ProtocolError::ConnectionClosed);
                }
                break;
            }

            let newline = available.iter().position(|b| *b == b'\n');
            let end = newline.unwrap_or(available.len());
            if dropped == 0 && line.len() + end <= MAX_LINE_LEN {
                line.extend_from_slice(&available[..end]);
            } else {
                dropped += line.len() + end;
                line.clear();
            }
            (newline.map_or(end, |i| i + 1), newline.is_some())
        };
        reader.consume(used);
        if finished {
            break;
        }
    }

    if dropped > 0 {
        return Err(ProtocolError::MessageTooLarge(dropped));
    }
    Ok(String::from_utf8_lossy(&line).into_owned())
}

/// Write a response line
pub async fn write_response<W: AsyncWriteExt + Unpin>(
    writer: &mut W,
    response: &Response,
) -> Result<(), ProtocolError> {
    let line = response.to_line()?;
    writer.write_all(line.as_bytes()).await?;
    writer.flush().await?;
    Ok(())
}

/// Write a raw payload following a screenshot header
pub async fn write_payload<W: AsyncWriteExt + Unpin>(
    writer: &mut W,
    data: &[u8],
) -> Result<(), ProtocolError> {
    writer.write_all(data).await?;
    writer.flush().await?;
    Ok(())
}

/// Write a request line
pub async fn write_request<W: AsyncWriteExt + Unpin>(
    writer: &mut W,
    line: &str,
) -> Result<(), ProtocolError> {
    writer.write_all(line.as_bytes()).await?;
    if !line.ends_with('\n') {
        writer.write_all(b"\n").await?;
    }
    writer.flush().await?;
    Ok(())
}

/// Read and deserialize a response line
pub async fn read_response<R: AsyncBufRead + Unpin>(
    reader: &mut R,
) -> Result<Response, ProtocolError> {
    let line = read_line(reader).await?;
    let response = serde_json::from_str(line.trim())?;
    Ok(response)
}

/// Read exactly `len` payload bytes
pub async fn read_payload<R: AsyncBufRead + Unpin>(
    reader: &mut R,
    len: usize,
) -> Result<Vec<u8>, ProtocolError> {
    if len > MAX_PAYLOAD_LEN {
        return Err(ProtocolError::MessageTooLarge(len));
    }
    let mut buf = vec![0u8; len];
    match reader.read_exact(&mut buf).await {
        Ok(_) => Ok(buf),
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
            Err(ProtocolError::ConnectionClosed)
        }
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::BufReader;

    #[tokio::test]
    async fn test_read_lines_from_one_chunk() {
        let data: &[u8] = b"{\"cmd\":\"wait\"}\n{\"cmd\":\"screenshot\"}\n";
        let mut reader = BufReader::new(data);
        assert_eq!(read_line(&mut reader).await.unwrap(), "{\"cmd\":\"wait\"}");
        assert_eq!(
            read_line(&mut reader).await.unwrap(),
            "{\"cmd\":\"screenshot\"}"
        );
        assert!(matches!(
            read_line(&mut reader).await,
            Err(ProtocolError::ConnectionClosed)
        ));
    }

    #[tokio::test]
    async fn test_final_line_without_newline() {
        let data: &[u8] = b"{\"cmd\":\"wait\"}";
        let mut reader = BufReader::new(data);
        assert_eq!(read_line(&mut reader).await.unwrap(), "{\"cmd\":\"wait\"}");
        assert!(matches!(
            read_line(&mut reader).await,
            Err(ProtocolError::ConnectionClosed)
        ));
    }

    #[tokio::test]
    async fn test_line_spanning_small_buffer() {
        let data: &[u8] = b"{\"cmd\":\"click\",\"id\":\"btn_activity\"}\nnext\n";
        let mut reader = BufReader::with_capacity(4, data);
        assert_eq!(
            read_line(&mut reader).await.unwrap(),
            "{\"cmd\":\"click\",\"id\":\"btn_activity\"}"
        );
        assert_eq!(read_line(&mut reader).await.unwrap(), "next");
    }

    #[tokio::test]
    async fn test_oversized_line_is_skipped() {
        let mut data = vec![b'x'; MAX_LINE_LEN + 10];
        data.extend_from_slice(b"\n{\"cmd\":\"wait\"}\n");
        let mut reader = BufReader::new(data.as_slice());
        assert!(matches!(
            read_line(&mut reader).await,
            Err(ProtocolError::MessageTooLarge(n)) if n == MAX_LINE_LEN + 10
        ));
        assert_eq!(read_line(&mut reader).await.unwrap(), "{\"cmd\":\"wait\"}");
    }

    #[tokio::test]
    async fn test_payload_may_contain_newlines() {
        let mut data = Response::screenshot(2, 2, 5).to_line().unwrap().into_bytes();
        data.extend_from_slice(b"\n\n\x89\n\n");
        data.extend_from_slice(b"{\"status\":\"ok\",\"cmd\":\"wait\"}\n");
        let mut reader = BufReader::new(data.as_slice());

        let header = read_response(&mut reader).await.unwrap();
        assert!(header.is_screenshot());
        let payload = read_payload(&mut reader, header.len.unwrap()).await.unwrap();
        assert_eq!(payload, b"\n\n\x89\n\n");
        let next = read_response(&mut reader).await.unwrap();
        assert_eq!(next.cmd.as_deref(), Some("wait"));
    }

    #[tokio::test]
    async fn test_short_payload() {
        let data: &[u8] = b"abc";
        let mut reader = BufReader::new(data);
        assert!(matches!(
            read_payload(&mut reader, 10).await,
            Err(ProtocolError::ConnectionClosed)
        ));
    }

    #[test]
    fn test_millis_saturates() {
        assert_eq!(millis(Duration::from_millis(1500)), 1500);
        assert_eq!(millis(Duration::MAX), u64::MAX);
    }

    #[tokio::test]
    async fn test_write_request_appends_newline() {
        let mut out = Vec::new();
        write_request(&mut out, "{\"cmd\":\"wait\"}").await.unwrap();
        write_request(&mut out, "{\"cmd\":\"wait\"}\n").await.unwrap();
        assert_eq!(out, b"{\"cmd\":\"wait\"}\n{\"cmd\":\"wait\"}\n");
    }
}
