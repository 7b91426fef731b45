//! TCP client for the automation server

use crate::errors::ClientError;
use serde_json::{Value, json};
use std::time::Duration;
use tokio::io::BufReader;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpStream, ToSocketAddrs};
use uiharness_protocol::command::DEFAULT_LONGPRESS_MS;
use uiharness_protocol::{
    ErrorReason, Point, ProtocolError, Response, millis, read_payload, read_response,
    write_request,
};

/// Default time to wait for one response line
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(35);

/// A decoded screenshot response
#[derive(Debug, Clone)]
pub struct CapturedScreenshot {
    pub width: u32,
    pub height: u32,
    pub png: Vec<u8>,
}

/// One connection to an automation server
pub struct HarnessClient {
    reader: BufReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
    timeout: Duration,
    /// Set once a reply went missing; the stream may still deliver it
    out_of_sync: bool,
}

impl HarnessClient {
    pub async fn connect(addr: impl ToSocketAddrs) -> Result<Self, ClientError> {
        let stream = TcpStream::connect(addr).await.map_err(ProtocolError::from)?;
        let (reader, writer) = stream.into_split();
        Ok(Self {
            reader: BufReader::new(reader),
            writer,
            timeout: DEFAULT_TIMEOUT,
            out_of_sync: false,
        })
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Send a request line and read the response line
    ///
    /// A successful screenshot header is returned as-is; its payload must be
    /// read with [`read_screenshot_payload`](Self::read_screenshot_payload)
    /// before the next request. After a timeout the connection is unusable
    /// and every later call fails with [`ClientError::OutOfSync`].
    pub async fn send_line(&mut self, line: &str) -> Result<Response, ClientError> {
        self.exchange(line, self.timeout).await
    }

    async fn exchange(&mut self, line: &str, timeout: Duration) -> Result<Response, ClientError> {
        if self.out_of_sync {
            return Err(ClientError::OutOfSync);
        }
        tracing::debug!("Sending: {}", line);
        write_request(&mut self.writer, line).await?;
        let response = match tokio::time::timeout(timeout, read_response(&mut self.reader)).await {
            Ok(response) => response?,
            Err(_) => return Err(self.timed_out(timeout)),
        };
        tracing::debug!("Received: {:?}", response);
        Ok(response)
    }

    pub async fn read_screenshot_payload(&mut self, header: &Response) -> Result<Vec<u8>, ClientError> {
        if self.out_of_sync {
            return Err(ClientError::OutOfSync);
        }
        let len = header.len.ok_or_else(|| {
            ProtocolError::UnexpectedResponse("screenshot header without len".into())
        })?;
        match tokio::time::timeout(self.timeout, read_payload(&mut self.reader, len)).await {
            Ok(payload) => Ok(payload?),
            Err(_) => Err(self.timed_out(self.timeout)),
        }
    }

    fn timed_out(&mut self, timeout: Duration) -> ClientError {
        tracing::warn!("No reply within {:?}; closing this session", timeout);
        self.out_of_sync = true;
        ClientError::Timeout(millis(timeout))
    }

    async fn request(&mut self, request: Value) -> Result<Response, ClientError> {
        self.request_lasting(request, Duration::ZERO).await
    }

    /// Send a command that occupies the UI thread for `duration`
    ///
    /// The server only answers after that time, so it extends the timeout.
    async fn request_lasting(
        &mut self,
        request: Value,
        duration: Duration,
    ) -> Result<Response, ClientError> {
        let cmd = request["cmd"].as_str().unwrap_or_default().to_string();
        let timeout = self.timeout.saturating_add(duration);
        let response = self.exchange(&request.to_string(), timeout).await?;
        if response.is_ok() {
            Ok(response)
        } else {
            Err(ClientError::rejected(
                response.cmd.unwrap_or(cmd),
                response.error.unwrap_or(ErrorReason::CommandFailed),
            ))
        }
    }

    pub async fn click(&mut self, id: &str) -> Result<(), ClientError> {
        self.request(json!({"cmd": "click", "id": wire_str(id)?}))
            .await
            .map(drop)
    }

    pub async fn longpress(&mut self, id: &str, ms: Option<u32>) -> Result<(), ClientError> {
        let mut request = json!({"cmd": "longpress", "id": wire_str(id)?});
        if let Some(ms) = ms {
            request["ms"] = json!(ms);
        }
        let hold = ms.filter(|ms| *ms > 0).unwrap_or(DEFAULT_LONGPRESS_MS);
        self.request_lasting(request, Duration::from_millis(u64::from(hold)))
            .await
            .map(drop)
    }

    pub async fn swipe(&mut self, from: Point, to: Point) -> Result<(), ClientError> {
        self.request(segment("swipe", from, to)).await.map(drop)
    }

    pub async fn key(&mut self, code: u32) -> Result<(), ClientError> {
        self.request(json!({"cmd": "key", "code": code}))
            .await
            .map(drop)
    }

    /// Text of a widget; `None` when the widget has no text
    pub async fn get_state(&mut self, id: &str) -> Result<Option<String>, ClientError> {
        let response = self
            .request(json!({"cmd": "get_state", "id": wire_str(id)?}))
            .await?;
        Ok(response.text)
    }

    pub async fn set_text(&mut self, id: &str, text: &str) -> Result<(), ClientError> {
        self.request(json!({"cmd": "set_text", "id": wire_str(id)?, "text": wire_str(text)?}))
            .await
            .map(drop)
    }

    pub async fn wait(&mut self, ms: u32) -> Result<(), ClientError> {
        self.request_lasting(
            json!({"cmd": "wait", "ms": ms}),
            Duration::from_millis(u64::from(ms)),
        )
        .await
        .map(drop)
    }

    pub async fn click_at(&mut self, at: Point) -> Result<(), ClientError> {
        self.request(json!({"cmd": "click_at", "x": at.x, "y": at.y}))
            .await
            .map(drop)
    }

    pub async fn mouse_move(&mut self, to: Point) -> Result<(), ClientError> {
        self.request(json!({"cmd": "mouse_move", "x": to.x, "y": to.y}))
            .await
            .map(drop)
    }

    pub async fn drag(&mut self, from: Point, to: Point) -> Result<(), ClientError> {
        self.request(segment("drag", from, to)).await.map(drop)
    }

    pub async fn list_widgets(&mut self) -> Result<Vec<String>, ClientError> {
        let response = self.request(json!({"cmd": "list_widgets"})).await?;
        Ok(response.widgets.unwrap_or_default())
    }

    pub async fn screenshot(&mut self) -> Result<CapturedScreenshot, ClientError> {
        let header = self.request(json!({"cmd": "screenshot"})).await?;
        if !header.is_screenshot() {
            return Err(ProtocolError::UnexpectedResponse(format!(
                "expected screenshot header, got {:?}",
                header
            ))
            .into());
        }
        let png = self.read_screenshot_payload(&header).await?;
        Ok(CapturedScreenshot {
            width: header.width.unwrap_or_default(),
            height: header.height.unwrap_or_default(),
            png,
        })
    }
}

fn segment(cmd: &str, from: Point, to: Point) -> Value {
    json!({"cmd": cmd, "x1": from.x, "y1": from.y, "x2": to.x, "y2": to.y})
}

/// The server reads strings verbatim, so escapes cannot be expressed
fn wire_str(value: &str) -> Result<&str, ClientError> {
    if value.chars().any(|c| c == '"' || c == '\\' || c.is_control()) {
        return Err(ClientError::InvalidArgument(format!(
            "{:?} contains a quote, backslash or control character",
            value
        )));
    }
    Ok(value)
}
