//! TCP automation server
//!
//! Accepts one client at a time and answers each request line with exactly
//! one response line. Commands are handed to the UI thread through the
//! [`CommandQueue`]; this task only parses, waits and serializes.

use crate::config::HarnessConfig;
use crate::error::HarnessError;
use crate::queue::{CommandQueue, Reply};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::io::BufReader;
use tokio::net::{TcpListener, TcpStream};
use uiharness_protocol::{
    Command, ErrorReason, ProtocolError, Response, UNKNOWN_COMMAND, read_line, write_payload,
    write_response,
};

/// Response line plus the raw bytes that follow it, if any
struct Outcome {
    response: Response,
    payload: Option<Vec<u8>>,
}

impl From<Response> for Outcome {
    fn from(response: Response) -> Self {
        Self {
            response,
            payload: None,
        }
    }
}

/// Line-protocol server bound to a TCP port
pub struct AutomationServer {
    listener: TcpListener,
    queue: Arc<CommandQueue>,
    config: HarnessConfig,
}

impl AutomationServer {
    /// Bind the configured address
    pub async fn bind(config: HarnessConfig, queue: Arc<CommandQueue>) -> Result<Self, HarnessError> {
        let listener = TcpListener::bind(config.socket_addr()).await?;
        tracing::info!("Automation server listening on {}", listener.local_addr()?);
        Ok(Self {
            listener,
            queue,
            config,
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr, HarnessError> {
        Ok(self.listener.local_addr()?)
    }

    /// Serve clients one after another, forever
    pub async fn run(self) -> Result<(), HarnessError> {
        loop {
            match self.listener.accept().await {
                Ok((stream, peer)) => {
                    tracing::info!("Client connected: {}", peer);
                    match self.serve_connection(stream).await {
                        Ok(()) | Err(ProtocolError::ConnectionClosed) => {
                            tracing::info!("Client disconnected: {}", peer);
                        }
                        Err(e) => {
                            tracing::error!("Connection error from {}: {}", peer, e);
                        }
                    }
                }
                Err(e) => {
                    tracing::error!("Accept error: {}", e);
                }
            }
        }
    }

    /// Run the server as a task on the current tokio runtime
    pub fn spawn(self) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            if let Err(e) = self.run().await {
                tracing::error!("Automation server error: {}", e);
            }
        })
    }

    /// Run the server on its own thread with a private runtime
    ///
    /// For hosts whose main thread belongs to the UI event loop. Bind errors
    /// are reported before this returns.
    pub fn spawn_thread(
        config: HarnessConfig,
        queue: Arc<CommandQueue>,
    ) -> Result<(SocketAddr, std::thread::JoinHandle<()>), HarnessError> {
        let (tx, rx) = std::sync::mpsc::channel();
        let handle = std::thread::Builder::new()
            .name("uiharness-server".into())
            .spawn(move || {
                let runtime = match tokio::runtime::Builder::new_current_thread()
                    .enable_all()
                    .build()
                {
                    Ok(runtime) => runtime,
                    Err(e) => {
                        let _ = tx.send(Err(HarnessError::from(e)));
                        return;
                    }
                };
                runtime.block_on(async move {
                    let server = match Self::bind(config, queue).await {
                        Ok(server) => server,
                        Err(e) => {
                            let _ = tx.send(Err(e));
                            return;
                        }
                    };
                    let _ = tx.send(server.local_addr());
                    if let Err(e) = server.run().await {
                        tracing::error!("Automation server error: {}", e);
                    }
                });
            })?;

        let addr = rx.recv().map_err(|_| {
            HarnessError::Network(std::io::Error::other("server thread exited during startup"))
        })??;
        Ok((addr, handle))
    }

    async fn serve_connection(&self, stream: TcpStream) -> Result<(), ProtocolError> {
        let (reader, mut writer) = stream.into_split();
        let mut reader = BufReader::new(reader);

        loop {
            let line = match read_line(&mut reader).await {
                Ok(line) => line,
                Err(ProtocolError::MessageTooLarge(len)) => {
                    tracing::warn!("Discarded {}-byte request line", len);
                    let response = Response::error(UNKNOWN_COMMAND, ErrorReason::LineTooLong);
                    write_response(&mut writer, &response).await?;
                    continue;
                }
                Err(e) => return Err(e),
            };

            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            tracing::debug!("Received: {}", line);

            let outcome = self.handle_line(line).await;
            tracing::debug!("Sending: {:?}", outcome.response);
            write_response(&mut writer, &outcome.response).await?;
            if let Some(payload) = outcome.payload {
                write_payload(&mut writer, &payload).await?;
            }
        }
    }

    async fn handle_line(&self, line: &str) -> Outcome {
        let command = match Command::parse(line) {
            Ok(command) => command,
            Err(e) => {
                tracing::debug!("Rejected request: {}", e);
                return Response::error(e.cmd, e.reason).into();
            }
        };

        let cmd = command.name();
        let fallback = command.failure_reason();
        let timeout = self.config.completion_timeout(&command);

        let ticket = match self.queue.push(command) {
            Ok(ticket) => ticket,
            Err(e) => {
                tracing::warn!("Rejected '{}': {}", cmd, e);
                return Response::error(cmd, e.reason(fallback)).into();
            }
        };

        match ticket.wait(timeout).await {
            Ok(Reply::Done) => Response::ok(cmd).into(),
            Ok(Reply::Text(text)) => Response::text(cmd, text).into(),
            Ok(Reply::Widgets(ids)) => Response::widgets(cmd, ids).into(),
            Ok(Reply::Screenshot(shot)) => Outcome {
                response: Response::screenshot(shot.width, shot.height, shot.png.len()),
                payload: Some(shot.png),
            },
            Err(e) => {
                if matches!(e, HarnessError::Timeout(_)) {
                    tracing::warn!("'{}' did not complete: {}", cmd, e);
                }
                Response::error(cmd, e.reason(fallback)).into()
            }
        }
    }
}
