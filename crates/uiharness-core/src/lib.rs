//! Library to embed in a UI application for remote automation
//!
//! The application registers the widgets it wants addressable, starts the
//! TCP server, and calls [`Dispatcher::tick`] once per frame on its UI
//! thread. Commands arriving over the network are queued and executed there,
//! so the UI toolkit is never touched from another thread.
//!
//! ```rust,ignore
//! let harness = Harness::new(HarnessConfig::from_env());
//! let mut dispatcher = harness.dispatcher();
//! dispatcher.register("btn_ok", my_button)?;
//! harness.start_server_thread()?;
//! // in the frame callback:
//! dispatcher.tick(&mut my_host);
//! ```

use std::net::SocketAddr;
use std::sync::Arc;

pub use uiharness_protocol::{Command, ErrorReason, Point, Response};

pub mod config;
pub mod dispatch;
pub mod error;
pub mod host;
pub mod queue;
pub mod registry;
pub mod screenshot;
pub mod server;

pub use config::HarnessConfig;
pub use dispatch::{Dispatcher, TickReport};
pub use error::{ErrorKind, HarnessError};
pub use host::{FrameState, Rect, UiHost};
pub use queue::{CommandQueue, CommandResult, Reply, Ticket};
pub use registry::WidgetRegistry;
pub use screenshot::{CaptureSource, PixelFormat, RawFrame, Screenshot, ScreenshotPipeline};
pub use server::AutomationServer;

/// Shared configuration and command queue for one application
#[derive(Clone)]
pub struct Harness {
    config: HarnessConfig,
    queue: Arc<CommandQueue>,
}

impl Harness {
    pub fn new(config: HarnessConfig) -> Self {
        let queue = Arc::new(CommandQueue::new(config.queue_capacity));
        Self { config, queue }
    }

    pub fn config(&self) -> &HarnessConfig {
        &self.config
    }

    pub fn queue(&self) -> &Arc<CommandQueue> {
        &self.queue
    }

    /// Create the UI-thread dispatcher draining this harness's queue
    pub fn dispatcher<W: Clone + std::fmt::Debug>(&self) -> Dispatcher<W> {
        Dispatcher::new(&self.config, self.queue.clone())
    }

    /// Bind and start the server in a background task
    pub async fn start_server(&self) -> Result<SocketAddr, HarnessError> {
        let server = AutomationServer::bind(self.config.clone(), self.queue.clone()).await?;
        let addr = server.local_addr()?;
        server.spawn();
        Ok(addr)
    }

    /// Bind and start the server on a dedicated thread
    ///
    /// Use this when the calling thread runs the UI event loop and no tokio
    /// runtime is available.
    pub fn start_server_thread(&self) -> Result<SocketAddr, HarnessError> {
        let (addr, _thread) =
            AutomationServer::spawn_thread(self.config.clone(), self.queue.clone())?;
        Ok(addr)
    }
}

impl Default for Harness {
    fn default() -> Self {
        Self::new(HarnessConfig::default())
    }
}
