//! UI-thread side of the harness
//!
//! The [`Dispatcher`] owns the widget registry and drains the command queue
//! once per UI frame. Commands that take longer than one frame (waits and
//! screenshots the host has not rendered yet) stay in flight across ticks
//! and hold back later commands so completion order matches submission order.

use crate::config::HarnessConfig;
use crate::error::HarnessError;
use crate::host::UiHost;
use crate::queue::{CommandQueue, CommandResult, Completion, QueuedCommand, Reply};
use crate::registry::WidgetRegistry;
use crate::screenshot::{Capture, ScreenshotPipeline};
use std::sync::Arc;
use std::time::{Duration, Instant};
use uiharness_protocol::{Command, Point};

/// What one call to [`Dispatcher::tick`] did
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TickReport {
    /// Commands completed during this tick
    pub completed: usize,
    /// Commands still queued, not counting one in flight
    pub pending: usize,
    /// When the host should tick again, if work remains
    pub wake_after: Option<Duration>,
}

#[derive(Debug)]
enum Deferred {
    Wait { until: Instant },
    Frame { ticks: u32 },
}

#[derive(Debug)]
struct InFlight {
    cmd: &'static str,
    completion: Completion,
    state: Deferred,
}

enum Step {
    Finished,
    Deferred(InFlight),
}

/// Executes commands against a [`UiHost`] on the UI thread
pub struct Dispatcher<W> {
    registry: WidgetRegistry<W>,
    queue: Arc<CommandQueue>,
    pipeline: ScreenshotPipeline,
    frame_wait_ticks: u32,
    in_flight: Option<InFlight>,
}

impl<W: Clone + std::fmt::Debug> Dispatcher<W> {
    pub fn new(config: &HarnessConfig, queue: Arc<CommandQueue>) -> Self {
        Self {
            registry: WidgetRegistry::new(config.registry_capacity),
            queue,
            pipeline: ScreenshotPipeline::new(config.placeholder_screenshots),
            frame_wait_ticks: config.frame_wait_ticks,
            in_flight: None,
        }
    }

    /// Make a widget addressable by `id`
    pub fn register(&mut self, id: &str, handle: W) -> Result<(), HarnessError> {
        self.registry.register(id, handle)
    }

    pub fn registry(&self) -> &WidgetRegistry<W> {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut WidgetRegistry<W> {
        &mut self.registry
    }

    pub fn queue(&self) -> &Arc<CommandQueue> {
        &self.queue
    }

    /// Log every registered id
    pub fn log_registry(&self) {
        tracing::info!(
            "Widget registry: {}/{} entries",
            self.registry.len(),
            self.registry.capacity()
        );
        for (i, (id, handle)) in self.registry.iter().enumerate() {
            tracing::info!("  [{}] {} -> {:?}", i, id, handle);
        }
    }

    /// Drain and execute queued commands
    ///
    /// Call once per frame after the UI has been laid out so widget bounds
    /// are current. At most one queue's worth of commands runs per tick.
    pub fn tick<H: UiHost<Handle = W>>(&mut self, host: &mut H) -> TickReport {
        let mut completed = 0;

        if let Some(in_flight) = self.in_flight.take() {
            match self.resume(in_flight, host) {
                Step::Finished => completed += 1,
                Step::Deferred(in_flight) => self.in_flight = Some(in_flight),
            }
        }

        if self.in_flight.is_none() {
            for _ in 0..self.queue.capacity() {
                let Some(item) = self.queue.drain_one() else {
                    break;
                };
                match self.start(item, host) {
                    Step::Finished => completed += 1,
                    Step::Deferred(in_flight) => {
                        self.in_flight = Some(in_flight);
                        break;
                    }
                }
            }
        }

        let pending = self.queue.len();
        let wake_after = match &self.in_flight {
            Some(InFlight {
                state: Deferred::Wait { until },
                ..
            }) => Some(until.saturating_duration_since(Instant::now())),
            Some(_) => Some(Duration::ZERO),
            None if pending > 0 => Some(Duration::ZERO),
            None => None,
        };

        TickReport {
            completed,
            pending,
            wake_after,
        }
    }

    /// Run one command to completion on the calling (UI) thread
    ///
    /// Unlike [`tick`](Self::tick) this blocks: `wait` sleeps and
    /// `screenshot` re-flushes the host until a frame is ready.
    pub fn execute<H: UiHost<Handle = W>>(&mut self, command: &Command, host: &mut H) -> CommandResult {
        match command {
            Command::Wait { ms } => {
                std::thread::sleep(Duration::from_millis(u64::from(*ms)));
                Ok(Reply::Done)
            }
            Command::Screenshot => {
                let mut capture = self.pipeline.begin(host)?;
                for _ in 0..self.frame_wait_ticks {
                    match capture {
                        Capture::Ready(shot) => return Ok(Reply::Screenshot(shot)),
                        Capture::Pending => {
                            host.flush_frame();
                            capture = self.pipeline.poll(host)?;
                        }
                    }
                }
                match capture {
                    Capture::Ready(shot) => Ok(Reply::Screenshot(shot)),
                    Capture::Pending => Err(self.frame_timeout()),
                }
            }
            other => self.run_immediate(other, host),
        }
    }

    fn start<H: UiHost<Handle = W>>(&mut self, item: QueuedCommand, host: &mut H) -> Step {
        let QueuedCommand {
            command,
            completion,
        } = item;
        tracing::debug!("Dispatching {:?}", command);

        let cmd = command.name();
        let result = match &command {
            Command::Wait { ms } => {
                return Step::Deferred(InFlight {
                    cmd,
                    completion,
                    state: Deferred::Wait {
                        until: Instant::now() + Duration::from_millis(u64::from(*ms)),
                    },
                });
            }
            Command::Screenshot => match self.pipeline.begin(host) {
                Ok(Capture::Ready(shot)) => Ok(Reply::Screenshot(shot)),
                Ok(Capture::Pending) => {
                    return Step::Deferred(InFlight {
                        cmd,
                        completion,
                        state: Deferred::Frame { ticks: 0 },
                    });
                }
                Err(e) => Err(e),
            },
            other => self.run_immediate(other, host),
        };

        finish(cmd, completion, result);
        Step::Finished
    }

    fn resume<H: UiHost<Handle = W>>(&mut self, in_flight: InFlight, host: &mut H) -> Step {
        let InFlight {
            cmd,
            completion,
            state,
        } = in_flight;

        let result = match state {
            Deferred::Wait { until } => {
                if Instant::now() < until {
                    return Step::Deferred(InFlight {
                        cmd,
                        completion,
                        state: Deferred::Wait { until },
                    });
                }
                Ok(Reply::Done)
            }
            Deferred::Frame { ticks } => match self.pipeline.poll(host) {
                Ok(Capture::Ready(shot)) => Ok(Reply::Screenshot(shot)),
                Ok(Capture::Pending) if ticks + 1 < self.frame_wait_ticks => {
                    host.flush_frame();
                    return Step::Deferred(InFlight {
                        cmd,
                        completion,
                        state: Deferred::Frame { ticks: ticks + 1 },
                    });
                }
                Ok(Capture::Pending) => Err(self.frame_timeout()),
                Err(e) => Err(e),
            },
        };

        finish(cmd, completion, result);
        Step::Finished
    }

    fn frame_timeout(&self) -> HarnessError {
        HarnessError::Screenshot(format!(
            "no frame rendered after {} ticks",
            self.frame_wait_ticks
        ))
    }

    fn run_immediate<H: UiHost<Handle = W>>(&mut self, command: &Command, host: &mut H) -> CommandResult {
        match command {
            Command::Click { id } => {
                let widget = self.registry.lookup(id)?;
                host.click(widget)?;
                Ok(Reply::Done)
            }
            Command::Longpress { id, duration_ms } => {
                let widget = self.registry.lookup(id)?;
                let center = host.bounds(widget).map(|r| r.center());
                host.long_press(widget, center, Duration::from_millis(u64::from(*duration_ms)))?;
                Ok(Reply::Done)
            }
            Command::Swipe { from, to } => {
                host.swipe(*from, *to)?;
                Ok(Reply::Done)
            }
            Command::KeyEvent { code } => {
                host.key(*code)?;
                Ok(Reply::Done)
            }
            Command::GetText { id } => {
                let widget = self.registry.lookup(id)?;
                Ok(Reply::Text(host.text(widget)?))
            }
            Command::SetText { id, text } => {
                let widget = self.registry.lookup(id)?;
                host.set_text(widget, text)?;
                Ok(Reply::Done)
            }
            Command::ClickAt { at } => {
                let widget = self.hit_test(*at, host).ok_or_else(|| {
                    HarnessError::EventFailed(format!("no widget at {}", at))
                })?;
                host.click(&widget)?;
                Ok(Reply::Done)
            }
            Command::MouseMove { to } => {
                host.move_pointer(*to)?;
                Ok(Reply::Done)
            }
            Command::Drag { from, to } => {
                host.drag(*from, *to)?;
                Ok(Reply::Done)
            }
            Command::ListWidgets => Ok(Reply::Widgets(self.registry.ids())),
            Command::Wait { .. } | Command::Screenshot => self.execute(command, host),
        }
    }

    /// Topmost registered widget under `at`
    ///
    /// Later registrations are treated as drawn above earlier ones.
    fn hit_test<H: UiHost<Handle = W>>(&self, at: Point, host: &H) -> Option<W> {
        let mut hit = None;
        for (_, handle) in self.registry.iter() {
            if host.bounds(handle).is_some_and(|r| r.contains(at)) {
                hit = Some(handle);
            }
        }
        hit.cloned()
    }
}

fn finish(cmd: &'static str, completion: Completion, result: CommandResult) {
    if let Err(e) = &result {
        tracing::warn!("Command '{}' failed: {}", cmd, e);
    }
    completion.complete(result);
}
