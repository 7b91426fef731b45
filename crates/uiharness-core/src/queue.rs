//! Bounded hand-off from the network task to the UI thread
//!
//! The server pushes a [`QueuedCommand`] and awaits its [`Ticket`]. The UI
//! thread drains commands in FIFO order and completes each one exactly once.

use crate::error::HarnessError;
use crate::screenshot::Screenshot;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use uiharness_protocol::{Command, millis};

/// Successful outcome of a command
#[derive(Debug)]
pub enum Reply {
    Done,
    Text(Option<String>),
    Widgets(Vec<String>),
    Screenshot(Screenshot),
}

pub type CommandResult = Result<Reply, HarnessError>;

type Waker = Arc<dyn Fn() + Send + Sync>;

/// Sending half of a command's completion channel
#[derive(Debug)]
pub struct Completion(oneshot::Sender<CommandResult>);

impl Completion {
    /// Deliver the result; a waiter that already gave up is ignored
    pub fn complete(self, result: CommandResult) {
        if self.0.send(result).is_err() {
            tracing::debug!("Command completed after its waiter left");
        }
    }
}

/// A command waiting for the UI thread
#[derive(Debug)]
pub struct QueuedCommand {
    pub command: Command,
    pub completion: Completion,
}

/// Receiving half held by the network task
#[derive(Debug)]
pub struct Ticket(oneshot::Receiver<CommandResult>);

impl Ticket {
    /// Wait for completion, at most `timeout`
    pub async fn wait(self, timeout: Duration) -> CommandResult {
        match tokio::time::timeout(timeout, self.0).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(HarnessError::Abandoned),
            Err(_) => Err(HarnessError::Timeout(millis(timeout))),
        }
    }
}

/// Fixed-capacity FIFO shared between threads
pub struct CommandQueue {
    items: Mutex<VecDeque<QueuedCommand>>,
    capacity: usize,
    waker: Mutex<Option<Waker>>,
}

impl std::fmt::Debug for CommandQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandQueue")
            .field("len", &self.len())
            .field("capacity", &self.capacity)
            .finish()
    }
}

impl CommandQueue {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            items: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity,
            waker: Mutex::new(None),
        }
    }

    /// Install a callback run after every successful push
    ///
    /// Hosts use it to schedule a UI tick, e.g. by requesting a repaint.
    pub fn set_waker(&self, waker: impl Fn() + Send + Sync + 'static) {
        *self.waker.lock() = Some(Arc::new(waker));
    }

    /// Enqueue a command, failing immediately when full
    pub fn push(&self, command: Command) -> Result<Ticket, HarnessError> {
        let (tx, rx) = oneshot::channel();
        {
            let mut items = self.items.lock();
            if items.len() >= self.capacity {
                return Err(HarnessError::QueueFull {
                    capacity: self.capacity,
                });
            }
            items.push_back(QueuedCommand {
                command,
                completion: Completion(tx),
            });
        }

        let waker = self.waker.lock().clone();
        if let Some(wake) = waker {
            wake();
        }
        Ok(Ticket(rx))
    }

    /// Remove the oldest command
    pub fn drain_one(&self) -> Option<QueuedCommand> {
        self.items.lock().pop_front()
    }

    pub fn len(&self) -> usize {
        self.items.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.lock().is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Drop every pending command, failing each with [`HarnessError::Abandoned`]
    pub fn clear(&self) {
        let pending: Vec<QueuedCommand> = self.items.lock().drain(..).collect();
        if !pending.is_empty() {
            tracing::info!("Abandoning {} queued commands", pending.len());
        }
        for item in pending {
            item.completion.complete(Err(HarnessError::Abandoned));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_fifo_order() {
        let queue = CommandQueue::new(4);
        let _a = queue.push(Command::Wait { ms: 1 }).unwrap();
        let _b = queue.push(Command::Screenshot).unwrap();
        assert_eq!(queue.len(), 2);
        assert_eq!(queue.drain_one().unwrap().command, Command::Wait { ms: 1 });
        assert_eq!(queue.drain_one().unwrap().command, Command::Screenshot);
        assert!(queue.drain_one().is_none());
    }

    #[test]
    fn test_push_fails_when_full() {
        let queue = CommandQueue::new(2);
        let _a = queue.push(Command::ListWidgets).unwrap();
        let _b = queue.push(Command::ListWidgets).unwrap();
        let err = queue.push(Command::ListWidgets).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::QueueFull);
        assert_eq!(queue.len(), 2);
    }

    #[test]
    fn test_zero_capacity_is_raised_to_one() {
        let queue = CommandQueue::new(0);
        assert_eq!(queue.capacity(), 1);
    }

    #[test]
    fn test_waker_runs_on_push() {
        let queue = CommandQueue::new(4);
        let count = Arc::new(AtomicUsize::new(0));
        let seen = count.clone();
        queue.set_waker(move || {
            seen.fetch_add(1, Ordering::SeqCst);
        });
        let _a = queue.push(Command::ListWidgets).unwrap();
        let _b = queue.push(Command::ListWidgets).unwrap();
        assert_eq!(count.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_ticket_receives_result() {
        let queue = CommandQueue::new(4);
        let ticket = queue.push(Command::ListWidgets).unwrap();
        let item = queue.drain_one().unwrap();
        item.completion
            .complete(Ok(Reply::Widgets(vec!["a".into()])));
        match ticket.wait(Duration::from_secs(1)).await {
            Ok(Reply::Widgets(ids)) => assert_eq!(ids, vec!["a"]),
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_ticket_times_out() {
        let queue = CommandQueue::new(4);
        let ticket = queue.push(Command::ListWidgets).unwrap();
        let err = ticket.wait(Duration::from_millis(10)).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Timeout);
        assert!(matches!(err, HarnessError::Timeout(10)));
    }

    #[tokio::test]
    async fn test_clear_abandons_pending() {
        let queue = CommandQueue::new(4);
        let ticket = queue.push(Command::ListWidgets).unwrap();
        queue.clear();
        assert!(queue.is_empty());
        let err = ticket.wait(Duration::from_secs(1)).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Abandoned);
    }
}
