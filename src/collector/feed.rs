//! Channel-based pointer input feed.
//!
//! The host pushes normalized inputs through an [`InputSender`]; the challenge
//! drains them in arrival order. Subscription is explicit: inputs sent while
//! the feed is stopped are refused, and stopping discards anything queued.

use crate::collector::types::PointerInput;
use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Default queue capacity for one widget.
pub const DEFAULT_FEED_CAPACITY: usize = 1024;

/// Errors that can occur while feeding inputs.
#[derive(Debug, PartialEq, Eq)]
pub enum CollectorError {
    AlreadyRunning,
    NotRunning,
    QueueFull,
    Disconnected,
}

impl std::fmt::Display for CollectorError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CollectorError::AlreadyRunning => write!(f, "Input feed is already running"),
            CollectorError::NotRunning => write!(f, "Input feed is not subscribed"),
            CollectorError::QueueFull => write!(f, "Input queue is full"),
            CollectorError::Disconnected => write!(f, "Input feed disconnected"),
        }
    }
}

impl std::error::Error for CollectorError {}

/// Producer half handed to the host's event dispatch.
#[derive(Debug, Clone)]
pub struct InputSender {
    sender: Sender<PointerInput>,
    running: Arc<AtomicBool>,
}

impl InputSender {
    /// Queue an input for the recorder.
    pub fn send(&self, input: PointerInput) -> Result<(), CollectorError> {
        if !self.running.load(Ordering::SeqCst) {
            return Err(CollectorError::NotRunning);
        }
        self.sender.try_send(input).map_err(|e| match e {
            TrySendError::Full(_) => CollectorError::QueueFull,
            TrySendError::Disconnected(_) => CollectorError::Disconnected,
        })
    }
}

/// Bounded queue of pointer inputs with a subscribe/unsubscribe lifecycle.
pub struct InputFeed {
    sender: Sender<PointerInput>,
    receiver: Receiver<PointerInput>,
    running: Arc<AtomicBool>,
}

impl InputFeed {
    /// Create a stopped feed with the given capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, receiver) = bounded(capacity.max(1));
        Self {
            sender,
            receiver,
            running: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Start accepting inputs.
    pub fn start(&mut self) -> Result<(), CollectorError> {
        if self.running.load(Ordering::SeqCst) {
            return Err(CollectorError::AlreadyRunning);
        }
        self.running.store(true, Ordering::SeqCst);
        Ok(())
    }

    /// Stop accepting inputs and drop anything still queued.
    pub fn stop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        while self.receiver.try_recv().is_ok() {}
    }

    /// Check if the feed is currently subscribed.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Get a producer handle for the host.
    pub fn sender(&self) -> InputSender {
        InputSender {
            sender: self.sender.clone(),
            running: Arc::clone(&self.running),
        }
    }

    /// Try to receive an input without blocking.
    pub fn try_recv(&self) -> Option<PointerInput> {
        self.receiver.try_recv().ok()
    }

    /// Take every queued input in arrival order.
    pub fn drain(&self) -> Vec<PointerInput> {
        self.receiver.try_iter().collect()
    }
}

impl Default for InputFeed {
    fn default() -> Self {
        Self::new(DEFAULT_FEED_CAPACITY)
    }
}
