//! Inbound message queue.
//!
//! Transports push from any task or thread; the process run loop is the
//! single consumer. Every pushed envelope is popped exactly once.

use cbcast_core::ProcessId;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::Arc;

/// Transport-level unit: who sent it and the wire text of the message.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    pub from: ProcessId,
    pub body: String,
}

impl Envelope {
    pub fn new(from: ProcessId, body: impl Into<String>) -> Self {
        Self {
            from,
            body: body.into(),
        }
    }
}

/// Cloneable handle to one process's inbound queue.
#[derive(Clone, Debug, Default)]
pub struct Inbox {
    queue: Arc<Mutex<VecDeque<Envelope>>>,
}

impl Inbox {
    pub fn new() -> Self {
        Self::default()
    }

    /// The inbound entrypoint; safe to call concurrently.
    pub fn push(&self, envelope: Envelope) {
        self.queue.lock().push_back(envelope);
    }

    pub fn pop(&self) -> Option<Envelope> {
        self.queue.lock().pop_front()
    }

    pub fn len(&self) -> usize {
        self.queue.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.lock().is_empty()
    }
}
