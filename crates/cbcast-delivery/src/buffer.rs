//! Pending buffer for received but not yet deliverable messages.
//!
//! The buffer is a multiset: arrival order is kept only so that scans are
//! deterministic, delivery order is decided by the causal predicate.

use cbcast_core::{CausalMessage, ProcessId};

/// Messages waiting for their causal predecessors.
#[derive(Debug, Clone, Default)]
pub struct PendingBuffer {
    messages: Vec<CausalMessage>,
}

impl PendingBuffer {
    pub fn new() -> Self {
        Self {
            messages: Vec::new(),
        }
    }

    /// Hold a message until it becomes deliverable.
    pub fn push(&mut self, message: CausalMessage) {
        self.messages.push(message);
    }

    /// Remove and return the first message (in arrival order) matching `pred`.
    pub fn take_first<F>(&mut self, mut pred: F) -> Option<CausalMessage>
    where
        F: FnMut(&CausalMessage) -> bool,
    {
        let idx = self.messages.iter().position(|m| pred(m))?;
        Some(self.messages.remove(idx))
    }

    /// Drop every message matching `pred`, returning how many were dropped.
    pub fn discard_where<F>(&mut self, mut pred: F) -> usize
    where
        F: FnMut(&CausalMessage) -> bool,
    {
        let before = self.messages.len();
        self.messages.retain(|m| !pred(m));
        before - self.messages.len()
    }

    /// Number of buffered messages
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Number of buffered messages from one source
    pub fn count_from(&self, source: ProcessId) -> usize {
        self.messages.iter().filter(|m| m.source == source).count()
    }

    pub fn iter(&self) -> impl Iterator<Item = &CausalMessage> {
        self.messages.iter()
    }
}
