//! Application policy hooks.
//!
//! A policy decides when to broadcast, which peers get a deliberately
//! delayed copy, and when the process is done. It never touches the engine
//! directly: broadcasts are queued on the [`PolicyContext`] and carried out
//! by the process once the hook returns.

use cbcast_core::{CausalMessage, ProcessId, VectorClock};
use std::collections::BTreeSet;

/// A broadcast queued by a policy hook.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BroadcastRequest {
    pub payload: Option<String>,
    /// Peers whose copy is sent only after the configured send delay.
    pub delayed: BTreeSet<ProcessId>,
}

/// What a policy hook can see and request.
#[derive(Debug)]
pub struct PolicyContext {
    id: ProcessId,
    process_count: usize,
    clock: VectorClock,
    requests: Vec<BroadcastRequest>,
}

impl PolicyContext {
    pub fn new(id: ProcessId, process_count: usize, clock: VectorClock) -> Self {
        Self {
            id,
            process_count,
            clock,
            requests: Vec::new(),
        }
    }

    pub fn id(&self) -> ProcessId {
        self.id
    }

    pub fn process_count(&self) -> usize {
        self.process_count
    }

    /// Clock as it was when the hook was invoked.
    pub fn clock(&self) -> &VectorClock {
        &self.clock
    }

    /// Queue a broadcast sent to every peer immediately.
    pub fn broadcast(&mut self, payload: impl Into<String>) {
        self.broadcast_delayed(payload, std::iter::empty());
    }

    /// Queue a broadcast whose copies to `delayed` peers are held back.
    pub fn broadcast_delayed(
        &mut self,
        payload: impl Into<String>,
        delayed: impl IntoIterator<Item = ProcessId>,
    ) {
        self.requests.push(BroadcastRequest {
            payload: Some(payload.into()),
            delayed: delayed.into_iter().collect(),
        });
    }

    pub fn requests(&self) -> &[BroadcastRequest] {
        &self.requests
    }

    pub fn into_requests(self) -> Vec<BroadcastRequest> {
        self.requests
    }
}

/// Application logic layered on top of the delivery engine.
pub trait Policy: Send {
    /// Called once before the first loop iteration.
    fn on_start(&mut self, _ctx: &mut PolicyContext) {}

    /// Called for every delivered message, own broadcasts included, in
    /// delivery order.
    fn on_deliver(&mut self, _ctx: &mut PolicyContext, _message: &CausalMessage) {}

    /// Termination predicate over the local clock.
    fn is_finished(&self, id: ProcessId, clock: &VectorClock) -> bool;
}

impl<P: Policy + ?Sized> Policy for Box<P> {
    fn on_start(&mut self, ctx: &mut PolicyContext) {
        (**self).on_start(ctx)
    }

    fn on_deliver(&mut self, ctx: &mut PolicyContext, message: &CausalMessage) {
        (**self).on_deliver(ctx, message)
    }

    fn is_finished(&self, id: ProcessId, clock: &VectorClock) -> bool {
        (**self).is_finished(id, clock)
    }
}
