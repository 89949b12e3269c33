//! The causal delivery engine.
//!
//! One engine per process. It owns the local vector clock and the pending
//! buffer and is the only thing that mutates either. Callers that share an
//! engine between tasks must wrap it in a single lock so that `broadcast`
//! and `on_receive` never interleave.
//!
//! ## Clock conventions
//!
//! - The clock has one slot per process in the run, the local one included.
//! - `broadcast` increments the local slot once; delivering a message from
//!   `j` increments slot `j` once. Nothing else touches the clock.
//! - With [`SelfDelivery::Immediate`] the engine hands its own broadcast to
//!   the delivery handler right away, without a second increment. Its own
//!   messages coming back through the network are dropped.

use crate::buffer::PendingBuffer;
use cbcast_core::{CausalMessage, ProcessId, ProtocolError, Result, VectorClock};
use tracing::{debug, info, warn};

/// Receives messages at the moment they are delivered.
///
/// Called after the clock was advanced for the message and before the
/// pending buffer is rescanned.
pub trait DeliveryHandler {
    fn deliver(&mut self, message: &CausalMessage);
}

impl<F> DeliveryHandler for F
where
    F: FnMut(&CausalMessage),
{
    fn deliver(&mut self, message: &CausalMessage) {
        self(message)
    }
}

/// Collects delivered messages in delivery order.
impl DeliveryHandler for Vec<CausalMessage> {
    fn deliver(&mut self, message: &CausalMessage) {
        self.push(message.clone());
    }
}

/// Whether a broadcast is delivered locally at send time.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SelfDelivery {
    /// Hand the message to the delivery handler inside `broadcast`.
    #[default]
    Immediate,
    /// Only peers deliver the message.
    Skip,
}

/// Result of handing one inbound message to the engine.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReceiveOutcome {
    /// The message and this many messages in total (itself included) were
    /// delivered, counting buffered messages released by the fixpoint scan.
    Delivered(usize),
    /// The message waits in the pending buffer.
    Buffered,
    /// Already delivered; dropped.
    Duplicate,
    /// Our own broadcast came back; dropped.
    OwnMessage,
}

/// Per-process causal delivery state.
#[derive(Debug, Clone)]
pub struct CausalDeliveryEngine {
    id: ProcessId,
    clock: VectorClock,
    pending: PendingBuffer,
    self_delivery: SelfDelivery,
    delivered: u64,
}

impl CausalDeliveryEngine {
    /// Create the engine for process `id` in a run of `process_count`
    /// processes. The clock starts at all zeros.
    pub fn new(id: ProcessId, process_count: usize) -> Result<Self> {
        if id >= process_count {
            return Err(ProtocolError::UnknownProcess { id, process_count });
        }
        Ok(Self {
            id,
            clock: VectorClock::new(process_count),
            pending: PendingBuffer::new(),
            self_delivery: SelfDelivery::default(),
            delivered: 0,
        })
    }

    pub fn with_self_delivery(mut self, mode: SelfDelivery) -> Self {
        self.self_delivery = mode;
        self
    }

    pub fn id(&self) -> ProcessId {
        self.id
    }

    pub fn process_count(&self) -> usize {
        self.clock.len()
    }

    /// Current local clock (read-only)
    pub fn clock(&self) -> &VectorClock {
        &self.clock
    }

    pub fn pending(&self) -> &PendingBuffer {
        &self.pending
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Messages delivered so far, own broadcasts excluded.
    pub fn delivered_count(&self) -> u64 {
        self.delivered
    }

    pub fn self_delivery(&self) -> SelfDelivery {
        self.self_delivery
    }

    /// `V + e_j >= Vm` for a message from `j` stamped `Vm`.
    pub fn is_deliverable(&self, message: &CausalMessage) -> Result<bool> {
        self.clock.can_deliver(message.source, &message.clock)
    }

    /// Evaluate a termination predicate against the current clock.
    pub fn is_done<F>(&self, predicate: F) -> bool
    where
        F: Fn(&VectorClock) -> bool,
    {
        predicate(&self.clock)
    }

    /// Stamp a new broadcast: bump the local slot and build the message to
    /// hand to every peer.
    pub fn broadcast<H>(&mut self, payload: Option<String>, handler: &mut H) -> Result<CausalMessage>
    where
        H: DeliveryHandler + ?Sized,
    {
        self.clock.increment(self.id)?;
        let message = CausalMessage::new(self.id, self.clock.clone(), payload);
        info!(
            process = self.id,
            clock = %self.clock,
            payload = ?message.payload,
            "broadcasting"
        );

        if self.self_delivery == SelfDelivery::Immediate {
            handler.deliver(&message);
        }
        Ok(message)
    }

    /// Handle one inbound message: deliver it and everything it unblocks, or
    /// buffer it.
    ///
    /// Fails without touching any state when the message does not fit this
    /// run (wrong clock length or unknown source).
    pub fn on_receive<H>(&mut self, message: CausalMessage, handler: &mut H) -> Result<ReceiveOutcome>
    where
        H: DeliveryHandler + ?Sized,
    {
        self.validate(&message)?;
        debug!(
            process = self.id,
            from = message.source,
            stamp = %message.clock,
            "received"
        );

        if message.source == self.id {
            warn!(process = self.id, stamp = %message.clock, "dropping own message");
            return Ok(ReceiveOutcome::OwnMessage);
        }
        if self.is_stale(&message) {
            debug!(
                process = self.id,
                from = message.source,
                stamp = %message.clock,
                "dropping duplicate"
            );
            return Ok(ReceiveOutcome::Duplicate);
        }

        if self.is_deliverable(&message)? {
            let count = self.deliver(message, handler)?;
            Ok(ReceiveOutcome::Delivered(count))
        } else {
            self.pending.push(message);
            debug!(
                process = self.id,
                pending = self.pending.len(),
                "buffered undeliverable message"
            );
            Ok(ReceiveOutcome::Buffered)
        }
    }

    /// Deliver `message`, then rescan the pending buffer until a full pass
    /// delivers nothing. Returns the number of messages delivered.
    fn deliver<H>(&mut self, message: CausalMessage, handler: &mut H) -> Result<usize>
    where
        H: DeliveryHandler + ?Sized,
    {
        self.apply(message, handler)?;
        let mut count = 1;

        loop {
            let clock = &self.clock;
            let next = self.pending.take_first(|m| Self::is_ready(clock, m));
            match next {
                Some(message) => {
                    self.apply(message, handler)?;
                    count += 1;
                }
                None => break,
            }
        }

        let clock = &self.clock;
        let dropped = self.pending.discard_where(|m| Self::stale_against(clock, m));
        if dropped > 0 {
            debug!(process = self.id, dropped, "discarded buffered duplicates");
        }
        Ok(count)
    }

    fn apply<H>(&mut self, message: CausalMessage, handler: &mut H) -> Result<()>
    where
        H: DeliveryHandler + ?Sized,
    {
        self.clock.increment(message.source)?;
        self.delivered += 1;
        info!(
            process = self.id,
            from = message.source,
            clock = %self.clock,
            "delivered"
        );
        handler.deliver(&message);
        Ok(())
    }

    fn validate(&self, message: &CausalMessage) -> Result<()> {
        let process_count = self.clock.len();
        if message.source >= process_count {
            return Err(ProtocolError::UnknownProcess {
                id: message.source,
                process_count,
            });
        }
        if message.clock.len() != process_count {
            return Err(ProtocolError::SizeMismatch {
                expected: process_count,
                found: message.clock.len(),
            });
        }
        Ok(())
    }

    fn is_stale(&self, message: &CausalMessage) -> bool {
        Self::stale_against(&self.clock, message)
    }

    /// The sender's slot in the stamp is already covered locally.
    fn stale_against(clock: &VectorClock, message: &CausalMessage) -> bool {
        message.sequence() <= clock.get(message.source).unwrap_or(0)
    }

    /// Buffered messages were validated on the way in, so the comparison
    /// cannot fail here.
    fn is_ready(clock: &VectorClock, message: &CausalMessage) -> bool {
        !Self::stale_against(clock, message)
            && clock
                .can_deliver(message.source, &message.clock)
                .unwrap_or(false)
    }
}
