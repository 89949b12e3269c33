//! A running causal broadcast process.
//!
//! [`CausalProcess`] is the monitor around one [`CausalDeliveryEngine`]:
//! every public operation that touches the clock or the pending buffer
//! takes the engine lock exactly once, so broadcasts and deliveries never
//! interleave. Outbound copies are handed to independent Tokio tasks that
//! the process tracks only to wait for them at shutdown.
//!
//! ## Run loop
//!
//! ```text
//! policy.on_start
//! loop:
//!   pop at most one envelope from the inbox
//!   decode + on_receive (delivery fixpoint runs to completion)
//!   policy.on_deliver for each delivered message
//!   stop if policy.is_finished(clock)
//!   sleep a random time in [min_wait, max_wait]
//! wait for outstanding sends
//! ```

use crate::config::ProcessConfig;
use crate::error::{Result, RuntimeError};
use crate::inbox::Inbox;
use crate::network::Transport;
use crate::policy::{BroadcastRequest, Policy, PolicyContext};
use cbcast_core::{CausalMessage, ProcessId, VectorClock};
use cbcast_delivery::CausalDeliveryEngine;
use parking_lot::Mutex;
use rand::Rng;
use std::collections::{BTreeSet, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Final state of a process after its run loop ended.
#[derive(Clone, Debug)]
pub struct ProcessReport {
    pub id: ProcessId,
    pub clock: VectorClock,
    /// Every delivered message in delivery order, own broadcasts included.
    pub deliveries: Vec<CausalMessage>,
    /// Loop iterations executed.
    pub iterations: u64,
}

impl ProcessReport {
    /// Payloads of the delivered messages, in delivery order.
    pub fn payloads(&self) -> Vec<&str> {
        self.deliveries
            .iter()
            .filter_map(|m| m.payload.as_deref())
            .collect()
    }
}

/// One process of a causal broadcast run.
pub struct CausalProcess<T: Transport> {
    config: ProcessConfig,
    engine: Mutex<CausalDeliveryEngine>,
    inbox: Inbox,
    transport: Arc<T>,
    sends: Mutex<Vec<JoinHandle<()>>>,
    /// Appended only while the engine lock is held.
    deliveries: Mutex<Vec<CausalMessage>>,
    finished: AtomicBool,
}

impl<T: Transport> CausalProcess<T> {
    /// Create a process reading from `inbox` and sending through `transport`.
    pub fn new(config: ProcessConfig, transport: Arc<T>, inbox: Inbox) -> Result<Self> {
        let engine = CausalDeliveryEngine::new(config.id, config.process_count)?
            .with_self_delivery(config.self_delivery);

        Ok(Self {
            config,
            engine: Mutex::new(engine),
            inbox,
            transport,
            sends: Mutex::new(Vec::new()),
            deliveries: Mutex::new(Vec::new()),
            finished: AtomicBool::new(false),
        })
    }

    pub fn id(&self) -> ProcessId {
        self.config.id
    }

    pub fn config(&self) -> &ProcessConfig {
        &self.config
    }

    /// The inbound entrypoint transports push into.
    pub fn inbox(&self) -> &Inbox {
        &self.inbox
    }

    pub fn transport(&self) -> &Arc<T> {
        &self.transport
    }

    /// Snapshot of the local clock.
    pub fn clock(&self) -> VectorClock {
        self.engine.lock().clock().clone()
    }

    pub fn pending_count(&self) -> usize {
        self.engine.lock().pending_count()
    }

    /// Delivered messages so far, in delivery order.
    pub fn deliveries(&self) -> Vec<CausalMessage> {
        self.deliveries.lock().clone()
    }

    /// Set once the policy's termination predicate held.
    pub fn is_finished(&self) -> bool {
        self.finished.load(Ordering::SeqCst)
    }

    /// Dispatched sends that have not completed yet.
    pub fn outstanding_sends(&self) -> usize {
        self.sends.lock().iter().filter(|h| !h.is_finished()).count()
    }

    /// Broadcast `payload` to every peer. Copies to peers in `delayed` go
    /// out only after the configured send delay.
    ///
    /// Returns as soon as the sends are dispatched. Must be called from
    /// within a Tokio runtime.
    pub fn broadcast(
        &self,
        payload: Option<String>,
        delayed: &BTreeSet<ProcessId>,
    ) -> Result<CausalMessage> {
        let (message, _own) = self.broadcast_inner(payload, delayed)?;
        Ok(message)
    }

    fn broadcast_inner(
        &self,
        payload: Option<String>,
        delayed: &BTreeSet<ProcessId>,
    ) -> Result<(CausalMessage, Vec<CausalMessage>)> {
        let mut own: Vec<CausalMessage> = Vec::new();
        let message = {
            let mut engine = self.engine.lock();
            let message = engine.broadcast(payload, &mut own)?;
            self.deliveries.lock().extend(own.iter().cloned());
            message
        };

        let body = message.encode();
        for peer in self.transport.peers() {
            if peer == self.config.id {
                continue;
            }
            let delay = delayed
                .contains(&peer)
                .then(|| self.config.send_delay());
            self.dispatch(peer, body.clone(), delay);
        }

        Ok((message, own))
    }

    /// Fire-and-forget send on its own task; failures are only logged.
    fn dispatch(&self, to: ProcessId, body: String, delay: Option<Duration>) {
        let transport = Arc::clone(&self.transport);
        let from = self.config.id;

        let handle = tokio::spawn(async move {
            if let Some(delay) = delay {
                debug!(process = from, to, ?delay, "delaying send");
                tokio::time::sleep(delay).await;
            }
            if let Err(e) = transport.send(to, body).await {
                warn!(process = from, to, error = %e, "send failed");
            }
        });

        let mut sends = self.sends.lock();
        sends.retain(|h| !h.is_finished());
        sends.push(handle);
    }

    /// Take at most one envelope from the inbox and run it through the
    /// engine. Returns the messages delivered as a result, in order.
    ///
    /// A message that does not decode or does not fit this run fails with
    /// `RuntimeError::Protocol` and leaves the engine untouched.
    pub fn poll_once(&self) -> Result<Vec<CausalMessage>> {
        let envelope = match self.inbox.pop() {
            Some(envelope) => envelope,
            None => return Ok(Vec::new()),
        };

        let message =
            CausalMessage::decode(envelope.from, &envelope.body, self.config.process_count)?;
        let mut delivered: Vec<CausalMessage> = Vec::new();
        let outcome = {
            let mut engine = self.engine.lock();
            let outcome = engine.on_receive(message, &mut delivered)?;
            self.deliveries.lock().extend(delivered.iter().cloned());
            outcome
        };
        debug!(process = self.config.id, from = envelope.from, ?outcome, "processed envelope");
        Ok(delivered)
    }

    /// Run the process under `policy` until its termination predicate
    /// holds, then wait for outstanding sends.
    pub async fn run<P>(&self, policy: &mut P) -> Result<ProcessReport>
    where
        P: Policy + ?Sized,
    {
        let id = self.config.id;
        info!(process = id, processes = self.config.process_count, "starting");

        let mut ctx = self.context();
        policy.on_start(&mut ctx);
        let own = self.execute(ctx.into_requests())?;
        self.react(policy, own)?;

        let mut iterations = 0u64;
        loop {
            iterations += 1;

            match self.poll_once() {
                Ok(delivered) => self.react(policy, delivered)?,
                Err(RuntimeError::Protocol(e)) => {
                    error!(process = id, error = %e, "discarding message");
                }
                Err(e) => return Err(e),
            }

            if policy.is_finished(id, &self.clock()) {
                self.finished.store(true, Ordering::SeqCst);
                break;
            }

            tokio::time::sleep(self.next_wait()).await;
        }

        self.shutdown().await;
        let clock = self.clock();
        info!(process = id, %clock, iterations, "finished");

        Ok(ProcessReport {
            id,
            clock,
            deliveries: self.deliveries(),
            iterations,
        })
    }

    /// Wait for every dispatched send to complete.
    pub async fn shutdown(&self) {
        let handles = std::mem::take(&mut *self.sends.lock());
        if !handles.is_empty() {
            debug!(process = self.config.id, count = handles.len(), "waiting for sends");
        }
        for handle in handles {
            if let Err(e) = handle.await {
                warn!(process = self.config.id, error = %e, "send task failed");
            }
        }
    }

    /// Feed deliveries to the policy; deliveries caused by the broadcasts it
    /// requests (self-delivery) are fed back in turn.
    fn react<P>(&self, policy: &mut P, delivered: Vec<CausalMessage>) -> Result<()>
    where
        P: Policy + ?Sized,
    {
        let mut queue: VecDeque<CausalMessage> = delivered.into();
        while let Some(message) = queue.pop_front() {
            let mut ctx = self.context();
            policy.on_deliver(&mut ctx, &message);
            queue.extend(self.execute(ctx.into_requests())?);
        }
        Ok(())
    }

    fn execute(&self, requests: Vec<BroadcastRequest>) -> Result<Vec<CausalMessage>> {
        let mut own = Vec::new();
        for request in requests {
            let (_, delivered) = self.broadcast_inner(request.payload, &request.delayed)?;
            own.extend(delivered);
        }
        Ok(own)
    }

    fn context(&self) -> PolicyContext {
        PolicyContext::new(self.config.id, self.config.process_count, self.clock())
    }

    fn next_wait(&self) -> Duration {
        let min = self.config.min_wait_ms;
        let max = self.config.max_wait_ms.max(min);
        Duration::from_millis(rand::thread_rng().gen_range(min..=max))
    }
}
