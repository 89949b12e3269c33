//! Deterministic network simulation for causal delivery.
//!
//! Channels between processes are reliable but may reorder and duplicate
//! messages. Nothing is ever lost: the delivery engine assumes a transport
//! that does not drop.

use crate::engine::{CausalDeliveryEngine, ReceiveOutcome};
use cbcast_core::{CausalMessage, ProcessId, ProtocolError, Result, VectorClock};
use std::collections::VecDeque;

/// A message in flight towards one process
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    pub to: ProcessId,
    pub message: CausalMessage,
}

/// Network configuration for simulation
#[derive(Debug, Clone)]
pub struct NetworkConfig {
    /// Probability of message duplication (0.0 - 1.0)
    pub dup_rate: f64,
    /// Probability of message reordering (0.0 - 1.0)
    pub reorder_rate: f64,
    /// Seed for the internal generator
    pub seed: u64,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            dup_rate: 0.0,
            reorder_rate: 0.0,
            seed: 12345,
        }
    }
}

impl NetworkConfig {
    /// Create a network that reorders messages
    pub fn reordering(reorder_rate: f64) -> Self {
        Self {
            reorder_rate,
            ..Default::default()
        }
    }

    /// Create a network with duplicates
    pub fn with_dups(dup_rate: f64) -> Self {
        Self {
            dup_rate,
            ..Default::default()
        }
    }

    /// Create a chaotic network (heavy reordering and duplication)
    pub fn chaotic() -> Self {
        Self {
            dup_rate: 0.2,
            reorder_rate: 0.7,
            ..Default::default()
        }
    }

    pub fn seeded(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }
}

/// Reordering, duplicating, never-dropping network
#[derive(Debug)]
pub struct NetworkSimulator {
    in_flight: VecDeque<Packet>,
    config: NetworkConfig,
    rng_state: u64,
    sent: usize,
}

impl NetworkSimulator {
    pub fn new(config: NetworkConfig) -> Self {
        let rng_state = config.seed;
        Self {
            in_flight: VecDeque::new(),
            config,
            rng_state,
            sent: 0,
        }
    }

    /// Simple LCG random number generator
    fn next_random(&mut self) -> f64 {
        self.rng_state = self.rng_state.wrapping_mul(1103515245).wrapping_add(12345);
        ((self.rng_state >> 16) & 0x7fff) as f64 / 32768.0
    }

    /// Send a packet through the network
    pub fn send(&mut self, packet: Packet) {
        self.sent += 1;

        if self.next_random() < self.config.dup_rate {
            self.in_flight.push_back(packet.clone());
        }

        if self.next_random() < self.config.reorder_rate && !self.in_flight.is_empty() {
            // Jump the queue to a random earlier position
            let pos = (self.next_random() * self.in_flight.len() as f64) as usize;
            let pos = pos.min(self.in_flight.len());
            self.in_flight.insert(pos, packet);
        } else {
            self.in_flight.push_back(packet);
        }
    }

    /// Receive the next packet (if any)
    pub fn receive(&mut self) -> Option<Packet> {
        self.in_flight.pop_front()
    }

    pub fn is_empty(&self) -> bool {
        self.in_flight.is_empty()
    }

    pub fn in_flight_count(&self) -> usize {
        self.in_flight.len()
    }

    /// Packets handed to `send` so far, duplicates not counted
    pub fn sent_count(&self) -> usize {
        self.sent
    }
}

/// A set of delivery engines wired through one simulated network
#[derive(Debug)]
pub struct CausalCluster {
    engines: Vec<CausalDeliveryEngine>,
    logs: Vec<Vec<CausalMessage>>,
    network: NetworkSimulator,
}

impl CausalCluster {
    /// Create a cluster of `n` processes with ids `0..n`
    pub fn new(n: usize, config: NetworkConfig) -> Result<Self> {
        let engines = (0..n)
            .map(|id| CausalDeliveryEngine::new(id, n))
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            engines,
            logs: vec![Vec::new(); n],
            network: NetworkSimulator::new(config),
        })
    }

    pub fn engine(&self, id: ProcessId) -> Result<&CausalDeliveryEngine> {
        self.engines.get(id).ok_or_else(|| self.unknown(id))
    }

    /// Messages delivered at `id`, in delivery order (own broadcasts included)
    pub fn log(&self, id: ProcessId) -> Result<&[CausalMessage]> {
        self.logs
            .get(id)
            .map(Vec::as_slice)
            .ok_or_else(|| self.unknown(id))
    }

    pub fn clock(&self, id: ProcessId) -> Result<&VectorClock> {
        Ok(self.engine(id)?.clock())
    }

    /// Broadcast from `from` to every other process through the network
    pub fn broadcast(&mut self, from: ProcessId, payload: impl Into<String>) -> Result<CausalMessage> {
        if from >= self.engines.len() {
            return Err(self.unknown(from));
        }
        let message = self.engines[from].broadcast(Some(payload.into()), &mut self.logs[from])?;
        for to in 0..self.engines.len() {
            if to != from {
                self.network.send(Packet {
                    to,
                    message: message.clone(),
                });
            }
        }
        Ok(message)
    }

    fn unknown(&self, id: ProcessId) -> ProtocolError {
        ProtocolError::UnknownProcess {
            id,
            process_count: self.engines.len(),
        }
    }

    /// Process one network packet
    pub fn process_one(&mut self) -> Result<Option<ReceiveOutcome>> {
        match self.network.receive() {
            Some(packet) => {
                let outcome =
                    self.engines[packet.to].on_receive(packet.message, &mut self.logs[packet.to])?;
                Ok(Some(outcome))
            }
            None => Ok(None),
        }
    }

    /// Run until network is empty
    pub fn drain_network(&mut self) -> Result<()> {
        while self.process_one()?.is_some() {}
        Ok(())
    }

    /// Every process has the same clock and nothing left pending
    pub fn is_quiescent(&self) -> bool {
        self.network.is_empty()
            && self.engines.iter().all(|e| e.pending().is_empty())
            && self
                .engines
                .windows(2)
                .all(|pair| pair[0].clock() == pair[1].clock())
    }

    pub fn network(&self) -> &NetworkSimulator {
        &self.network
    }

    pub fn len(&self) -> usize {
        self.engines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.engines.is_empty()
    }
}
