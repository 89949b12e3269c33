//! Causal message envelope and its text encoding.

use crate::clock::{ProcessId, VectorClock};
use crate::error::{ProtocolError, Result};
use serde::{Deserialize, Serialize};

/// A broadcast message as seen by the delivery engine.
///
/// `clock` is the sender's vector clock right after it incremented its own
/// slot for this broadcast. The payload is opaque to the engine.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CausalMessage {
    pub source: ProcessId,
    pub clock: VectorClock,
    pub payload: Option<String>,
}

impl CausalMessage {
    pub fn new(source: ProcessId, clock: VectorClock, payload: Option<String>) -> Self {
        Self {
            source,
            clock,
            payload,
        }
    }

    /// Number of messages `source` had broadcast up to and including this one.
    pub fn sequence(&self) -> u64 {
        self.clock.get(self.source).unwrap_or(0)
    }

    /// Encode as wire text: clock line, then the payload after a single `\n`.
    pub fn encode(&self) -> String {
        match &self.payload {
            Some(payload) => format!("{}\n{}", self.clock, payload),
            None => self.clock.encode(),
        }
    }

    /// Decode wire text received from `source` in a run of `process_count`
    /// processes.
    pub fn decode(source: ProcessId, body: &str, process_count: usize) -> Result<Self> {
        if source >= process_count {
            return Err(ProtocolError::UnknownProcess {
                id: source,
                process_count,
            });
        }
        if body.is_empty() {
            return Err(ProtocolError::EmptyMessage);
        }

        let (clock_line, payload) = match body.split_once('\n') {
            Some((line, rest)) => (line, Some(rest.to_string())),
            None => (body, None),
        };
        let clock = VectorClock::parse(clock_line, process_count)?;

        Ok(Self {
            source,
            clock,
            payload,
        })
    }
}
