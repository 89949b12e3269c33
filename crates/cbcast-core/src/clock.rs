//! Fixed-length vector clock.
//!
//! Slot `i` counts the broadcasts from process `i` that the owner of the
//! clock has delivered (or, for its own slot, sent). The length is fixed
//! at construction and equals the number of processes in the run,
//! including the local one.

use crate::error::{ProtocolError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Process identifier: an index into `0..process_count`.
pub type ProcessId = usize;

/// A vector clock with one slot per process.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VectorClock {
    slots: Vec<u64>,
}

impl VectorClock {
    /// Create an all-zero clock for `process_count` processes.
    pub fn new(process_count: usize) -> Self {
        VectorClock {
            slots: vec![0; process_count],
        }
    }

    /// Create a clock from explicit slot values.
    pub fn from_slots(slots: impl Into<Vec<u64>>) -> Self {
        VectorClock {
            slots: slots.into(),
        }
    }

    /// Number of slots.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Value of slot `id`, or `None` when out of range.
    pub fn get(&self, id: ProcessId) -> Option<u64> {
        self.slots.get(id).copied()
    }

    pub fn as_slice(&self) -> &[u64] {
        &self.slots
    }

    /// Increment slot `id` in place, returning the new value.
    pub fn increment(&mut self, id: ProcessId) -> Result<u64> {
        let len = self.slots.len();
        let slot = self
            .slots
            .get_mut(id)
            .ok_or(ProtocolError::UnknownProcess {
                id,
                process_count: len,
            })?;
        *slot += 1;
        Ok(*slot)
    }

    /// Copy of this clock with slot `id` incremented by one.
    ///
    /// Used for predicate evaluation; `self` is left untouched.
    pub fn with_increment(&self, id: ProcessId) -> Result<VectorClock> {
        let mut next = self.clone();
        next.increment(id)?;
        Ok(next)
    }

    /// True iff `self[i] >= other[i]` for every slot.
    ///
    /// Clocks of different lengths are a protocol error, never truncated.
    pub fn greater_or_equal(&self, other: &VectorClock) -> Result<bool> {
        self.check_len(other.len())?;
        Ok(self
            .slots
            .iter()
            .zip(&other.slots)
            .all(|(mine, theirs)| mine >= theirs))
    }

    /// True iff `self <= other` slot-wise and the two differ.
    pub fn happened_before(&self, other: &VectorClock) -> Result<bool> {
        Ok(other.greater_or_equal(self)? && self != other)
    }

    /// True iff neither clock is greater than or equal to the other.
    pub fn is_concurrent_with(&self, other: &VectorClock) -> Result<bool> {
        Ok(!self.greater_or_equal(other)? && !other.greater_or_equal(self)?)
    }

    /// Deliverability test for a message from `sender` stamped `stamp`.
    ///
    /// Holds iff `stamp[i] <= self[i]` for every `i != sender` and
    /// `stamp[sender] <= self[sender] + 1`.
    pub fn can_deliver(&self, sender: ProcessId, stamp: &VectorClock) -> Result<bool> {
        self.with_increment(sender)?.greater_or_equal(stamp)
    }

    /// Smallest slot value; zero for an empty clock.
    pub fn min_slot(&self) -> u64 {
        self.slots.iter().copied().min().unwrap_or(0)
    }

    /// Sum of all slots.
    pub fn total(&self) -> u64 {
        self.slots.iter().sum()
    }

    /// Canonical text form `"[v0, v1, ..., v(N-1)]"`.
    pub fn encode(&self) -> String {
        self.to_string()
    }

    /// Parse the canonical text form, requiring exactly `expected_len` slots.
    pub fn parse(input: &str, expected_len: usize) -> Result<VectorClock> {
        let inner = input
            .strip_prefix('[')
            .and_then(|rest| rest.strip_suffix(']'))
            .ok_or_else(|| ProtocolError::MalformedClock {
                input: input.to_string(),
                reason: "missing surrounding brackets".to_string(),
            })?;

        let parts: Vec<&str> = if inner.is_empty() {
            Vec::new()
        } else {
            inner.split(", ").collect()
        };

        if parts.len() != expected_len {
            return Err(ProtocolError::SizeMismatch {
                expected: expected_len,
                found: parts.len(),
            });
        }

        let slots = parts
            .into_iter()
            .map(|part| {
                part.parse::<u64>().map_err(|e| ProtocolError::MalformedClock {
                    input: input.to_string(),
                    reason: format!("slot {:?}: {}", part, e),
                })
            })
            .collect::<Result<Vec<u64>>>()?;

        Ok(VectorClock { slots })
    }

    fn check_len(&self, found: usize) -> Result<()> {
        if self.slots.len() != found {
            return Err(ProtocolError::SizeMismatch {
                expected: self.slots.len(),
                found,
            });
        }
        Ok(())
    }
}

impl fmt::Display for VectorClock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[")?;
        for (i, slot) in self.slots.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", slot)?;
        }
        write!(f, "]")
    }
}
