//! Error types for clock and message handling.

use thiserror::Error;

use crate::clock::ProcessId;

/// Errors raised while comparing, parsing or validating causal metadata.
///
/// All of these indicate a configuration or protocol inconsistency across
/// the peer set. They abort the single operation that raised them and are
/// never worth retrying.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("Vector clock size mismatch: expected {expected} slots, found {found}")]
    SizeMismatch { expected: usize, found: usize },

    #[error("Unknown process {id} (process count: {process_count})")]
    UnknownProcess { id: ProcessId, process_count: usize },

    #[error("Malformed vector clock {input:?}: {reason}")]
    MalformedClock { input: String, reason: String },

    #[error("Empty message body")]
    EmptyMessage,
}

pub type Result<T> = std::result::Result<T, ProtocolError>;
