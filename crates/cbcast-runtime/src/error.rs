//! Error types for the process runtime.

use cbcast_core::{ProcessId, ProtocolError};
use thiserror::Error;

/// Errors returned by a transport's send capability.
///
/// Dispatched sends log these; they never reach the delivery engine.
#[derive(Error, Debug, Clone)]
pub enum NetworkError {
    #[error("Peer not found: {0}")]
    PeerNotFound(ProcessId),

    #[error("Send failed: {0}")]
    SendFailed(String),
}

/// Errors that can occur while setting up or running a process.
#[derive(Error, Debug)]
pub enum RuntimeError {
    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("Network error: {0}")]
    Network(#[from] NetworkError),

    #[error("Address book line {line}: {reason}")]
    AddressBook { line: usize, reason: String },

    #[error("No address for process {0}")]
    MissingAddress(ProcessId),

    #[error("Scenario {scenario} needs at least {required} processes, got {found}")]
    TooFewProcesses {
        scenario: String,
        required: usize,
        found: usize,
    },

    #[error("Peers unreachable: {0:?}")]
    PeersUnreachable(Vec<ProcessId>),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, RuntimeError>;
