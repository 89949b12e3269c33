//! # cbcast-core
//!
//! Leaf types for causal-order broadcast among a fixed set of processes.
//!
//! - [`VectorClock`]: one counter per process, with the comparison and
//!   increment operations the deliverability predicate is built from
//! - [`CausalMessage`]: `(source, attached clock, payload)` envelope
//! - the text wire codec shared by every process in a run
//!
//! ## Wire format
//!
//! ```text
//! [v0, v1, ..., v(N-1)]
//! <payload, optional, may span several lines>
//! ```
//!
//! The clock line is bit-exact across implementations: a literal `[`,
//! slots separated by `", "`, a literal `]`. A clock whose slot count
//! differs from the locally configured process count is rejected with
//! [`ProtocolError::SizeMismatch`].

pub mod clock;
pub mod error;
pub mod message;

pub use clock::{ProcessId, VectorClock};
pub use error::{ProtocolError, Result};
pub use message::CausalMessage;
