//! cbcast-delivery - Causal delivery engine
//!
//! This crate turns a stream of broadcast messages arriving in arbitrary
//! order into a delivery sequence consistent with causality:
//! - Pending buffer for messages whose causal predecessors are missing
//! - The deliverability predicate `V + e_j >= Vm`
//! - Fixpoint redelivery after every successful delivery
//! - A deterministic network simulator for exercising all of the above
//!
//! ## Protocol
//!
//! ```text
//! On broadcast(p) at process i:
//!   V[i] := V[i] + 1
//!   send (i, V, p) to every j != i
//!
//! On receive (j, Vm, p):
//!   if V + e_j >= Vm then
//!     deliver; V[j] := V[j] + 1
//!     repeat: deliver any buffered m with V + e_m.src >= m.V
//!     until a full pass delivers nothing
//!   else
//!     buffer (j, Vm, p)
//! ```
//!
//! # Example
//!
//! ```rust
//! use cbcast_delivery::{CausalDeliveryEngine, CausalMessage, ReceiveOutcome};
//!
//! let mut sender = CausalDeliveryEngine::new(0, 3).unwrap();
//! let mut receiver = CausalDeliveryEngine::new(2, 3).unwrap();
//!
//! let mut own: Vec<CausalMessage> = Vec::new();
//! let m1 = sender.broadcast(Some("first".into()), &mut own).unwrap();
//! let m2 = sender.broadcast(Some("second".into()), &mut own).unwrap();
//!
//! let mut delivered: Vec<CausalMessage> = Vec::new();
//! assert_eq!(receiver.on_receive(m2, &mut delivered).unwrap(), ReceiveOutcome::Buffered);
//! assert_eq!(receiver.on_receive(m1, &mut delivered).unwrap(), ReceiveOutcome::Delivered(2));
//! assert_eq!(delivered[0].payload.as_deref(), Some("first"));
//! ```

pub mod buffer;
pub mod engine;
pub mod simulation;

pub use buffer::PendingBuffer;
pub use engine::{CausalDeliveryEngine, DeliveryHandler, ReceiveOutcome, SelfDelivery};
pub use simulation::{CausalCluster, NetworkConfig, NetworkSimulator, Packet};

pub use cbcast_core::{CausalMessage, ProcessId, ProtocolError, VectorClock};
