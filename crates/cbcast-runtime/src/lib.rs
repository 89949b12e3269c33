//! cbcast-runtime - Running causal broadcast processes
//!
//! The delivery engine is pure state; this crate supplies everything around
//! it that a running process needs:
//!
//! - [`inbox`] - exclusion-protected queue fed by the transport
//! - [`network`] - the [`Transport`] send capability and an in-memory network
//! - [`tcp`] - TCP transport bootstrapped from an address book
//! - [`address`] - static `ProcessId -> host:port` table loaded at startup
//! - [`config`] - process configuration and its builder
//! - [`policy`] - application hooks deciding when to broadcast and when to stop
//! - [`scenario`] - the sample policies
//! - [`process`] - the engine monitor, tracked sends and the run loop
//! - [`error`] - error types
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use cbcast_runtime::{create_network, scenario::HelloWorld, CausalProcess, ProcessConfig, Transport};
//! use std::sync::Arc;
//!
//! # async fn demo() -> cbcast_runtime::Result<()> {
//! let mut handles = Vec::new();
//! for (transport, inbox) in create_network(3) {
//!     let config = ProcessConfig::builder(transport.local_id(), 3).build();
//!     let process = CausalProcess::new(config, Arc::new(transport), inbox)?;
//!     handles.push(tokio::spawn(async move { process.run(&mut HelloWorld::new()).await }));
//! }
//! for handle in handles {
//!     let report = handle.await.expect("process task panicked")?;
//!     assert_eq!(report.clock.min_slot(), 1);
//! }
//! # Ok(())
//! # }
//! ```

pub mod address;
pub mod config;
pub mod error;
pub mod inbox;
pub mod network;
pub mod policy;
pub mod process;
pub mod scenario;
pub mod tcp;

pub use address::{AddressBook, ProcessAddress};
pub use config::{ProcessConfig, ProcessConfigBuilder};
pub use error::{NetworkError, Result, RuntimeError};
pub use inbox::{Envelope, Inbox};
pub use network::{create_network, MemoryTransport, Transport};
pub use policy::{BroadcastRequest, Policy, PolicyContext};
pub use process::{CausalProcess, ProcessReport};
pub use scenario::Scenario;
pub use tcp::TcpTransport;

pub use cbcast_core::{CausalMessage, ProcessId, ProtocolError, VectorClock};
pub use cbcast_delivery::{ReceiveOutcome, SelfDelivery};
