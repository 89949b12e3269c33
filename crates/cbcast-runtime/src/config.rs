//! Configuration for a causal broadcast process.

use cbcast_core::ProcessId;
use cbcast_delivery::SelfDelivery;
use std::time::Duration;

/// Configuration for one process.
#[derive(Clone, Debug)]
pub struct ProcessConfig {
    /// Local process id.
    pub id: ProcessId,
    /// Number of processes in the run, the local one included.
    pub process_count: usize,
    /// Lower bound of the random pause between loop iterations (ms).
    pub min_wait_ms: u64,
    /// Upper bound of the random pause between loop iterations (ms).
    pub max_wait_ms: u64,
    /// How long deliberately delayed sends wait before going out (ms).
    pub send_delay_ms: u64,
    /// Whether own broadcasts are delivered locally at send time.
    pub self_delivery: SelfDelivery,
    /// Pause after shutdown before the process exits (ms).
    pub shutdown_grace_ms: u64,
    /// How long TCP bootstrap waits for every peer to accept (ms).
    pub connect_timeout_ms: u64,
}

impl ProcessConfig {
    pub fn builder(id: ProcessId, process_count: usize) -> ProcessConfigBuilder {
        ProcessConfigBuilder::new(id, process_count)
    }

    pub fn send_delay(&self) -> Duration {
        Duration::from_millis(self.send_delay_ms)
    }

    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_millis(self.shutdown_grace_ms)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }
}

/// Builder for process configuration.
pub struct ProcessConfigBuilder {
    config: ProcessConfig,
}

impl ProcessConfigBuilder {
    pub fn new(id: ProcessId, process_count: usize) -> Self {
        Self {
            config: ProcessConfig {
                id,
                process_count,
                min_wait_ms: 100,
                max_wait_ms: 500,
                send_delay_ms: 3000,
                self_delivery: SelfDelivery::Immediate,
                shutdown_grace_ms: 2000,
                connect_timeout_ms: 30_000,
            },
        }
    }

    pub fn wait_range(mut self, min_ms: u64, max_ms: u64) -> Self {
        self.config.min_wait_ms = min_ms.min(max_ms);
        self.config.max_wait_ms = max_ms.max(min_ms);
        self
    }

    pub fn send_delay(mut self, ms: u64) -> Self {
        self.config.send_delay_ms = ms;
        self
    }

    pub fn self_delivery(mut self, mode: SelfDelivery) -> Self {
        self.config.self_delivery = mode;
        self
    }

    pub fn shutdown_grace(mut self, ms: u64) -> Self {
        self.config.shutdown_grace_ms = ms;
        self
    }

    pub fn connect_timeout(mut self, ms: u64) -> Self {
        self.config.connect_timeout_ms = ms;
        self
    }

    pub fn build(self) -> ProcessConfig {
        self.config
    }
}
