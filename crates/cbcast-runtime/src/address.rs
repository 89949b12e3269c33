//! Static address book: which host and port each process listens on.
//!
//! File format, one process per line:
//!
//! ```text
//! # id host port
//! 0 127.0.0.1 1100
//! 1 127.0.0.1 1101
//! ```
//!
//! Blank lines and lines starting with `#` are ignored.

use crate::error::{Result, RuntimeError};
use cbcast_core::ProcessId;
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

/// Network location of one process.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProcessAddress {
    pub host: String,
    pub port: u16,
}

impl fmt::Display for ProcessAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// Mapping from process id to address, loaded once at startup.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AddressBook {
    entries: BTreeMap<ProcessId, ProcessAddress>,
}

impl AddressBook {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read and parse an address file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::parse(&text)
    }

    /// Parse address-file text.
    pub fn parse(text: &str) -> Result<Self> {
        let mut book = AddressBook::new();

        for (idx, raw) in text.lines().enumerate() {
            let line = raw.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let bad = |reason: String| RuntimeError::AddressBook {
                line: idx + 1,
                reason,
            };

            let parts: Vec<&str> = line.split_whitespace().collect();
            if parts.len() != 3 {
                return Err(bad(format!("expected `<id> <host> <port>`, got {:?}", line)));
            }
            let id = parts[0]
                .parse::<ProcessId>()
                .map_err(|e| bad(format!("invalid process id {:?}: {}", parts[0], e)))?;
            let port = parts[2]
                .parse::<u16>()
                .map_err(|e| bad(format!("invalid port {:?}: {}", parts[2], e)))?;

            if book.entries.contains_key(&id) {
                return Err(bad(format!("duplicate process id {}", id)));
            }
            book.insert(id, ProcessAddress {
                host: parts[1].to_string(),
                port,
            });
        }

        Ok(book)
    }

    pub fn insert(&mut self, id: ProcessId, address: ProcessAddress) {
        self.entries.insert(id, address);
    }

    pub fn get(&self, id: ProcessId) -> Option<&ProcessAddress> {
        self.entries.get(&id)
    }

    /// Address of `id`, or `MissingAddress`.
    pub fn require(&self, id: ProcessId) -> Result<&ProcessAddress> {
        self.get(id).ok_or(RuntimeError::MissingAddress(id))
    }

    /// All ids, ascending
    pub fn ids(&self) -> Vec<ProcessId> {
        self.entries.keys().copied().collect()
    }

    /// Number of processes in the run
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Ids must be exactly `0..len` so they can index vector clocks.
    pub fn validate_dense(&self) -> Result<()> {
        for (expected, id) in self.entries.keys().enumerate() {
            if *id != expected {
                return Err(RuntimeError::MissingAddress(expected));
            }
        }
        Ok(())
    }
}
