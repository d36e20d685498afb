//! Renter Hosts
//!
//! Host implementations for the slab engine:
//! - `MemoryHost` / `MemoryHostSet` for tests, with fault injection
//! - `SledHost` / `SledHostFarm` for persistent local hosts
//! - Signed contract formation and renewal

pub mod contract;
pub mod memory;
pub mod sled_host;

pub use contract::{form_contract, renew_contract, verify_contract};
pub use memory::{MemoryHost, MemoryHostSet};
pub use sled_host::{HostRecord, SledHost, SledHostFarm};

/// Storage statistics of one host
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HostStats {
    /// Number of sectors stored
    pub sectors: u64,

    /// Total bytes used by sectors
    pub bytes_used: u64,

    /// Operation counters (zero where the host does not track them)
    pub uploads: u64,
    pub downloads: u64,
    pub deletes: u64,
}
