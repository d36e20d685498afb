//! Error types for the renter
//!
//! Provides a unified error type for all slab engine operations, plus the
//! per-host failure type reported by host capability implementations.

use crate::types::{HostKey, SectorRoot};
use std::fmt;
use thiserror::Error;

/// Result type alias for renter operations
pub type Result<T> = std::result::Result<T, RenterError>;

/// Unified error type for the renter
#[derive(Error, Debug)]
pub enum RenterError {
    // ===== Erasure Coding Errors =====
    #[error("Erasure coding error: {0}")]
    ErasureCoding(String),

    #[error("Insufficient shards: have {available}, need {required}")]
    InsufficientShards { available: usize, required: usize },

    #[error("Corrupt shard {index}: expected {expected} bytes, got {actual}")]
    CorruptShard {
        index: usize,
        expected: usize,
        actual: usize,
    },

    #[error("Invalid redundancy: {min}-of-{total}")]
    InvalidRedundancy { min: usize, total: usize },

    // ===== Slab Errors =====
    #[error("Shard {index} upload to host {host} failed: {cause}")]
    ShardUploadFailed {
        host: HostKey,
        index: usize,
        #[source]
        cause: HostError,
    },

    #[error("Not enough hosts: need {required}, have {available}")]
    NotEnoughHosts { required: usize, available: usize },

    #[error("Range out of bounds: offset {offset} + length {length} exceeds {size}")]
    RangeOutOfBounds { offset: u64, length: u64, size: u64 },

    #[error("Invalid slab: {0}")]
    InvalidSlab(String),

    #[error("Invalid contract: {0}")]
    InvalidContract(String),

    #[error("Failed to delete sectors: {0}")]
    DeleteFailed(DeleteErrors),

    #[error("Operation canceled")]
    Canceled,

    // ===== Metadata Errors =====
    #[error("Object not found: {0}")]
    ObjectNotFound(String),

    #[error("Storage error: {0}")]
    Storage(String),

    // ===== I/O Errors =====
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // ===== Serialization Errors =====
    #[error("Serialization error: {0}")]
    Serialization(String),

    // ===== Configuration Errors =====
    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl From<reed_solomon_erasure::Error> for RenterError {
    fn from(err: reed_solomon_erasure::Error) -> Self {
        RenterError::ErasureCoding(err.to_string())
    }
}

impl From<bincode::Error> for RenterError {
    fn from(err: bincode::Error) -> Self {
        RenterError::Serialization(err.to_string())
    }
}

impl From<serde_json::Error> for RenterError {
    fn from(err: serde_json::Error) -> Self {
        RenterError::Serialization(err.to_string())
    }
}

/// A failure reported by a single host
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HostError {
    #[error("host unreachable: {0}")]
    Unreachable(String),

    #[error("sector not found: {0}")]
    SectorNotFound(SectorRoot),

    #[error("invalid range: offset {offset} + length {length} exceeds sector size {size}")]
    InvalidRange { offset: u32, length: u32, size: u32 },

    #[error("host returned root {actual}, expected {expected}")]
    RootMismatch {
        expected: SectorRoot,
        actual: SectorRoot,
    },

    #[error("host rejected request: {0}")]
    Rejected(String),

    #[error("host operation timed out")]
    Timeout,

    #[error("host storage error: {0}")]
    Storage(String),
}

/// A delete that failed on one host
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostDeleteError {
    pub host: HostKey,
    pub sectors: usize,
    pub cause: HostError,
}

/// Every per-host failure of a delete call
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeleteErrors(pub Vec<HostDeleteError>);

impl DeleteErrors {
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &HostDeleteError> {
        self.0.iter()
    }
}

impl fmt::Display for DeleteErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} host(s) failed", self.0.len())?;
        for (i, e) in self.0.iter().enumerate() {
            let sep = if i == 0 { ": " } else { "; " };
            write!(f, "{}{} ({} sectors): {}", sep, e.host, e.sectors, e.cause)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = RenterError::InsufficientShards {
            available: 1,
            required: 2,
        };
        assert_eq!(err.to_string(), "Insufficient shards: have 1, need 2");
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: RenterError = io_err.into();
        assert!(matches!(err, RenterError::Io(_)));
    }

    #[test]
    fn test_delete_errors_display() {
        let errs = DeleteErrors(vec![
            HostDeleteError {
                host: HostKey::from_bytes([1; 32]),
                sectors: 2,
                cause: HostError::Timeout,
            },
            HostDeleteError {
                host: HostKey::from_bytes([2; 32]),
                sectors: 1,
                cause: HostError::Unreachable("offline".into()),
            },
        ]);
        let msg = errs.to_string();
        assert!(msg.starts_with("2 host(s) failed: ed25519:0101"));
        assert!(msg.contains("host operation timed out"));
        assert!(msg.contains("; ed25519:0202"));
    }
}
