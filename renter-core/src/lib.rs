//! Renter Core Library
//!
//! Core abstractions shared by the renter crates:
//! - Storage contract and slab manifest types (Contract, Slab, Slice, Object)
//! - m-of-n Reed-Solomon erasure coding over byte-striped shards
//! - BLAKE3 sector roots and per-object encryption keys
//! - Common error handling

pub mod crypto;
pub mod erasure;
pub mod error;
pub mod types;

pub use crypto::{CipherReader, CipherWriter, EncryptionKey, MAX_OBJECT_SIZE};
pub use erasure::{ErasureCoder, ErasureConfig, ShardData};
pub use error::{DeleteErrors, HostDeleteError, HostError, RenterError, Result};
pub use types::{
    ContractId, Contract, ContractMetadata, ContractSpending, Currency, FileContractRevision,
    HostKey, Location, Object, PublicKey, SectorRoot, Sector, SiacoinOutput, Slab, Slice,
    TransactionSignature, UnlockConditions,
};

/// Default redundancy
/// - 10 shards required to reconstruct a slab
/// - 30 shards stored, tolerating the loss of any 20 hosts
///
/// Override at runtime via RENTER_MIN_SHARDS / RENTER_TOTAL_SHARDS env vars.
pub const DEFAULT_MIN_SHARDS: u8 = 10;
pub const DEFAULT_TOTAL_SHARDS: u8 = 30;

/// Read redundancy from environment, falling back to compile-time defaults.
/// Returns (min_shards, total_shards).
///
/// Unparseable values are a `Configuration` error, as is a pair that does
/// not describe a valid m-of-n code.
pub fn redundancy_from_env() -> Result<(u8, u8)> {
    let min = env_or("RENTER_MIN_SHARDS", DEFAULT_MIN_SHARDS)?;
    let total = env_or("RENTER_TOTAL_SHARDS", DEFAULT_TOTAL_SHARDS)?;
    ErasureConfig::new(min as usize, total as usize)
        .map_err(|e| RenterError::Configuration(e.to_string()))?;
    Ok((min, total))
}

/// Parse environment variable `name`, or return `default` if it is unset
pub fn env_or<T: std::str::FromStr>(name: &str, default: T) -> Result<T> {
    match std::env::var(name) {
        Ok(v) => v
            .trim()
            .parse()
            .map_err(|_| RenterError::Configuration(format!("invalid value for {}: {:?}", name, v))),
        Err(_) => Ok(default),
    }
}

/// Slab size constants (plaintext bytes per slab)
pub const MIN_SLAB_SIZE: usize = 4 * 1024; // 4 KB
pub const DEFAULT_SLAB_SIZE: usize = 4 * 1024 * 1024; // 4 MB
pub const MAX_SLAB_SIZE: usize = 64 * 1024 * 1024; // 64 MB

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_env_parsing() {
        // variable names unique to this test so parallel tests don't race
        std::env::set_var("RENTER_CORE_TEST_GOOD", " 42 ");
        std::env::set_var("RENTER_CORE_TEST_BAD", "forty-two");
        assert_eq!(env_or::<u8>("RENTER_CORE_TEST_GOOD", 1).unwrap(), 42);
        assert!(matches!(
            env_or::<u8>("RENTER_CORE_TEST_BAD", 1),
            Err(RenterError::Configuration(_))
        ));
        assert_eq!(env_or::<u8>("RENTER_CORE_TEST_UNSET", 7).unwrap(), 7);
    }

    #[test]
    fn test_redundancy_from_env() {
        // the only test touching these variables
        std::env::remove_var("RENTER_MIN_SHARDS");
        std::env::remove_var("RENTER_TOTAL_SHARDS");
        assert_eq!(
            redundancy_from_env().unwrap(),
            (DEFAULT_MIN_SHARDS, DEFAULT_TOTAL_SHARDS)
        );

        std::env::set_var("RENTER_MIN_SHARDS", "2");
        std::env::set_var("RENTER_TOTAL_SHARDS", "3");
        assert_eq!(redundancy_from_env().unwrap(), (2, 3));

        std::env::set_var("RENTER_TOTAL_SHARDS", "three");
        assert!(matches!(
            redundancy_from_env(),
            Err(RenterError::Configuration(_))
        ));

        std::env::set_var("RENTER_TOTAL_SHARDS", "1");
        assert!(matches!(
            redundancy_from_env(),
            Err(RenterError::Configuration(_))
        ));

        std::env::remove_var("RENTER_MIN_SHARDS");
        std::env::remove_var("RENTER_TOTAL_SHARDS");
    }
}
