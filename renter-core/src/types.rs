//! Contract and slab manifest types
//!
//! A `Contract` binds the renter to one host. Uploaded data is described by
//! `Slab`s (n sectors, any m of which reconstruct the slab plaintext),
//! `Slice`s (byte ranges of a slab) and `Object`s (an ordered list of
//! slices plus the key the data was encrypted with).

use crate::crypto::EncryptionKey;
use crate::erasure::ErasureConfig;
use crate::error::{RenterError, Result};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

macro_rules! hash_type {
    ($(#[$meta:meta])* $name:ident, $prefix:literal) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name([u8; 32]);

        impl $name {
            pub const fn from_bytes(bytes: [u8; 32]) -> Self {
                Self(bytes)
            }

            pub fn as_bytes(&self) -> &[u8; 32] {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}:{}", $prefix, hex::encode(self.0))
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), &hex::encode(self.0)[..16])
            }
        }

        impl FromStr for $name {
            type Err = RenterError;

            fn from_str(s: &str) -> Result<Self> {
                let hex_str = s.strip_prefix(concat!($prefix, ":")).unwrap_or(s);
                let mut bytes = [0u8; 32];
                hex::decode_to_slice(hex_str, &mut bytes).map_err(|e| {
                    RenterError::Serialization(format!(
                        "invalid {} {:?}: {}",
                        stringify!($name),
                        s,
                        e
                    ))
                })?;
                Ok(Self(bytes))
            }
        }

        impl Serialize for $name {
            fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
                serializer.collect_str(self)
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
                let s = String::deserialize(deserializer)?;
                s.parse().map_err(serde::de::Error::custom)
            }
        }
    };
}

hash_type!(
    /// An ed25519 public key
    PublicKey,
    "ed25519"
);

hash_type!(
    /// Identifier of a file contract (the id of the contract's parent)
    ContractId,
    "fcid"
);

hash_type!(
    /// Content hash of a full sector, as returned by the host storing it
    SectorRoot,
    "h"
);

/// Public key of a host
pub type HostKey = PublicKey;

impl SectorRoot {
    /// Compute the root of sector data (BLAKE3)
    pub fn compute(data: &[u8]) -> Self {
        Self(*blake3::hash(data).as_bytes())
    }

    /// Check that `data` hashes to this root
    pub fn verify(&self, data: &[u8]) -> bool {
        Self::compute(data) == *self
    }
}

/// An amount of siacoins, in hastings
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Currency(pub u128);

impl Currency {
    pub const ZERO: Currency = Currency(0);

    pub fn checked_add(self, other: Currency) -> Option<Currency> {
        self.0.checked_add(other.0).map(Currency)
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Serialize for Currency {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Currency {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse::<u128>()
            .map(Currency)
            .map_err(serde::de::Error::custom)
    }
}

/// An output paying `value` to `address`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SiacoinOutput {
    pub value: Currency,
    pub address: String,
}

/// The keys that may sign revisions of a contract: renter first, host second
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnlockConditions {
    pub public_keys: [PublicKey; 2],
    pub signatures_required: u8,
}

/// The latest revision of a file contract
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileContractRevision {
    #[serde(rename = "parentID")]
    pub parent_id: ContractId,
    pub unlock_conditions: UnlockConditions,
    pub new_revision_number: u64,
    pub new_file_size: u64,
    pub new_file_merkle_root: SectorRoot,
    pub new_window_start: u64,
    pub new_window_end: u64,
    pub new_valid_proof_outputs: Vec<SiacoinOutput>,
    pub new_missed_proof_outputs: Vec<SiacoinOutput>,
}

/// A signature over a revision
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionSignature {
    #[serde(rename = "parentID")]
    pub parent_id: ContractId,
    pub public_key_index: u64,
    #[serde(with = "hex::serde")]
    pub signature: Vec<u8>,
}

/// Spending recorded against a contract
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContractSpending {
    pub uploads: Currency,
    pub downloads: Currency,
    pub fund_account: Currency,
}

/// Accounting and lineage of a contract
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContractMetadata {
    pub renewed_from: ContractId,
    pub spending: ContractSpending,
    pub total_cost: Currency,
}

/// A contract with a host, as supplied to the slab engine
///
/// The engine never mutates a contract; spending is updated by whoever
/// implements the host protocol.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Contract {
    #[serde(rename = "hostIP")]
    pub host_ip: String,
    pub start_height: u64,
    pub revision: FileContractRevision,
    pub signatures: [TransactionSignature; 2],
    pub metadata: ContractMetadata,
}

impl Contract {
    /// Create an unsigned, unfunded contract between `renter_key` and `host_key`
    pub fn new(
        id: ContractId,
        renter_key: PublicKey,
        host_key: HostKey,
        host_ip: impl Into<String>,
    ) -> Self {
        Self {
            host_ip: host_ip.into(),
            start_height: 0,
            revision: FileContractRevision {
                parent_id: id,
                unlock_conditions: UnlockConditions {
                    public_keys: [renter_key, host_key],
                    signatures_required: 2,
                },
                new_revision_number: 1,
                new_file_size: 0,
                new_file_merkle_root: SectorRoot::default(),
                new_window_start: 0,
                new_window_end: 0,
                new_valid_proof_outputs: vec![SiacoinOutput::default(), SiacoinOutput::default()],
                new_missed_proof_outputs: vec![SiacoinOutput::default(), SiacoinOutput::default()],
            },
            signatures: Default::default(),
            metadata: ContractMetadata::default(),
        }
    }

    /// Set the proof window
    pub fn with_window(mut self, start_height: u64, window_start: u64, window_end: u64) -> Self {
        self.start_height = start_height;
        self.revision.new_window_start = window_start;
        self.revision.new_window_end = window_end;
        self
    }

    /// Set the renter's payout
    pub fn with_renter_funds(mut self, funds: Currency) -> Self {
        match self.revision.new_valid_proof_outputs.first_mut() {
            Some(output) => output.value = funds,
            None => self.revision.new_valid_proof_outputs.push(SiacoinOutput {
                value: funds,
                address: String::new(),
            }),
        }
        self
    }

    /// ID of the original file contract
    pub fn id(&self) -> ContractId {
        self.revision.parent_id
    }

    /// Public key of the host
    pub fn host_key(&self) -> HostKey {
        self.revision.unlock_conditions.public_keys[1]
    }

    /// Height at which the host is no longer obligated to store contract data
    pub fn end_height(&self) -> u64 {
        self.revision.new_window_start
    }

    /// Funds remaining in the renter's payout
    pub fn renter_funds(&self) -> Currency {
        self.revision
            .new_valid_proof_outputs
            .first()
            .map(|o| o.value)
            .unwrap_or_default()
    }

    /// Where sectors stored under this contract can be found
    pub fn location(&self) -> Location {
        Location {
            host_key: self.host_key(),
            host_ip: self.host_ip.clone(),
            id: self.id(),
        }
    }
}

/// Where a sector of a slab can be located on the network
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Location {
    #[serde(rename = "hostKey")]
    pub host_key: HostKey,
    #[serde(rename = "hostIP")]
    pub host_ip: String,
    pub id: ContractId,
}

/// One shard of a slab as stored on a host
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Sector {
    #[serde(rename = "hostKey")]
    pub host_key: HostKey,
    #[serde(rename = "hostIP")]
    pub host_ip: String,
    #[serde(rename = "contractID")]
    pub contract_id: ContractId,
    pub root: SectorRoot,
}

impl Sector {
    pub fn new(location: Location, root: SectorRoot) -> Self {
        Self {
            host_key: location.host_key,
            host_ip: location.host_ip,
            contract_id: location.id,
            root,
        }
    }

    pub fn location(&self) -> Location {
        Location {
            host_key: self.host_key,
            host_ip: self.host_ip.clone(),
            id: self.contract_id,
        }
    }
}

/// The unit of erasure coding
///
/// `shards[i]` holds shard index `i`; any `min_shards` of them reconstruct
/// `shard_size * min_shards` bytes of plaintext (padding included).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Slab {
    pub shard_size: u32,
    pub min_shards: u8,
    pub total_shards: u8,
    pub shards: Vec<Sector>,
}

impl Slab {
    pub fn new(shard_size: u32, min_shards: u8, shards: Vec<Sector>) -> Result<Self> {
        let total_shards = u8::try_from(shards.len()).map_err(|_| {
            RenterError::InvalidRedundancy {
                min: min_shards as usize,
                total: shards.len(),
            }
        })?;
        let slab = Self {
            shard_size,
            min_shards,
            total_shards,
            shards,
        };
        slab.validate()?;
        Ok(slab)
    }

    /// Check the slab's structural invariants
    pub fn validate(&self) -> Result<()> {
        ErasureConfig::new(self.min_shards as usize, self.total_shards as usize)?;
        if self.shards.len() != self.total_shards as usize {
            return Err(RenterError::InvalidSlab(format!(
                "slab lists {} sectors, expected {}",
                self.shards.len(),
                self.total_shards
            )));
        }
        if self.shard_size == 0 {
            return Err(RenterError::InvalidSlab("shard size is zero".to_string()));
        }
        Ok(())
    }

    /// Reconstructed plaintext length, padding included
    pub fn plaintext_size(&self) -> u64 {
        self.shard_size as u64 * self.min_shards as u64
    }

    pub fn erasure_config(&self) -> Result<ErasureConfig> {
        ErasureConfig::new(self.min_shards as usize, self.total_shards as usize)
    }
}

/// A contiguous byte range within one slab's plaintext
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Slice {
    pub slab: Slab,
    pub offset: u32,
    pub length: u32,
}

impl Slice {
    pub fn new(slab: Slab, offset: u32, length: u32) -> Self {
        Self {
            slab,
            offset,
            length,
        }
    }

    /// Check that the slice lies within its slab
    pub fn validate(&self) -> Result<()> {
        self.slab.validate()?;
        let end = self.offset as u64 + self.length as u64;
        if end > self.slab.plaintext_size() {
            return Err(RenterError::RangeOutOfBounds {
                offset: self.offset as u64,
                length: self.length as u64,
                size: self.slab.plaintext_size(),
            });
        }
        Ok(())
    }
}

/// A named unit of user data: its slices plus the key it was encrypted with
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Object {
    pub key: EncryptionKey,
    pub slabs: Vec<Slice>,
}

impl Object {
    pub fn new(key: EncryptionKey, slabs: Vec<Slice>) -> Self {
        Self { key, slabs }
    }

    /// Build the slice list for a `size`-byte stream uploaded as `slabs`
    ///
    /// Every slab but the last is assumed full; the last slab holds the rest.
    pub fn from_slabs(key: EncryptionKey, slabs: Vec<Slab>, size: u64) -> Result<Self> {
        let capacity: u64 = slabs.iter().map(Slab::plaintext_size).sum();
        if size > capacity {
            return Err(RenterError::RangeOutOfBounds {
                offset: 0,
                length: size,
                size: capacity,
            });
        }

        let mut remaining = size;
        let mut slices = Vec::with_capacity(slabs.len());
        for slab in slabs {
            let length = remaining.min(slab.plaintext_size());
            remaining -= length;
            slices.push(Slice::new(slab, 0, length as u32));
        }
        Ok(Self::new(key, slices))
    }

    /// Total size of the object's data
    pub fn size(&self) -> u64 {
        self.slabs.iter().map(|s| s.length as u64).sum()
    }
}
