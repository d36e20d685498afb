//! Host capability
//!
//! The slab engine talks to hosts only through these traits. A `HostPool`
//! is owned by the caller and hands out a connection for a contract; the
//! engine never caches hosts itself.

use async_trait::async_trait;
use bytes::Bytes;
use renter_core::{Contract, HostError, HostKey, SectorRoot};
use std::collections::HashMap;
use std::sync::Arc;

/// Sector storage offered by one host under a contract
#[async_trait]
pub trait Host: Send + Sync {
    /// Store a full sector and return its root
    async fn upload_sector(&self, data: Bytes) -> Result<SectorRoot, HostError>;

    /// Read `length` bytes of a stored sector starting at `offset`
    async fn download_sector(
        &self,
        root: &SectorRoot,
        offset: u32,
        length: u32,
    ) -> Result<Bytes, HostError>;

    /// Remove sectors
    ///
    /// Roots the host does not hold are skipped; the call then fails with
    /// `SectorNotFound` after removing the rest.
    async fn delete_sectors(&self, roots: &[SectorRoot]) -> Result<(), HostError>;
}

/// Source of host connections
pub trait HostPool: Send + Sync {
    fn host(&self, contract: &Contract) -> Result<Arc<dyn Host>, HostError>;
}

impl<P: HostPool + ?Sized> HostPool for Arc<P> {
    fn host(&self, contract: &Contract) -> Result<Arc<dyn Host>, HostError> {
        (**self).host(contract)
    }
}

/// Contracts usable by one call, indexed by host key
///
/// Sectors are matched to contracts by host rather than by contract id, so
/// a sector stored under a since-renewed contract is still reachable
/// through the renewal. When several contracts name the same host the
/// first one wins.
#[derive(Debug, Clone, Default)]
pub struct ContractIndex {
    contracts: Vec<Contract>,
    by_host: HashMap<HostKey, usize>,
}

impl ContractIndex {
    pub fn new(contracts: &[Contract]) -> Self {
        let mut index = Self::default();
        for contract in contracts {
            let host = contract.host_key();
            if index.by_host.contains_key(&host) {
                continue;
            }
            index.by_host.insert(host, index.contracts.len());
            index.contracts.push(contract.clone());
        }
        index
    }

    /// Number of distinct hosts
    pub fn len(&self) -> usize {
        self.contracts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.contracts.is_empty()
    }

    pub fn get(&self, host: &HostKey) -> Option<&Contract> {
        self.by_host.get(host).map(|&i| &self.contracts[i])
    }

    /// Contract receiving shard `shard` of slab `slab`
    ///
    /// Assignment is round-robin over the distinct hosts, so the shards of
    /// one slab land on different hosts whenever there are at least
    /// `total_shards` of them.
    pub fn assign(&self, slab: usize, shard: usize, total_shards: usize) -> Option<&Contract> {
        if self.contracts.is_empty() {
            return None;
        }
        self.contracts
            .get((slab * total_shards + shard) % self.contracts.len())
    }

    pub fn iter(&self) -> impl Iterator<Item = &Contract> {
        self.contracts.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use renter_core::{ContractId, PublicKey};
    use std::collections::HashSet;

    fn contract(id: u8, host: u8) -> Contract {
        Contract::new(
            ContractId::from_bytes([id; 32]),
            PublicKey::from_bytes([0; 32]),
            PublicKey::from_bytes([host; 32]),
            format!("host-{}:9982", host),
        )
    }

    #[test]
    fn test_dedup_by_host() {
        let contracts = vec![contract(1, 1), contract(2, 2), contract(3, 1)];
        let index = ContractIndex::new(&contracts);

        assert_eq!(index.len(), 2);
        let c = index.get(&PublicKey::from_bytes([1; 32])).unwrap();
        assert_eq!(c.id(), ContractId::from_bytes([1; 32]));
        assert!(index.get(&PublicKey::from_bytes([9; 32])).is_none());
    }

    #[test]
    fn test_round_robin_assignment() {
        let contracts: Vec<_> = (1..=5).map(|i| contract(i, i)).collect();
        let index = ContractIndex::new(&contracts);

        for slab in 0..4 {
            let hosts: HashSet<_> = (0..3)
                .map(|shard| index.assign(slab, shard, 3).unwrap().host_key())
                .collect();
            assert_eq!(hosts.len(), 3);
        }

        // slab 1 continues where slab 0 stopped
        assert_eq!(index.assign(1, 0, 3).unwrap().host_key(), contracts[3].host_key());
        assert_eq!(index.assign(1, 2, 3).unwrap().host_key(), contracts[0].host_key());
    }

    #[test]
    fn test_empty_index() {
        let index = ContractIndex::new(&[]);
        assert!(index.is_empty());
        assert!(index.assign(0, 0, 1).is_none());
    }
}
