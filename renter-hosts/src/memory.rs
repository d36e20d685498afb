//! In-memory hosts
//!
//! Used for testing and development. Not persistent. Hosts can be taken
//! offline, slowed down or have sectors corrupted to exercise the slab
//! engine's failure handling.

use crate::contract::{form_contract, generate_key, public_key, renew_contract};
use crate::HostStats;
use async_trait::async_trait;
use bytes::Bytes;
use ed25519_dalek::SigningKey;
use parking_lot::RwLock;
use renter_core::{Contract, HostError, HostKey, PublicKey, Result, SectorRoot};
use renter_slab::{Host, HostPool};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// In-memory sector store standing in for one host
pub struct MemoryHost {
    key: HostKey,

    /// Sector storage
    sectors: RwLock<HashMap<SectorRoot, Bytes>>,

    /// When false every operation fails as unreachable
    online: AtomicBool,

    /// Artificial delay before each operation
    latency_ms: AtomicU64,

    bytes_used: AtomicU64,

    /// Operation counters
    uploads: AtomicU64,
    downloads: AtomicU64,
    deletes: AtomicU64,
}

impl MemoryHost {
    pub fn new(key: HostKey) -> Self {
        Self {
            key,
            sectors: RwLock::new(HashMap::new()),
            online: AtomicBool::new(true),
            latency_ms: AtomicU64::new(0),
            bytes_used: AtomicU64::new(0),
            uploads: AtomicU64::new(0),
            downloads: AtomicU64::new(0),
            deletes: AtomicU64::new(0),
        }
    }

    pub fn key(&self) -> HostKey {
        self.key
    }

    pub fn set_online(&self, online: bool) {
        self.online.store(online, Ordering::SeqCst);
    }

    pub fn is_online(&self) -> bool {
        self.online.load(Ordering::SeqCst)
    }

    pub fn set_latency(&self, latency: Duration) {
        self.latency_ms
            .store(latency.as_millis() as u64, Ordering::SeqCst);
    }

    pub fn has_sector(&self, root: &SectorRoot) -> bool {
        self.sectors.read().contains_key(root)
    }

    pub fn sector_count(&self) -> usize {
        self.sectors.read().len()
    }

    /// Roots of every stored sector
    pub fn roots(&self) -> Vec<SectorRoot> {
        self.sectors.read().keys().copied().collect()
    }

    /// Flip one byte of a stored sector, keeping it filed under its old root
    ///
    /// Returns false if the sector is not stored or is empty.
    pub fn corrupt_sector(&self, root: &SectorRoot, at: usize) -> bool {
        let mut sectors = self.sectors.write();
        let Some(data) = sectors.get_mut(root) else {
            return false;
        };
        if data.is_empty() {
            return false;
        }
        let mut bytes = data.to_vec();
        let at = at % bytes.len();
        bytes[at] ^= 0xff;
        *data = Bytes::from(bytes);
        true
    }

    /// Clear all stored sectors
    pub fn clear(&self) {
        self.sectors.write().clear();
        self.bytes_used.store(0, Ordering::SeqCst);
    }

    pub fn stats(&self) -> HostStats {
        HostStats {
            sectors: self.sector_count() as u64,
            bytes_used: self.bytes_used.load(Ordering::SeqCst),
            uploads: self.uploads.load(Ordering::Relaxed),
            downloads: self.downloads.load(Ordering::Relaxed),
            deletes: self.deletes.load(Ordering::Relaxed),
        }
    }

    /// Apply the configured latency, then fail if the host is offline
    async fn reach(&self) -> std::result::Result<(), HostError> {
        let latency = self.latency_ms.load(Ordering::SeqCst);
        if latency > 0 {
            tokio::time::sleep(Duration::from_millis(latency)).await;
        }
        if !self.is_online() {
            return Err(HostError::Unreachable(format!("host {} is offline", self.key)));
        }
        Ok(())
    }
}

#[async_trait]
impl Host for MemoryHost {
    async fn upload_sector(&self, data: Bytes) -> std::result::Result<SectorRoot, HostError> {
        self.reach().await?;

        let root = SectorRoot::compute(&data);
        let len = data.len() as u64;
        if let Some(old) = self.sectors.write().insert(root, data) {
            self.bytes_used
                .fetch_sub(old.len() as u64, Ordering::SeqCst);
        }
        self.bytes_used.fetch_add(len, Ordering::SeqCst);
        self.uploads.fetch_add(1, Ordering::Relaxed);
        Ok(root)
    }

    async fn download_sector(
        &self,
        root: &SectorRoot,
        offset: u32,
        length: u32,
    ) -> std::result::Result<Bytes, HostError> {
        self.reach().await?;

        let data = self
            .sectors
            .read()
            .get(root)
            .cloned()
            .ok_or(HostError::SectorNotFound(*root))?;
        let end = offset as usize + length as usize;
        if end > data.len() {
            return Err(HostError::InvalidRange {
                offset,
                length,
                size: data.len() as u32,
            });
        }
        self.downloads.fetch_add(1, Ordering::Relaxed);
        Ok(data.slice(offset as usize..end))
    }

    async fn delete_sectors(&self, roots: &[SectorRoot]) -> std::result::Result<(), HostError> {
        self.reach().await?;

        let mut missing = None;
        let mut sectors = self.sectors.write();
        for root in roots {
            match sectors.remove(root) {
                Some(old) => {
                    self.bytes_used
                        .fetch_sub(old.len() as u64, Ordering::SeqCst);
                    self.deletes.fetch_add(1, Ordering::Relaxed);
                }
                None => {
                    missing.get_or_insert(*root);
                }
            }
        }
        match missing {
            Some(root) => Err(HostError::SectorNotFound(root)),
            None => Ok(()),
        }
    }
}

/// A set of in-memory hosts, each with a signed contract, acting as the
/// host pool for the slab engine
pub struct MemoryHostSet {
    renter_key: SigningKey,
    hosts: RwLock<HashMap<HostKey, (Arc<MemoryHost>, SigningKey)>>,
    contracts: RwLock<Vec<Contract>>,
}

impl MemoryHostSet {
    pub fn new() -> Self {
        Self {
            renter_key: generate_key(),
            hosts: RwLock::new(HashMap::new()),
            contracts: RwLock::new(Vec::new()),
        }
    }

    /// Create a set of `count` hosts
    pub fn with_hosts(count: usize) -> Result<Self> {
        let set = Self::new();
        for _ in 0..count {
            set.add_host()?;
        }
        Ok(set)
    }

    pub fn renter_key(&self) -> PublicKey {
        public_key(&self.renter_key)
    }

    /// Start a new host and form a contract with it
    pub fn add_host(&self) -> Result<Contract> {
        let host_key = generate_key();
        let mut contracts = self.contracts.write();
        let host_ip = format!("127.0.0.1:{}", 9982 + contracts.len());
        let contract = form_contract(&self.renter_key, &host_key, host_ip, 0)?;

        let key = contract.host_key();
        self.hosts
            .write()
            .insert(key, (Arc::new(MemoryHost::new(key)), host_key));
        contracts.push(contract.clone());

        debug!(host = %key, contract = %contract.id(), "memory host added");
        Ok(contract)
    }

    /// Renew the contract with `host`, replacing it in the set
    ///
    /// Sectors stay on the host; only the contract id changes.
    pub fn renew(&self, host: &HostKey, start_height: u64) -> Result<Option<Contract>> {
        let Some(host_signing) = self.hosts.read().get(host).map(|(_, key)| key.clone()) else {
            return Ok(None);
        };

        let mut contracts = self.contracts.write();
        let Some(slot) = contracts.iter_mut().find(|c| c.host_key() == *host) else {
            return Ok(None);
        };
        let renewed = renew_contract(slot, &self.renter_key, &host_signing, start_height)?;
        *slot = renewed.clone();
        Ok(Some(renewed))
    }

    /// Current contracts, one per host, in the order the hosts were added
    pub fn contracts(&self) -> Vec<Contract> {
        self.contracts.read().clone()
    }

    pub fn get(&self, key: &HostKey) -> Option<Arc<MemoryHost>> {
        self.hosts.read().get(key).map(|(host, _)| Arc::clone(host))
    }

    /// Every host, in contract order
    pub fn hosts(&self) -> Vec<Arc<MemoryHost>> {
        self.contracts
            .read()
            .iter()
            .filter_map(|c| self.get(&c.host_key()))
            .collect()
    }

    /// Total sectors stored across all hosts
    pub fn sector_count(&self) -> usize {
        self.hosts().iter().map(|h| h.sector_count()).sum()
    }
}

impl Default for MemoryHostSet {
    fn default() -> Self {
        Self::new()
    }
}

impl HostPool for MemoryHostSet {
    fn host(&self, contract: &Contract) -> std::result::Result<Arc<dyn Host>, HostError> {
        let key = contract.host_key();
        self.get(&key)
            .map(|host| host as Arc<dyn Host>)
            .ok_or_else(|| HostError::Unreachable(format!("unknown host {}", key)))
    }
}
