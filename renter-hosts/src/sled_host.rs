//! Sled-backed local hosts
//!
//! A host farm is a single sled database holding any number of hosts. Each
//! host keeps its sectors in its own tree; the `hosts` tree records every
//! host's contract and whether it is online. The farm persists the renter
//! key so contracts formed across runs share one renter.

use crate::contract::{form_contract, generate_key, public_key};
use crate::HostStats;
use async_trait::async_trait;
use bytes::Bytes;
use ed25519_dalek::SigningKey;
use renter_core::{Contract, HostError, HostKey, PublicKey, RenterError, Result, SectorRoot};
use renter_slab::{Host, HostPool};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

const HOSTS_TREE: &str = "hosts";
const META_TREE: &str = "meta";
const RENTER_KEY: &[u8] = b"renter_key";

/// What the farm records about each host
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostRecord {
    pub contract: Contract,
    pub online: bool,
}

fn storage_err(e: sled::Error) -> RenterError {
    RenterError::Storage(e.to_string())
}

fn host_err(e: sled::Error) -> HostError {
    HostError::Storage(e.to_string())
}

/// A sled database of local hosts
pub struct SledHostFarm {
    db: sled::Db,
    renter_key: SigningKey,
}

impl SledHostFarm {
    /// Open or create a host farm
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        info!(path = ?path.as_ref(), "Opening host farm");
        let db = sled::open(path.as_ref())
            .map_err(|e| RenterError::Storage(format!("Failed to open Sled: {}", e)))?;
        Self::with_db(db)
    }

    /// Open an in-memory farm (for testing)
    pub fn open_temporary() -> Result<Self> {
        let db = sled::Config::new()
            .temporary(true)
            .open()
            .map_err(|e| RenterError::Storage(format!("Failed to open Sled: {}", e)))?;
        Self::with_db(db)
    }

    fn with_db(db: sled::Db) -> Result<Self> {
        let meta = db.open_tree(META_TREE).map_err(storage_err)?;
        let renter_key = match meta.get(RENTER_KEY).map_err(storage_err)? {
            Some(bytes) => {
                let secret: [u8; 32] = bytes.as_ref().try_into().map_err(|_| {
                    RenterError::Storage("stored renter key is not 32 bytes".to_string())
                })?;
                SigningKey::from_bytes(&secret)
            }
            None => {
                let key = generate_key();
                meta.insert(RENTER_KEY, key.to_bytes().as_slice())
                    .map_err(storage_err)?;
                key
            }
        };
        Ok(Self { db, renter_key })
    }

    pub fn renter_key(&self) -> PublicKey {
        public_key(&self.renter_key)
    }

    fn hosts_tree(&self) -> Result<sled::Tree> {
        self.db.open_tree(HOSTS_TREE).map_err(storage_err)
    }

    fn sector_tree(&self, host: &HostKey) -> std::result::Result<sled::Tree, sled::Error> {
        self.db.open_tree(format!("sectors:{}", host))
    }

    /// Create a new host and form a contract with it
    pub fn add_host(&self) -> Result<Contract> {
        let hosts = self.hosts_tree()?;
        let host_ip = format!("127.0.0.1:{}", 9982 + hosts.len());
        let contract = form_contract(&self.renter_key, &generate_key(), host_ip, 0)?;

        let record = HostRecord {
            contract: contract.clone(),
            online: true,
        };
        hosts
            .insert(contract.host_key().as_bytes(), bincode::serialize(&record)?)
            .map_err(storage_err)?;

        debug!(host = %contract.host_key(), contract = %contract.id(), "host added");
        Ok(contract)
    }

    pub fn record(&self, host: &HostKey) -> Result<Option<HostRecord>> {
        match self.hosts_tree()?.get(host.as_bytes()).map_err(storage_err)? {
            Some(bytes) => Ok(Some(bincode::deserialize(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Every host record, ordered by host key
    pub fn records(&self) -> Result<Vec<HostRecord>> {
        let mut records = Vec::new();
        for item in self.hosts_tree()?.iter() {
            let (_, value) = item.map_err(storage_err)?;
            records.push(bincode::deserialize(&value)?);
        }
        Ok(records)
    }

    /// Contracts with every host, online or not
    pub fn contracts(&self) -> Result<Vec<Contract>> {
        Ok(self.records()?.into_iter().map(|r| r.contract).collect())
    }

    /// Take a host offline or bring it back
    ///
    /// Returns false if the farm has no such host.
    pub fn set_online(&self, host: &HostKey, online: bool) -> Result<bool> {
        let Some(mut record) = self.record(host)? else {
            return Ok(false);
        };
        record.online = online;
        self.hosts_tree()?
            .insert(host.as_bytes(), bincode::serialize(&record)?)
            .map_err(storage_err)?;
        info!(%host, online, "host status changed");
        Ok(true)
    }

    pub fn stats(&self, host: &HostKey) -> Result<HostStats> {
        let tree = self.sector_tree(host).map_err(storage_err)?;
        let mut stats = HostStats::default();
        for item in tree.iter() {
            let (_, value) = item.map_err(storage_err)?;
            stats.sectors += 1;
            stats.bytes_used += value.len() as u64;
        }
        Ok(stats)
    }

    /// Flush all pending writes to disk
    pub fn flush(&self) -> Result<()> {
        self.db.flush().map_err(storage_err)?;
        Ok(())
    }
}

impl HostPool for SledHostFarm {
    fn host(&self, contract: &Contract) -> std::result::Result<Arc<dyn Host>, HostError> {
        let key = contract.host_key();
        let record = self
            .record(&key)
            .map_err(|e| HostError::Storage(e.to_string()))?
            .ok_or_else(|| HostError::Unreachable(format!("unknown host {}", key)))?;
        if !record.online {
            return Err(HostError::Unreachable(format!("host {} is offline", key)));
        }

        let sectors = self.sector_tree(&key).map_err(host_err)?;
        Ok(Arc::new(SledHost { key, sectors }))
    }
}

/// One host of a farm
pub struct SledHost {
    key: HostKey,
    sectors: sled::Tree,
}

impl SledHost {
    pub fn key(&self) -> HostKey {
        self.key
    }
}

#[async_trait]
impl Host for SledHost {
    async fn upload_sector(&self, data: Bytes) -> std::result::Result<SectorRoot, HostError> {
        let root = SectorRoot::compute(&data);
        self.sectors
            .insert(root.as_bytes(), data.as_ref())
            .map_err(host_err)?;
        Ok(root)
    }

    async fn download_sector(
        &self,
        root: &SectorRoot,
        offset: u32,
        length: u32,
    ) -> std::result::Result<Bytes, HostError> {
        let data = self
            .sectors
            .get(root.as_bytes())
            .map_err(host_err)?
            .ok_or(HostError::SectorNotFound(*root))?;
        let end = offset as usize + length as usize;
        if end > data.len() {
            return Err(HostError::InvalidRange {
                offset,
                length,
                size: data.len() as u32,
            });
        }
        Ok(Bytes::copy_from_slice(&data[offset as usize..end]))
    }

    async fn delete_sectors(&self, roots: &[SectorRoot]) -> std::result::Result<(), HostError> {
        let mut missing = None;
        for root in roots {
            if self.sectors.remove(root.as_bytes()).map_err(host_err)?.is_none() {
                missing.get_or_insert(*root);
            }
        }
        match missing {
            Some(root) => Err(HostError::SectorNotFound(root)),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contract::verify_contract;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_sector_roundtrip() {
        let farm = SledHostFarm::open_temporary().unwrap();
        let contract = farm.add_host().unwrap();
        let host = farm.host(&contract).unwrap();

        let root = host.upload_sector(Bytes::from_static(b"0123456789")).await.unwrap();
        assert_eq!(
            host.download_sector(&root, 3, 4).await.unwrap(),
            Bytes::from_static(b"3456")
        );
        assert!(matches!(
            host.download_sector(&root, 8, 4).await,
            Err(HostError::InvalidRange { size: 10, .. })
        ));

        let stats = farm.stats(&contract.host_key()).unwrap();
        assert_eq!(stats.sectors, 1);
        assert_eq!(stats.bytes_used, 10);

        host.delete_sectors(&[root]).await.unwrap();
        assert_eq!(
            host.delete_sectors(&[root]).await,
            Err(HostError::SectorNotFound(root))
        );
    }

    #[test]
    fn test_offline_host() {
        let farm = SledHostFarm::open_temporary().unwrap();
        let contract = farm.add_host().unwrap();

        assert!(farm.set_online(&contract.host_key(), false).unwrap());
        assert!(matches!(
            farm.host(&contract),
            Err(HostError::Unreachable(_))
        ));
        assert!(!farm
            .set_online(&PublicKey::from_bytes([1; 32]), false)
            .unwrap());
    }

    #[tokio::test]
    async fn test_farm_persists() {
        let dir = tempdir().unwrap();
        let (contract, root, renter) = {
            let farm = SledHostFarm::open(dir.path()).unwrap();
            let contract = farm.add_host().unwrap();
            let host = farm.host(&contract).unwrap();
            let root = host.upload_sector(Bytes::from_static(b"kept")).await.unwrap();
            farm.flush().unwrap();
            (contract, root, farm.renter_key())
        };

        let farm = SledHostFarm::open(dir.path()).unwrap();
        assert_eq!(farm.renter_key(), renter);
        assert_eq!(farm.contracts().unwrap(), vec![contract.clone()]);
        verify_contract(&contract).unwrap();

        let host = farm.host(&contract).unwrap();
        assert_eq!(
            host.download_sector(&root, 0, 4).await.unwrap(),
            Bytes::from_static(b"kept")
        );
    }
}
