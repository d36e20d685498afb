//! CLI Commands

pub mod delete;
pub mod download;
pub mod hosts;
pub mod list;
pub mod upload;

use crate::config::RenterConfig;
use anyhow::{Context, Result};
use renter_hosts::SledHostFarm;
use renter_metadata::SledObjectStore;
use renter_slab::SlabMover;

#[cfg(windows)]
pub const CHECK: &str = "[OK]";
#[cfg(not(windows))]
pub const CHECK: &str = "\u{2713}";

/// The local host farm and object store under the data directory
pub struct Workspace {
    pub mover: SlabMover<SledHostFarm>,
    pub store: SledObjectStore,
}

impl Workspace {
    pub fn open(config: &RenterConfig) -> Result<Self> {
        config.validate()?;
        let farm = SledHostFarm::open(config.hosts_dir())
            .with_context(|| format!("Failed to open host farm in {}", config.data_dir.display()))?;
        let store = SledObjectStore::open(config.objects_dir()).with_context(|| {
            format!("Failed to open object store in {}", config.data_dir.display())
        })?;
        Ok(Self {
            mover: SlabMover::new(farm, config.slab.clone()),
            store,
        })
    }

    pub fn farm(&self) -> &SledHostFarm {
        self.mover.pool()
    }

    pub fn flush(&self) -> Result<()> {
        self.farm().flush()?;
        self.store.flush()?;
        Ok(())
    }
}

/// Format bytes as human-readable string
pub fn format_bytes(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;
    const TB: u64 = GB * 1024;

    if bytes >= TB {
        format!("{:.2} TB", bytes as f64 / TB as f64)
    } else if bytes >= GB {
        format!("{:.2} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.2} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.2} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}
