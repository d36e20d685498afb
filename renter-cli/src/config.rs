//! CLI configuration
//!
//! Config directory: ~/.renter/ (cross-platform)
//!
//! Config file format (~/.renter/config.toml):
//! ```toml
//! data_dir = "/home/me/.renter/data"
//!
//! [redundancy]
//! min_shards = 10
//! total_shards = 30
//!
//! [slab]
//! slab_size = 4194304
//! max_concurrent_transfers = 16
//! max_slabs_in_flight = 2
//! host_timeout_secs = 30
//! ```
//!
//! Environment variables override the file: RENTER_DATA_DIR,
//! RENTER_MIN_SHARDS, RENTER_TOTAL_SHARDS, RENTER_SLAB_SIZE,
//! RENTER_MAX_CONCURRENT, RENTER_MAX_SLABS_IN_FLIGHT, RENTER_HOST_TIMEOUT.

use anyhow::{bail, Context, Result};
use renter_core::{env_or, DEFAULT_MIN_SHARDS, DEFAULT_TOTAL_SHARDS};
use renter_slab::SlabConfig;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::warn;

/// Structure of ~/.renter/config.toml
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenterConfig {
    /// Where the host farm and object store live
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    #[serde(default)]
    pub redundancy: RedundancyConfig,

    #[serde(default)]
    pub slab: SlabConfig,
}

impl Default for RenterConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            redundancy: RedundancyConfig::default(),
            slab: SlabConfig::default(),
        }
    }
}

/// Default m-of-n for new uploads
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RedundancyConfig {
    pub min_shards: u8,
    pub total_shards: u8,
}

impl Default for RedundancyConfig {
    fn default() -> Self {
        Self {
            min_shards: DEFAULT_MIN_SHARDS,
            total_shards: DEFAULT_TOTAL_SHARDS,
        }
    }
}

fn default_data_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".renter")
        .join("data")
}

impl RenterConfig {
    /// Apply environment overrides on top of the loaded values
    pub fn apply_env(&mut self) -> Result<()> {
        if let Ok(dir) = std::env::var("RENTER_DATA_DIR") {
            self.data_dir = PathBuf::from(dir);
        }
        let redundancy = &mut self.redundancy;
        redundancy.min_shards = env_or("RENTER_MIN_SHARDS", redundancy.min_shards)?;
        redundancy.total_shards = env_or("RENTER_TOTAL_SHARDS", redundancy.total_shards)?;

        let slab = &mut self.slab;
        slab.slab_size = env_or("RENTER_SLAB_SIZE", slab.slab_size)?;
        slab.max_concurrent_transfers =
            env_or("RENTER_MAX_CONCURRENT", slab.max_concurrent_transfers)?;
        slab.max_slabs_in_flight = env_or("RENTER_MAX_SLABS_IN_FLIGHT", slab.max_slabs_in_flight)?;
        slab.host_timeout_secs = env_or("RENTER_HOST_TIMEOUT", slab.host_timeout_secs)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        let RedundancyConfig {
            min_shards,
            total_shards,
        } = self.redundancy;
        if min_shards == 0 || min_shards > total_shards {
            bail!(
                "invalid redundancy {}-of-{}: need 1 <= min_shards <= total_shards",
                min_shards,
                total_shards
            );
        }
        self.slab.validate()?;
        Ok(())
    }

    pub fn hosts_dir(&self) -> PathBuf {
        self.data_dir.join("hosts")
    }

    pub fn objects_dir(&self) -> PathBuf {
        self.data_dir.join("objects")
    }
}

/// Get the config directory path (~/.renter/)
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir().context("Could not determine home directory")?;
    Ok(home.join(".renter"))
}

/// Get the default config file path
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join("config.toml"))
}

/// Load configuration from `path`
///
/// Falls back to defaults if the file doesn't exist or can't be parsed.
pub fn load_config(path: &Path) -> RenterConfig {
    if !path.exists() {
        return RenterConfig::default();
    }
    match fs::read_to_string(path) {
        Ok(content) => match toml::from_str(&content) {
            Ok(config) => config,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Failed to parse config file");
                RenterConfig::default()
            }
        },
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Failed to read config file");
            RenterConfig::default()
        }
    }
}

/// Save configuration to `path`, creating its directory
pub fn save_config(path: &Path, config: &RenterConfig) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    let content = toml::to_string_pretty(config).context("Failed to serialize config")?;
    fs::write(path, content).context("Failed to write config file")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_default_config() {
        let config = RenterConfig::default();
        assert_eq!(config.redundancy.min_shards, 10);
        assert_eq!(config.redundancy.total_shards, 30);
        assert!(config.data_dir.ends_with(".renter/data"));
        config.validate().unwrap();
    }

    #[test]
    fn test_config_serialization() {
        let config = RenterConfig::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();

        assert!(toml_str.contains("data_dir"));
        assert!(toml_str.contains("[redundancy]"));
        assert!(toml_str.contains("[slab]"));
        assert_eq!(toml::from_str::<RenterConfig>(&toml_str).unwrap(), config);
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let config: RenterConfig = toml::from_str(
            r#"
            data_dir = "/tmp/farm"

            [slab]
            slab_size = 8192
            "#,
        )
        .unwrap();

        assert_eq!(config.data_dir, PathBuf::from("/tmp/farm"));
        assert_eq!(config.slab.slab_size, 8192);
        assert_eq!(config.slab.max_slabs_in_flight, 2);
        assert_eq!(config.redundancy, RedundancyConfig::default());
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let mut config = RenterConfig::default();
        config.redundancy = RedundancyConfig {
            min_shards: 2,
            total_shards: 3,
        };
        save_config(&path, &config).unwrap();

        assert_eq!(load_config(&path), config);
    }

    #[test]
    fn test_unparseable_file_falls_back() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "this is = = not toml").unwrap();

        assert_eq!(load_config(&path), RenterConfig::default());
        assert_eq!(
            load_config(&dir.path().join("missing.toml")),
            RenterConfig::default()
        );
    }

    #[test]
    fn test_env_overrides() {
        // the only test in this crate that reads RENTER_* variables
        std::env::set_var("RENTER_HOST_TIMEOUT", "5");
        let mut config = RenterConfig::default();
        config.apply_env().unwrap();
        assert_eq!(config.slab.host_timeout_secs, 5);
        assert_eq!(config.redundancy, RedundancyConfig::default());

        std::env::set_var("RENTER_HOST_TIMEOUT", "soon");
        let err = RenterConfig::default().apply_env().unwrap_err();
        assert!(err.to_string().contains("RENTER_HOST_TIMEOUT"));
        std::env::remove_var("RENTER_HOST_TIMEOUT");
    }

    #[test]
    fn test_invalid_redundancy() {
        let mut config = RenterConfig::default();
        config.redundancy.min_shards = 0;
        assert!(config.validate().is_err());

        config.redundancy = RedundancyConfig {
            min_shards: 4,
            total_shards: 3,
        };
        assert!(config.validate().is_err());
    }
}
