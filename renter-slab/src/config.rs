//! Slab engine configuration
//!
//! Defaults can be overridden from environment variables.

use renter_core::{env_or, RenterError, Result, DEFAULT_SLAB_SIZE, MAX_SLAB_SIZE, MIN_SLAB_SIZE};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Slab engine configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SlabConfig {
    /// Plaintext bytes per slab (rounded up to a multiple of `min_shards`)
    pub slab_size: usize,

    /// Maximum host operations in flight per call
    pub max_concurrent_transfers: usize,

    /// Maximum slabs (or slices) in progress per call
    pub max_slabs_in_flight: usize,

    /// Timeout for a single host operation in seconds
    pub host_timeout_secs: u64,
}

impl Default for SlabConfig {
    fn default() -> Self {
        Self {
            slab_size: DEFAULT_SLAB_SIZE,
            max_concurrent_transfers: 16,
            max_slabs_in_flight: 2,
            host_timeout_secs: 30,
        }
    }
}

impl SlabConfig {
    /// Create configuration from environment variables
    ///
    /// Unset variables keep their default; unparseable ones are an error.
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();
        let config = Self {
            slab_size: env_or("RENTER_SLAB_SIZE", defaults.slab_size)?,
            max_concurrent_transfers: env_or(
                "RENTER_MAX_CONCURRENT",
                defaults.max_concurrent_transfers,
            )?,
            max_slabs_in_flight: env_or(
                "RENTER_MAX_SLABS_IN_FLIGHT",
                defaults.max_slabs_in_flight,
            )?,
            host_timeout_secs: env_or("RENTER_HOST_TIMEOUT", defaults.host_timeout_secs)?,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if !(MIN_SLAB_SIZE..=MAX_SLAB_SIZE).contains(&self.slab_size) {
            return Err(RenterError::Configuration(format!(
                "slab size {} outside [{}, {}]",
                self.slab_size, MIN_SLAB_SIZE, MAX_SLAB_SIZE
            )));
        }
        if self.max_concurrent_transfers == 0 {
            return Err(RenterError::Configuration(
                "max_concurrent_transfers must be positive".to_string(),
            ));
        }
        if self.max_slabs_in_flight == 0 {
            return Err(RenterError::Configuration(
                "max_slabs_in_flight must be positive".to_string(),
            ));
        }
        if self.host_timeout_secs == 0 {
            return Err(RenterError::Configuration(
                "host_timeout_secs must be positive".to_string(),
            ));
        }
        Ok(())
    }

    /// Get host timeout as Duration
    pub fn host_timeout(&self) -> Duration {
        Duration::from_secs(self.host_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = SlabConfig::default();
        assert_eq!(config.slab_size, 4 * 1024 * 1024);
        assert_eq!(config.host_timeout(), Duration::from_secs(30));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validation() {
        let config = SlabConfig {
            slab_size: 16,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(RenterError::Configuration(_))
        ));

        let config = SlabConfig {
            max_concurrent_transfers: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_missing_fields_default() {
        let config: SlabConfig = serde_json::from_str(r#"{"slab_size": 8192}"#).unwrap();
        assert_eq!(config.slab_size, 8192);
        assert_eq!(config.max_slabs_in_flight, 2);
    }
}
