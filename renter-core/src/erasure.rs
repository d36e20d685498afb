//! Reed-Solomon Erasure Coding
//!
//! Implements m-of-n erasure coding where:
//! - m data shards carry the plaintext, byte-striped: plaintext byte `j`
//!   lives in shard `j % m` at offset `j / m`
//! - n - m parity shards are computed over GF(2^8)
//! - ANY m of the n shards reconstruct the plaintext
//!
//! Striping makes every plaintext range `[a, b)` map to the same shard-local
//! window `[a / m, (b - 1) / m + 1)` in every shard, so a ranged read only
//! needs that window from m hosts.

use crate::error::{RenterError, Result};
use crate::{DEFAULT_MIN_SHARDS, DEFAULT_TOTAL_SHARDS};
use bytes::Bytes;
use rayon::prelude::*;
use reed_solomon_erasure::galois_8::ReedSolomon;
use serde::{Deserialize, Serialize};

/// Erasure coding configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErasureConfig {
    /// Number of shards required to reconstruct (m)
    pub min_shards: usize,
    /// Number of shards stored (n)
    pub total_shards: usize,
}

impl Default for ErasureConfig {
    fn default() -> Self {
        Self {
            min_shards: DEFAULT_MIN_SHARDS as usize,
            total_shards: DEFAULT_TOTAL_SHARDS as usize,
        }
    }
}

impl ErasureConfig {
    /// Create a new erasure config, requiring `0 < min <= total <= 255`
    pub fn new(min_shards: usize, total_shards: usize) -> Result<Self> {
        if min_shards == 0 || min_shards > total_shards || total_shards > u8::MAX as usize {
            return Err(RenterError::InvalidRedundancy {
                min: min_shards,
                total: total_shards,
            });
        }
        Ok(Self {
            min_shards,
            total_shards,
        })
    }

    /// Number of parity shards
    pub fn parity_shards(&self) -> usize {
        self.total_shards - self.min_shards
    }

    /// Maximum number of lost shards that can be tolerated
    pub fn max_failures(&self) -> usize {
        self.parity_shards()
    }

    /// Storage expansion (stored bytes per plaintext byte)
    pub fn overhead_ratio(&self) -> f64 {
        self.total_shards as f64 / self.min_shards as f64
    }

    /// Size of each shard for a plaintext of `data_len` bytes
    pub fn shard_size(&self, data_len: usize) -> usize {
        data_len.div_ceil(self.min_shards).max(1)
    }
}

/// A single shard of erasure-coded data
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShardData {
    /// Shard index (0 to total_shards-1)
    pub index: u8,
    /// Shard data
    pub data: Bytes,
    /// Whether this is a parity shard
    pub is_parity: bool,
}

impl ShardData {
    pub fn new(index: u8, data: Bytes, is_parity: bool) -> Self {
        Self {
            index,
            data,
            is_parity,
        }
    }

    pub fn size(&self) -> usize {
        self.data.len()
    }
}

/// Reed-Solomon encoder/decoder
pub struct ErasureCoder {
    config: ErasureConfig,
    /// None when `min_shards == total_shards` (no parity)
    encoder: Option<ReedSolomon>,
}

impl ErasureCoder {
    /// Create a coder for `min_shards`-of-`total_shards`
    pub fn new(min_shards: usize, total_shards: usize) -> Result<Self> {
        Self::with_config(ErasureConfig::new(min_shards, total_shards)?)
    }

    pub fn with_config(config: ErasureConfig) -> Result<Self> {
        let encoder = if config.parity_shards() > 0 {
            Some(ReedSolomon::new(config.min_shards, config.parity_shards())?)
        } else {
            None
        };
        Ok(Self { config, encoder })
    }

    pub fn config(&self) -> &ErasureConfig {
        &self.config
    }

    /// Encode a slab plaintext into `total_shards` shards of equal size
    pub fn encode(&self, data: &[u8]) -> Result<Vec<ShardData>> {
        let m = self.config.min_shards;
        let shard_size = self.config.shard_size(data.len());
        let mut shards = vec![vec![0u8; shard_size]; self.config.total_shards];

        for (row, stripe) in data.chunks(m).enumerate() {
            for (i, byte) in stripe.iter().enumerate() {
                shards[i][row] = *byte;
            }
        }

        self.finish_encode(shards)
    }

    /// Encode using parallel striping
    ///
    /// More efficient for large slabs (> 1MB)
    pub fn encode_parallel(&self, data: &[u8]) -> Result<Vec<ShardData>> {
        let m = self.config.min_shards;
        let shard_size = self.config.shard_size(data.len());
        let mut shards = vec![vec![0u8; shard_size]; self.config.total_shards];

        shards[..m]
            .par_iter_mut()
            .enumerate()
            .for_each(|(i, shard)| {
                for (row, byte) in shard.iter_mut().enumerate() {
                    if let Some(b) = data.get(row * m + i) {
                        *byte = *b;
                    }
                }
            });

        self.finish_encode(shards)
    }

    fn finish_encode(&self, mut shards: Vec<Vec<u8>>) -> Result<Vec<ShardData>> {
        if let Some(encoder) = &self.encoder {
            encoder.encode(&mut shards)?;
        }

        let m = self.config.min_shards;
        Ok(shards
            .into_iter()
            .enumerate()
            .map(|(i, data)| ShardData::new(i as u8, Bytes::from(data), i >= m))
            .collect())
    }

    /// Reconstruct plaintext from any `min_shards` of the shards
    ///
    /// `shards` holds one entry per shard index; missing shards are `None`.
    /// Every present shard must be exactly `shard_len` bytes. The shards may
    /// be whole shards or the same window cut from each shard; the returned
    /// plaintext is `shard_len * min_shards` bytes, padding included.
    pub fn decode(&self, shards: &[Option<Bytes>], shard_len: usize) -> Result<Bytes> {
        let m = self.config.min_shards;
        if shards.len() != self.config.total_shards {
            return Err(RenterError::ErasureCoding(format!(
                "expected {} shards, got {}",
                self.config.total_shards,
                shards.len()
            )));
        }

        for (index, shard) in shards.iter().enumerate() {
            if let Some(shard) = shard {
                if shard.len() != shard_len {
                    return Err(RenterError::CorruptShard {
                        index,
                        expected: shard_len,
                        actual: shard.len(),
                    });
                }
            }
        }

        let available = shards.iter().filter(|s| s.is_some()).count();
        if available < m {
            return Err(RenterError::InsufficientShards {
                available,
                required: m,
            });
        }
        if shard_len == 0 {
            return Ok(Bytes::new());
        }

        let mut shard_vecs: Vec<Option<Vec<u8>>> = shards
            .iter()
            .map(|s| s.as_ref().map(|b| b.to_vec()))
            .collect();

        if let Some(encoder) = &self.encoder {
            encoder.reconstruct_data(&mut shard_vecs)?;
        }

        let mut result = vec![0u8; shard_len * m];
        for (i, shard) in shard_vecs.iter().take(m).enumerate() {
            let shard = shard.as_ref().ok_or_else(|| {
                RenterError::ErasureCoding(format!("shard {} was not reconstructed", i))
            })?;
            for (row, byte) in shard.iter().enumerate() {
                result[row * m + i] = *byte;
            }
        }

        Ok(Bytes::from(result))
    }

    /// Verify that parity shards are consistent with data shards
    pub fn verify(&self, shards: &[ShardData]) -> Result<bool> {
        if shards.len() != self.config.total_shards {
            return Ok(false);
        }

        let expected_size = shards.first().map(|s| s.size()).unwrap_or(0);
        if !shards.iter().all(|s| s.size() == expected_size) {
            return Ok(false);
        }

        match &self.encoder {
            Some(encoder) => {
                let shard_refs: Vec<&[u8]> = shards.iter().map(|s| s.data.as_ref()).collect();
                Ok(encoder.verify(&shard_refs)?)
            }
            None => Ok(true),
        }
    }
}

/// Shard-local window `[start, end)` covering plaintext bytes
/// `[offset, offset + length)` of a slab with `min_shards` data shards
pub fn shard_window(offset: u64, length: u64, min_shards: usize) -> (u64, u64) {
    let m = min_shards as u64;
    if length == 0 {
        return (offset / m, offset / m);
    }
    (offset / m, (offset + length - 1) / m + 1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn present(shards: Vec<ShardData>) -> Vec<Option<Bytes>> {
        shards.into_iter().map(|s| Some(s.data)).collect()
    }

    #[test]
    fn test_erasure_config() {
        let config = ErasureConfig::default();
        assert_eq!(config.min_shards, 10);
        assert_eq!(config.total_shards, 30);
        assert_eq!(config.parity_shards(), 20);
        assert_eq!(config.max_failures(), 20);
        assert!((config.overhead_ratio() - 3.0).abs() < 0.001);
    }

    #[test]
    fn test_invalid_config() {
        assert!(matches!(
            ErasureConfig::new(0, 3),
            Err(RenterError::InvalidRedundancy { .. })
        ));
        assert!(ErasureConfig::new(4, 3).is_err());
        assert!(ErasureConfig::new(10, 256).is_err());
        assert!(ErasureConfig::new(3, 3).is_ok());
    }

    #[test]
    fn test_shard_size() {
        let config = ErasureConfig::new(2, 3).unwrap();
        assert_eq!(config.shard_size(20), 10);
        assert_eq!(config.shard_size(21), 11);
        assert_eq!(config.shard_size(0), 1);
    }

    #[test]
    fn test_encode_decode_simple() {
        let coder = ErasureCoder::new(2, 3).unwrap();
        let original = b"Hello, renter! 20 b.";

        let shards = coder.encode(original).unwrap();
        assert_eq!(shards.len(), 3);
        assert!(shards.iter().all(|s| s.size() == 10));
        assert!(shards[2].is_parity);

        let decoded = coder.decode(&present(shards), 10).unwrap();
        assert_eq!(decoded.as_ref(), original);
    }

    #[test]
    fn test_striped_layout() {
        let coder = ErasureCoder::new(3, 4).unwrap();
        let shards = coder.encode(b"abcdefg").unwrap();
        assert_eq!(shards[0].data.as_ref(), b"adg");
        assert_eq!(shards[1].data.as_ref(), b"be\0");
        assert_eq!(shards[2].data.as_ref(), b"cf\0");
    }

    #[test]
    fn test_decode_with_missing_shards() {
        let coder = ErasureCoder::new(4, 7).unwrap();
        let original: Vec<u8> = (0..100_000).map(|i| (i % 251) as u8).collect();
        let shards = coder.encode(&original).unwrap();
        let shard_len = shards[0].size();

        let mut opts = present(shards);
        opts[0] = None;
        opts[2] = None;
        opts[5] = None;

        let decoded = coder.decode(&opts, shard_len).unwrap();
        assert_eq!(&decoded[..original.len()], original.as_slice());
    }

    #[test]
    fn test_too_many_missing_shards() {
        let coder = ErasureCoder::new(2, 3).unwrap();
        let shards = coder.encode(b"test data").unwrap();
        let shard_len = shards[0].size();

        let mut opts = present(shards);
        opts[0] = None;
        opts[1] = None;

        let result = coder.decode(&opts, shard_len);
        assert!(matches!(
            result,
            Err(RenterError::InsufficientShards {
                available: 1,
                required: 2
            })
        ));
    }

    #[test]
    fn test_corrupt_shard_length() {
        let coder = ErasureCoder::new(2, 3).unwrap();
        let shards = coder.encode(b"0123456789").unwrap();
        let mut opts = present(shards);
        opts[1] = Some(Bytes::from_static(b"short"));

        assert!(coder.decode(&opts, 5).is_ok());

        let result = coder.decode(&opts, 4);
        assert!(matches!(result, Err(RenterError::CorruptShard { index: 0, .. })));
    }

    #[test]
    fn test_no_parity() {
        let coder = ErasureCoder::new(3, 3).unwrap();
        let original = b"no parity at all";
        let shards = coder.encode(original).unwrap();
        let shard_len = shards[0].size();
        assert!(shards.iter().all(|s| !s.is_parity));
        assert!(coder.verify(&shards).unwrap());

        let decoded = coder.decode(&present(shards.clone()), shard_len).unwrap();
        assert_eq!(&decoded[..original.len()], original);

        let mut opts = present(shards);
        opts[1] = None;
        assert!(matches!(
            coder.decode(&opts, shard_len),
            Err(RenterError::InsufficientShards { .. })
        ));
    }

    #[test]
    fn test_window_decode() {
        let coder = ErasureCoder::new(3, 5).unwrap();
        let original: Vec<u8> = (0..90u8).collect();
        let shards = coder.encode(&original).unwrap();

        // plaintext [31, 47) lives in shard window [10, 16)
        let (start, end) = shard_window(31, 16, 3);
        assert_eq!((start, end), (10, 16));

        let mut windows: Vec<Option<Bytes>> = shards
            .iter()
            .map(|s| Some(s.data.slice(start as usize..end as usize)))
            .collect();
        windows[0] = None;
        windows[3] = None;

        let decoded = coder.decode(&windows, (end - start) as usize).unwrap();
        let base = (start * 3) as usize;
        assert_eq!(&decoded[31 - base..47 - base], &original[31..47]);
    }

    #[test]
    fn test_encode_parallel() {
        let coder = ErasureCoder::new(10, 14).unwrap();
        let original: Vec<u8> = (0..3 * 1024 * 1024).map(|i| (i % 256) as u8).collect();

        let seq = coder.encode(&original).unwrap();
        let par = coder.encode_parallel(&original).unwrap();

        assert_eq!(seq.len(), par.len());
        for (s1, s2) in seq.iter().zip(par.iter()) {
            assert_eq!(s1.data, s2.data);
            assert_eq!(s1.index, s2.index);
            assert_eq!(s1.is_parity, s2.is_parity);
        }
    }

    #[test]
    fn test_verify_shards() {
        let coder = ErasureCoder::new(3, 5).unwrap();
        let shards = coder.encode(b"verify test").unwrap();
        assert!(coder.verify(&shards).unwrap());

        let mut corrupted = shards.clone();
        let mut data = corrupted[0].data.to_vec();
        data[0] ^= 0xFF;
        corrupted[0].data = Bytes::from(data);
        assert!(!coder.verify(&corrupted).unwrap());
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(64))]

        #[test]
        fn prop_any_m_subset_reconstructs(
            data in proptest::collection::vec(any::<u8>(), 0..2048),
            m in 1usize..6,
            extra in 0usize..5,
            seed in any::<u64>(),
        ) {
            let n = m + extra;
            let coder = ErasureCoder::new(m, n).unwrap();
            let shards = coder.encode(&data).unwrap();
            let shard_len = shards[0].size();

            // drop n - m shards picked by the seed
            let mut opts = present(shards);
            let mut dropped = 0;
            let mut i = (seed % n as u64) as usize;
            while dropped < n - m {
                if opts[i].is_some() {
                    opts[i] = None;
                    dropped += 1;
                }
                i = (i + 1) % n;
            }

            let decoded = coder.decode(&opts, shard_len).unwrap();
            prop_assert_eq!(decoded.len(), shard_len * m);
            prop_assert_eq!(&decoded[..data.len()], data.as_slice());
        }
    }
}
