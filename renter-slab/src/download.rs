use crate::host::{ContractIndex, HostPool};
use crate::slice::slices_in_range;
use crate::{acquire, cancellable, join_failure, with_timeout, SlabMover};
use bytes::Bytes;
use futures::{stream, StreamExt, TryStreamExt};
use renter_core::erasure::{shard_window, ErasureCoder};
use renter_core::{Contract, HostError, RenterError, Result, SectorRoot, Slice};
use std::pin::pin;
use std::sync::Arc;
use thiserror::Error;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

/// Why a fetched shard window was not usable
#[derive(Debug, Error)]
enum FetchError {
    #[error(transparent)]
    Host(#[from] HostError),

    #[error(transparent)]
    Corrupt(RenterError),
}

impl<P: HostPool> SlabMover<P> {
    /// Write bytes `[offset, offset + length)` of the object described by
    /// `slices` to `writer`
    ///
    /// Each slice needs any `min_shards` of its sectors. Slices are fetched
    /// concurrently but written strictly in order; if a slice cannot be
    /// recovered the call fails and earlier slices may already have been
    /// written.
    #[instrument(skip(self, writer, slices, contracts, cancel), fields(slices = slices.len()))]
    pub async fn download_slabs<W>(
        &self,
        writer: &mut W,
        slices: &[Slice],
        offset: u64,
        length: u64,
        contracts: &[Contract],
        cancel: &CancellationToken,
    ) -> Result<()>
    where
        W: AsyncWrite + Unpin + Send,
    {
        let clipped = slices_in_range(slices, offset, length)?;
        for slice in &clipped {
            slice.validate()?;
        }

        let index = ContractIndex::new(contracts);
        let transfers = self.transfer_pool();
        let (index, transfers) = (&index, &transfers);

        let download = async {
            let mut fetched = pin!(stream::iter(clipped.iter().enumerate())
                .map(move |(position, slice)| {
                    self.download_slice(position, slice, index, transfers)
                })
                .buffered(self.slabs_in_flight()));

            while let Some(data) = fetched.try_next().await? {
                writer.write_all(&data).await?;
            }
            writer.flush().await?;
            Ok::<_, RenterError>(())
        };
        cancellable(cancel, download).await?;

        info!(offset, length, "download complete");
        Ok(())
    }

    /// Recover the plaintext bytes of one slice
    async fn download_slice(
        &self,
        position: usize,
        slice: &Slice,
        index: &ContractIndex,
        transfers: &Arc<Semaphore>,
    ) -> Result<Bytes> {
        if slice.length == 0 {
            return Ok(Bytes::new());
        }

        let slab = &slice.slab;
        let m = slab.min_shards as usize;
        let n = slab.total_shards as usize;
        let (start, end) = shard_window(slice.offset as u64, slice.length as u64, m);
        let window = (end - start) as usize;
        let shard_size = slab.shard_size;

        let mut shards: Vec<Option<Bytes>> = vec![None; n];
        let mut available = 0;
        let mut candidates = slab.shards.iter().enumerate();
        let mut tasks = JoinSet::new();

        while available < m {
            // keep exactly as many fetches in flight as shards still needed
            while available + tasks.len() < m {
                let Some((i, sector)) = candidates.next() else {
                    break;
                };
                let host = match index.get(&sector.host_key) {
                    Some(contract) => self.pool.host(contract),
                    None => Err(HostError::Unreachable("no contract with host".to_string())),
                };
                let host = match host {
                    Ok(host) => host,
                    Err(e) => {
                        warn!(slice = position, shard = i, host = %sector.host_key, error = %e, "shard unavailable");
                        continue;
                    }
                };

                let root = sector.root;
                let permits = Arc::clone(transfers);
                let limit = self.config.host_timeout();
                tasks.spawn(async move {
                    let result = async {
                        let _permit = acquire(permits).await?;
                        let data = with_timeout(limit, host.download_sector(&root, 0, shard_size))
                            .await?;
                        check_shard(i, &root, &data, shard_size as usize)?;
                        Ok::<_, FetchError>(data.slice(start as usize..end as usize))
                    }
                    .await;
                    (i, result)
                });
            }

            let Some(joined) = tasks.join_next().await else {
                break;
            };
            let (i, result) = joined.map_err(join_failure)?;
            match result {
                Ok(data) => {
                    debug!(slice = position, shard = i, bytes = data.len(), "shard fetched");
                    shards[i] = Some(data);
                    available += 1;
                }
                Err(e) => {
                    warn!(slice = position, shard = i, host = %slab.shards[i].host_key, error = %e, "shard fetch failed");
                }
            }
        }

        if available < m {
            return Err(RenterError::InsufficientShards {
                available,
                required: m,
            });
        }

        let coder = ErasureCoder::new(m, n)?;
        let decoded = coder.decode(&shards, window)?;
        let skip = (slice.offset as u64 - start * m as u64) as usize;
        Ok(decoded.slice(skip..skip + slice.length as usize))
    }
}

/// Reject a shard of the wrong size, or one whose hash does not match its
/// recorded root
///
/// The whole shard is always checked, even when only a window of it is
/// decoded; a window on its own cannot be verified against the root.
fn check_shard(
    index: usize,
    root: &SectorRoot,
    data: &[u8],
    shard_size: usize,
) -> std::result::Result<(), FetchError> {
    if data.len() != shard_size {
        return Err(FetchError::Corrupt(RenterError::CorruptShard {
            index,
            expected: shard_size,
            actual: data.len(),
        }));
    }
    let actual = SectorRoot::compute(data);
    if actual != *root {
        return Err(HostError::RootMismatch {
            expected: *root,
            actual,
        }
        .into());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_shard_length() {
        let data = b"abcd";
        let root = SectorRoot::compute(data);
        assert!(check_shard(0, &root, data, 4).is_ok());
        assert!(matches!(
            check_shard(3, &root, data, 5),
            Err(FetchError::Corrupt(RenterError::CorruptShard {
                index: 3,
                expected: 5,
                actual: 4
            }))
        ));
    }

    #[test]
    fn test_check_shard_root() {
        let root = SectorRoot::compute(b"abcd");
        assert!(matches!(
            check_shard(0, &root, b"abce", 4),
            Err(FetchError::Host(HostError::RootMismatch { .. }))
        ));
    }
}
