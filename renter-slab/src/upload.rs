use crate::host::{ContractIndex, HostPool};
use crate::{acquire, cancellable, join_failure, with_timeout, SlabMover};
use futures::{stream, StreamExt, TryStreamExt};
use renter_core::erasure::ErasureCoder;
use renter_core::{Contract, HostError, RenterError, Result, Sector, SectorRoot, ShardData, Slab};
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

/// Slabs at least this large are striped in parallel
const PARALLEL_ENCODE_THRESHOLD: usize = 1024 * 1024;

impl<P: HostPool> SlabMover<P> {
    /// Erasure-code `reader` into slabs and store every shard
    ///
    /// The stream is cut into chunks of `slab_size` bytes (rounded up to a
    /// multiple of `min_shards`); the last chunk may be shorter. Each chunk
    /// becomes a slab of `total_shards` sectors on distinct hosts. A slab is
    /// only returned once all of its sectors are stored, and the first
    /// failing shard fails the whole call. Slabs are returned in stream
    /// order.
    #[instrument(skip(self, reader, contracts, cancel), fields(hosts = contracts.len()))]
    pub async fn upload_slabs<R>(
        &self,
        reader: R,
        min_shards: u8,
        total_shards: u8,
        contracts: &[Contract],
        cancel: &CancellationToken,
    ) -> Result<Vec<Slab>>
    where
        R: AsyncRead + Unpin + Send,
    {
        let coder = ErasureCoder::new(min_shards as usize, total_shards as usize)?;
        let index = ContractIndex::new(contracts);
        if index.len() < total_shards as usize {
            return Err(RenterError::NotEnoughHosts {
                required: total_shards as usize,
                available: index.len(),
            });
        }

        let m = min_shards as usize;
        let chunk_size = (self.config.slab_size.div_ceil(m).max(1) * m) as u64;
        let chunks = stream::try_unfold(reader, move |mut reader| async move {
            let mut chunk = Vec::new();
            (&mut reader).take(chunk_size).read_to_end(&mut chunk).await?;
            if chunk.is_empty() {
                Ok::<_, RenterError>(None)
            } else {
                Ok(Some((chunk, reader)))
            }
        });

        let transfers = self.transfer_pool();
        let (coder, index, transfers) = (&coder, &index, &transfers);
        let upload = chunks
            .enumerate()
            .map(move |(k, chunk)| async move {
                self.upload_slab(k, chunk?, coder, index, transfers).await
            })
            .buffered(self.slabs_in_flight())
            .try_collect::<Vec<Slab>>();

        let slabs = cancellable(cancel, upload).await?;
        info!(
            slabs = slabs.len(),
            min_shards, total_shards, "upload complete"
        );
        Ok(slabs)
    }

    async fn upload_slab(
        &self,
        slab_index: usize,
        chunk: Vec<u8>,
        coder: &ErasureCoder,
        index: &ContractIndex,
        transfers: &Arc<Semaphore>,
    ) -> Result<Slab> {
        let config = coder.config();
        let n = config.total_shards;
        let shards = if chunk.len() >= PARALLEL_ENCODE_THRESHOLD {
            coder.encode_parallel(&chunk)?
        } else {
            coder.encode(&chunk)?
        };
        let shard_size = shards.first().map(ShardData::size).unwrap_or(0);

        let mut locations = Vec::with_capacity(n);
        let mut tasks = JoinSet::new();
        for shard in shards {
            let i = shard.index as usize;
            let contract = index
                .assign(slab_index, i, n)
                .ok_or(RenterError::NotEnoughHosts {
                    required: n,
                    available: index.len(),
                })?;
            let location = contract.location();
            let host = self
                .pool
                .host(contract)
                .map_err(|cause| RenterError::ShardUploadFailed {
                    host: location.host_key,
                    index: i,
                    cause,
                })?;
            locations.push(location);

            let permits = Arc::clone(transfers);
            let limit = self.config.host_timeout();
            tasks.spawn(async move {
                let result = async {
                    let _permit = acquire(permits).await?;
                    let expected = SectorRoot::compute(&shard.data);
                    let actual = with_timeout(limit, host.upload_sector(shard.data)).await?;
                    if actual != expected {
                        return Err(HostError::RootMismatch { expected, actual });
                    }
                    Ok::<_, HostError>(actual)
                }
                .await;
                (i, result)
            });
        }

        let mut roots = vec![None; n];
        while let Some(joined) = tasks.join_next().await {
            let (i, result) = joined.map_err(join_failure)?;
            let host = locations[i].host_key;
            match result {
                Ok(root) => {
                    debug!(slab = slab_index, shard = i, %host, "shard stored");
                    roots[i] = Some(root);
                }
                Err(cause) => {
                    warn!(slab = slab_index, shard = i, %host, error = %cause, "shard upload failed");
                    return Err(RenterError::ShardUploadFailed {
                        host,
                        index: i,
                        cause,
                    });
                }
            }
        }

        let sectors = locations
            .into_iter()
            .zip(roots)
            .map(|(location, root)| {
                root.map(|root| Sector::new(location, root))
                    .ok_or_else(|| RenterError::InvalidSlab("shard was never stored".to_string()))
            })
            .collect::<Result<Vec<_>>>()?;

        debug!(slab = slab_index, shard_size, bytes = chunk.len(), "slab stored");
        Slab::new(shard_size as u32, config.min_shards as u8, sectors)
    }
}
