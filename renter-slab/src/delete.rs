use crate::host::{ContractIndex, HostPool};
use crate::{acquire, cancellable, join_failure, with_timeout, SlabMover};
use renter_core::{
    Contract, DeleteErrors, HostDeleteError, HostError, HostKey, RenterError, Result, SectorRoot,
    Slab,
};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

impl<P: HostPool> SlabMover<P> {
    /// Remove every sector of `slabs` from its host
    ///
    /// Sectors are batched into one request per host. A failing host does
    /// not stop the others; all failures are reported together as
    /// `DeleteFailed`. Sectors a host no longer holds count as deleted.
    #[instrument(skip_all, fields(slabs = slabs.len()))]
    pub async fn delete_slabs(
        &self,
        slabs: &[Slab],
        contracts: &[Contract],
        cancel: &CancellationToken,
    ) -> Result<()> {
        let index = ContractIndex::new(contracts);
        let mut by_host: BTreeMap<HostKey, Vec<SectorRoot>> = BTreeMap::new();
        for sector in slabs.iter().flat_map(|slab| &slab.shards) {
            by_host.entry(sector.host_key).or_default().push(sector.root);
        }
        let hosts = by_host.len();

        let mut failures = Vec::new();
        let mut tasks = JoinSet::new();
        let transfers = self.transfer_pool();
        for (host_key, mut roots) in by_host {
            roots.sort_unstable();
            roots.dedup();

            let host = match index.get(&host_key) {
                Some(contract) => self.pool.host(contract),
                None => Err(HostError::Unreachable("no contract with host".to_string())),
            };
            let host = match host {
                Ok(host) => host,
                Err(cause) => {
                    warn!(host = %host_key, error = %cause, "cannot delete from host");
                    failures.push(HostDeleteError {
                        host: host_key,
                        sectors: roots.len(),
                        cause,
                    });
                    continue;
                }
            };

            let permits = Arc::clone(&transfers);
            let limit = self.config.host_timeout();
            tasks.spawn(async move {
                let result = async {
                    let _permit = acquire(permits).await?;
                    with_timeout(limit, host.delete_sectors(&roots)).await
                }
                .await;
                (host_key, roots.len(), result)
            });
        }

        let collect = async {
            while let Some(joined) = tasks.join_next().await {
                let (host, sectors, result) = joined.map_err(join_failure)?;
                match result {
                    Ok(()) => debug!(%host, sectors, "sectors deleted"),
                    Err(HostError::SectorNotFound(root)) => {
                        debug!(%host, sectors, %root, "sectors deleted, some already gone")
                    }
                    Err(cause) => {
                        warn!(%host, sectors, error = %cause, "delete failed");
                        failures.push(HostDeleteError {
                            host,
                            sectors,
                            cause,
                        });
                    }
                }
            }
            Ok::<_, RenterError>(())
        };
        cancellable(cancel, collect).await?;

        if failures.is_empty() {
            info!(hosts, "delete complete");
            return Ok(());
        }
        failures.sort_by_key(|f| f.host);
        Err(RenterError::DeleteFailed(DeleteErrors(failures)))
    }
}
