//! Renter Slab Engine
//!
//! Moves object data to and from contracted hosts:
//! - Upload: byte stream -> m-of-n erasure-coded slabs
//! - Download: byte range of a slice list -> reconstructed plaintext
//! - Delete: best-effort removal of slab sectors, batched per host
//!
//! All host I/O for one call runs on a bounded set of tasks. Dropping the
//! call future (or cancelling its token) aborts whatever is still in flight.

pub mod config;
mod delete;
mod download;
pub mod host;
pub mod slice;
mod upload;

pub use config::SlabConfig;
pub use host::{ContractIndex, Host, HostPool};
pub use slice::{slices_in_range, total_size};
pub use tokio_util::sync::CancellationToken;

use renter_core::{HostError, RenterError, Result};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio::task::JoinError;

/// Slab engine over a caller-owned host pool
pub struct SlabMover<P> {
    pool: P,
    config: SlabConfig,
}

impl<P: HostPool> SlabMover<P> {
    pub fn new(pool: P, config: SlabConfig) -> Self {
        Self { pool, config }
    }

    pub fn with_defaults(pool: P) -> Self {
        Self::new(pool, SlabConfig::default())
    }

    pub fn config(&self) -> &SlabConfig {
        &self.config
    }

    pub fn pool(&self) -> &P {
        &self.pool
    }

    /// Fresh per-call transfer permits
    fn transfer_pool(&self) -> Arc<Semaphore> {
        Arc::new(Semaphore::new(self.config.max_concurrent_transfers.max(1)))
    }

    fn slabs_in_flight(&self) -> usize {
        self.config.max_slabs_in_flight.max(1)
    }
}

/// Run `fut` unless `cancel` fires first
async fn cancellable<T>(
    cancel: &CancellationToken,
    fut: impl Future<Output = Result<T>>,
) -> Result<T> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(RenterError::Canceled),
        result = fut => result,
    }
}

/// Bound a host operation by `limit`
async fn with_timeout<T>(
    limit: Duration,
    fut: impl Future<Output = std::result::Result<T, HostError>>,
) -> std::result::Result<T, HostError> {
    tokio::time::timeout(limit, fut)
        .await
        .map_err(|_| HostError::Timeout)?
}

async fn acquire(permits: Arc<Semaphore>) -> std::result::Result<OwnedSemaphorePermit, HostError> {
    permits
        .acquire_owned()
        .await
        .map_err(|_| HostError::Unreachable("transfer pool closed".to_string()))
}

fn join_failure(err: JoinError) -> RenterError {
    RenterError::Storage(format!("transfer task failed: {}", err))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_cancellable_prefers_cancel() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let result = cancellable(&cancel, async { Ok(1) }).await;
        assert!(matches!(result, Err(RenterError::Canceled)));
    }

    #[tokio::test]
    async fn test_cancellable_passes_result() {
        let cancel = CancellationToken::new();
        assert_eq!(cancellable(&cancel, async { Ok(7) }).await.unwrap(), 7);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_is_host_error() {
        let slow = async {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok::<_, HostError>(())
        };
        let result = with_timeout(Duration::from_secs(1), slow).await;
        assert_eq!(result, Err(HostError::Timeout));
    }
}
