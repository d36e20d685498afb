//! Delete Command
//!
//! Removes an object's sectors from its hosts, then the object itself.

use super::{Workspace, CHECK};
use anyhow::{Context, Result};
use console::style;
use renter_core::RenterError;
use renter_metadata::ObjectStore;
use renter_slab::CancellationToken;

/// Delete configuration
pub struct DeleteConfig {
    pub name: String,
    /// Forget the object even if some hosts could not delete its sectors
    pub force: bool,
}

/// Run delete command
pub async fn run(ws: &Workspace, delete: DeleteConfig, cancel: &CancellationToken) -> Result<()> {
    let object = ws.store.object(&delete.name)?;
    let slabs: Vec<_> = object.slabs.iter().map(|s| s.slab.clone()).collect();
    let contracts = ws.farm().contracts()?;

    match ws.mover.delete_slabs(&slabs, &contracts, cancel).await {
        Ok(()) => {}
        Err(RenterError::DeleteFailed(errors)) if delete.force => {
            for failure in errors.iter() {
                eprintln!(
                    "{} {} kept {} sectors: {}",
                    style("Warning:").yellow(),
                    failure.host,
                    failure.sectors,
                    failure.cause
                );
            }
        }
        Err(RenterError::DeleteFailed(errors)) => {
            for failure in errors.iter() {
                eprintln!(
                    "{} {} failed to delete {} sectors: {}",
                    style("Error:").red(),
                    failure.host,
                    failure.sectors,
                    failure.cause
                );
            }
            anyhow::bail!(
                "{} hosts failed to delete sectors of {}; retry, or use --force to drop the object anyway",
                errors.len(),
                delete.name
            );
        }
        Err(e) => return Err(e).context("Failed to delete slabs"),
    }

    ws.store.delete_object(&delete.name)?;
    ws.flush()?;
    println!("{} Deleted {}", style(CHECK).green(), delete.name);
    Ok(())
}
