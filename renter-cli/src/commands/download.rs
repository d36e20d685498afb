//! Download Command
//!
//! Reconstructs an object, or a byte range of it, and decrypts it to a file
//! or stdout.

use super::{format_bytes, Workspace, CHECK};
use anyhow::{Context, Result};
use console::style;
use renter_metadata::ObjectStore;
use renter_slab::CancellationToken;
use std::path::PathBuf;
use tokio::fs;
use tokio::io::{self, AsyncWrite, AsyncWriteExt};

/// Download configuration
pub struct DownloadConfig {
    pub name: String,
    /// Destination file; stdout when absent
    pub output: Option<PathBuf>,
    pub offset: u64,
    /// Bytes to fetch; everything after `offset` when absent
    pub length: Option<u64>,
}

/// Run download command
pub async fn run(
    ws: &Workspace,
    download: DownloadConfig,
    cancel: &CancellationToken,
) -> Result<()> {
    let object = ws.store.object(&download.name)?;
    let length = download
        .length
        .unwrap_or_else(|| object.size().saturating_sub(download.offset));

    match &download.output {
        Some(path) => {
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent).await?;
            }
            let file = fs::File::create(path)
                .await
                .with_context(|| format!("Failed to create {}", path.display()))?;
            fetch(ws, &object, download.offset, length, file, cancel).await?;
            eprintln!(
                "{} Downloaded {} ({}) to {}",
                style(CHECK).green(),
                style(&download.name).bold(),
                format_bytes(length),
                path.display()
            );
        }
        None => fetch(ws, &object, download.offset, length, io::stdout(), cancel).await?,
    }
    Ok(())
}

async fn fetch<W: AsyncWrite + Unpin + Send>(
    ws: &Workspace,
    object: &renter_core::Object,
    offset: u64,
    length: u64,
    out: W,
    cancel: &CancellationToken,
) -> Result<()> {
    let contracts = ws.farm().contracts()?;
    let mut writer = object.key.decrypt(out, offset)?;
    ws.mover
        .download_slabs(&mut writer, &object.slabs, offset, length, &contracts, cancel)
        .await
        .context("Failed to download slabs")?;
    writer.shutdown().await?;
    Ok(())
}
