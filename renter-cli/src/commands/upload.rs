//! Upload Command
//!
//! Encrypts a local file with a fresh key and stores it as erasure-coded
//! slabs across the farm's hosts.

use super::{format_bytes, Workspace, CHECK};
use crate::config::RenterConfig;
use anyhow::{Context, Result};
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use renter_core::{EncryptionKey, Object};
use renter_metadata::ObjectStore;
use renter_slab::CancellationToken;
use std::path::PathBuf;
use std::time::Duration;
use tokio::fs;
use tracing::info;

/// Upload configuration
pub struct UploadConfig {
    pub path: PathBuf,
    /// Object name; defaults to the file name
    pub name: Option<String>,
    pub min_shards: Option<u8>,
    pub total_shards: Option<u8>,
}

/// Run upload command
pub async fn run(
    ws: &Workspace,
    config: &RenterConfig,
    upload: UploadConfig,
    cancel: &CancellationToken,
) -> Result<()> {
    let name = match upload.name {
        Some(name) => name,
        None => upload
            .path
            .file_name()
            .and_then(|n| n.to_str())
            .map(str::to_string)
            .with_context(|| format!("Cannot name object after {}", upload.path.display()))?,
    };
    let min_shards = upload.min_shards.unwrap_or(config.redundancy.min_shards);
    let total_shards = upload
        .total_shards
        .unwrap_or(config.redundancy.total_shards);

    let file = fs::File::open(&upload.path)
        .await
        .with_context(|| format!("Failed to open {}", upload.path.display()))?;
    let size = file.metadata().await?.len();

    let contracts = ws.farm().contracts()?;
    let key = EncryptionKey::generate();

    let pb = ProgressBar::new_spinner();
    pb.set_style(ProgressStyle::with_template("{spinner:.green} [{elapsed_precise}] {msg}")?);
    pb.enable_steady_tick(Duration::from_millis(100));
    pb.set_message(format!(
        "Uploading {} ({}-of-{} over {} hosts)",
        name,
        min_shards,
        total_shards,
        contracts.len()
    ));

    let result = ws
        .mover
        .upload_slabs(key.encrypt(file), min_shards, total_shards, &contracts, cancel)
        .await;
    pb.finish_and_clear();
    let slabs = result.context("Failed to upload slabs")?;

    let object = Object::from_slabs(key, slabs, size)?;
    let slab_count = object.slabs.len();
    ws.store.add_object(&name, object)?;
    ws.flush()?;
    info!(%name, size, slabs = slab_count, "object uploaded");

    println!(
        "{} Uploaded {} ({}, {} slabs, {}-of-{})",
        style(CHECK).green(),
        style(&name).bold(),
        format_bytes(size),
        slab_count,
        min_shards,
        total_shards
    );
    Ok(())
}
