//! Hosts Command
//!
//! Manages the hosts of the local farm.

use super::{format_bytes, Workspace, CHECK};
use anyhow::{bail, Result};
use console::style;
use renter_core::HostKey;

/// Form contracts with `count` new hosts
pub fn init(ws: &Workspace, count: usize) -> Result<()> {
    if count == 0 {
        bail!("--count must be at least 1");
    }
    for _ in 0..count {
        let contract = ws.farm().add_host()?;
        println!(
            "{} {} at {} (contract {})",
            style(CHECK).green(),
            contract.host_key(),
            contract.host_ip,
            contract.id()
        );
    }
    ws.flush()?;
    println!(
        "{} hosts in farm",
        style(ws.farm().contracts()?.len()).green()
    );
    Ok(())
}

/// Print every host with its contract and usage
pub fn list(ws: &Workspace) -> Result<()> {
    let records = ws.farm().records()?;
    if records.is_empty() {
        println!(
            "{} No hosts yet. Run '{}' first",
            style("Info:").cyan(),
            style("renter hosts init --count 3").green()
        );
        return Ok(());
    }

    println!(
        "{:<76} {:<16} {:>8} {:>12} {}",
        style("HOST").bold(),
        style("ADDRESS").bold(),
        style("SECTORS").bold(),
        style("USED").bold(),
        style("STATUS").bold()
    );
    for record in &records {
        let host = record.contract.host_key();
        let stats = ws.farm().stats(&host)?;
        let status = if record.online {
            style("online").green()
        } else {
            style("offline").red()
        };
        println!(
            "{:<76} {:<16} {:>8} {:>12} {}",
            host.to_string(),
            record.contract.host_ip,
            stats.sectors,
            format_bytes(stats.bytes_used),
            status
        );
    }
    Ok(())
}

/// Take a host offline or bring it back
pub fn set_online(ws: &Workspace, host: &str, online: bool) -> Result<()> {
    let key: HostKey = host.parse()?;
    if !ws.farm().set_online(&key, online)? {
        bail!("No host {} in farm", key);
    }
    ws.flush()?;
    println!(
        "{} {} is now {}",
        style(CHECK).green(),
        key,
        if online { "online" } else { "offline" }
    );
    Ok(())
}
