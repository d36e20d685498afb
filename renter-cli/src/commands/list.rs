//! List Command

use super::{format_bytes, Workspace};
use anyhow::Result;
use console::style;
use renter_metadata::ObjectStore;

/// Run list command
pub fn run(ws: &Workspace, long_format: bool) -> Result<()> {
    let names = ws.store.list_objects()?;
    if names.is_empty() {
        println!("{} No objects stored", style("Info:").cyan());
        return Ok(());
    }

    if !long_format {
        for name in &names {
            println!("{}", name);
        }
        return Ok(());
    }

    println!(
        "{:<40} {:>12} {:>8}",
        style("NAME").bold(),
        style("SIZE").bold(),
        style("SLABS").bold()
    );
    println!("{}", "-".repeat(62));

    let mut total_size = 0u64;
    for name in &names {
        let object = ws.store.object(name)?;
        total_size += object.size();
        println!(
            "{:<40} {:>12} {:>8}",
            truncate_name(name, 40),
            format_bytes(object.size()),
            object.slabs.len()
        );
    }

    println!("{}", "-".repeat(62));
    println!(
        "{} objects, {} total",
        style(names.len()).green(),
        format_bytes(total_size)
    );
    Ok(())
}

/// Truncate a name for display, keeping its end
fn truncate_name(name: &str, max_len: usize) -> String {
    let chars = name.chars().count();
    if chars <= max_len {
        name.to_string()
    } else {
        let tail: String = name.chars().skip(chars - (max_len - 3)).collect();
        format!("...{}", tail)
    }
}
