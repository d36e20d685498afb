//! Renter CLI
//!
//! Stores files as encrypted, erasure-coded slabs on a local host farm.
//!
//! Usage:
//!   renter hosts init --count 3
//!   renter upload <PATH> [-m 2] [-n 3]
//!   renter download <NAME> [-o FILE] [--offset N] [--length N]
//!   renter delete <NAME>
//!   renter list [-l]

mod commands;
mod config;

use anyhow::Result;
use clap::{Parser, Subcommand};
use commands::{delete, download, hosts, list, upload, Workspace, CHECK};
use console::style;
use renter_slab::CancellationToken;
use std::path::PathBuf;
use tracing::warn;

/// Renter - erasure-coded storage over contract hosts
#[derive(Parser)]
#[command(name = "renter")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Config file (default: ~/.renter/config.toml)
    #[arg(long, global = true, env = "RENTER_CONFIG")]
    config: Option<PathBuf>,

    /// Data directory holding the host farm and object store
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage the local host farm
    Hosts {
        #[command(subcommand)]
        command: HostCommands,
    },

    /// Upload a file
    Upload {
        /// Local file to upload
        path: PathBuf,

        /// Object name (default: the file name)
        #[arg(long)]
        name: Option<String>,

        /// Shards required to recover each slab
        #[arg(short = 'm', long)]
        min_shards: Option<u8>,

        /// Shards stored per slab
        #[arg(short = 'n', long)]
        total_shards: Option<u8>,
    },

    /// Download an object, or part of one
    Download {
        /// Object name
        name: String,

        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// First byte to fetch
        #[arg(long, default_value_t = 0)]
        offset: u64,

        /// Bytes to fetch (default: to the end of the object)
        #[arg(long)]
        length: Option<u64>,
    },

    /// Delete an object and its sectors
    Delete {
        /// Object name
        name: String,

        /// Drop the object even if some hosts keep its sectors
        #[arg(short, long)]
        force: bool,
    },

    /// List stored objects
    List {
        /// Show size and slab count
        #[arg(short, long)]
        long: bool,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        command: Option<ConfigCommands>,
    },
}

#[derive(Subcommand)]
enum HostCommands {
    /// Add hosts and form contracts with them
    Init {
        /// Number of hosts to add
        #[arg(short, long, default_value_t = 3)]
        count: usize,
    },

    /// List hosts with their usage
    List,

    /// Take a host offline
    Offline {
        /// Host key (ed25519:<hex>)
        host: String,
    },

    /// Bring a host back online
    Online {
        /// Host key (ed25519:<hex>)
        host: String,
    },
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Show current configuration
    Show,
    /// Show config file path
    Path,
    /// Create default config file
    Init {
        /// Overwrite existing config file
        #[arg(short, long)]
        force: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::WARN.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let config_path = match cli.config {
        Some(path) => path,
        None => config::config_file_path()?,
    };
    let mut cfg = config::load_config(&config_path);
    cfg.apply_env()?;
    if let Some(dir) = cli.data_dir {
        cfg.data_dir = dir;
    }

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupted, canceling");
            on_interrupt.cancel();
        }
    });

    match cli.command {
        Commands::Hosts { command } => {
            let ws = Workspace::open(&cfg)?;
            match command {
                HostCommands::Init { count } => hosts::init(&ws, count)?,
                HostCommands::List => hosts::list(&ws)?,
                HostCommands::Offline { host } => hosts::set_online(&ws, &host, false)?,
                HostCommands::Online { host } => hosts::set_online(&ws, &host, true)?,
            }
        }

        Commands::Upload {
            path,
            name,
            min_shards,
            total_shards,
        } => {
            let ws = Workspace::open(&cfg)?;
            let config = upload::UploadConfig {
                path,
                name,
                min_shards,
                total_shards,
            };
            upload::run(&ws, &cfg, config, &cancel).await?;
        }

        Commands::Download {
            name,
            output,
            offset,
            length,
        } => {
            let ws = Workspace::open(&cfg)?;
            let config = download::DownloadConfig {
                name,
                output,
                offset,
                length,
            };
            download::run(&ws, config, &cancel).await?;
        }

        Commands::Delete { name, force } => {
            let ws = Workspace::open(&cfg)?;
            let config = delete::DeleteConfig { name, force };
            delete::run(&ws, config, &cancel).await?;
        }

        Commands::List { long } => {
            let ws = Workspace::open(&cfg)?;
            list::run(&ws, long)?;
        }

        Commands::Config { command } => {
            handle_config_command(command, &config_path, &cfg)?;
        }
    }

    Ok(())
}

/// Handle config subcommands
fn handle_config_command(
    command: Option<ConfigCommands>,
    path: &std::path::Path,
    cfg: &config::RenterConfig,
) -> Result<()> {
    match command {
        None | Some(ConfigCommands::Show) => {
            println!();
            println!("{}", style("Renter Configuration").bold().underlined());
            println!();
            println!("data_dir = \"{}\"", cfg.data_dir.display());
            println!();
            println!("{}", style("[redundancy]").cyan());
            println!("  min_shards = {}", cfg.redundancy.min_shards);
            println!("  total_shards = {}", cfg.redundancy.total_shards);
            println!();
            println!("{}", style("[slab]").cyan());
            println!("  slab_size = {}", cfg.slab.slab_size);
            println!(
                "  max_concurrent_transfers = {}",
                cfg.slab.max_concurrent_transfers
            );
            println!("  max_slabs_in_flight = {}", cfg.slab.max_slabs_in_flight);
            println!("  host_timeout_secs = {}", cfg.slab.host_timeout_secs);
            println!();

            println!("{} {}", style("Config file:").dim(), path.display());
            if !path.exists() {
                println!(
                    "{} Run '{}' to create it",
                    style("(not created yet)").yellow(),
                    style("renter config init").green()
                );
            }
        }

        Some(ConfigCommands::Path) => {
            println!("{}", path.display());
        }

        Some(ConfigCommands::Init { force }) => {
            if path.exists() && !force {
                println!(
                    "{} Config file already exists at {}",
                    style("!").yellow(),
                    path.display()
                );
                println!("Use --force to overwrite");
                return Ok(());
            }

            config::save_config(path, &config::RenterConfig::default())?;
            println!(
                "{} Config file created at {}",
                style(CHECK).green(),
                path.display()
            );
        }
    }

    Ok(())
}
