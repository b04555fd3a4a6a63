// Copyright @ 2023 - 2024, R3E Network
// All Rights Reserved

//! Onyx node
//!
//! Runs a dBFT bookkeeper committee inside one process: every bookkeeper has
//! its own in-memory chain, transaction pool and consensus service, and the
//! services talk through an in-process hub. The node exits once the requested
//! number of blocks is committed everywhere, printing each service's final
//! snapshot as JSON.

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Parser;
use onyx_config::NodeConfig;
use onyx_consensus::parse_bookkeepers;
use tracing::{error, info, warn};

mod devnet;
mod logging;

use devnet::Devnet;

#[derive(Debug, Parser)]
#[command(name = "onyx-node", version, about = "Runs a dBFT committee in process")]
struct Args {
    /// TOML configuration file
    #[arg(short, long, env = "ONYX_CONFIG")]
    config: Option<PathBuf>,

    /// Committee size; defaults to the configured bookkeeper count, or
    /// `min_bookkeepers` when none are listed
    #[arg(long)]
    validators: Option<usize>,

    /// Stop after this many blocks are committed by every bookkeeper
    #[arg(long, default_value_t = 3)]
    blocks: u32,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let config = match &args.config {
        Some(path) => NodeConfig::load_from_file(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => NodeConfig::default(),
    };
    logging::init(&config.logging)?;

    let configured = parse_bookkeepers(&config.consensus)?;
    let size = args.validators.unwrap_or(if configured.is_empty() {
        config.consensus.min_bookkeepers
    } else {
        configured.len()
    });
    if size < config.consensus.min_bookkeepers {
        bail!(
            "{size} validators requested, at least {} required",
            config.consensus.min_bookkeepers
        );
    }
    if !configured.is_empty() {
        // Only public keys are configured; the devnet signs with its own.
        warn!(
            configured = configured.len(),
            "configured bookkeeper keys are replaced by generated ones"
        );
    }

    let devnet = Devnet::launch(&config, size)?;
    devnet.start()?;
    tokio::select! {
        _ = devnet.wait_for_height(args.blocks) => {
            info!(height = args.blocks, "target height reached");
        }
        _ = tokio::signal::ctrl_c() => {
            warn!(height = devnet.height(), "interrupted");
        }
    }

    for height in 1..=devnet.height() {
        if !devnet.agrees_at(height) {
            error!(height, "bookkeepers committed different blocks");
        }
    }
    for snapshot in devnet.snapshots() {
        println!("{}", serde_json::to_string(&snapshot)?);
    }
    devnet.halt().await;
    Ok(())
}
