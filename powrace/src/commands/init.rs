use anyhow::{anyhow, bail, Result};
use std::path::Path;
use tracing::info;

use crate::config::Config;
use crate::network::{PeerEndpoint, PeerId};

/// Options for `powrace init`
#[derive(Debug, Clone)]
pub struct InitOptions {
    pub id: String,
    pub listen: Option<String>,
    pub peers: Vec<String>,
    pub difficulty: Option<u32>,
    pub batch_size: Option<usize>,
    pub verify_only: bool,
    pub force: bool,
}

/// Run the init command
pub fn run(config_path: &Path, options: InitOptions) -> Result<()> {
    if Config::exists(config_path) && !options.force {
        bail!(
            "Config already exists at {}\nUse a different --config path or pass --force.",
            config_path.display()
        );
    }

    let mut config = Config::new(options.id);
    if let Some(listen) = options.listen {
        config.node.listen_addr = listen;
    }
    if let Some(difficulty) = options.difficulty {
        config.mining.difficulty = difficulty;
    }
    if let Some(batch_size) = options.batch_size {
        config.mining.batch_size = batch_size;
    }
    config.mining.enabled = !options.verify_only;
    config.network.peers = options
        .peers
        .iter()
        .map(|peer| parse_peer(peer))
        .collect::<Result<_>>()?;

    config.validate()?;
    config.save(config_path)?;

    info!("Miner initialized at {}", config_path.display());
    println!("\nMiner '{}' configured.", config.node.id);
    println!("Config saved to: {}", config_path.display());
    println!("Listening on: {}", config.node.listen_addr);
    println!("Peers: {}", config.network.peers.len());
    println!("\nNext steps:");
    println!("  1. Run 'powrace run' to start the miner");
    println!("  2. Run 'powrace submit' to send it transactions");

    Ok(())
}

/// Parse `id=host:port`
pub fn parse_peer(entry: &str) -> Result<PeerEndpoint> {
    let (id, address) = entry
        .split_once('=')
        .ok_or_else(|| anyhow!("Invalid peer '{}', expected id=host:port", entry))?;
    if id.is_empty() || address.is_empty() {
        bail!("Invalid peer '{}', expected id=host:port", entry);
    }
    Ok(PeerEndpoint {
        id: PeerId::new(id),
        address: address.to_string(),
    })
}
