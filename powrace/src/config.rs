use anyhow::{anyhow, bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use crate::block::MAX_DIFFICULTY;
use crate::consensus::{ConsensusConfig, DEFAULT_DIFFICULTY, DEFAULT_MAX_DEFERRED};
use crate::mempool::DEFAULT_BATCH_SIZE;
use crate::network::{PeerEndpoint, PeerId};

/// Main configuration for a powrace miner
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub node: NodeConfig,
    #[serde(default)]
    pub mining: MiningConfig,
    #[serde(default)]
    pub network: NetworkConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeConfig {
    /// This miner's identity in the peer set
    pub id: PeerId,

    /// Address the TCP listener binds to
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,
}

fn default_listen_addr() -> String {
    "127.0.0.1:7300".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MiningConfig {
    /// Leading zero hex characters required of a block hash
    #[serde(default = "default_difficulty")]
    pub difficulty: u32,

    /// Transactions per batch
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Search threads per round (0 = auto-detect)
    #[serde(default = "default_threads")]
    pub threads: u32,

    /// When false the node only verifies and adopts peer blocks
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// Early announcements held until their batch freezes
    #[serde(default = "default_max_deferred")]
    pub max_deferred: usize,
}

fn default_difficulty() -> u32 {
    DEFAULT_DIFFICULTY
}

fn default_batch_size() -> usize {
    DEFAULT_BATCH_SIZE
}

fn default_threads() -> u32 {
    1
}

fn default_enabled() -> bool {
    true
}

fn default_max_deferred() -> usize {
    DEFAULT_MAX_DEFERRED
}

impl Default for MiningConfig {
    fn default() -> Self {
        Self {
            difficulty: default_difficulty(),
            batch_size: default_batch_size(),
            threads: default_threads(),
            enabled: default_enabled(),
            max_deferred: default_max_deferred(),
        }
    }
}

impl MiningConfig {
    /// Resolved number of search threads
    pub fn thread_count(&self) -> usize {
        if self.threads == 0 {
            num_cpus::get()
        } else {
            self.threads as usize
        }
    }

    pub fn consensus(&self) -> ConsensusConfig {
        ConsensusConfig {
            difficulty: self.difficulty,
            max_deferred: self.max_deferred,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NetworkConfig {
    /// Static peer set
    #[serde(default)]
    pub peers: Vec<PeerEndpoint>,
}

impl Config {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            node: NodeConfig {
                id: PeerId::new(id),
                listen_addr: default_listen_addr(),
            },
            mining: MiningConfig::default(),
            network: NetworkConfig::default(),
        }
    }

    /// Load config from a file
    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config from {}", path.display()))?;

        let config: Config = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config from {}", path.display()))?;
        config
            .validate()
            .with_context(|| format!("Invalid config in {}", path.display()))?;
        Ok(config)
    }

    /// Save config to a file
    pub fn save(&self, path: &Path) -> Result<()> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory {}", parent.display()))?;
        }

        let contents = toml::to_string_pretty(self).context("Failed to serialize config")?;

        fs::write(path, contents)
            .with_context(|| format!("Failed to write config to {}", path.display()))
    }

    pub fn exists(path: &Path) -> bool {
        path.exists()
    }

    pub fn validate(&self) -> Result<()> {
        if self.node.id.as_str().is_empty() {
            bail!("node.id must not be empty");
        }
        if self.mining.batch_size == 0 {
            bail!("mining.batch_size must be at least 1");
        }
        if self.mining.difficulty > MAX_DIFFICULTY {
            bail!(
                "mining.difficulty {} exceeds the maximum of {}",
                self.mining.difficulty,
                MAX_DIFFICULTY
            );
        }

        let mut seen = HashSet::new();
        for peer in &self.network.peers {
            if peer.id == self.node.id {
                return Err(anyhow!("network.peers lists this node ({})", peer.id));
            }
            if !seen.insert(&peer.id) {
                return Err(anyhow!("duplicate peer {} in network.peers", peer.id));
            }
        }
        Ok(())
    }
}

/// Get the default config directory path
pub fn default_data_dir() -> Result<PathBuf> {
    dirs::home_dir()
        .map(|home| home.join(".powrace"))
        .ok_or_else(|| anyhow!("Could not determine home directory"))
}

/// Get the default config file path
pub fn default_config_path() -> Result<PathBuf> {
    Ok(default_data_dir()?.join("config.toml"))
}
