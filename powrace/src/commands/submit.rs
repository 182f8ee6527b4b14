use anyhow::{Context, Result};
use std::path::Path;
use tracing::info;

use super::CLIENT_ID;
use crate::config::Config;
use crate::network::{send_envelope, Envelope, PeerId, PeerMessage};
use crate::transaction::TransactionGenerator;

/// Options for `powrace submit`
#[derive(Debug, Clone)]
pub struct SubmitOptions {
    /// Miner address; defaults to the configured node's listen address
    pub to: Option<String>,
    pub count: usize,
    pub start_id: u64,
    pub seed: Option<u64>,
}

/// Send generated transactions to a running miner
pub fn run(config_path: &Path, options: SubmitOptions) -> Result<()> {
    let address = match options.to {
        Some(address) => address,
        None => {
            Config::load(config_path)
                .context("No --to address given and no config found")?
                .node
                .listen_addr
        }
    };

    let generator = match options.seed {
        Some(seed) => TransactionGenerator::with_seed(seed),
        None => TransactionGenerator::new(),
    };
    let transactions = generator.starting_at(options.start_id).take(options.count);

    let client = PeerId::new(CLIENT_ID);
    let envelopes: Vec<Envelope> = transactions
        .iter()
        .map(|tx| Envelope::new(client.clone(), PeerMessage::TransactionSubmit(tx.clone())))
        .collect();

    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(send_envelope(&address, envelopes))
        .with_context(|| format!("Failed to submit to {}", address))?;

    info!(count = transactions.len(), %address, "Submitted transactions");
    for tx in &transactions {
        println!(
            "tx {:>6}  {}  {}",
            tx.id,
            tx.dataset_hash,
            hex::encode(&tx.hash()[..8])
        );
    }
    Ok(())
}
