use anyhow::{bail, Context, Result};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{info, warn};

use super::ChainReport;
use crate::config::MiningConfig;
use crate::network::{LocalNetwork, PeerId};
use crate::node::MinerNode;
use crate::transaction::TransactionGenerator;

/// Options for `powrace simulate`
#[derive(Debug, Clone)]
pub struct SimulateOptions {
    pub miners: usize,
    pub batch_size: usize,
    pub difficulty: u32,
    pub transactions: usize,
    pub threads: u32,
    pub seed: Option<u64>,
    pub timeout: Duration,
    pub json: bool,
}

/// Run an in-process network of miners and print every chain
pub fn run(options: SimulateOptions) -> Result<()> {
    if options.miners == 0 {
        bail!("At least one miner is required");
    }
    if options.batch_size == 0 {
        bail!("Batch size must be at least 1");
    }

    let hub = LocalNetwork::new();
    let ids: Vec<PeerId> = (0..options.miners)
        .map(|i| PeerId::new(format!("miner-{}", i)))
        .collect();
    let mining = MiningConfig {
        difficulty: options.difficulty,
        batch_size: options.batch_size,
        threads: options.threads,
        ..Default::default()
    };

    let mut nodes = Vec::new();
    let mut inboxes = Vec::new();
    for id in &ids {
        let (channel, inbox) = hub.register(id.clone(), ids.clone());
        let node = MinerNode::new(mining.clone(), Arc::new(channel));
        inboxes.push(
            node.spawn_inbound(inbox)
                .context("Failed to spawn inbox thread")?,
        );
        nodes.push(node);
    }

    info!(
        miners = options.miners,
        transactions = options.transactions,
        difficulty = options.difficulty,
        "Simulation started"
    );

    // One entry miner relays every transaction, so all pools see one order
    let mut generator = match options.seed {
        Some(seed) => TransactionGenerator::with_seed(seed),
        None => TransactionGenerator::new(),
    };
    for tx in generator.take(options.transactions) {
        nodes[0].submit_transaction(tx);
    }

    let expected = (options.transactions / options.batch_size) as u64;
    let started = Instant::now();
    let deadline = started + options.timeout;
    while Instant::now() < deadline {
        if nodes.iter().all(|n| n.last_block().index >= expected) {
            break;
        }
        thread::sleep(Duration::from_millis(20));
    }
    let elapsed = started.elapsed();

    for node in &nodes {
        node.shutdown();
    }
    for handle in inboxes {
        if handle.join().is_err() {
            warn!("Inbox thread panicked");
        }
    }

    let reports: Vec<ChainReport> = nodes
        .iter()
        .map(|n| ChainReport::new(n.id().clone(), &n.chain_snapshot()))
        .collect();

    if options.json {
        println!("{}", serde_json::to_string_pretty(&reports)?);
    } else {
        for report in &reports {
            report.print();
        }
        println!();
        for node in &nodes {
            let status = node.status();
            println!(
                "{}: height {}, mined {}, adopted {}, rejected {}, cancelled {}, {} hashes",
                status.id,
                status.chain.height,
                status.consensus.blocks_mined,
                status.consensus.blocks_adopted,
                status.consensus.announcements_rejected,
                status.consensus.searches_cancelled,
                status.mining.total_hashes
            );
        }
        println!("Elapsed: {:.2}s", elapsed.as_secs_f64());
    }

    let tips: Vec<_> = nodes.iter().map(|n| n.last_block().hash).collect();
    if tips.windows(2).any(|w| w[0] != w[1]) {
        warn!("Miners finished on different tips");
    }
    if nodes.iter().any(|n| n.last_block().index < expected) {
        warn!(expected, "Timed out before every miner reached the expected height");
    }
    Ok(())
}
