use anyhow::{Context, Result};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::net::TcpListener;
use tracing::{info, warn};

use super::ChainReport;
use crate::config::Config;
use crate::network::{serve, TcpPeerChannel};
use crate::node::MinerNode;

/// How often the node logs its status
const STATUS_INTERVAL: Duration = Duration::from_secs(10);

/// Run the miner until Ctrl+C
pub fn run(config_path: &Path) -> Result<()> {
    let config = Config::load(config_path).context("No config found. Run 'powrace init' first.")?;

    println!("powrace miner '{}' starting. Press Ctrl+C to stop.", config.node.id);

    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(async { run_async(config).await })
}

async fn run_async(config: Config) -> Result<()> {
    // Set up shutdown signal
    let shutdown = Arc::new(AtomicBool::new(false));
    let shutdown_clone = shutdown.clone();
    ctrlc::set_handler(move || {
        shutdown_clone.store(true, Ordering::SeqCst);
    })?;

    let listener = TcpListener::bind(&config.node.listen_addr)
        .await
        .with_context(|| format!("Failed to bind {}", config.node.listen_addr))?;

    let channel = TcpPeerChannel::connect(
        config.node.id.clone(),
        &config.network.peers,
        &tokio::runtime::Handle::current(),
    );
    let node = MinerNode::new(config.mining.clone(), Arc::new(channel));

    let server = tokio::spawn(serve(listener, node.clone(), shutdown.clone()));

    let mut last_status = Instant::now();
    while !shutdown.load(Ordering::SeqCst) {
        tokio::time::sleep(Duration::from_millis(200)).await;

        if last_status.elapsed() >= STATUS_INTERVAL {
            let status = node.status();
            info!(
                height = status.chain.height,
                tip = %status.chain.tip_hash.short(),
                pending = status.pending_transactions,
                queued = status.queued_batches,
                mined = status.consensus.blocks_mined,
                adopted = status.consensus.blocks_adopted,
                hashrate = status.mining.hashrate(),
                "Status"
            );
            last_status = Instant::now();
        }
    }

    info!("Shutting down");
    match server.await {
        Ok(Err(e)) => warn!(error = %e, "Listener failed"),
        Err(e) => warn!(error = %e, "Listener task failed"),
        Ok(Ok(())) => {}
    }

    let miner = node.clone();
    tokio::task::spawn_blocking(move || miner.shutdown()).await?;

    ChainReport::new(node.id().clone(), &node.chain_snapshot()).print();
    Ok(())
}
