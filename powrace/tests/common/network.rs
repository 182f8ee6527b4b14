// Copyright (c) 2024 Botho Foundation
//
//! Test network infrastructure for in-process integration tests.

use std::{
    sync::Arc,
    thread,
    time::{Duration, Instant},
};

use powrace::{
    block::Block,
    config::MiningConfig,
    ledger::ChainState,
    network::{LocalNetwork, PeerId},
    node::MinerNode,
    transaction::Transaction,
};

use super::{DEFAULT_BATCH_SIZE, DEFAULT_DIFFICULTY, DEFAULT_NUM_NODES};

/// Configuration for building a test network
#[derive(Clone)]
pub struct TestNetworkConfig {
    /// Number of miners in the network
    pub num_nodes: usize,
    /// Transactions per batch
    pub batch_size: usize,
    /// Leading zero hex characters required
    pub difficulty: u32,
    /// Indices of miners that search; the rest only verify
    pub mining_nodes: Vec<usize>,
}

impl Default for TestNetworkConfig {
    fn default() -> Self {
        Self {
            num_nodes: DEFAULT_NUM_NODES,
            batch_size: DEFAULT_BATCH_SIZE,
            difficulty: DEFAULT_DIFFICULTY,
            mining_nodes: (0..DEFAULT_NUM_NODES).collect(),
        }
    }
}

impl TestNetworkConfig {
    /// Only the first miner searches, so it wins every round
    pub fn single_winner() -> Self {
        Self {
            mining_nodes: vec![0],
            ..Default::default()
        }
    }
}

/// A simulated network of miners
pub struct TestNetwork {
    pub hub: LocalNetwork,
    pub nodes: Vec<MinerNode>,
    pub ids: Vec<PeerId>,
    pub handles: Vec<thread::JoinHandle<()>>,
    pub config: TestNetworkConfig,
}

impl TestNetwork {
    pub fn build(config: TestNetworkConfig) -> Self {
        let hub = LocalNetwork::new();
        let ids: Vec<PeerId> = (0..config.num_nodes)
            .map(|i| PeerId::new(format!("miner-{}", i)))
            .collect();

        let mut nodes = Vec::new();
        let mut handles = Vec::new();
        for (i, id) in ids.iter().enumerate() {
            let (channel, inbox) = hub.register(id.clone(), ids.clone());
            let mining = MiningConfig {
                difficulty: config.difficulty,
                batch_size: config.batch_size,
                enabled: config.mining_nodes.contains(&i),
                ..Default::default()
            };
            let node = MinerNode::new(mining, Arc::new(channel));
            handles.push(node.spawn_inbound(inbox).expect("spawn inbox thread"));
            nodes.push(node);
        }

        Self {
            hub,
            nodes,
            ids,
            handles,
            config,
        }
    }

    pub fn node(&self, index: usize) -> &MinerNode {
        &self.nodes[index]
    }

    /// Submit transactions to one miner as a client would
    pub fn submit(&self, index: usize, transactions: Vec<Transaction>) {
        for tx in transactions {
            self.nodes[index].submit_transaction(tx);
        }
    }

    pub fn chain_state(&self, index: usize) -> ChainState {
        self.nodes[index].chain().read().state()
    }

    pub fn chain(&self, index: usize) -> Vec<Block> {
        self.nodes[index].chain_snapshot()
    }

    /// Wait for every miner to reach `target_height`
    pub fn wait_for_height(&self, target_height: u64, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;

        while Instant::now() < deadline {
            if (0..self.nodes.len()).all(|i| self.chain_state(i).height >= target_height) {
                return true;
            }
            thread::sleep(Duration::from_millis(20));
        }

        false
    }

    /// Assert every miner holds the same chain and that it verifies
    pub fn verify_consistency(&self) {
        let first = self.chain(0);

        for i in 0..self.nodes.len() {
            let chain = self.nodes[i].chain();
            let chain = chain.read();
            assert!(
                chain.verify(self.config.difficulty).is_ok(),
                "Node {} chain failed verification",
                i
            );
            assert_eq!(
                chain.blocks(),
                first.as_slice(),
                "Node {} chain differs from node 0",
                i
            );
        }
    }

    /// Stop all miners and join their inbox threads
    pub fn stop(&mut self) {
        for node in &self.nodes {
            node.shutdown();
        }
        for handle in self.handles.drain(..) {
            let _ = handle.join();
        }
    }
}

impl Drop for TestNetwork {
    fn drop(&mut self) {
        self.stop();
    }
}
