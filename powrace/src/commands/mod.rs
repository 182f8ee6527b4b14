//! CLI command implementations.
//!
//! These modules implement the user-facing CLI commands and legitimately
//! use stdout for output.

#![allow(clippy::print_stdout)]

pub mod init;
pub mod run;
pub mod simulate;
pub mod submit;

use serde::Serialize;

use crate::block::Block;
use crate::network::PeerId;

/// Peer id used for transactions sent by the `submit` client
pub const CLIENT_ID: &str = "client";

/// Flattened view of one block for reports
#[derive(Debug, Clone, Serialize)]
pub struct BlockSummary {
    pub index: u64,
    pub previous_hash: String,
    pub hash: String,
    pub nonce: u64,
    pub transactions: Vec<u64>,
}

impl From<&Block> for BlockSummary {
    fn from(block: &Block) -> Self {
        Self {
            index: block.index,
            previous_hash: block.previous_hash.to_hex(),
            hash: block.hash.to_hex(),
            nonce: block.nonce,
            transactions: block.batch.transactions().iter().map(|tx| tx.id).collect(),
        }
    }
}

/// One miner's chain, as printed or exported
#[derive(Debug, Clone, Serialize)]
pub struct ChainReport {
    pub miner: PeerId,
    pub height: u64,
    pub blocks: Vec<BlockSummary>,
}

impl ChainReport {
    pub fn new(miner: PeerId, blocks: &[Block]) -> Self {
        Self {
            miner,
            height: blocks.last().map(|b| b.index).unwrap_or_default(),
            blocks: blocks.iter().map(BlockSummary::from).collect(),
        }
    }

    pub fn print(&self) {
        println!();
        println!("=== Chain of {} (height {}) ===", self.miner, self.height);
        for block in &self.blocks {
            println!(
                "  #{:<4} {}  prev {}  nonce {:<10} txs {:?}",
                block.index,
                &block.hash[..16],
                &block.previous_hash[..16],
                block.nonce,
                block.transactions
            );
        }
    }
}
