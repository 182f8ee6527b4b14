// Copyright (c) 2024 Botho Foundation

//! In-memory, append-only chain of accepted blocks.

use parking_lot::RwLock;
use std::sync::Arc;
use tracing::debug;

use super::{ChainState, LedgerError};
use crate::block::Block;

/// Ordered blocks accepted by one miner, starting at genesis.
#[derive(Debug, Clone)]
pub struct Chain {
    blocks: Vec<Block>,
}

impl Chain {
    /// Create a chain holding only the genesis block
    pub fn new() -> Self {
        Self {
            blocks: vec![Block::genesis()],
        }
    }

    /// The current tip
    pub fn last_block(&self) -> &Block {
        // The genesis block is never removed
        &self.blocks[self.blocks.len() - 1]
    }

    /// Append a block that extends the tip.
    ///
    /// Fails without modifying the chain unless the block's previous hash is
    /// the tip's hash, its index is the next one, and its stored hash
    /// recomputes from its contents.
    pub fn append(&mut self, block: Block) -> Result<(), LedgerError> {
        let tip = self.last_block();

        if block.previous_hash != tip.hash {
            debug!(
                index = block.index,
                expected = %tip.hash.short(),
                got = %block.previous_hash.short(),
                "Rejected block with stale previous hash"
            );
            return Err(LedgerError::LinkageMismatch {
                expected: tip.hash,
                got: block.previous_hash,
            });
        }

        let expected_index = tip.index + 1;
        if block.index != expected_index {
            return Err(LedgerError::IndexMismatch {
                expected: expected_index,
                got: block.index,
            });
        }

        if block.compute_hash() != block.hash {
            return Err(LedgerError::HashMismatch(block.index));
        }

        debug!(
            index = block.index,
            hash = %block.hash.short(),
            "Appended block"
        );
        self.blocks.push(block);
        Ok(())
    }

    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    pub fn get(&self, index: u64) -> Option<&Block> {
        self.blocks.get(index as usize)
    }

    /// Number of blocks, genesis included
    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    /// Always false: the genesis block is always present
    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// Index of the tip block
    pub fn height(&self) -> u64 {
        self.last_block().index
    }

    pub fn state(&self) -> ChainState {
        let tip = self.last_block();
        ChainState {
            height: tip.index,
            tip_hash: tip.hash,
        }
    }

    /// Walk the whole chain checking genesis, linkage and proof of work
    pub fn verify(&self, difficulty: u32) -> Result<(), LedgerError> {
        if !self.blocks[0].is_genesis() {
            return Err(LedgerError::MissingGenesis);
        }

        for pair in self.blocks.windows(2) {
            let (parent, block) = (&pair[0], &pair[1]);
            if block.previous_hash != parent.hash {
                return Err(LedgerError::LinkageMismatch {
                    expected: parent.hash,
                    got: block.previous_hash,
                });
            }
            if block.index != parent.index + 1 {
                return Err(LedgerError::IndexMismatch {
                    expected: parent.index + 1,
                    got: block.index,
                });
            }
            if block.compute_hash() != block.hash {
                return Err(LedgerError::HashMismatch(block.index));
            }
            if !block.hash.meets_difficulty(difficulty) {
                return Err(LedgerError::InsufficientWork {
                    index: block.index,
                    got: block.hash.leading_zero_nibbles(),
                    required: difficulty,
                });
            }
        }
        Ok(())
    }
}

impl Default for Chain {
    fn default() -> Self {
        Self::new()
    }
}

/// Shared chain type; readers take the read lock, appends the write lock
pub type SharedChain = Arc<RwLock<Chain>>;

/// Create a new shared chain holding only the genesis block
pub fn new_shared_chain() -> SharedChain {
    Arc::new(RwLock::new(Chain::new()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block::{compute_block_hash, BlockHash, GENESIS_HASH};
    use crate::mempool::Batch;
    use crate::transaction::TransactionGenerator;
    use std::sync::Barrier;
    use std::thread;

    fn mine_on(parent: &Block, seed: u64, difficulty: u32) -> Block {
        let batch = Batch::new(TransactionGenerator::with_seed(seed).take(4));
        let nonce = (0..)
            .find(|n| compute_block_hash(&parent.hash, &batch, *n).meets_difficulty(difficulty))
            .unwrap();
        let hash = compute_block_hash(&parent.hash, &batch, nonce);
        Block::mined(parent, batch, nonce, hash)
    }

    #[test]
    fn test_new_chain_holds_genesis() {
        let chain = Chain::new();
        assert_eq!(chain.len(), 1);
        assert_eq!(chain.height(), 0);
        assert_eq!(chain.last_block().hash, GENESIS_HASH);
        assert!(chain.verify(4).is_ok());
    }

    #[test]
    fn test_append_extends_tip() {
        let mut chain = Chain::new();
        let block = mine_on(chain.last_block(), 1, 1);
        chain.append(block.clone()).unwrap();

        assert_eq!(chain.len(), 2);
        assert_eq!(chain.last_block(), &block);
        assert_eq!(chain.state().tip_hash, block.hash);
        assert_eq!(chain.get(1), Some(&block));
        assert!(chain.verify(1).is_ok());
    }

    #[test]
    fn test_append_rejects_stale_previous_hash() {
        let mut chain = Chain::new();
        let genesis = chain.last_block().clone();
        let first = mine_on(&genesis, 1, 1);
        let competing = mine_on(&genesis, 2, 1);

        chain.append(first).unwrap();
        let err = chain.append(competing).unwrap_err();
        assert!(matches!(err, LedgerError::LinkageMismatch { .. }));
        assert_eq!(chain.len(), 2);
    }

    #[test]
    fn test_append_rejects_wrong_index_and_bad_hash() {
        let mut chain = Chain::new();
        let mut block = mine_on(chain.last_block(), 1, 1);

        let mut wrong_index = block.clone();
        wrong_index.index = 5;
        assert_eq!(
            chain.append(wrong_index),
            Err(LedgerError::IndexMismatch { expected: 1, got: 5 })
        );

        block.hash = BlockHash([0u8; 32]);
        assert_eq!(chain.append(block), Err(LedgerError::HashMismatch(1)));
        assert_eq!(chain.len(), 1);
    }

    #[test]
    fn test_verify_detects_insufficient_work() {
        let mut chain = Chain::new();
        let block = mine_on(chain.last_block(), 3, 1);
        let zeros = block.hash.leading_zero_nibbles();
        chain.append(block).unwrap();

        let err = chain.verify(zeros + 1).unwrap_err();
        assert!(matches!(err, LedgerError::InsufficientWork { index: 1, .. }));
    }

    #[test]
    fn test_concurrent_appends_at_same_tip_admit_one() {
        const CONTENDERS: usize = 6;

        let chain = new_shared_chain();
        let genesis = chain.read().last_block().clone();
        let candidates: Vec<Block> = (0..CONTENDERS as u64)
            .map(|seed| mine_on(&genesis, seed, 1))
            .collect();

        let barrier = Arc::new(Barrier::new(CONTENDERS));
        let handles: Vec<_> = candidates
            .into_iter()
            .map(|block| {
                let chain = chain.clone();
                let barrier = barrier.clone();
                thread::spawn(move || {
                    barrier.wait();
                    chain.write().append(block).is_ok()
                })
            })
            .collect();

        let successes = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|ok| *ok)
            .count();

        assert_eq!(successes, 1);
        assert_eq!(chain.read().len(), 2);
    }
}
