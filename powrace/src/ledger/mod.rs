mod chain;

pub use chain::{new_shared_chain, Chain, SharedChain};

use thiserror::Error;

use crate::block::BlockHash;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LedgerError {
    #[error("Block does not extend the tip: expected previous hash {expected}, got {got}")]
    LinkageMismatch { expected: BlockHash, got: BlockHash },

    #[error("Block index mismatch: expected {expected}, got {got}")]
    IndexMismatch { expected: u64, got: u64 },

    #[error("Block hash does not match its contents at index {0}")]
    HashMismatch(u64),

    #[error("Block at index {index} has {got} leading zeros, difficulty is {required}")]
    InsufficientWork { index: u64, got: u32, required: u32 },

    #[error("Chain does not start with the genesis block")]
    MissingGenesis,
}

/// Information about the current chain state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChainState {
    /// Index of the tip block
    pub height: u64,

    /// Hash of the tip block
    pub tip_hash: BlockHash,
}
