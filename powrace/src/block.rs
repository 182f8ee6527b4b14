// Copyright (c) 2024 Botho Foundation

//! Blocks, block hashes and the proof-of-work hash function.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

use crate::mempool::Batch;

/// Domain separation tag prepended to every block hash preimage
pub const POW_DOMAIN: &[u8] = b"POWRACE_BLOCK_V1";

/// Highest meaningful difficulty: every hex character of a 256-bit hash
pub const MAX_DIFFICULTY: u32 = 64;

/// Well-known hash of the genesis block.
/// ASCII: "POWRACE_GENESIS_BLOCK_V1" padded to 32 bytes
pub const GENESIS_HASH: BlockHash = BlockHash([
    0x50, 0x4F, 0x57, 0x52, 0x41, 0x43, 0x45, 0x5F, // POWRACE_
    0x47, 0x45, 0x4E, 0x45, 0x53, 0x49, 0x53, 0x5F, // GENESIS_
    0x42, 0x4C, 0x4F, 0x43, 0x4B, 0x5F, 0x56, 0x31, // BLOCK_V1
    0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, // padding
]);

/// A 256-bit block digest, rendered as lowercase hex.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub struct BlockHash(pub [u8; 32]);

impl BlockHash {
    /// Sentinel previous hash of the genesis block
    pub const ZERO: BlockHash = BlockHash([0u8; 32]);

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    pub fn from_hex(s: &str) -> Result<Self, hex::FromHexError> {
        let mut out = [0u8; 32];
        hex::decode_to_slice(s, &mut out)?;
        Ok(Self(out))
    }

    /// Number of leading `'0'` characters in the hex rendering
    pub fn leading_zero_nibbles(&self) -> u32 {
        let mut count = 0;
        for byte in self.0 {
            if byte == 0 {
                count += 2;
                continue;
            }
            if byte >> 4 == 0 {
                count += 1;
            }
            break;
        }
        count
    }

    /// Check the difficulty predicate: at least `difficulty` leading zero
    /// hex characters.
    pub fn meets_difficulty(&self, difficulty: u32) -> bool {
        self.leading_zero_nibbles() >= difficulty
    }

    /// Abbreviated form for log lines
    pub fn short(&self) -> String {
        hex::encode(&self.0[0..8])
    }
}

impl fmt::Display for BlockHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl fmt::Debug for BlockHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BlockHash({})", self.short())
    }
}

/// Hasher state primed with everything except the nonce.
///
/// The search clones the primed state for each attempt instead of
/// re-encoding the batch.
#[derive(Clone)]
pub struct PowTemplate {
    prefix: Sha256,
}

impl PowTemplate {
    pub fn new(previous_hash: &BlockHash, batch: &Batch) -> Self {
        let mut prefix = Sha256::new();
        prefix.update(POW_DOMAIN);
        prefix.update(previous_hash.0);
        prefix.update(batch.canonical_bytes());
        Self { prefix }
    }

    pub fn hash_with_nonce(&self, nonce: u64) -> BlockHash {
        let mut hasher = self.prefix.clone();
        hasher.update(nonce.to_le_bytes());
        BlockHash(hasher.finalize().into())
    }
}

/// Compute the block hash: SHA256(domain || previous_hash || batch || nonce)
pub fn compute_block_hash(previous_hash: &BlockHash, batch: &Batch, nonce: u64) -> BlockHash {
    PowTemplate::new(previous_hash, batch).hash_with_nonce(nonce)
}

/// A block in a miner's chain
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    /// Position in the chain (genesis is 0)
    pub index: u64,

    /// Hash of the preceding block
    pub previous_hash: BlockHash,

    /// Transactions committed by this block
    pub batch: Batch,

    /// PoW nonce (the mining solution)
    pub nonce: u64,

    /// `compute_block_hash(previous_hash, batch, nonce)`
    pub hash: BlockHash,
}

impl Block {
    /// The fixed first block every miner starts from
    pub fn genesis() -> Self {
        Self {
            index: 0,
            previous_hash: BlockHash::ZERO,
            batch: Batch::empty(),
            nonce: 0,
            hash: GENESIS_HASH,
        }
    }

    pub fn is_genesis(&self) -> bool {
        self.index == 0 && self.previous_hash == BlockHash::ZERO && self.hash == GENESIS_HASH
    }

    /// Build the successor of `parent` from a solved nonce.
    pub fn mined(parent: &Block, batch: Batch, nonce: u64, hash: BlockHash) -> Self {
        Self {
            index: parent.index + 1,
            previous_hash: parent.hash,
            batch,
            nonce,
            hash,
        }
    }

    /// Recompute this block's hash from its contents
    pub fn compute_hash(&self) -> BlockHash {
        compute_block_hash(&self.previous_hash, &self.batch, self.nonce)
    }

    /// Check the stored hash recomputes and meets the difficulty target
    pub fn verify_pow(&self, difficulty: u32) -> bool {
        self.compute_hash() == self.hash && self.hash.meets_difficulty(difficulty)
    }
}
