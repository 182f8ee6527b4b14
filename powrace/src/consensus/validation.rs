// Copyright (c) 2024 Botho Foundation

//! Verification of peer block announcements.

use thiserror::Error;

use crate::block::{compute_block_hash, Block, BlockHash};
use crate::ledger::LedgerError;
use crate::mempool::Batch;
use crate::network::BlockAnnouncement;

/// Why a block announcement was not adopted
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AnnouncementError {
    #[error("Announced hash {announced} does not match recomputed {computed}")]
    HashMismatch {
        announced: BlockHash,
        computed: BlockHash,
    },

    #[error("Announced hash has {got} leading zeros, difficulty is {required}")]
    InsufficientWork { got: u32, required: u32 },

    #[error("Announcement for index {index} does not extend tail at index {tail}")]
    StaleRound { index: u64, tail: u64 },

    #[error("No batch in flight for announcement at index {0}")]
    NoBatchInFlight(u64),

    #[error(transparent)]
    Ledger(#[from] LedgerError),
}

/// Check `announcement` against the local tail and the local copy of the
/// batch, returning the block to append.
///
/// The hash is recomputed from local data; the announced batch id is only
/// used to find the batch, never trusted for verification.
pub fn verify_announcement(
    parent: &Block,
    batch: &Batch,
    announcement: &BlockAnnouncement,
    difficulty: u32,
) -> Result<Block, AnnouncementError> {
    if announcement.previous_hash != parent.hash || announcement.index != parent.index + 1 {
        return Err(AnnouncementError::StaleRound {
            index: announcement.index,
            tail: parent.index,
        });
    }

    let computed = compute_block_hash(&parent.hash, batch, announcement.nonce);
    if computed != announcement.hash {
        return Err(AnnouncementError::HashMismatch {
            announced: announcement.hash,
            computed,
        });
    }

    if !computed.meets_difficulty(difficulty) {
        return Err(AnnouncementError::InsufficientWork {
            got: computed.leading_zero_nibbles(),
            required: difficulty,
        });
    }

    Ok(Block::mined(parent, batch.clone(), announcement.nonce, computed))
}
