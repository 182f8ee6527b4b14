// Copyright (c) 2024 Botho Foundation

//! Proof-of-work race consensus.
//!
//! This module provides:
//! - ConsensusCoordinator: per-batch round lifecycle (Idle, Mining, resolved)
//! - verify_announcement: recomputes a peer's claimed solution from local data

mod service;
mod validation;

pub use service::{
    AnnouncementOutcome, ConsensusConfig, ConsensusCoordinator, ConsensusStats, LocalWinOutcome,
    MiningJob, RoundPhase, DEFAULT_DIFFICULTY, DEFAULT_MAX_DEFERRED,
};
pub use validation::{verify_announcement, AnnouncementError};
