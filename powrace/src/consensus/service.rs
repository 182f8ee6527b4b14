// Copyright (c) 2024 Botho Foundation

//! Race coordinator: one mining round per frozen batch, resolved by the
//! first valid solution, local or announced by a peer.

use serde::Serialize;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

use super::validation::{verify_announcement, AnnouncementError};
use crate::block::{Block, BlockHash};
use crate::ledger::SharedChain;
use crate::mempool::{Batch, BatchId};
use crate::network::{BlockAnnouncement, PeerId};
use crate::node::{CancelToken, MiningWork};

/// Default number of leading zero hex characters required
pub const DEFAULT_DIFFICULTY: u32 = 4;

/// Default bound on announcements held for batches not yet frozen
pub const DEFAULT_MAX_DEFERRED: usize = 16;

/// Configuration for the coordinator
#[derive(Debug, Clone)]
pub struct ConsensusConfig {
    /// Leading zero hex characters a block hash must have
    pub difficulty: u32,

    /// Announcements kept while waiting for the matching batch to freeze.
    /// Zero disables deferral.
    pub max_deferred: usize,
}

impl Default for ConsensusConfig {
    fn default() -> Self {
        Self {
            difficulty: DEFAULT_DIFFICULTY,
            max_deferred: DEFAULT_MAX_DEFERRED,
        }
    }
}

impl ConsensusConfig {
    pub fn with_difficulty(difficulty: u32) -> Self {
        Self {
            difficulty,
            ..Default::default()
        }
    }
}

/// A search the caller should run outside the coordinator lock
#[derive(Debug, Clone)]
pub struct MiningJob {
    pub round: u64,
    pub index: u64,
    pub work: MiningWork,
    pub cancel: CancelToken,
}

/// Result of reporting a local solution
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LocalWinOutcome {
    /// Appended; the announcement must be broadcast to peers
    Accepted {
        block: Block,
        announcement: BlockAnnouncement,
    },

    /// The round was already resolved or superseded
    Discarded,
}

/// Result of handling a peer announcement
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AnnouncementOutcome {
    /// Verified and appended; any local search for the round was cancelled
    Accepted(Block),

    /// Held until the matching batch is frozen locally
    Deferred,

    /// Not adopted; local mining continues
    Rejected(AnnouncementError),
}

/// Observable coordinator state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoundPhase {
    Idle,
    Mining { round: u64, index: u64 },
}

/// Counters for non-fatal events
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ConsensusStats {
    pub rounds_started: u64,
    pub blocks_mined: u64,
    pub blocks_adopted: u64,
    pub announcements_rejected: u64,
    pub announcements_deferred: u64,
    pub searches_cancelled: u64,
    pub local_wins_discarded: u64,
}

#[derive(Debug)]
struct ActiveRound {
    round: u64,
    index: u64,
    previous_hash: BlockHash,
    batch: Arc<Batch>,
    batch_id: BatchId,
    cancel: CancelToken,
    started_at: Instant,
}

#[derive(Debug)]
enum RoundState {
    Idle,
    Mining(ActiveRound),
}

/// Per-miner race state machine.
///
/// All chain appends go through the coordinator, so a round's snapshot of
/// the tail stays valid until the round resolves.
pub struct ConsensusCoordinator {
    local_id: PeerId,
    config: ConsensusConfig,
    chain: SharedChain,
    state: RoundState,
    next_round: u64,
    queued: VecDeque<Batch>,
    deferred: VecDeque<BlockAnnouncement>,
    stats: ConsensusStats,
}

impl ConsensusCoordinator {
    pub fn new(local_id: PeerId, config: ConsensusConfig, chain: SharedChain) -> Self {
        Self {
            local_id,
            config,
            chain,
            state: RoundState::Idle,
            next_round: 0,
            queued: VecDeque::new(),
            deferred: VecDeque::new(),
            stats: ConsensusStats::default(),
        }
    }

    pub fn difficulty(&self) -> u32 {
        self.config.difficulty
    }

    pub fn chain(&self) -> &SharedChain {
        &self.chain
    }

    pub fn phase(&self) -> RoundPhase {
        match &self.state {
            RoundState::Idle => RoundPhase::Idle,
            RoundState::Mining(active) => RoundPhase::Mining {
                round: active.round,
                index: active.index,
            },
        }
    }

    pub fn stats(&self) -> ConsensusStats {
        self.stats
    }

    /// Batches frozen while another round was in flight
    pub fn queued_len(&self) -> usize {
        self.queued.len()
    }

    pub fn deferred_len(&self) -> usize {
        self.deferred.len()
    }

    /// Cancel the in-flight search, if any. The round itself stays open.
    pub fn cancel_current(&self) {
        if let RoundState::Mining(active) = &self.state {
            active.cancel.cancel();
        }
    }

    /// A batch was frozen by the pool. Returns a job if this starts a round.
    pub fn on_batch_ready(&mut self, batch: Batch) -> Option<MiningJob> {
        self.queued.push_back(batch);
        self.next_job()
    }

    /// Start the next round from the queue, adopting deferred announcements
    /// for queued batches along the way. Returns `None` while a round is in
    /// flight or when nothing is queued.
    pub fn next_job(&mut self) -> Option<MiningJob> {
        while matches!(self.state, RoundState::Idle) {
            let batch = self.queued.pop_front()?;
            let parent = self.chain.read().last_block().clone();
            let batch_id = batch.id();

            if self.adopt_deferred(&parent, &batch, batch_id) {
                continue;
            }

            let round = self.next_round;
            self.next_round += 1;
            let index = parent.index + 1;
            let cancel = CancelToken::new();
            let batch = Arc::new(batch);

            info!(
                round,
                index,
                batch = %batch_id,
                parent = %parent.hash.short(),
                "Started mining round"
            );

            self.state = RoundState::Mining(ActiveRound {
                round,
                index,
                previous_hash: parent.hash,
                batch: batch.clone(),
                batch_id,
                cancel: cancel.clone(),
                started_at: Instant::now(),
            });
            self.stats.rounds_started += 1;

            return Some(MiningJob {
                round,
                index,
                work: MiningWork {
                    previous_hash: parent.hash,
                    batch,
                    difficulty: self.config.difficulty,
                },
                cancel,
            });
        }
        None
    }

    /// Our search for `round` found a solution.
    pub fn on_local_win(&mut self, round: u64, hash: BlockHash, nonce: u64) -> LocalWinOutcome {
        let active = match &self.state {
            RoundState::Mining(active) if active.round == round && !active.cancel.is_cancelled() => {
                active
            }
            _ => {
                debug!(round, "Discarding solution for a resolved round");
                self.stats.local_wins_discarded += 1;
                return LocalWinOutcome::Discarded;
            }
        };

        let block = Block {
            index: active.index,
            previous_hash: active.previous_hash,
            batch: (*active.batch).clone(),
            nonce,
            hash,
        };
        let announcement = BlockAnnouncement {
            sender: self.local_id.clone(),
            index: active.index,
            previous_hash: active.previous_hash,
            batch_id: active.batch_id,
            hash,
            nonce,
        };
        let elapsed = active.started_at.elapsed();

        let appended = self.chain.write().append(block.clone());
        if let Err(e) = appended {
            // Round stays open for a peer to resolve
            warn!(round, error = %e, "Local solution rejected by chain");
            self.stats.local_wins_discarded += 1;
            return LocalWinOutcome::Discarded;
        }

        info!(
            round,
            index = block.index,
            nonce,
            hash = %hash.short(),
            elapsed_ms = elapsed.as_millis() as u64,
            "Mined block"
        );
        self.state = RoundState::Idle;
        self.stats.blocks_mined += 1;
        self.prune_deferred(block.index);

        LocalWinOutcome::Accepted {
            block,
            announcement,
        }
    }

    /// A peer claims to have solved a round.
    pub fn on_peer_announcement(&mut self, announcement: BlockAnnouncement) -> AnnouncementOutcome {
        let parent = self.chain.read().last_block().clone();

        if announcement.index <= parent.index {
            return self.reject(
                &announcement,
                AnnouncementError::StaleRound {
                    index: announcement.index,
                    tail: parent.index,
                },
            );
        }

        let in_flight = match &self.state {
            RoundState::Mining(active) if active.index == announcement.index => {
                Some(active.batch.clone())
            }
            _ => None,
        };
        let Some(batch) = in_flight else {
            return self.defer(&parent, announcement);
        };

        let block = match verify_announcement(&parent, &batch, &announcement, self.config.difficulty) {
            Ok(block) => block,
            Err(e) => return self.reject(&announcement, e),
        };
        let appended = self.chain.write().append(block.clone());
        if let Err(e) = appended {
            return self.reject(&announcement, e.into());
        }

        if let RoundState::Mining(active) = std::mem::replace(&mut self.state, RoundState::Idle) {
            active.cancel.cancel();
            self.stats.searches_cancelled += 1;
            info!(
                round = active.round,
                index = block.index,
                peer = %announcement.sender,
                hash = %block.hash.short(),
                "Adopted peer block, search cancelled"
            );
        }
        self.stats.blocks_adopted += 1;
        self.prune_deferred(block.index);
        AnnouncementOutcome::Accepted(block)
    }

    fn reject(&mut self, announcement: &BlockAnnouncement, error: AnnouncementError) -> AnnouncementOutcome {
        warn!(
            peer = %announcement.sender,
            index = announcement.index,
            hash = %announcement.hash.short(),
            error = %error,
            "Rejected block announcement"
        );
        self.stats.announcements_rejected += 1;
        AnnouncementOutcome::Rejected(error)
    }

    fn defer(&mut self, parent: &Block, announcement: BlockAnnouncement) -> AnnouncementOutcome {
        if self.config.max_deferred == 0 {
            let index = announcement.index;
            return self.reject(&announcement, AnnouncementError::NoBatchInFlight(index));
        }
        if announcement.index == parent.index + 1 && announcement.previous_hash != parent.hash {
            return self.reject(
                &announcement,
                AnnouncementError::StaleRound {
                    index: announcement.index,
                    tail: parent.index,
                },
            );
        }
        if self.deferred.contains(&announcement) {
            return AnnouncementOutcome::Deferred;
        }

        if self.deferred.len() >= self.config.max_deferred {
            if let Some(dropped) = self.deferred.pop_front() {
                debug!(index = dropped.index, peer = %dropped.sender, "Dropped oldest deferred announcement");
            }
        }
        debug!(
            peer = %announcement.sender,
            index = announcement.index,
            batch = %announcement.batch_id,
            "Deferred announcement until batch is ready"
        );
        self.deferred.push_back(announcement);
        self.stats.announcements_deferred += 1;
        AnnouncementOutcome::Deferred
    }

    /// Try the deferred announcements for `batch` on top of `parent`, in
    /// arrival order, until one verifies.
    fn adopt_deferred(&mut self, parent: &Block, batch: &Batch, batch_id: BatchId) -> bool {
        let index = parent.index + 1;
        loop {
            let pos = self
                .deferred
                .iter()
                .position(|a| a.batch_id == batch_id && a.index == index);
            let Some(announcement) = pos.and_then(|pos| self.deferred.remove(pos)) else {
                return false;
            };

            let verified = verify_announcement(parent, batch, &announcement, self.config.difficulty);
            let adopted = match verified {
                Ok(block) => {
                    let appended = self.chain.write().append(block.clone());
                    appended.map(|()| block).map_err(AnnouncementError::from)
                }
                Err(e) => Err(e),
            };

            match adopted {
                Ok(block) => {
                    info!(
                        index = block.index,
                        peer = %announcement.sender,
                        hash = %block.hash.short(),
                        "Adopted deferred peer block"
                    );
                    self.stats.blocks_adopted += 1;
                    self.prune_deferred(block.index);
                    return true;
                }
                Err(e) => {
                    self.reject(&announcement, e);
                }
            }
        }
    }

    fn prune_deferred(&mut self, tail_index: u64) {
        self.deferred.retain(|a| a.index > tail_index);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block::compute_block_hash;
    use crate::ledger::new_shared_chain;
    use crate::node::{search, SearchOutcome};
    use crate::transaction::TransactionGenerator;
    use std::sync::atomic::AtomicU64;

    const DIFFICULTY: u32 = 1;

    fn coordinator(name: &str) -> ConsensusCoordinator {
        ConsensusCoordinator::new(
            PeerId::new(name),
            ConsensusConfig::with_difficulty(DIFFICULTY),
            new_shared_chain(),
        )
    }

    fn batch(seed: u64) -> Batch {
        Batch::new(TransactionGenerator::with_seed(seed).take(4))
    }

    fn solve(job: &MiningJob) -> (BlockHash, u64) {
        match search(&job.work, &CancelToken::new(), &AtomicU64::new(0)) {
            SearchOutcome::Found { hash, nonce, .. } => (hash, nonce),
            other => panic!("unexpected outcome {:?}", other),
        }
    }

    fn announce(sender: &str, job: &MiningJob) -> BlockAnnouncement {
        let (hash, nonce) = solve(job);
        BlockAnnouncement {
            sender: PeerId::new(sender),
            index: job.index,
            previous_hash: job.work.previous_hash,
            batch_id: job.work.batch.id(),
            hash,
            nonce,
        }
    }

    #[test]
    fn test_batch_ready_starts_round_and_queues_the_next() {
        let mut c = coordinator("a");
        assert_eq!(c.phase(), RoundPhase::Idle);

        let job = c.on_batch_ready(batch(1)).expect("idle coordinator starts a round");
        assert_eq!(job.index, 1);
        assert_eq!(job.work.previous_hash, c.chain().read().last_block().hash);
        assert_eq!(c.phase(), RoundPhase::Mining { round: 0, index: 1 });

        assert!(c.on_batch_ready(batch(2)).is_none());
        assert_eq!(c.queued_len(), 1);
    }

    #[test]
    fn test_local_win_appends_and_announces() {
        let mut c = coordinator("a");
        let job = c.on_batch_ready(batch(1)).unwrap();
        let (hash, nonce) = solve(&job);

        match c.on_local_win(job.round, hash, nonce) {
            LocalWinOutcome::Accepted { block, announcement } => {
                assert_eq!(block.hash, hash);
                assert_eq!(announcement.sender, PeerId::new("a"));
                assert_eq!(announcement.batch_id, job.work.batch.id());
                assert_eq!(announcement.index, 1);
            }
            LocalWinOutcome::Discarded => panic!("fresh win discarded"),
        }
        assert_eq!(c.phase(), RoundPhase::Idle);
        assert_eq!(c.chain().read().len(), 2);
        assert_eq!(c.stats().blocks_mined, 1);
    }

    #[test]
    fn test_queued_batch_starts_after_resolution() {
        let mut c = coordinator("a");
        let first = c.on_batch_ready(batch(1)).unwrap();
        assert!(c.on_batch_ready(batch(2)).is_none());

        let (hash, nonce) = solve(&first);
        assert!(matches!(c.on_local_win(first.round, hash, nonce), LocalWinOutcome::Accepted { .. }));

        let second = c.next_job().expect("queued batch starts");
        assert_eq!(second.index, 2);
        assert_eq!(second.work.previous_hash, hash);
        assert_eq!(*second.work.batch, batch(2));
        assert!(c.next_job().is_none());
    }

    #[test]
    fn test_peer_announcement_cancels_local_search() {
        let mut a = coordinator("a");
        let mut b = coordinator("b");
        let job_a = a.on_batch_ready(batch(1)).unwrap();
        let job_b = b.on_batch_ready(batch(1)).unwrap();

        let ann = announce("a", &job_a);
        let outcome = b.on_peer_announcement(ann.clone());
        assert!(matches!(outcome, AnnouncementOutcome::Accepted(ref block) if block.hash == ann.hash));
        assert!(job_b.cancel.is_cancelled());
        assert_eq!(b.phase(), RoundPhase::Idle);
        assert_eq!(b.stats().searches_cancelled, 1);
        assert_eq!(b.chain().read().last_block().hash, ann.hash);
    }

    #[test]
    fn test_invalid_announcement_keeps_mining() {
        let mut c = coordinator("b");
        let job = c.on_batch_ready(batch(1)).unwrap();

        let mut ann = announce("a", &job);
        ann.hash = BlockHash::ZERO;
        let outcome = c.on_peer_announcement(ann);
        assert!(matches!(
            outcome,
            AnnouncementOutcome::Rejected(AnnouncementError::HashMismatch { .. })
        ));
        assert!(!job.cancel.is_cancelled());
        assert_eq!(c.phase(), RoundPhase::Mining { round: 0, index: 1 });
        assert_eq!(c.chain().read().len(), 1);
        assert_eq!(c.stats().announcements_rejected, 1);
    }

    #[test]
    fn test_late_second_announcement_is_stale() {
        let mut c = coordinator("c");
        let job = c.on_batch_ready(batch(1)).unwrap();

        let first = announce("a", &job);
        assert!(matches!(c.on_peer_announcement(first.clone()), AnnouncementOutcome::Accepted(_)));

        // Another valid solution for the same round, different nonce
        let nonce = (first.nonce + 1..)
            .find(|n| compute_block_hash(&job.work.previous_hash, &job.work.batch, *n).meets_difficulty(DIFFICULTY))
            .unwrap();
        let second = BlockAnnouncement {
            sender: PeerId::new("b"),
            hash: compute_block_hash(&job.work.previous_hash, &job.work.batch, nonce),
            nonce,
            ..first
        };

        assert_eq!(
            c.on_peer_announcement(second),
            AnnouncementOutcome::Rejected(AnnouncementError::StaleRound { index: 1, tail: 1 })
        );
        assert_eq!(c.chain().read().len(), 2);
    }

    #[test]
    fn test_local_win_after_adoption_is_discarded() {
        let mut c = coordinator("b");
        let job = c.on_batch_ready(batch(1)).unwrap();
        let ann = announce("a", &job);
        assert!(matches!(c.on_peer_announcement(ann.clone()), AnnouncementOutcome::Accepted(_)));

        let outcome = c.on_local_win(job.round, ann.hash, ann.nonce);
        assert_eq!(outcome, LocalWinOutcome::Discarded);
        assert_eq!(c.chain().read().len(), 2);
        assert_eq!(c.stats().local_wins_discarded, 1);
    }

    #[test]
    fn test_peer_announcement_after_local_win_is_stale() {
        let mut c = coordinator("a");
        let job = c.on_batch_ready(batch(1)).unwrap();
        let (hash, nonce) = solve(&job);
        assert!(matches!(c.on_local_win(job.round, hash, nonce), LocalWinOutcome::Accepted { .. }));

        // A peer's valid solution for the round we already closed
        let peer_nonce = (nonce + 1..)
            .find(|n| compute_block_hash(&job.work.previous_hash, &job.work.batch, *n).meets_difficulty(DIFFICULTY))
            .unwrap();
        let late = BlockAnnouncement {
            sender: PeerId::new("b"),
            index: 1,
            previous_hash: job.work.previous_hash,
            batch_id: job.work.batch.id(),
            hash: compute_block_hash(&job.work.previous_hash, &job.work.batch, peer_nonce),
            nonce: peer_nonce,
        };

        assert_eq!(
            c.on_peer_announcement(late),
            AnnouncementOutcome::Rejected(AnnouncementError::StaleRound { index: 1, tail: 1 })
        );
        assert_eq!(c.chain().read().last_block().hash, hash);
        assert_eq!(c.stats().announcements_rejected, 1);
    }

    #[test]
    fn test_early_announcement_adopted_when_batch_freezes() {
        let mut a = coordinator("a");
        let mut b = coordinator("b");
        let job_a = a.on_batch_ready(batch(1)).unwrap();
        let ann = announce("a", &job_a);

        assert_eq!(b.on_peer_announcement(ann.clone()), AnnouncementOutcome::Deferred);
        assert_eq!(b.deferred_len(), 1);

        // Freezing the same batch resolves the round without mining
        assert!(b.on_batch_ready(batch(1)).is_none());
        assert_eq!(b.phase(), RoundPhase::Idle);
        assert_eq!(b.chain().read().last_block().hash, ann.hash);
        assert_eq!(b.deferred_len(), 0);
        assert_eq!(b.stats().blocks_adopted, 1);
        assert_eq!(b.stats().rounds_started, 0);
    }

    #[test]
    fn test_forged_deferred_announcement_does_not_hide_valid_one() {
        let mut a = coordinator("a");
        let mut b = coordinator("b");
        let ann = announce("a", &a.on_batch_ready(batch(1)).unwrap());
        let forged = BlockAnnouncement {
            sender: PeerId::new("c"),
            nonce: ann.nonce.wrapping_add(1),
            ..ann.clone()
        };

        assert_eq!(b.on_peer_announcement(forged), AnnouncementOutcome::Deferred);
        assert_eq!(b.on_peer_announcement(ann.clone()), AnnouncementOutcome::Deferred);
        assert_eq!(b.deferred_len(), 2);

        assert!(b.on_batch_ready(batch(1)).is_none());
        assert_eq!(b.phase(), RoundPhase::Idle);
        assert_eq!(b.chain().read().last_block().hash, ann.hash);
        assert_eq!(b.deferred_len(), 0);
        assert_eq!(b.stats().announcements_rejected, 1);
        assert_eq!(b.stats().blocks_adopted, 1);
        assert_eq!(b.stats().rounds_started, 0);
    }

    #[test]
    fn test_future_announcement_waits_for_current_round() {
        let mut a = coordinator("a");
        let mut b = coordinator("b");

        // a mines two rounds ahead of b
        let a1 = a.on_batch_ready(batch(1)).unwrap();
        let (h1, n1) = solve(&a1);
        let LocalWinOutcome::Accepted { announcement: ann1, .. } = a.on_local_win(a1.round, h1, n1) else {
            panic!("first win discarded");
        };
        let a2 = a.on_batch_ready(batch(2)).unwrap();
        let ann2 = announce("a", &a2);

        let b1 = b.on_batch_ready(batch(1)).unwrap();
        assert!(b.on_batch_ready(batch(2)).is_none());

        // Second announcement overtakes the first
        assert_eq!(b.on_peer_announcement(ann2.clone()), AnnouncementOutcome::Deferred);
        assert!(matches!(b.on_peer_announcement(ann1), AnnouncementOutcome::Accepted(_)));
        assert!(b1.cancel.is_cancelled());

        assert!(b.next_job().is_none());
        assert_eq!(b.chain().read().len(), 3);
        assert_eq!(b.chain().read().last_block().hash, ann2.hash);
    }

    #[test]
    fn test_deferral_disabled_rejects_early_announcement() {
        let mut a = coordinator("a");
        let mut b = ConsensusCoordinator::new(
            PeerId::new("b"),
            ConsensusConfig {
                difficulty: DIFFICULTY,
                max_deferred: 0,
            },
            new_shared_chain(),
        );
        let ann = announce("a", &a.on_batch_ready(batch(1)).unwrap());
        assert_eq!(
            b.on_peer_announcement(ann),
            AnnouncementOutcome::Rejected(AnnouncementError::NoBatchInFlight(1))
        );
    }

    #[test]
    fn test_deferred_queue_is_bounded() {
        let mut c = ConsensusCoordinator::new(
            PeerId::new("c"),
            ConsensusConfig {
                difficulty: DIFFICULTY,
                max_deferred: 2,
            },
            new_shared_chain(),
        );
        for seed in 0..4u64 {
            let ann = BlockAnnouncement {
                sender: PeerId::new("a"),
                index: 2 + seed,
                previous_hash: BlockHash::ZERO,
                batch_id: batch(seed).id(),
                hash: BlockHash::ZERO,
                nonce: seed,
            };
            assert_eq!(c.on_peer_announcement(ann), AnnouncementOutcome::Deferred);
        }
        assert_eq!(c.deferred_len(), 2);
    }

    #[test]
    fn test_three_miners_converge_on_first_winner() {
        let mut miners: Vec<_> = ["a", "b", "c"].into_iter().map(coordinator).collect();
        let jobs: Vec<_> = miners.iter_mut().map(|m| m.on_batch_ready(batch(7)).unwrap()).collect();

        let (hash, nonce) = solve(&jobs[0]);
        let LocalWinOutcome::Accepted { announcement, .. } = miners[0].on_local_win(jobs[0].round, hash, nonce) else {
            panic!("winner discarded");
        };
        for peer in &mut miners[1..] {
            assert!(matches!(
                peer.on_peer_announcement(announcement.clone()),
                AnnouncementOutcome::Accepted(_)
            ));
        }

        for (miner, job) in miners.iter().zip(&jobs) {
            let chain = miner.chain().read();
            assert_eq!(chain.len(), 2);
            assert_eq!(chain.last_block().hash, hash);
            assert!(chain.verify(DIFFICULTY).is_ok());
            if miner.local_id != PeerId::new("a") {
                assert!(job.cancel.is_cancelled());
            }
        }
    }
}
