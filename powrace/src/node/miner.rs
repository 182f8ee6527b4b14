// Copyright (c) 2024 Botho Foundation

//! Proof-of-work nonce search.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Instant;
use tracing::{debug, info};

use crate::block::{BlockHash, PowTemplate};
use crate::mempool::Batch;

/// Hashes counted locally before being flushed to the shared counter
const HASH_FLUSH_INTERVAL: u64 = 1024;

/// Round-scoped cancellation signal shared by a search and its coordinator.
///
/// Each mining round gets a fresh token; a token is never reset.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Work unit for a search - immutable for the lifetime of the round
#[derive(Debug, Clone)]
pub struct MiningWork {
    pub previous_hash: BlockHash,
    pub batch: Arc<Batch>,
    pub difficulty: u32,
}

/// How a search ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchOutcome {
    /// A nonce whose hash meets the difficulty target
    Found {
        hash: BlockHash,
        nonce: u64,
        attempts: u64,
    },

    /// The round's token was cancelled before a solution was found
    Cancelled { attempts: u64 },

    /// Every nonce in the search's share of the space was tried
    Exhausted { attempts: u64 },
}

/// Mining statistics
#[derive(Debug, Clone)]
pub struct MiningStats {
    pub total_hashes: u64,
    pub start_time: Instant,
}

impl MiningStats {
    pub fn hashrate(&self) -> f64 {
        let elapsed = self.start_time.elapsed().as_secs_f64();
        if elapsed > 0.0 {
            self.total_hashes as f64 / elapsed
        } else {
            0.0
        }
    }
}

/// Search nonces `0, 1, 2, ...` until one meets the target or `cancel` is
/// signalled. The token is polled before every attempt.
pub fn search(work: &MiningWork, cancel: &CancelToken, total_hashes: &AtomicU64) -> SearchOutcome {
    search_linked(work, cancel, total_hashes, 0, 1)
}

/// Search with `threads` workers sharing one token. Worker `t` tries nonces
/// `t, t + threads, t + 2 * threads, ...`; the first to find a solution
/// cancels its siblings.
pub fn search_parallel(
    work: &MiningWork,
    cancel: &CancelToken,
    threads: usize,
    total_hashes: &AtomicU64,
) -> SearchOutcome {
    let threads = threads.max(1);
    if threads == 1 {
        return search(work, cancel, total_hashes);
    }

    // Siblings stop on either the round token or a local win
    let siblings = CancelToken::new();
    let outcomes: Vec<SearchOutcome> = thread::scope(|scope| {
        let handles: Vec<_> = (0..threads as u64)
            .map(|worker| {
                let siblings = &siblings;
                scope.spawn(move || {
                    let linked = LinkedCancel { round: cancel, siblings };
                    let outcome =
                        search_linked(work, &linked, total_hashes, worker, threads as u64);
                    if matches!(outcome, SearchOutcome::Found { .. }) {
                        siblings.cancel();
                    }
                    outcome
                })
            })
            .collect();
        handles
            .into_iter()
            .map(|h| h.join().unwrap_or(SearchOutcome::Cancelled { attempts: 0 }))
            .collect()
    });

    let attempts: u64 = outcomes.iter().map(SearchOutcome::attempts).sum();
    if cancel.is_cancelled() {
        return SearchOutcome::Cancelled { attempts };
    }
    outcomes
        .into_iter()
        .find_map(|o| match o {
            SearchOutcome::Found { hash, nonce, .. } => Some(SearchOutcome::Found {
                hash,
                nonce,
                attempts,
            }),
            _ => None,
        })
        .unwrap_or(SearchOutcome::Exhausted { attempts })
}

impl SearchOutcome {
    pub fn attempts(&self) -> u64 {
        match self {
            Self::Found { attempts, .. }
            | Self::Cancelled { attempts }
            | Self::Exhausted { attempts } => *attempts,
        }
    }
}

/// Cancelled when either the round or a sibling worker says so
struct LinkedCancel<'a> {
    round: &'a CancelToken,
    siblings: &'a CancelToken,
}

trait StopSignal {
    fn should_stop(&self) -> bool;
}

impl StopSignal for CancelToken {
    fn should_stop(&self) -> bool {
        self.is_cancelled()
    }
}

impl StopSignal for LinkedCancel<'_> {
    fn should_stop(&self) -> bool {
        self.round.is_cancelled() || self.siblings.is_cancelled()
    }
}

/// The actual mining loop
fn search_linked<S: StopSignal>(
    work: &MiningWork,
    stop: &S,
    total_hashes: &AtomicU64,
    start: u64,
    stride: u64,
) -> SearchOutcome {
    let template = PowTemplate::new(&work.previous_hash, &work.batch);
    let mut nonce = start;
    let mut attempts: u64 = 0;
    let mut local_hashes: u64 = 0;

    let outcome = loop {
        if stop.should_stop() {
            break SearchOutcome::Cancelled { attempts };
        }

        let hash = template.hash_with_nonce(nonce);
        attempts += 1;
        local_hashes += 1;

        if hash.meets_difficulty(work.difficulty) {
            info!(
                nonce,
                attempts,
                hash = %hash.short(),
                "Found block solution"
            );
            break SearchOutcome::Found {
                hash,
                nonce,
                attempts,
            };
        }

        // Periodically update global counter
        if local_hashes >= HASH_FLUSH_INTERVAL {
            total_hashes.fetch_add(local_hashes, Ordering::Relaxed);
            local_hashes = 0;
        }

        nonce = match nonce.checked_add(stride) {
            Some(next) => next,
            None => break SearchOutcome::Exhausted { attempts },
        };
    };

    // Flush remaining hashes
    if local_hashes > 0 {
        total_hashes.fetch_add(local_hashes, Ordering::Relaxed);
    }
    if let SearchOutcome::Cancelled { attempts } = outcome {
        debug!(attempts, "Search cancelled");
    }
    outcome
}
