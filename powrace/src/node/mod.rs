mod miner;

pub use miner::{search, search_parallel, CancelToken, MiningStats, MiningWork, SearchOutcome};

use crossbeam_channel::{Receiver, RecvTimeoutError};
use parking_lot::Mutex;
use std::collections::{HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use crate::block::{Block, BlockHash};
use crate::config::MiningConfig;
use crate::consensus::{
    AnnouncementOutcome, ConsensusCoordinator, ConsensusStats, LocalWinOutcome, MiningJob,
    RoundPhase,
};
use crate::ledger::{new_shared_chain, ChainState, SharedChain};
use crate::mempool::{new_shared_pool, SharedPool};
use crate::network::{BlockAnnouncement, Envelope, PeerChannel, PeerId, PeerMessage};
use crate::transaction::Transaction;

/// How long the inbox loop blocks before rechecking shutdown
const INBOX_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Transaction hashes remembered for duplicate filtering
const SEEN_CAPACITY: usize = 65_536;

/// Point-in-time view of a miner
#[derive(Debug, Clone)]
pub struct NodeStatus {
    pub id: PeerId,
    pub chain: ChainState,
    pub phase: RoundPhase,
    pub pending_transactions: usize,
    pub queued_batches: usize,
    pub consensus: ConsensusStats,
    pub mining: MiningStats,
}

/// Bounded duplicate filter; the oldest hash is forgotten first.
struct SeenTransactions {
    hashes: HashSet<[u8; 32]>,
    order: VecDeque<[u8; 32]>,
    capacity: usize,
}

impl SeenTransactions {
    fn new(capacity: usize) -> Self {
        Self {
            hashes: HashSet::new(),
            order: VecDeque::new(),
            capacity: capacity.max(1),
        }
    }

    /// Returns false if `hash` is already remembered.
    fn insert(&mut self, hash: [u8; 32]) -> bool {
        if !self.hashes.insert(hash) {
            return false;
        }
        self.order.push_back(hash);
        while self.order.len() > self.capacity {
            if let Some(oldest) = self.order.pop_front() {
                self.hashes.remove(&oldest);
            }
        }
        true
    }
}

struct NodeInner {
    id: PeerId,
    mining: MiningConfig,
    pool: SharedPool,
    coordinator: Mutex<ConsensusCoordinator>,
    chain: SharedChain,
    peers: Arc<dyn PeerChannel>,
    peer_set: HashSet<PeerId>,
    seen: Mutex<SeenTransactions>,
    hashes: Arc<AtomicU64>,
    searches: Mutex<Vec<JoinHandle<()>>>,
    shutdown: AtomicBool,
    start_time: Instant,
}

/// One miner: pool, coordinator and chain wired to a peer channel.
///
/// Cloning is cheap and yields another handle to the same miner.
#[derive(Clone)]
pub struct MinerNode {
    inner: Arc<NodeInner>,
}

impl MinerNode {
    pub fn new(mining: MiningConfig, peers: Arc<dyn PeerChannel>) -> Self {
        let id = peers.local_id().clone();
        let chain = new_shared_chain();
        let coordinator = ConsensusCoordinator::new(id.clone(), mining.consensus(), chain.clone());
        let peer_set = peers.peers().into_iter().collect();

        info!(
            node = %id,
            difficulty = mining.difficulty,
            batch_size = mining.batch_size,
            mining = mining.enabled,
            "Miner created"
        );

        Self {
            inner: Arc::new(NodeInner {
                pool: new_shared_pool(mining.batch_size),
                id,
                mining,
                coordinator: Mutex::new(coordinator),
                chain,
                peers,
                peer_set,
                seen: Mutex::new(SeenTransactions::new(SEEN_CAPACITY)),
                hashes: Arc::new(AtomicU64::new(0)),
                searches: Mutex::new(Vec::new()),
                shutdown: AtomicBool::new(false),
                start_time: Instant::now(),
            }),
        }
    }

    pub fn id(&self) -> &PeerId {
        &self.inner.id
    }

    /// Accept a transaction from a client, relaying it to every peer first.
    ///
    /// Returns false for a transaction this miner has already seen.
    pub fn submit_transaction(&self, tx: Transaction) -> bool {
        if !self.mark_seen(&tx) {
            debug!(node = %self.inner.id, tx = tx.id, "Ignoring duplicate transaction");
            return false;
        }
        self.inner
            .peers
            .broadcast(PeerMessage::TransactionSubmit(tx.clone()));
        self.accept_transaction(tx);
        true
    }

    /// Verify and adopt a peer's solved block.
    pub fn receive_announcement(&self, announcement: BlockAnnouncement) -> AnnouncementOutcome {
        let (outcome, next) = {
            let mut coordinator = self.inner.coordinator.lock();
            let outcome = coordinator.on_peer_announcement(announcement);
            let next = match outcome {
                AnnouncementOutcome::Accepted(_) => coordinator.next_job(),
                _ => None,
            };
            (outcome, next)
        };

        if let Some(job) = next {
            self.launch(job);
        }
        outcome
    }

    /// Dispatch a message from the transport.
    ///
    /// Transactions from configured peers were already relayed by the miner
    /// that received them; anything else is treated as a client submission.
    pub fn handle_message(&self, from: &PeerId, message: PeerMessage) {
        match message {
            PeerMessage::TransactionSubmit(tx) if self.inner.peer_set.contains(from) => {
                if self.mark_seen(&tx) {
                    self.accept_transaction(tx);
                }
            }
            PeerMessage::TransactionSubmit(tx) => {
                self.submit_transaction(tx);
            }
            PeerMessage::BlockAnnounce(announcement) => {
                self.receive_announcement(announcement);
            }
        }
    }

    /// Drain an in-process inbox on a dedicated thread until shutdown
    pub fn spawn_inbound(&self, inbox: Receiver<Envelope>) -> std::io::Result<JoinHandle<()>> {
        let node = self.clone();
        thread::Builder::new()
            .name(format!("inbox-{}", self.inner.id))
            .spawn(move || loop {
                if node.inner.shutdown.load(Ordering::SeqCst) {
                    break;
                }
                match inbox.recv_timeout(INBOX_POLL_INTERVAL) {
                    Ok(envelope) => node.handle_message(&envelope.from, envelope.message),
                    Err(RecvTimeoutError::Timeout) => continue,
                    Err(RecvTimeoutError::Disconnected) => break,
                }
            })
    }

    pub fn last_block(&self) -> Block {
        self.inner.chain.read().last_block().clone()
    }

    pub fn chain(&self) -> SharedChain {
        self.inner.chain.clone()
    }

    /// Copy of every block, genesis first
    pub fn chain_snapshot(&self) -> Vec<Block> {
        self.inner.chain.read().blocks().to_vec()
    }

    pub fn status(&self) -> NodeStatus {
        let pending_transactions = self.inner.pool.lock().len();
        let (phase, queued_batches, consensus) = {
            let coordinator = self.inner.coordinator.lock();
            (coordinator.phase(), coordinator.queued_len(), coordinator.stats())
        };
        NodeStatus {
            id: self.inner.id.clone(),
            chain: self.inner.chain.read().state(),
            phase,
            pending_transactions,
            queued_batches,
            consensus,
            mining: MiningStats {
                total_hashes: self.inner.hashes.load(Ordering::Relaxed),
                start_time: self.inner.start_time,
            },
        }
    }

    /// Stop launching searches, cancel the current one and wait for search
    /// threads to exit.
    pub fn shutdown(&self) {
        self.inner.shutdown.store(true, Ordering::SeqCst);

        // A finishing search may have launched its successor just before
        // the flag was set
        loop {
            self.inner.coordinator.lock().cancel_current();
            let handles = std::mem::take(&mut *self.inner.searches.lock());
            if handles.is_empty() {
                break;
            }
            for handle in handles {
                if handle.join().is_err() {
                    warn!(node = %self.inner.id, "Search thread panicked");
                }
            }
        }
        info!(node = %self.inner.id, "Miner stopped");
    }

    fn mark_seen(&self, tx: &Transaction) -> bool {
        self.inner.seen.lock().insert(tx.hash())
    }

    fn accept_transaction(&self, tx: Transaction) {
        // Pool lock is held while the batch reaches the coordinator so
        // batches enter rounds in freeze order
        let job = {
            let mut pool = self.inner.pool.lock();
            match pool.submit(tx) {
                Some(batch) => self.inner.coordinator.lock().on_batch_ready(batch),
                None => None,
            }
        };
        if let Some(job) = job {
            self.launch(job);
        }
    }

    fn launch(&self, job: MiningJob) {
        if !self.inner.mining.enabled {
            debug!(node = %self.inner.id, round = job.round, "Mining disabled, waiting for a peer block");
            return;
        }
        if self.inner.shutdown.load(Ordering::SeqCst) {
            return;
        }

        let node = self.clone();
        let threads = self.inner.mining.thread_count();
        let spawned = thread::Builder::new()
            .name(format!("miner-{}-{}", self.inner.id, job.round))
            .spawn(move || {
                match search_parallel(&job.work, &job.cancel, threads, &node.inner.hashes) {
                    SearchOutcome::Found { hash, nonce, .. } => {
                        node.complete_local_win(job.round, hash, nonce)
                    }
                    SearchOutcome::Cancelled { attempts } => {
                        debug!(node = %node.inner.id, round = job.round, attempts, "Lost round")
                    }
                    SearchOutcome::Exhausted { attempts } => warn!(
                        node = %node.inner.id,
                        round = job.round,
                        attempts,
                        "Nonce space exhausted, waiting for a peer block"
                    ),
                }
            });

        match spawned {
            Ok(handle) => {
                let mut searches = self.inner.searches.lock();
                searches.retain(|h| !h.is_finished());
                searches.push(handle);
            }
            Err(e) => warn!(node = %self.inner.id, error = %e, "Failed to spawn search thread"),
        }
    }

    fn complete_local_win(&self, round: u64, hash: BlockHash, nonce: u64) {
        let (outcome, next) = {
            let mut coordinator = self.inner.coordinator.lock();
            let outcome = coordinator.on_local_win(round, hash, nonce);
            let next = match outcome {
                LocalWinOutcome::Accepted { .. } => coordinator.next_job(),
                LocalWinOutcome::Discarded => None,
            };
            (outcome, next)
        };

        // Announce before the next round's search starts
        if let LocalWinOutcome::Accepted { announcement, .. } = outcome {
            let delivered = self
                .inner
                .peers
                .broadcast(PeerMessage::BlockAnnounce(announcement));
            debug!(node = %self.inner.id, round, delivered, "Announced block");
        }
        if let Some(job) = next {
            self.launch(job);
        }
    }
}
