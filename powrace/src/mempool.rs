// Copyright (c) 2024 Botho Foundation

//! Transaction pool that freezes pending transactions into fixed-size
//! batches.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::sync::Arc;
use tracing::debug;

use crate::transaction::Transaction;

/// Default number of transactions per batch
pub const DEFAULT_BATCH_SIZE: usize = 4;

/// Identity of a batch: SHA-256 of its canonical encoding
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BatchId(pub [u8; 32]);

impl fmt::Display for BatchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

impl fmt::Debug for BatchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BatchId({})", hex::encode(&self.0[0..8]))
    }
}

/// Immutable, ordered snapshot of transactions committed by one block.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Batch {
    transactions: Vec<Transaction>,
}

impl Batch {
    pub fn new(transactions: Vec<Transaction>) -> Self {
        Self { transactions }
    }

    /// The empty batch carried by the genesis block
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn transactions(&self) -> &[Transaction] {
        &self.transactions
    }

    pub fn len(&self) -> usize {
        self.transactions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transactions.is_empty()
    }

    /// Canonical, order-preserving encoding fed to the block hasher.
    ///
    /// Layout: transaction count (u32 LE), then for each transaction its
    /// canonical bytes prefixed with their length (u32 LE).
    pub fn canonical_bytes(&self) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(&(self.transactions.len() as u32).to_le_bytes());
        for tx in &self.transactions {
            let bytes = tx.canonical_bytes();
            out.extend_from_slice(&(bytes.len() as u32).to_le_bytes());
            out.extend_from_slice(&bytes);
        }
        out
    }

    pub fn id(&self) -> BatchId {
        BatchId(Sha256::digest(self.canonical_bytes()).into())
    }
}

/// Per-miner buffer of submitted transactions.
///
/// Every `batch_size` submissions the pending transactions are frozen into a
/// [`Batch`] and the pool starts over empty.
#[derive(Debug)]
pub struct TransactionPool {
    pending: Vec<Transaction>,
    batch_size: usize,
}

impl TransactionPool {
    /// Create an empty pool. A batch size of zero is treated as one.
    pub fn new(batch_size: usize) -> Self {
        let batch_size = batch_size.max(1);
        Self {
            pending: Vec::with_capacity(batch_size),
            batch_size,
        }
    }

    /// Append a transaction, returning the frozen batch if this submission
    /// filled the pool.
    pub fn submit(&mut self, tx: Transaction) -> Option<Batch> {
        self.pending.push(tx);
        if self.pending.len() < self.batch_size {
            return None;
        }

        let batch = Batch::new(std::mem::replace(
            &mut self.pending,
            Vec::with_capacity(self.batch_size),
        ));
        debug!(
            batch = %batch.id(),
            size = batch.len(),
            "Batch ready"
        );
        Some(batch)
    }

    /// Check if a transaction is waiting in the pool
    pub fn contains(&self, tx_hash: &[u8; 32]) -> bool {
        self.pending.iter().any(|tx| &tx.hash() == tx_hash)
    }

    /// Transactions waiting for the batch to fill, in submission order
    pub fn pending(&self) -> &[Transaction] {
        &self.pending
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

impl Default for TransactionPool {
    fn default() -> Self {
        Self::new(DEFAULT_BATCH_SIZE)
    }
}

/// Thread-safe pool wrapper
pub type SharedPool = Arc<Mutex<TransactionPool>>;

/// Create a new shared pool
pub fn new_shared_pool(batch_size: usize) -> SharedPool {
    Arc::new(Mutex::new(TransactionPool::new(batch_size)))
}
