// Copyright (c) 2024 Botho Foundation

//! Transactions carried by blocks.
//!
//! The consensus engine treats a transaction as an opaque payload: all it
//! needs is a canonical byte encoding that every peer reproduces exactly.

use rand::{rngs::StdRng, Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// A submitted computation result: which dataset was processed by which
/// algorithm, and the hash of the output it produced.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Transaction {
    /// Submitter-assigned sequence number
    pub id: u64,

    /// Content hash of the input dataset
    pub dataset_hash: String,

    /// Content hash of the algorithm that was run
    pub algorithm_hash: String,

    /// Hash of the produced output
    pub output_hash: String,
}

impl Transaction {
    pub fn new(
        id: u64,
        dataset_hash: impl Into<String>,
        algorithm_hash: impl Into<String>,
        output_hash: impl Into<String>,
    ) -> Self {
        Self {
            id,
            dataset_hash: dataset_hash.into(),
            algorithm_hash: algorithm_hash.into(),
            output_hash: output_hash.into(),
        }
    }

    /// Canonical byte encoding used for hashing.
    ///
    /// Layout: `id` (u64 LE), then each string as a u32 LE byte length
    /// followed by its UTF-8 bytes. Length prefixes keep field boundaries
    /// unambiguous.
    pub fn canonical_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(
            8 + 12 + self.dataset_hash.len() + self.algorithm_hash.len() + self.output_hash.len(),
        );
        out.extend_from_slice(&self.id.to_le_bytes());
        for field in [&self.dataset_hash, &self.algorithm_hash, &self.output_hash] {
            out.extend_from_slice(&(field.len() as u32).to_le_bytes());
            out.extend_from_slice(field.as_bytes());
        }
        out
    }

    /// Stable identity of this transaction
    pub fn hash(&self) -> [u8; 32] {
        Sha256::digest(self.canonical_bytes()).into()
    }
}

/// Produces synthetic transactions, standing in for the clients that run
/// algorithms over datasets and report the output hash.
pub struct TransactionGenerator {
    rng: StdRng,
    next_id: u64,
}

impl TransactionGenerator {
    /// Generator seeded from OS entropy
    pub fn new() -> Self {
        Self {
            rng: StdRng::from_entropy(),
            next_id: 0,
        }
    }

    /// Deterministic generator, for reproducible simulations
    pub fn with_seed(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            next_id: 0,
        }
    }

    /// Start numbering transactions at `id`
    pub fn starting_at(mut self, id: u64) -> Self {
        self.next_id = id;
        self
    }

    pub fn next_transaction(&mut self) -> Transaction {
        let id = self.next_id;
        self.next_id += 1;

        let dataset: u64 = self.rng.gen();
        let algorithm: u64 = self.rng.gen();
        let mut output = Sha256::new();
        output.update(dataset.to_le_bytes());
        output.update(algorithm.to_le_bytes());

        Transaction::new(
            id,
            format!("dataset-{:016x}", dataset),
            format!("algorithm-{:016x}", algorithm),
            hex::encode(output.finalize()),
        )
    }

    pub fn take(&mut self, count: usize) -> Vec<Transaction> {
        (0..count).map(|_| self.next_transaction()).collect()
    }
}

impl Default for TransactionGenerator {
    fn default() -> Self {
        Self::new()
    }
}
