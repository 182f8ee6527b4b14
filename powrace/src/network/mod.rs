// Copyright (c) 2024 Botho Foundation

//! Peer messaging for powrace miners.
//!
//! This module provides:
//! - PeerMessage: the two messages miners exchange
//! - PeerChannel: best-effort send/broadcast to the configured peer set
//! - LocalNetwork: in-process transport over crossbeam channels
//! - TcpPeerChannel: length-delimited bincode frames over TCP

pub mod local;
pub mod tcp;

pub use local::{LocalChannel, LocalNetwork};
pub use tcp::{send_envelope, serve, TcpPeerChannel};

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use tracing::warn;

use crate::block::BlockHash;
use crate::mempool::BatchId;
use crate::transaction::Transaction;

/// Maximum size of a single encoded envelope
pub const MAX_FRAME_SIZE: usize = 1024 * 1024;

/// Opaque identity of a miner in the peer set
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PeerId(String);

impl PeerId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PeerId({})", self.0)
    }
}

impl From<&str> for PeerId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

/// A configured peer: identity plus where to reach it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeerEndpoint {
    pub id: PeerId,
    pub address: String,
}

/// A miner's claim to have solved the round for one batch
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockAnnouncement {
    /// Miner that found the solution
    pub sender: PeerId,

    /// Index of the announced block
    pub index: u64,

    /// Tail hash the solution was mined on
    pub previous_hash: BlockHash,

    /// Identity of the batch the solution commits to
    pub batch_id: BatchId,

    /// Announced block hash
    pub hash: BlockHash,

    /// Winning nonce
    pub nonce: u64,
}

/// Messages exchanged between miners
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PeerMessage {
    /// A transaction to add to the receiver's pool
    TransactionSubmit(Transaction),

    /// A solved block for the receiver to verify and adopt
    BlockAnnounce(BlockAnnouncement),
}

impl PeerMessage {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::TransactionSubmit(_) => "transaction",
            Self::BlockAnnounce(_) => "announcement",
        }
    }
}

/// A message tagged with its sender, as carried on the wire
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    pub from: PeerId,
    pub message: PeerMessage,
}

impl Envelope {
    pub fn new(from: PeerId, message: PeerMessage) -> Self {
        Self { from, message }
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, NetworkError> {
        Ok(bincode::serialize(self)?)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, NetworkError> {
        Ok(bincode::deserialize(bytes)?)
    }
}

#[derive(Debug, Error)]
pub enum NetworkError {
    #[error("Unknown peer {0}")]
    UnknownPeer(PeerId),

    #[error("Peer {0} is disconnected")]
    Disconnected(PeerId),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Codec error: {0}")]
    Codec(#[from] bincode::Error),
}

/// Outbound messaging to a static peer set.
///
/// Delivery is best-effort: a failed send is reported to the caller but
/// never retried.
pub trait PeerChannel: Send + Sync {
    /// Identity this channel sends as
    fn local_id(&self) -> &PeerId;

    /// Every configured peer, excluding ourselves
    fn peers(&self) -> Vec<PeerId>;

    /// Send one message to one peer
    fn send(&self, peer: &PeerId, message: PeerMessage) -> Result<(), NetworkError>;

    /// Send to every peer, logging failures. Returns the number of peers
    /// the message was handed to.
    fn broadcast(&self, message: PeerMessage) -> usize {
        let mut delivered = 0;
        for peer in self.peers() {
            match self.send(&peer, message.clone()) {
                Ok(()) => delivered += 1,
                Err(e) => warn!(
                    peer = %peer,
                    kind = message.kind(),
                    error = %e,
                    "Failed to deliver message"
                ),
            }
        }
        delivered
    }
}
