// Copyright (c) 2024 Botho Foundation

//! In-process transport: every miner owns a crossbeam inbox and a shared hub
//! routes envelopes between them.

use crossbeam_channel::{unbounded, Receiver, Sender};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

use super::{Envelope, NetworkError, PeerChannel, PeerId, PeerMessage};

/// Routing table shared by all in-process miners
#[derive(Debug, Clone, Default)]
pub struct LocalNetwork {
    inboxes: Arc<RwLock<HashMap<PeerId, Sender<Envelope>>>>,
}

impl LocalNetwork {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a miner and the peers it may talk to.
    ///
    /// Returns the miner's outbound channel and its inbox.
    pub fn register(&self, id: PeerId, peers: Vec<PeerId>) -> (LocalChannel, Receiver<Envelope>) {
        let (tx, rx) = unbounded();
        self.inboxes.write().insert(id.clone(), tx);
        debug!(peer = %id, "Registered local miner");

        let peers = peers.into_iter().filter(|p| *p != id).collect();
        let channel = LocalChannel {
            id,
            peers,
            hub: self.clone(),
        };
        (channel, rx)
    }

    /// Drop a miner's inbox. Later sends to it fail with `Disconnected`.
    pub fn disconnect(&self, id: &PeerId) -> bool {
        self.inboxes.write().remove(id).is_some()
    }

    pub fn is_connected(&self, id: &PeerId) -> bool {
        self.inboxes.read().contains_key(id)
    }

    fn deliver(&self, to: &PeerId, envelope: Envelope) -> Result<(), NetworkError> {
        let inboxes = self.inboxes.read();
        let inbox = inboxes
            .get(to)
            .ok_or_else(|| NetworkError::Disconnected(to.clone()))?;
        inbox
            .send(envelope)
            .map_err(|_| NetworkError::Disconnected(to.clone()))
    }
}

/// One miner's view of the in-process network
#[derive(Debug, Clone)]
pub struct LocalChannel {
    id: PeerId,
    peers: Vec<PeerId>,
    hub: LocalNetwork,
}

impl PeerChannel for LocalChannel {
    fn local_id(&self) -> &PeerId {
        &self.id
    }

    fn peers(&self) -> Vec<PeerId> {
        self.peers.clone()
    }

    fn send(&self, peer: &PeerId, message: PeerMessage) -> Result<(), NetworkError> {
        if !self.peers.contains(peer) {
            return Err(NetworkError::UnknownPeer(peer.clone()));
        }
        self.hub
            .deliver(peer, Envelope::new(self.id.clone(), message))
    }
}
