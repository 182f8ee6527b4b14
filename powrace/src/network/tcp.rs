// Copyright (c) 2024 Botho Foundation

//! TCP transport.
//!
//! Each envelope travels as one length-delimited frame holding its bincode
//! encoding. Outbound traffic to a peer goes through a dedicated writer task
//! that connects lazily and reconnects after a failed write; inbound
//! connections get one task each that feeds the local miner.

use bytes::Bytes;
use futures::{SinkExt, StreamExt};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::runtime::Handle;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};
use tokio::time::timeout;
use tokio_util::codec::{Framed, LengthDelimitedCodec};
use tracing::{debug, info, warn};

use super::{Envelope, NetworkError, PeerChannel, PeerEndpoint, PeerId, PeerMessage, MAX_FRAME_SIZE};
use crate::node::MinerNode;

/// How long a writer waits for a peer to accept a connection
const CONNECT_TIMEOUT: Duration = Duration::from_secs(3);

/// How often the accept loop checks the shutdown flag
const SHUTDOWN_POLL_INTERVAL: Duration = Duration::from_millis(200);

/// Pause after a failed accept before trying again
const ACCEPT_RETRY_DELAY: Duration = Duration::from_millis(50);

fn codec() -> LengthDelimitedCodec {
    let mut codec = LengthDelimitedCodec::new();
    codec.set_max_frame_length(MAX_FRAME_SIZE);
    codec
}

/// Outbound half of the TCP transport
pub struct TcpPeerChannel {
    id: PeerId,
    order: Vec<PeerId>,
    writers: HashMap<PeerId, UnboundedSender<Envelope>>,
}

impl TcpPeerChannel {
    /// Spawn one writer task per configured peer on `handle`.
    ///
    /// No connection is attempted until the first message for a peer.
    pub fn connect(local_id: PeerId, endpoints: &[PeerEndpoint], handle: &Handle) -> Self {
        let mut order = Vec::new();
        let mut writers = HashMap::new();

        for endpoint in endpoints.iter().filter(|e| e.id != local_id) {
            let (tx, rx) = unbounded_channel();
            handle.spawn(peer_writer(endpoint.clone(), rx));
            order.push(endpoint.id.clone());
            writers.insert(endpoint.id.clone(), tx);
        }

        Self {
            id: local_id,
            order,
            writers,
        }
    }
}

impl PeerChannel for TcpPeerChannel {
    fn local_id(&self) -> &PeerId {
        &self.id
    }

    fn peers(&self) -> Vec<PeerId> {
        self.order.clone()
    }

    fn send(&self, peer: &PeerId, message: PeerMessage) -> Result<(), NetworkError> {
        let writer = self
            .writers
            .get(peer)
            .ok_or_else(|| NetworkError::UnknownPeer(peer.clone()))?;
        writer
            .send(Envelope::new(self.id.clone(), message))
            .map_err(|_| NetworkError::Disconnected(peer.clone()))
    }
}

async fn peer_writer(endpoint: PeerEndpoint, mut rx: UnboundedReceiver<Envelope>) {
    let mut framed: Option<Framed<TcpStream, LengthDelimitedCodec>> = None;

    while let Some(envelope) = rx.recv().await {
        let bytes = match envelope.to_bytes() {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(peer = %endpoint.id, error = %e, "Failed to encode envelope");
                continue;
            }
        };

        if framed.is_none() {
            match timeout(CONNECT_TIMEOUT, TcpStream::connect(&endpoint.address)).await {
                Ok(Ok(stream)) => {
                    debug!(peer = %endpoint.id, address = %endpoint.address, "Connected to peer");
                    framed = Some(Framed::new(stream, codec()));
                }
                Ok(Err(e)) => {
                    warn!(peer = %endpoint.id, error = %e, "Peer unreachable, dropping message");
                    continue;
                }
                Err(_) => {
                    warn!(peer = %endpoint.id, "Connect timed out, dropping message");
                    continue;
                }
            }
        }

        if let Some(conn) = framed.as_mut() {
            if let Err(e) = conn.send(Bytes::from(bytes)).await {
                warn!(peer = %endpoint.id, error = %e, "Write failed, will reconnect");
                framed = None;
            }
        }
    }
}

/// Accept inbound connections until `shutdown` is set, handing every
/// decoded envelope to `node`.
pub async fn serve(
    listener: TcpListener,
    node: MinerNode,
    shutdown: Arc<AtomicBool>,
) -> Result<(), NetworkError> {
    info!(address = ?listener.local_addr().ok(), "Listening for peers");

    while !shutdown.load(Ordering::SeqCst) {
        let accepted = match timeout(SHUTDOWN_POLL_INTERVAL, listener.accept()).await {
            Ok(accepted) => accepted,
            Err(_) => continue,
        };
        let (stream, remote) = match accepted {
            Ok(accepted) => accepted,
            Err(e) => {
                // Typically ECONNABORTED or fd exhaustion; keep listening
                warn!(error = %e, "Failed to accept connection");
                tokio::time::sleep(ACCEPT_RETRY_DELAY).await;
                continue;
            }
        };
        let node = node.clone();

        tokio::spawn(async move {
            let mut framed = Framed::new(stream, codec());
            while let Some(frame) = framed.next().await {
                let envelope = match frame.map_err(NetworkError::from).and_then(|b| Envelope::from_bytes(&b)) {
                    Ok(envelope) => envelope,
                    Err(e) => {
                        warn!(%remote, error = %e, "Dropping connection after bad frame");
                        break;
                    }
                };
                node.handle_message(&envelope.from, envelope.message);
            }
            debug!(%remote, "Connection closed");
        });
    }

    info!("Listener stopped");
    Ok(())
}

/// Open a one-off connection, send a sequence of envelopes and close.
pub async fn send_envelope(address: &str, envelopes: Vec<Envelope>) -> Result<(), NetworkError> {
    let stream = timeout(CONNECT_TIMEOUT, TcpStream::connect(address))
        .await
        .map_err(|_| std::io::Error::new(std::io::ErrorKind::TimedOut, "connect timed out"))??;
    let mut framed = Framed::new(stream, codec());
    for envelope in envelopes {
        framed.send(Bytes::from(envelope.to_bytes()?)).await?;
    }
    SinkExt::<Bytes>::close(&mut framed).await?;
    Ok(())
}
