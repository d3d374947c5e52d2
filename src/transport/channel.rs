//! Connection identity handed to packet handlers and lifecycle listeners.
//!
//! A [`Channel`] is a cheap, cloneable handle on one live connection. Sending
//! through it encodes the packet with the connection's codec and queues the
//! bytes for the session's writer task; it never blocks the caller.

use bytes::Bytes;
use std::fmt;
use std::net::{Ipv4Addr, SocketAddr};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio_util::sync::CancellationToken;

use crate::core::packet::Packet;
use crate::error::constants::ERR_OUTBOUND_QUEUE_FULL;
use crate::error::{ProtocolError, Result};
use crate::protocol::codec::PacketEncoder;

static NEXT_CHANNEL_ID: AtomicU64 = AtomicU64::new(1);

/// Handle on one connection
#[derive(Clone)]
pub struct Channel {
    id: u64,
    peer: SocketAddr,
    outbound: mpsc::Sender<Bytes>,
    encoder: Arc<dyn PacketEncoder>,
    shutdown: CancellationToken,
}

impl Channel {
    pub fn new(
        peer: SocketAddr,
        outbound: mpsc::Sender<Bytes>,
        encoder: Arc<dyn PacketEncoder>,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            id: NEXT_CHANNEL_ID.fetch_add(1, Ordering::Relaxed),
            peer,
            outbound,
            encoder,
            shutdown,
        }
    }

    /// A channel not attached to any socket; queued bytes land in the returned receiver.
    ///
    /// Useful for driving packet handlers from a custom transport or from tests.
    pub fn detached(
        encoder: Arc<dyn PacketEncoder>,
        capacity: usize,
    ) -> (Self, mpsc::Receiver<Bytes>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let peer = SocketAddr::from((Ipv4Addr::UNSPECIFIED, 0));
        (Self::new(peer, tx, encoder, CancellationToken::new()), rx)
    }

    /// Process-unique connection id
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn peer_addr(&self) -> SocketAddr {
        self.peer
    }

    /// Encode and queue a packet without waiting.
    ///
    /// Fails with `TransportError` when the outbound queue is full and
    /// `ConnectionClosed` once the session has ended.
    pub fn send(&self, packet: &mut dyn Packet) -> Result<()> {
        if self.is_closed() {
            return Err(ProtocolError::ConnectionClosed);
        }
        let bytes = self.encoder.encode_packet(packet)?;
        self.outbound.try_send(bytes).map_err(|e| match e {
            TrySendError::Full(_) => ProtocolError::TransportError(ERR_OUTBOUND_QUEUE_FULL.to_string()),
            TrySendError::Closed(_) => ProtocolError::ConnectionClosed,
        })
    }

    /// Encode and queue a packet, waiting for queue capacity
    pub async fn send_async(&self, packet: &mut dyn Packet) -> Result<()> {
        if self.is_closed() {
            return Err(ProtocolError::ConnectionClosed);
        }
        let bytes = self.encoder.encode_packet(packet)?;
        self.outbound
            .send(bytes)
            .await
            .map_err(|_| ProtocolError::ConnectionClosed)
    }

    /// Ask the session to flush queued packets and close
    pub fn close(&self) {
        self.shutdown.cancel();
    }

    pub fn is_closed(&self) -> bool {
        self.shutdown.is_cancelled() || self.outbound.is_closed()
    }

    /// Resolves once the channel has been asked to close
    pub async fn closed(&self) {
        self.shutdown.cancelled().await;
    }
}

impl fmt::Debug for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Channel")
            .field("id", &self.id)
            .field("peer", &self.peer)
            .field("closed", &self.is_closed())
            .finish()
    }
}
