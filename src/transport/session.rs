//! Per-connection session loop.
//!
//! Wires a packet codec into a framed byte stream:
//! - a writer task drains the channel's outbound queue into the socket
//! - the read loop decodes each inbound frame and runs the packet's `handle`
//!   inline, on the task that received it
//!
//! A decode failure is terminal for that message only, unless the transport
//! config asks to close the connection. A failing `handle` is logged and never
//! closes the connection.

use bytes::Bytes;
use futures::{SinkExt, StreamExt};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::mpsc;
use tokio_util::codec::Framed;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::config::TransportConfig;
use crate::core::frame::FrameCodec;
use crate::error::Result;
use crate::protocol::codec::PacketCodec;
use crate::protocol::key::PacketKey;
use crate::transport::channel::Channel;
use crate::transport::listener::ConnectionListener;
use crate::utils::metrics::Metrics;

/// State shared by every session of one server or client
pub(crate) struct SessionContext<K: PacketKey> {
    pub(crate) codec: Arc<PacketCodec<K>>,
    pub(crate) listeners: Vec<Arc<dyn ConnectionListener>>,
    pub(crate) transport: TransportConfig,
    pub(crate) backpressure_limit: usize,
    pub(crate) metrics: Arc<Metrics>,
}

/// One connection, before its stream is attached
pub(crate) struct Session<K: PacketKey> {
    context: Arc<SessionContext<K>>,
    channel: Channel,
    outbound: mpsc::Receiver<Bytes>,
    shutdown: CancellationToken,
}

impl<K: PacketKey> Session<K> {
    /// Create the session and its channel; `parent` cancels it on server shutdown
    pub(crate) fn new(
        context: Arc<SessionContext<K>>,
        peer: SocketAddr,
        parent: &CancellationToken,
    ) -> Self {
        let (tx, outbound) = mpsc::channel(context.backpressure_limit.max(1));
        let shutdown = parent.child_token();
        let channel = Channel::new(peer, tx, context.codec.clone(), shutdown.clone());
        Self {
            context,
            channel,
            outbound,
            shutdown,
        }
    }

    pub(crate) fn channel(&self) -> Channel {
        self.channel.clone()
    }

    /// Drive the connection until either side closes it
    #[instrument(skip_all, fields(channel = self.channel.id(), peer = %self.channel.peer_addr()))]
    pub(crate) async fn run<S>(self, stream: S) -> Result<()>
    where
        S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    {
        let Session {
            context,
            channel,
            mut outbound,
            shutdown,
        } = self;

        let framed = Framed::new(stream, FrameCodec::new(context.transport.max_frame_size));
        let (mut sink, mut frames) = framed.split();

        context.metrics.connection_established();
        for listener in &context.listeners {
            listener.connected(&channel);
        }
        info!("Connection active");

        let writer_shutdown = shutdown.clone();
        let writer_metrics = context.metrics.clone();
        let writer = tokio::spawn(async move {
            loop {
                tokio::select! {
                    biased;
                    queued = outbound.recv() => {
                        let Some(bytes) = queued else { break };
                        let len = bytes.len() as u64;
                        if let Err(e) = sink.send(bytes).await {
                            warn!(error = %e, "Failed to write packet");
                            writer_shutdown.cancel();
                            break;
                        }
                        writer_metrics.packet_sent(len);
                    }
                    _ = writer_shutdown.cancelled() => {
                        // flush what was queued before the close request
                        while let Ok(bytes) = outbound.try_recv() {
                            let len = bytes.len() as u64;
                            if sink.send(bytes).await.is_err() {
                                break;
                            }
                            writer_metrics.packet_sent(len);
                        }
                        break;
                    }
                }
            }
            let _ = sink.close().await;
        });

        let result = loop {
            tokio::select! {
                _ = shutdown.cancelled() => break Ok(()),
                frame = frames.next() => match frame {
                    Some(Ok(bytes)) => {
                        if !dispatch(&context, &channel, &bytes) {
                            break Ok(());
                        }
                    }
                    Some(Err(e)) => {
                        warn!(error = %e, "Failed to read frame");
                        break Err(e);
                    }
                    None => {
                        debug!("Peer closed the stream");
                        break Ok(());
                    }
                },
            }
        };

        shutdown.cancel();
        if let Err(e) = writer.await {
            warn!(error = %e, "Writer task failed");
        }

        context.metrics.connection_closed();
        for listener in &context.listeners {
            listener.disconnected(&channel);
        }
        info!("Connection inactive");

        result
    }
}

/// Decode one frame and run its handler. Returns false if the session should close.
fn dispatch<K: PacketKey>(context: &SessionContext<K>, channel: &Channel, bytes: &Bytes) -> bool {
    let len = bytes.len() as u64;
    let mut packet = match context.codec.decode(bytes) {
        Ok(packet) => packet,
        Err(e) => {
            context.metrics.decode_error(len);
            warn!(error = %e, bytes = bytes.len(), "Dropping undecodable packet");
            return !context.transport.close_on_decode_error;
        }
    };
    context.metrics.packet_received(len);

    if let Err(e) = packet.handle(channel) {
        context.metrics.handle_error();
        warn!(packet = packet.packet_name(), error = %e, "Packet handler failed");
    }
    true
}
