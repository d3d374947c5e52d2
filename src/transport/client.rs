//! TCP packet client.
//!
//! Mirrors the server side: [`ClientBuilder`] validates at `build`, and the
//! resulting [`Client`] can open any number of [`Connection`]s. The client
//! codec encodes `ToServer` packets and decodes `ToClient` ones.

use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpStream;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument};

use crate::config::{collect_errors, NetworkConfig};
use crate::core::direction::PacketDirection;
use crate::core::packet::{Packet, PacketType};
use crate::error::{ProtocolError, Result};
use crate::protocol::codec::PacketCodec;
use crate::protocol::key::PacketKey;
use crate::protocol::namespace::random_name;
use crate::protocol::typing::PacketTyping;
use crate::transport::channel::Channel;
use crate::transport::listener::ConnectionListener;
use crate::transport::session::{Session, SessionContext};
use crate::utils::metrics::Metrics;

/// Step-wise client configuration
pub struct ClientBuilder<K: PacketKey> {
    address: String,
    config: NetworkConfig,
    typing: Arc<PacketTyping<K>>,
    listeners: Vec<Arc<dyn ConnectionListener>>,
    pending_error: Option<ProtocolError>,
}

impl<K: PacketKey> ClientBuilder<K> {
    /// Builder for a server at `address` with a fresh, anonymously named registry
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            config: NetworkConfig::default(),
            typing: Arc::new(PacketTyping::new(random_name())),
            listeners: Vec::new(),
            pending_error: None,
        }
    }

    pub fn from_config(config: NetworkConfig) -> Self {
        let mut builder = Self::new(config.client.address.clone());
        builder.config = config;
        builder
    }

    pub fn config(mut self, config: NetworkConfig) -> Self {
        self.config = config;
        self
    }

    pub fn typing(mut self, typing: Arc<PacketTyping<K>>) -> Self {
        self.typing = typing;
        self
    }

    pub fn accept_typing<F>(self, setup: F) -> Self
    where
        F: FnOnce(&PacketTyping<K>),
    {
        setup(&self.typing);
        self
    }

    pub fn register<P: Packet + Default>(self, direction: PacketDirection, key: K) -> Self {
        let result = self.typing.register_type(direction, PacketType::of::<P>(), key);
        self.record(result)
    }

    pub fn register_next<P: Packet + Default>(self, direction: PacketDirection) -> Self {
        let result = self
            .typing
            .register_type_next(direction, PacketType::of::<P>())
            .map(|_| ());
        self.record(result)
    }

    fn record(mut self, result: Result<()>) -> Self {
        if let Err(e) = result {
            if self.pending_error.is_none() {
                self.pending_error = Some(e);
            }
        }
        self
    }

    pub fn listener(mut self, listener: impl ConnectionListener + 'static) -> Self {
        self.listeners.push(Arc::new(listener));
        self
    }

    pub fn shared_listener(mut self, listener: Arc<dyn ConnectionListener>) -> Self {
        self.listeners.push(listener);
        self
    }

    pub fn build(self) -> Result<Client<K>> {
        if let Some(e) = self.pending_error {
            return Err(e);
        }

        let mut config = self.config;
        config.client.address = self.address;

        let mut errors = config.client.validate();
        errors.extend(config.transport.validate());
        collect_errors(errors)?;

        let address = config
            .client
            .address
            .parse::<SocketAddr>()
            .map_err(|e| ProtocolError::ConfigError(format!("Invalid client address: {e}")))?;

        let context = Arc::new(SessionContext {
            codec: Arc::new(PacketCodec::client(self.typing)),
            listeners: self.listeners,
            transport: config.transport.clone(),
            backpressure_limit: config.client.backpressure_limit,
            metrics: Arc::new(Metrics::new()),
        });

        Ok(Client {
            address,
            config,
            context,
        })
    }
}

/// Validated client, ready to connect
pub struct Client<K: PacketKey> {
    address: SocketAddr,
    config: NetworkConfig,
    context: Arc<SessionContext<K>>,
}

impl<K: PacketKey> Client<K> {
    pub fn address(&self) -> SocketAddr {
        self.address
    }

    pub fn typing(&self) -> &Arc<PacketTyping<K>> {
        self.context.codec.typing()
    }

    /// Counters shared by every connection this client opens
    pub fn metrics(&self) -> &Arc<Metrics> {
        &self.context.metrics
    }

    /// Open a connection, bounded by the configured connection timeout
    #[instrument(skip(self), fields(address = %self.address))]
    pub async fn connect(&self) -> Result<Connection> {
        let stream = tokio::time::timeout(
            self.config.client.connection_timeout,
            TcpStream::connect(self.address),
        )
        .await
        .map_err(|_| {
            self.context.metrics.connection_rejected();
            ProtocolError::TransportError(format!("Connection to {} timed out", self.address))
        })?
        .inspect_err(|_| self.context.metrics.connection_rejected())?;

        stream.set_nodelay(self.config.transport.nodelay)?;
        info!("Connected");

        let session = Session::new(self.context.clone(), self.address, &CancellationToken::new());
        let channel = session.channel();
        let task = tokio::spawn(session.run(stream));

        Ok(Connection { channel, task })
    }
}

/// Open client connection
pub struct Connection {
    channel: Channel,
    task: JoinHandle<Result<()>>,
}

impl Connection {
    pub fn channel(&self) -> &Channel {
        &self.channel
    }

    /// Encode and queue a server-bound packet
    pub fn send(&self, packet: &mut dyn Packet) -> Result<()> {
        self.channel.send(packet)
    }

    pub async fn send_async(&self, packet: &mut dyn Packet) -> Result<()> {
        self.channel.send_async(packet).await
    }

    /// Flush queued packets and close
    pub fn close(&self) {
        self.channel.close();
    }

    pub fn is_closed(&self) -> bool {
        self.channel.is_closed()
    }

    /// Wait for the session to end
    pub async fn wait(self) -> Result<()> {
        self.task
            .await
            .map_err(|e| ProtocolError::TransportError(format!("Connection task failed: {e}")))?
    }
}
