//! TCP packet server.
//!
//! [`ServerBuilder`] collects the packet registry, lifecycle listeners and
//! configuration, and validates all of it in [`ServerBuilder::build`] before any
//! socket is opened. [`Server::bind`] starts accepting in a background task and
//! returns a [`ServerHandle`] for shutdown.
//!
//! ```rust,ignore
//! let handle = ServerBuilder::<i32>::local(9000)
//!     .register::<LoginPacket>(PacketDirection::ToServer, 1)
//!     .register::<WelcomePacket>(PacketDirection::ToClient, 1)
//!     .listener(PlayerTracker::default())
//!     .build()?
//!     .bind()
//!     .await?;
//! ```

use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::task::{JoinError, JoinHandle, JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use crate::config::{collect_errors, NetworkConfig};
use crate::core::direction::PacketDirection;
use crate::core::packet::{Packet, PacketType};
use crate::error::{ProtocolError, Result};
use crate::protocol::codec::PacketCodec;
use crate::protocol::key::PacketKey;
use crate::protocol::namespace::random_name;
use crate::protocol::typing::PacketTyping;
use crate::transport::listener::ConnectionListener;
use crate::transport::session::{Session, SessionContext};
use crate::utils::metrics::Metrics;

/// Step-wise server configuration
pub struct ServerBuilder<K: PacketKey> {
    address: String,
    config: NetworkConfig,
    typing: Arc<PacketTyping<K>>,
    listeners: Vec<Arc<dyn ConnectionListener>>,
    pending_error: Option<ProtocolError>,
}

impl<K: PacketKey> ServerBuilder<K> {
    /// Builder for `address` with a fresh, anonymously named registry
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            config: NetworkConfig::default(),
            typing: Arc::new(PacketTyping::new(random_name())),
            listeners: Vec::new(),
            pending_error: None,
        }
    }

    /// Builder listening on localhost
    pub fn local(port: u16) -> Self {
        Self::new(format!("127.0.0.1:{port}"))
    }

    /// Builder using the server address from a configuration
    pub fn from_config(config: NetworkConfig) -> Self {
        let mut builder = Self::new(config.server.address.clone());
        builder.config = config;
        builder
    }

    /// Replace the configuration; the builder's address is kept
    pub fn config(mut self, config: NetworkConfig) -> Self {
        self.config = config;
        self
    }

    /// Use an existing registry, e.g. one shared with a client builder
    pub fn typing(mut self, typing: Arc<PacketTyping<K>>) -> Self {
        self.typing = typing;
        self
    }

    /// Run arbitrary setup against the registry
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

    /// Register with an auto-assigned key (integral key types only)
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

    /// Validate everything collected so far
    pub fn build(self) -> Result<Server<K>> {
        if let Some(e) = self.pending_error {
            return Err(e);
        }

        let mut config = self.config;
        config.server.address = self.address;

        let mut errors = config.server.validate();
        errors.extend(config.transport.validate());
        collect_errors(errors)?;

        let address = config
            .server
            .address
            .parse::<SocketAddr>()
            .map_err(|e| ProtocolError::ConfigError(format!("Invalid server address: {e}")))?;

        Ok(Server {
            address,
            config,
            typing: self.typing,
            listeners: self.listeners,
        })
    }
}

/// Validated server, ready to bind
pub struct Server<K: PacketKey> {
    address: SocketAddr,
    config: NetworkConfig,
    typing: Arc<PacketTyping<K>>,
    listeners: Vec<Arc<dyn ConnectionListener>>,
}

impl<K: PacketKey> Server<K> {
    pub fn address(&self) -> SocketAddr {
        self.address
    }

    pub fn typing(&self) -> &Arc<PacketTyping<K>> {
        &self.typing
    }

    /// Bind the listen socket and start accepting connections
    #[instrument(skip(self), fields(address = %self.address, namespace = self.typing.name()))]
    pub async fn bind(self) -> Result<ServerHandle> {
        let listener = TcpListener::bind(self.address).await?;
        let local_addr = listener.local_addr()?;
        info!(%local_addr, "Listening");

        let metrics = Arc::new(Metrics::new());
        let context = Arc::new(SessionContext {
            codec: Arc::new(PacketCodec::server(self.typing)),
            listeners: self.listeners,
            transport: self.config.transport.clone(),
            backpressure_limit: self.config.server.backpressure_limit,
            metrics: metrics.clone(),
        });

        let shutdown = CancellationToken::new();
        let task = tokio::spawn(accept_loop(
            listener,
            context,
            self.config,
            shutdown.clone(),
        ));

        Ok(ServerHandle {
            local_addr,
            shutdown,
            metrics,
            task,
        })
    }

    /// Bind and serve until CTRL+C
    pub async fn run(self) -> Result<()> {
        let handle = self.bind().await?;
        tokio::select! {
            signal = tokio::signal::ctrl_c() => {
                if let Err(e) = signal {
                    error!(error = %e, "Failed to listen for CTRL+C");
                }
                info!("Received CTRL+C signal, shutting down");
                handle.shutdown();
            }
            _ = handle.shutdown.cancelled() => {}
        }
        handle.wait().await
    }
}

async fn accept_loop<K: PacketKey>(
    listener: TcpListener,
    context: Arc<SessionContext<K>>,
    config: NetworkConfig,
    shutdown: CancellationToken,
) -> Result<()> {
    let mut sessions = JoinSet::new();

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,

            Some(joined) = sessions.join_next(), if !sessions.is_empty() => reap(joined),

            accepted = listener.accept() => {
                let (stream, peer) = match accepted {
                    Ok(accepted) => accepted,
                    Err(e) => {
                        error!(error = %e, "Error accepting connection");
                        continue;
                    }
                };

                // finished sessions may still be waiting in the set
                while let Some(joined) = sessions.try_join_next() {
                    reap(joined);
                }
                if sessions.len() >= config.server.max_connections {
                    warn!(%peer, max = config.server.max_connections, "Connection limit reached, refusing");
                    context.metrics.connection_rejected();
                    continue;
                }

                if let Err(e) = stream.set_nodelay(config.transport.nodelay) {
                    warn!(%peer, error = %e, "Failed to set TCP_NODELAY");
                }

                let session = Session::new(context.clone(), peer, &shutdown);
                sessions.spawn(session.run(stream));
            }
        }
    }

    info!(
        connections = sessions.len(),
        "Shutting down server. Waiting for connections to close..."
    );
    let drain = async { while sessions.join_next().await.is_some() {} };
    if tokio::time::timeout(config.server.shutdown_timeout, drain)
        .await
        .is_err()
    {
        warn!("Shutdown timeout reached, aborting remaining connections");
        sessions.abort_all();
    }
    context.metrics.log_metrics();
    Ok(())
}

fn reap(joined: std::result::Result<Result<()>, JoinError>) {
    match joined {
        Ok(Err(e)) => debug!(error = %e, "Session ended with error"),
        Err(e) => warn!(error = %e, "Session task failed"),
        Ok(Ok(())) => {}
    }
}

/// Running server
pub struct ServerHandle {
    local_addr: SocketAddr,
    shutdown: CancellationToken,
    metrics: Arc<Metrics>,
    task: JoinHandle<Result<()>>,
}

impl ServerHandle {
    /// Bound address (useful when binding port 0)
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn metrics(&self) -> &Arc<Metrics> {
        &self.metrics
    }

    /// Stop accepting and close every connection
    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }

    /// Wait for the accept loop and all sessions to finish
    pub async fn wait(self) -> Result<()> {
        self.task
            .await
            .map_err(|e| ProtocolError::TransportError(format!("Server task failed: {e}")))?
    }
}
