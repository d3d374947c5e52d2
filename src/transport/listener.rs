//! Connection lifecycle hooks.
//!
//! On a server, listeners observe clients connecting and disconnecting; on a
//! client, they observe the server connection. The library does not interpret
//! these events, it only delivers them.

use crate::transport::channel::Channel;

/// Receives connect/disconnect notifications for a server or client
pub trait ConnectionListener: Send + Sync {
    /// The peer became active; the channel is ready to send on
    fn connected(&self, _channel: &Channel) {}

    /// The peer became inactive; sends on the channel will fail
    fn disconnected(&self, _channel: &Channel) {}
}

/// Listener that ignores every event
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopListener;

impl ConnectionListener for NoopListener {}
