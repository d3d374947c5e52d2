//! # Error Types
//!
//! Error handling for the packet framework.
//!
//! This module defines every error variant that can surface from buffer reads,
//! packet registration, encode/decode and the session layer.
//!
//! ## Error Categories
//! - **Buffer Errors**: reading past the end of a message, invalid UTF-8
//! - **Typing Errors**: unknown keys, unregistered packet types, missing namespaces,
//!   auto-key requests for non-integral key types
//! - **Transport Errors**: I/O failures, oversized frames, closed connections
//! - **Configuration Errors**: invalid or unreadable configuration
//!
//! None of these are retried by the library; every error is returned to the
//! call site that triggered it.
//!
//! ## Example Usage
//! ```rust
//! use packetwire::core::buffer::PacketReader;
//! use packetwire::error::ProtocolError;
//! use tracing::warn;
//!
//! let mut reader = PacketReader::new(&[0x00, 0x01][..]);
//! match reader.read_i32() {
//!     Err(ProtocolError::Underflow { needed, remaining }) => {
//!         warn!(needed, remaining, "Truncated message");
//!     }
//!     other => panic!("unexpected: {other:?}"),
//! }
//! ```

use std::io;
use thiserror::Error;

use crate::core::direction::PacketDirection;

/// Error message constants to reduce allocations in error paths.
pub mod constants {
    /// Registry lock errors
    pub const ERR_TYPING_WRITE_LOCK: &str = "Failed to acquire write lock on packet typing";
    pub const ERR_TYPING_READ_LOCK: &str = "Failed to acquire read lock on packet typing";
    pub const ERR_NAMESPACE_WRITE_LOCK: &str = "Failed to acquire write lock on namespace table";
    pub const ERR_NAMESPACE_READ_LOCK: &str = "Failed to acquire read lock on namespace table";

    /// Auto-key errors
    pub const ERR_AUTO_KEY_NOT_INTEGRAL: &str = "key type is not integral";
    pub const ERR_AUTO_KEY_OVERFLOW: &str = "registration count does not fit the key type";

    /// Connection errors
    pub const ERR_OUTBOUND_QUEUE_FULL: &str = "Outbound queue is full";
}

/// ProtocolError is the primary error type for all packet operations
#[derive(Error, Debug)]
pub enum ProtocolError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Buffer underflow: needed {needed} bytes, {remaining} remaining")]
    Underflow { needed: usize, remaining: usize },

    #[error("Invalid UTF-8 in string field")]
    InvalidUtf8,

    #[error("Unknown packet key {key} for {direction} in namespace '{namespace}'")]
    UnknownPacketKey {
        namespace: String,
        direction: PacketDirection,
        key: String,
    },

    #[error("Packet type {packet} is not registered for {direction} in namespace '{namespace}'")]
    UnregisteredPacket {
        namespace: String,
        direction: PacketDirection,
        packet: &'static str,
    },

    #[error("Namespace '{name}' not found for key type {key_type}")]
    NamespaceNotFound {
        name: String,
        key_type: &'static str,
    },

    #[error("Cannot auto-assign key of type {key_type}: {reason}")]
    AutoKeyType {
        key_type: &'static str,
        reason: &'static str,
    },

    #[error("Packet too large: {0} bytes")]
    OversizedPacket(usize),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Connection closed")]
    ConnectionClosed,

    #[error("Transport error: {0}")]
    TransportError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Lock poisoned: {0}")]
    LockPoisoned(&'static str),

    #[error("Custom error: {0}")]
    Custom(String),
}

impl From<bincode::Error> for ProtocolError {
    fn from(err: bincode::Error) -> Self {
        ProtocolError::Serialization(err.to_string())
    }
}

/// Type alias for Results using ProtocolError
pub type Result<T> = std::result::Result<T, ProtocolError>;
