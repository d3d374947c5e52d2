//! # packetwire
//!
//! Directionally-typed packet framework for byte-stream protocols.
//!
//! Applications define packet types with a `write`/`read` field schema, register
//! them under keys in a [`PacketTyping`] registry (one table per direction), and
//! exchange them through a [`PacketCodec`] bound to the side's encode and decode
//! directions. Received packets run their own `handle` step.
//!
//! ## Layers
//! - **core**: byte buffer, directions, handle data, the packet trait, framing
//! - **protocol**: key types, typing registries, namespaces, codecs
//! - **transport**: TCP server/client builders, sessions and channels
//! - **utils**: logging setup and connection metrics
//!
//! ## Message Format
//! ```text
//! [Length(4)] [Key(K)] [Fields(N)]
//! ```
//! The length prefix is added by the transport; codecs see `[Key][Fields]` only.

pub mod config;
pub mod core;
pub mod error;
pub mod protocol;
pub mod transport;
pub mod utils;

pub use crate::core::buffer::{PacketBuffer, PacketReader};
pub use crate::core::direction::PacketDirection;
pub use crate::core::handle_data::HandleData;
pub use crate::core::packet::{Packet, PacketType};
pub use error::{ProtocolError, Result};
pub use protocol::codec::{PacketCodec, PacketCodecManager};
pub use protocol::key::PacketKey;
pub use protocol::namespace::Namespaces;
pub use protocol::typing::PacketTyping;
pub use transport::channel::Channel;
pub use transport::client::{Client, ClientBuilder, Connection};
pub use transport::listener::ConnectionListener;
pub use transport::server::{Server, ServerBuilder, ServerHandle};
