//! # Packet
//!
//! The polymorphic unit of exchange.
//!
//! A concrete packet is a struct with a fixed field schema plus an owned
//! [`HandleData`] store. Instances are transient: the sender builds one, `write`s
//! it and may `handle` it locally; the receiver gets a fresh default instance
//! from the registry, `read`s into it and `handle`s it. The two paths never share
//! an instance.
//!
//! `write` and `read` must mirror each other field for field. The framework
//! cannot detect a mismatch; round-trip tests per packet type are the guard.
//!
//! ## Example
//! ```rust
//! use packetwire::core::buffer::{PacketBuffer, PacketReader};
//! use packetwire::core::handle_data::HandleData;
//! use packetwire::core::packet::Packet;
//! use packetwire::error::Result;
//! use packetwire::handle_data_accessors;
//!
//! #[derive(Debug, Default)]
//! struct GreetingPacket {
//!     text: String,
//!     handle_data: HandleData,
//! }
//!
//! impl Packet for GreetingPacket {
//!     fn write(&mut self, buffer: &mut PacketBuffer) -> Result<()> {
//!         buffer.write_string(&self.text)
//!     }
//!
//!     fn read(&mut self, reader: &mut PacketReader<'_>) -> Result<()> {
//!         self.text = reader.read_string()?;
//!         Ok(())
//!     }
//!
//!     handle_data_accessors!(handle_data);
//! }
//! ```

use std::any::{type_name, Any, TypeId};
use std::fmt;
use std::hash::{Hash, Hasher};

use crate::core::buffer::{PacketBuffer, PacketReader};
use crate::core::handle_data::HandleData;
use crate::error::Result;
use crate::transport::channel::Channel;

/// Upcast helper so `dyn Packet` can be downcast to its concrete type
pub trait AsAny: Any {
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
    fn into_any(self: Box<Self>) -> Box<dyn Any>;
}

impl<T: Any> AsAny for T {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }

    fn into_any(self: Box<Self>) -> Box<dyn Any> {
        self
    }
}

/// A typed, schema-fixed message
pub trait Packet: AsAny + Send + Sync {
    /// Serialize fields in schema order. May attach sender-local handle data.
    fn write(&mut self, buffer: &mut PacketBuffer) -> Result<()>;

    /// Populate fields from a received message, in the same order `write` used.
    fn read(&mut self, reader: &mut PacketReader<'_>) -> Result<()>;

    /// React to the packet once it is populated.
    ///
    /// Runs on whatever task delivered it; the channel identifies the peer and
    /// can be used to reply.
    fn handle(&mut self, _channel: &Channel) -> Result<()> {
        Ok(())
    }

    fn handle_data(&self) -> &HandleData;

    fn handle_data_mut(&mut self) -> &mut HandleData;

    /// Type name used in logs and errors
    fn packet_name(&self) -> &'static str {
        type_name::<Self>()
    }
}

impl dyn Packet {
    /// Runtime type of the concrete packet behind this trait object
    pub fn packet_type_id(&self) -> TypeId {
        self.as_any().type_id()
    }

    pub fn is<P: Packet>(&self) -> bool {
        self.as_any().is::<P>()
    }

    pub fn downcast_ref<P: Packet>(&self) -> Option<&P> {
        self.as_any().downcast_ref::<P>()
    }

    pub fn downcast_mut<P: Packet>(&mut self) -> Option<&mut P> {
        self.as_any_mut().downcast_mut::<P>()
    }

    /// Take ownership of the concrete packet; `None` if the type differs
    pub fn downcast<P: Packet>(self: Box<Self>) -> Option<Box<P>> {
        self.into_any().downcast::<P>().ok()
    }
}

impl fmt::Debug for dyn Packet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Packet")
            .field("type", &self.packet_name())
            .field("handle_data", self.handle_data())
            .finish()
    }
}

/// Implements the `handle_data` accessors of [`Packet`] for a struct field.
#[macro_export]
macro_rules! handle_data_accessors {
    ($field:ident) => {
        fn handle_data(&self) -> &$crate::core::handle_data::HandleData {
            &self.$field
        }

        fn handle_data_mut(&mut self) -> &mut $crate::core::handle_data::HandleData {
            &mut self.$field
        }
    };
}

fn construct<P: Packet + Default>() -> Box<dyn Packet> {
    Box::new(P::default())
}

/// Registry-side descriptor of a packet type: identity, name, constructor.
///
/// Equality and hashing use the type identity only.
#[derive(Clone, Copy)]
pub struct PacketType {
    id: TypeId,
    name: &'static str,
    construct: fn() -> Box<dyn Packet>,
}

impl PacketType {
    pub fn of<P: Packet + Default>() -> Self {
        Self {
            id: TypeId::of::<P>(),
            name: type_name::<P>(),
            construct: construct::<P>,
        }
    }

    pub fn id(&self) -> TypeId {
        self.id
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Build a fresh default instance for decoding into
    pub fn instantiate(&self) -> Box<dyn Packet> {
        (self.construct)()
    }

    pub fn matches(&self, packet: &dyn Packet) -> bool {
        self.id == packet.packet_type_id()
    }
}

impl PartialEq for PacketType {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for PacketType {}

impl Hash for PacketType {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Debug for PacketType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("PacketType").field(&self.name).finish()
    }
}
