//! # Packet Codec
//!
//! Turns packet instances into messages and messages back into packets.
//!
//! ## Message Format
//! ```text
//! [Key(K)] [Fields(N)]
//! ```
//! `encode` resolves the packet's runtime type to its key for the active
//! encode direction, writes the key, then runs the packet's `write` step.
//! `decode` reads the key, resolves it for the active decode direction, builds a
//! fresh default instance and runs its `read` step over the remaining bytes.
//! Decoding never calls `handle`; dispatch belongs to the caller.
//!
//! Both operations are synchronous, single-pass and touch only the registry's
//! read lock, so one codec can be shared by every connection task.

use bytes::Bytes;
use std::sync::Arc;
use tracing::{trace, warn};

use crate::core::buffer::{PacketBuffer, PacketReader};
use crate::core::direction::PacketDirection;
use crate::core::packet::Packet;
use crate::error::Result;
use crate::protocol::key::PacketKey;
use crate::protocol::namespace::Namespaces;
use crate::protocol::typing::PacketTyping;

/// Default namespace name used by [`PacketCodecManager`]
pub const DEFAULT_NAMESPACE: &str = "default";

/// Initial buffer capacity for encoding; grows as needed
const ENCODE_CAPACITY: usize = 64;

/// Encoder/decoder bound to one registry and a pair of active directions
#[derive(Debug, Clone)]
pub struct PacketCodec<K: PacketKey> {
    typing: Arc<PacketTyping<K>>,
    encode_direction: PacketDirection,
    decode_direction: PacketDirection,
}

impl<K: PacketKey> PacketCodec<K> {
    pub fn new(
        typing: Arc<PacketTyping<K>>,
        encode_direction: PacketDirection,
        decode_direction: PacketDirection,
    ) -> Self {
        Self {
            typing,
            encode_direction,
            decode_direction,
        }
    }

    /// Server side: sends client-bound packets, receives server-bound ones
    pub fn server(typing: Arc<PacketTyping<K>>) -> Self {
        Self::new(typing, PacketDirection::ToClient, PacketDirection::ToServer)
    }

    /// Client side: sends server-bound packets, receives client-bound ones
    pub fn client(typing: Arc<PacketTyping<K>>) -> Self {
        Self::new(typing, PacketDirection::ToServer, PacketDirection::ToClient)
    }

    pub fn typing(&self) -> &Arc<PacketTyping<K>> {
        &self.typing
    }

    pub fn encode_direction(&self) -> PacketDirection {
        self.encode_direction
    }

    pub fn decode_direction(&self) -> PacketDirection {
        self.decode_direction
    }

    pub fn set_encode_direction(&mut self, direction: PacketDirection) {
        self.encode_direction = direction;
    }

    pub fn set_decode_direction(&mut self, direction: PacketDirection) {
        self.decode_direction = direction;
    }

    /// Encode a packet into `[key][fields]`.
    ///
    /// Takes the packet mutably because `write` may attach handle data that the
    /// sender reads back in a local `handle` call.
    pub fn encode(&self, packet: &mut dyn Packet) -> Result<Bytes> {
        let key = self.typing.resolve_key_of(self.encode_direction, packet)?;

        let mut buffer = PacketBuffer::with_capacity(ENCODE_CAPACITY);
        key.write_key(&mut buffer)?;
        packet.write(&mut buffer)?;

        trace!(
            packet = packet.packet_name(),
            %key,
            bytes = buffer.len(),
            "Packet encoded"
        );
        Ok(buffer.freeze())
    }

    /// Decode `[key][fields]` into a freshly constructed packet
    pub fn decode(&self, bytes: &[u8]) -> Result<Box<dyn Packet>> {
        let mut reader = PacketReader::new(bytes);
        let key = K::read_key(&mut reader)?;
        let packet_type = self.typing.resolve_type(self.decode_direction, &key)?;

        let mut packet = packet_type.instantiate();
        packet.read(&mut reader)?;

        if reader.has_remaining() {
            warn!(
                packet = packet_type.name(),
                %key,
                trailing = reader.remaining(),
                "Packet read left trailing bytes"
            );
        }
        trace!(packet = packet_type.name(), %key, bytes = bytes.len(), "Packet decoded");
        Ok(packet)
    }
}

/// Key-type-erased encoding, used where the key type must not leak (channels)
pub trait PacketEncoder: Send + Sync {
    fn encode_packet(&self, packet: &mut dyn Packet) -> Result<Bytes>;
}

impl<K: PacketKey> PacketEncoder for PacketCodec<K> {
    fn encode_packet(&self, packet: &mut dyn Packet) -> Result<Bytes> {
        self.encode(packet)
    }
}

/// Active directions plus an integer-keyed and a string-keyed registry.
///
/// Defaults to server-side directions (encode `ToClient`, decode `ToServer`);
/// use [`PacketCodecManager::client`] or swap the directions on the client.
#[derive(Debug, Clone)]
pub struct PacketCodecManager {
    encode_direction: PacketDirection,
    decode_direction: PacketDirection,
    by_integer: Arc<PacketTyping<i32>>,
    by_string: Arc<PacketTyping<String>>,
}

impl Default for PacketCodecManager {
    fn default() -> Self {
        Self::new(
            Arc::new(PacketTyping::new(DEFAULT_NAMESPACE)),
            Arc::new(PacketTyping::new(DEFAULT_NAMESPACE)),
        )
    }
}

impl PacketCodecManager {
    pub fn new(by_integer: Arc<PacketTyping<i32>>, by_string: Arc<PacketTyping<String>>) -> Self {
        Self {
            encode_direction: PacketDirection::ToClient,
            decode_direction: PacketDirection::ToServer,
            by_integer,
            by_string,
        }
    }

    /// Manager backed by the `"default"` registries of a namespace table
    pub fn from_namespaces(namespaces: &Namespaces) -> Result<Self> {
        Ok(Self::new(
            namespaces.get_or_create::<i32>(DEFAULT_NAMESPACE)?,
            namespaces.get_or_create::<String>(DEFAULT_NAMESPACE)?,
        ))
    }

    /// Same registries with server-side directions
    pub fn server(self) -> Self {
        self.with_directions(PacketDirection::ToClient, PacketDirection::ToServer)
    }

    /// Same registries with client-side directions
    pub fn client(self) -> Self {
        self.with_directions(PacketDirection::ToServer, PacketDirection::ToClient)
    }

    pub fn with_directions(mut self, encode: PacketDirection, decode: PacketDirection) -> Self {
        self.encode_direction = encode;
        self.decode_direction = decode;
        self
    }

    pub fn encode_direction(&self) -> PacketDirection {
        self.encode_direction
    }

    pub fn decode_direction(&self) -> PacketDirection {
        self.decode_direction
    }

    pub fn set_encode_direction(&mut self, direction: PacketDirection) {
        self.encode_direction = direction;
    }

    pub fn set_decode_direction(&mut self, direction: PacketDirection) {
        self.decode_direction = direction;
    }

    pub fn typing_by_integer(&self) -> &Arc<PacketTyping<i32>> {
        &self.by_integer
    }

    pub fn typing_by_string(&self) -> &Arc<PacketTyping<String>> {
        &self.by_string
    }

    /// Codec over the integer-keyed registry with the active directions
    pub fn integer_codec(&self) -> PacketCodec<i32> {
        PacketCodec::new(
            self.by_integer.clone(),
            self.encode_direction,
            self.decode_direction,
        )
    }

    /// Codec over the string-keyed registry with the active directions
    pub fn string_codec(&self) -> PacketCodec<String> {
        PacketCodec::new(
            self.by_string.clone(),
            self.encode_direction,
            self.decode_direction,
        )
    }
}
