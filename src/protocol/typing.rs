//! # Packet Typing Registry
//!
//! Per-namespace, per-direction bidirectional mapping between wire keys and
//! packet types.
//!
//! Within one direction a key maps to exactly one packet type and a packet type
//! to exactly one key. Registration is last-write-wins: registering a type
//! under a key that is already taken, or re-registering a type under a new key,
//! displaces the previous mapping in both directions of the map (the displaced
//! key stops resolving). Displacements are logged at `warn`.
//!
//! Registration is meant to happen once, before connections exchange packets.
//! Lookups take a read lock and are safe from any number of connection tasks.
//!
//! ## Usage
//! ```rust,ignore
//! let typing = PacketTyping::<i32>::new("demo");
//! typing.register::<GreetingPacket>(PacketDirection::ToServer, 1)?;
//! let key = typing.register_next::<FarewellPacket>(PacketDirection::ToServer)?;
//! ```

use std::any::TypeId;
use std::collections::HashMap;
use std::fmt;
use std::sync::RwLock;
use tracing::{debug, instrument, warn};

use crate::core::direction::PacketDirection;
use crate::core::packet::{Packet, PacketType};
use crate::error::constants::{ERR_TYPING_READ_LOCK, ERR_TYPING_WRITE_LOCK};
use crate::error::{ProtocolError, Result};
use crate::protocol::key::PacketKey;

/// Key ⇄ type map for one direction
struct DirectionTable<K> {
    by_key: HashMap<K, PacketType>,
    by_type: HashMap<TypeId, K>,
}

impl<K: PacketKey> DirectionTable<K> {
    fn new() -> Self {
        Self {
            by_key: HashMap::new(),
            by_type: HashMap::new(),
        }
    }

    fn insert(&mut self, namespace: &str, direction: PacketDirection, packet_type: PacketType, key: K) {
        if let Some(old_key) = self.by_type.insert(packet_type.id(), key.clone()) {
            if old_key != key {
                self.by_key.remove(&old_key);
                warn!(
                    namespace,
                    %direction,
                    packet = packet_type.name(),
                    %old_key,
                    new_key = %key,
                    "Packet type re-registered under a new key, old key displaced"
                );
            }
        }

        if let Some(old_type) = self.by_key.insert(key.clone(), packet_type) {
            if old_type != packet_type {
                self.by_type.remove(&old_type.id());
                warn!(
                    namespace,
                    %direction,
                    %key,
                    displaced = old_type.name(),
                    packet = packet_type.name(),
                    "Key already taken, previous packet type displaced"
                );
            }
        }
    }

    /// First free key at or after the current mapping count
    fn next_free_key(&self) -> Result<K> {
        let mut index = self.by_key.len();
        loop {
            let key = K::from_index(index)?;
            if !self.by_key.contains_key(&key) {
                return Ok(key);
            }
            index += 1;
        }
    }
}

/// Registry of packet types for one namespace and key type
pub struct PacketTyping<K: PacketKey> {
    name: String,
    tables: [RwLock<DirectionTable<K>>; 2],
}

impl<K: PacketKey> PacketTyping<K> {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            tables: [
                RwLock::new(DirectionTable::new()),
                RwLock::new(DirectionTable::new()),
            ],
        }
    }

    /// Namespace name
    pub fn name(&self) -> &str {
        &self.name
    }

    fn table(&self, direction: PacketDirection) -> &RwLock<DirectionTable<K>> {
        &self.tables[direction.index()]
    }

    /// Register a packet type under an explicit key
    #[instrument(skip(self, packet_type), fields(namespace = %self.name, packet = packet_type.name()))]
    pub fn register_type(&self, direction: PacketDirection, packet_type: PacketType, key: K) -> Result<()> {
        let mut table = self
            .table(direction)
            .write()
            .map_err(|_| ProtocolError::LockPoisoned(ERR_TYPING_WRITE_LOCK))?;

        table.insert(&self.name, direction, packet_type, key.clone());
        debug!(%key, "Packet registered");
        Ok(())
    }

    /// Register a packet type under a key derived from the direction's current
    /// registration count, skipping keys that are already taken. Only valid for
    /// integral key types.
    #[instrument(skip(self, packet_type), fields(namespace = %self.name, packet = packet_type.name()))]
    pub fn register_type_next(&self, direction: PacketDirection, packet_type: PacketType) -> Result<K> {
        let mut table = self
            .table(direction)
            .write()
            .map_err(|_| ProtocolError::LockPoisoned(ERR_TYPING_WRITE_LOCK))?;

        let key = table.next_free_key()?;
        table.insert(&self.name, direction, packet_type, key.clone());
        debug!(%key, "Packet registered with auto-assigned key");
        Ok(key)
    }

    pub fn register<P: Packet + Default>(&self, direction: PacketDirection, key: K) -> Result<()> {
        self.register_type(direction, PacketType::of::<P>(), key)
    }

    pub fn register_next<P: Packet + Default>(&self, direction: PacketDirection) -> Result<K> {
        self.register_type_next(direction, PacketType::of::<P>())
    }

    /// Resolve a wire key to its packet type
    pub fn resolve_type(&self, direction: PacketDirection, key: &K) -> Result<PacketType> {
        let table = self
            .table(direction)
            .read()
            .map_err(|_| ProtocolError::LockPoisoned(ERR_TYPING_READ_LOCK))?;

        table
            .by_key
            .get(key)
            .copied()
            .ok_or_else(|| ProtocolError::UnknownPacketKey {
                namespace: self.name.clone(),
                direction,
                key: key.to_string(),
            })
    }

    /// Resolve a packet type to its wire key
    pub fn resolve_key(&self, direction: PacketDirection, packet_type: &PacketType) -> Result<K> {
        self.lookup_key(direction, packet_type.id(), packet_type.name())
    }

    /// Resolve the runtime type of a packet instance to its wire key
    pub fn resolve_key_of(&self, direction: PacketDirection, packet: &dyn Packet) -> Result<K> {
        self.lookup_key(direction, packet.packet_type_id(), packet.packet_name())
    }

    fn lookup_key(&self, direction: PacketDirection, id: TypeId, name: &'static str) -> Result<K> {
        let table = self
            .table(direction)
            .read()
            .map_err(|_| ProtocolError::LockPoisoned(ERR_TYPING_READ_LOCK))?;

        table
            .by_type
            .get(&id)
            .cloned()
            .ok_or_else(|| ProtocolError::UnregisteredPacket {
                namespace: self.name.clone(),
                direction,
                packet: name,
            })
    }

    /// Number of packet types registered for a direction
    pub fn len(&self, direction: PacketDirection) -> Result<usize> {
        let table = self
            .table(direction)
            .read()
            .map_err(|_| ProtocolError::LockPoisoned(ERR_TYPING_READ_LOCK))?;
        Ok(table.by_key.len())
    }

    pub fn is_empty(&self) -> Result<bool> {
        for direction in PacketDirection::ALL {
            if self.len(direction)? > 0 {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Snapshot of a direction's mappings
    pub fn entries(&self, direction: PacketDirection) -> Result<Vec<(K, PacketType)>> {
        let table = self
            .table(direction)
            .read()
            .map_err(|_| ProtocolError::LockPoisoned(ERR_TYPING_READ_LOCK))?;
        Ok(table
            .by_key
            .iter()
            .map(|(key, packet_type)| (key.clone(), *packet_type))
            .collect())
    }
}

impl<K: PacketKey> fmt::Debug for PacketTyping<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut debug = f.debug_struct("PacketTyping");
        debug.field("name", &self.name).field("key_type", &K::TYPE_NAME);
        for direction in PacketDirection::ALL {
            if let Ok(table) = self.table(direction).read() {
                debug.field(&format!("{direction}"), &table.by_key);
            }
        }
        debug.finish()
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]
    use super::*;
    use crate::core::buffer::{PacketBuffer, PacketReader};
    use crate::core::handle_data::HandleData;
    use crate::handle_data_accessors;

    macro_rules! empty_packet {
        ($name:ident) => {
            #[derive(Debug, Default)]
            struct $name {
                handle_data: HandleData,
            }

            impl Packet for $name {
                fn write(&mut self, _buffer: &mut PacketBuffer) -> Result<()> {
                    Ok(())
                }

                fn read(&mut self, _reader: &mut PacketReader<'_>) -> Result<()> {
                    Ok(())
                }

                handle_data_accessors!(handle_data);
            }
        };
    }

    empty_packet!(LoginPacket);
    empty_packet!(ChatPacket);
    empty_packet!(KickPacket);

    #[test]
    fn test_inverse_consistency() {
        let typing = PacketTyping::<i32>::new("demo");
        typing.register::<LoginPacket>(PacketDirection::ToServer, 1).unwrap();
        typing.register::<ChatPacket>(PacketDirection::ToServer, 2).unwrap();

        let login = PacketType::of::<LoginPacket>();
        assert_eq!(typing.resolve_type(PacketDirection::ToServer, &1).unwrap(), login);
        assert_eq!(typing.resolve_key(PacketDirection::ToServer, &login).unwrap(), 1);
        assert_eq!(typing.len(PacketDirection::ToServer).unwrap(), 2);
    }

    #[test]
    fn test_directions_are_independent() {
        let typing = PacketTyping::<i32>::new("demo");
        typing.register::<LoginPacket>(PacketDirection::ToServer, 1).unwrap();
        typing.register::<KickPacket>(PacketDirection::ToClient, 1).unwrap();

        assert_eq!(
            typing.resolve_type(PacketDirection::ToClient, &1).unwrap(),
            PacketType::of::<KickPacket>()
        );
        assert!(matches!(
            typing.resolve_key(PacketDirection::ToClient, &PacketType::of::<LoginPacket>()),
            Err(ProtocolError::UnregisteredPacket { .. })
        ));
    }

    #[test]
    fn test_reregistering_type_displaces_old_key() {
        let typing = PacketTyping::<i32>::new("demo");
        typing.register::<LoginPacket>(PacketDirection::ToServer, 1).unwrap();
        typing.register::<LoginPacket>(PacketDirection::ToServer, 5).unwrap();

        assert!(matches!(
            typing.resolve_type(PacketDirection::ToServer, &1),
            Err(ProtocolError::UnknownPacketKey { .. })
        ));
        assert_eq!(
            typing
                .resolve_key(PacketDirection::ToServer, &PacketType::of::<LoginPacket>())
                .unwrap(),
            5
        );
        assert_eq!(typing.len(PacketDirection::ToServer).unwrap(), 1);
    }

    #[test]
    fn test_taken_key_displaces_old_type() {
        let typing = PacketTyping::<i32>::new("demo");
        typing.register::<LoginPacket>(PacketDirection::ToServer, 1).unwrap();
        typing.register::<ChatPacket>(PacketDirection::ToServer, 1).unwrap();

        assert_eq!(
            typing.resolve_type(PacketDirection::ToServer, &1).unwrap(),
            PacketType::of::<ChatPacket>()
        );
        assert!(typing
            .resolve_key(PacketDirection::ToServer, &PacketType::of::<LoginPacket>())
            .is_err());
    }

    #[test]
    fn test_auto_keys_follow_registration_count() {
        let typing = PacketTyping::<i32>::new("demo");
        typing.register::<KickPacket>(PacketDirection::ToClient, 0).unwrap();

        let login = typing.register_next::<LoginPacket>(PacketDirection::ToClient).unwrap();
        let chat = typing.register_next::<ChatPacket>(PacketDirection::ToClient).unwrap();
        assert_eq!((login, chat), (1, 2));

        // the other direction counts separately
        assert_eq!(
            typing.register_next::<LoginPacket>(PacketDirection::ToServer).unwrap(),
            0
        );
    }

    #[test]
    fn test_auto_keys_skip_explicitly_taken_keys() {
        let typing = PacketTyping::<i32>::new("demo");
        typing.register::<KickPacket>(PacketDirection::ToServer, 1).unwrap();

        let login = typing.register_next::<LoginPacket>(PacketDirection::ToServer).unwrap();
        let chat = typing.register_next::<ChatPacket>(PacketDirection::ToServer).unwrap();
        assert_eq!((login, chat), (2, 3));

        assert_eq!(
            typing.resolve_type(PacketDirection::ToServer, &1).unwrap(),
            PacketType::of::<KickPacket>()
        );
        assert_eq!(
            typing.resolve_type(PacketDirection::ToServer, &2).unwrap(),
            PacketType::of::<LoginPacket>()
        );
        assert_eq!(
            typing.resolve_type(PacketDirection::ToServer, &3).unwrap(),
            PacketType::of::<ChatPacket>()
        );
        assert_eq!(typing.len(PacketDirection::ToServer).unwrap(), 3);
    }

    #[test]
    fn test_auto_key_rejected_for_string_keys() {
        let typing = PacketTyping::<String>::new("demo");
        assert!(matches!(
            typing.register_next::<LoginPacket>(PacketDirection::ToServer),
            Err(ProtocolError::AutoKeyType { .. })
        ));
        assert!(typing.is_empty().unwrap());
    }
}
