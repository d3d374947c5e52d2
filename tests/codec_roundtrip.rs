#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
//! Packet codec behavior: wire layout, direction checks, error cases
//! Exercises the public API the way an application would use it

use packetwire::core::buffer::{PacketBuffer, PacketReader};
use packetwire::core::direction::PacketDirection;
use packetwire::core::handle_data::HandleData;
use packetwire::core::packet::Packet;
use packetwire::error::{ProtocolError, Result};
use packetwire::handle_data_accessors;
use packetwire::protocol::codec::{PacketCodec, PacketCodecManager};
use packetwire::protocol::typing::PacketTyping;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Debug, Default)]
struct GreetingPacket {
    text: String,
    handle_data: HandleData,
}

impl Packet for GreetingPacket {
    fn write(&mut self, buffer: &mut PacketBuffer) -> Result<()> {
        buffer.write_string(&self.text)
    }

    fn read(&mut self, reader: &mut PacketReader<'_>) -> Result<()> {
        self.text = reader.read_string()?;
        Ok(())
    }

    handle_data_accessors!(handle_data);
}

#[derive(Debug, Default)]
struct MovePacket {
    entity: u32,
    x: f64,
    y: f64,
    on_ground: bool,
    handle_data: HandleData,
}

impl Packet for MovePacket {
    fn write(&mut self, buffer: &mut PacketBuffer) -> Result<()> {
        buffer.write_u32(self.entity);
        buffer.write_f64(self.x);
        buffer.write_f64(self.y);
        buffer.write_bool(self.on_ground);
        Ok(())
    }

    fn read(&mut self, reader: &mut PacketReader<'_>) -> Result<()> {
        self.entity = reader.read_u32()?;
        self.x = reader.read_f64()?;
        self.y = reader.read_f64()?;
        self.on_ground = reader.read_bool()?;
        Ok(())
    }

    handle_data_accessors!(handle_data);
}

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
struct Slot {
    item: String,
    count: u16,
}

#[derive(Debug, Default)]
struct InventoryPacket {
    slots: Vec<Slot>,
    handle_data: HandleData,
}

impl Packet for InventoryPacket {
    fn write(&mut self, buffer: &mut PacketBuffer) -> Result<()> {
        buffer.write_object(&self.slots)
    }

    fn read(&mut self, reader: &mut PacketReader<'_>) -> Result<()> {
        self.slots = reader.read_object()?;
        Ok(())
    }

    handle_data_accessors!(handle_data);
}

#[derive(Debug, Default)]
struct PingPacket {
    handle_data: HandleData,
}

impl Packet for PingPacket {
    fn write(&mut self, _buffer: &mut PacketBuffer) -> Result<()> {
        Ok(())
    }

    fn read(&mut self, _reader: &mut PacketReader<'_>) -> Result<()> {
        Ok(())
    }

    handle_data_accessors!(handle_data);
}

fn greeting(text: &str) -> GreetingPacket {
    GreetingPacket {
        text: text.to_string(),
        handle_data: HandleData::new(),
    }
}

fn registry() -> Arc<PacketTyping<i32>> {
    let typing = Arc::new(PacketTyping::new("codec-tests"));
    typing
        .register::<GreetingPacket>(PacketDirection::ToServer, 1)
        .unwrap();
    typing
        .register::<MovePacket>(PacketDirection::ToServer, 2)
        .unwrap();
    typing
        .register::<PingPacket>(PacketDirection::ToServer, 3)
        .unwrap();
    typing
        .register::<InventoryPacket>(PacketDirection::ToClient, 1)
        .unwrap();
    typing
}

// ============================================================================
// WIRE LAYOUT
// ============================================================================

#[test]
fn test_greeting_wire_layout() {
    let client = PacketCodec::client(registry());
    let bytes = client.encode(&mut greeting("hi")).unwrap();
    assert_eq!(&bytes[..], &[0, 0, 0, 1, 0, 0, 0, 2, b'h', b'i']);
}

#[test]
fn test_empty_packet_is_key_only() {
    let client = PacketCodec::client(registry());
    let bytes = client.encode(&mut PingPacket::default()).unwrap();
    assert_eq!(&bytes[..], &[0, 0, 0, 3]);

    let server = PacketCodec::server(registry());
    let decoded = server.decode(&bytes).unwrap();
    assert!(decoded.is::<PingPacket>());
}

#[test]
fn test_multibyte_string_length_counts_bytes() {
    let client = PacketCodec::client(registry());
    let bytes = client.encode(&mut greeting("héllo")).unwrap();
    // 'é' is two bytes in UTF-8
    assert_eq!(&bytes[4..8], &[0, 0, 0, 6]);

    let decoded = PacketCodec::server(registry()).decode(&bytes).unwrap();
    assert_eq!(
        decoded.downcast_ref::<GreetingPacket>().unwrap().text,
        "héllo"
    );
}

// ============================================================================
// ROUND TRIPS
// ============================================================================

#[test]
fn test_primitive_fields_roundtrip() {
    let typing = registry();
    let client = PacketCodec::client(typing.clone());
    let server = PacketCodec::server(typing);

    let mut packet = MovePacket {
        entity: 42,
        x: -12.5,
        y: 1e10,
        on_ground: true,
        handle_data: HandleData::new(),
    };
    let bytes = client.encode(&mut packet).unwrap();
    assert_eq!(bytes.len(), 4 + 4 + 8 + 8 + 1);

    let decoded = server.decode(&bytes).unwrap();
    let decoded = decoded.downcast::<MovePacket>().unwrap();
    assert_eq!(decoded.entity, 42);
    assert_eq!(decoded.x, -12.5);
    assert_eq!(decoded.y, 1e10);
    assert!(decoded.on_ground);
}

#[test]
fn test_object_field_roundtrip() {
    let typing = registry();
    let server = PacketCodec::server(typing.clone());
    let client = PacketCodec::client(typing);

    let slots = vec![
        Slot {
            item: "torch".to_string(),
            count: 16,
        },
        Slot {
            item: "rope".to_string(),
            count: 1,
        },
    ];
    let mut packet = InventoryPacket {
        slots: slots.clone(),
        handle_data: HandleData::new(),
    };
    let bytes = server.encode(&mut packet).unwrap();
    let decoded = client.decode(&bytes).unwrap();
    assert_eq!(decoded.downcast_ref::<InventoryPacket>().unwrap().slots, slots);
}

#[test]
fn test_decoded_packet_has_fresh_handle_data() {
    let typing = registry();
    let client = PacketCodec::client(typing.clone());

    let mut packet = greeting("hello");
    packet.handle_data.insert("sent_at", 1234u64);
    let bytes = client.encode(&mut packet).unwrap();

    let decoded = PacketCodec::server(typing).decode(&bytes).unwrap();
    assert!(decoded.handle_data().is_empty());
    assert_eq!(packet.handle_data.get::<u64>("sent_at"), Some(&1234));
}

// ============================================================================
// DIRECTIONS
// ============================================================================

#[test]
fn test_same_key_in_both_directions() {
    let typing = registry();
    // key 1 is GreetingPacket ToServer and InventoryPacket ToClient
    let server = PacketCodec::server(typing.clone());
    let client = PacketCodec::client(typing);

    let to_server = client.encode(&mut greeting("a")).unwrap();
    assert!(server.decode(&to_server).unwrap().is::<GreetingPacket>());

    let to_client = server.encode(&mut InventoryPacket::default()).unwrap();
    assert!(client.decode(&to_client).unwrap().is::<InventoryPacket>());
}

#[test]
fn test_encode_unregistered_direction() {
    let server = PacketCodec::server(registry());
    match server.encode(&mut greeting("nope")) {
        Err(ProtocolError::UnregisteredPacket {
            namespace,
            direction,
            packet,
        }) => {
            assert_eq!(namespace, "codec-tests");
            assert_eq!(direction, PacketDirection::ToClient);
            assert!(packet.contains("GreetingPacket"));
        }
        other => panic!("expected UnregisteredPacket, got {other:?}"),
    }
}

#[test]
fn test_codec_direction_setters() {
    let mut codec = PacketCodec::server(registry());
    codec.set_encode_direction(PacketDirection::ToServer);
    codec.set_decode_direction(PacketDirection::ToServer);

    let bytes = codec.encode(&mut greeting("loop")).unwrap();
    assert!(codec.decode(&bytes).unwrap().is::<GreetingPacket>());
}

// ============================================================================
// DECODE ERRORS
// ============================================================================

#[test]
fn test_unknown_key() {
    let server = PacketCodec::server(registry());
    match server.decode(&[0, 0, 0, 99]) {
        Err(ProtocolError::UnknownPacketKey {
            key, direction, ..
        }) => {
            assert_eq!(key, "99");
            assert_eq!(direction, PacketDirection::ToServer);
        }
        other => panic!("expected UnknownPacketKey, got {other:?}"),
    }
}

#[test]
fn test_truncated_key() {
    let server = PacketCodec::server(registry());
    assert!(matches!(
        server.decode(&[0, 0]),
        Err(ProtocolError::Underflow {
            needed: 4,
            remaining: 2
        })
    ));
    assert!(matches!(
        server.decode(&[]),
        Err(ProtocolError::Underflow { .. })
    ));
}

#[test]
fn test_truncated_fields() {
    let server = PacketCodec::server(registry());
    // greeting claims a 5-byte string but only carries 2
    let result = server.decode(&[0, 0, 0, 1, 0, 0, 0, 5, b'h', b'i']);
    assert!(matches!(result, Err(ProtocolError::Underflow { .. })));
}

#[test]
fn test_invalid_utf8_string() {
    let server = PacketCodec::server(registry());
    let result = server.decode(&[0, 0, 0, 1, 0, 0, 0, 2, 0xFF, 0xFE]);
    assert!(matches!(result, Err(ProtocolError::InvalidUtf8)));
}

#[test]
fn test_trailing_bytes_are_tolerated() {
    let server = PacketCodec::server(registry());
    let decoded = server
        .decode(&[0, 0, 0, 1, 0, 0, 0, 1, b'x', 0xAA, 0xBB])
        .unwrap();
    assert_eq!(decoded.downcast_ref::<GreetingPacket>().unwrap().text, "x");
}

// ============================================================================
// CODEC MANAGER
// ============================================================================

#[test]
fn test_manager_integer_and_string_registries_are_separate() {
    let manager = PacketCodecManager::default();
    manager
        .typing_by_integer()
        .register::<GreetingPacket>(PacketDirection::ToServer, 7)
        .unwrap();
    manager
        .typing_by_string()
        .register::<GreetingPacket>(PacketDirection::ToServer, "greet".to_string())
        .unwrap();

    let client = manager.clone().client();
    let int_bytes = client.integer_codec().encode(&mut greeting("i")).unwrap();
    let str_bytes = client.string_codec().encode(&mut greeting("s")).unwrap();
    assert_eq!(&int_bytes[..4], &[0, 0, 0, 7]);
    assert_eq!(&str_bytes[..9], &[0, 0, 0, 5, b'g', b'r', b'e', b'e', b't']);

    let server_int = manager.integer_codec().decode(&int_bytes).unwrap();
    let server_str = manager.string_codec().decode(&str_bytes).unwrap();
    assert_eq!(server_int.downcast_ref::<GreetingPacket>().unwrap().text, "i");
    assert_eq!(server_str.downcast_ref::<GreetingPacket>().unwrap().text, "s");

    // the integer codec cannot read string-keyed messages
    assert!(manager.integer_codec().decode(&str_bytes).is_err());
}
