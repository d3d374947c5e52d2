#![no_main]

use libfuzzer_sys::fuzz_target;
use packetwire::core::buffer::{PacketBuffer, PacketReader};
use packetwire::core::direction::PacketDirection;
use packetwire::core::handle_data::HandleData;
use packetwire::core::packet::Packet;
use packetwire::handle_data_accessors;
use packetwire::protocol::codec::PacketCodec;
use packetwire::protocol::typing::PacketTyping;
use std::sync::{Arc, OnceLock};

#[derive(Debug, Default)]
struct FuzzPacket {
    name: String,
    blob: Vec<u8>,
    value: i64,
    handle_data: HandleData,
}

impl Packet for FuzzPacket {
    fn write(&mut self, buffer: &mut PacketBuffer) -> packetwire::Result<()> {
        buffer.write_string(&self.name)?;
        buffer.write_bytes(&self.blob)?;
        buffer.write_i64(self.value);
        Ok(())
    }

    fn read(&mut self, reader: &mut PacketReader<'_>) -> packetwire::Result<()> {
        self.name = reader.read_string()?;
        self.blob = reader.read_bytes()?;
        self.value = reader.read_i64()?;
        Ok(())
    }

    handle_data_accessors!(handle_data);
}

static CODEC: OnceLock<Option<PacketCodec<i32>>> = OnceLock::new();

fn codec() -> Option<&'static PacketCodec<i32>> {
    CODEC
        .get_or_init(|| {
            let typing = Arc::new(PacketTyping::<i32>::new("fuzz"));
            typing
                .register::<FuzzPacket>(PacketDirection::ToServer, 0)
                .ok()?;
            Some(PacketCodec::server(typing))
        })
        .as_ref()
}

fuzz_target!(|data: &[u8]| {
    // Fuzz message decoding - test for panics, crashes, oversized allocations
    if let Some(codec) = codec() {
        let _ = codec.decode(data);
    }
});
