//! # Stream Framing
//!
//! Recovers message boundaries on byte-stream transports.
//!
//! The packet codec works on whole messages. TCP does not preserve them, so the
//! session layer wraps each encoded message in a length prefix:
//! ```text
//! [Length(4)] [Message(N)]
//! ```
//! The length is big-endian and excludes itself. Frames above the configured
//! maximum are rejected before any allocation.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use crate::config::MAX_FRAME_SIZE;
use crate::error::{ProtocolError, Result};

/// Size of the frame header
pub const FRAME_HEADER_SIZE: usize = 4;

/// Length-prefixed framing for tokio `Framed` streams
#[derive(Debug, Clone, Copy)]
pub struct FrameCodec {
    max_frame_size: usize,
}

impl Default for FrameCodec {
    fn default() -> Self {
        Self::new(MAX_FRAME_SIZE)
    }
}

impl FrameCodec {
    pub fn new(max_frame_size: usize) -> Self {
        Self { max_frame_size }
    }

    pub fn max_frame_size(&self) -> usize {
        self.max_frame_size
    }
}

impl Decoder for FrameCodec {
    type Item = Bytes;
    type Error = ProtocolError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>> {
        if src.len() < FRAME_HEADER_SIZE {
            return Ok(None);
        }

        let mut header = [0u8; FRAME_HEADER_SIZE];
        header.copy_from_slice(&src[..FRAME_HEADER_SIZE]);
        let length = u32::from_be_bytes(header) as usize;

        if length > self.max_frame_size {
            return Err(ProtocolError::OversizedPacket(length));
        }

        let total = FRAME_HEADER_SIZE + length;
        if src.len() < total {
            // Reserve once so the rest of the frame lands without reallocating
            src.reserve(total - src.len());
            return Ok(None);
        }

        src.advance(FRAME_HEADER_SIZE);
        Ok(Some(src.split_to(length).freeze()))
    }
}

impl Encoder<Bytes> for FrameCodec {
    type Error = ProtocolError;

    fn encode(&mut self, item: Bytes, dst: &mut BytesMut) -> Result<()> {
        if item.len() > self.max_frame_size {
            return Err(ProtocolError::OversizedPacket(item.len()));
        }
        let length =
            u32::try_from(item.len()).map_err(|_| ProtocolError::OversizedPacket(item.len()))?;

        dst.reserve(FRAME_HEADER_SIZE + item.len());
        dst.put_u32(length);
        dst.put_slice(&item);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]
    use super::*;

    #[test]
    fn test_frame_roundtrip() {
        let mut codec = FrameCodec::default();
        let mut buf = BytesMut::new();
        codec
            .encode(Bytes::from_static(b"payload"), &mut buf)
            .unwrap();

        assert_eq!(buf.len(), FRAME_HEADER_SIZE + 7);
        let frame = codec.decode(&mut buf).unwrap().expect("complete frame");
        assert_eq!(&frame[..], b"payload");
        assert!(buf.is_empty());
    }

    #[test]
    fn test_oversized_frame_rejected_on_both_sides() {
        let mut codec = FrameCodec::new(8);
        let mut buf = BytesMut::new();
        assert!(matches!(
            codec.encode(Bytes::from(vec![0u8; 9]), &mut buf),
            Err(ProtocolError::OversizedPacket(9))
        ));

        let mut incoming = BytesMut::from(&[0u8, 0, 0, 64][..]);
        assert!(matches!(
            codec.decode(&mut incoming),
            Err(ProtocolError::OversizedPacket(64))
        ));
    }
}
