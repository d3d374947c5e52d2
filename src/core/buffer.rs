//! # Packet Buffer
//!
//! Sequential binary writer and reader used by packet `write`/`read` steps.
//!
//! ## Encoding
//! - All multi-byte integers and floats are big-endian
//! - `bool` is a single byte, `0x00` or `0x01` (any non-zero byte reads as `true`)
//! - Strings: `[Length(4)] [UTF-8 bytes]`, length counts bytes, not characters
//! - Byte blocks and serde objects: `[Length(4)] [bytes]`
//!
//! Fields must be read back in exactly the order and type they were written.
//! The reader never rewinds; reading past the end fails with
//! [`ProtocolError::Underflow`] and leaves the cursor where it was.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use serde::{de::DeserializeOwned, Serialize};

use crate::error::{ProtocolError, Result};

/// Size of every length prefix on the wire
pub const LENGTH_PREFIX_SIZE: usize = 4;

/// Growable, append-only packet writer
#[derive(Debug, Default)]
pub struct PacketBuffer {
    inner: BytesMut,
}

impl PacketBuffer {
    pub fn new() -> Self {
        Self {
            inner: BytesMut::new(),
        }
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            inner: BytesMut::with_capacity(capacity),
        }
    }

    /// Number of bytes written so far
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.inner
    }

    /// Freeze the written bytes without copying
    pub fn freeze(self) -> Bytes {
        self.inner.freeze()
    }

    pub fn write_bool(&mut self, value: bool) {
        self.inner.put_u8(u8::from(value));
    }

    pub fn write_u8(&mut self, value: u8) {
        self.inner.put_u8(value);
    }

    pub fn write_i8(&mut self, value: i8) {
        self.inner.put_i8(value);
    }

    pub fn write_u16(&mut self, value: u16) {
        self.inner.put_u16(value);
    }

    pub fn write_i16(&mut self, value: i16) {
        self.inner.put_i16(value);
    }

    pub fn write_u32(&mut self, value: u32) {
        self.inner.put_u32(value);
    }

    pub fn write_i32(&mut self, value: i32) {
        self.inner.put_i32(value);
    }

    pub fn write_u64(&mut self, value: u64) {
        self.inner.put_u64(value);
    }

    pub fn write_i64(&mut self, value: i64) {
        self.inner.put_i64(value);
    }

    pub fn write_f32(&mut self, value: f32) {
        self.inner.put_f32(value);
    }

    pub fn write_f64(&mut self, value: f64) {
        self.inner.put_f64(value);
    }

    /// Write a length-prefixed UTF-8 string
    pub fn write_string(&mut self, value: &str) -> Result<()> {
        self.write_bytes(value.as_bytes())
    }

    /// Write a length-prefixed byte block
    pub fn write_bytes(&mut self, value: &[u8]) -> Result<()> {
        let len = u32::try_from(value.len())
            .map_err(|_| ProtocolError::OversizedPacket(value.len()))?;
        self.inner.reserve(LENGTH_PREFIX_SIZE + value.len());
        self.inner.put_u32(len);
        self.inner.put_slice(value);
        Ok(())
    }

    /// Serialize a serde value with bincode into a length-prefixed block
    pub fn write_object<T: Serialize>(&mut self, value: &T) -> Result<()> {
        let encoded = bincode::serialize(value)?;
        self.write_bytes(&encoded)
    }
}

/// Cursor-tracking reader over a received message
#[derive(Debug, Clone)]
pub struct PacketReader<'a> {
    data: &'a [u8],
    position: usize,
}

impl<'a> PacketReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, position: 0 }
    }

    /// Bytes consumed so far
    pub fn position(&self) -> usize {
        self.position
    }

    /// Bytes not yet consumed
    pub fn remaining(&self) -> usize {
        self.data.len() - self.position
    }

    pub fn has_remaining(&self) -> bool {
        self.remaining() > 0
    }

    #[inline]
    fn take(&mut self, needed: usize) -> Result<&'a [u8]> {
        let remaining = self.remaining();
        if needed > remaining {
            return Err(ProtocolError::Underflow { needed, remaining });
        }
        let start = self.position;
        self.position += needed;
        Ok(&self.data[start..self.position])
    }

    pub fn read_bool(&mut self) -> Result<bool> {
        Ok(self.read_u8()? != 0)
    }

    pub fn read_u8(&mut self) -> Result<u8> {
        Ok(self.take(1)?.get_u8())
    }

    pub fn read_i8(&mut self) -> Result<i8> {
        Ok(self.take(1)?.get_i8())
    }

    pub fn read_u16(&mut self) -> Result<u16> {
        Ok(self.take(2)?.get_u16())
    }

    pub fn read_i16(&mut self) -> Result<i16> {
        Ok(self.take(2)?.get_i16())
    }

    pub fn read_u32(&mut self) -> Result<u32> {
        Ok(self.take(4)?.get_u32())
    }

    pub fn read_i32(&mut self) -> Result<i32> {
        Ok(self.take(4)?.get_i32())
    }

    pub fn read_u64(&mut self) -> Result<u64> {
        Ok(self.take(8)?.get_u64())
    }

    pub fn read_i64(&mut self) -> Result<i64> {
        Ok(self.take(8)?.get_i64())
    }

    pub fn read_f32(&mut self) -> Result<f32> {
        Ok(self.take(4)?.get_f32())
    }

    pub fn read_f64(&mut self) -> Result<f64> {
        Ok(self.take(8)?.get_f64())
    }

    /// Borrow a length-prefixed byte block without copying
    pub fn read_byte_slice(&mut self) -> Result<&'a [u8]> {
        let start = self.position;
        let len = self.read_u32()? as usize;
        match self.take(len) {
            Ok(block) => Ok(block),
            Err(err) => {
                // leave the cursor before the prefix
                self.position = start;
                Err(err)
            }
        }
    }

    pub fn read_bytes(&mut self) -> Result<Vec<u8>> {
        Ok(self.read_byte_slice()?.to_vec())
    }

    pub fn read_string(&mut self) -> Result<String> {
        let block = self.read_byte_slice()?;
        std::str::from_utf8(block)
            .map(str::to_owned)
            .map_err(|_| ProtocolError::InvalidUtf8)
    }

    /// Deserialize a bincode-encoded serde value written by [`PacketBuffer::write_object`]
    pub fn read_object<T: DeserializeOwned>(&mut self) -> Result<T> {
        let block = self.read_byte_slice()?;
        Ok(bincode::deserialize(block)?)
    }
}
