//! # Packet Keys
//!
//! The wire-level discriminator written ahead of every packet's fields.
//!
//! Integral keys are written at their fixed width (`i32` is the usual choice,
//! four big-endian bytes). `String` keys are written like any string field,
//! with a 4-byte length prefix. Only integral keys support auto-assignment.

use std::fmt;
use std::hash::Hash;

use crate::core::buffer::{PacketBuffer, PacketReader};
use crate::error::constants::{ERR_AUTO_KEY_NOT_INTEGRAL, ERR_AUTO_KEY_OVERFLOW};
use crate::error::{ProtocolError, Result};

/// A type usable as a packet key
pub trait PacketKey:
    Clone + Eq + Hash + fmt::Debug + fmt::Display + Send + Sync + 'static
{
    /// Name used in namespace lookups and error messages
    const TYPE_NAME: &'static str;

    fn write_key(&self, buffer: &mut PacketBuffer) -> Result<()>;

    fn read_key(reader: &mut PacketReader<'_>) -> Result<Self>;

    /// Derive a key from a registration count.
    ///
    /// Fails with [`ProtocolError::AutoKeyType`] for non-integral keys.
    fn from_index(_index: usize) -> Result<Self> {
        Err(ProtocolError::AutoKeyType {
            key_type: Self::TYPE_NAME,
            reason: ERR_AUTO_KEY_NOT_INTEGRAL,
        })
    }
}

macro_rules! integral_key {
    ($ty:ty, $write:ident, $read:ident) => {
        impl PacketKey for $ty {
            const TYPE_NAME: &'static str = stringify!($ty);

            #[inline]
            fn write_key(&self, buffer: &mut PacketBuffer) -> Result<()> {
                buffer.$write(*self);
                Ok(())
            }

            #[inline]
            fn read_key(reader: &mut PacketReader<'_>) -> Result<Self> {
                reader.$read()
            }

            fn from_index(index: usize) -> Result<Self> {
                <$ty>::try_from(index).map_err(|_| ProtocolError::AutoKeyType {
                    key_type: Self::TYPE_NAME,
                    reason: ERR_AUTO_KEY_OVERFLOW,
                })
            }
        }
    };
}

integral_key!(u8, write_u8, read_u8);
integral_key!(i8, write_i8, read_i8);
integral_key!(u16, write_u16, read_u16);
integral_key!(i16, write_i16, read_i16);
integral_key!(u32, write_u32, read_u32);
integral_key!(i32, write_i32, read_i32);
integral_key!(u64, write_u64, read_u64);
integral_key!(i64, write_i64, read_i64);

impl PacketKey for String {
    const TYPE_NAME: &'static str = "String";

    fn write_key(&self, buffer: &mut PacketBuffer) -> Result<()> {
        buffer.write_string(self)
    }

    fn read_key(reader: &mut PacketReader<'_>) -> Result<Self> {
        reader.read_string()
    }
}
