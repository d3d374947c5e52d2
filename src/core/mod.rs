//! # Core Packet Components
//!
//! Packet definitions and the binary plumbing underneath them.
//!
//! ## Components
//! - **Buffer**: sequential big-endian writer/reader used by packet fields
//! - **Direction**: server-bound vs client-bound tag
//! - **Handle Data**: sender-local, never-serialized scratch store
//! - **Packet**: the `write`/`read`/`handle` trait and its registry descriptor
//! - **Frame**: length-prefixed framing for byte-stream transports
//!
//! ## Wire Format
//! ```text
//! [Length(4)] [Key(K)] [Fields(N)]
//! ```
//! The length prefix belongs to the stream framing; the codec sees only
//! `[Key][Fields]`.

pub mod buffer;
pub mod direction;
pub mod frame;
pub mod handle_data;
pub mod packet;
