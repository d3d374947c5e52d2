//! # Protocol Layer
//!
//! Packet typing, namespaces and the codec built on them.
//!
//! ## Components
//! - **Key**: wire encoding of packet keys, auto-assignment for integral keys
//! - **Typing**: per-direction key ⇄ type registry
//! - **Namespace**: table of named registries
//! - **Codec**: encode/decode against a registry and active directions

pub mod codec;
pub mod key;
pub mod namespace;
pub mod typing;
