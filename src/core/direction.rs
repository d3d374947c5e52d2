//! Packet Direction
//!
//! The two flows a packet type can be registered for.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Which endpoint a packet type flows toward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PacketDirection {
    /// Client-to-server traffic
    ToServer,
    /// Server-to-client traffic
    ToClient,
}

impl PacketDirection {
    /// Both directions, in table order
    pub const ALL: [PacketDirection; 2] = [PacketDirection::ToServer, PacketDirection::ToClient];

    /// The direction traffic flows back in
    pub fn opposite(self) -> Self {
        match self {
            PacketDirection::ToServer => PacketDirection::ToClient,
            PacketDirection::ToClient => PacketDirection::ToServer,
        }
    }

    pub(crate) fn index(self) -> usize {
        match self {
            PacketDirection::ToServer => 0,
            PacketDirection::ToClient => 1,
        }
    }
}

impl fmt::Display for PacketDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PacketDirection::ToServer => f.write_str("TO_SERVER"),
            PacketDirection::ToClient => f.write_str("TO_CLIENT"),
        }
    }
}
