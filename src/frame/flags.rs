//! Frame kind and modifier flags.
//!
//! The wire carries a single flags byte: the low nibble selects the frame
//! kind, the bits 0x10..=0x40 are independent modifiers. Both are decoded
//! into typed values at the wire boundary and never manipulated as raw bits
//! elsewhere.

use crate::core::FrameError;

/// Frame kind, from the low nibble of the flags byte.
///
/// `SynAck` and `FinAck` are the two legal kind combinations used by the
/// handshake and teardown exchanges; every other nibble value is a decode
/// error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum FrameKind {
    /// Application data fragment.
    Msg = 0,
    /// Negative acknowledgment (a sequence is missing).
    Nak = 1,
    /// Acknowledgment of a received sequence.
    Ack = 2,
    /// Handshake open.
    Syn = 4,
    /// Handshake reply.
    SynAck = 6,
    /// Teardown open.
    Fin = 8,
    /// Teardown reply.
    FinAck = 10,
}

impl FrameKind {
    /// Parse a frame kind from the low nibble of a flags byte.
    pub fn from_nibble(nibble: u8) -> Option<Self> {
        match nibble {
            0 => Some(Self::Msg),
            1 => Some(Self::Nak),
            2 => Some(Self::Ack),
            4 => Some(Self::Syn),
            6 => Some(Self::SynAck),
            8 => Some(Self::Fin),
            10 => Some(Self::FinAck),
            _ => None,
        }
    }

    /// Byte representation (low nibble of the flags byte).
    pub fn as_byte(self) -> u8 {
        self as u8
    }
}

/// Modifier flags carried in the upper bits of the flags byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Modifiers(u8);

impl Modifiers {
    /// No modifiers set.
    pub const NONE: Self = Self(0);
    /// Last fragment of a message.
    pub const END: Self = Self(0x10);
    /// Explicit retransmission request.
    pub const REQ: Self = Self(0x20);
    /// This frame is a retransmission.
    pub const RES: Self = Self(0x40);

    /// All modifier bits.
    const MASK: u8 = 0x70;

    /// Raw byte value (upper bits of the flags byte).
    pub fn as_byte(self) -> u8 {
        self.0
    }

    /// Check if END is set.
    pub fn is_end(self) -> bool {
        self.0 & Self::END.0 != 0
    }

    /// Check if REQ is set.
    pub fn is_req(self) -> bool {
        self.0 & Self::REQ.0 != 0
    }

    /// Check if RES is set.
    pub fn is_res(self) -> bool {
        self.0 & Self::RES.0 != 0
    }

    /// Union with another modifier set.
    pub fn with(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }
}

/// Combine a kind and modifier set into the wire flags byte.
pub fn encode_flags(kind: FrameKind, mods: Modifiers) -> u8 {
    kind.as_byte() | mods.as_byte()
}

/// Split a wire flags byte into kind and modifiers.
///
/// Rejects unknown kind nibbles and any set bit outside the known layout.
pub fn decode_flags(byte: u8) -> Result<(FrameKind, Modifiers), FrameError> {
    if byte & !(0x0F | Modifiers::MASK) != 0 {
        return Err(FrameError::InvalidFlags(byte));
    }
    let kind = FrameKind::from_nibble(byte & 0x0F).ok_or(FrameError::InvalidFlags(byte))?;
    Ok((kind, Modifiers(byte & Modifiers::MASK)))
}
