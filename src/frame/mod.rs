//! Frame codec: wire layout, flag encode/decode, integrity digest.

mod codec;
mod flags;

pub use codec::Frame;
pub use flags::{decode_flags, encode_flags, FrameKind, Modifiers};
