//! Frame wire codec and integrity digest.
//!
//! Wire layout, big-endian integers:
//!
//! ```text
//! +---------+---------+----------+--------+------------+------------------+
//! | size    | seq     | time     | flags  | digest     | payload          |
//! | i16     | i64     | i64 (us) | u8     | 16 bytes   | payload-size     |
//! +---------+---------+----------+--------+------------+------------------+
//! ```
//!
//! The payload region is always the full negotiated payload size, zero
//! padded; `size` says how many of those bytes are meaningful. The digest is
//! MD5 over the entire encoded frame with the digest field zeroed.

use md5::{Digest, Md5};

use crate::core::constants::{DIGEST_OFFSET, DIGEST_SIZE, HANDSHAKE_PAYLOAD_SIZE, HEADER_SIZE};
use crate::core::FrameError;

use super::flags::{decode_flags, encode_flags, FrameKind, Modifiers};

/// A single unit of wire transfer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Meaningful payload bytes.
    pub size: i16,
    /// Sequence number, monotonically assigned per direction.
    pub seq: i64,
    /// Send timestamp, microseconds since the Unix epoch. Stamped by the
    /// socket just before transmission.
    pub time: i64,
    /// Frame kind.
    pub kind: FrameKind,
    /// Modifier flags.
    pub mods: Modifiers,
    /// Integrity digest over the whole frame (digest field zeroed).
    pub digest: [u8; DIGEST_SIZE],
    /// Payload region, exactly the negotiated payload size.
    pub payload: Vec<u8>,
}

impl Frame {
    /// Prepare a frame without meaningful payload: ACK, NAK, FIN and
    /// friends. Also the shared foundation for message and handshake
    /// framing; the payload region is zeroed.
    pub fn control(payload_size: usize, seq: i64, kind: FrameKind, mods: Modifiers) -> Self {
        Self {
            size: 0,
            seq,
            time: 0,
            kind,
            mods,
            digest: [0u8; DIGEST_SIZE],
            payload: vec![0u8; payload_size],
        }
    }

    /// Prepare a data frame from the head of an application byte stream.
    ///
    /// Copies up to `payload_size` bytes and sets END when the rest of the
    /// stream fits in this one frame.
    pub fn message(stream: &[u8], payload_size: usize, seq: i64) -> Self {
        let fits = stream.len() <= payload_size;
        let used = if fits { stream.len() } else { payload_size };
        let mods = if fits { Modifiers::END } else { Modifiers::NONE };

        let mut frame = Self::control(payload_size, seq, FrameKind::Msg, mods);
        frame.size = used as i16;
        frame.payload[..used].copy_from_slice(&stream[..used]);
        frame
    }

    /// Prepare a handshake frame.
    ///
    /// Handshake frames repurpose the header: `size` carries the sender's
    /// proposed payload size and the payload carries the proposed window
    /// size as decimal text. They always use the fixed pre-negotiation
    /// payload region.
    pub fn handshake(seq: i64, kind: FrameKind, payload_size: i16, window_size: i16) -> Self {
        let mut frame = Self::control(HANDSHAKE_PAYLOAD_SIZE, seq, kind, Modifiers::NONE);
        frame.size = payload_size;
        let text = window_size.to_string();
        frame.payload[..text.len()].copy_from_slice(text.as_bytes());
        frame
    }

    /// The meaningful payload bytes.
    ///
    /// Clamped to the payload region; handshake frames repurpose `size`
    /// for the payload proposal, so it may exceed the region they carry.
    pub fn body(&self) -> &[u8] {
        let used = (self.size.max(0) as usize).min(self.payload.len());
        &self.payload[..used]
    }

    /// Parse the window size proposal from a handshake frame's payload.
    pub fn proposed_window(&self) -> Option<i16> {
        let end = self.payload.iter().position(|&b| b == 0).unwrap_or(self.payload.len());
        std::str::from_utf8(&self.payload[..end]).ok()?.parse().ok()
    }

    /// The payload size proposal from a handshake frame's size field.
    pub fn proposed_payload(&self) -> i16 {
        self.size
    }

    /// Serialize to wire bytes, digest field as currently stored.
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(HEADER_SIZE + self.payload.len());
        buf.extend_from_slice(&self.size.to_be_bytes());
        buf.extend_from_slice(&self.seq.to_be_bytes());
        buf.extend_from_slice(&self.time.to_be_bytes());
        buf.push(encode_flags(self.kind, self.mods));
        buf.extend_from_slice(&self.digest);
        buf.extend_from_slice(&self.payload);
        buf
    }

    /// Parse a frame from wire bytes. The payload region is whatever
    /// follows the header, so the negotiated payload size falls out of the
    /// datagram length.
    pub fn decode(bytes: &[u8]) -> Result<Self, FrameError> {
        if bytes.len() < HEADER_SIZE {
            return Err(FrameError::TooShort {
                expected: HEADER_SIZE,
                actual: bytes.len(),
            });
        }

        let size = i16::from_be_bytes([bytes[0], bytes[1]]);
        let seq = i64::from_be_bytes(bytes[2..10].try_into().expect("8 bytes"));
        let time = i64::from_be_bytes(bytes[10..18].try_into().expect("8 bytes"));
        let (kind, mods) = decode_flags(bytes[18])?;
        let mut digest = [0u8; DIGEST_SIZE];
        digest.copy_from_slice(&bytes[DIGEST_OFFSET..DIGEST_OFFSET + DIGEST_SIZE]);
        let payload = bytes[HEADER_SIZE..].to_vec();

        // Only data frames use `size` as a payload byte count; handshake
        // frames carry the proposed payload size there, which may exceed
        // the fixed handshake payload region.
        if kind == FrameKind::Msg && size.max(0) as usize > payload.len() {
            return Err(FrameError::PayloadMismatch {
                claimed: size.max(0) as usize,
                actual: payload.len(),
            });
        }

        Ok(Self {
            size,
            seq,
            time,
            kind,
            mods,
            digest,
            payload,
        })
    }

    /// Compute the digest of this frame with the digest field zeroed.
    fn compute_digest(&self) -> [u8; DIGEST_SIZE] {
        let mut bytes = self.encode();
        bytes[DIGEST_OFFSET..DIGEST_OFFSET + DIGEST_SIZE].fill(0);
        Md5::digest(&bytes).into()
    }

    /// Store the digest of the frame's current contents.
    pub fn seal(&mut self) {
        self.digest = self.compute_digest();
    }

    /// Verify the stored digest against the frame's contents.
    ///
    /// A mismatch means corruption in transit; the frame must be treated as
    /// not received.
    pub fn verify(&self) -> bool {
        self.digest == self.compute_digest()
    }
}
