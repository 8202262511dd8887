//! Protocol constants.
//!
//! Defaults match the reference wire deployment; the window, payload and
//! timeout values are only starting proposals and are replaced by the
//! handshake-negotiated parameters.

use std::time::Duration;

// =============================================================================
// WIRE FORMAT
// =============================================================================

/// Integrity digest size (MD5, fixed by the wire format).
pub const DIGEST_SIZE: usize = 16;

/// Frame header size: size(2) + seq(8) + time(8) + flags(1) + digest(16).
pub const HEADER_SIZE: usize = 2 + 8 + 8 + 1 + DIGEST_SIZE;

/// Byte offset of the digest field inside an encoded frame.
pub const DIGEST_OFFSET: usize = 2 + 8 + 8 + 1;

/// Payload size used by handshake frames, before any payload size has been
/// negotiated. Large enough to hold a window proposal as decimal text.
pub const HANDSHAKE_PAYLOAD_SIZE: usize = 16;

/// Upper bound on a received datagram (header plus the largest payload the
/// `i16` size field can describe).
pub const MAX_DATAGRAM_SIZE: usize = HEADER_SIZE + i16::MAX as usize;

// =============================================================================
// DEFAULTS
// =============================================================================

/// Default UDP port.
pub const DEFAULT_PORT: u16 = 5555;

/// Default window size proposal, in frames.
pub const DEFAULT_WINDOW_SIZE: usize = 16;

/// Default payload size proposal, in bytes.
pub const DEFAULT_PAYLOAD_SIZE: usize = 32;

/// Default retransmission/receive timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_micros(60_000);

/// Retry cap for each phase of the FIN/FIN|ACK/ACK teardown exchange.
pub const TEARDOWN_MAX_RETRIES: u32 = 16;

/// Sleep between ARQ watchdog scans.
pub const WATCHDOG_INTERVAL: Duration = Duration::from_micros(20_000);

/// Smallest window or payload proposal a peer may make; anything below is
/// ignored in favor of the local proposal.
pub const MIN_PROPOSAL: usize = 2;
