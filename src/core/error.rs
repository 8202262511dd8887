//! Error types for the SRUDP protocol.

use thiserror::Error;

/// Errors that can occur while encoding or decoding a frame.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FrameError {
    /// Datagram is too short to hold a frame header.
    #[error("frame too short: expected at least {expected} bytes, got {actual}")]
    TooShort {
        /// Minimum expected size.
        expected: usize,
        /// Actual size received.
        actual: usize,
    },

    /// The flags byte does not decode to a known frame kind.
    #[error("invalid flags byte: 0x{0:02x}")]
    InvalidFlags(u8),

    /// The size field describes more payload than the frame carries.
    #[error("payload length mismatch: size field says {claimed}, frame carries {actual}")]
    PayloadMismatch {
        /// Payload length from the size field.
        claimed: usize,
        /// Payload bytes actually present.
        actual: usize,
    },
}

/// Errors surfaced by the link, handshake and socket layers.
///
/// Transient transport faults (loss, corruption, reordering, duplication)
/// never appear here; those are absorbed by the ARQ engine. What remains is
/// socket setup failure and task plumbing.
#[derive(Debug, Error)]
pub enum LinkError {
    /// Underlying socket I/O failed.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// A frame failed to decode.
    #[error("frame error: {0}")]
    Frame(#[from] FrameError),

    /// A background task panicked or was cancelled.
    #[error("task failed: {0}")]
    Task(#[from] tokio::task::JoinError),

    /// Operation attempted on a link whose dispatcher already shut down.
    #[error("link closed")]
    Closed,
}

/// Convenience result alias for link operations.
pub type LinkResult<T> = Result<T, LinkError>;
