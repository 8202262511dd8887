//! Sequence tracker.
//!
//! Four monotonic counters bound the valid send and receive windows. Each
//! endpoint maintains one tracker per link.

/// Window edges for both directions.
///
/// Invariants: `send_next <= send_last + 1` and `recv_next <= recv_last + 1`;
/// each window spans at most the negotiated window size.
#[derive(Debug, Clone)]
pub struct SequenceTracker {
    /// Oldest unacknowledged sent sequence (left edge of the send window).
    pub send_next: i64,
    /// Highest sequence sent so far.
    pub send_last: i64,
    /// Oldest sequence not yet delivered to the application (left edge of
    /// the receive window).
    pub recv_next: i64,
    /// Highest sequence received so far.
    pub recv_last: i64,
}

impl SequenceTracker {
    /// Create a tracker from the handshake baselines: the first sequence we
    /// will send and the last sequence observed from the peer.
    pub fn new(initial_send: i64, peer_last: i64) -> Self {
        Self {
            send_next: initial_send,
            send_last: 0,
            recv_next: peer_last + 1,
            recv_last: 0,
        }
    }

    /// True iff `seq` falls inside the send window.
    pub fn in_send_span(&self, seq: i64, window: usize) -> bool {
        in_span(seq, self.send_next, window)
    }

    /// True iff `seq` falls inside the receive window.
    pub fn in_recv_span(&self, seq: i64, window: usize) -> bool {
        in_span(seq, self.recv_next, window)
    }
}

/// Window membership check: `0 <= seq - offset < window`.
///
/// Rejects frames that are too old (already acknowledged or delivered) and
/// frames too far ahead (the sender would be violating the window contract).
pub fn in_span(seq: i64, offset: i64, window: usize) -> bool {
    let idx = seq - offset;
    idx >= 0 && (idx as usize) < window
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_in_span_edges() {
        assert!(in_span(100, 100, 4));
        assert!(in_span(103, 100, 4));
        assert!(!in_span(104, 100, 4));
        assert!(!in_span(99, 100, 4));
    }

    #[test]
    fn test_tracker_baselines() {
        let tracker = SequenceTracker::new(500, 900);
        assert_eq!(tracker.send_next, 500);
        assert_eq!(tracker.recv_next, 901);
        assert!(tracker.in_send_span(500, 8));
        assert!(tracker.in_recv_span(901, 8));
        assert!(!tracker.in_recv_span(900, 8));
    }
}
