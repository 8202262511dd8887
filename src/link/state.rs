//! Shared link state.
//!
//! One instance per link, behind the single coarse lock shared by the event
//! dispatcher and the two ARQ watchdogs. Everything that touches the
//! tracker or the window buffers lives here, so each caller's critical
//! section is one method call.

use std::collections::VecDeque;
use std::time::Duration;

use crate::frame::{Frame, FrameKind, Modifiers};
use crate::transport::{clock, Session};
use crate::window::{in_span, SequenceTracker, WindowBuffer};

/// Window buffers, tracker and outbound queue for one link.
#[derive(Debug)]
pub(crate) struct LinkState {
    /// Window edges for both directions.
    pub tracker: SequenceTracker,
    /// Copies of sent-but-unacknowledged frames, for retransmission.
    pub send_buf: WindowBuffer,
    /// Acknowledgments received, aligned to the send buffer.
    pub ack_buf: WindowBuffer,
    /// Frames received but not yet deliverable in order.
    pub recv_buf: WindowBuffer,
    /// Negotiated window size, in frames.
    pub window: usize,
    /// Negotiated payload size, in bytes.
    pub payload: usize,
    /// Retransmission/staleness timeout.
    pub timeout: Duration,
    /// Next sequence number to assign to an outbound frame.
    pub send_seq: i64,
    /// Frames currently occupying send-window slots.
    pub in_flight: usize,
    /// Queued outbound messages; the front entry may be the tail of a
    /// partially sent message.
    pending: VecDeque<Vec<u8>>,
    /// In-order payload bytes accumulated until an END fragment completes
    /// the message.
    reassembly: Vec<u8>,
}

impl LinkState {
    pub fn new(session: &Session, timeout: Duration) -> Self {
        let window = session.negotiated.window;
        Self {
            tracker: SequenceTracker::new(session.next_send_seq, session.peer_last_seq),
            send_buf: WindowBuffer::new(window),
            ack_buf: WindowBuffer::new(window),
            recv_buf: WindowBuffer::new(window),
            window,
            payload: session.negotiated.payload,
            timeout,
            send_seq: session.next_send_seq,
            in_flight: 0,
            pending: VecDeque::new(),
            reassembly: Vec::new(),
        }
    }

    // -------------------------------------------------------------------
    // Outbound: segmentation and the send window
    // -------------------------------------------------------------------

    /// Queue one application message for transmission.
    pub fn queue_message(&mut self, message: Vec<u8>) {
        self.pending.push_back(message);
    }

    /// Whether queued data is waiting for window space.
    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }

    /// Produce the next outbound data frame, or `None` when the window is
    /// full or nothing is queued.
    ///
    /// Splits messages across consecutive frames, one sequence number each;
    /// END is set only on a message's final fragment. The caller must
    /// transmit the frame and hand the stamped copy back to
    /// [`record_sent`](Self::record_sent).
    pub fn next_outbound(&mut self) -> Option<Frame> {
        if self.in_flight >= self.window {
            return None;
        }
        let message = self.pending.pop_front()?;

        let frame = Frame::message(&message, self.payload, self.send_seq);
        self.send_seq += 1;

        if message.len() > self.payload {
            // The rest of the message goes back to the front of the queue.
            self.pending.push_front(message[self.payload..].to_vec());
        }
        Some(frame)
    }

    /// Store a copy of a transmitted frame for potential retransmission and
    /// advance the send-side high-water mark.
    pub fn record_sent(&mut self, frame: Frame) {
        self.tracker.send_last = frame.seq;
        self.send_buf.insert(frame, self.tracker.send_next);
        self.in_flight += 1;
    }

    /// Handle an inbound acknowledgment: store it if it is within the send
    /// window and slide the window for every contiguous ack from the left
    /// edge. Out-of-span acks (stale duplicates) are ignored.
    pub fn accept_ack(&mut self, frame: Frame) {
        if !self.tracker.in_send_span(frame.seq, self.window) {
            return;
        }
        self.ack_buf.insert(frame, self.tracker.send_next);
        self.slide_send();
    }

    /// Advance the send window while the ack buffer head matches
    /// `send_next`. An ack for a later frame with an earlier one still
    /// outstanding stays stored without advancing the base.
    ///
    /// The send buffer head must hold the matching frame as well: an ack
    /// for an in-span sequence that was never sent (noise, or a stray
    /// handshake ACK) must not advance the base past unsent sequences.
    fn slide_send(&mut self) {
        while self
            .ack_buf
            .head()
            .is_some_and(|ack| ack.seq == self.tracker.send_next)
            && self
                .send_buf
                .head()
                .is_some_and(|sent| sent.seq == self.tracker.send_next)
        {
            self.send_buf.slide();
            self.ack_buf.slide();
            self.tracker.send_next += 1;
            self.in_flight -= 1;
        }
    }

    /// Look up a sent frame for an explicit retransmission request. The
    /// stored copy's timestamp is refreshed so the retransmit watchdog does
    /// not immediately resend it again.
    pub fn resend_for(&mut self, seq: i64, now: i64) -> Option<Frame> {
        if !self.tracker.in_send_span(seq, self.window) {
            return None;
        }
        let idx = (seq - self.tracker.send_next) as usize;
        let frame = self.send_buf.get_mut(idx)?;
        frame.time = now;
        Some(frame.clone())
    }

    // -------------------------------------------------------------------
    // Inbound: receive window and reassembly
    // -------------------------------------------------------------------

    /// Handle an inbound data frame.
    ///
    /// In-window frames are stored at their window-relative index (duplicate
    /// arrivals overwrite idempotently) and every message completed by the
    /// slide is returned in order. Out-of-span frames return nothing; the
    /// caller still acknowledges them so a lost ACK cannot stall the peer.
    pub fn accept_msg(&mut self, mut frame: Frame, arrival: i64) -> Vec<Vec<u8>> {
        if !self.tracker.in_recv_span(frame.seq, self.window) {
            return Vec::new();
        }
        // Staleness for gap detection is judged against the local arrival
        // time, not the peer's send stamp, so clock skew cannot mute it.
        frame.time = arrival;

        if frame.seq > self.tracker.recv_last {
            self.tracker.recv_last = frame.seq;
        }
        self.recv_buf.insert(frame, self.tracker.recv_next);
        self.slide_recv()
    }

    /// Advance the receive window while the buffer head matches
    /// `recv_next`, appending payloads to the reassembly buffer and
    /// completing a message at every END fragment.
    fn slide_recv(&mut self) -> Vec<Vec<u8>> {
        let mut delivered = Vec::new();
        while self
            .recv_buf
            .head()
            .is_some_and(|frame| frame.seq == self.tracker.recv_next)
        {
            let frame = self.recv_buf.slide().expect("head checked above");
            self.reassembly.extend_from_slice(frame.body());
            if frame.mods.is_end() {
                delivered.push(std::mem::take(&mut self.reassembly));
            }
            self.tracker.recv_next += 1;
        }
        delivered
    }

    // -------------------------------------------------------------------
    // ARQ scans (called by the watchdogs, under the same lock)
    // -------------------------------------------------------------------

    /// Collect every outstanding frame whose ack is missing and whose send
    /// timestamp has exceeded the timeout. Each is marked RES and its
    /// stored timestamp refreshed, so one timeout yields one resend.
    pub fn stale_retransmits(&mut self, now: i64) -> Vec<Frame> {
        if !in_span(self.tracker.send_last, self.tracker.send_next, self.window) {
            return Vec::new();
        }
        let last_idx = (self.tracker.send_last - self.tracker.send_next) as usize;

        let mut resend = Vec::new();
        for idx in 0..=last_idx {
            let acked = self.ack_buf.get(idx).map(|ack| ack.seq);
            let Some(sent) = self.send_buf.get_mut(idx) else {
                continue;
            };
            if acked == Some(sent.seq) {
                continue;
            }
            if clock::expired(sent.time, self.timeout, now) {
                sent.mods = sent.mods.with(Modifiers::RES);
                sent.time = now;
                resend.push(sent.clone());
            }
        }
        resend
    }

    /// Detect receive-window gaps and return the missing sequence numbers,
    /// each to be requested with NAK|REQ.
    ///
    /// Scans only when the newest in-window frame is itself stale: while
    /// new frames keep arriving, natural gap detection through the slide is
    /// imminent and requests would only add noise.
    pub fn gap_requests(&self, now: i64) -> Vec<i64> {
        if !in_span(self.tracker.recv_last, self.tracker.recv_next, self.window) {
            return Vec::new();
        }
        let last_idx = (self.tracker.recv_last - self.tracker.recv_next) as usize;

        let newest_stale = self
            .recv_buf
            .get(last_idx)
            .is_some_and(|frame| clock::expired(frame.time, self.timeout, now));
        if !newest_stale {
            return Vec::new();
        }

        let mut missing = Vec::new();
        for idx in 0..=last_idx {
            let expect = self.tracker.recv_next + idx as i64;
            match self.recv_buf.get(idx) {
                Some(frame) if frame.seq == expect => {}
                _ => missing.push(expect),
            }
        }
        missing
    }

    /// Build the NAK|REQ frame for one missing sequence.
    pub fn gap_request_frame(&self, seq: i64) -> Frame {
        Frame::control(
            self.payload,
            seq,
            FrameKind::Nak,
            Modifiers::REQ,
        )
    }

    /// Build the ACK reply for a received data frame.
    pub fn ack_frame(&self, seq: i64) -> Frame {
        Frame::control(self.payload, seq, FrameKind::Ack, Modifiers::NONE)
    }
}
