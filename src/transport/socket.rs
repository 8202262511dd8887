//! Async UDP socket wrapper.
//!
//! A [`PeerSocket`] is bound/connected to exactly one peer and moves whole
//! frames: sending stamps the timestamp and seals the digest, receiving
//! verifies it. A frame that fails verification is reported as not received
//! at all; recovery is the ARQ engine's job, not the socket's.

use std::io;
use std::net::SocketAddr;
use std::time::Duration;

use rand::Rng;
use tokio::net::UdpSocket;
use tracing::{debug, trace};

use crate::core::constants::{DIGEST_SIZE, MAX_DATAGRAM_SIZE};
use crate::frame::Frame;

use super::clock;

/// Send-side fault injection: simulates an unstable path by corrupting or
/// dropping a percentage of outbound datagrams. A test harness for the ARQ
/// engine; disabled by default.
#[derive(Debug, Clone, Copy, Default)]
pub struct FaultPlan {
    percent: u8,
}

impl FaultPlan {
    /// Interfere with roughly `percent` of sends (clamped to 99).
    pub fn new(percent: u8) -> Self {
        Self {
            percent: percent.min(99),
        }
    }

    /// What to do with the next outbound frame.
    fn roll(&self, frame: &mut Frame) -> SendAction {
        if self.percent == 0 {
            return SendAction::Pass;
        }
        let mut rng = rand::thread_rng();
        if rng.gen_range(0..100u8) >= self.percent {
            return SendAction::Pass;
        }
        if rng.gen_bool(0.5) {
            // Break the digest so the receiver discards the frame.
            let byte = rng.gen_range(0..DIGEST_SIZE);
            frame.digest[byte] = frame.digest[byte].wrapping_add(rng.gen_range(1..10u8));
            SendAction::Corrupt
        } else {
            SendAction::Drop
        }
    }
}

enum SendAction {
    Pass,
    Corrupt,
    Drop,
}

/// A UDP socket speaking the frame wire format with a single peer.
#[derive(Debug)]
pub struct PeerSocket {
    socket: UdpSocket,
    timeout: Duration,
    fault: FaultPlan,
}

impl PeerSocket {
    /// Bind to a local address. The peer is adopted later, from the first
    /// handshake frame.
    pub async fn bind(addr: SocketAddr) -> io::Result<Self> {
        let socket = UdpSocket::bind(addr).await?;
        Ok(Self {
            socket,
            timeout: crate::core::constants::DEFAULT_TIMEOUT,
            fault: FaultPlan::default(),
        })
    }

    /// Bind an ephemeral local port and connect to a remote peer.
    pub async fn connect(remote: SocketAddr) -> io::Result<Self> {
        let local: SocketAddr = if remote.is_ipv4() {
            "0.0.0.0:0".parse().expect("valid addr")
        } else {
            "[::]:0".parse().expect("valid addr")
        };
        let this = Self::bind(local).await?;
        this.socket.connect(remote).await?;
        Ok(this)
    }

    /// Lock the socket onto a peer address (server side, once the first
    /// frame reveals who is talking).
    pub async fn adopt_peer(&self, addr: SocketAddr) -> io::Result<()> {
        self.socket.connect(addr).await
    }

    /// Local address the socket is bound to.
    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    /// The receive/retransmission timeout.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Override the default timeout (the `-timer` harness knob).
    pub fn set_timeout(&mut self, timeout: Duration) {
        self.timeout = timeout;
    }

    /// Install a fault plan (the `-error` harness knob).
    pub fn set_fault(&mut self, fault: FaultPlan) {
        self.fault = fault;
    }

    /// Stamp, seal and transmit a frame.
    ///
    /// The timestamp written here is what the retransmit watchdog later
    /// measures staleness against, so callers keeping a copy for resending
    /// should keep this stamped copy.
    pub async fn send_frame(&self, frame: &mut Frame) -> io::Result<()> {
        frame.time = clock::now_micros();
        frame.seal();

        match self.fault.roll(frame) {
            SendAction::Pass => {
                self.socket.send(&frame.encode()).await?;
            }
            SendAction::Corrupt => {
                debug!(seq = frame.seq, "fault: sending corrupted frame");
                self.socket.send(&frame.encode()).await?;
            }
            SendAction::Drop => {
                debug!(seq = frame.seq, "fault: dropping frame");
            }
        }
        Ok(())
    }

    /// Receive one frame from the connected peer.
    ///
    /// Returns `None` when the datagram fails to decode or its digest does
    /// not verify; both count as "nothing arrived".
    pub async fn recv_frame(&self) -> io::Result<Option<Frame>> {
        let mut buf = vec![0u8; MAX_DATAGRAM_SIZE];
        let len = self.socket.recv(&mut buf).await?;
        Ok(Self::check(&buf[..len]))
    }

    /// Receive one frame from anyone, reporting the sender address. Used
    /// while listening for the opening SYN.
    pub async fn recv_frame_from(&self) -> io::Result<Option<(Frame, SocketAddr)>> {
        let mut buf = vec![0u8; MAX_DATAGRAM_SIZE];
        let (len, addr) = self.socket.recv_from(&mut buf).await?;
        Ok(Self::check(&buf[..len]).map(|frame| (frame, addr)))
    }

    /// Receive with the socket's timeout; `None` on timeout as well as on a
    /// corrupt or undecodable datagram.
    pub async fn recv_frame_timeout(&self) -> io::Result<Option<Frame>> {
        match tokio::time::timeout(self.timeout, self.recv_frame()).await {
            Ok(result) => result,
            Err(_) => Ok(None),
        }
    }

    fn check(bytes: &[u8]) -> Option<Frame> {
        let frame = match Frame::decode(bytes) {
            Ok(frame) => frame,
            Err(e) => {
                debug!("discarding undecodable datagram: {e}");
                return None;
            }
        };
        if !frame.verify() {
            debug!(seq = frame.seq, "discarding frame with digest mismatch");
            return None;
        }
        trace!(seq = frame.seq, kind = ?frame.kind, "frame in");
        Some(frame)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::{FrameKind, Modifiers};

    async fn pair() -> (PeerSocket, PeerSocket) {
        let a = PeerSocket::bind("127.0.0.1:0".parse().unwrap()).await.unwrap();
        let b = PeerSocket::connect(a.local_addr().unwrap()).await.unwrap();
        a.adopt_peer(b.local_addr().unwrap()).await.unwrap();
        (a, b)
    }

    #[tokio::test]
    async fn test_send_recv_roundtrip() {
        let (a, b) = pair().await;

        let mut frame = Frame::message(b"over the wire", 16, 3);
        b.send_frame(&mut frame).await.unwrap();
        assert!(frame.time > 0);

        let got = a.recv_frame().await.unwrap().expect("frame arrives intact");
        assert_eq!(got.seq, 3);
        assert_eq!(got.body(), b"over the wire");
        assert_eq!(got.time, frame.time);
    }

    #[tokio::test]
    async fn test_corrupt_datagram_reported_as_not_received() {
        let (a, b) = pair().await;

        let mut frame = Frame::control(16, 5, FrameKind::Ack, Modifiers::NONE);
        frame.seal();
        let mut bytes = frame.encode();
        *bytes.last_mut().unwrap() ^= 0xFF;
        b.socket.send(&bytes).await.unwrap();

        assert!(a.recv_frame().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_recv_timeout_returns_none() {
        let (mut a, _b) = pair().await;
        a.set_timeout(Duration::from_millis(10));
        assert!(a.recv_frame_timeout().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_fault_plan_drop_never_reaches_peer() {
        let (a, mut b) = pair().await;
        b.set_fault(FaultPlan { percent: 99 });

        // With 99% interference at least some of these never arrive or
        // arrive corrupted; every surviving frame still verifies or is
        // discarded, never delivered broken.
        for seq in 0..20 {
            let mut frame = Frame::message(b"noise", 8, seq);
            b.send_frame(&mut frame).await.unwrap();
        }
        let mut survived = 0;
        loop {
            match tokio::time::timeout(Duration::from_millis(20), a.recv_frame()).await {
                Ok(Ok(Some(_))) => survived += 1,
                _ => break,
            }
        }
        assert!(survived < 20);
    }
}
