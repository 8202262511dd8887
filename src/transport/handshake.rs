//! Connection negotiator: three-way handshake and graceful teardown.
//!
//! Handshake frames repurpose the header (`size` = proposed payload size,
//! payload = proposed window size as decimal text); both sides adopt the
//! minimum of the two proposals. All retry loops are driven by the socket's
//! receive timeout, and both teardown phases are bounded by the teardown
//! retry cap: exhausting it tears local state down anyway and reports
//! [`Teardown::TimedOut`] instead of failing.

use tracing::{debug, info};

use crate::core::constants::{MIN_PROPOSAL, TEARDOWN_MAX_RETRIES};
use crate::core::LinkResult;
use crate::frame::{Frame, FrameKind, Modifiers};

use super::clock;
use super::socket::PeerSocket;

/// Local window/payload proposal carried in the handshake.
#[derive(Debug, Clone, Copy)]
pub struct Proposal {
    /// Proposed window size, in frames.
    pub window: usize,
    /// Proposed payload size, in bytes.
    pub payload: usize,
}

impl Default for Proposal {
    fn default() -> Self {
        Self {
            window: crate::core::constants::DEFAULT_WINDOW_SIZE,
            payload: crate::core::constants::DEFAULT_PAYLOAD_SIZE,
        }
    }
}

/// Parameters both peers agreed on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Negotiated {
    /// Window size, in frames.
    pub window: usize,
    /// Payload size, in bytes.
    pub payload: usize,
}

/// Outcome of a completed handshake: the agreed parameters plus the
/// sequence baselines for both directions.
#[derive(Debug, Clone, Copy)]
pub struct Session {
    /// Negotiated window/payload sizes.
    pub negotiated: Negotiated,
    /// Next sequence number to assign to an outbound frame.
    pub next_send_seq: i64,
    /// Last handshake sequence observed from the peer; data reception
    /// starts at the following sequence.
    pub peer_last_seq: i64,
}

/// How a teardown ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Teardown {
    /// The full FIN / FIN|ACK / ACK exchange completed.
    Clean,
    /// The retry cap was exhausted; local state was torn down regardless.
    TimedOut,
}

/// min(local, peer), ignoring degenerate peer proposals.
fn pick(local: usize, peer: i64) -> usize {
    if peer < MIN_PROPOSAL as i64 {
        local
    } else {
        local.min(peer as usize)
    }
}

/// Receiver side of the handshake: wait for a SYN, adopt the peer, answer
/// SYN|ACK until a plain ACK arrives.
///
/// Anything received before the SYN is ignored. Blocks until a peer shows
/// up; there is no one to negotiate with until then.
pub async fn listen(socket: &PeerSocket, local: Proposal) -> LinkResult<Session> {
    let mut seq = clock::now_micros();

    info!("waiting for connection");
    let (syn, peer_addr) = loop {
        if let Some((frame, addr)) = socket.recv_frame_from().await? {
            if frame.kind == FrameKind::Syn {
                break (frame, addr);
            }
            debug!(kind = ?frame.kind, "ignoring pre-handshake frame");
        }
    };
    socket.adopt_peer(peer_addr).await?;

    let negotiated = Negotiated {
        window: pick(local.window, syn.proposed_window().map(i64::from).unwrap_or(0)),
        payload: pick(local.payload, i64::from(syn.proposed_payload())),
    };
    info!(
        peer = %peer_addr,
        window = negotiated.window,
        payload = negotiated.payload,
        "SYN received, sending SYN|ACK"
    );

    let ack = loop {
        let mut reply = Frame::handshake(
            seq,
            FrameKind::SynAck,
            negotiated.payload as i16,
            negotiated.window as i16,
        );
        seq += 1;
        socket.send_frame(&mut reply).await?;

        match socket.recv_frame_timeout().await? {
            Some(frame) if frame.kind == FrameKind::Ack => break frame,
            _ => {}
        }
    };
    info!(seq = ack.seq, "final ACK received, connection established");

    Ok(Session {
        negotiated,
        next_send_seq: seq,
        peer_last_seq: ack.seq,
    })
}

/// Sender side of the handshake: send SYN until a SYN|ACK arrives, adopt
/// the negotiated parameters from the reply, answer ACK while the peer
/// keeps re-sending SYN|ACK.
pub async fn connect(socket: &PeerSocket, local: Proposal) -> LinkResult<Session> {
    let mut seq = clock::now_micros();

    info!("sending SYN, waiting for SYN|ACK");
    let syn_ack = loop {
        let mut syn = Frame::handshake(
            seq,
            FrameKind::Syn,
            local.payload as i16,
            local.window as i16,
        );
        seq += 1;
        socket.send_frame(&mut syn).await?;

        match socket.recv_frame_timeout().await? {
            Some(frame) if frame.kind == FrameKind::SynAck => break frame,
            _ => {}
        }
    };

    let negotiated = Negotiated {
        window: pick(local.window, syn_ack.proposed_window().map(i64::from).unwrap_or(0)),
        payload: pick(local.payload, i64::from(syn_ack.proposed_payload())),
    };
    info!(
        window = negotiated.window,
        payload = negotiated.payload,
        "SYN|ACK received, sending final ACK"
    );

    // The final ACK is idempotent on the peer's side: repeat it for as long
    // as SYN|ACK retransmissions keep arriving.
    let mut peer_last = syn_ack.seq;
    loop {
        let mut ack = Frame::handshake(
            seq,
            FrameKind::Ack,
            negotiated.payload as i16,
            negotiated.window as i16,
        );
        seq += 1;
        socket.send_frame(&mut ack).await?;

        match socket.recv_frame_timeout().await? {
            Some(frame) if frame.kind == FrameKind::SynAck => peer_last = frame.seq,
            _ => break,
        }
    }
    info!("connection established");

    Ok(Session {
        negotiated,
        next_send_seq: seq,
        peer_last_seq: peer_last,
    })
}

/// Teardown, closer side: FIN until FIN|ACK, then a final ACK while FIN|ACK
/// keeps arriving. Both phases share the retry cap.
pub(crate) async fn close_initiate(
    socket: &PeerSocket,
    mut seq: i64,
    payload: usize,
) -> LinkResult<Teardown> {
    let mut acknowledged = false;
    for _ in 0..TEARDOWN_MAX_RETRIES {
        let mut fin = Frame::control(payload, seq, FrameKind::Fin, Modifiers::NONE);
        seq += 1;
        socket.send_frame(&mut fin).await?;

        if let Some(frame) = socket.recv_frame_timeout().await? {
            if frame.kind == FrameKind::FinAck {
                acknowledged = true;
                break;
            }
        }
    }
    if !acknowledged {
        info!("teardown timed out waiting for FIN|ACK");
        return Ok(Teardown::TimedOut);
    }

    for _ in 0..TEARDOWN_MAX_RETRIES {
        let mut ack = Frame::control(payload, seq, FrameKind::Ack, Modifiers::NONE);
        seq += 1;
        socket.send_frame(&mut ack).await?;

        match socket.recv_frame_timeout().await? {
            Some(frame) if frame.kind == FrameKind::FinAck => {}
            _ => {
                info!("teardown complete");
                return Ok(Teardown::Clean);
            }
        }
    }
    info!("teardown timed out re-sending final ACK");
    Ok(Teardown::TimedOut)
}

/// Teardown, responder side: answer FIN|ACK until a plain ACK is seen.
pub(crate) async fn close_respond(
    socket: &PeerSocket,
    seq: i64,
    payload: usize,
) -> LinkResult<Teardown> {
    for _ in 0..TEARDOWN_MAX_RETRIES {
        let mut reply = Frame::control(payload, seq, FrameKind::FinAck, Modifiers::NONE);
        socket.send_frame(&mut reply).await?;

        if let Some(frame) = socket.recv_frame_timeout().await? {
            if frame.kind == FrameKind::Ack {
                info!("teardown complete");
                return Ok(Teardown::Clean);
            }
        }
    }
    info!("teardown timed out waiting for final ACK");
    Ok(Teardown::TimedOut)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    async fn listener() -> (PeerSocket, std::net::SocketAddr) {
        let socket = PeerSocket::bind("127.0.0.1:0".parse().unwrap()).await.unwrap();
        let addr = socket.local_addr().unwrap();
        (socket, addr)
    }

    #[tokio::test]
    async fn test_handshake_negotiates_minimum() {
        let (server_socket, addr) = listener().await;
        let server = tokio::spawn(async move {
            listen(&server_socket, Proposal { window: 16, payload: 32 }).await.unwrap()
        });

        let client_socket = PeerSocket::connect(addr).await.unwrap();
        let client = connect(&client_socket, Proposal { window: 4, payload: 8 })
            .await
            .unwrap();
        let server = server.await.unwrap();

        // Both sides converge on the minimum of the two proposals.
        assert_eq!(client.negotiated, Negotiated { window: 4, payload: 8 });
        assert_eq!(server.negotiated, Negotiated { window: 4, payload: 8 });
    }

    #[tokio::test]
    async fn test_handshake_baselines_line_up() {
        let (server_socket, addr) = listener().await;
        let server = tokio::spawn(async move {
            listen(&server_socket, Proposal::default()).await.unwrap()
        });

        let client_socket = PeerSocket::connect(addr).await.unwrap();
        let client = connect(&client_socket, Proposal::default()).await.unwrap();
        let server = server.await.unwrap();

        // The server starts receiving right after the client's final ACK,
        // and vice versa for the SYN|ACK.
        assert_eq!(server.peer_last_seq + 1, client.next_send_seq);
        assert_eq!(client.peer_last_seq + 1, server.next_send_seq);
    }

    #[tokio::test]
    async fn test_teardown_clean_exchange() {
        let (a, addr) = listener().await;
        let b = PeerSocket::connect(addr).await.unwrap();
        a.adopt_peer(b.local_addr().unwrap()).await.unwrap();

        let responder = tokio::spawn(async move {
            // Wait for the FIN, then run the responder sequence.
            loop {
                if let Some(frame) = a.recv_frame().await.unwrap() {
                    if frame.kind == FrameKind::Fin {
                        break close_respond(&a, frame.seq, 16).await.unwrap();
                    }
                }
            }
        });

        let initiator = close_initiate(&b, 1000, 16).await.unwrap();
        assert_eq!(initiator, Teardown::Clean);
        assert_eq!(responder.await.unwrap(), Teardown::Clean);
    }

    #[tokio::test]
    async fn test_teardown_times_out_against_silent_peer() {
        let (_a, addr) = listener().await;
        let mut b = PeerSocket::connect(addr).await.unwrap();
        b.set_timeout(Duration::from_millis(5));

        // The peer never answers: after the retry cap the close still
        // completes locally, reported as timed out.
        let outcome = close_initiate(&b, 1, 16).await.unwrap();
        assert_eq!(outcome, Teardown::TimedOut);
    }
}
