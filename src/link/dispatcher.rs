//! Link event dispatcher.
//!
//! One task per link owns the reaction to every inbound frame and every
//! application command. It is the only writer of the outbound data path;
//! the watchdogs only ever resend or re-request, so outbound sequence
//! numbers are assigned from exactly one place.

use std::sync::atomic::Ordering;
use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::core::LinkResult;
use crate::frame::FrameKind;
use crate::transport::{clock, close_initiate, close_respond, Teardown};

use super::{LinkCommand, Shared};

/// Run the dispatch loop until either side closes the link.
///
/// Returns how the teardown ended. Dropping the command sender closes the
/// link the same way an explicit [`LinkCommand::Close`] does.
pub(crate) async fn run(
    shared: Arc<Shared>,
    mut commands: mpsc::Receiver<LinkCommand>,
    delivered: mpsc::UnboundedSender<Vec<u8>>,
) -> LinkResult<Teardown> {
    loop {
        tokio::select! {
            received = shared.socket.recv_frame() => {
                let Some(frame) = received? else {
                    // Undecodable or digest-rejected datagram: as if never
                    // received.
                    continue;
                };
                match frame.kind {
                    FrameKind::Msg => {
                        let seq = frame.seq;
                        let (mut ack, completed) = {
                            let mut state = shared.state.lock().await;
                            let completed =
                                state.accept_msg(frame, clock::now_micros());
                            (state.ack_frame(seq), completed)
                        };
                        // Acknowledge unconditionally: a duplicate usually
                        // means our previous ACK was lost.
                        shared.socket.send_frame(&mut ack).await?;
                        for message in completed {
                            if delivered.send(message).is_err() {
                                debug!("receiver dropped, discarding delivery");
                            }
                        }
                    }
                    FrameKind::Ack => {
                        let mut state = shared.state.lock().await;
                        state.accept_ack(frame);
                        while let Some(mut next) = state.next_outbound() {
                            shared.socket.send_frame(&mut next).await?;
                            state.record_sent(next);
                        }
                    }
                    FrameKind::Nak if frame.mods.is_req() => {
                        let resend = {
                            let mut state = shared.state.lock().await;
                            state.resend_for(frame.seq, clock::now_micros())
                        };
                        match resend {
                            Some(mut stored) => {
                                debug!(seq = stored.seq, "resending on request");
                                shared.socket.send_frame(&mut stored).await?;
                            }
                            None => {
                                warn!(seq = frame.seq, "request for frame outside window");
                            }
                        }
                    }
                    FrameKind::Fin | FrameKind::FinAck => {
                        info!("peer initiated teardown");
                        shared.running.store(false, Ordering::Release);
                        let (seq, payload) = {
                            let state = shared.state.lock().await;
                            (state.send_seq, state.payload)
                        };
                        return close_respond(&shared.socket, seq, payload).await;
                    }
                    FrameKind::Syn | FrameKind::SynAck => {
                        // Handshake stragglers; the final ACK already went out.
                        debug!(kind = ?frame.kind, "ignoring handshake frame on established link");
                    }
                    FrameKind::Nak => {
                        debug!(seq = frame.seq, "ignoring NAK without request modifier");
                    }
                }
            }
            command = commands.recv() => {
                match command {
                    Some(LinkCommand::Send(message)) => {
                        let mut state = shared.state.lock().await;
                        state.queue_message(message);
                        while let Some(mut next) = state.next_outbound() {
                            shared.socket.send_frame(&mut next).await?;
                            state.record_sent(next);
                        }
                    }
                    Some(LinkCommand::Close) | None => {
                        info!("closing link");
                        shared.running.store(false, Ordering::Release);
                        let (seq, payload) = {
                            let state = shared.state.lock().await;
                            (state.send_seq, state.payload)
                        };
                        return close_initiate(&shared.socket, seq, payload).await;
                    }
                }
            }
        }
    }
}
