//! Established-link machinery: shared state, ARQ watchdogs, the event
//! dispatcher, and the [`Link`] handle tying them together.
//!
//! A [`Link`] owns three background tasks over one shared state:
//!
//! * the dispatcher, reacting to inbound frames and application commands;
//! * the retransmit watchdog, resending unacknowledged frames on timeout;
//! * the request watchdog, asking the peer for receive-window gaps.
//!
//! All three synchronize on a single mutex around [`state::LinkState`] and
//! a running flag that the dispatcher clears when teardown begins.

mod arq;
mod dispatcher;
mod state;

use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;

use crate::core::{LinkError, LinkResult};
use crate::transport::{PeerSocket, Session, Teardown};

use state::LinkState;

/// Commands the application sends to a running link.
#[derive(Debug)]
pub enum LinkCommand {
    /// Transmit one message, fragmented across frames as needed.
    Send(Vec<u8>),
    /// Begin a clean teardown.
    Close,
}

/// State shared by the dispatcher and both watchdogs.
pub(crate) struct Shared {
    pub socket: PeerSocket,
    pub state: Mutex<LinkState>,
    pub running: AtomicBool,
}

/// Handle to an established link.
///
/// Created by [`Link::spawn`] once the handshake has produced a
/// [`Session`]. Messages go out through [`send`](Self::send), arrive
/// through [`next_message`](Self::next_message), and
/// [`join`](Self::join) waits for teardown and reports how it ended.
pub struct Link {
    commands: mpsc::Sender<LinkCommand>,
    delivered: mpsc::UnboundedReceiver<Vec<u8>>,
    dispatcher: JoinHandle<LinkResult<Teardown>>,
    watchdogs: Vec<JoinHandle<()>>,
}

impl Link {
    /// Start the link tasks over a connected socket and a negotiated
    /// session.
    pub fn spawn(socket: PeerSocket, session: Session) -> Self {
        let timeout = socket.timeout();
        let shared = Arc::new(Shared {
            state: Mutex::new(LinkState::new(&session, timeout)),
            socket,
            running: AtomicBool::new(true),
        });

        let (commands, command_rx) = mpsc::channel(64);
        let (delivered_tx, delivered) = mpsc::unbounded_channel();

        let dispatcher = tokio::spawn(dispatcher::run(
            Arc::clone(&shared),
            command_rx,
            delivered_tx,
        ));
        let watchdogs = vec![
            tokio::spawn(arq::retransmit_watchdog(Arc::clone(&shared))),
            tokio::spawn(arq::request_watchdog(shared)),
        ];

        Self {
            commands,
            delivered,
            dispatcher,
            watchdogs,
        }
    }

    /// Clone of the command channel, for driving the link from a task that
    /// does not own the handle.
    pub fn commands(&self) -> mpsc::Sender<LinkCommand> {
        self.commands.clone()
    }

    /// Queue one message for reliable, in-order delivery.
    pub async fn send(&self, message: impl Into<Vec<u8>>) -> LinkResult<()> {
        self.commands
            .send(LinkCommand::Send(message.into()))
            .await
            .map_err(|_| LinkError::Closed)
    }

    /// Ask the link to tear down cleanly. Dropping the handle without
    /// calling this has the same effect.
    pub async fn close(&self) -> LinkResult<()> {
        self.commands
            .send(LinkCommand::Close)
            .await
            .map_err(|_| LinkError::Closed)
    }

    /// Receive the next fully reassembled inbound message, or `None` once
    /// the link has shut down.
    pub async fn next_message(&mut self) -> Option<Vec<u8>> {
        self.delivered.recv().await
    }

    /// Wait for the link to finish and report how the teardown ended.
    ///
    /// Blocks until teardown completes, whether it was started here with
    /// [`close`](Self::close) or by the peer sending FIN.
    pub async fn join(self) -> LinkResult<Teardown> {
        let teardown = self.dispatcher.await??;
        for watchdog in self.watchdogs {
            watchdog.await?;
        }
        Ok(teardown)
    }
}
