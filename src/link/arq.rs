//! ARQ watchdogs.
//!
//! Two periodic tasks cover the loss cases the dispatcher's event handling
//! cannot: the retransmit watchdog resends outstanding frames whose
//! acknowledgment never arrived, and the request watchdog asks the peer for
//! frames missing from the receive window. Both take the shared lock once
//! per tick, collect their work, and transmit outside any per-frame
//! bookkeeping.

use std::sync::atomic::Ordering;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::core::constants::WATCHDOG_INTERVAL;
use crate::transport::clock;

use super::Shared;

/// Resend every sent-but-unacknowledged frame older than the link timeout.
///
/// Runs until the dispatcher clears the running flag. Resent frames carry
/// the RES modifier and a fresh timestamp, so each timeout interval
/// produces at most one resend per frame.
pub(crate) async fn retransmit_watchdog(shared: Arc<Shared>) {
    while shared.running.load(Ordering::Acquire) {
        let stale = {
            let mut state = shared.state.lock().await;
            if !shared.running.load(Ordering::Acquire) {
                break;
            }
            state.stale_retransmits(clock::now_micros())
        };
        for mut frame in stale {
            debug!(seq = frame.seq, "retransmitting unacknowledged frame");
            if let Err(err) = shared.socket.send_frame(&mut frame).await {
                warn!(%err, "retransmission failed");
            }
        }
        tokio::time::sleep(WATCHDOG_INTERVAL).await;
    }
}

/// Request every frame missing from the receive window once the newest
/// arrival has gone stale.
pub(crate) async fn request_watchdog(shared: Arc<Shared>) {
    while shared.running.load(Ordering::Acquire) {
        let requests = {
            let state = shared.state.lock().await;
            if !shared.running.load(Ordering::Acquire) {
                break;
            }
            let missing = state.gap_requests(clock::now_micros());
            missing
                .into_iter()
                .map(|seq| state.gap_request_frame(seq))
                .collect::<Vec<_>>()
        };
        for mut frame in requests {
            debug!(seq = frame.seq, "requesting missing frame");
            if let Err(err) = shared.socket.send_frame(&mut frame).await {
                warn!(%err, "gap request failed");
            }
        }
        tokio::time::sleep(WATCHDOG_INTERVAL).await;
    }
}
