//! Transport layer: UDP socket wrapper, microsecond clock, connection
//! negotiation and teardown, and the send-side fault injection harness.

pub mod clock;
mod handshake;
mod socket;

pub use handshake::{connect, listen, Negotiated, Proposal, Session, Teardown};
pub(crate) use handshake::{close_initiate, close_respond};
pub use socket::{FaultPlan, PeerSocket};
