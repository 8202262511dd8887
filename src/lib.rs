//! # SRUDP
//!
//! **S**elective-**R**epeat reliable transport over **UDP**
//!
//! SRUDP layers reliable, in-order message delivery on top of UDP using a
//! selective-repeat sliding window. It provides:
//!
//! - **Integrity**: every frame carries a digest; corrupted datagrams are
//!   treated as never received
//! - **Reliability**: per-frame acknowledgments, timeout-driven
//!   retransmission, and explicit requests for missing frames
//! - **Ordering**: out-of-order arrivals are buffered and delivered in
//!   sequence, with messages reassembled across fragment boundaries
//! - **Negotiation**: a three-way handshake agrees on window and payload
//!   sizes before any data flows
//!
//! ## Modules
//!
//! - [`core`]: shared constants and error types
//! - [`frame`]: wire format, flags, and the digest codec
//! - [`window`]: sequence tracking and sliding-window buffers
//! - [`transport`]: socket wrapper, handshake, teardown, fault injection
//! - [`link`]: the established-link state machine and its background tasks
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use srudp::prelude::*;
//!
//! # async fn demo() -> LinkResult<()> {
//! // Connect to a listening peer and negotiate the link parameters.
//! let socket = PeerSocket::connect("127.0.0.1:5555".parse().unwrap()).await?;
//! let session = srudp::transport::connect(&socket, Proposal::default()).await?;
//!
//! let mut link = Link::spawn(socket, session);
//! link.send("hello over a lossy wire").await?;
//!
//! if let Some(message) = link.next_message().await {
//!     println!("peer says: {}", String::from_utf8_lossy(&message));
//! }
//!
//! link.close().await?;
//! match link.join().await? {
//!     Teardown::Clean => {}
//!     Teardown::TimedOut => eprintln!("peer went silent during teardown"),
//! }
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod core;
pub mod frame;
pub mod link;
pub mod transport;
pub mod window;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::core::{FrameError, LinkError, LinkResult};
    pub use crate::frame::{Frame, FrameKind, Modifiers};
    pub use crate::link::{Link, LinkCommand};
    pub use crate::transport::{
        FaultPlan, Negotiated, PeerSocket, Proposal, Session, Teardown,
    };
}
