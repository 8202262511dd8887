//! Core constants and error types, shared by every layer.

pub mod constants;
mod error;

pub use error::{FrameError, LinkError, LinkResult};
