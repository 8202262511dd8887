//! Sliding-window state: sequence tracker and fixed-capacity frame buffers.

mod buffers;
mod tracker;

pub use buffers::WindowBuffer;
pub use tracker::{in_span, SequenceTracker};
