//! Fixed-capacity window buffers.
//!
//! Each buffer holds up to window-size frames, indexed by
//! `sequence - window offset`. Three instances back a link: sent frames
//! awaiting acknowledgment, acknowledgments received (aligned to the send
//! buffer), and frames received but not yet deliverable.

use crate::frame::Frame;

/// A window-sized buffer of frame slots.
#[derive(Debug)]
pub struct WindowBuffer {
    slots: Vec<Option<Frame>>,
}

impl WindowBuffer {
    /// Allocate a buffer with `window` empty slots.
    pub fn new(window: usize) -> Self {
        Self {
            slots: (0..window).map(|_| None).collect(),
        }
    }

    /// Number of slots.
    pub fn window(&self) -> usize {
        self.slots.len()
    }

    /// Store a frame at its window-relative index. Out-of-window sequences
    /// are rejected; re-inserting an occupied slot overwrites it (duplicate
    /// arrivals are idempotent).
    pub fn insert(&mut self, frame: Frame, offset: i64) -> bool {
        let idx = frame.seq - offset;
        if idx < 0 || idx as usize >= self.slots.len() {
            return false;
        }
        self.slots[idx as usize] = Some(frame);
        true
    }

    /// The frame in the head slot, if any.
    pub fn head(&self) -> Option<&Frame> {
        self.slots[0].as_ref()
    }

    /// The frame at a window-relative index, if any.
    pub fn get(&self, idx: usize) -> Option<&Frame> {
        self.slots.get(idx)?.as_ref()
    }

    /// Mutable access at a window-relative index.
    pub fn get_mut(&mut self, idx: usize) -> Option<&mut Frame> {
        self.slots.get_mut(idx)?.as_mut()
    }

    /// Shift every slot left by one, vacating the tail. The previous head
    /// is returned.
    pub fn slide(&mut self) -> Option<Frame> {
        let head = self.slots[0].take();
        self.slots.rotate_left(1);
        head
    }
}
