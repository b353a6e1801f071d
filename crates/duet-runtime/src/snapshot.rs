//! Latest-frame snapshot shared between detection and rendering
//!
//! Writers publish a whole new frame; readers clone the `Arc` of the current
//! one, so a reader never sees a half-updated frame.

use std::sync::Arc;

use parking_lot::RwLock;

use duet_core::{JointSet, PoseBatch, SessionState};

/// Everything the render tick needs from the detection side
#[derive(Debug, Clone, Default)]
pub struct FrameSnapshot {
    /// Live bodies of the latest detection
    pub live: PoseBatch,
    /// Latest model predictions (AI 1, AI 2)
    pub predicted: Vec<JointSet>,
    pub players: usize,
    pub state: SessionState,
    /// Detection sequence number
    pub sequence: u64,
}

/// Single-slot publication of [`FrameSnapshot`]s
#[derive(Debug, Default)]
pub struct PoseSnapshot {
    current: RwLock<Arc<FrameSnapshot>>,
}

impl PoseSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the current frame
    pub fn publish(&self, frame: FrameSnapshot) {
        *self.current.write() = Arc::new(frame);
    }

    /// The most recently published frame
    pub fn latest(&self) -> Arc<FrameSnapshot> {
        Arc::clone(&self.current.read())
    }
}
