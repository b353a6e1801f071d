//! Session states of the capture/training cycle

use std::fmt;

/// Which person a single-body recording is capturing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecordingPhase {
    Person1,
    Person2,
}

/// State of the capture/training session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SessionState {
    /// Waiting for a record trigger
    #[default]
    Idle,
    /// One body in view, captured one person after the other
    RecordingSingle(RecordingPhase),
    /// Two bodies in view, captured together
    RecordingBoth,
    /// Both regressors are being fitted
    Training,
    /// Live poses drive the trained regressors
    Predicting,
}

impl SessionState {
    /// Is a capture running?
    pub fn is_recording(&self) -> bool {
        matches!(
            self,
            SessionState::RecordingSingle(_) | SessionState::RecordingBoth
        )
    }

    /// States in which the raised-hand gesture is watched
    pub fn accepts_gesture(&self) -> bool {
        matches!(self, SessionState::Idle | SessionState::Predicting)
    }

    /// Player count is frozen while capturing or training
    pub fn tracks_player_count(&self) -> bool {
        !self.is_recording() && *self != SessionState::Training
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionState::Idle => write!(f, "idle"),
            SessionState::RecordingSingle(RecordingPhase::Person1) => write!(f, "recording person 1"),
            SessionState::RecordingSingle(RecordingPhase::Person2) => write!(f, "recording person 2"),
            SessionState::RecordingBoth => write!(f, "recording both"),
            SessionState::Training => write!(f, "training"),
            SessionState::Predicting => write!(f, "predicting"),
        }
    }
}
