//! UI sinks - where session feedback ends up

use duet_core::{DuetError, RecordingPhase, SessionState};

use crate::CountdownDisplay;

/// Button label for a session state
pub fn button_label(state: SessionState, players: usize) -> &'static str {
    match state {
        SessionState::Idle if players == 2 => "RECORD 2 PEOPLE",
        SessionState::Idle => "RECORD 1 PERSON",
        SessionState::RecordingSingle(RecordingPhase::Person1) => "RECORDING PERSON 1...",
        SessionState::RecordingSingle(RecordingPhase::Person2) => "RECORDING PERSON 2...",
        SessionState::RecordingBoth => "RECORDING BOTH...",
        SessionState::Training => "TRAINING MODEL...",
        SessionState::Predicting => "RETRAIN AI",
    }
}

/// Receiver of user-visible session feedback
pub trait SessionSink {
    /// Record-button label
    fn label(&mut self, text: &str);

    fn countdown(&mut self, display: CountdownDisplay);

    /// Gesture hold progress in percent
    fn progress(&mut self, percent: f32);

    /// Blocking user notification
    fn notify(&mut self, error: &DuetError);
}

/// Sink that writes everything to the log
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

impl SessionSink for LogSink {
    fn label(&mut self, text: &str) {
        tracing::info!(label = text, "button");
    }

    fn countdown(&mut self, display: CountdownDisplay) {
        match display {
            CountdownDisplay::Show { remaining, kind } => {
                tracing::info!(remaining, recording = kind.is_recording(), "countdown")
            }
            CountdownDisplay::Clear => tracing::debug!("countdown cleared"),
        }
    }

    fn progress(&mut self, percent: f32) {
        tracing::trace!(percent, "gesture progress");
    }

    fn notify(&mut self, error: &DuetError) {
        tracing::warn!(error = %error, user_facing = error.is_user_facing(), "notification");
    }
}

/// Sink that keeps everything it receives
#[derive(Debug, Default, Clone)]
pub struct MemorySink {
    pub labels: Vec<String>,
    pub countdowns: Vec<CountdownDisplay>,
    pub progress: Vec<f32>,
    pub notices: Vec<DuetError>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn last_label(&self) -> Option<&str> {
        self.labels.last().map(String::as_str)
    }
}

impl SessionSink for MemorySink {
    fn label(&mut self, text: &str) {
        if self.last_label() != Some(text) {
            self.labels.push(text.to_string());
        }
    }

    fn countdown(&mut self, display: CountdownDisplay) {
        self.countdowns.push(display);
    }

    fn progress(&mut self, percent: f32) {
        self.progress.push(percent);
    }

    fn notify(&mut self, error: &DuetError) {
        self.notices.push(error.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_labels() {
        assert_eq!(button_label(SessionState::Idle, 1), "RECORD 1 PERSON");
        assert_eq!(button_label(SessionState::Idle, 0), "RECORD 1 PERSON");
        assert_eq!(button_label(SessionState::Idle, 2), "RECORD 2 PEOPLE");
        assert_eq!(button_label(SessionState::Training, 2), "TRAINING MODEL...");
        assert_eq!(button_label(SessionState::Predicting, 1), "RETRAIN AI");
        assert_eq!(
            button_label(SessionState::RecordingSingle(RecordingPhase::Person2), 1),
            "RECORDING PERSON 2..."
        );
    }

    #[test]
    fn test_memory_sink_collapses_repeated_labels() {
        let mut sink = MemorySink::new();
        sink.label("RECORD 1 PERSON");
        sink.label("RECORD 1 PERSON");
        sink.label("RECORDING PERSON 1...");
        assert_eq!(sink.labels.len(), 2);
        assert_eq!(sink.last_label(), Some("RECORDING PERSON 1..."));
    }
}
