//! Capture/training session - the installation's state machine
//!
//! The session owns the state, both capture buffers and the trained model
//! pair. It never blocks: timers are deadlines checked in [`Session::advance`]
//! against a caller-supplied clock, and training itself is handed out as a
//! [`TrainingJob`] whose result comes back through
//! [`Session::complete_training`].
//!
//! Cycle:
//! - Idle → trigger → RecordingBoth (two players) or RecordingSingle(Person1)
//! - Person1 expiry → RecordingSingle(Person2), with person 1's capture
//!   replayed as a ghost
//! - Person2 / Both expiry → Training → Predicting (or Idle on failure)
//! - Predicting → trigger → retrain from Idle's decision logic

use std::time::{Duration, Instant};

use duet_core::{DuetError, DuetResult, FlatPose, JointSet, PoseBatch, RecordingPhase, SessionState};
use duet_model::ModelPair;

use crate::{
    gesture_condition, Countdown, CountdownDisplay, CountdownKind, GestureDetector, SessionConfig,
};

/// Where a record trigger came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerSource {
    /// The on-screen button (pre-rolls unless predicting)
    Button,
    /// The raised-hand gesture
    Gesture,
    /// Person 1's recording expired
    Auto,
}

/// What a trigger did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerOutcome {
    /// Rejected; nothing changed
    Ignored,
    /// A pre-roll countdown started; recording follows
    PreRoll,
    /// A recording phase started
    Started(SessionState),
    /// Both buffers were already full; everything was cleared
    Reset,
}

/// Something the outside world should react to
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    StateChanged {
        from: SessionState,
        to: SessionState,
    },
    PlayersChanged(usize),
    Countdown(CountdownDisplay),
    /// Raised-hand hold progress in percent
    GestureProgress(f32),
    /// Trained models were dropped; stale predictions must go too
    ModelsCleared,
    /// A user-facing failure
    Notice(DuetError),
}

/// Buffers to train on, tagged with the run they belong to
#[derive(Debug, Clone)]
pub struct TrainingJob {
    pub generation: u64,
    pub buffer1: Vec<FlatPose>,
    pub buffer2: Vec<FlatPose>,
}

/// The capture/training state machine
pub struct Session {
    config: SessionConfig,
    state: SessionState,
    players: usize,
    buffer1: Vec<FlatPose>,
    buffer2: Vec<FlatPose>,
    models: Option<ModelPair>,
    gesture: GestureDetector,
    pre_roll_until: Option<Instant>,
    phase_started: Option<Instant>,
    countdown: Option<Countdown>,
    /// Bumped whenever training starts or everything is reset
    generation: u64,
    events: Vec<SessionEvent>,
}

impl Session {
    pub fn new(config: SessionConfig) -> Self {
        Session {
            gesture: GestureDetector::new(config.gesture_threshold),
            config,
            state: SessionState::Idle,
            players: 0,
            buffer1: Vec::new(),
            buffer2: Vec::new(),
            models: None,
            pre_roll_until: None,
            phase_started: None,
            countdown: None,
            generation: 0,
            events: Vec::new(),
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Tracked player count (frozen while recording or training)
    pub fn players(&self) -> usize {
        self.players
    }

    pub fn buffer1(&self) -> &[FlatPose] {
        &self.buffer1
    }

    pub fn buffer2(&self) -> &[FlatPose] {
        &self.buffer2
    }

    pub fn models(&self) -> Option<&ModelPair> {
        self.models.as_ref()
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn is_pre_rolling(&self) -> bool {
        self.pre_roll_until.is_some()
    }

    pub fn gesture(&self) -> &GestureDetector {
        &self.gesture
    }

    /// Take all events raised since the last call
    pub fn drain_events(&mut self) -> Vec<SessionEvent> {
        std::mem::take(&mut self.events)
    }

    /// Refresh the player count from a detection batch
    pub fn observe_players(&mut self, batch: &PoseBatch) {
        if !self.state.tracks_player_count() {
            return;
        }
        let players = batch.len();
        if players != self.players {
            tracing::debug!(from = self.players, to = players, "player count changed");
            self.players = players;
            self.events.push(SessionEvent::PlayersChanged(players));
        }
    }

    /// Append the batch to the capture buffers the current phase records.
    ///
    /// Returns whether anything was captured. Recording both people only
    /// keeps frames where both bodies are present.
    pub fn capture(&mut self, batch: &PoseBatch) -> bool {
        let captured = match self.state {
            SessionState::RecordingSingle(RecordingPhase::Person1) => match batch.body(0) {
                Some(body) => {
                    self.buffer1.push(body.flatten());
                    true
                }
                None => false,
            },
            SessionState::RecordingSingle(RecordingPhase::Person2) => match batch.body(0) {
                Some(body) => {
                    self.buffer2.push(body.flatten());
                    true
                }
                None => false,
            },
            SessionState::RecordingBoth => match (batch.body(0), batch.body(1)) {
                (Some(first), Some(second)) => {
                    self.buffer1.push(first.flatten());
                    self.buffer2.push(second.flatten());
                    true
                }
                _ => false,
            },
            _ => false,
        };

        if captured {
            tracing::trace!(
                person1 = self.buffer1.len(),
                person2 = self.buffer2.len(),
                "frame captured"
            );
        }
        captured
    }

    /// Evaluate the raised-hand gesture for one detection batch.
    ///
    /// Only runs while idle or predicting with no pre-roll pending. Returns
    /// the trigger outcome when the gesture fired.
    pub fn evaluate_gesture(&mut self, batch: &PoseBatch, now: Instant) -> Option<TriggerOutcome> {
        if !self.state.accepts_gesture() || self.is_pre_rolling() {
            return None;
        }

        let step = self.gesture.update(gesture_condition(batch, self.players));
        if step.fired {
            self.events.push(SessionEvent::GestureProgress(0.0));
            return Some(self.trigger(TriggerSource::Gesture, now));
        }
        self.events.push(SessionEvent::GestureProgress(step.progress));
        None
    }

    /// Fire the record trigger
    pub fn trigger(&mut self, source: TriggerSource, now: Instant) -> TriggerOutcome {
        if self.state == SessionState::Training
            || self.state.is_recording()
            || self.is_pre_rolling()
        {
            tracing::debug!(?source, state = %self.state, "record trigger ignored");
            return TriggerOutcome::Ignored;
        }

        tracing::debug!(?source, state = %self.state, "record trigger");

        if self.state == SessionState::Predicting {
            self.buffer1.clear();
            self.buffer2.clear();
            self.clear_models();
            self.set_state(SessionState::Idle);
            return self.decide(source, now);
        }

        if source == TriggerSource::Button && !self.config.pre_roll.is_zero() {
            self.pre_roll_until = Some(now + self.config.pre_roll);
            self.gesture.reset();
            self.start_countdown(CountdownKind::PreRoll, self.config.pre_roll, now);
            return TriggerOutcome::PreRoll;
        }

        self.decide(source, now)
    }

    /// Check timers; returns a job when a capture just finished
    pub fn advance(&mut self, now: Instant) -> Option<TrainingJob> {
        let mut job = None;

        if let Some(until) = self.pre_roll_until {
            if now >= until {
                self.pre_roll_until = None;
                self.decide(TriggerSource::Button, now);
            }
        }

        if self.recording_expired(now) {
            job = self.finish_recording(now);
        }

        if let Some(countdown) = self.countdown.as_mut() {
            if let Some(display) = countdown.poll(now) {
                self.events.push(SessionEvent::Countdown(display));
            }
            if countdown.is_finished() {
                self.countdown = None;
            }
        }

        job
    }

    /// Apply the result of a training job.
    ///
    /// Results from a superseded job (reset or retrain since) are dropped.
    pub fn complete_training(&mut self, generation: u64, result: DuetResult<ModelPair>) {
        if self.state != SessionState::Training || generation != self.generation {
            tracing::debug!(generation, current = self.generation, "stale training result dropped");
            return;
        }

        match result {
            Ok(pair) => {
                tracing::info!(samples = pair.forward.samples(), "models ready");
                self.models = Some(pair);
                // cannot fail with models present
                let _ = self.request_predicting();
            }
            Err(error) => {
                self.models = None;
                self.set_state(SessionState::Idle);
                self.notice(error);
            }
        }
    }

    /// Switch to live prediction; rejected without trained models
    pub fn request_predicting(&mut self) -> DuetResult<()> {
        if self.models.is_none() {
            self.notice(DuetError::NoModel);
            return Err(DuetError::NoModel);
        }
        self.set_state(SessionState::Predicting);
        Ok(())
    }

    /// Clear buffers, models and timers and return to Idle
    pub fn reset(&mut self) {
        self.buffer1.clear();
        self.buffer2.clear();
        self.clear_models();
        self.pre_roll_until = None;
        self.phase_started = None;
        if let Some(countdown) = self.countdown.take() {
            if !countdown.is_finished() {
                self.events.push(SessionEvent::Countdown(CountdownDisplay::Clear));
            }
        }
        self.gesture.reset();
        self.generation += 1;
        self.set_state(SessionState::Idle);
        tracing::info!("session reset");
    }

    /// Person 1's capture replayed while person 2 records.
    ///
    /// The frame index follows elapsed time over the phase duration, so the
    /// whole capture plays once across the phase.
    pub fn ghost_pose(&self, now: Instant) -> Option<JointSet> {
        if self.state != SessionState::RecordingSingle(RecordingPhase::Person2) {
            return None;
        }
        let started = self.phase_started?;
        if self.buffer1.is_empty() {
            return None;
        }

        let elapsed = now.saturating_duration_since(started).as_secs_f64();
        let progress = elapsed / self.config.recording_duration.as_secs_f64();
        let index = (progress * self.buffer1.len() as f64).floor() as usize;
        self.buffer1.get(index).map(FlatPose::unflatten)
    }

    /// Time left in the current recording phase
    pub fn recording_remaining(&self, now: Instant) -> Option<Duration> {
        if !self.state.is_recording() {
            return None;
        }
        let deadline = self.phase_started? + self.config.recording_duration;
        Some(deadline.saturating_duration_since(now))
    }

    fn decide(&mut self, source: TriggerSource, now: Instant) -> TriggerOutcome {
        let next = if source == TriggerSource::Auto {
            SessionState::RecordingSingle(RecordingPhase::Person2)
        } else if self.buffer1.is_empty() {
            if self.players == 2 {
                SessionState::RecordingBoth
            } else {
                SessionState::RecordingSingle(RecordingPhase::Person1)
            }
        } else if self.buffer2.is_empty() {
            SessionState::RecordingSingle(RecordingPhase::Person2)
        } else {
            self.reset();
            return TriggerOutcome::Reset;
        };

        match next {
            SessionState::RecordingSingle(RecordingPhase::Person2) => self.buffer2.clear(),
            _ => {
                self.buffer1.clear();
                self.buffer2.clear();
            }
        }

        self.gesture.reset();
        self.phase_started = Some(now);
        self.set_state(next);
        self.start_countdown(CountdownKind::Recording, self.config.recording_duration, now);
        TriggerOutcome::Started(next)
    }

    fn recording_expired(&self, now: Instant) -> bool {
        matches!(self.recording_remaining(now), Some(left) if left.is_zero())
    }

    fn finish_recording(&mut self, now: Instant) -> Option<TrainingJob> {
        tracing::info!(
            state = %self.state,
            person1 = self.buffer1.len(),
            person2 = self.buffer2.len(),
            "recording finished"
        );
        self.phase_started = None;

        if self.state == SessionState::RecordingSingle(RecordingPhase::Person1) {
            self.set_state(SessionState::Idle);
            self.trigger(TriggerSource::Auto, now);
            return None;
        }

        self.generation += 1;
        self.set_state(SessionState::Training);
        Some(TrainingJob {
            generation: self.generation,
            buffer1: self.buffer1.clone(),
            buffer2: self.buffer2.clone(),
        })
    }

    fn start_countdown(&mut self, kind: CountdownKind, duration: Duration, now: Instant) {
        let mut countdown = Countdown::start(kind, duration, now);
        if let Some(display) = countdown.poll(now) {
            self.events.push(SessionEvent::Countdown(display));
        }
        self.countdown = Some(countdown);
    }

    fn clear_models(&mut self) {
        if self.models.take().is_some() {
            self.events.push(SessionEvent::ModelsCleared);
        }
    }

    fn notice(&mut self, error: DuetError) {
        tracing::warn!(error = %error, state = %self.state, "session notice");
        self.events.push(SessionEvent::Notice(error));
    }

    fn set_state(&mut self, to: SessionState) {
        let from = self.state;
        if from == to {
            return;
        }
        tracing::info!(%from, %to, "session state changed");
        self.state = to;
        self.events.push(SessionEvent::StateChanged { from, to });
    }
}
