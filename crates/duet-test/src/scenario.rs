//! End-to-end session scenarios
//!
//! Runs a whole installation (session, trainer, predictor, renderer) against
//! the synthetic sensor on a simulated clock: detections every frame
//! interval, a render tick after each, training awaited when it starts.

use std::time::{Duration, Instant};

use duet_core::{DuetError, DuetResult, SessionState};
use duet_model::MlpBackend;
use duet_runtime::{
    Installation, InstallationConfig, InstallationStats, MemorySink, TriggerSource,
};
use duet_skeleton::{NoopPhysics, PrimitiveRecorder};

use crate::simulator::{DancerConfig, DancerSimulator};

/// Installation type every scenario drives
pub type ScenarioInstallation = Installation<MlpBackend, PrimitiveRecorder, NoopPhysics, MemorySink>;

// ============================================================================
// CONFIG
// ============================================================================

/// Scenario configuration
#[derive(Clone, Debug)]
pub struct ScenarioConfig {
    pub installation: InstallationConfig,
    pub dancers: DancerConfig,
    /// How the session is started
    pub trigger: TriggerSource,
    /// Simulated time between detections
    pub frame_interval: Duration,
    /// Frames to keep predicting once models are live
    pub predicting_frames: usize,
    /// Give up after this much simulated time
    pub max_duration: Duration,
    pub seed: u64,
}

impl Default for ScenarioConfig {
    fn default() -> Self {
        let mut installation = InstallationConfig::quick_demo();
        installation.training.epochs = 3;
        installation.training.seed = Some(7);
        ScenarioConfig {
            installation,
            dancers: DancerConfig::solo(),
            trigger: TriggerSource::Button,
            frame_interval: Duration::from_millis(33),
            predicting_frames: 10,
            max_duration: Duration::from_secs(30),
            seed: 1,
        }
    }
}

impl ScenarioConfig {
    /// One dancer pressing the button (two sequential recordings)
    pub fn solo() -> Self {
        Self::default()
    }

    /// Two dancers pressing the button (one joint recording)
    pub fn duet() -> Self {
        ScenarioConfig {
            dancers: DancerConfig::duet(),
            ..Self::default()
        }
    }

    /// Two dancers raising their right hands to start
    pub fn gesture_duet() -> Self {
        ScenarioConfig {
            trigger: TriggerSource::Gesture,
            ..Self::duet()
        }
    }

    /// Recording window too short to collect enough samples
    pub fn starved() -> Self {
        let mut config = Self::duet();
        config.installation.session.recording_duration = Duration::from_millis(200);
        config.installation.session.pre_roll = Duration::ZERO;
        config
    }
}

// ============================================================================
// RESULT
// ============================================================================

/// What a scenario observed
#[derive(Debug, Clone)]
pub struct ScenarioResult {
    /// Distinct states in the order they were entered
    pub states: Vec<SessionState>,
    pub final_state: SessionState,
    pub stats: InstallationStats,
    pub labels: Vec<String>,
    pub notices: Vec<DuetError>,
    /// Bodies drawn on the last render tick
    pub bodies_rendered: usize,
    /// Simulated time the scenario took
    pub elapsed: Duration,
}

impl ScenarioResult {
    /// The session trained and ended up predicting without user notices
    pub fn passed(&self) -> bool {
        self.final_state == SessionState::Predicting && self.notices.is_empty()
    }

    pub fn visited(&self, state: SessionState) -> bool {
        self.states.contains(&state)
    }
}

// ============================================================================
// HARNESS
// ============================================================================

/// Drives one installation through a scenario
pub struct ScenarioHarness {
    config: ScenarioConfig,
    installation: ScenarioInstallation,
    simulator: DancerSimulator,
    states: Vec<SessionState>,
}

impl ScenarioHarness {
    pub fn new(config: ScenarioConfig) -> DuetResult<Self> {
        let installation = Installation::new(
            config.installation.clone(),
            MlpBackend,
            PrimitiveRecorder::new(),
            NoopPhysics::default(),
            MemorySink::new(),
        )?;
        let simulator = DancerSimulator::new(config.dancers.clone(), config.seed);
        let states = vec![installation.state()];

        Ok(ScenarioHarness {
            config,
            installation,
            simulator,
            states,
        })
    }

    pub fn installation(&self) -> &ScenarioInstallation {
        &self.installation
    }

    pub fn installation_mut(&mut self) -> &mut ScenarioInstallation {
        &mut self.installation
    }

    pub fn simulator_mut(&mut self) -> &mut DancerSimulator {
        &mut self.simulator
    }

    /// Run until the models have predicted for a while or time runs out
    pub async fn run(&mut self) -> ScenarioResult {
        let start = Instant::now();
        let mut elapsed = Duration::ZERO;
        let mut predicting = 0;
        let mut triggered = false;

        if self.config.trigger == TriggerSource::Gesture {
            self.simulator.set_hands_up(true);
        }

        while elapsed < self.config.max_duration {
            let now = start + elapsed;
            let batch = self.simulator.frame(elapsed);
            self.installation.on_detection(batch, now);

            if !triggered && self.config.trigger != TriggerSource::Gesture {
                self.installation.trigger(self.config.trigger, now);
                triggered = true;
            }

            self.installation.render_tick(now);
            self.record_state();

            let state = self.installation.state();
            if state.is_recording() {
                self.simulator.set_hands_up(false);
            }
            if state == SessionState::Training {
                self.installation.wait_for_training().await;
                self.record_state();
            }

            match self.installation.state() {
                SessionState::Predicting => {
                    predicting += 1;
                    if predicting >= self.config.predicting_frames {
                        break;
                    }
                }
                SessionState::Idle if self.installation.stats().trainings_failed > 0 => break,
                _ => {}
            }

            elapsed += self.config.frame_interval;
        }

        let sink = self.installation.sink();
        ScenarioResult {
            states: self.states.clone(),
            final_state: self.installation.state(),
            stats: self.installation.stats().clone(),
            labels: sink.labels.clone(),
            notices: sink.notices.clone(),
            bodies_rendered: self.installation.renderer().bodies_in_last_frame(),
            elapsed,
        }
    }

    fn record_state(&mut self) {
        let state = self.installation.state();
        if self.states.last() != Some(&state) {
            tracing::debug!(state = %state, "scenario state");
            self.states.push(state);
        }
    }
}

// ============================================================================
// STANDARD SCENARIOS
// ============================================================================

/// One dancer records twice and ends up predicting
pub async fn run_solo_cycle() -> DuetResult<ScenarioResult> {
    Ok(ScenarioHarness::new(ScenarioConfig::solo())?.run().await)
}

/// Two dancers record together and end up predicting
pub async fn run_duet_cycle() -> DuetResult<ScenarioResult> {
    Ok(ScenarioHarness::new(ScenarioConfig::duet())?.run().await)
}

/// Two dancers start the session by holding up their right hands
pub async fn run_gesture_cycle() -> DuetResult<ScenarioResult> {
    Ok(ScenarioHarness::new(ScenarioConfig::gesture_duet())?.run().await)
}
