//! DUET Installation - detection handling and the render loop

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::{mpsc, oneshot};
use tokio::time::MissedTickBehavior;

use duet_core::{DuetError, DuetResult, JointSet, PoseBatch, RecordingPhase, SessionState};
use duet_model::{MirroredTrainer, ModelPair, RegressionBackend};
use duet_skeleton::{render_frame, PhysicsStepper, RenderSettings, ScalarFieldRenderer};

use crate::{
    button_label, FrameSnapshot, InstallationConfig, PoseSnapshot, Predictor, Session,
    SessionEvent, SessionSink, TrainingJob, TriggerOutcome, TriggerSource,
};

#[derive(Clone, Debug, Default)]
pub struct InstallationStats {
    pub ticks: u64,
    pub detections: u64,
    pub frames_captured: u64,
    pub prediction_errors: u64,
    pub trainings_started: u64,
    pub trainings_completed: u64,
    pub trainings_failed: u64,
    /// Primitives submitted on the last tick
    pub last_primitives: usize,
    pub last_tick_duration: Duration,
}

/// A training run in flight
struct PendingTraining {
    generation: u64,
    result: oneshot::Receiver<DuetResult<ModelPair>>,
}

/// The installation: session, predictor, trainer and the render collaborators
pub struct Installation<B, R, P, S>
where
    B: RegressionBackend,
{
    config: InstallationConfig,
    session: Session,
    predictor: Predictor,
    trainer: MirroredTrainer<B>,
    pending: Option<PendingTraining>,
    renderer: R,
    physics: P,
    sink: S,
    settings: RenderSettings,
    snapshot: Arc<PoseSnapshot>,
    sequence: u64,
    stats: InstallationStats,
}

impl<B, R, P, S> Installation<B, R, P, S>
where
    B: RegressionBackend,
    R: ScalarFieldRenderer,
    P: PhysicsStepper,
    S: SessionSink,
{
    pub fn new(
        config: InstallationConfig,
        backend: B,
        renderer: R,
        physics: P,
        mut sink: S,
    ) -> DuetResult<Self> {
        config.validate()?;
        let trainer = MirroredTrainer::new(backend, config.training.clone())
            .with_min_samples(config.session.min_samples);
        let session = Session::new(config.session.clone());
        sink.label(button_label(session.state(), session.players()));

        Ok(Installation {
            settings: config.render.sanitized(),
            config,
            session,
            predictor: Predictor::new(),
            trainer,
            pending: None,
            renderer,
            physics,
            sink,
            snapshot: Arc::new(PoseSnapshot::new()),
            sequence: 0,
            stats: InstallationStats::default(),
        })
    }

    pub fn config(&self) -> &InstallationConfig {
        &self.config
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn state(&self) -> SessionState {
        self.session.state()
    }

    pub fn predictor(&self) -> &Predictor {
        &self.predictor
    }

    pub fn renderer(&self) -> &R {
        &self.renderer
    }

    pub fn physics(&self) -> &P {
        &self.physics
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn stats(&self) -> &InstallationStats {
        &self.stats
    }

    /// Shared handle to the latest published frame
    pub fn snapshot(&self) -> Arc<PoseSnapshot> {
        Arc::clone(&self.snapshot)
    }

    pub fn settings(&self) -> &RenderSettings {
        &self.settings
    }

    /// Slider: base strength
    pub fn set_strength(&mut self, strength: f32) {
        self.settings.set_strength(strength);
    }

    /// Slider: arm subdivisions
    pub fn set_subdivisions(&mut self, subdivisions: usize) {
        self.settings.set_subdivisions(subdivisions);
    }

    pub fn is_training(&self) -> bool {
        self.pending.is_some()
    }

    /// Record button or any other external trigger
    pub fn trigger(&mut self, source: TriggerSource, now: Instant) -> TriggerOutcome {
        let outcome = self.session.trigger(source, now);
        self.dispatch_events();
        outcome
    }

    /// Explicit full reset; an in-flight training result is discarded
    pub fn reset(&mut self) {
        self.pending = None;
        self.session.reset();
        self.dispatch_events();
    }

    /// Ask for live prediction (fails without trained models)
    pub fn request_predicting(&mut self) -> DuetResult<()> {
        let result = self.session.request_predicting();
        self.dispatch_events();
        result
    }

    /// Handle one detection batch from the sensor
    pub fn on_detection(&mut self, batch: PoseBatch, now: Instant) {
        self.stats.detections += 1;

        if self.session.capture(&batch) {
            self.stats.frames_captured += 1;
        }

        if self.session.state() == SessionState::Predicting {
            if let Some(models) = self.session.models() {
                if let Err(error) = self.predictor.predict(models, &batch, self.session.players()) {
                    self.stats.prediction_errors += 1;
                    tracing::warn!(error = %error, "prediction failed");
                }
            }
        }

        self.session.evaluate_gesture(&batch, now);
        self.session.observe_players(&batch);
        self.dispatch_events();
        self.publish(batch);
    }

    /// Execute one render tick
    pub fn render_tick(&mut self, now: Instant) -> usize {
        let start = Instant::now();
        self.stats.ticks += 1;

        // Timers: pre-roll, recording expiry, countdowns
        if let Some(job) = self.session.advance(now) {
            self.start_training(job);
        }

        // Training results
        self.poll_training();
        self.dispatch_events();

        // Bodies: live first, then the ghost or the AI bodies
        let frame = self.snapshot.latest();
        let mut bodies: Vec<JointSet> = frame.live.bodies().to_vec();
        match self.session.state() {
            SessionState::RecordingSingle(RecordingPhase::Person2) => {
                bodies.extend(self.session.ghost_pose(now));
            }
            SessionState::Predicting => bodies.extend(frame.predicted.iter().copied()),
            _ => {}
        }

        let primitives = render_frame(
            &mut self.renderer,
            &bodies,
            self.session.players(),
            &self.settings,
        );
        self.physics.step();

        self.stats.last_primitives = primitives;
        self.stats.last_tick_duration = start.elapsed();
        primitives
    }

    /// Wait for an in-flight training run and apply its result
    pub async fn wait_for_training(&mut self) {
        let Some(pending) = self.pending.take() else {
            return;
        };
        let result = pending.result.await.unwrap_or_else(|_| {
            Err(DuetError::TrainingFailed(
                "training task ended without a result".into(),
            ))
        });
        self.finish_training(pending.generation, result);
        self.dispatch_events();
    }

    /// Drive the installation until the detection stream closes
    pub async fn run(mut self, mut detections: mpsc::Receiver<PoseBatch>) -> Self {
        let mut ticker = tokio::time::interval(self.config.tick_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        tracing::info!(tick = ?self.config.tick_interval, "installation running");

        loop {
            tokio::select! {
                batch = detections.recv() => match batch {
                    Some(batch) => self.on_detection(batch, Instant::now()),
                    None => break,
                },
                _ = ticker.tick() => {
                    self.render_tick(Instant::now());
                }
            }
        }

        tracing::info!(
            ticks = self.stats.ticks,
            detections = self.stats.detections,
            state = %self.session.state(),
            "detection stream closed"
        );
        self
    }

    fn start_training(&mut self, job: TrainingJob) {
        self.stats.trainings_started += 1;

        let handle = match tokio::runtime::Handle::try_current() {
            Ok(handle) => handle,
            Err(e) => {
                self.finish_training(
                    job.generation,
                    Err(DuetError::TrainingFailed(format!("no async runtime: {e}"))),
                );
                return;
            }
        };

        let trainer = self.trainer.clone();
        let (tx, rx) = oneshot::channel();
        handle.spawn(async move {
            let result = trainer.train(&job.buffer1, &job.buffer2).await;
            // receiver is gone after a reset
            let _ = tx.send(result);
        });

        self.pending = Some(PendingTraining {
            generation: job.generation,
            result: rx,
        });
    }

    fn poll_training(&mut self) {
        let Some(pending) = self.pending.as_mut() else {
            return;
        };
        let result = match pending.result.try_recv() {
            Ok(result) => result,
            Err(oneshot::error::TryRecvError::Empty) => return,
            Err(oneshot::error::TryRecvError::Closed) => Err(DuetError::TrainingFailed(
                "training task ended without a result".into(),
            )),
        };
        let generation = pending.generation;
        self.pending = None;
        self.finish_training(generation, result);
    }

    fn finish_training(&mut self, generation: u64, result: DuetResult<ModelPair>) {
        match result {
            Ok(_) => self.stats.trainings_completed += 1,
            Err(_) => self.stats.trainings_failed += 1,
        }
        self.session.complete_training(generation, result);
    }

    fn dispatch_events(&mut self) {
        for event in self.session.drain_events() {
            match event {
                SessionEvent::StateChanged { to, .. } => {
                    self.sink.label(button_label(to, self.session.players()));
                }
                SessionEvent::PlayersChanged(players) => {
                    self.sink.label(button_label(self.session.state(), players));
                }
                SessionEvent::Countdown(display) => self.sink.countdown(display),
                SessionEvent::GestureProgress(percent) => self.sink.progress(percent),
                SessionEvent::ModelsCleared => self.predictor.clear(),
                SessionEvent::Notice(error) => self.sink.notify(&error),
            }
        }
    }

    fn publish(&mut self, live: PoseBatch) {
        self.sequence += 1;
        self.snapshot.publish(FrameSnapshot {
            live,
            predicted: self.predictor.poses(),
            players: self.session.players(),
            state: self.session.state(),
            sequence: self.sequence,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{CountdownDisplay, MemorySink, SessionConfig};
    use duet_core::{Joint, Landmark};
    use duet_model::{Hyperparams, MlpBackend};
    use duet_skeleton::{primitive_count, NoopPhysics, PrimitiveRecorder};

    type TestInstallation = Installation<MlpBackend, PrimitiveRecorder, NoopPhysics, MemorySink>;

    fn config() -> InstallationConfig {
        let mut training = Hyperparams::quick();
        training.epochs = 2;
        training.seed = Some(3);
        InstallationConfig {
            session: SessionConfig {
                recording_duration: Duration::from_secs(2),
                pre_roll: Duration::from_secs(1),
                gesture_threshold: 5,
                min_samples: 10,
            },
            training,
            ..InstallationConfig::default()
        }
    }

    fn installation() -> TestInstallation {
        Installation::new(
            config(),
            MlpBackend,
            PrimitiveRecorder::new(),
            NoopPhysics::default(),
            MemorySink::new(),
        )
        .unwrap()
    }

    fn body(phase: f32) -> JointSet {
        let mut set = JointSet::default();
        for (i, &joint) in Joint::all().iter().enumerate() {
            let x = 0.3 + (i % 5) as f32 * 0.05 + phase * 0.01;
            let y = 0.1 + i as f32 * 0.02;
            set = set.with_joint(joint, Landmark::new(x, y));
        }
        set
    }

    fn batch(count: usize, phase: f32) -> PoseBatch {
        PoseBatch::new((0..count).map(|i| body(phase + i as f32)).collect())
    }

    fn after(start: Instant, millis: u64) -> Instant {
        start + Duration::from_millis(millis)
    }

    #[test]
    fn test_initial_label() {
        let installation = installation();
        assert_eq!(installation.sink().last_label(), Some("RECORD 1 PERSON"));
        assert_eq!(installation.state(), SessionState::Idle);
    }

    #[test]
    fn test_render_tick_draws_live_bodies() {
        let mut installation = installation();
        let start = Instant::now();
        installation.on_detection(batch(2, 0.0), start);

        let primitives = installation.render_tick(start);
        let per_body = primitive_count(installation.settings().subdivisions);
        assert_eq!(primitives, 2 * per_body);
        assert_eq!(installation.renderer().bodies_in_last_frame(), 2);
        assert_eq!(installation.physics().steps(), 1);
        assert_eq!(installation.sink().last_label(), Some("RECORD 2 PEOPLE"));
    }

    #[test]
    fn test_sliders_change_output() {
        let mut installation = installation();
        let start = Instant::now();
        installation.on_detection(batch(1, 0.0), start);

        installation.set_subdivisions(2);
        let fewer = installation.render_tick(start);
        installation.set_subdivisions(10);
        let more = installation.render_tick(start);
        assert!(more > fewer);
    }

    #[test]
    fn test_request_predicting_without_model() {
        let mut installation = installation();
        assert_eq!(installation.request_predicting(), Err(DuetError::NoModel));
        assert_eq!(installation.sink().notices, vec![DuetError::NoModel]);
        assert_eq!(installation.state(), SessionState::Idle);
    }

    #[tokio::test]
    async fn test_two_person_cycle_reaches_predicting() {
        let mut installation = installation();
        let start = Instant::now();

        installation.on_detection(batch(2, 0.0), start);
        assert_eq!(
            installation.trigger(TriggerSource::Gesture, start),
            TriggerOutcome::Started(SessionState::RecordingBoth)
        );

        for i in 0..20 {
            installation.on_detection(batch(2, i as f32), after(start, i * 50));
            installation.render_tick(after(start, i * 50));
        }
        installation.render_tick(after(start, 2000));
        assert_eq!(installation.state(), SessionState::Training);
        assert!(installation.is_training());

        installation.wait_for_training().await;
        assert_eq!(installation.state(), SessionState::Predicting);
        assert_eq!(installation.stats().trainings_completed, 1);
        assert_eq!(installation.sink().last_label(), Some("RETRAIN AI"));

        // both AI bodies appear next to the live ones
        installation.on_detection(batch(2, 3.0), after(start, 2100));
        assert_eq!(installation.predictor().poses().len(), 2);
        installation.render_tick(after(start, 2100));
        assert_eq!(installation.renderer().bodies_in_last_frame(), 4);
    }

    #[tokio::test]
    async fn test_insufficient_data_returns_to_idle() {
        let mut installation = installation();
        let start = Instant::now();

        installation.on_detection(batch(2, 0.0), start);
        installation.trigger(TriggerSource::Gesture, start);
        for i in 0..5 {
            installation.on_detection(batch(2, i as f32), after(start, i * 100));
        }
        installation.render_tick(after(start, 2000));
        installation.wait_for_training().await;

        assert_eq!(installation.state(), SessionState::Idle);
        assert!(matches!(
            installation.sink().notices.as_slice(),
            [DuetError::InsufficientData { person1: 5, person2: 5, required: 10 }]
        ));
        assert_eq!(installation.stats().trainings_failed, 1);
    }

    #[tokio::test]
    async fn test_ghost_shown_while_person2_records() {
        let mut installation = installation();
        let start = Instant::now();

        installation.on_detection(batch(1, 0.0), start);
        installation.trigger(TriggerSource::Gesture, start);
        for i in 0..10 {
            installation.on_detection(batch(1, i as f32), after(start, i * 100));
        }
        installation.render_tick(after(start, 2000));
        assert_eq!(
            installation.state(),
            SessionState::RecordingSingle(RecordingPhase::Person2)
        );

        installation.on_detection(batch(1, 0.0), after(start, 2100));
        installation.render_tick(after(start, 2100));
        assert_eq!(installation.renderer().bodies_in_last_frame(), 2);
    }

    #[tokio::test]
    async fn test_button_pre_roll_countdown() {
        let mut installation = installation();
        let start = Instant::now();

        assert_eq!(
            installation.trigger(TriggerSource::Button, start),
            TriggerOutcome::PreRoll
        );
        installation.render_tick(after(start, 1000));
        assert_eq!(
            installation.state(),
            SessionState::RecordingSingle(RecordingPhase::Person1)
        );
        assert!(matches!(
            installation.sink().countdowns.first(),
            Some(CountdownDisplay::Show { remaining: 1, .. })
        ));
    }

    #[tokio::test]
    async fn test_reset_discards_training() {
        let mut installation = installation();
        let start = Instant::now();

        installation.on_detection(batch(2, 0.0), start);
        installation.trigger(TriggerSource::Gesture, start);
        for i in 0..15 {
            installation.on_detection(batch(2, i as f32), after(start, i * 50));
        }
        installation.render_tick(after(start, 2000));
        assert!(installation.is_training());

        installation.reset();
        assert!(!installation.is_training());
        assert_eq!(installation.state(), SessionState::Idle);
        assert!(installation.session().buffer1().is_empty());
    }

    #[tokio::test]
    async fn test_run_until_stream_closes() {
        let (tx, rx) = mpsc::channel(16);
        let mut cfg = config();
        cfg.tick_interval = Duration::from_millis(5);
        let installation: TestInstallation = Installation::new(
            cfg,
            MlpBackend,
            PrimitiveRecorder::new(),
            NoopPhysics::default(),
            MemorySink::new(),
        )
        .unwrap();

        let producer = tokio::spawn(async move {
            for i in 0..10 {
                if tx.send(batch(1, i as f32)).await.is_err() {
                    break;
                }
                tokio::time::sleep(Duration::from_millis(2)).await;
            }
        });

        let installation = installation.run(rx).await;
        producer.await.unwrap();
        assert_eq!(installation.stats().detections, 10);
        assert_eq!(installation.snapshot().latest().sequence, 10);
    }
}
