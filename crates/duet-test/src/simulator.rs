//! Synthetic pose sensor for DUET testing
//!
//! Produces plausible dancing skeletons for up to two bodies: a standing
//! base pose, swinging arms and legs, a little sensor jitter, and on demand
//! a raised right hand.

use std::time::Duration;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tokio::sync::mpsc;

use duet_core::{Joint, JointSet, Landmark, PoseBatch, JOINT_COUNT, MAX_BODIES};

/// Standing pose in sensor coordinates, indexed by landmark
const BASE_POSE: [(f32, f32); JOINT_COUNT] = [
    (0.50, 0.20), // nose
    (0.49, 0.18),
    (0.48, 0.18),
    (0.47, 0.18),
    (0.51, 0.18),
    (0.52, 0.18),
    (0.53, 0.18),
    (0.46, 0.19),
    (0.54, 0.19),
    (0.49, 0.22),
    (0.51, 0.22),
    (0.42, 0.30), // shoulders
    (0.58, 0.30),
    (0.38, 0.42), // elbows
    (0.62, 0.42),
    (0.36, 0.52), // wrists
    (0.64, 0.52),
    (0.35, 0.55), // pinkies
    (0.65, 0.55),
    (0.36, 0.56), // index fingers
    (0.64, 0.56),
    (0.37, 0.54), // thumbs
    (0.63, 0.54),
    (0.45, 0.55), // hips
    (0.55, 0.55),
    (0.45, 0.72), // knees
    (0.55, 0.72),
    (0.45, 0.88), // ankles
    (0.55, 0.88),
    (0.44, 0.90), // heels
    (0.56, 0.90),
    (0.47, 0.92), // foot tips
    (0.53, 0.92),
];

/// Simulator configuration
#[derive(Clone, Debug)]
pub struct DancerConfig {
    /// Bodies in view (0 to 2)
    pub players: usize,
    /// Swing frequency in Hz
    pub tempo: f32,
    /// Swing amplitude in sensor units
    pub amplitude: f32,
    /// Uniform jitter added to every coordinate
    pub jitter: f32,
}

impl Default for DancerConfig {
    fn default() -> Self {
        DancerConfig {
            players: 1,
            tempo: 0.5,
            amplitude: 0.06,
            jitter: 0.002,
        }
    }
}

impl DancerConfig {
    /// One dancer
    pub fn solo() -> Self {
        Self::default()
    }

    /// Two dancers side by side
    pub fn duet() -> Self {
        DancerConfig {
            players: 2,
            ..Self::default()
        }
    }

    /// Nobody in view
    pub fn empty() -> Self {
        DancerConfig {
            players: 0,
            ..Self::default()
        }
    }
}

/// Deterministic (per seed) generator of detection batches
pub struct DancerSimulator {
    config: DancerConfig,
    rng: StdRng,
    hands_up: bool,
    frames: u64,
}

impl DancerSimulator {
    pub fn new(config: DancerConfig, seed: u64) -> Self {
        DancerSimulator {
            config,
            rng: StdRng::seed_from_u64(seed),
            hands_up: false,
            frames: 0,
        }
    }

    pub fn solo(seed: u64) -> Self {
        Self::new(DancerConfig::solo(), seed)
    }

    pub fn duet(seed: u64) -> Self {
        Self::new(DancerConfig::duet(), seed)
    }

    pub fn players(&self) -> usize {
        self.config.players
    }

    /// Change how many bodies are in view
    pub fn set_players(&mut self, players: usize) {
        self.config.players = players.min(MAX_BODIES);
    }

    /// Raise (or lower) every dancer's right hand above the eye
    pub fn set_hands_up(&mut self, hands_up: bool) {
        self.hands_up = hands_up;
    }

    /// Frames generated so far
    pub fn frames(&self) -> u64 {
        self.frames
    }

    /// One body at time `t`
    pub fn body(&mut self, index: usize, t: Duration) -> JointSet {
        let players = self.config.players.max(1);
        let lane = if players == 2 {
            (index as f32 - 0.5) * 0.3
        } else {
            0.0
        };
        let phase = t.as_secs_f32() * self.config.tempo * std::f32::consts::TAU + index as f32;
        let swing = phase.sin() * self.config.amplitude;
        let step = phase.cos() * self.config.amplitude * 0.5;

        let mut landmarks = [Landmark::default(); JOINT_COUNT];
        for (i, slot) in landmarks.iter_mut().enumerate() {
            let (mut x, mut y) = BASE_POSE[i];
            match Joint::from_index(i) {
                Some(Joint::LeftElbow) | Some(Joint::RightElbow) => y -= swing * 0.5,
                Some(
                    Joint::LeftWrist
                    | Joint::RightWrist
                    | Joint::LeftPinky
                    | Joint::RightPinky
                    | Joint::LeftIndex
                    | Joint::RightIndex
                    | Joint::LeftThumb
                    | Joint::RightThumb,
                ) => y -= swing,
                Some(Joint::LeftKnee | Joint::LeftAnkle | Joint::LeftHeel | Joint::LeftFootIndex) => {
                    x += step
                }
                Some(
                    Joint::RightKnee | Joint::RightAnkle | Joint::RightHeel | Joint::RightFootIndex,
                ) => x -= step,
                _ => {}
            }

            let jitter = self.config.jitter;
            if jitter > 0.0 {
                x += self.rng.gen_range(-jitter..jitter);
                y += self.rng.gen_range(-jitter..jitter);
            }
            *slot = Landmark::new((x + lane).clamp(0.0, 1.0), y.clamp(0.0, 1.0));
        }

        let mut body = JointSet::new(landmarks);
        if self.hands_up {
            let eye = *body.joint(Joint::RightEye);
            body = body.with_joint(Joint::RightWrist, Landmark::new(eye.x + 0.05, eye.y - 0.08));
        }
        body
    }

    /// Detection batch at time `t`
    pub fn frame(&mut self, t: Duration) -> PoseBatch {
        self.frames += 1;
        let bodies = (0..self.config.players.min(MAX_BODIES))
            .map(|i| self.body(i, t))
            .collect();
        PoseBatch::new(bodies)
    }
}

/// Feed `frames` batches into a channel at `interval`, as a sensor would
pub async fn run_sensor(
    mut simulator: DancerSimulator,
    sender: mpsc::Sender<PoseBatch>,
    frames: u64,
    interval: Duration,
) -> DancerSimulator {
    let mut ticker = tokio::time::interval(interval);
    let mut elapsed = Duration::ZERO;
    for i in 0..frames {
        ticker.tick().await;
        let batch = simulator.frame(elapsed);
        if sender.send(batch).await.is_err() {
            tracing::debug!(sent = i, "sensor receiver closed");
            break;
        }
        elapsed = elapsed.saturating_add(interval);
    }
    simulator
}
