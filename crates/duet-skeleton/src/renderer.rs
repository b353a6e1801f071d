//! Renderer and physics seams, plus frame composition

use serde::{Deserialize, Serialize};

use duet_core::JointSet;

use crate::{reconstruct, RenderPrimitive};

/// Default base strength of a primitive
pub const DEFAULT_STRENGTH: f32 = 0.033;

/// Default arm subdivision count
pub const DEFAULT_SUBDIVISIONS: usize = 8;

/// Slider-controlled rendering scalars
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderSettings {
    /// Base strength of every primitive, in [0, 1]
    pub strength: f32,
    /// Interpolated points per arm bone, at least 1
    pub subdivisions: usize,
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self {
            strength: DEFAULT_STRENGTH,
            subdivisions: DEFAULT_SUBDIVISIONS,
        }
    }
}

impl RenderSettings {
    pub fn set_strength(&mut self, strength: f32) {
        self.strength = if strength.is_nan() {
            DEFAULT_STRENGTH
        } else {
            strength.clamp(0.0, 1.0)
        };
    }

    pub fn set_subdivisions(&mut self, subdivisions: usize) {
        self.subdivisions = subdivisions.max(1);
    }

    /// Copy with both values pulled back into range
    pub fn sanitized(mut self) -> Self {
        self.set_strength(self.strength);
        self.set_subdivisions(self.subdivisions);
        self
    }
}

/// External scalar-field (marching cubes) renderer
pub trait ScalarFieldRenderer {
    /// Drop all primitives of the previous frame
    fn reset(&mut self);

    fn add_primitive(&mut self, primitive: &RenderPrimitive);

    /// Polygonize the accumulated field
    fn update(&mut self);
}

/// External physics world, stepped once per render tick
pub trait PhysicsStepper {
    fn step(&mut self);
}

/// Compose and submit one full frame.
///
/// Bodies are drawn in slice order (live bodies first, then AI or replayed
/// bodies), each in the lane of its position. Returns the number of
/// primitives submitted.
pub fn render_frame<R: ScalarFieldRenderer + ?Sized>(
    renderer: &mut R,
    bodies: &[JointSet],
    total_tracked_bodies: usize,
    settings: &RenderSettings,
) -> usize {
    renderer.reset();
    let mut submitted = 0;
    for (index, body) in bodies.iter().enumerate() {
        for primitive in reconstruct(
            body,
            index,
            total_tracked_bodies,
            settings.strength,
            settings.subdivisions,
        ) {
            renderer.add_primitive(&primitive);
            submitted += 1;
        }
    }
    renderer.update();
    tracing::trace!(bodies = bodies.len(), primitives = submitted, "frame rendered");
    submitted
}

/// Renderer that keeps the last completed frame in memory
#[derive(Debug, Default)]
pub struct PrimitiveRecorder {
    pending: Vec<RenderPrimitive>,
    frame: Vec<RenderPrimitive>,
    frames: u64,
}

impl PrimitiveRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Primitives of the last completed frame
    pub fn last_frame(&self) -> &[RenderPrimitive] {
        &self.frame
    }

    /// Completed frames so far
    pub fn frames(&self) -> u64 {
        self.frames
    }

    /// Distinct body indices in the last frame
    pub fn bodies_in_last_frame(&self) -> usize {
        let mut seen: Vec<usize> = self.frame.iter().map(|p| p.body_index).collect();
        seen.sort_unstable();
        seen.dedup();
        seen.len()
    }
}

impl ScalarFieldRenderer for PrimitiveRecorder {
    fn reset(&mut self) {
        self.pending.clear();
    }

    fn add_primitive(&mut self, primitive: &RenderPrimitive) {
        self.pending.push(*primitive);
    }

    fn update(&mut self) {
        std::mem::swap(&mut self.frame, &mut self.pending);
        self.pending.clear();
        self.frames += 1;
    }
}

/// Physics stepper that only counts steps
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopPhysics {
    steps: u64,
}

impl NoopPhysics {
    pub fn steps(&self) -> u64 {
        self.steps
    }
}

impl PhysicsStepper for NoopPhysics {
    fn step(&mut self) {
        self.steps += 1;
    }
}
