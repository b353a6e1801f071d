//! DUET Skeleton - Bodies as metaballs
//!
//! The renderer only understands weighted points. This crate turns 2D body
//! joints into those points:
//! - One point per major joint, a strong head blob and a torso column
//! - Interpolated tubes along arm and leg bones (legs denser than arms)
//! - Per-body lanes so up to four bodies stand side by side
//!
//! # Frame Flow
//!
//! Bodies → `reconstruct` → `RenderPrimitive`s → `ScalarFieldRenderer`
//! (reset, add, update), followed by one `PhysicsStepper::step`.

pub mod lane;
pub mod primitive;
pub mod reconstruct;
pub mod renderer;

pub use lane::*;
pub use primitive::*;
pub use reconstruct::*;
pub use renderer::*;
