//! DUET Model - Learning one dancer from the other
//!
//! This crate turns two captured pose sequences into a pair of regressors:
//! - Dataset alignment (index pairing, mirrored roles)
//! - Global min-max normalization bounds
//! - A small dense network backend (ReLU hidden layers, linear output, Adam)
//! - The mirrored trainer running both fits concurrently
//!
//! # Mirrored Training
//!
//! Model A learns person 1 → person 2, model B learns person 2 → person 1
//! from the same capture, so either person can drive the other's avatar.

pub mod backend;
pub mod dataset;
pub mod mlp;
pub mod normalize;
pub mod trainer;

pub use backend::*;
pub use dataset::*;
pub use mlp::*;
pub use normalize::*;
pub use trainer::*;
