//! DUET Test Harness
//!
//! This crate provides:
//! - A synthetic pose sensor producing one or two dancing bodies
//! - End-to-end session scenarios driven on a simulated clock
//! - Criterion benchmarks for reconstruction and prediction

pub mod scenario;
pub mod simulator;

pub use scenario::*;
pub use simulator::*;
