//! DUET Core - Fundamental types and primitives
//!
//! This crate defines the types shared by every part of the installation:
//! - Body joints and the sensor's landmark layout
//! - Joint sets (one body, one frame) and their flat 66D encoding
//! - Session states of the capture/training cycle
//! - The error taxonomy

pub mod joint;
pub mod pose;
pub mod state;
pub mod error;

pub use joint::*;
pub use pose::*;
pub use state::*;
pub use error::*;
