//! DUET Runtime - Running the installation
//!
//! This crate sequences everything between the sensor and the renderer:
//! 1. Capture detections into the session's buffers
//! 2. Predict mirrored poses while the models are live
//! 3. Watch for the raised-hand gesture
//! 4. Advance timers (pre-roll, recording, countdowns)
//! 5. Hand finished captures to the mirrored trainer
//! 6. Publish the latest frame snapshot
//! 7. Reconstruct and render live, ghost and AI bodies
//! 8. Step physics

pub mod config;
pub mod countdown;
pub mod gesture;
pub mod installation;
pub mod predictor;
pub mod session;
pub mod sink;
pub mod snapshot;

pub use config::*;
pub use countdown::*;
pub use gesture::*;
pub use installation::*;
pub use predictor::*;
pub use session::*;
pub use sink::*;
pub use snapshot::*;
