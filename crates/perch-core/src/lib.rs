//! # Perch Core
//!
//! Fusion decision engine for the perch gimbal tracker. This crate holds
//! only the pure decision logic:
//! - Geodesy (great-circle math, bearing/angle helpers, dead-reckoning)
//! - Scalar smoothing filters for the pointing axes
//! - The fusion engine that arbitrates visual vs GPS tracking
//!
//! No I/O happens here. Transports and actuators live in the adapter
//! crates; time is read through an injected [`clock::Clock`] so tests can
//! advance it explicitly.

pub mod clock;
pub mod fusion;
pub mod geo;
pub mod kalman;

// Re-export core types
pub use clock::{Clock, ManualClock, SystemClock};
pub use fusion::{FusionConfig, FusionEngine, FusionOutput, TrackingMode, VisualTarget};
pub use geo::{GeoPoint, RelativePosition};
pub use kalman::ScalarKalman;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
