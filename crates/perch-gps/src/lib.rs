//! GPS relay transport for the perch gimbal tracker.
//!
//! The phone relays its own fix (`"iOS"`, the platform) and the watch
//! fix (`"watchOS"`, the subject) over a WebSocket link. This crate owns
//! everything about that link: the field-exact wire schema, a
//! reconnecting background client, and a mock server for development
//! without the phone. Parsed fixes come out as [`perch_core::GeoPoint`]
//! values; malformed payloads are logged and dropped here and never
//! reach the fusion engine.

pub mod client;
pub mod mock;
pub mod wire;

pub use client::{GpsClient, GpsState};
pub use mock::{serve, MockServerConfig};
pub use wire::{FixSource, LocationFix};

/// Transport-level failures. Missing or stale fixes are not errors;
/// they surface as `None`/aged state instead.
#[derive(Debug, thiserror::Error)]
pub enum GpsError {
    #[error("client already running")]
    AlreadyRunning,
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error("websocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),
}
