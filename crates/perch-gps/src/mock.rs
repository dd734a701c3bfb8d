//! Mock GPS relay for development without the phone.
//!
//! Streams a static platform fix and a subject fix drifting east at
//! walking-pace speed, alternating every 250 ms, with optional Gaussian
//! position jitter. Sends an application-level ping every 10 s so the
//! client's heartbeat path gets exercised.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, Normal};
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::WebSocketStream;
use tracing::{debug, info};

use crate::wire::{self, FixSource, LocationFix};
use crate::GpsError;

/// Approximate meters per degree of latitude.
const METERS_PER_DEG_LAT: f64 = 111_320.0;

/// Interval between fixes from each source.
const FIX_INTERVAL: Duration = Duration::from_millis(250);

/// Interval between application-level pings.
const PING_INTERVAL: Duration = Duration::from_secs(10);

type WsSink = SplitSink<WebSocketStream<TcpStream>, Message>;
type WsSource = SplitStream<WebSocketStream<TcpStream>>;

#[derive(Debug, Clone)]
pub struct MockServerConfig {
    pub host: String,
    pub port: u16,
    /// Std-dev of the per-fix position jitter, meters. 0 disables it.
    pub noise_std_m: f64,
    /// Subject walking speed, m/s (due east).
    pub subject_speed_mps: f64,
    pub seed: u64,
}

impl Default for MockServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8765,
            noise_std_m: 0.0,
            subject_speed_mps: 2.0,
            seed: 42,
        }
    }
}

/// Serve mock fixes until the task is dropped or the listener fails.
pub async fn serve(config: MockServerConfig) -> Result<(), GpsError> {
    let listener = TcpListener::bind((config.host.as_str(), config.port)).await?;
    info!(
        "mock GPS relay on ws://{}:{}",
        config.host, config.port
    );

    loop {
        let (stream, peer) = listener.accept().await?;
        info!(%peer, "mock client connected");
        let config = config.clone();
        tokio::spawn(async move {
            if let Err(e) = handle_client(stream, config).await {
                debug!(%peer, error = %e, "mock client gone");
            }
        });
    }
}

async fn handle_client(stream: TcpStream, config: MockServerConfig) -> Result<(), GpsError> {
    let ws = tokio_tungstenite::accept_async(stream).await?;
    let (mut tx, mut rx) = ws.split();

    let mut rng = StdRng::seed_from_u64(config.seed);
    let jitter = Normal::new(0.0, config.noise_std_m.abs()).ok();

    // Starting positions (Honolulu).
    let platform_lat = 21.3069;
    let platform_lon = -157.8583;
    let subject_lat: f64 = 21.3079;
    let mut subject_lon = -157.8573;

    // Eastward drift per send cycle (two FIX_INTERVALs per cycle).
    let meters_per_deg_lon = METERS_PER_DEG_LAT * subject_lat.to_radians().cos();
    let drift_deg = config.subject_speed_mps * FIX_INTERVAL.as_secs_f64() * 2.0 / meters_per_deg_lon;

    let mut seq: u64 = 0;
    let mut last_ping = tokio::time::Instant::now();

    loop {
        let mut noise = |scale_deg: f64| -> f64 {
            if config.noise_std_m > 0.0 {
                jitter
                    .as_ref()
                    .map(|d| d.sample(&mut rng) * scale_deg)
                    .unwrap_or(0.0)
            } else {
                0.0
            }
        };

        let platform = LocationFix {
            lat: platform_lat + noise(1.0 / METERS_PER_DEG_LAT),
            lon: platform_lon + noise(1.0 / meters_per_deg_lon),
            alt_m: Some(10.0),
            heading_deg: Some(45.0),
            speed_mps: 0.0,
            course_deg: 0.0,
            ts_unix_ms: now_ms(),
            h_accuracy_m: 5.0,
            source: FixSource::Platform,
        };
        send_fix(&mut tx, &platform).await?;

        pump_incoming(&mut rx, FIX_INTERVAL).await?;

        subject_lon += drift_deg;
        let subject = LocationFix {
            lat: subject_lat + noise(1.0 / METERS_PER_DEG_LAT),
            lon: subject_lon + noise(1.0 / meters_per_deg_lon),
            alt_m: Some(12.0),
            heading_deg: None,
            speed_mps: config.subject_speed_mps,
            course_deg: 90.0,
            ts_unix_ms: now_ms(),
            h_accuracy_m: 8.0,
            source: FixSource::Subject,
        };
        send_fix(&mut tx, &subject).await?;

        pump_incoming(&mut rx, FIX_INTERVAL).await?;

        if last_ping.elapsed() >= PING_INTERVAL {
            seq += 1;
            tx.send(Message::Text(wire::ping(seq))).await?;
            last_ping = tokio::time::Instant::now();
        }
    }
}

async fn send_fix(tx: &mut WsSink, fix: &LocationFix) -> Result<(), GpsError> {
    let json = serde_json::to_string(fix).unwrap_or_default();
    tx.send(Message::Text(json)).await?;
    Ok(())
}

/// Drain inbound frames (pongs, closes) for `window`, then return.
async fn pump_incoming(rx: &mut WsSource, window: Duration) -> Result<(), GpsError> {
    let deadline = tokio::time::Instant::now() + window;
    loop {
        let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
        if remaining.is_zero() {
            return Ok(());
        }
        match tokio::time::timeout(remaining, rx.next()).await {
            Ok(Some(Ok(Message::Close(_)))) | Ok(None) => {
                return Err(GpsError::WebSocket(
                    tokio_tungstenite::tungstenite::Error::ConnectionClosed,
                ));
            }
            Ok(Some(Ok(message))) => {
                if let Message::Text(text) = message {
                    debug!(%text, "mock relay inbound");
                }
            }
            Ok(Some(Err(e))) => return Err(GpsError::WebSocket(e)),
            Err(_) => return Ok(()), // window elapsed quietly
        }
    }
}

fn now_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}
