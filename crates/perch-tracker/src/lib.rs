//! Integrated GPS + vision tracking loop.
//!
//! Wires the fusion engine to its collaborators: the GPS relay client
//! feeds `update_gps` from its background thread, the detector layer
//! (behind [`VisualSource`]) feeds `update_visual` once per tick, and
//! each tick's output is mapped to relative gimbal steps. The engine
//! sits behind a single mutex; that lock is the only synchronization
//! boundary in the system.

pub mod command;
pub mod telemetry;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use tracing::{info, warn};

use perch_core::clock::{Clock, SystemClock};
use perch_core::fusion::{FusionEngine, TrackingMode, VisualTarget};
use perch_gimbal::{GimbalController, SerialTransport};
use perch_gps::GpsClient;

pub use command::{step_command, TrackerConfig};
pub use telemetry::TelemetryWriter;

/// Per-frame visual input contract: the detector layer hands over at
/// most one NMS-reduced target per tick.
pub trait VisualSource {
    fn next_target(&mut self) -> Option<VisualTarget>;
}

/// Stand-in detector for GPS-only runs.
pub struct NullVisualSource;

impl VisualSource for NullVisualSource {
    fn next_target(&mut self) -> Option<VisualTarget> {
        None
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionStats {
    pub frames: u64,
    pub detections: u64,
    pub gps_fixes: u64,
    pub mode_changes: u64,
}

pub struct Tracker {
    config: TrackerConfig,
    engine: Arc<Mutex<FusionEngine>>,
    running: Arc<AtomicBool>,
    gps: Option<GpsClient>,
    gimbal: Option<GimbalController<SerialTransport>>,
}

impl Tracker {
    pub fn new(config: TrackerConfig) -> Self {
        let engine = Arc::new(Mutex::new(FusionEngine::new(config.fusion)));
        Self {
            config,
            engine,
            running: Arc::new(AtomicBool::new(false)),
            gps: None,
            gimbal: None,
        }
    }

    /// Flag that stops the loop when cleared (e.g. from a signal
    /// handler).
    pub fn running_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.running)
    }

    fn init_gps(&mut self) -> Result<()> {
        if !self.config.gps_enabled {
            info!("GPS disabled");
            return Ok(());
        }

        info!(uri = %self.config.gps_uri, "starting GPS client");
        let engine = Arc::clone(&self.engine);
        let mut client = GpsClient::new(self.config.gps_uri.clone());
        client.on_update(move |state| {
            engine
                .lock()
                .unwrap()
                .update_gps(state.platform, state.subject);
        });
        client.start().context("starting GPS client")?;
        self.gps = Some(client);
        Ok(())
    }

    fn init_gimbal(&mut self) {
        if !self.config.gimbal_enabled {
            info!("gimbal disabled");
            return;
        }

        match SerialTransport::open(&self.config.gimbal_port) {
            Ok(transport) => {
                let mut gimbal = GimbalController::new(transport);
                match gimbal.ping() {
                    Ok(()) => {
                        info!(port = %self.config.gimbal_port, "gimbal connected");
                        self.gimbal = Some(gimbal);
                    }
                    Err(e) => warn!(error = %e, "gimbal did not answer ping, continuing without it"),
                }
            }
            Err(e) => warn!(error = %e, "gimbal unavailable, continuing without it"),
        }
    }

    /// Run the tracking loop until the duration elapses or the running
    /// flag is cleared. Returns session statistics.
    pub fn run(&mut self, source: &mut dyn VisualSource) -> Result<SessionStats> {
        self.init_gps()?;
        self.init_gimbal();

        let mut telemetry = match &self.config.telemetry_path {
            Some(path) => Some(TelemetryWriter::create(path).context("opening telemetry log")?),
            None => None,
        };

        let mut stats = SessionStats::default();
        let mut last_mode = TrackingMode::Idle;
        let tick = Duration::from_secs_f64(1.0 / self.config.tick_hz.max(0.1));
        let started = Instant::now();
        self.running.store(true, Ordering::SeqCst);

        while self.running.load(Ordering::SeqCst) {
            if let Some(limit) = self.config.duration_s {
                if started.elapsed().as_secs_f64() >= limit {
                    break;
                }
            }

            let target = source.next_target();
            if target.is_some() {
                stats.detections += 1;
            }

            let out = {
                let mut engine = self.engine.lock().unwrap();
                engine.update_visual(target);
                engine.compute()
            };

            if out.mode != last_mode {
                stats.mode_changes += 1;
                info!(from = last_mode.label(), to = out.mode.label(), "tracking mode changed");
                last_mode = out.mode;
            }

            let steps = step_command(&out, &self.config);
            if out.mode != TrackingMode::Idle && steps != (0, 0) {
                if let Some(gimbal) = self.gimbal.as_mut() {
                    if let Err(e) = gimbal.move_relative(steps.0, steps.1) {
                        warn!(error = %e, "gimbal move failed");
                    }
                }
            }

            if let Some(telemetry) = telemetry.as_mut() {
                telemetry.record(SystemClock.now(), &out, steps)?;
            }

            stats.frames += 1;
            std::thread::sleep(tick);
        }

        self.running.store(false, Ordering::SeqCst);

        if let Some(mut client) = self.gps.take() {
            let state = client.state();
            stats.gps_fixes = state.fixes.platform + state.fixes.subject;
            client.stop();
        }
        if let Some(telemetry) = telemetry.as_mut() {
            telemetry.flush()?;
        }

        info!(
            frames = stats.frames,
            detections = stats.detections,
            gps_fixes = stats.gps_fixes,
            mode_changes = stats.mode_changes,
            "session finished"
        );
        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Hands out a fixed number of centered-right detections, then
    /// reports the target gone.
    struct ScriptedSource {
        remaining: u32,
    }

    impl VisualSource for ScriptedSource {
        fn next_target(&mut self) -> Option<VisualTarget> {
            if self.remaining == 0 {
                return None;
            }
            self.remaining -= 1;
            Some(VisualTarget {
                cx: 0.8,
                cy: 0.5,
                width: 0.1,
                height: 0.3,
                confidence: 0.9,
                timestamp: SystemClock.now(),
            })
        }
    }

    fn quick_config() -> TrackerConfig {
        TrackerConfig {
            gps_enabled: false,
            gimbal_enabled: false,
            tick_hz: 100.0,
            duration_s: Some(0.1),
            ..TrackerConfig::default()
        }
    }

    #[test]
    fn session_counts_frames_and_detections() {
        let mut tracker = Tracker::new(quick_config());
        let stats = tracker.run(&mut ScriptedSource { remaining: 3 }).unwrap();

        assert!(stats.frames >= 3, "frames {}", stats.frames);
        assert_eq!(stats.detections, 3);
        // IDLE -> VISUAL on the first detection.
        assert!(stats.mode_changes >= 1);
        assert_eq!(stats.gps_fixes, 0);
    }

    #[test]
    fn null_source_stays_idle() {
        let mut tracker = Tracker::new(quick_config());
        let stats = tracker.run(&mut NullVisualSource).unwrap();

        assert!(stats.frames > 0);
        assert_eq!(stats.detections, 0);
        assert_eq!(stats.mode_changes, 0);
    }
}
