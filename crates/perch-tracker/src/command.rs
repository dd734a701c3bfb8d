//! Mapping from fusion output to discrete gimbal steps.
//!
//! This is consumer policy, deliberately outside the engine: dead zone
//! against jitter hunting, per-axis gain, a symmetric step clamp, and
//! an optional blend of the engine's lead estimate into the commanded
//! offset.

use std::path::PathBuf;

use perch_core::fusion::{FusionConfig, FusionOutput, TrackingMode};

#[derive(Debug, Clone)]
pub struct TrackerConfig {
    // GPS
    pub gps_uri: String,
    pub gps_enabled: bool,

    // Gimbal
    pub gimbal_port: String,
    pub gimbal_enabled: bool,

    // Tracking
    /// Offsets with magnitude at or below this command no motion.
    pub dead_zone: f64,
    pub gain_pan: f64,
    pub gain_tilt: f64,
    pub max_step: i64,
    /// Below this confidence, nothing is commanded.
    pub min_confidence: f64,

    // Prediction blending
    pub prediction_enabled: bool,
    /// Fraction of the predicted offset mixed into the command.
    pub prediction_blend: f64,

    // Loop
    pub tick_hz: f64,
    pub duration_s: Option<f64>,
    pub telemetry_path: Option<PathBuf>,

    pub fusion: FusionConfig,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            gps_uri: "ws://192.168.1.100:8765".to_string(),
            gps_enabled: true,
            gimbal_port: "/dev/ttyACM0".to_string(),
            gimbal_enabled: true,
            dead_zone: 0.08,
            gain_pan: 40.0,
            gain_tilt: 30.0,
            max_step: 150,
            min_confidence: 0.1,
            prediction_enabled: true,
            prediction_blend: 0.3,
            tick_hz: 15.0,
            duration_s: None,
            telemetry_path: None,
            fusion: FusionConfig::default(),
        }
    }
}

/// Convert one fusion output into relative gimbal steps.
pub fn step_command(out: &FusionOutput, config: &TrackerConfig) -> (i64, i64) {
    if out.confidence < config.min_confidence {
        return (0, 0);
    }

    let mut pan_offset = out.pan_offset;
    let mut tilt_offset = out.tilt_offset;

    // Lead the moving subject a little when GPS backs the visual track.
    if config.prediction_enabled && out.mode == TrackingMode::GpsAssisted {
        if let (Some(pp), Some(pt)) = (out.predicted_pan, out.predicted_tilt) {
            let blend = config.prediction_blend;
            pan_offset = (1.0 - blend) * pan_offset + blend * pp;
            tilt_offset = (1.0 - blend) * tilt_offset + blend * pt;
        }
    }

    (
        axis_step(pan_offset, config.dead_zone, config.gain_pan, config.max_step),
        axis_step(
            tilt_offset,
            config.dead_zone,
            config.gain_tilt,
            config.max_step,
        ),
    )
}

fn axis_step(offset: f64, dead_zone: f64, gain: f64, max_step: i64) -> i64 {
    if offset.abs() <= dead_zone {
        return 0;
    }
    ((offset * gain) as i64).clamp(-max_step, max_step)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn output(mode: TrackingMode, pan: f64, tilt: f64, confidence: f64) -> FusionOutput {
        FusionOutput {
            mode,
            pan_offset: pan,
            tilt_offset: tilt,
            confidence,
            gps_distance: None,
            gps_bearing: None,
            predicted_pan: None,
            predicted_tilt: None,
            expected_size_px: None,
        }
    }

    #[test]
    fn low_confidence_commands_nothing() {
        let config = TrackerConfig::default();
        let out = output(TrackingMode::Visual, 0.9, 0.9, 0.05);
        assert_eq!(step_command(&out, &config), (0, 0));
    }

    #[test]
    fn dead_zone_suppresses_small_offsets() {
        let config = TrackerConfig::default();
        let out = output(TrackingMode::Visual, 0.05, -0.07, 0.9);
        assert_eq!(step_command(&out, &config), (0, 0));
    }

    #[test]
    fn gain_and_sign_apply_per_axis() {
        let config = TrackerConfig::default();
        let out = output(TrackingMode::Visual, 0.5, -0.5, 0.9);
        // pan 0.5 * 40 = 20, tilt -0.5 * 30 = -15
        assert_eq!(step_command(&out, &config), (20, -15));
    }

    #[test]
    fn steps_clamp_at_max() {
        let mut config = TrackerConfig::default();
        config.gain_pan = 400.0;
        let out = output(TrackingMode::Visual, 1.0, 0.0, 0.9);
        assert_eq!(step_command(&out, &config).0, 150);
    }

    #[test]
    fn prediction_blends_only_in_gps_assisted() {
        let config = TrackerConfig::default();

        let mut out = output(TrackingMode::GpsAssisted, 0.2, 0.2, 0.9);
        out.predicted_pan = Some(1.0);
        out.predicted_tilt = Some(1.0);
        // 0.7 * 0.2 + 0.3 * 1.0 = 0.44 -> 17 pan, 13 tilt
        assert_eq!(step_command(&out, &config), (17, 13));

        out.mode = TrackingMode::GpsPrimary;
        // No blending outside GPS_ASSISTED; raw 0.2 * gain applies.
        assert_eq!(step_command(&out, &config), (8, 6));
    }

    #[test]
    fn prediction_can_be_disabled() {
        let mut config = TrackerConfig::default();
        config.prediction_enabled = false;

        let mut out = output(TrackingMode::GpsAssisted, 0.2, 0.2, 0.9);
        out.predicted_pan = Some(1.0);
        out.predicted_tilt = Some(1.0);
        assert_eq!(step_command(&out, &config), (8, 6));
    }
}
