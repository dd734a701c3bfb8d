//! Fusion decision engine combining GPS and visual tracking.
//!
//! Owns the last-known visual and geodetic inputs, evaluates their
//! freshness each tick, and emits one normalized pointing command plus a
//! named tracking mode. The mode is recomputed from freshness on every
//! call; the only memory between ticks is the raw inputs, the two axis
//! filters, and the sticky "target was lost" marker.

use crate::clock::{Clock, SystemClock};
use crate::geo::{self, GeoPoint, RelativePosition};
use crate::kalman::ScalarKalman;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Visual observations kept for velocity estimation.
const HISTORY_LEN: usize = 10;

/// Confidence assigned when only GPS is fresh. GPS alone is trusted
/// less than any live visual signal.
const GPS_ONLY_CONFIDENCE: f64 = 0.5;

/// Subject speed above which GPS-assisted mode bothers predicting.
const PREDICTION_SPEED_GATE_MPS: f64 = 0.5;

/// Axis filter tuning. Tighter than the [`ScalarKalman`] defaults to
/// favor responsiveness over lag on a human-scale target.
const AXIS_PROCESS_NOISE: f64 = 0.05;
const AXIS_MEASUREMENT_NOISE: f64 = 0.2;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Current tracking mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum TrackingMode {
    /// No input has ever been seen.
    Idle = 0,
    /// Everything went stale after a target had been acquired.
    Searching = 1,
    /// Fresh detector output, no usable GPS.
    Visual = 2,
    /// Fresh detector output with GPS telemetry alongside.
    GpsAssisted = 3,
    /// Detector stale; pointing from GPS geometry alone.
    GpsPrimary = 4,
}

impl TrackingMode {
    pub fn label(self) -> &'static str {
        match self {
            Self::Idle => "IDLE",
            Self::Searching => "SEARCHING",
            Self::Visual => "VISUAL",
            Self::GpsAssisted => "GPS_ASSISTED",
            Self::GpsPrimary => "GPS_PRIMARY",
        }
    }
}

/// A single detector observation, already reduced to the best candidate.
/// Center and size are normalized to the frame, confidence to [0, 1].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VisualTarget {
    pub cx: f64,
    pub cy: f64,
    pub width: f64,
    pub height: f64,
    pub confidence: f64,
    /// Capture time in seconds (engine clock domain).
    pub timestamp: f64,
}

/// Per-tick engine result. Recomputed fresh each tick; fields that do
/// not apply to the selected mode are `None`, never zero-filled, so a
/// consumer can tell "no GPS data" from "GPS says zero offset".
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FusionOutput {
    pub mode: TrackingMode,
    /// Normalized pan offset, [-1, 1], 0 = boresight.
    pub pan_offset: f64,
    /// Normalized tilt offset, [-1, 1], 0 = boresight.
    pub tilt_offset: f64,
    /// Combined confidence, [0, 1].
    pub confidence: f64,
    /// Distance to the subject in meters (GPS modes only).
    pub gps_distance: Option<f64>,
    /// Bearing to the subject in degrees (GPS modes only).
    pub gps_bearing: Option<f64>,
    /// Dead-reckoned pan offset a prediction horizon ahead.
    pub predicted_pan: Option<f64>,
    /// Dead-reckoned tilt offset a prediction horizon ahead.
    pub predicted_tilt: Option<f64>,
    /// Expected subject height in pixels at the GPS distance.
    pub expected_size_px: Option<f64>,
}

/// Engine configuration. Defaults match the deployed camera rig.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FusionConfig {
    pub frame_width: u32,
    pub frame_height: u32,
    /// Horizontal field of view in degrees.
    pub camera_hfov_deg: f64,
    /// Vertical field of view in degrees.
    pub camera_vfov_deg: f64,
    /// Approximate focal length in pixels, for apparent-size estimates.
    pub focal_length_px: f64,
    /// Seconds before a visual target is considered stale.
    pub visual_timeout_s: f64,
    /// Seconds before a GPS fix is considered stale.
    pub gps_timeout_s: f64,
    /// Seconds to dead-reckon the subject ahead.
    pub prediction_horizon_s: f64,
    /// Gimbal mount height above ground, meters.
    pub gimbal_height_m: f64,
    /// Assumed height of the subject's center, meters.
    pub subject_height_m: f64,
}

impl Default for FusionConfig {
    fn default() -> Self {
        Self {
            frame_width: 640,
            frame_height: 480,
            camera_hfov_deg: 60.0,
            camera_vfov_deg: 45.0,
            focal_length_px: 500.0,
            visual_timeout_s: 1.0,
            gps_timeout_s: 5.0,
            prediction_horizon_s: 0.5,
            gimbal_height_m: 1.0,
            subject_height_m: 1.7,
        }
    }
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

pub struct FusionEngine {
    config: FusionConfig,
    clock: Box<dyn Clock>,

    last_visual: Option<VisualTarget>,
    last_platform: Option<GeoPoint>,
    last_subject: Option<GeoPoint>,

    pan_filter: ScalarKalman,
    tilt_filter: ScalarKalman,

    // Recent observations, oldest evicted first.
    history: [Option<VisualTarget>; HISTORY_LEN],
    history_head: usize,
    history_count: usize,

    /// When the detector first reported the target gone.
    target_lost_at: Option<f64>,
}

impl FusionEngine {
    pub fn new(config: FusionConfig) -> Self {
        Self::with_clock(config, Box::new(SystemClock))
    }

    pub fn with_clock(config: FusionConfig, clock: Box<dyn Clock>) -> Self {
        Self {
            config,
            clock,
            last_visual: None,
            last_platform: None,
            last_subject: None,
            pan_filter: ScalarKalman::new(AXIS_PROCESS_NOISE, AXIS_MEASUREMENT_NOISE),
            tilt_filter: ScalarKalman::new(AXIS_PROCESS_NOISE, AXIS_MEASUREMENT_NOISE),
            history: [None; HISTORY_LEN],
            history_head: 0,
            history_count: 0,
            target_lost_at: None,
        }
    }

    pub fn config(&self) -> &FusionConfig {
        &self.config
    }

    /// When the target went missing, if it is currently lost.
    pub fn lost_since(&self) -> Option<f64> {
        self.target_lost_at
    }

    /// Submit the detector result for this frame. `None` means the
    /// detector ran and saw nothing; the lost marker is set once and not
    /// refreshed by repeated absent frames.
    pub fn update_visual(&mut self, target: Option<VisualTarget>) {
        match target {
            Some(t) => {
                self.last_visual = Some(t);
                self.push_history(t);
                self.target_lost_at = None;
            }
            None => {
                if self.last_visual.is_some() && self.target_lost_at.is_none() {
                    self.target_lost_at = Some(self.clock.now());
                }
            }
        }
    }

    /// Submit GPS fixes. The two streams update independently; a `None`
    /// argument leaves the corresponding stored fix untouched.
    pub fn update_gps(&mut self, platform: Option<GeoPoint>, subject: Option<GeoPoint>) {
        if let Some(p) = platform {
            self.last_platform = Some(p);
        }
        if let Some(s) = subject {
            self.last_subject = Some(s);
        }
    }

    /// The core decision step, run once per tick. Never fails: every
    /// input combination produces a well-formed output.
    pub fn compute(&mut self) -> FusionOutput {
        let now = self.clock.now();

        // A target that aged out without an explicit absent report still
        // counts as lost.
        if self.last_visual.is_some()
            && self.fresh_visual(now).is_none()
            && self.target_lost_at.is_none()
        {
            self.target_lost_at = Some(now);
        }

        let mut pan_offset = 0.0;
        let mut tilt_offset = 0.0;
        let mut confidence = 0.0;
        let mut gps_distance = None;
        let mut gps_bearing = None;
        let mut predicted_pan = None;
        let mut predicted_tilt = None;
        let mut expected_size_px = None;

        let mode = match (self.fresh_visual(now), self.fresh_gps(now)) {
            (Some(target), gps) => {
                (pan_offset, tilt_offset) = visual_to_offset(&target);
                confidence = target.confidence;

                match gps {
                    Some((platform, subject)) => {
                        let rel = geo::relative_position(&platform, &subject, None);
                        gps_distance = Some(rel.distance);
                        gps_bearing = Some(rel.bearing);
                        expected_size_px = Some(self.expected_size(rel.distance));

                        // Lead estimate for the consumer to blend against
                        // the laggier visual offset.
                        if subject.speed.unwrap_or(0.0) > PREDICTION_SPEED_GATE_MPS {
                            let (pp, pt) = self.predicted_offsets(&platform, &subject);
                            predicted_pan = Some(pp);
                            predicted_tilt = Some(pt);
                        }
                        TrackingMode::GpsAssisted
                    }
                    None => TrackingMode::Visual,
                }
            }
            (None, Some((platform, subject))) => {
                let rel = geo::relative_position(&platform, &subject, None);
                (pan_offset, tilt_offset) = self.gps_to_offset(&rel);
                confidence = GPS_ONLY_CONFIDENCE;
                gps_distance = Some(rel.distance);
                gps_bearing = Some(rel.bearing);
                expected_size_px = Some(self.expected_size(rel.distance));

                let (pp, pt) = self.predicted_offsets(&platform, &subject);
                predicted_pan = Some(pp);
                predicted_tilt = Some(pt);

                TrackingMode::GpsPrimary
            }
            (None, None) => {
                if self.target_lost_at.is_some() {
                    TrackingMode::Searching
                } else {
                    TrackingMode::Idle
                }
            }
        };

        if confidence > 0.0 {
            pan_offset = self.pan_filter.update(pan_offset);
            tilt_offset = self.tilt_filter.update(tilt_offset);
        } else {
            // A zero-confidence tick must not leave stale filter state
            // to bias the next real reading.
            self.pan_filter.reset();
            self.tilt_filter.reset();
        }

        FusionOutput {
            mode,
            pan_offset,
            tilt_offset,
            confidence,
            gps_distance,
            gps_bearing,
            predicted_pan,
            predicted_tilt,
            expected_size_px,
        }
    }

    /// Normalized frame velocity (per second) of the visual target,
    /// estimated from the recent history. `None` until at least two
    /// observations span a usable time base.
    pub fn visual_velocity(&self) -> Option<(f64, f64)> {
        let recent = self.recent_history(5);
        let (first, last) = match (recent.first(), recent.last()) {
            (Some(f), Some(l)) if recent.len() >= 2 => (f, l),
            _ => return None,
        };

        let dt = last.timestamp - first.timestamp;
        if dt < 0.05 {
            return None;
        }

        Some(((last.cx - first.cx) / dt, (last.cy - first.cy) / dt))
    }

    // =====================================================================
    // Freshness
    // =====================================================================

    fn fresh_visual(&self, now: f64) -> Option<VisualTarget> {
        self.last_visual
            .filter(|t| now - t.timestamp < self.config.visual_timeout_s)
    }

    /// Both fixes must exist, carry timestamps, and be young enough.
    fn fresh_gps(&self, now: f64) -> Option<(GeoPoint, GeoPoint)> {
        let (platform, subject) = match (self.last_platform, self.last_subject) {
            (Some(p), Some(s)) => (p, s),
            _ => return None,
        };
        match (platform.timestamp, subject.timestamp) {
            (Some(pt), Some(st))
                if now - pt < self.config.gps_timeout_s
                    && now - st < self.config.gps_timeout_s =>
            {
                Some((platform, subject))
            }
            _ => None,
        }
    }

    // =====================================================================
    // Helpers
    // =====================================================================

    /// GPS pan/tilt angles normalized by half the field of view and
    /// clamped to the command range.
    fn gps_to_offset(&self, rel: &RelativePosition) -> (f64, f64) {
        let (pan_deg, tilt_deg) =
            geo::pan_tilt_angles(rel, self.config.gimbal_height_m, self.config.subject_height_m);

        let pan = (pan_deg / (self.config.camera_hfov_deg / 2.0)).clamp(-1.0, 1.0);
        let tilt = (tilt_deg / (self.config.camera_vfov_deg / 2.0)).clamp(-1.0, 1.0);
        (pan, tilt)
    }

    /// Dead-reckon the subject a horizon ahead and express it as
    /// normalized offsets. Stationary subjects predict in place.
    fn predicted_offsets(&self, platform: &GeoPoint, subject: &GeoPoint) -> (f64, f64) {
        let predicted = geo::predict_position(subject, self.config.prediction_horizon_s);
        let rel = geo::relative_position(platform, &predicted, None);
        let (pan_deg, tilt_deg) =
            geo::pan_tilt_angles(&rel, self.config.gimbal_height_m, self.config.subject_height_m);

        (
            pan_deg / (self.config.camera_hfov_deg / 2.0),
            tilt_deg / (self.config.camera_vfov_deg / 2.0),
        )
    }

    fn expected_size(&self, distance_m: f64) -> f64 {
        geo::expected_apparent_size(
            distance_m,
            self.config.subject_height_m,
            self.config.focal_length_px,
            self.config.frame_height as f64,
        )
    }

    fn push_history(&mut self, target: VisualTarget) {
        self.history[self.history_head] = Some(target);
        self.history_head = (self.history_head + 1) % HISTORY_LEN;
        if self.history_count < HISTORY_LEN {
            self.history_count += 1;
        }
    }

    /// Up to `limit` most recent observations, oldest first.
    fn recent_history(&self, limit: usize) -> Vec<VisualTarget> {
        let take = self.history_count.min(limit);
        let mut out = Vec::with_capacity(take);
        for i in (0..take).rev() {
            let idx = (self.history_head + HISTORY_LEN - 1 - i) % HISTORY_LEN;
            if let Some(t) = self.history[idx] {
                out.push(t);
            }
        }
        out
    }

    #[cfg(test)]
    fn history_len(&self) -> usize {
        self.history_count
    }
}

/// Map a normalized frame center onto the [-1, 1] command range.
fn visual_to_offset(target: &VisualTarget) -> (f64, f64) {
    ((target.cx - 0.5) * 2.0, (target.cy - 0.5) * 2.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;

    const T0: f64 = 1_700_000_000.0;

    fn engine(clock: &ManualClock) -> FusionEngine {
        FusionEngine::with_clock(FusionConfig::default(), Box::new(clock.clone()))
    }

    fn platform_fix(now: f64) -> GeoPoint {
        GeoPoint {
            alt: Some(10.0),
            heading: Some(0.0),
            timestamp: Some(now),
            ..GeoPoint::new(37.7749, -122.4194)
        }
    }

    fn subject_fix(now: f64) -> GeoPoint {
        GeoPoint {
            alt: Some(10.0),
            speed: Some(2.0),
            course: Some(45.0),
            timestamp: Some(now),
            ..GeoPoint::new(37.7758, -122.4194)
        }
    }

    fn visual(now: f64) -> VisualTarget {
        VisualTarget {
            cx: 0.6,
            cy: 0.45,
            width: 0.15,
            height: 0.3,
            confidence: 0.85,
            timestamp: now,
        }
    }

    #[test]
    fn idle_before_any_input() {
        let clock = ManualClock::new(T0);
        let mut e = engine(&clock);
        let out = e.compute();
        assert_eq!(out.mode, TrackingMode::Idle);
        assert_eq!(out.pan_offset, 0.0);
        assert_eq!(out.tilt_offset, 0.0);
        assert_eq!(out.confidence, 0.0);
        assert_eq!(out.gps_distance, None);
        assert_eq!(out.predicted_pan, None);
    }

    #[test]
    fn gps_primary_when_only_gps_is_fresh() {
        let clock = ManualClock::new(T0);
        let mut e = engine(&clock);
        e.update_gps(Some(platform_fix(T0)), Some(subject_fix(T0)));

        let out = e.compute();
        assert_eq!(out.mode, TrackingMode::GpsPrimary);
        assert_eq!(out.confidence, GPS_ONLY_CONFIDENCE);

        let dist = out.gps_distance.unwrap();
        assert!((dist - 100.0).abs() < 2.0, "distance {dist:.1}");
        let brg = out.gps_bearing.unwrap();
        assert!(brg < 0.5 || brg > 359.5, "bearing {brg:.2}");

        // Subject moves at 2 m/s, so a prediction is always attached.
        assert!(out.predicted_pan.is_some());
        assert!(out.predicted_tilt.is_some());
        assert!(out.expected_size_px.is_some());
    }

    #[test]
    fn gps_assisted_uses_visual_offset_and_confidence() {
        let clock = ManualClock::new(T0);
        let mut e = engine(&clock);
        e.update_gps(Some(platform_fix(T0)), Some(subject_fix(T0)));
        e.update_visual(Some(visual(T0)));

        let out = e.compute();
        assert_eq!(out.mode, TrackingMode::GpsAssisted);
        assert_eq!(out.confidence, 0.85);
        // Filters cold-start on the first tick, so the smoothed offset
        // equals the raw mapping (0.6 - 0.5) * 2.
        assert!((out.pan_offset - 0.2).abs() < 1e-9);
        assert!((out.tilt_offset - -0.1).abs() < 1e-9);
        assert!(out.gps_distance.is_some());
        assert!(out.predicted_pan.is_some(), "2 m/s subject should predict");
    }

    #[test]
    fn gps_assisted_skips_prediction_for_slow_subject() {
        let clock = ManualClock::new(T0);
        let mut e = engine(&clock);
        let mut subject = subject_fix(T0);
        subject.speed = Some(0.3);
        e.update_gps(Some(platform_fix(T0)), Some(subject));
        e.update_visual(Some(visual(T0)));

        let out = e.compute();
        assert_eq!(out.mode, TrackingMode::GpsAssisted);
        assert_eq!(out.predicted_pan, None);
        assert_eq!(out.predicted_tilt, None);
    }

    #[test]
    fn visual_mode_without_gps() {
        let clock = ManualClock::new(T0);
        let mut e = engine(&clock);
        e.update_visual(Some(visual(T0)));

        let out = e.compute();
        assert_eq!(out.mode, TrackingMode::Visual);
        assert_eq!(out.confidence, 0.85);
        assert_eq!(out.gps_distance, None);
        assert_eq!(out.gps_bearing, None);
        assert_eq!(out.expected_size_px, None);
    }

    #[test]
    fn mode_shifts_from_gps_primary_to_assisted() {
        let clock = ManualClock::new(T0);
        let mut e = engine(&clock);
        e.update_gps(Some(platform_fix(T0)), Some(subject_fix(T0)));
        assert_eq!(e.compute().mode, TrackingMode::GpsPrimary);

        e.update_visual(Some(visual(T0)));
        assert_eq!(e.compute().mode, TrackingMode::GpsAssisted);
    }

    #[test]
    fn stale_visual_with_lost_marker_searches() {
        let clock = ManualClock::new(T0);
        let mut e = engine(&clock);
        e.update_visual(Some(visual(T0)));
        assert_eq!(e.compute().mode, TrackingMode::Visual);

        e.update_visual(None);
        clock.advance(2.0);
        let out = e.compute();
        assert_eq!(out.mode, TrackingMode::Searching);
        assert_eq!(out.confidence, 0.0);
        assert_eq!(out.pan_offset, 0.0);
    }

    #[test]
    fn stale_visual_without_absent_update_still_searches_not_idle() {
        // The target aged out without the detector ever reporting None;
        // the engine still knows a target existed and searches for it.
        let clock = ManualClock::new(T0);
        let mut e = engine(&clock);
        e.update_visual(Some(visual(T0)));
        assert_eq!(e.compute().mode, TrackingMode::Visual);

        clock.advance(2.0);
        assert_eq!(e.compute().mode, TrackingMode::Searching);
    }

    #[test]
    fn lost_marker_is_idempotent() {
        let clock = ManualClock::new(T0);
        let mut e = engine(&clock);
        e.update_visual(Some(visual(T0)));
        e.update_visual(None);
        let lost_at = e.lost_since().unwrap();

        clock.advance(3.0);
        e.update_visual(None);
        assert_eq!(e.lost_since(), Some(lost_at));
    }

    #[test]
    fn reacquisition_clears_lost_marker() {
        let clock = ManualClock::new(T0);
        let mut e = engine(&clock);
        e.update_visual(Some(visual(T0)));
        e.update_visual(None);
        assert!(e.lost_since().is_some());

        clock.advance(0.5);
        e.update_visual(Some(visual(clock.now())));
        assert_eq!(e.lost_since(), None);
        assert_eq!(e.compute().mode, TrackingMode::Visual);
    }

    #[test]
    fn gps_freshness_requires_both_fixes_and_timestamps() {
        let clock = ManualClock::new(T0);
        let mut e = engine(&clock);

        e.update_gps(None, Some(subject_fix(T0)));
        assert_eq!(e.compute().mode, TrackingMode::Idle);

        let mut platform = platform_fix(T0);
        platform.timestamp = None;
        e.update_gps(Some(platform), None);
        assert_eq!(e.compute().mode, TrackingMode::Idle);

        e.update_gps(Some(platform_fix(T0)), None);
        assert_eq!(e.compute().mode, TrackingMode::GpsPrimary);
    }

    #[test]
    fn gps_streams_update_independently() {
        let clock = ManualClock::new(T0);
        let mut e = engine(&clock);
        e.update_gps(Some(platform_fix(T0)), None);
        clock.advance(4.0);
        e.update_gps(None, Some(subject_fix(clock.now())));

        // Platform fix is 4 s old, still under the 5 s timeout.
        assert_eq!(e.compute().mode, TrackingMode::GpsPrimary);

        clock.advance(2.0);
        // Platform fix is now 6 s old even though the subject is 2 s old.
        assert_eq!(e.compute().mode, TrackingMode::Idle);
    }

    #[test]
    fn filters_reset_on_zero_confidence_tick() {
        let clock = ManualClock::new(T0);
        let mut e = engine(&clock);
        e.update_visual(Some(VisualTarget {
            cx: 0.9,
            ..visual(T0)
        }));
        let first = e.compute().pan_offset;
        assert!((first - 0.8).abs() < 1e-9);

        // Lose the target long enough to go stale; the zero-confidence
        // tick must reset the filters.
        e.update_visual(None);
        clock.advance(2.0);
        assert_eq!(e.compute().confidence, 0.0);

        // Reacquired at a different spot: cold start, no smoothing drag.
        e.update_visual(Some(VisualTarget {
            cx: 0.1,
            timestamp: clock.now(),
            ..visual(T0)
        }));
        let out = e.compute();
        assert!((out.pan_offset - -0.8).abs() < 1e-9);
    }

    #[test]
    fn smoothing_applies_on_consecutive_ticks() {
        let clock = ManualClock::new(T0);
        let mut e = engine(&clock);
        e.update_visual(Some(VisualTarget {
            cx: 0.5,
            ..visual(T0)
        }));
        assert_eq!(e.compute().pan_offset, 0.0);

        clock.advance(0.1);
        e.update_visual(Some(VisualTarget {
            cx: 0.9,
            timestamp: clock.now(),
            ..visual(T0)
        }));
        let out = e.compute();
        // Smoothed estimate lags the raw 0.8 measurement.
        assert!(out.pan_offset > 0.0 && out.pan_offset < 0.8);
    }

    #[test]
    fn history_is_bounded() {
        let clock = ManualClock::new(T0);
        let mut e = engine(&clock);
        for i in 0..15 {
            e.update_visual(Some(VisualTarget {
                timestamp: T0 + i as f64 * 0.1,
                ..visual(T0)
            }));
        }
        assert_eq!(e.history_len(), 10);
    }

    #[test]
    fn visual_velocity_from_history() {
        let clock = ManualClock::new(T0);
        let mut e = engine(&clock);
        assert_eq!(e.visual_velocity(), None);

        // Target drifting right at 0.1 frame-widths per second.
        for i in 0..5 {
            let t = i as f64 * 0.2;
            e.update_visual(Some(VisualTarget {
                cx: 0.5 + 0.02 * i as f64,
                timestamp: T0 + t,
                ..visual(T0)
            }));
        }
        let (vx, vy) = e.visual_velocity().unwrap();
        assert!((vx - 0.1).abs() < 1e-9, "vx {vx}");
        assert!(vy.abs() < 1e-9, "vy {vy}");
    }

    #[test]
    fn visual_velocity_rejects_tiny_time_base() {
        let clock = ManualClock::new(T0);
        let mut e = engine(&clock);
        e.update_visual(Some(visual(T0)));
        e.update_visual(Some(VisualTarget {
            cx: 0.7,
            timestamp: T0 + 0.01,
            ..visual(T0)
        }));
        assert_eq!(e.visual_velocity(), None);
    }

    #[test]
    fn gps_primary_offset_is_clamped() {
        let clock = ManualClock::new(T0);
        let mut e = engine(&clock);
        // Subject far east: relative bearing ~90 degrees, way past the
        // 30-degree half-FOV.
        let mut subject = subject_fix(T0);
        subject.lat = 37.7749;
        subject.lon = -122.4094;
        e.update_gps(Some(platform_fix(T0)), Some(subject));

        let out = e.compute();
        assert_eq!(out.mode, TrackingMode::GpsPrimary);
        assert_eq!(out.pan_offset, 1.0);
    }

    #[test]
    fn mode_labels() {
        assert_eq!(TrackingMode::Idle.label(), "IDLE");
        assert_eq!(TrackingMode::GpsAssisted.label(), "GPS_ASSISTED");
    }
}
