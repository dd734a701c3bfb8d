//! Geographic calculations for GPS-based gimbal pointing.
//!
//! Heading sources, in order of preference:
//! 1. Motor position after homing (pan = 0 is "forward"). No
//!    magnetometer interference from the stepper motors.
//! 2. Compass heading carried on the platform fix. Keep the phone a
//!    meter or more away from the motors.
//! 3. None. The relative bearing falls back to the absolute bearing.

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Spherical Earth radius in meters.
pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Reported speeds below this are GPS jitter, not motion.
pub const SPEED_FLOOR_MPS: f64 = 0.1;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// A geodetic fix. Optional fields stay `None` when the source did not
/// report them; `None` and `0.0` mean different things downstream.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoPoint {
    /// Latitude in degrees.
    pub lat: f64,
    /// Longitude in degrees.
    pub lon: f64,
    /// Meters above the reference.
    pub alt: Option<f64>,
    /// Compass heading in degrees, 0 = north.
    pub heading: Option<f64>,
    /// Ground speed in m/s.
    pub speed: Option<f64>,
    /// Course over ground in degrees.
    pub course: Option<f64>,
    /// Capture time in seconds (same domain as the engine clock).
    pub timestamp: Option<f64>,
    /// Horizontal accuracy in meters.
    pub accuracy: Option<f64>,
}

impl GeoPoint {
    /// A fix carrying only a position; everything else unreported.
    pub fn new(lat: f64, lon: f64) -> Self {
        Self {
            lat,
            lon,
            alt: None,
            heading: None,
            speed: None,
            course: None,
            timestamp: None,
            accuracy: None,
        }
    }
}

/// Subject position relative to the platform.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RelativePosition {
    /// Degrees from north, [0, 360).
    pub bearing: f64,
    /// Meters.
    pub distance: f64,
    /// Meters, positive = subject above the platform.
    pub altitude_diff: f64,
    /// Degrees relative to the platform heading. (-180, 180] when a
    /// heading reference exists, otherwise equal to `bearing`.
    pub relative_bearing: f64,
}

// ---------------------------------------------------------------------------
// Great-circle math
// ---------------------------------------------------------------------------

/// Great-circle distance between two points in meters (haversine).
pub fn distance(p1: &GeoPoint, p2: &GeoPoint) -> f64 {
    let lat1 = p1.lat.to_radians();
    let lat2 = p2.lat.to_radians();
    let dlat = lat2 - lat1;
    let dlon = (p2.lon - p1.lon).to_radians();

    let a = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());

    EARTH_RADIUS_M * c
}

/// Initial bearing from `p1` to `p2` in degrees, [0, 360). Returns 0 for
/// coincident points.
pub fn bearing(p1: &GeoPoint, p2: &GeoPoint) -> f64 {
    let lat1 = p1.lat.to_radians();
    let lat2 = p2.lat.to_radians();
    let dlon = (p2.lon - p1.lon).to_radians();

    let x = dlon.sin() * lat2.cos();
    let y = lat1.cos() * lat2.sin() - lat1.sin() * lat2.cos() * dlon.cos();

    x.atan2(y).to_degrees().rem_euclid(360.0)
}

/// Normalize an angle into (-180, 180] degrees. Terminates for any
/// finite input, however many revolutions away.
pub fn normalize_angle(mut angle: f64) -> f64 {
    while angle > 180.0 {
        angle -= 360.0;
    }
    while angle <= -180.0 {
        angle += 360.0;
    }
    angle
}

/// Gimbal heading derived from the pan motor position after homing.
///
/// `initial_heading` is the real-world heading the gimbal faced at home
/// (0 when only a relative heading is needed).
pub fn heading_from_motor_position(
    pan_steps: i64,
    initial_heading: f64,
    steps_per_degree: f64,
) -> f64 {
    (initial_heading + pan_steps as f64 / steps_per_degree).rem_euclid(360.0)
}

/// Subject position relative to the platform.
///
/// Heading priority: `motor_heading` argument, then the platform's
/// compass heading, then none (relative bearing stays absolute).
/// Altitude difference is 0 unless both fixes carry an altitude.
pub fn relative_position(
    platform: &GeoPoint,
    subject: &GeoPoint,
    motor_heading: Option<f64>,
) -> RelativePosition {
    let brg = bearing(platform, subject);
    let dist = distance(platform, subject);

    let altitude_diff = match (platform.alt, subject.alt) {
        (Some(p), Some(s)) => s - p,
        _ => 0.0,
    };

    let relative_bearing = match motor_heading.or(platform.heading) {
        Some(reference) => normalize_angle(brg - reference),
        None => brg,
    };

    RelativePosition {
        bearing: brg,
        distance: dist,
        altitude_diff,
        relative_bearing,
    }
}

/// Pan/tilt pointing angles for a relative position.
///
/// Pan is the relative bearing unchanged. Tilt is measured from the
/// horizontal (positive = up), corrected for the gimbal mount height and
/// the subject's center height, and defined as 0 at zero distance.
pub fn pan_tilt_angles(
    rel: &RelativePosition,
    gimbal_height_m: f64,
    subject_height_m: f64,
) -> (f64, f64) {
    let pan = rel.relative_bearing;

    let effective_alt_diff = rel.altitude_diff + (subject_height_m - gimbal_height_m);
    let tilt = if rel.distance > 0.0 {
        effective_alt_diff.atan2(rel.distance).to_degrees()
    } else {
        0.0
    };

    (pan, tilt)
}

/// Dead-reckon a fix forward along its course.
///
/// Identity when speed or course is unreported or speed is under
/// [`SPEED_FLOOR_MPS`]. The timestamp, when present, advances by `dt`.
pub fn predict_position(point: &GeoPoint, dt_seconds: f64) -> GeoPoint {
    let (speed, course) = match (point.speed, point.course) {
        (Some(s), Some(c)) if s >= SPEED_FLOOR_MPS => (s, c),
        _ => return *point,
    };

    let angular = speed * dt_seconds / EARTH_RADIUS_M;
    let lat1 = point.lat.to_radians();
    let lon1 = point.lon.to_radians();
    let brg = course.to_radians();

    let lat2 = (lat1.sin() * angular.cos() + lat1.cos() * angular.sin() * brg.cos()).asin();
    let lon2 = lon1
        + (brg.sin() * angular.sin() * lat1.cos()).atan2(angular.cos() - lat1.sin() * lat2.sin());

    GeoPoint {
        lat: lat2.to_degrees(),
        lon: lon2.to_degrees(),
        timestamp: point.timestamp.map(|t| t + dt_seconds),
        ..*point
    }
}

/// Expected subject height in pixels at a given distance (pinhole
/// projection). Clamped to the full sensor height inside 1 m.
pub fn expected_apparent_size(
    distance_m: f64,
    subject_height_m: f64,
    focal_length_px: f64,
    sensor_height_px: f64,
) -> f64 {
    if distance_m < 1.0 {
        return sensor_height_px;
    }
    focal_length_px * subject_height_m / distance_m
}
