//! Wire schema for the GPS relay link.
//!
//! Field names match the phone app's JSON payload exactly; changing them
//! breaks compatibility with deployed clients. Extra fields the app
//! sends (v_accuracy_m, battery_pct, seq) are tolerated and ignored.

use perch_core::geo::GeoPoint;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Which device produced a fix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FixSource {
    /// The phone mounted with the gimbal.
    #[serde(rename = "iOS")]
    Platform,
    /// The watch worn by the subject.
    #[serde(rename = "watchOS")]
    Subject,
}

/// One location fix as sent by the relay.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LocationFix {
    pub lat: f64,
    pub lon: f64,
    #[serde(default)]
    pub alt_m: Option<f64>,
    #[serde(default)]
    pub heading_deg: Option<f64>,
    #[serde(default)]
    pub speed_mps: f64,
    #[serde(default)]
    pub course_deg: f64,
    /// Milliseconds since the UNIX epoch.
    pub ts_unix_ms: i64,
    #[serde(default)]
    pub h_accuracy_m: f64,
    pub source: FixSource,
}

impl From<LocationFix> for GeoPoint {
    fn from(fix: LocationFix) -> Self {
        GeoPoint {
            lat: fix.lat,
            lon: fix.lon,
            alt: fix.alt_m,
            heading: fix.heading_deg,
            speed: Some(fix.speed_mps),
            course: Some(fix.course_deg),
            timestamp: Some(fix.ts_unix_ms as f64 / 1000.0),
            accuracy: Some(fix.h_accuracy_m),
        }
    }
}

/// Anything that can arrive on the relay socket.
#[derive(Debug, Clone, PartialEq)]
pub enum Inbound {
    Fix(LocationFix),
    /// Application-level heartbeat; must be answered with [`pong`] or
    /// the peer drops the link after ~15 s.
    Ping(Value),
    Pong(Value),
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
enum Heartbeat {
    Ping {
        #[serde(default)]
        id: Value,
    },
    Pong {
        #[serde(default)]
        id: Value,
    },
}

/// Decode one text frame. Heartbeats carry a `type` field; everything
/// else must be a location fix.
pub fn parse_inbound(text: &str) -> Result<Inbound, serde_json::Error> {
    if let Ok(hb) = serde_json::from_str::<Heartbeat>(text) {
        return Ok(match hb {
            Heartbeat::Ping { id } => Inbound::Ping(id),
            Heartbeat::Pong { id } => Inbound::Pong(id),
        });
    }
    serde_json::from_str::<LocationFix>(text).map(Inbound::Fix)
}

/// Heartbeat reply frame for a ping id.
pub fn pong(id: &Value) -> String {
    serde_json::json!({ "type": "pong", "id": id }).to_string()
}

/// Heartbeat probe frame.
pub fn ping(id: u64) -> String {
    serde_json::json!({ "type": "ping", "id": id }).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_full_fix() {
        let text = r#"{
            "ts_unix_ms": 1700000000500,
            "source": "iOS",
            "lat": 21.3069,
            "lon": -157.8583,
            "alt_m": 10.0,
            "h_accuracy_m": 5.0,
            "v_accuracy_m": 8.0,
            "speed_mps": 0.0,
            "course_deg": 0.0,
            "heading_deg": 45.0,
            "battery_pct": 0.85,
            "seq": 3
        }"#;

        let fix = match parse_inbound(text).unwrap() {
            Inbound::Fix(f) => f,
            other => panic!("expected fix, got {other:?}"),
        };
        assert_eq!(fix.source, FixSource::Platform);
        assert_eq!(fix.alt_m, Some(10.0));
        assert_eq!(fix.heading_deg, Some(45.0));

        let point = GeoPoint::from(fix);
        assert_eq!(point.timestamp, Some(1_700_000_000.5));
        assert_eq!(point.heading, Some(45.0));
    }

    #[test]
    fn missing_optionals_default_without_inventing_altitude() {
        let text = r#"{
            "ts_unix_ms": 1700000001000,
            "source": "watchOS",
            "lat": 21.3079,
            "lon": -157.8573
        }"#;

        let fix = match parse_inbound(text).unwrap() {
            Inbound::Fix(f) => f,
            other => panic!("expected fix, got {other:?}"),
        };
        assert_eq!(fix.source, FixSource::Subject);
        assert_eq!(fix.speed_mps, 0.0);
        assert_eq!(fix.course_deg, 0.0);
        assert_eq!(fix.h_accuracy_m, 0.0);

        // Missing altitude/heading stay missing; defaulted speed becomes
        // a concrete zero.
        let point = GeoPoint::from(fix);
        assert_eq!(point.alt, None);
        assert_eq!(point.heading, None);
        assert_eq!(point.speed, Some(0.0));
    }

    #[test]
    fn detects_heartbeat_ping() {
        let inbound = parse_inbound(r#"{"type":"ping","id":42}"#).unwrap();
        match inbound {
            Inbound::Ping(id) => assert_eq!(id, serde_json::json!(42)),
            other => panic!("expected ping, got {other:?}"),
        }
    }

    #[test]
    fn pong_echoes_the_id() {
        let reply = pong(&serde_json::json!("abc"));
        let parsed: Value = serde_json::from_str(&reply).unwrap();
        assert_eq!(parsed["type"], "pong");
        assert_eq!(parsed["id"], "abc");
    }

    #[test]
    fn rejects_garbage() {
        assert!(parse_inbound("not json").is_err());
        assert!(parse_inbound(r#"{"lat": 1.0}"#).is_err());
    }
}
