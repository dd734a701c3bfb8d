//! Line protocol spoken by the gimbal firmware.
//!
//! Commands: `PING`, `GET_POS`, `GET_STATUS`, `PAN_REL:<n>`,
//! `TILT_REL:<n>`, `PAN_ABS:<n>`, `TILT_ABS:<n>`, `HOME_PAN`,
//! `HOME_TILT`, `HOME_ALL`, `STOP`, `SET_SPEED:<pan>,<tilt>`.
//!
//! Responses: `PONG`, `POS PAN:<n> TILT:<n>`, `OK PAN:<n>` /
//! `OK TILT:<n>` (steps actually moved), `STATUS PN:<b> PP:<b> TN:<b>
//! TP:<b> PH:<b> TH:<b>`, and free-form `HOMED` / `ERROR` lines while
//! homing.

use crate::GimbalError;

/// Limit switch and homing flags as reported by `GET_STATUS`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LimitStatus {
    pub pan_limit_neg: bool,
    pub pan_limit_pos: bool,
    pub tilt_limit_neg: bool,
    pub tilt_limit_pos: bool,
    pub pan_homed: bool,
    pub tilt_homed: bool,
}

/// A value that may not have been refreshed by the device on this call.
///
/// When a reply is unusable the driver keeps commanding against the
/// last position it tracked; that fallback is intentional and visible
/// here instead of being swallowed in a logging branch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reading<T> {
    /// Parsed from a fresh device reply.
    Fresh(T),
    /// The reply was unusable; this is the last value tracked.
    LastKnown(T),
}

impl<T> Reading<T> {
    pub fn value(self) -> T {
        match self {
            Reading::Fresh(v) | Reading::LastKnown(v) => v,
        }
    }

    pub fn is_fresh(&self) -> bool {
        matches!(self, Reading::Fresh(_))
    }
}

fn key_value<'a>(token: &'a str, key: &str) -> Option<&'a str> {
    token.strip_prefix(key)?.strip_prefix(':')
}

/// Parse `POS PAN:<n> TILT:<n>`.
pub fn parse_position(line: &str) -> Result<(i64, i64), GimbalError> {
    let mut parts = line.split_whitespace();
    if parts.next() != Some("POS") {
        return Err(GimbalError::UnexpectedResponse(line.to_string()));
    }
    let pan = parts
        .next()
        .and_then(|t| key_value(t, "PAN"))
        .and_then(|v| v.parse().ok());
    let tilt = parts
        .next()
        .and_then(|t| key_value(t, "TILT"))
        .and_then(|v| v.parse().ok());

    match (pan, tilt) {
        (Some(p), Some(t)) => Ok((p, t)),
        _ => Err(GimbalError::UnexpectedResponse(line.to_string())),
    }
}

/// Parse `OK PAN:<n>` / `OK TILT:<n>` into steps actually moved.
pub fn parse_moved(line: &str) -> Result<i64, GimbalError> {
    let mut parts = line.split_whitespace();
    if parts.next() != Some("OK") {
        return Err(GimbalError::UnexpectedResponse(line.to_string()));
    }
    parts
        .next()
        .and_then(|t| t.split_once(':'))
        .and_then(|(_, v)| v.parse().ok())
        .ok_or_else(|| GimbalError::UnexpectedResponse(line.to_string()))
}

/// Parse `STATUS PN:<b> PP:<b> TN:<b> TP:<b> PH:<b> TH:<b>`.
pub fn parse_status(line: &str) -> Result<LimitStatus, GimbalError> {
    let mut parts = line.split_whitespace();
    if parts.next() != Some("STATUS") {
        return Err(GimbalError::UnexpectedResponse(line.to_string()));
    }

    let mut flag = |key: &str| -> Option<bool> {
        parts
            .next()
            .and_then(|t| key_value(t, key))
            .and_then(|v| v.parse::<u8>().ok())
            .map(|v| v != 0)
    };

    let status = (|| {
        Some(LimitStatus {
            pan_limit_neg: flag("PN")?,
            pan_limit_pos: flag("PP")?,
            tilt_limit_neg: flag("TN")?,
            tilt_limit_pos: flag("TP")?,
            pan_homed: flag("PH")?,
            tilt_homed: flag("TH")?,
        })
    })();

    status.ok_or_else(|| GimbalError::UnexpectedResponse(line.to_string()))
}
