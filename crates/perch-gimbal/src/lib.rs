//! Serial pan/tilt gimbal driver.
//!
//! The firmware speaks a line-oriented command/response protocol over
//! USB serial (see [`protocol`]). This crate owns the transport, the
//! calibrated travel limits, software clamping, and homing. The
//! controller is generic over a [`Transport`] seam so tests can script
//! device replies without hardware.

pub mod protocol;

use std::io::{Read, Write};
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

pub use protocol::{LimitStatus, Reading};

/// Default response deadline for a single command.
pub const RESPONSE_TIMEOUT: Duration = Duration::from_secs(2);

/// Homing sweeps the full travel at low speed; allow plenty.
pub const HOMING_TIMEOUT: Duration = Duration::from_secs(30);

const DEFAULT_BAUD: u32 = 115_200;

#[derive(Debug, thiserror::Error)]
pub enum GimbalError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error("serial port error: {0}")]
    Serial(#[from] serialport::Error),
    #[error("timed out waiting for a response to {0}")]
    Timeout(String),
    #[error("unexpected response: {0}")]
    UnexpectedResponse(String),
    #[error("homing failed: {0}")]
    HomingFailed(String),
}

// ---------------------------------------------------------------------------
// Limits
// ---------------------------------------------------------------------------

/// Axis travel limits in steps, calibrated against the limit switches.
///
/// Home is 0 on both axes (at the negative switches); pan covers about
/// 178 degrees of travel, tilt about 175.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GimbalLimits {
    pub steps_per_degree_pan: f64,
    pub steps_per_degree_tilt: f64,
    pub pan_min_steps: i64,
    pub pan_max_steps: i64,
    pub tilt_min_steps: i64,
    pub tilt_max_steps: i64,
    pub pan_center_steps: i64,
    pub tilt_center_steps: i64,
}

impl Default for GimbalLimits {
    fn default() -> Self {
        Self {
            steps_per_degree_pan: 23.6,
            steps_per_degree_tilt: 14.86,
            pan_min_steps: 0,
            pan_max_steps: 4200,
            tilt_min_steps: 0,
            tilt_max_steps: 2600,
            pan_center_steps: 2100,
            tilt_center_steps: 1300,
        }
    }
}

impl GimbalLimits {
    pub fn pan_to_steps(&self, degrees: f64) -> i64 {
        (degrees * self.steps_per_degree_pan) as i64
    }

    pub fn tilt_to_steps(&self, degrees: f64) -> i64 {
        (degrees * self.steps_per_degree_tilt) as i64
    }

    pub fn steps_to_pan(&self, steps: i64) -> f64 {
        steps as f64 / self.steps_per_degree_pan
    }

    pub fn steps_to_tilt(&self, steps: i64) -> f64 {
        steps as f64 / self.steps_per_degree_tilt
    }

    pub fn clamp_pan(&self, steps: i64) -> i64 {
        steps.clamp(self.pan_min_steps, self.pan_max_steps)
    }

    pub fn clamp_tilt(&self, steps: i64) -> i64 {
        steps.clamp(self.tilt_min_steps, self.tilt_max_steps)
    }
}

// ---------------------------------------------------------------------------
// Transport
// ---------------------------------------------------------------------------

/// Byte-level seam between the controller and the device.
pub trait Transport {
    fn send_line(&mut self, line: &str) -> Result<(), GimbalError>;
    /// Next complete line, or `None` if the deadline passes first.
    fn read_line(&mut self, timeout: Duration) -> Result<Option<String>, GimbalError>;
    /// Discard anything pending.
    fn drain(&mut self) -> Result<(), GimbalError>;
}

/// USB serial transport.
pub struct SerialTransport {
    port: Box<dyn serialport::SerialPort>,
    buf: Vec<u8>,
}

impl SerialTransport {
    pub fn open(path: &str) -> Result<Self, GimbalError> {
        Self::open_with_baud(path, DEFAULT_BAUD)
    }

    pub fn open_with_baud(path: &str, baud: u32) -> Result<Self, GimbalError> {
        let port = serialport::new(path, baud)
            .timeout(Duration::from_millis(50))
            .open()?;
        info!(path, baud, "gimbal serial port open");
        Ok(Self {
            port,
            buf: Vec::new(),
        })
    }
}

impl Transport for SerialTransport {
    fn send_line(&mut self, line: &str) -> Result<(), GimbalError> {
        self.port.write_all(line.as_bytes())?;
        self.port.write_all(b"\n")?;
        self.port.flush()?;
        Ok(())
    }

    fn read_line(&mut self, timeout: Duration) -> Result<Option<String>, GimbalError> {
        let deadline = Instant::now() + timeout;
        let mut chunk = [0u8; 64];

        loop {
            if let Some(pos) = self.buf.iter().position(|&b| b == b'\n') {
                let raw: Vec<u8> = self.buf.drain(..=pos).collect();
                let line = String::from_utf8_lossy(&raw).trim().to_string();
                if line.is_empty() {
                    continue;
                }
                return Ok(Some(line));
            }

            if Instant::now() >= deadline {
                return Ok(None);
            }

            match self.port.read(&mut chunk) {
                Ok(0) => {}
                Ok(n) => self.buf.extend_from_slice(&chunk[..n]),
                Err(e) if e.kind() == std::io::ErrorKind::TimedOut => {}
                Err(e) => return Err(GimbalError::Io(e)),
            }
        }
    }

    fn drain(&mut self) -> Result<(), GimbalError> {
        self.buf.clear();
        let mut chunk = [0u8; 256];
        loop {
            match self.port.read(&mut chunk) {
                Ok(0) => return Ok(()),
                Ok(_) => {}
                Err(e) if e.kind() == std::io::ErrorKind::TimedOut => return Ok(()),
                Err(e) => return Err(GimbalError::Io(e)),
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Controller
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HomeAxis {
    Pan,
    Tilt,
    All,
}

/// Pan/tilt controller. Tracks the commanded position in steps from
/// home and clamps every move to the soft limits before sending it.
pub struct GimbalController<T> {
    transport: T,
    limits: GimbalLimits,
    pan_steps: i64,
    tilt_steps: i64,
    homed: bool,
}

impl<T: Transport> GimbalController<T> {
    pub fn new(transport: T) -> Self {
        Self::with_limits(transport, GimbalLimits::default())
    }

    pub fn with_limits(transport: T, limits: GimbalLimits) -> Self {
        Self {
            transport,
            limits,
            pan_steps: 0,
            tilt_steps: 0,
            homed: false,
        }
    }

    pub fn limits(&self) -> &GimbalLimits {
        &self.limits
    }

    pub fn is_homed(&self) -> bool {
        self.homed
    }

    /// Commanded position in steps, as tracked by this controller.
    pub fn tracked_position(&self) -> (i64, i64) {
        (self.pan_steps, self.tilt_steps)
    }

    /// Send a command and wait for a response, skipping unrelated lines
    /// when a prefix is expected.
    fn send(&mut self, cmd: &str, expect_prefix: Option<&str>) -> Result<String, GimbalError> {
        self.transport.drain()?;
        self.transport.send_line(cmd)?;

        let deadline = Instant::now() + RESPONSE_TIMEOUT;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Err(GimbalError::Timeout(cmd.to_string()));
            }
            match self.transport.read_line(remaining)? {
                Some(line) => match expect_prefix {
                    Some(prefix) if !line.starts_with(prefix) => {
                        debug!(%line, "skipping unrelated response");
                    }
                    _ => return Ok(line),
                },
                None => return Err(GimbalError::Timeout(cmd.to_string())),
            }
        }
    }

    pub fn ping(&mut self) -> Result<(), GimbalError> {
        let line = self.send("PING", Some("PONG"))?;
        if line == "PONG" {
            Ok(())
        } else {
            Err(GimbalError::UnexpectedResponse(line))
        }
    }

    /// Current position in steps. An unusable reply keeps the tracked
    /// position and says so in the return type.
    pub fn position(&mut self) -> Result<Reading<(i64, i64)>, GimbalError> {
        let line = self.send("GET_POS", Some("POS"))?;
        match protocol::parse_position(&line) {
            Ok((pan, tilt)) => {
                self.pan_steps = pan;
                self.tilt_steps = tilt;
                Ok(Reading::Fresh((pan, tilt)))
            }
            Err(e) => {
                warn!(%line, error = %e, "unusable position reply, keeping last known");
                Ok(Reading::LastKnown((self.pan_steps, self.tilt_steps)))
            }
        }
    }

    /// Current position in degrees from home.
    pub fn position_degrees(&mut self) -> Result<Reading<(f64, f64)>, GimbalError> {
        let reading = self.position()?;
        let to_degrees = |(pan, tilt): (i64, i64)| {
            (
                self.limits.steps_to_pan(pan),
                self.limits.steps_to_tilt(tilt),
            )
        };
        Ok(match reading {
            Reading::Fresh(steps) => Reading::Fresh(to_degrees(steps)),
            Reading::LastKnown(steps) => Reading::LastKnown(to_degrees(steps)),
        })
    }

    pub fn limits_status(&mut self) -> Result<LimitStatus, GimbalError> {
        let line = self.send("GET_STATUS", Some("STATUS"))?;
        protocol::parse_status(&line)
    }

    /// Move relative steps, clamped to the soft limits. Returns the
    /// steps actually moved per axis.
    pub fn move_relative(&mut self, pan: i64, tilt: i64) -> Result<(i64, i64), GimbalError> {
        let mut moved = (0, 0);

        if pan != 0 {
            let target = self.limits.clamp_pan(self.pan_steps + pan);
            let request = target - self.pan_steps;
            if request != 0 {
                moved.0 = self.relative_axis("PAN_REL", request)?;
                self.pan_steps += moved.0;
            }
        }

        if tilt != 0 {
            let target = self.limits.clamp_tilt(self.tilt_steps + tilt);
            let request = target - self.tilt_steps;
            if request != 0 {
                moved.1 = self.relative_axis("TILT_REL", request)?;
                self.tilt_steps += moved.1;
            }
        }

        Ok(moved)
    }

    fn relative_axis(&mut self, cmd: &str, steps: i64) -> Result<i64, GimbalError> {
        let line = self.send(&format!("{cmd}:{steps}"), Some("OK"))?;
        match protocol::parse_moved(&line) {
            Ok(actual) => Ok(actual),
            Err(e) => {
                // The firmware acked but the count was garbled; assume
                // the full move so tracking stays close.
                warn!(%line, error = %e, "unusable move reply, assuming full move");
                Ok(steps)
            }
        }
    }

    pub fn move_relative_degrees(
        &mut self,
        pan_deg: f64,
        tilt_deg: f64,
    ) -> Result<(f64, f64), GimbalError> {
        let (pan, tilt) = self.move_relative(
            self.limits.pan_to_steps(pan_deg),
            self.limits.tilt_to_steps(tilt_deg),
        )?;
        Ok((
            self.limits.steps_to_pan(pan),
            self.limits.steps_to_tilt(tilt),
        ))
    }

    /// Move to an absolute position in steps; `None` leaves an axis put.
    pub fn move_absolute(
        &mut self,
        pan: Option<i64>,
        tilt: Option<i64>,
    ) -> Result<(i64, i64), GimbalError> {
        if let Some(pan) = pan {
            let clamped = self.limits.clamp_pan(pan);
            self.send(&format!("PAN_ABS:{clamped}"), Some("OK"))?;
            self.pan_steps = clamped;
        }
        if let Some(tilt) = tilt {
            let clamped = self.limits.clamp_tilt(tilt);
            self.send(&format!("TILT_ABS:{clamped}"), Some("OK"))?;
            self.tilt_steps = clamped;
        }
        Ok((self.pan_steps, self.tilt_steps))
    }

    /// Move to the middle of both travel ranges.
    pub fn center(&mut self) -> Result<(i64, i64), GimbalError> {
        self.move_absolute(
            Some(self.limits.pan_center_steps),
            Some(self.limits.tilt_center_steps),
        )
    }

    /// Home against the limit switches: drives to the negative switch,
    /// backs off, and zeroes the step counters.
    pub fn home(&mut self, axis: HomeAxis) -> Result<(), GimbalError> {
        let cmd = match axis {
            HomeAxis::Pan => "HOME_PAN",
            HomeAxis::Tilt => "HOME_TILT",
            HomeAxis::All => "HOME_ALL",
        };

        self.transport.drain()?;
        self.transport.send_line(cmd)?;

        let deadline = Instant::now() + HOMING_TIMEOUT;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Err(GimbalError::Timeout(cmd.to_string()));
            }
            match self.transport.read_line(remaining)? {
                Some(line) => {
                    info!(%line, "homing");
                    if line.contains("HOMED") {
                        self.homed = true;
                        self.pan_steps = 0;
                        self.tilt_steps = 0;
                        return Ok(());
                    }
                    if line.contains("ERROR") || line.contains("LIMIT") {
                        return Err(GimbalError::HomingFailed(line));
                    }
                }
                None => return Err(GimbalError::Timeout(cmd.to_string())),
            }
        }
    }

    /// Stop all motion immediately. Does not wait for an ack.
    pub fn emergency_stop(&mut self) -> Result<(), GimbalError> {
        warn!("emergency stop");
        self.transport.send_line("STOP")
    }

    pub fn set_speed(&mut self, pan_sps: u32, tilt_sps: u32) -> Result<(), GimbalError> {
        self.send(&format!("SET_SPEED:{pan_sps},{tilt_sps}"), None)
            .map(|_| ())
    }
}
