//! Per-tick CSV session log.

use std::fs::File;
use std::path::Path;

use anyhow::Result;
use perch_core::fusion::FusionOutput;

pub struct TelemetryWriter {
    writer: csv::Writer<File>,
}

impl TelemetryWriter {
    pub fn create(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let mut writer = csv::Writer::from_path(path)?;
        writer.write_record([
            "time",
            "mode",
            "pan_offset",
            "tilt_offset",
            "confidence",
            "gps_distance_m",
            "gps_bearing_deg",
            "predicted_pan",
            "predicted_tilt",
            "expected_size_px",
            "pan_step",
            "tilt_step",
        ])?;
        Ok(Self { writer })
    }

    pub fn record(
        &mut self,
        time: f64,
        out: &FusionOutput,
        steps: (i64, i64),
    ) -> Result<()> {
        let opt = |v: Option<f64>| v.map(|x| format!("{x:.4}")).unwrap_or_default();

        self.writer.write_record(&[
            format!("{time:.3}"),
            out.mode.label().to_string(),
            format!("{:.4}", out.pan_offset),
            format!("{:.4}", out.tilt_offset),
            format!("{:.3}", out.confidence),
            opt(out.gps_distance),
            opt(out.gps_bearing),
            opt(out.predicted_pan),
            opt(out.predicted_tilt),
            opt(out.expected_size_px),
            format!("{}", steps.0),
            format!("{}", steps.1),
        ])?;
        Ok(())
    }

    pub fn flush(&mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }
}
