//! Hard-iron magnetometer calibration.
//!
//! A [`CalibrationSet`] removes per-axis bias and equalises per-axis gain
//! before the magnetometer is used by the orientation estimator. Sets are
//! exchanged as a two-line CSV:
//!
//! ```text
//! kx, ky, kz, mx_offset, my_offset, mz_offset
//! 1.02,0.97,1.0,-120.5,33.0,410.2
//! ```
//!
//! [`CalibrationCollector`] derives a set from raw readings gathered while
//! the device is rotated through all orientations (`calibrate` mode).

use std::io::{Read, Write};

use log::debug;
use serde::{Deserialize, Serialize};

use crate::error::{ExploreError, Result};
use crate::types::Vec3;

/// Per-axis magnetometer scale and offset.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CalibrationSet {
    pub kx: f64,
    pub ky: f64,
    pub kz: f64,
    pub mx_offset: f64,
    pub my_offset: f64,
    pub mz_offset: f64,
}

impl CalibrationSet {
    /// Calibrate a raw magnetometer reading.
    ///
    /// `m_i = sign_i × k_i × (raw_i − offset_i)` with `sign = (+1, −1, +1)`.
    /// The Y axis of the sensor is mounted inverted relative to X and Z.
    pub fn apply(&self, raw: &Vec3) -> Vec3 {
        Vec3::new(
            self.kx * (raw.x - self.mx_offset),
            -self.ky * (raw.y - self.my_offset),
            self.kz * (raw.z - self.mz_offset),
        )
    }

    /// Read the first calibration row from a headed CSV source.
    ///
    /// Whitespace around headers and values is ignored. An empty source
    /// yields [`ExploreError::MissingCalibration`].
    ///
    /// ```
    /// # use explore_rs::calibration::CalibrationSet;
    /// let csv = "kx, ky, kz, mx_offset, my_offset, mz_offset\n1,1,1,0,0,0\n";
    /// let set = CalibrationSet::from_reader(csv.as_bytes()).unwrap();
    /// assert_eq!(set.kx, 1.0);
    /// ```
    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        let mut csv = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(reader);
        match csv.deserialize::<CalibrationSet>().next() {
            Some(row) => Ok(row?),
            None => Err(ExploreError::MissingCalibration),
        }
    }

    /// Write this set as a headed, single-row CSV.
    pub fn write_csv<W: Write>(&self, writer: W) -> Result<()> {
        let mut csv = csv::Writer::from_writer(writer);
        csv.serialize(self)?;
        csv.flush().map_err(csv::Error::from)?;
        Ok(())
    }
}

// ── Collector ─────────────────────────────────────────────────────────────────

/// Accumulates raw magnetometer extremes and derives a [`CalibrationSet`].
///
/// Offsets are the mid-range of each axis. Scales normalise each axis'
/// half-range to the median half-range of the three axes.
#[derive(Debug, Clone, Default)]
pub struct CalibrationCollector {
    min: Option<Vec3>,
    max: Option<Vec3>,
    count: usize,
}

impl CalibrationCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, raw_mag: &Vec3) {
        self.min = Some(self.min.map_or(*raw_mag, |m| m.inf(raw_mag)));
        self.max = Some(self.max.map_or(*raw_mag, |m| m.sup(raw_mag)));
        self.count += 1;
    }

    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Derive the calibration set, or `None` if any axis never moved.
    pub fn finish(&self) -> Option<CalibrationSet> {
        let (min, max) = (self.min?, self.max?);
        let offset = (min + max) * 0.5;
        let half_range = (max - min) * 0.5;
        if half_range.iter().any(|&k| k <= f64::EPSILON) {
            debug!("calibration: degenerate range {half_range:?} after {} samples", self.count);
            return None;
        }

        let mut sorted = [half_range.x, half_range.y, half_range.z];
        sorted.sort_by(f64::total_cmp);
        let median = sorted[1];

        Some(CalibrationSet {
            kx: median / half_range.x,
            ky: median / half_range.y,
            kz: median / half_range.z,
            mx_offset: offset.x,
            my_offset: offset.y,
            mz_offset: offset.z,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit() -> CalibrationSet {
        CalibrationSet {
            kx: 1.0,
            ky: 1.0,
            kz: 1.0,
            mx_offset: 0.0,
            my_offset: 0.0,
            mz_offset: 0.0,
        }
    }

    #[test]
    fn apply_flips_only_y() {
        let m = unit().apply(&Vec3::new(1.0, 2.0, 3.0));
        assert_eq!(m, Vec3::new(1.0, -2.0, 3.0));
    }

    #[test]
    fn apply_removes_offset_before_scaling() {
        let set = CalibrationSet {
            kx: 2.0,
            ky: 0.5,
            kz: 1.0,
            mx_offset: 10.0,
            my_offset: -4.0,
            mz_offset: 1.0,
        };
        let m = set.apply(&Vec3::new(12.0, 0.0, 1.0));
        assert_eq!(m, Vec3::new(4.0, -2.0, 0.0));
    }

    #[test]
    fn reads_vendor_csv_with_spaces() {
        let text = "kx, ky, kz, mx_offset, my_offset, mz_offset\n\
                    1.02,0.97,1.0,-120.5,33.0,410.2\n";
        let set = CalibrationSet::from_reader(text.as_bytes()).unwrap();
        assert_eq!(set.ky, 0.97);
        assert_eq!(set.mz_offset, 410.2);
    }

    #[test]
    fn empty_csv_is_missing_calibration() {
        let text = "kx, ky, kz, mx_offset, my_offset, mz_offset\n";
        let err = CalibrationSet::from_reader(text.as_bytes()).unwrap_err();
        assert!(matches!(err, ExploreError::MissingCalibration));
    }

    #[test]
    fn malformed_csv_is_reported() {
        let text = "kx, ky, kz, mx_offset, my_offset, mz_offset\n1,2,three,4,5,6\n";
        let err = CalibrationSet::from_reader(text.as_bytes()).unwrap_err();
        assert!(matches!(err, ExploreError::Calibration(_)));
    }

    #[test]
    fn write_then_read_from_file() {
        let set = CalibrationSet {
            kx: 1.1,
            ky: 0.9,
            kz: 1.0,
            mx_offset: -3.5,
            my_offset: 7.25,
            mz_offset: 0.0,
        };
        let file = tempfile::NamedTempFile::new().unwrap();
        set.write_csv(file.reopen().unwrap()).unwrap();
        let back = CalibrationSet::from_reader(file.reopen().unwrap()).unwrap();
        assert_eq!(back, set);
    }

    #[test]
    fn collector_recovers_offsets_and_scales() {
        // An ellipse centred on (100, -50, 20) with half-ranges (200, 100, 150).
        let mut collector = CalibrationCollector::new();
        for i in 0..360 {
            let a = (i as f64).to_radians();
            collector.push(&Vec3::new(
                100.0 + 200.0 * a.cos(),
                -50.0 + 100.0 * a.sin(),
                20.0 + 150.0 * (2.0 * a).cos(),
            ));
        }
        let set = collector.finish().unwrap();
        assert!((set.mx_offset - 100.0).abs() < 1e-9);
        assert!((set.my_offset + 50.0).abs() < 1e-2);
        assert!((set.mz_offset - 20.0).abs() < 1e-9);
        assert!((set.kx - 0.75).abs() < 1e-9);
        assert!((set.ky - 1.5).abs() < 1e-3);
        assert!((set.kz - 1.0).abs() < 1e-9);
    }

    #[test]
    fn collector_needs_motion_on_every_axis() {
        let mut collector = CalibrationCollector::new();
        assert!(collector.finish().is_none());
        collector.push(&Vec3::new(1.0, 2.0, 3.0));
        collector.push(&Vec3::new(5.0, 2.0, 7.0));
        assert!(collector.finish().is_none());
        assert_eq!(collector.len(), 2);
    }
}
