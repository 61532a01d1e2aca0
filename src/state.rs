//! Per-session decoder state.
//!
//! A single [`ParserState`] is created for each logical session and passed by
//! `&mut` into every decode and estimate call. It survives transport
//! reconnects; it is replaced wholesale when a new calibration set is loaded.

use crate::calibration::CalibrationSet;
use crate::protocol::TIMESTAMP_UNIT_SECS;
use crate::types::{ReferenceFrame, Vec3};

#[derive(Debug, Clone, Default)]
pub struct ParserState {
    /// Device clock value of the first frame seen. Set once, never changed.
    pub time_offset: Option<u32>,
    pub calibration: Option<CalibrationSet>,
    /// `None` until an orientation packet with usable accel + mag arrives.
    pub reference_frame: Option<ReferenceFrame>,
    pub previous_east: Option<Vec3>,
    pub previous_down: Option<Vec3>,
}

impl ParserState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_calibration(calibration: CalibrationSet) -> Self {
        Self {
            calibration: Some(calibration),
            ..Self::default()
        }
    }

    /// Convert a raw device timestamp into seconds since the session's first
    /// frame.
    ///
    /// The first call latches `time_offset` and returns `0.0`. The
    /// subtraction wraps, so a device clock rollover keeps timestamps
    /// non-negative and increasing.
    pub fn normalize_timestamp(&mut self, device_timestamp: u32) -> f64 {
        let offset = *self.time_offset.get_or_insert(device_timestamp);
        device_timestamp.wrapping_sub(offset) as f64 * TIMESTAMP_UNIT_SECS
    }

    /// `true` once the orientation estimator has a reference frame.
    pub fn is_tracking(&self) -> bool {
        self.reference_frame.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_frame_sets_offset_once() {
        let mut state = ParserState::new();
        assert_eq!(state.normalize_timestamp(1000), 0.0);
        assert_eq!(state.time_offset, Some(1000));

        let t = state.normalize_timestamp(11_000);
        assert!((t - 1.0).abs() < 1e-12);
        assert_eq!(state.time_offset, Some(1000));
    }

    #[test]
    fn increasing_device_clock_gives_non_decreasing_seconds() {
        let mut state = ParserState::new();
        let mut last = -1.0;
        for ts in (5_000u32..200_000).step_by(37) {
            let t = state.normalize_timestamp(ts);
            assert!(t >= 0.0);
            assert!(t >= last);
            last = t;
        }
    }

    #[test]
    fn clock_rollover_stays_monotonic() {
        let mut state = ParserState::new();
        let start = u32::MAX - 10;
        assert_eq!(state.normalize_timestamp(start), 0.0);
        let before = state.normalize_timestamp(u32::MAX);
        let after = state.normalize_timestamp(5);
        assert!(after > before);
        assert!((after - 16.0 * TIMESTAMP_UNIT_SECS).abs() < 1e-12);
    }
}
