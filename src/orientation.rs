//! Complementary-filter orientation estimator.
//!
//! Fuses the gyroscope (integrated, drifts) with the accelerometer (gravity,
//! noisy) and the calibrated magnetometer (heading, noisy) into a
//! North-East-Down triad expressed relative to the reference frame captured
//! at initialisation.
//!
//! The estimator itself is stateless. All state lives in
//! [`ParserState`] so that it survives transport reconnects:
//!
//! | State | `reference_frame` | Allowed calls |
//! |---|---|---|
//! | uninitialised | `None` | [`OrientationEstimator::initialize`] |
//! | tracking | `Some` | [`OrientationEstimator::update`] |

use log::{debug, info};
use nalgebra::Matrix3;

use crate::error::{ExploreError, Result};
use crate::protocol::MDPS_TO_RAD_PER_SEC;
use crate::state::ParserState;
use crate::types::{OrientationData, ReferenceFrame, Triad, Vec3};

/// Norms at or below this are treated as "no direction".
const DEGENERATE_NORM: f64 = 1e-9;

/// Blend weights of the complementary filter.
///
/// Empirical constants; the defaults are the values the device was tuned
/// with.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FusionWeights {
    /// Weight of the integrated gyroscope step.
    pub gyro: f64,
    /// Weight of the accelerometer (down) correction.
    pub accel: f64,
    /// Weight of the magnetometer (east) correction.
    pub mag: f64,
    /// Scale applied to the gyroscope rate before blending.
    pub gyro_step: f64,
}

impl Default for FusionWeights {
    fn default() -> Self {
        Self {
            gyro: 0.95,
            accel: 0.025,
            mag: 0.025,
            gyro_step: 0.05,
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct OrientationEstimator {
    weights: FusionWeights,
}

impl OrientationEstimator {
    pub fn new(weights: FusionWeights) -> Self {
        Self { weights }
    }

    pub fn weights(&self) -> &FusionWeights {
        &self.weights
    }

    /// Capture the reference frame from one accelerometer + magnetometer pair.
    ///
    /// Uses the raw magnetometer. Returns `None` and leaves `state`
    /// untouched when the accelerometer is zero or the magnetometer is
    /// parallel to it.
    pub fn initialize(&self, state: &mut ParserState, orn: &OrientationData) -> Option<Triad> {
        let down = unit(&orn.acc)?;
        let east = unit(&down.cross(&orn.mag))?;
        let north = unit(&east.cross(&down))?;

        let measured = Triad { north, east, down };
        let rotation = measured.rotation_matrix();
        let rt = rotation.transpose();
        let triad = Triad {
            north: rt * north,
            east: rt * east,
            down: rt * down,
        };

        state.reference_frame = Some(ReferenceFrame { triad, rotation });
        state.previous_east = Some(east);
        state.previous_down = Some(down);
        info!("orientation: reference frame captured (down={down:?})");
        Some(triad)
    }

    /// Advance the fused estimate by one orientation sample.
    ///
    /// Returns the current triad relative to the reference frame and stores
    /// the un-composed east/down as the next update's previous vectors.
    ///
    /// # Errors
    /// * [`ExploreError::NotInitialized`] before [`Self::initialize`] succeeded.
    /// * [`ExploreError::MissingCalibration`] without a calibration set.
    pub fn update(&self, state: &mut ParserState, orn: &OrientationData) -> Result<Triad> {
        let (reference, prev_east, prev_down) =
            match (state.reference_frame, state.previous_east, state.previous_down) {
                (Some(r), Some(e), Some(d)) => (r, e, d),
                _ => return Err(ExploreError::NotInitialized),
            };
        let calibration = state.calibration.ok_or(ExploreError::MissingCalibration)?;
        let w = &self.weights;

        let down_meas = unit(&orn.acc);
        let mag_cal = calibration.apply(&orn.mag);
        let east_meas = down_meas.and_then(|d| unit(&d.cross(&mag_cal)));

        // A missing measurement contributes no correction.
        let da = down_meas.map_or_else(Vec3::zeros, |d| prev_down.cross(&(d - prev_down)));
        let dm = east_meas.map_or_else(Vec3::zeros, |e| prev_east.cross(&(e - prev_east)));
        if down_meas.is_none() || east_meas.is_none() {
            debug!("orientation: degenerate accel/mag sample, gyro-only step");
        }
        let dg = orn.gyro * MDPS_TO_RAD_PER_SEC * w.gyro_step;
        let dtheta = -w.gyro * dg + w.accel * da + w.mag * dm;

        let down = normalize_or(prev_down + dtheta.cross(&prev_down), prev_down);
        let east = normalize_or(prev_east + dtheta.cross(&prev_east), prev_east);

        let err = down.dot(&east);
        let (down, east) = (
            normalize_or(down - east * (0.5 * err), down),
            normalize_or(east - down * (0.5 * err), east),
        );
        let north = north_of(&east, &down, &prev_east, &prev_down);

        state.previous_east = Some(east);
        state.previous_down = Some(down);

        let current = Triad { north, east, down }.rotation_matrix();
        Ok(compose(&current, &reference))
    }
}

/// Express the reference triad through the rotation accumulated since
/// initialisation: `(R · R₀ᵀ)ᵀ · v₀` for each axis.
fn compose(current: &Matrix3<f64>, reference: &ReferenceFrame) -> Triad {
    let relative = (current * reference.rotation.transpose()).transpose();
    let r = &reference.triad;
    Triad {
        north: normalize_or(relative * r.north, r.north),
        east: normalize_or(relative * r.east, r.east),
        down: normalize_or(relative * r.down, r.down),
    }
}

/// `east × down`, or the previous step's north if east and down collapsed
/// onto one line. Both keep the triad right-handed.
fn north_of(east: &Vec3, down: &Vec3, prev_east: &Vec3, prev_down: &Vec3) -> Vec3 {
    normalize_or(east.cross(down), prev_east.cross(prev_down))
}

fn unit(v: &Vec3) -> Option<Vec3> {
    v.try_normalize(DEGENERATE_NORM)
}

fn normalize_or(v: Vec3, fallback: Vec3) -> Vec3 {
    v.try_normalize(DEGENERATE_NORM).unwrap_or(fallback)
}
