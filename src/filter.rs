//! Streaming per-channel IIR filtering for ExG samples.
//!
//! The cascade is built once from the sampling rate and the requested
//! stages, then each channel gets its own copy of the delay lines:
//!
//! | Stage | Sections | Design |
//! |---|---|---|
//! | notch | 1 | biquad notch at the mains frequency, Q = 30 |
//! | band-pass | 2 | Butterworth high-pass at `low`, then Butterworth low-pass at `high` |
//!
//! Streaming one sample at a time through [`SignalFilterBank::apply`] gives
//! the same output as [`SignalFilterBank::filter_batch`] over the whole
//! history, because both evaluate the same difference equations from a zero
//! initial state.

use biquad::{
    Biquad, Coefficients, DirectForm2Transposed, ToHertz, Type, Q_BUTTERWORTH_F64,
};
use log::debug;

use crate::error::{ExploreError, Result};
use crate::types::EegData;

/// Quality factor of the mains notch.
pub const NOTCH_Q: f64 = 30.0;

pub struct SignalFilterBank {
    sampling_rate: f64,
    sections: Vec<Coefficients<f64>>,
    /// `channels[ch][section]`, grown on first use of a channel index.
    channels: Vec<Vec<DirectForm2Transposed<f64>>>,
}

impl SignalFilterBank {
    /// Build the cascade.
    ///
    /// # Errors
    /// [`ExploreError::InvalidFilter`] unless `0 < low < high < fs/2` for the
    /// band-pass and `0 < notch < fs/2` for the notch.
    pub fn new(sampling_rate: f64, band_pass: Option<(f64, f64)>, notch: Option<f64>) -> Result<Self> {
        if !(sampling_rate.is_finite() && sampling_rate > 0.0) {
            return Err(ExploreError::InvalidFilter(format!(
                "sampling rate must be positive, got {sampling_rate}"
            )));
        }
        let nyquist = sampling_rate / 2.0;
        let mut sections = Vec::with_capacity(3);

        if let Some(f0) = notch {
            if !(f0 > 0.0 && f0 < nyquist) {
                return Err(ExploreError::InvalidFilter(format!(
                    "notch frequency {f0} Hz must lie in (0, {nyquist}) Hz"
                )));
            }
            sections.push(design(Type::Notch, sampling_rate, f0, NOTCH_Q)?);
        }

        if let Some((low, high)) = band_pass {
            if !(low > 0.0 && low < high && high < nyquist) {
                return Err(ExploreError::InvalidFilter(format!(
                    "band-pass ({low}, {high}) Hz must satisfy 0 < low < high < {nyquist}"
                )));
            }
            sections.push(design(Type::HighPass, sampling_rate, low, Q_BUTTERWORTH_F64)?);
            sections.push(design(Type::LowPass, sampling_rate, high, Q_BUTTERWORTH_F64)?);
        }

        debug!(
            "filter bank: fs={sampling_rate} Hz, notch={notch:?}, band_pass={band_pass:?}, {} sections",
            sections.len()
        );
        Ok(Self {
            sampling_rate,
            sections,
            channels: Vec::new(),
        })
    }

    pub fn sampling_rate(&self) -> f64 {
        self.sampling_rate
    }

    /// `true` when no stage is configured and [`Self::apply`] is the identity.
    pub fn is_passthrough(&self) -> bool {
        self.sections.is_empty()
    }

    /// Filter one sample of `channel`, advancing that channel's state.
    pub fn apply(&mut self, channel: usize, sample: f64) -> f64 {
        if channel >= self.channels.len() {
            let fresh: Vec<_> = self
                .sections
                .iter()
                .map(|c| DirectForm2Transposed::<f64>::new(*c))
                .collect();
            self.channels.resize(channel + 1, fresh);
        }
        self.channels[channel]
            .iter_mut()
            .fold(sample, |x, section| section.run(x))
    }

    /// Filter every sample of an EEG block in place, oldest first.
    pub fn apply_eeg(&mut self, eeg: &mut EegData) {
        for (ch, samples) in eeg.samples.iter_mut().enumerate() {
            for s in samples.iter_mut() {
                *s = self.apply(ch, *s);
            }
        }
    }

    /// Run the cascade over a whole sequence from zero state.
    ///
    /// Does not touch the streaming state.
    pub fn filter_batch(&self, input: &[f64]) -> Vec<f64> {
        let mut signal = input.to_vec();
        for c in &self.sections {
            let (mut x1, mut x2, mut y1, mut y2) = (0.0, 0.0, 0.0, 0.0);
            for v in signal.iter_mut() {
                let x0 = *v;
                let y0 = c.b0 * x0 + c.b1 * x1 + c.b2 * x2 - c.a1 * y1 - c.a2 * y2;
                (x2, x1) = (x1, x0);
                (y2, y1) = (y1, y0);
                *v = y0;
            }
        }
        signal
    }

    /// Clear every channel's delay lines.
    pub fn reset(&mut self) {
        for section in self.channels.iter_mut().flatten() {
            section.reset_state();
        }
    }
}

fn design(kind: Type<f64>, fs: f64, f0: f64, q: f64) -> Result<Coefficients<f64>> {
    Coefficients::<f64>::from_params(kind, fs.hz(), f0.hz(), q)
        .map_err(|e| ExploreError::InvalidFilter(format!("{e:?} designing {f0} Hz section")))
}
