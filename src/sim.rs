//! Synthetic device for running the pipeline without hardware.
//!
//! [`Simulator`] produces an endless, well-formed frame stream at the
//! device's native rates. It is both an [`Iterator`] over [`Frame`]s and a
//! blocking [`Read`] byte source, so it can stand in for a real transport:
//!
//! | Frame | Cadence | Content |
//! |---|---|---|
//! | INFO | once, first | firmware `2.1.0`, 250 Hz, 4 channels |
//! | EEG94 | every step | 12 samples × 4 ch of synthetic EEG |
//! | ORN | every step | slowly wobbling level device |
//! | ENV | every 21st step | slowly draining battery |

use std::f64::consts::PI;
use std::io::{self, Read};
use std::time::{Duration, Instant};

use crate::frame::Frame;
use crate::parse::encode_packet;
use crate::protocol::*;
use crate::types::{
    DeviceInfo, EegData, EnvironmentData, OrientationData, PacketBody, Vec3,
};

/// Samples per channel in each simulated EEG frame.
pub const SAMPLES_PER_FRAME: usize = 12;

const CHANNELS: usize = 4;

/// Device clock ticks (0.1 ms) per EEG sample at 250 Hz.
const TICKS_PER_SAMPLE: u32 = 40;

/// Generate one synthetic EEG sample at time `t` (seconds) for channel `ch`.
///
/// | Component | Frequency | Amplitude |
/// |---|---|---|
/// | Alpha | 10 Hz | ±20 µV, phase-shifted per channel |
/// | Beta | 22 Hz | ±6 µV |
/// | Theta | 6 Hz | ±10 µV |
/// | Noise | — | ±4 µV, deterministic in (t, ch) |
pub fn sim_sample(t: f64, ch: usize) -> f64 {
    let phi = ch as f64 * PI / 2.5;
    let alpha = 20.0 * (2.0 * PI * 10.0 * t + phi).sin();
    let beta = 6.0 * (2.0 * PI * 22.0 * t + phi * 1.7).sin();
    let theta = 10.0 * (2.0 * PI * 6.0 * t + phi * 0.9).sin();
    let nx = t * 1000.7 + ch as f64 * 137.508;
    let noise = ((nx.sin() * 9973.1).fract() - 0.5) * 8.0;
    alpha + beta + theta + noise
}

pub struct Simulator {
    counter: u8,
    device_time: u32,
    step: u64,
    info_sent: bool,
    /// Frames of the current step not yet handed out.
    queue: Vec<Frame>,
    /// Encoded bytes not yet consumed through [`Read`].
    buffer: Vec<u8>,
    cursor: usize,
    /// Wall-clock anchor when frames are paced to real time.
    started: Option<Instant>,
}

impl Default for Simulator {
    fn default() -> Self {
        Self::new()
    }
}

impl Simulator {
    pub fn new() -> Self {
        Self::starting_at(100_000)
    }

    /// Start the device clock at `device_time` ticks.
    pub fn starting_at(device_time: u32) -> Self {
        Self {
            counter: 0,
            device_time,
            step: 0,
            info_sent: false,
            queue: Vec::new(),
            buffer: Vec::new(),
            cursor: 0,
            started: None,
        }
    }

    /// Block before each step until the wall clock catches up with the
    /// simulated device clock, like a real headset would.
    pub fn real_time(mut self) -> Self {
        self.started = Some(Instant::now());
        self
    }

    /// Encode the next `n` frames back to back.
    pub fn bytes(&mut self, n: usize) -> Vec<u8> {
        Iterator::take(Iterator::by_ref(self), n)
            .flat_map(|f| f.to_bytes())
            .collect()
    }

    fn frame(&mut self, id: u8, body: &PacketBody) -> Option<Frame> {
        let payload = encode_packet(id, body)?;
        let frame = Frame::new(id, self.counter, self.device_time, payload);
        self.counter = self.counter.wrapping_add(1);
        Some(frame)
    }

    fn fill_queue(&mut self) {
        if !self.info_sent {
            self.info_sent = true;
            let info = PacketBody::DeviceInfo(DeviceInfo {
                firmware_version: "2.1.0".into(),
                sampling_rate: Some(EEG_FREQUENCY),
                adc_mask: Some(0x0F),
            });
            let frame = self.frame(INFO_ID, &info);
            self.queue.extend(frame);
            return;
        }

        let t0 = self.step as f64 * SAMPLES_PER_FRAME as f64 / EEG_FREQUENCY;
        let dt = 1.0 / EEG_FREQUENCY;
        if let Some(started) = self.started {
            let due = started + Duration::from_secs_f64(t0);
            let now = Instant::now();
            if due > now {
                std::thread::sleep(due - now);
            }
        }

        let eeg = PacketBody::Eeg(EegData {
            channel_count: CHANNELS,
            samples: (0..CHANNELS)
                .map(|ch| {
                    (0..SAMPLES_PER_FRAME)
                        .map(|i| sim_sample(t0 + i as f64 * dt, ch))
                        .collect()
                })
                .collect(),
        });
        let orn = PacketBody::Orientation(OrientationData {
            acc: Vec3::new(
                10.0 * (2.0 * PI * 0.3 * t0).sin(),
                20.0 * (2.0 * PI * 0.5 * t0).cos(),
                1000.0 + 5.0 * (2.0 * PI * 0.1 * t0).sin(),
            ),
            gyro: Vec3::new(
                120.0 * (2.0 * PI * 0.2 * t0).sin(),
                80.0 * (2.0 * PI * 0.3 * t0).cos(),
                50.0 * (2.0 * PI * 0.1 * t0).sin(),
            ),
            mag: Vec3::new(
                300.0 + 20.0 * (2.0 * PI * 0.05 * t0).sin(),
                30.0 * (2.0 * PI * 0.05 * t0).cos(),
                400.0,
            ),
            ned: None,
        });

        let mut frames = Vec::with_capacity(3);
        frames.extend(self.frame(EEG94_ID, &eeg));
        frames.extend(self.frame(ORN_ID, &orn));
        if self.step % 21 == 0 {
            let battery_voltage = (4.1 - t0 / 3000.0).max(3.3);
            let env = PacketBody::Environment(EnvironmentData {
                temperature: 31,
                light: 200.0,
                battery_voltage,
                battery_percent: battery_percent(battery_voltage),
            });
            frames.extend(self.frame(ENV_ID, &env));
        }

        // Queue is consumed from the back.
        frames.reverse();
        self.queue = frames;
        self.device_time = self
            .device_time
            .wrapping_add(TICKS_PER_SAMPLE * SAMPLES_PER_FRAME as u32);
        self.step += 1;
    }
}

impl Iterator for Simulator {
    type Item = Frame;

    fn next(&mut self) -> Option<Frame> {
        if self.queue.is_empty() {
            self.fill_queue();
        }
        self.queue.pop()
    }
}

impl Read for Simulator {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.cursor >= self.buffer.len() {
            self.buffer = match self.next() {
                Some(frame) => frame.to_bytes(),
                None => return Ok(0),
            };
            self.cursor = 0;
        }
        let n = buf.len().min(self.buffer.len() - self.cursor);
        buf[..n].copy_from_slice(&self.buffer[self.cursor..self.cursor + n]);
        self.cursor += n;
        Ok(n)
    }
}
