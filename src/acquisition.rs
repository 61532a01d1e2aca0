//! The mode-driven acquisition loop.
//!
//! [`AcquisitionLoop::run`] pulls frames from a blocking byte source,
//! decodes them, runs EEG through the [`SignalFilterBank`] and orientation
//! through the [`OrientationEstimator`] when the mode asks for it, and
//! forwards the result to a [`Sink`].
//!
//! # Modes
//!
//! | Mode | Forwarded | EEG filtered | Orientation |
//! |---|---|---|---|
//! | `print` | every packet | no | — |
//! | `record` | EEG + orientation | no | — |
//! | `stream` | EEG + orientation | no | — |
//! | `visualize` | every decoded packet | yes | tracked, triad attached |
//! | `calibrate` | orientation | no | magnetometer collected |
//! | `initialize` | nothing | no | reference frame, then `visualize` |
//!
//! Device-info packets always reach [`Sink::notify_device_info`], whatever
//! the mode.
//!
//! # Transport faults
//!
//! A [`ExploreError::TruncatedRead`] or [`ExploreError::Transport`] from the
//! reader hands control to the [`Reconnect`] collaborator. Its new byte source
//! is bound into the existing reader and the loop carries on with the same
//! [`ParserState`], filter delay lines and reference frame.

use std::fmt;
use std::io::Read;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use log::{debug, error, info, warn};

use crate::calibration::{CalibrationCollector, CalibrationSet};
use crate::error::{ExploreError, Result};
use crate::filter::SignalFilterBank;
use crate::frame::FrameReader;
use crate::orientation::{FusionWeights, OrientationEstimator};
use crate::parse::decode_frame;
use crate::protocol::{packet_name, DEFAULT_NOTCH_FREQUENCY, EEG_FREQUENCY};
use crate::sink::Sink;
use crate::state::ParserState;
use crate::types::{device_info_fields, Packet, PacketBody};

// ── Mode ──────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Mode {
    #[default]
    Print,
    Record,
    Stream,
    Visualize,
    Calibrate,
    Initialize,
}

impl Mode {
    /// Whether a packet decoded in this mode goes to the sink.
    pub fn forwards(self, body: &PacketBody) -> bool {
        match self {
            Mode::Print => true,
            Mode::Record | Mode::Stream => {
                matches!(body, PacketBody::Eeg(_) | PacketBody::Orientation(_))
            }
            Mode::Visualize => !matches!(body, PacketBody::Unknown { .. }),
            Mode::Calibrate => matches!(body, PacketBody::Orientation(_)),
            Mode::Initialize => false,
        }
    }

    pub fn filters_eeg(self) -> bool {
        self == Mode::Visualize
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Mode::Print => "print",
            Mode::Record => "record",
            Mode::Stream => "stream",
            Mode::Visualize => "visualize",
            Mode::Calibrate => "calibrate",
            Mode::Initialize => "initialize",
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Mode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "print" => Ok(Mode::Print),
            "record" => Ok(Mode::Record),
            "stream" | "lsl" => Ok(Mode::Stream),
            "visualize" | "visualise" => Ok(Mode::Visualize),
            "calibrate" => Ok(Mode::Calibrate),
            "initialize" | "initialise" => Ok(Mode::Initialize),
            other => Err(format!(
                "unknown mode '{other}' (expected print, record, stream, visualize, calibrate or initialize)"
            )),
        }
    }
}

// ── AcquisitionConfig ─────────────────────────────────────────────────────────

/// Configuration for [`AcquisitionLoop`].
#[derive(Debug, Clone)]
pub struct AcquisitionConfig {
    /// Starting mode. `visualize` without a reference frame starts in
    /// `initialize`. Default: `print`.
    pub mode: Mode,
    /// ExG sampling rate used to design the filters. Default: 250 Hz.
    pub sampling_rate: f64,
    /// Band-pass cutoffs `(low, high)` in Hz. Default: none.
    pub band_pass: Option<(f64, f64)>,
    /// Mains notch frequency in Hz. Default: 50 Hz.
    pub notch: Option<f64>,
    /// Stop after this long. Default: run until stopped or aborted.
    pub duration: Option<Duration>,
    /// Magnetometer calibration, required for orientation tracking.
    pub calibration: Option<CalibrationSet>,
    pub weights: FusionWeights,
}

impl Default for AcquisitionConfig {
    fn default() -> Self {
        Self {
            mode: Mode::Print,
            sampling_rate: EEG_FREQUENCY,
            band_pass: None,
            notch: Some(DEFAULT_NOTCH_FREQUENCY),
            duration: None,
            calibration: None,
            weights: FusionWeights::default(),
        }
    }
}

// ── Reconnect ─────────────────────────────────────────────────────────────────

/// Supplies a replacement byte source after a transport fault.
///
/// Called synchronously from the loop; it may block, retry and back off as
/// long as it likes. Returning an error aborts the session.
pub trait Reconnect<R> {
    fn reconnect(&mut self, cause: &ExploreError) -> Result<R>;
}

impl<R, F> Reconnect<R> for F
where
    F: FnMut(&ExploreError) -> Result<R>,
{
    fn reconnect(&mut self, cause: &ExploreError) -> Result<R> {
        self(cause)
    }
}

/// Never reconnects; the first transport fault ends the session.
///
/// The right choice for finite sources such as recorded files.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoReconnect;

impl<R> Reconnect<R> for NoReconnect {
    fn reconnect(&mut self, cause: &ExploreError) -> Result<R> {
        Err(ExploreError::ReconnectFailed(format!(
            "reconnect disabled ({cause})"
        )))
    }
}

// ── LoopStats ─────────────────────────────────────────────────────────────────

/// Counters reported by [`AcquisitionLoop::run`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoopStats {
    /// Frames read and decoded.
    pub frames: u64,
    /// Packets handed to [`Sink::push`].
    pub forwarded: u64,
    /// Frames dropped for an invalid declared length.
    pub dropped: u64,
    /// Packets that decoded to `Unknown`.
    pub unknown: u64,
    pub reconnects: u64,
}

// ── AcquisitionLoop ───────────────────────────────────────────────────────────

pub struct AcquisitionLoop<R, C, S> {
    reader: FrameReader<R>,
    reconnect: C,
    sink: S,
    mode: Mode,
    state: ParserState,
    filters: SignalFilterBank,
    estimator: OrientationEstimator,
    collector: CalibrationCollector,
    duration: Option<Duration>,
    stop: Arc<AtomicBool>,
    firmware_version: Option<String>,
    stats: LoopStats,
}

impl<R: Read, C: Reconnect<R>, S: Sink> AcquisitionLoop<R, C, S> {
    /// Build a loop over `source`.
    ///
    /// # Errors
    /// [`ExploreError::InvalidFilter`] if the filter settings are unusable.
    pub fn new(source: R, reconnect: C, sink: S, config: AcquisitionConfig) -> Result<Self> {
        let filters = SignalFilterBank::new(config.sampling_rate, config.band_pass, config.notch)?;
        let state = match config.calibration {
            Some(cal) => ParserState::with_calibration(cal),
            None => ParserState::new(),
        };
        let mode = match config.mode {
            Mode::Visualize => {
                info!("acquisition: no reference frame yet, initializing before visualize");
                Mode::Initialize
            }
            m => m,
        };

        Ok(Self {
            reader: FrameReader::new(source),
            reconnect,
            sink,
            mode,
            state,
            filters,
            estimator: OrientationEstimator::new(config.weights),
            collector: CalibrationCollector::new(),
            duration: config.duration,
            stop: Arc::new(AtomicBool::new(false)),
            firmware_version: None,
            stats: LoopStats::default(),
        })
    }

    /// Flag that stops [`Self::run`] before its next frame read when set.
    pub fn stop_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.stop)
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn state(&self) -> &ParserState {
        &self.state
    }

    pub fn stats(&self) -> LoopStats {
        self.stats
    }

    /// Firmware version from the most recent device-info packet.
    pub fn firmware_version(&self) -> Option<&str> {
        self.firmware_version.as_deref()
    }

    /// Calibration derived from the magnetometer samples seen in
    /// `calibrate` mode, once every axis has moved.
    pub fn calibration_result(&self) -> Option<CalibrationSet> {
        self.collector.finish()
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn into_sink(self) -> S {
        self.sink
    }

    /// Run until the deadline passes, the stop flag is set, or an
    /// unrecoverable error occurs.
    ///
    /// # Errors
    /// * Whatever the [`Reconnect`] collaborator returns when it gives up.
    /// * [`ExploreError::NotInitialized`] / [`ExploreError::MissingCalibration`]
    ///   from orientation tracking.
    pub fn run(&mut self) -> Result<LoopStats> {
        let deadline = self.duration.map(|d| Instant::now() + d);
        info!("acquisition: running in {} mode", self.mode);

        loop {
            if self.stop.load(Ordering::Relaxed) {
                info!("acquisition: stop requested");
                break;
            }
            if deadline.is_some_and(|d| Instant::now() >= d) {
                info!("acquisition: duration elapsed");
                break;
            }

            let frame = match self.reader.read_frame() {
                Ok(frame) => frame,
                Err(e) if e.is_transport() => {
                    self.recover(e)?;
                    continue;
                }
                Err(e @ ExploreError::InvalidFrameLength { .. }) => {
                    warn!("acquisition: dropping frame: {e}");
                    self.stats.dropped += 1;
                    continue;
                }
                Err(e) => return Err(e),
            };

            self.stats.frames += 1;
            let packet = decode_frame(&mut self.state, &frame);
            let n = self.stats.frames;
            if n <= 3 || n % 500 == 0 {
                info!(
                    "acquisition: frame #{n} {} counter={} len={} ts={:.4} s",
                    packet_name(frame.packet_type),
                    frame.counter,
                    frame.payload_length,
                    packet.timestamp
                );
            }
            self.dispatch(packet)?;
        }

        if self.mode == Mode::Calibrate {
            match self.collector.finish() {
                Some(set) => info!("calibration: derived {set:?} from {} samples", self.collector.len()),
                None => warn!(
                    "calibration: {} samples did not cover every axis",
                    self.collector.len()
                ),
            }
        }
        info!("acquisition: finished {:?}", self.stats);
        Ok(self.stats)
    }

    fn recover(&mut self, cause: ExploreError) -> Result<()> {
        warn!("acquisition: transport lost ({cause}), reconnecting…");
        let source = self.reconnect.reconnect(&cause).map_err(|e| {
            error!("acquisition: reconnect failed: {e}");
            e
        })?;
        self.reader.rebind(source);
        self.stats.reconnects += 1;
        info!(
            "acquisition: reconnected (#{}), resuming in {} mode",
            self.stats.reconnects, self.mode
        );
        Ok(())
    }

    fn dispatch(&mut self, mut packet: Packet) -> Result<()> {
        let mode = self.mode;

        match &mut packet.body {
            PacketBody::DeviceInfo(info) => {
                info!("acquisition: device firmware {}", info.firmware_version);
                self.firmware_version = Some(info.firmware_version.clone());
                self.sink.notify_device_info(device_info_fields(info));
            }
            PacketBody::Disconnect => info!("acquisition: device announced disconnect"),
            PacketBody::Unknown { raw_id, .. } => {
                self.stats.unknown += 1;
                debug!("acquisition: unknown packet {raw_id} in {mode} mode");
            }
            PacketBody::Eeg(eeg) if mode.filters_eeg() => self.filters.apply_eeg(eeg),
            PacketBody::Orientation(orn) => match mode {
                Mode::Calibrate => self.collector.push(&orn.mag),
                Mode::Initialize => {
                    if self.estimator.initialize(&mut self.state, orn).is_some() {
                        info!("acquisition: reference frame set, switching to visualize");
                        self.mode = Mode::Visualize;
                    } else {
                        warn!(
                            "acquisition: degenerate accel/mag sample at t={:.4} s, still initializing",
                            packet.timestamp
                        );
                    }
                }
                Mode::Visualize => {
                    let triad = self.estimator.update(&mut self.state, orn).map_err(|e| {
                        error!("acquisition: orientation tracking stopped: {e}");
                        e
                    })?;
                    orn.ned = Some(triad);
                }
                _ => {}
            },
            _ => {}
        }

        if mode.forwards(&packet.body) {
            self.sink.push(packet);
            self.stats.forwarded += 1;
        }
        Ok(())
    }
}
