//! # explore-rs
//!
//! Decoding and real-time processing for Explore wearable biosignal devices.
//!
//! The device streams fixed-framing binary telemetry over an unreliable byte
//! transport (Bluetooth RFCOMM, a serial port, or a recorded file). This
//! crate turns those bytes into typed, timestamped packets, filters the ExG
//! channels, fuses the inertial sensors into an orientation estimate, and
//! drives the whole pipeline through a mode-selectable loop that survives
//! transport drop-outs.
//!
//! ## Supported packets
//!
//! | Packet | Ids | Content |
//! |---|---|---|
//! | EEG | 144, 146, 208, 210 | 4 or 8 ch, 24-bit |
//! | EEG | 30, 62 | 4 ch, 14-bit |
//! | Orientation | 13 | accelerometer, gyroscope, magnetometer |
//! | Environment | 19 | temperature, light, battery |
//! | Device info | 99 | firmware version, sampling rate |
//! | Timestamp / Disconnect | 27 / 111 | markers |
//!
//! Anything else decodes to `PacketBody::Unknown` and never stops the stream.
//!
//! ## Quick start
//!
//! ```no_run
//! use explore_rs::prelude::*;
//!
//! fn main() -> explore_rs::error::Result<()> {
//!     let config = AcquisitionConfig {
//!         mode: Mode::Print,
//!         duration: Some(std::time::Duration::from_secs(5)),
//!         ..AcquisitionConfig::default()
//!     };
//!     let mut events: Vec<SinkEvent> = Vec::new();
//!     let mut acq = AcquisitionLoop::new(Simulator::new(), NoReconnect, &mut events, config)?;
//!     let stats = acq.run()?;
//!     println!("{stats:?}");
//!     Ok(())
//! }
//! ```
//!
//! ## Module overview
//!
//! | Module | Purpose |
//! |---|---|
//! | [`prelude`] | One-line glob import of the most commonly needed types |
//! | [`frame`] | Frame header/payload reader over any `std::io::Read` |
//! | [`parse`] | Packet-type registry and payload decoders/encoders |
//! | [`types`] | Packet envelope, per-variant payloads, NED triads |
//! | [`state`] | Per-session parser state (time offset, reference frame) |
//! | [`filter`] | Streaming notch + band-pass filter bank |
//! | [`orientation`] | Complementary-filter orientation estimator |
//! | [`calibration`] | Magnetometer calibration sets and their derivation |
//! | [`acquisition`] | The mode-driven loop, reconnect policy, statistics |
//! | [`sink`] | Where decoded packets go |
//! | [`sim`] | Synthetic device for running without hardware |
//! | [`protocol`] | Packet ids, unit scales, wire constants |
//! | [`error`] | `ExploreError` and the crate `Result` alias |

pub mod acquisition;
pub mod calibration;
pub mod error;
pub mod filter;
pub mod frame;
pub mod orientation;
pub mod parse;
pub mod protocol;
pub mod sim;
pub mod sink;
pub mod state;
pub mod types;

// ── Prelude ───────────────────────────────────────────────────────────────────

/// Convenience re-exports for downstream crates.
pub mod prelude {
    // ── Pipeline ──────────────────────────────────────────────────────────────
    pub use crate::acquisition::{
        AcquisitionConfig, AcquisitionLoop, LoopStats, Mode, NoReconnect, Reconnect,
    };
    pub use crate::filter::SignalFilterBank;
    pub use crate::frame::{Frame, FrameReader};
    pub use crate::orientation::{FusionWeights, OrientationEstimator};
    pub use crate::parse::{decode_frame, decode_packet, encode_packet};
    pub use crate::sim::Simulator;
    pub use crate::sink::{ChannelSink, Sink, SinkEvent};
    pub use crate::state::ParserState;

    // ── Data types ────────────────────────────────────────────────────────────
    pub use crate::calibration::{CalibrationCollector, CalibrationSet};
    pub use crate::error::ExploreError;
    pub use crate::types::{
        DeviceInfo, EegData, EnvironmentData, OrientationData, Packet, PacketBody, Triad,
    };
}
