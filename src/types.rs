use std::fmt;

use nalgebra::{Matrix3, Rotation3, Vector3};
use serde_json::{Map, Value};

/// Three-axis vector used for every inertial quantity.
pub type Vec3 = Vector3<f64>;

/// A decoded packet: the common envelope plus one typed body.
///
/// `timestamp` is seconds since the first frame of the session, derived from
/// the device clock (see [`crate::state::ParserState::normalize_timestamp`]).
/// Packets handed to a [`crate::sink::Sink`] are owned snapshots; nothing in
/// the pipeline keeps a reference to them.
#[derive(Debug, Clone, PartialEq)]
pub struct Packet {
    pub timestamp: f64,
    pub body: PacketBody,
}

impl Packet {
    pub fn new(timestamp: f64, body: PacketBody) -> Self {
        Self { timestamp, body }
    }

    /// Short label for log lines and the print sink.
    pub fn kind(&self) -> &'static str {
        match &self.body {
            PacketBody::Eeg(_) => "EEG",
            PacketBody::Orientation(_) => "ORN",
            PacketBody::Environment(_) => "ENV",
            PacketBody::TimeStamp => "TS",
            PacketBody::DeviceInfo(_) => "INFO",
            PacketBody::Disconnect => "DISCONNECT",
            PacketBody::Unknown { .. } => "UNKNOWN",
        }
    }
}

/// Payload of a [`Packet`], one variant per family of packet type ids.
///
/// | Variant | Packet ids | Rate |
/// |---|---|---|
/// | `Eeg` | 144, 146, 208, 210 (24-bit) · 30, 62 (14-bit) | 250 Hz samples |
/// | `Orientation` | 13 | 20 Hz |
/// | `Environment` | 19 | ~1 Hz |
/// | `TimeStamp` | 27 | on sync |
/// | `DeviceInfo` | 99 | on connect |
/// | `Disconnect` | 111 | before link drop |
/// | `Unknown` | anything else | — |
#[derive(Debug, Clone, PartialEq)]
pub enum PacketBody {
    Eeg(EegData),
    Orientation(OrientationData),
    Environment(EnvironmentData),
    /// Synchronisation marker; carries nothing beyond the envelope timestamp.
    TimeStamp,
    DeviceInfo(DeviceInfo),
    /// The device announced it is dropping the link.
    Disconnect,
    /// A packet type id with no registered decoder, or a payload too short
    /// for its layout. Never fatal.
    Unknown { raw_id: u8, raw_payload: Vec<u8> },
}

/// A block of ExG samples from one frame.
#[derive(Debug, Clone, PartialEq)]
pub struct EegData {
    /// Number of electrodes in this layout (4 or 8 on current hardware).
    pub channel_count: usize,
    /// Voltage in µV, indexed `samples[channel][sample]`.
    ///
    /// Every channel holds the same number of samples, oldest first.
    pub samples: Vec<Vec<f64>>,
}

impl EegData {
    /// Samples per channel in this block.
    pub fn samples_per_channel(&self) -> usize {
        self.samples.first().map_or(0, Vec::len)
    }
}

/// One inertial measurement with the fused NED triad once available.
#[derive(Debug, Clone, PartialEq)]
pub struct OrientationData {
    /// Accelerometer in mg.
    pub acc: Vec3,
    /// Gyroscope in mdps.
    pub gyro: Vec3,
    /// Magnetometer in mgauss, uncalibrated.
    pub mag: Vec3,
    /// Orientation relative to the reference frame, set by the estimator in
    /// tracking modes. `None` straight off the wire.
    pub ned: Option<Triad>,
}

/// Housekeeping telemetry.
#[derive(Debug, Clone, PartialEq)]
pub struct EnvironmentData {
    /// Board temperature in °C.
    pub temperature: i8,
    /// Ambient light in lux.
    pub light: f64,
    /// Battery terminal voltage in volts.
    pub battery_voltage: f64,
    /// State of charge derived from `battery_voltage`, 1–100.
    pub battery_percent: f64,
}

/// Firmware and acquisition settings reported by the device.
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceInfo {
    /// Dotted version string, e.g. `"2.1.0"`.
    pub firmware_version: String,
    /// ExG sampling rate in Hz, when the firmware reports it.
    pub sampling_rate: Option<f64>,
    /// Bit mask of enabled ADC channels, when the firmware reports it.
    pub adc_mask: Option<u8>,
}

/// Convert a [`DeviceInfo`] into the key/value mapping handed to
/// [`crate::sink::Sink::notify_device_info`].
pub fn device_info_fields(info: &DeviceInfo) -> Map<String, Value> {
    let mut fields = Map::new();
    fields.insert(
        "firmware_version".into(),
        Value::String(info.firmware_version.clone()),
    );
    if let Some(rate) = info.sampling_rate {
        fields.insert("sampling_rate".into(), Value::from(rate));
    }
    if let Some(mask) = info.adc_mask {
        fields.insert("adc_mask".into(), Value::from(mask));
    }
    fields
}

// ── Orientation frames ────────────────────────────────────────────────────────

/// An orthonormal North-East-Down triad.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Triad {
    pub north: Vec3,
    pub east: Vec3,
    pub down: Vec3,
}

impl Triad {
    /// Rotation matrix whose columns are `[north, east, down]`.
    pub fn rotation_matrix(&self) -> Matrix3<f64> {
        Matrix3::from_columns(&[self.north, self.east, self.down])
    }

    /// Rotation angle in degrees and unit axis of [`Self::rotation_matrix`].
    ///
    /// The axis is `None` for the identity rotation.
    pub fn axis_angle(&self) -> (f64, Option<Vec3>) {
        let rotation = Rotation3::from_matrix_unchecked(self.rotation_matrix());
        match rotation.axis_angle() {
            Some((axis, angle)) => (angle.to_degrees(), Some(axis.into_inner())),
            None => (0.0, None),
        }
    }
}

/// Reference triad captured when tracking starts.
///
/// `rotation` is the matrix `[N E D]` measured at initialisation and `triad`
/// is the same measurement expressed in its own frame (`rotationᵀ · v`).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReferenceFrame {
    pub triad: Triad,
    pub rotation: Matrix3<f64>,
}

// ── Display (print mode) ──────────────────────────────────────────────────────

impl fmt::Display for Packet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{:<10}] ts={:>10.4} s  ", self.kind(), self.timestamp)?;
        match &self.body {
            PacketBody::Eeg(eeg) => {
                let first: Vec<String> = eeg
                    .samples
                    .iter()
                    .map(|ch| {
                        ch.first()
                            .map_or_else(|| "-".to_string(), |v| format!("{v:+.2}"))
                    })
                    .collect();
                write!(
                    f,
                    "{} ch × {} samples  first=[{}] µV",
                    eeg.channel_count,
                    eeg.samples_per_channel(),
                    first.join(", ")
                )
            }
            PacketBody::Orientation(o) => {
                write!(
                    f,
                    "acc=({:+.1}, {:+.1}, {:+.1}) mg  gyro=({:+.1}, {:+.1}, {:+.1}) mdps  \
                     mag=({:+.1}, {:+.1}, {:+.1}) mgauss",
                    o.acc.x, o.acc.y, o.acc.z, o.gyro.x, o.gyro.y, o.gyro.z, o.mag.x, o.mag.y, o.mag.z
                )?;
                if let Some(ned) = &o.ned {
                    let (angle, _) = ned.axis_angle();
                    write!(f, "  rot={angle:.1}°")?;
                }
                Ok(())
            }
            PacketBody::Environment(env) => write!(
                f,
                "temp={} °C  light={:.1} lux  battery={:.2} V ({:.0}%)",
                env.temperature, env.light, env.battery_voltage, env.battery_percent
            ),
            PacketBody::TimeStamp => write!(f, "sync"),
            PacketBody::DeviceInfo(info) => {
                write!(f, "firmware={}", info.firmware_version)?;
                if let Some(rate) = info.sampling_rate {
                    write!(f, "  rate={rate} Hz")?;
                }
                Ok(())
            }
            PacketBody::Disconnect => write!(f, "device disconnecting"),
            PacketBody::Unknown {
                raw_id,
                raw_payload,
            } => write!(f, "id={raw_id} len={}", raw_payload.len()),
        }
    }
}
