//! Payload decoders and the packet-type registry.
//!
//! Every function in this module is pure: no I/O, no hidden state. The only
//! mutable input is the [`ParserState`] handed to [`decode_frame`], which
//! owns the session time offset.
//!
//! # Registry
//!
//! [`PACKET_DECODERS`] maps each known packet type id to a decode function
//! and its inverse. [`decode_packet`] is total: an unregistered id, or a
//! payload too short for its layout, yields [`PacketBody::Unknown`] instead
//! of an error.
//!
//! | Id | Name | Payload (little-endian) |
//! |---|---|---|
//! | 13 | ORN | 9 × i16: acc, gyro, mag |
//! | 19 | ENV | i8 temperature, u16 light, u16 battery |
//! | 27 | TS | ignored |
//! | 99 | INFO | u16 firmware, optional u8 rate code, optional u8 ADC mask |
//! | 111 | DISCONNECT | none |
//! | 144, 208 | EEG94, EEG94R | 4 ch × signed 24-bit, sample-major |
//! | 146, 210 | EEG98, EEG98R | 8 ch × signed 24-bit, sample-major |
//! | 30, 62 | EEG99S, EEG99 | 4 ch × 14-bit offset-binary, LSB-first bitstream |

use log::{debug, warn};

use crate::frame::Frame;
use crate::protocol::*;
use crate::state::ParserState;
use crate::types::{
    DeviceInfo, EegData, EnvironmentData, OrientationData, Packet, PacketBody, Vec3,
};

// ── Registry ──────────────────────────────────────────────────────────────────

/// One registry entry: a packet type id with its payload codec.
pub struct PacketDecoder {
    pub id: u8,
    pub name: &'static str,
    /// Returns `None` when the payload is too short for the layout.
    pub decode: fn(&[u8]) -> Option<PacketBody>,
    /// Returns `None` when the body does not belong to this layout.
    pub encode: fn(&PacketBody) -> Option<Vec<u8>>,
}

macro_rules! entry {
    ($id:expr, $decode:ident, $encode:ident) => {
        PacketDecoder {
            id: $id,
            name: packet_name($id),
            decode: $decode,
            encode: $encode,
        }
    };
}

/// Every packet type this crate understands.
pub static PACKET_DECODERS: [PacketDecoder; 11] = [
    entry!(ORN_ID, decode_orientation_body, encode_orientation_body),
    entry!(ENV_ID, decode_environment_body, encode_environment_body),
    entry!(TS_ID, decode_timestamp_body, encode_empty_body),
    entry!(DISCONNECT_ID, decode_disconnect_body, encode_empty_body),
    entry!(INFO_ID, decode_device_info_body, encode_device_info_body),
    entry!(EEG94_ID, decode_eeg4_24, encode_eeg4_24),
    entry!(EEG94R_ID, decode_eeg4_24, encode_eeg4_24),
    entry!(EEG98_ID, decode_eeg8_24, encode_eeg8_24),
    entry!(EEG98R_ID, decode_eeg8_24, encode_eeg8_24),
    entry!(EEG99S_ID, decode_eeg4_14, encode_eeg4_14),
    entry!(EEG99_ID, decode_eeg4_14, encode_eeg4_14),
];

/// Look up the registry entry for a packet type id.
pub fn find_decoder(id: u8) -> Option<&'static PacketDecoder> {
    PACKET_DECODERS.iter().find(|d| d.id == id)
}

/// Decode one payload into a [`Packet`].
///
/// Never fails. Unregistered ids and short payloads come back as
/// [`PacketBody::Unknown`] carrying the raw bytes.
///
/// ```
/// # use explore_rs::parse::decode_packet;
/// # use explore_rs::types::PacketBody;
/// let packet = decode_packet(250, 0.0, &[1, 2, 3]);
/// assert!(matches!(packet.body, PacketBody::Unknown { raw_id: 250, .. }));
/// ```
pub fn decode_packet(id: u8, timestamp: f64, payload: &[u8]) -> Packet {
    let unknown = || PacketBody::Unknown {
        raw_id: id,
        raw_payload: payload.to_vec(),
    };

    let body = match find_decoder(id) {
        Some(decoder) => (decoder.decode)(payload).unwrap_or_else(|| {
            warn!(
                "{}: payload of {} bytes is too short, keeping it raw",
                decoder.name,
                payload.len()
            );
            unknown()
        }),
        None => {
            debug!("unknown packet type {id} ({} bytes)", payload.len());
            unknown()
        }
    };
    Packet::new(timestamp, body)
}

/// Encode a body for the given packet type id.
///
/// Returns `None` for unregistered ids and for bodies that do not fit the
/// id's layout (wrong variant, wrong channel count). For values on the
/// quantisation grid, `decode_packet(id, t, &encode_packet(id, &b)?)`
/// reproduces `b` exactly.
pub fn encode_packet(id: u8, body: &PacketBody) -> Option<Vec<u8>> {
    (find_decoder(id)?.encode)(body)
}

/// Normalise the frame timestamp through `state`, then decode the payload.
pub fn decode_frame(state: &mut ParserState, frame: &Frame) -> Packet {
    let timestamp = state.normalize_timestamp(frame.device_timestamp);
    decode_packet(frame.packet_type, timestamp, &frame.payload)
}

// ── Bit-level helpers ─────────────────────────────────────────────────────────

/// Decode a signed 24-bit little-endian array (3 bytes per value).
///
/// Partial trailing groups are ignored.
pub fn decode_int24_le(data: &[u8]) -> Vec<i32> {
    data.chunks_exact(3)
        .map(|c| i32::from_le_bytes([0, c[0], c[1], c[2]]) >> 8)
        .collect()
}

fn encode_int24_le(values: &[i32], out: &mut Vec<u8>) {
    for v in values {
        out.extend_from_slice(&v.to_le_bytes()[..3]);
    }
}

/// Unpack N-bit unsigned integers from a packed byte slice.
///
/// Reads `floor(data.len() * 8 / bit_width)` values. Bits are consumed
/// LSB-first, byte by byte. A `bit_width` outside `1..=32` yields nothing.
pub fn unpack_uint_le_bits(data: &[u8], bit_width: usize) -> Vec<u32> {
    if !(1..=32).contains(&bit_width) {
        return Vec::new();
    }
    let n = (data.len() * 8) / bit_width;
    (0..n)
        .map(|i| {
            let mut val = 0u32;
            for bit in 0..bit_width {
                let total = i * bit_width + bit;
                if (data[total / 8] >> (total % 8)) & 1 != 0 {
                    val |= 1 << bit;
                }
            }
            val
        })
        .collect()
}

/// Inverse of [`unpack_uint_le_bits`]; the last byte is zero-padded.
pub fn pack_uint_le_bits(values: &[u32], bit_width: usize) -> Vec<u8> {
    if !(1..=32).contains(&bit_width) {
        return Vec::new();
    }
    let mut out = vec![0u8; (values.len() * bit_width).div_ceil(8)];
    for (i, &v) in values.iter().enumerate() {
        for bit in 0..bit_width {
            if (v >> bit) & 1 != 0 {
                let total = i * bit_width + bit;
                out[total / 8] |= 1 << (total % 8);
            }
        }
    }
    out
}

fn read_i16_le(data: &[u8], offset: usize) -> i16 {
    i16::from_le_bytes([data[offset], data[offset + 1]])
}

fn read_u16_le(data: &[u8], offset: usize) -> u16 {
    u16::from_le_bytes([data[offset], data[offset + 1]])
}

fn quantize_i16(value: f64, scale: f64) -> i16 {
    (value / scale).round().clamp(i16::MIN as f64, i16::MAX as f64) as i16
}

fn quantize_u16(value: f64, scale: f64) -> u16 {
    (value / scale).round().clamp(0.0, u16::MAX as f64) as u16
}

// ── EEG ──────────────────────────────────────────────────────────────────────

/// Bit layout of an ExG payload.
///
/// Samples are stored sample-major: all channels of sample 0, then all
/// channels of sample 1, and so on. Bytes past the last complete row are a
/// device trailer and are skipped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EegLayout {
    channels: usize,
    format: SampleFormat,
}

/// How one ExG sample is stored on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleFormat {
    /// Two's-complement, 3 bytes little-endian.
    Int24,
    /// Offset binary around 8192, packed LSB-first into a bitstream.
    Offset14,
}

impl SampleFormat {
    pub const fn bits(self) -> usize {
        match self {
            SampleFormat::Int24 => 24,
            SampleFormat::Offset14 => 14,
        }
    }
}

impl EegLayout {
    pub const fn new(channels: usize, format: SampleFormat) -> Self {
        Self { channels, format }
    }

    pub fn channels(&self) -> usize {
        self.channels
    }

    pub fn format(&self) -> SampleFormat {
        self.format
    }

    fn raw_to_uv(&self, raw: i64) -> f64 {
        match self.format {
            SampleFormat::Int24 => raw as f64 * EEG24_UV_PER_LSB,
            SampleFormat::Offset14 => (raw - EEG14_MIDSCALE as i64) as f64 * EEG14_UV_PER_LSB,
        }
    }

    fn uv_to_raw(&self, uv: f64) -> i64 {
        match self.format {
            SampleFormat::Int24 => (uv / EEG24_UV_PER_LSB)
                .round()
                .clamp(-8_388_608.0, 8_388_607.0) as i64,
            SampleFormat::Offset14 => ((uv / EEG14_UV_PER_LSB).round() as i64
                + EEG14_MIDSCALE as i64)
                .clamp(0, (1 << SampleFormat::Offset14.bits()) - 1),
        }
    }

    /// Decode `payload` into µV, or `None` if it holds no complete row.
    pub fn decode(&self, payload: &[u8]) -> Option<EegData> {
        if self.channels == 0 {
            return None;
        }
        let raw: Vec<i64> = match self.format {
            SampleFormat::Int24 => decode_int24_le(payload).into_iter().map(i64::from).collect(),
            SampleFormat::Offset14 => unpack_uint_le_bits(payload, self.format.bits())
                .into_iter()
                .map(i64::from)
                .collect(),
        };

        let rows = raw.len() / self.channels;
        if rows == 0 {
            return None;
        }
        let samples = (0..self.channels)
            .map(|ch| {
                (0..rows)
                    .map(|s| self.raw_to_uv(raw[s * self.channels + ch]))
                    .collect()
            })
            .collect();
        Some(EegData {
            channel_count: self.channels,
            samples,
        })
    }

    /// Encode µV samples back to the wire layout.
    pub fn encode(&self, data: &EegData) -> Option<Vec<u8>> {
        if data.channel_count != self.channels || data.samples.len() != self.channels {
            return None;
        }
        let rows = data.samples_per_channel();
        if data.samples.iter().any(|ch| ch.len() != rows) {
            return None;
        }
        let raw: Vec<i64> = (0..rows)
            .flat_map(|s| data.samples.iter().map(move |ch| self.uv_to_raw(ch[s])))
            .collect();

        match self.format {
            SampleFormat::Int24 => {
                let mut out = Vec::with_capacity(raw.len() * 3);
                let values: Vec<i32> = raw.iter().map(|&r| r as i32).collect();
                encode_int24_le(&values, &mut out);
                Some(out)
            }
            SampleFormat::Offset14 => {
                let values: Vec<u32> = raw.iter().map(|&r| r as u32).collect();
                Some(pack_uint_le_bits(&values, self.format.bits()))
            }
        }
    }
}

const EEG4_24: EegLayout = EegLayout::new(4, SampleFormat::Int24);
const EEG8_24: EegLayout = EegLayout::new(8, SampleFormat::Int24);
const EEG4_14: EegLayout = EegLayout::new(4, SampleFormat::Offset14);

fn decode_eeg4_24(payload: &[u8]) -> Option<PacketBody> {
    EEG4_24.decode(payload).map(PacketBody::Eeg)
}

fn decode_eeg8_24(payload: &[u8]) -> Option<PacketBody> {
    EEG8_24.decode(payload).map(PacketBody::Eeg)
}

fn decode_eeg4_14(payload: &[u8]) -> Option<PacketBody> {
    EEG4_14.decode(payload).map(PacketBody::Eeg)
}

fn encode_eeg_with(layout: EegLayout, body: &PacketBody) -> Option<Vec<u8>> {
    match body {
        PacketBody::Eeg(data) => layout.encode(data),
        _ => None,
    }
}

fn encode_eeg4_24(body: &PacketBody) -> Option<Vec<u8>> {
    encode_eeg_with(EEG4_24, body)
}

fn encode_eeg8_24(body: &PacketBody) -> Option<Vec<u8>> {
    encode_eeg_with(EEG8_24, body)
}

fn encode_eeg4_14(body: &PacketBody) -> Option<Vec<u8>> {
    encode_eeg_with(EEG4_14, body)
}

// ── Orientation ───────────────────────────────────────────────────────────────

const ORN_LEN: usize = 18;

/// Decode 9 × i16: accelerometer (mg), gyroscope (mdps), magnetometer (mgauss).
pub fn decode_orientation(payload: &[u8]) -> Option<OrientationData> {
    if payload.len() < ORN_LEN {
        return None;
    }
    let triplet = |off: usize, scale: f64| {
        Vec3::new(
            read_i16_le(payload, off) as f64 * scale,
            read_i16_le(payload, off + 2) as f64 * scale,
            read_i16_le(payload, off + 4) as f64 * scale,
        )
    };
    Some(OrientationData {
        acc: triplet(0, ACC_SCALE),
        gyro: triplet(6, GYRO_SCALE),
        mag: triplet(12, MAG_SCALE),
        ned: None,
    })
}

fn decode_orientation_body(payload: &[u8]) -> Option<PacketBody> {
    decode_orientation(payload).map(PacketBody::Orientation)
}

fn encode_orientation_body(body: &PacketBody) -> Option<Vec<u8>> {
    let PacketBody::Orientation(o) = body else {
        return None;
    };
    let mut out = Vec::with_capacity(ORN_LEN);
    for (v, scale) in [(&o.acc, ACC_SCALE), (&o.gyro, GYRO_SCALE), (&o.mag, MAG_SCALE)] {
        for c in v.iter() {
            out.extend_from_slice(&quantize_i16(*c, scale).to_le_bytes());
        }
    }
    Some(out)
}

// ── Environment ───────────────────────────────────────────────────────────────

const ENV_LEN: usize = 5;

pub fn decode_environment(payload: &[u8]) -> Option<EnvironmentData> {
    if payload.len() < ENV_LEN {
        return None;
    }
    let battery_voltage = read_u16_le(payload, 3) as f64 * BATTERY_SCALE;
    Some(EnvironmentData {
        temperature: payload[0] as i8,
        light: read_u16_le(payload, 1) as f64 * LIGHT_SCALE,
        battery_voltage,
        battery_percent: battery_percent(battery_voltage),
    })
}

fn decode_environment_body(payload: &[u8]) -> Option<PacketBody> {
    decode_environment(payload).map(PacketBody::Environment)
}

fn encode_environment_body(body: &PacketBody) -> Option<Vec<u8>> {
    let PacketBody::Environment(env) = body else {
        return None;
    };
    let mut out = Vec::with_capacity(ENV_LEN);
    out.push(env.temperature as u8);
    out.extend_from_slice(&quantize_u16(env.light, LIGHT_SCALE).to_le_bytes());
    out.extend_from_slice(&quantize_u16(env.battery_voltage, BATTERY_SCALE).to_le_bytes());
    Some(out)
}

// ── Device info ───────────────────────────────────────────────────────────────

/// Decode the firmware number and optional acquisition settings.
///
/// The firmware number is printed as its decimal digits joined with `.`,
/// so `210` reads as `"2.1.0"`.
pub fn decode_device_info(payload: &[u8]) -> Option<DeviceInfo> {
    if payload.len() < 2 {
        return None;
    }
    let number = read_u16_le(payload, 0).to_string();
    let firmware_version = number
        .chars()
        .map(String::from)
        .collect::<Vec<_>>()
        .join(".");
    Some(DeviceInfo {
        firmware_version,
        sampling_rate: payload
            .get(2)
            .map(|&code| SAMPLING_RATE_BASE / f64::from(1u32 << code.min(31))),
        adc_mask: payload.get(3).copied(),
    })
}

fn decode_device_info_body(payload: &[u8]) -> Option<PacketBody> {
    decode_device_info(payload).map(PacketBody::DeviceInfo)
}

fn encode_device_info_body(body: &PacketBody) -> Option<Vec<u8>> {
    let PacketBody::DeviceInfo(info) = body else {
        return None;
    };
    let digits: String = info.firmware_version.chars().filter(|c| *c != '.').collect();
    let number: u16 = digits.parse().ok()?;
    let mut out = number.to_le_bytes().to_vec();
    if let Some(rate) = info.sampling_rate {
        let code = (SAMPLING_RATE_BASE / rate).log2().round();
        if !(0.0..=31.0).contains(&code) {
            return None;
        }
        out.push(code as u8);
        if let Some(mask) = info.adc_mask {
            out.push(mask);
        }
    } else if info.adc_mask.is_some() {
        return None;
    }
    Some(out)
}

// ── Markers ───────────────────────────────────────────────────────────────────

fn decode_timestamp_body(_: &[u8]) -> Option<PacketBody> {
    Some(PacketBody::TimeStamp)
}

fn decode_disconnect_body(_: &[u8]) -> Option<PacketBody> {
    Some(PacketBody::Disconnect)
}

fn encode_empty_body(body: &PacketBody) -> Option<Vec<u8>> {
    match body {
        PacketBody::TimeStamp | PacketBody::Disconnect => Some(Vec::new()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roundtrip(id: u8, body: PacketBody) {
        let bytes = encode_packet(id, &body).unwrap();
        let packet = decode_packet(id, 2.5, &bytes);
        assert_eq!(packet.body, body, "id {id}");
        assert_eq!(packet.timestamp, 2.5);
    }

    #[test]
    fn eeg94_frame_decodes_one_sample_per_channel() {
        let mut payload = Vec::new();
        encode_int24_le(&[1, -1, 1000, -8_388_608], &mut payload);
        payload.extend_from_slice(&[0xAF, 0xBE, 0xAD, 0xDE]);
        let frame = Frame::new(EEG94_ID, 0, 1000, payload);
        assert_eq!(frame.payload_length, 20);

        let mut state = ParserState::new();
        let packet = decode_frame(&mut state, &frame);
        assert_eq!(packet.timestamp, 0.0);
        assert_eq!(state.time_offset, Some(1000));

        let PacketBody::Eeg(eeg) = packet.body else {
            panic!("expected EEG, got {:?}", packet.body);
        };
        assert_eq!(eeg.channel_count, 4);
        assert!(eeg.samples.iter().all(|ch| ch.len() == 1));
        assert!((eeg.samples[0][0] - EEG24_UV_PER_LSB).abs() < 1e-12);
        assert!((eeg.samples[1][0] + EEG24_UV_PER_LSB).abs() < 1e-12);
        assert!((eeg.samples[3][0] + 8_388_608.0 * EEG24_UV_PER_LSB).abs() < 1e-6);
    }

    #[test]
    fn unknown_id_is_not_an_error() {
        let packet = decode_packet(250, 1.0, &[9, 8, 7]);
        assert_eq!(
            packet.body,
            PacketBody::Unknown {
                raw_id: 250,
                raw_payload: vec![9, 8, 7]
            }
        );
    }

    #[test]
    fn short_payload_falls_back_to_unknown() {
        let packet = decode_packet(ORN_ID, 0.0, &[1, 2, 3]);
        assert!(matches!(packet.body, PacketBody::Unknown { raw_id: ORN_ID, .. }));
        let packet = decode_packet(EEG98_ID, 0.0, &[0; 20]);
        assert!(matches!(packet.body, PacketBody::Unknown { raw_id: EEG98_ID, .. }));
    }

    #[test]
    fn sample_major_ordering() {
        let mut payload = Vec::new();
        encode_int24_le(&[10, 20, 30, 40, 11, 21, 31, 41], &mut payload);
        let eeg = EEG4_24.decode(&payload).unwrap();
        assert_eq!(eeg.samples_per_channel(), 2);
        let raw: Vec<i64> = eeg.samples[2]
            .iter()
            .map(|v| (v / EEG24_UV_PER_LSB).round() as i64)
            .collect();
        assert_eq!(raw, vec![30, 31]);
    }

    #[test]
    fn int24_sign_extension() {
        assert_eq!(decode_int24_le(&[0xFF, 0xFF, 0xFF]), vec![-1]);
        assert_eq!(decode_int24_le(&[0x00, 0x00, 0x80]), vec![-8_388_608]);
        assert_eq!(decode_int24_le(&[0xFF, 0xFF, 0x7F, 0x01]), vec![8_388_607]);
    }

    #[test]
    fn bit_pack_is_lsb_first() {
        let packed = pack_uint_le_bits(&[0x3FFF, 0x0001], 14);
        assert_eq!(packed, vec![0xFF, 0x7F, 0x00, 0x00]);
        assert_eq!(unpack_uint_le_bits(&packed, 14), vec![0x3FFF, 1]);
    }

    #[test]
    fn bit_helpers_reject_unusable_widths() {
        assert!(unpack_uint_le_bits(&[0xFF, 0xFF], 0).is_empty());
        assert!(unpack_uint_le_bits(&[0xFF; 8], 33).is_empty());
        assert!(pack_uint_le_bits(&[1, 2], 0).is_empty());
        assert_eq!(unpack_uint_le_bits(&[0xFF; 4], 32), vec![u32::MAX]);
    }

    #[test]
    fn fourteen_bit_midscale_is_zero_volts() {
        let packed = pack_uint_le_bits(&[8192, 8193, 8191, 0], 14);
        assert_eq!(packed.len(), 7);
        let eeg = EEG4_14.decode(&packed).unwrap();
        assert_eq!(eeg.samples[0], vec![0.0]);
        assert!((eeg.samples[1][0] - EEG14_UV_PER_LSB).abs() < 1e-9);
        assert!((eeg.samples[2][0] + EEG14_UV_PER_LSB).abs() < 1e-9);
    }

    #[test]
    fn two_channel_layout() {
        let layout = EegLayout::new(2, SampleFormat::Int24);
        assert_eq!(layout.channels(), 2);
        assert_eq!(layout.format().bits(), 24);
        let mut payload = Vec::new();
        encode_int24_le(&[5, -5, 6, -6, 7, -7], &mut payload);
        let eeg = layout.decode(&payload).unwrap();
        assert_eq!(eeg.channel_count, 2);
        assert_eq!(eeg.samples_per_channel(), 3);
        assert_eq!(layout.encode(&eeg).unwrap(), payload);
    }

    #[test]
    fn eeg_roundtrips() {
        let grid24 = |r: i32| r as f64 * EEG24_UV_PER_LSB;
        roundtrip(
            EEG98R_ID,
            PacketBody::Eeg(EegData {
                channel_count: 8,
                samples: (0..8).map(|ch| vec![grid24(ch * 100 - 350), grid24(-ch)]).collect(),
            }),
        );
        let grid14 = |r: i64| (r - 8192) as f64 * EEG14_UV_PER_LSB;
        roundtrip(
            EEG99_ID,
            PacketBody::Eeg(EegData {
                channel_count: 4,
                samples: (0..4).map(|ch| vec![grid14(8000 + ch), grid14(16383 - ch)]).collect(),
            }),
        );
    }

    #[test]
    fn wrong_channel_count_does_not_encode() {
        let body = PacketBody::Eeg(EegData {
            channel_count: 2,
            samples: vec![vec![0.0], vec![0.0]],
        });
        assert!(encode_packet(EEG94_ID, &body).is_none());
        assert!(encode_packet(ORN_ID, &body).is_none());
    }

    #[test]
    fn orientation_scales() {
        let raw: [i16; 9] = [1000, -1000, 16384, 100, 0, -100, 50, -50, 300];
        let payload: Vec<u8> = raw.iter().flat_map(|v| v.to_le_bytes()).collect();
        let o = decode_orientation(&payload).unwrap();
        assert!((o.acc.z - 16384.0 * 0.061).abs() < 1e-9);
        assert!((o.gyro.x - 875.0).abs() < 1e-9);
        assert!((o.mag.y + 76.0).abs() < 1e-9);
        assert!(o.ned.is_none());
        assert_eq!(encode_orientation_body(&PacketBody::Orientation(o)).unwrap(), payload);
    }

    #[test]
    fn environment_fields() {
        let mut payload = vec![(-5i8) as u8];
        payload.extend_from_slice(&4095u16.to_le_bytes());
        payload.extend_from_slice(&2400u16.to_le_bytes());
        let env = decode_environment(&payload).unwrap();
        assert_eq!(env.temperature, -5);
        assert!((env.light - 1000.0).abs() < 1e-9);
        assert!((env.battery_voltage - 4.344).abs() < 1e-3);
        assert_eq!(env.battery_percent, 100.0);
        roundtrip(ENV_ID, PacketBody::Environment(env));
    }

    #[test]
    fn device_info_variants() {
        let info = decode_device_info(&[210, 0]).unwrap();
        assert_eq!(info.firmware_version, "2.1.0");
        assert_eq!(info.sampling_rate, None);

        let info = decode_device_info(&[0x0D, 0x01, 6, 0x0F]).unwrap();
        assert_eq!(info.firmware_version, "2.6.9");
        assert_eq!(info.sampling_rate, Some(250.0));
        assert_eq!(info.adc_mask, Some(0x0F));
        roundtrip(INFO_ID, PacketBody::DeviceInfo(info));
    }

    #[test]
    fn markers_ignore_payload() {
        assert_eq!(decode_packet(TS_ID, 0.0, &[1, 2, 3, 4]).body, PacketBody::TimeStamp);
        assert_eq!(decode_packet(DISCONNECT_ID, 0.0, &[]).body, PacketBody::Disconnect);
        roundtrip(TS_ID, PacketBody::TimeStamp);
        roundtrip(DISCONNECT_ID, PacketBody::Disconnect);
    }

    #[test]
    fn registry_ids_are_unique_and_named() {
        for (i, a) in PACKET_DECODERS.iter().enumerate() {
            assert_ne!(a.name, "UNKNOWN");
            assert!(PACKET_DECODERS[i + 1..].iter().all(|b| b.id != a.id));
        }
    }
}
