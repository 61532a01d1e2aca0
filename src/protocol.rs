//! Packet identifiers, frame layout constants and unit scales for the Explore
//! wire protocol.
//!
//! Every frame on the wire starts with the same 8-byte header:
//!
//! | Offset | Size | Field | Notes |
//! |---|---|---|---|
//! | 0 | 1 | packet type id | selects the payload decoder |
//! | 1 | 1 | counter | advisory sequence counter, wraps |
//! | 2 | 2 | payload length | u16 LE, **includes** the 4 timestamp bytes |
//! | 4 | 4 | device timestamp | u32 LE, 0.1 ms ticks |
//! | 8 | length − 4 | payload | type-specific |

// ── Frame header ──────────────────────────────────────────────────────────────

/// Size of the fixed frame header in bytes.
pub const HEADER_LEN: usize = 8;

/// Bytes of the `payload_length` field that belong to the device timestamp.
///
/// A frame whose declared length is below this value is corrupt.
pub const TIMESTAMP_LEN: u16 = 4;

/// Duration of one device clock tick in seconds (0.1 ms).
pub const TIMESTAMP_UNIT_SECS: f64 = 1e-4;

// ── Packet type identifiers ───────────────────────────────────────────────────

/// Orientation: accelerometer, gyroscope and magnetometer triplets.
pub const ORN_ID: u8 = 13;
/// Environment: temperature, ambient light and battery voltage.
pub const ENV_ID: u8 = 19;
/// Timestamp synchronisation marker.
pub const TS_ID: u8 = 27;
/// Device is about to drop the link.
pub const DISCONNECT_ID: u8 = 111;
/// Firmware version and acquisition settings.
pub const INFO_ID: u8 = 99;
/// 4-channel EEG, 24-bit samples.
pub const EEG94_ID: u8 = 144;
/// 8-channel EEG, 24-bit samples.
pub const EEG98_ID: u8 = 146;
/// 4-channel EEG, 14-bit samples (legacy board).
pub const EEG99S_ID: u8 = 30;
/// 4-channel EEG, 14-bit samples (legacy board, alternate id).
pub const EEG99_ID: u8 = 62;
/// 4-channel EEG, 24-bit samples (revised board).
pub const EEG94R_ID: u8 = 208;
/// 8-channel EEG, 24-bit samples (revised board).
pub const EEG98R_ID: u8 = 210;

// ── Sampling constants ────────────────────────────────────────────────────────

/// Default ExG sample rate in Hz.
pub const EEG_FREQUENCY: f64 = 250.0;

/// Orientation packet rate in Hz.
pub const ORN_FREQUENCY: f64 = 20.0;

/// Default mains frequency for the notch stage.
pub const DEFAULT_NOTCH_FREQUENCY: f64 = 50.0;

// ── EEG scales ────────────────────────────────────────────────────────────────

/// ADC reference voltage in volts.
pub const EEG_VREF: f64 = 2.4;

/// Programmable gain of the ExG front end.
pub const EEG_GAIN: f64 = 6.0;

/// µV per LSB for signed 24-bit samples.
///
/// `µV = raw × 2.4 / (2²³ − 1) / 6 × 10⁶`
pub const EEG24_UV_PER_LSB: f64 = EEG_VREF / 8_388_607.0 / EEG_GAIN * 1e6;

/// µV per LSB for 14-bit offset-binary samples.
///
/// `µV = (raw − 8192) × 2.4 / 8191 / 6 × 10⁶`
pub const EEG14_UV_PER_LSB: f64 = EEG_VREF / 8191.0 / EEG_GAIN * 1e6;

/// Mid-scale code of the 14-bit ADC.
pub const EEG14_MIDSCALE: u32 = 8192;

// ── Orientation scales ────────────────────────────────────────────────────────

/// Accelerometer sensitivity in mg/LSB.
pub const ACC_SCALE: f64 = 0.061;
/// Gyroscope sensitivity in mdps/LSB.
pub const GYRO_SCALE: f64 = 8.750;
/// Magnetometer sensitivity in mgauss/LSB.
pub const MAG_SCALE: f64 = 1.52;

/// Conversion from millidegrees per second to radians per second.
pub const MDPS_TO_RAD_PER_SEC: f64 = 1.745329e-5;

// ── Environment scales ────────────────────────────────────────────────────────

/// Ambient light in lux per LSB (12-bit sensor, 1000 lux full scale).
pub const LIGHT_SCALE: f64 = 1000.0 / 4095.0;

/// Battery voltage in volts per LSB (resistor divider into a 1.8 V ADC).
pub const BATTERY_SCALE: f64 = (16.8 / 6.8) * (1.8 / 2457.0);

/// Base clock used to derive the reported ExG sampling rate.
///
/// `rate = 16000 / 2^code`
pub const SAMPLING_RATE_BASE: f64 = 16000.0;

/// Convert a battery terminal voltage to an approximate state of charge.
///
/// Piecewise-linear fit of a single-cell Li-ion discharge curve:
///
/// | Voltage | Percent |
/// |---|---|
/// | < 3.1 V | 1 |
/// | 3.5 V | 10 |
/// | 3.8 V | 40 |
/// | 3.9 V | 60 |
/// | 4.0 V | 75 |
/// | 4.1 V | 90 |
/// | ≥ 4.2 V | 100 |
pub fn battery_percent(voltage: f64) -> f64 {
    const CURVE: [(f64, f64); 7] = [
        (3.1, 1.0),
        (3.5, 10.0),
        (3.8, 40.0),
        (3.9, 60.0),
        (4.0, 75.0),
        (4.1, 90.0),
        (4.2, 100.0),
    ];
    if voltage < CURVE[0].0 {
        return CURVE[0].1;
    }
    for pair in CURVE.windows(2) {
        let (v0, p0) = pair[0];
        let (v1, p1) = pair[1];
        if voltage < v1 {
            return (p0 + (voltage - v0) / (v1 - v0) * (p1 - p0)).round();
        }
    }
    100.0
}

// ── Human-readable labels ─────────────────────────────────────────────────────

/// Short name for a packet type id, or `"UNKNOWN"`.
pub const fn packet_name(id: u8) -> &'static str {
    match id {
        ORN_ID => "ORN",
        ENV_ID => "ENV",
        TS_ID => "TS",
        DISCONNECT_ID => "DISCONNECT",
        INFO_ID => "INFO",
        EEG94_ID => "EEG94",
        EEG98_ID => "EEG98",
        EEG99S_ID => "EEG99S",
        EEG99_ID => "EEG99",
        EEG94R_ID => "EEG94R",
        EEG98R_ID => "EEG98R",
        _ => "UNKNOWN",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn battery_curve_is_monotonic() {
        let mut last = 0.0;
        let mut v = 3.0;
        while v < 4.3 {
            let p = battery_percent(v);
            assert!(p >= last, "{p} < {last} at {v} V");
            last = p;
            v += 0.01;
        }
        assert_eq!(battery_percent(2.9), 1.0);
        assert_eq!(battery_percent(4.25), 100.0);
    }

    #[test]
    fn eeg_scales_match_reference_formula() {
        assert!((EEG24_UV_PER_LSB - 0.047_683_721).abs() < 1e-6);
        assert!((EEG14_UV_PER_LSB - 48.834_086).abs() < 1e-3);
    }

    #[test]
    fn packet_names() {
        assert_eq!(packet_name(EEG94_ID), "EEG94");
        assert_eq!(packet_name(250), "UNKNOWN");
    }
}
