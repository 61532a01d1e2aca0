//! End-to-end runs of the acquisition loop over in-memory byte sources.

use std::io::Cursor;
use std::sync::atomic::Ordering;
use std::time::{Duration, Instant};

use explore_rs::prelude::*;
use explore_rs::protocol::{EEG94_ID, INFO_ID, ORN_ID};
use explore_rs::types::Vec3;

fn eeg_frame(counter: u8, ts: u32) -> Frame {
    let body = PacketBody::Eeg(EegData {
        channel_count: 4,
        samples: vec![vec![f64::from(counter)]; 4],
    });
    Frame::new(EEG94_ID, counter, ts, encode_packet(EEG94_ID, &body).unwrap())
}

fn orn_frame(ts: u32, gyro_z: f64) -> Frame {
    let body = PacketBody::Orientation(OrientationData {
        acc: Vec3::new(0.0, 0.0, 1000.0),
        gyro: Vec3::new(0.0, 0.0, gyro_z),
        mag: Vec3::new(300.0, 0.0, 400.0),
        ned: None,
    });
    Frame::new(ORN_ID, 0, ts, encode_packet(ORN_ID, &body).unwrap())
}

fn info_frame() -> Frame {
    let body = PacketBody::DeviceInfo(DeviceInfo {
        firmware_version: "2.6.9".into(),
        sampling_rate: Some(250.0),
        adc_mask: Some(0x0F),
    });
    Frame::new(INFO_ID, 0, 0, encode_packet(INFO_ID, &body).unwrap())
}

fn bytes(frames: &[Frame]) -> Vec<u8> {
    frames.iter().flat_map(Frame::to_bytes).collect()
}

fn packets(events: &[SinkEvent]) -> Vec<&Packet> {
    events
        .iter()
        .filter_map(|e| match e {
            SinkEvent::Packet(p) => Some(p),
            SinkEvent::DeviceInfo(_) => None,
        })
        .collect()
}

fn identity_calibration() -> CalibrationSet {
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
fn resumes_after_mid_frame_drop_without_duplicates() {
    let frames: Vec<Frame> = (0..10).map(|i| eeg_frame(i, 1000 + u32::from(i) * 40)).collect();

    // The first link dies half way through frame 5.
    let mut first = bytes(&frames[..5]);
    let partial = frames[5].to_bytes();
    first.extend_from_slice(&partial[..partial.len() / 2]);
    // The device resends from frame 5 on the second link.
    let mut links = vec![Cursor::new(bytes(&frames[5..]))].into_iter();

    let mut causes = Vec::new();
    let reconnect = |cause: &ExploreError| {
        causes.push(cause.to_string());
        links
            .next()
            .ok_or_else(|| ExploreError::ReconnectFailed("no more links".into()))
    };

    let mut events: Vec<SinkEvent> = Vec::new();
    let mut acq = AcquisitionLoop::new(
        Cursor::new(first),
        reconnect,
        &mut events,
        AcquisitionConfig::default(),
    )
    .unwrap();
    let err = acq.run().unwrap_err();
    assert!(matches!(err, ExploreError::ReconnectFailed(_)));
    assert_eq!(acq.stats().reconnects, 1);
    assert_eq!(acq.stats().frames, 10);
    drop(acq);

    assert_eq!(causes.len(), 2);
    assert!(causes[0].contains("truncated"), "{}", causes[0]);

    let stamps: Vec<f64> = packets(&events).iter().map(|p| p.timestamp).collect();
    assert_eq!(stamps.len(), 10);
    assert_eq!(stamps[0], 0.0);
    assert!(stamps.windows(2).all(|w| w[1] > w[0]), "{stamps:?}");
}

#[test]
fn reconnect_error_aborts_with_that_error() {
    let reconnect = |_: &ExploreError| -> explore_rs::error::Result<Cursor<Vec<u8>>> {
        Err(ExploreError::ReconnectFailed("device gone".into()))
    };
    let mut acq = AcquisitionLoop::new(
        Cursor::new(bytes(&[eeg_frame(0, 0)])),
        reconnect,
        Vec::<SinkEvent>::new(),
        AcquisitionConfig::default(),
    )
    .unwrap();
    match acq.run() {
        Err(ExploreError::ReconnectFailed(msg)) => assert_eq!(msg, "device gone"),
        other => panic!("unexpected {other:?}"),
    }
    assert_eq!(acq.sink().len(), 1);
}

#[test]
fn duration_bounds_an_endless_source() {
    let config = AcquisitionConfig {
        duration: Some(Duration::from_millis(50)),
        ..AcquisitionConfig::default()
    };
    let started = Instant::now();
    let mut acq =
        AcquisitionLoop::new(Simulator::new(), NoReconnect, Vec::<SinkEvent>::new(), config).unwrap();
    let stats = acq.run().unwrap();
    assert!(started.elapsed() >= Duration::from_millis(50));
    assert!(stats.frames > 0);
    assert_eq!(stats.reconnects, 0);
    assert_eq!(acq.firmware_version(), Some("2.1.0"));

    match &acq.sink()[0] {
        SinkEvent::DeviceInfo(fields) => assert_eq!(fields["firmware_version"], "2.1.0"),
        other => panic!("expected device info first, got {other:?}"),
    }
}

#[test]
fn stop_handle_works_from_another_thread() {
    let mut acq = AcquisitionLoop::new(
        Simulator::new().real_time(),
        NoReconnect,
        Vec::<SinkEvent>::new(),
        AcquisitionConfig::default(),
    )
    .unwrap();
    let stop = acq.stop_handle();
    let stopper = std::thread::spawn(move || {
        std::thread::sleep(Duration::from_millis(100));
        stop.store(true, Ordering::Relaxed);
    });
    let stats = acq.run().unwrap();
    stopper.join().unwrap();
    assert!(stats.frames > 0);
}

#[test]
fn device_info_reaches_sink_in_every_mode() {
    for mode in [Mode::Print, Mode::Record, Mode::Calibrate, Mode::Initialize] {
        let config = AcquisitionConfig {
            mode,
            ..AcquisitionConfig::default()
        };
        let mut acq = AcquisitionLoop::new(
            Cursor::new(bytes(&[info_frame()])),
            NoReconnect,
            Vec::<SinkEvent>::new(),
            config,
        )
        .unwrap();
        assert!(acq.run().is_err());
        let fields = acq
            .sink()
            .iter()
            .find_map(|e| match e {
                SinkEvent::DeviceInfo(f) => Some(f.clone()),
                SinkEvent::Packet(_) => None,
            })
            .unwrap_or_else(|| panic!("no device info in {mode} mode"));
        assert_eq!(fields["firmware_version"], "2.6.9");
        assert_eq!(fields["sampling_rate"], 250.0);
        assert_eq!(fields["adc_mask"], 15);
    }
}

#[test]
fn visualize_tracks_rotation_after_initializing() {
    let config = AcquisitionConfig {
        mode: Mode::Visualize,
        calibration: Some(identity_calibration()),
        ..AcquisitionConfig::default()
    };
    // First sample sets the reference; the rest rotate about z.
    let frames: Vec<Frame> = (0..20).map(|i| orn_frame(i * 500, 20_000.0)).collect();
    let mut acq = AcquisitionLoop::new(
        Cursor::new(bytes(&frames)),
        NoReconnect,
        Vec::<SinkEvent>::new(),
        config,
    )
    .unwrap();
    assert_eq!(acq.mode(), Mode::Initialize);
    assert!(acq.run().is_err());
    assert_eq!(acq.mode(), Mode::Visualize);

    let events = acq.into_sink();
    let triads: Vec<Triad> = packets(&events)
        .iter()
        .map(|p| match &p.body {
            PacketBody::Orientation(o) => o.ned.expect("triad attached in visualize"),
            other => panic!("unexpected {other:?}"),
        })
        .collect();
    assert_eq!(triads.len(), 19);
    for t in &triads {
        assert!(t.north.dot(&t.east).abs() < 1e-6);
        assert!(t.east.dot(&t.down).abs() < 1e-6);
        assert!((t.down.norm() - 1.0).abs() < 1e-9);
    }
}

#[test]
fn visualize_without_calibration_fails() {
    let config = AcquisitionConfig {
        mode: Mode::Visualize,
        ..AcquisitionConfig::default()
    };
    let frames = [orn_frame(0, 0.0), orn_frame(500, 0.0)];
    let mut acq = AcquisitionLoop::new(
        Cursor::new(bytes(&frames)),
        NoReconnect,
        Vec::<SinkEvent>::new(),
        config,
    )
    .unwrap();
    assert!(matches!(acq.run(), Err(ExploreError::MissingCalibration)));
}

#[test]
fn calibrate_mode_derives_a_set() {
    let config = AcquisitionConfig {
        mode: Mode::Calibrate,
        ..AcquisitionConfig::default()
    };
    let mags = [
        Vec3::new(-200.0, 100.0, 50.0),
        Vec3::new(400.0, -300.0, 450.0),
        Vec3::new(100.0, 500.0, -150.0),
    ];
    let frames: Vec<Frame> = mags
        .iter()
        .enumerate()
        .map(|(i, mag)| {
            let body = PacketBody::Orientation(OrientationData {
                acc: Vec3::new(0.0, 0.0, 1000.0),
                gyro: Vec3::zeros(),
                mag: *mag,
                ned: None,
            });
            Frame::new(ORN_ID, i as u8, i as u32 * 500, encode_packet(ORN_ID, &body).unwrap())
        })
        .collect();
    let mut acq = AcquisitionLoop::new(
        Cursor::new(bytes(&frames)),
        NoReconnect,
        Vec::<SinkEvent>::new(),
        config,
    )
    .unwrap();
    assert!(acq.run().is_err());
    assert_eq!(acq.stats().forwarded, 3);

    let set = acq.calibration_result().unwrap();
    // Offsets are the mid-ranges, y has the widest swing.
    assert!((set.mx_offset - 100.0).abs() < 2.0, "{set:?}");
    assert!((set.my_offset - 100.0).abs() < 2.0, "{set:?}");
    assert!((set.mz_offset - 150.0).abs() < 2.0, "{set:?}");
    assert!((set.kx - 1.0).abs() < 0.01);
    assert!((set.ky - 0.75).abs() < 0.01);
}

#[test]
fn filtered_eeg_in_visualize_differs_from_raw() {
    let config = AcquisitionConfig {
        mode: Mode::Visualize,
        calibration: Some(identity_calibration()),
        band_pass: Some((1.0, 30.0)),
        ..AcquisitionConfig::default()
    };
    let mut frames = vec![orn_frame(0, 0.0)];
    frames.extend((1..6).map(|i| eeg_frame(i, u32::from(i) * 40)));
    let mut acq = AcquisitionLoop::new(
        Cursor::new(bytes(&frames)),
        NoReconnect,
        Vec::<SinkEvent>::new(),
        config,
    )
    .unwrap();
    assert!(acq.run().is_err());

    let events = acq.into_sink();
    let eeg: Vec<&EegData> = packets(&events)
        .into_iter()
        .filter_map(|p| match &p.body {
            PacketBody::Eeg(e) => Some(e),
            _ => None,
        })
        .collect();
    assert_eq!(eeg.len(), 5);
    // A constant input through a band-pass never reproduces itself.
    let last = eeg[4].samples[0][0];
    assert!((last - 5.0).abs() > 1e-3, "{last}");
}

#[test]
fn reconnect_preserves_filters_and_reference_frame() {
    let config = || AcquisitionConfig {
        mode: Mode::Visualize,
        calibration: Some(identity_calibration()),
        band_pass: Some((1.0, 30.0)),
        ..AcquisitionConfig::default()
    };
    let mut frames = vec![orn_frame(0, 0.0)];
    frames.extend((1..40u32).map(|i| {
        if i % 2 == 1 {
            eeg_frame(i as u8, i * 40)
        } else {
            orn_frame(i * 40, 5_000.0)
        }
    }));

    let mut whole = AcquisitionLoop::new(
        Cursor::new(bytes(&frames)),
        NoReconnect,
        Vec::<SinkEvent>::new(),
        config(),
    )
    .unwrap();
    assert!(matches!(whole.run(), Err(ExploreError::ReconnectFailed(_))));
    let expected = whole.into_sink();
    assert_eq!(packets(&expected).len(), 39);

    let mut links = vec![Cursor::new(bytes(&frames[18..]))].into_iter();
    let reconnect = |_: &ExploreError| {
        links
            .next()
            .ok_or_else(|| ExploreError::ReconnectFailed("no more links".into()))
    };
    let mut split = AcquisitionLoop::new(
        Cursor::new(bytes(&frames[..18])),
        reconnect,
        Vec::<SinkEvent>::new(),
        config(),
    )
    .unwrap();
    assert!(matches!(split.run(), Err(ExploreError::ReconnectFailed(_))));
    assert_eq!(split.stats().reconnects, 1);
    assert_eq!(split.mode(), Mode::Visualize);
    assert!(split.state().is_tracking());
    assert_eq!(split.into_sink(), expected);
}
