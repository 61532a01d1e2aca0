use std::fs::File;
use std::io::{self, BufRead, BufReader, Read};
use std::path::PathBuf;
use std::sync::atomic::Ordering;
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use log::{info, warn};
use serde_json::Value;

use explore_rs::error::ExploreError;
use explore_rs::prelude::*;

type Source = Box<dyn Read + Send>;
type Reconnector = Box<dyn FnMut(&ExploreError) -> explore_rs::error::Result<Source> + Send>;

const USAGE: &str = "\
usage: explore-rs (--simulate | --file <path> | --device <path>) [options]

  --mode <m>               print | record | stream | visualize | calibrate | initialize
  --duration <secs>        stop after this many seconds
  --calibration <csv>      magnetometer calibration (required for visualize)
  --save-calibration <csv> write the set derived in calibrate mode
  --bandpass <lo>,<hi>     band-pass cutoffs in Hz (visualize mode)
  --notch <hz|off>         mains notch frequency, default 50
";

/// Reconnect attempts per transport fault before the session is abandoned.
const RECONNECT_ATTEMPTS: u32 = 5;

#[derive(Default)]
struct Args {
    simulate: bool,
    file: Option<PathBuf>,
    device: Option<PathBuf>,
    save_calibration: Option<PathBuf>,
    calibration: Option<PathBuf>,
    config: AcquisitionConfig,
}

fn parse_args() -> Result<Args> {
    let mut args = Args::default();
    let mut it = std::env::args().skip(1);
    while let Some(flag) = it.next() {
        let mut value = || it.next().ok_or_else(|| anyhow!("{flag} needs a value\n\n{USAGE}"));
        match flag.as_str() {
            "--simulate" => args.simulate = true,
            "--file" => args.file = Some(value()?.into()),
            "--device" => args.device = Some(value()?.into()),
            "--calibration" => args.calibration = Some(value()?.into()),
            "--save-calibration" => args.save_calibration = Some(value()?.into()),
            "--mode" => args.config.mode = value()?.parse().map_err(|e: String| anyhow!(e))?,
            "--duration" => {
                let secs: f64 = value()?.parse().context("--duration expects seconds")?;
                args.config.duration = Some(Duration::from_secs_f64(secs));
            }
            "--bandpass" => {
                let v = value()?;
                let (lo, hi) = v
                    .split_once(',')
                    .ok_or_else(|| anyhow!("--bandpass expects <lo>,<hi>"))?;
                args.config.band_pass = Some((lo.trim().parse()?, hi.trim().parse()?));
            }
            "--notch" => {
                let v = value()?;
                args.config.notch = match v.as_str() {
                    "off" | "none" => None,
                    hz => Some(hz.parse().context("--notch expects Hz or 'off'")?),
                };
            }
            "-h" | "--help" => {
                print!("{USAGE}");
                std::process::exit(0);
            }
            other => bail!("unknown argument '{other}'\n\n{USAGE}"),
        }
    }
    Ok(args)
}

/// Re-open a device node until it comes back or the attempts run out.
fn reopen_device(path: PathBuf) -> Reconnector {
    Box::new(move |cause: &ExploreError| {
        for attempt in 1..=RECONNECT_ATTEMPTS {
            std::thread::sleep(Duration::from_secs(1));
            match File::open(&path) {
                Ok(f) => {
                    info!("Reopened {} after {cause} (attempt {attempt})", path.display());
                    return Ok(Box::new(BufReader::new(f)) as Source);
                }
                Err(e) => warn!("Reopen {} attempt {attempt}: {e}", path.display()),
            }
        }
        Err(ExploreError::ReconnectFailed(format!(
            "{} did not come back after {RECONNECT_ATTEMPTS} attempts",
            path.display()
        )))
    })
}

fn open_source(args: &Args) -> Result<(Source, Reconnector)> {
    let no_reconnect = || -> Reconnector {
        Box::new(|cause: &ExploreError| NoReconnect.reconnect(cause))
    };
    if args.simulate {
        info!("Using the built-in simulator");
        let source: Source = Box::new(Simulator::new().real_time());
        return Ok((source, no_reconnect()));
    }
    if let Some(path) = &args.file {
        let f = File::open(path).with_context(|| format!("opening {}", path.display()))?;
        info!("Replaying {}", path.display());
        let source: Source = Box::new(BufReader::new(f));
        return Ok((source, no_reconnect()));
    }
    if let Some(path) = &args.device {
        let f = File::open(path).with_context(|| format!("opening {}", path.display()))?;
        info!("Reading from {}", path.display());
        let source: Source = Box::new(BufReader::new(f));
        return Ok((source, reopen_device(path.clone())));
    }
    bail!("no byte source given\n\n{USAGE}")
}

#[tokio::main]
async fn main() -> Result<()> {
    // ── Logging ───────────────────────────────────────────────────────────────
    // Set RUST_LOG=debug for verbose output, e.g.:
    //   RUST_LOG=explore_rs=debug cargo run -- --simulate
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    // ── Configuration ─────────────────────────────────────────────────────────
    let mut args = parse_args()?;
    if let Some(path) = &args.calibration {
        let f = File::open(path).with_context(|| format!("opening {}", path.display()))?;
        args.config.calibration = Some(CalibrationSet::from_reader(f)?);
        info!("Loaded magnetometer calibration from {}", path.display());
    }
    let is_replay = args.file.is_some();
    let (source, reconnect) = open_source(&args)?;

    // ── Acquisition thread ────────────────────────────────────────────────────
    let (sink, mut rx) = ChannelSink::new(1024);
    let mut acq = AcquisitionLoop::new(source, reconnect, sink, args.config.clone())?;
    let stop = acq.stop_handle();

    info!("Running in {} mode. Type 'q' + Enter to quit.", args.config.mode);
    std::thread::spawn(move || {
        for line in io::stdin().lock().lines() {
            match line {
                Ok(l) if l.trim() == "q" => {
                    info!("Quit requested.");
                    stop.store(true, Ordering::Relaxed);
                    break;
                }
                Ok(_) => {}
                Err(_) => break,
            }
        }
    });

    let worker = tokio::task::spawn_blocking(move || {
        let result = acq.run();
        (result, acq.calibration_result())
    });

    // ── Main event loop ───────────────────────────────────────────────────────
    while let Some(event) = rx.recv().await {
        match event {
            SinkEvent::Packet(packet) => println!("{packet}"),
            SinkEvent::DeviceInfo(fields) => {
                println!("[DEVICE INFO] {}", Value::Object(fields));
            }
        }
    }

    let (result, derived) = worker.await?;
    match result {
        Ok(stats) => info!("Finished: {stats:?}"),
        Err(ExploreError::ReconnectFailed(_)) if is_replay => info!("End of recording."),
        Err(e) => return Err(e.into()),
    }

    if let Some(path) = &args.save_calibration {
        let set = derived.ok_or_else(|| {
            anyhow!("no calibration derived; run --mode calibrate and rotate the device")
        })?;
        set.write_csv(File::create(path)?)?;
        info!("Wrote calibration to {}", path.display());
    }
    Ok(())
}
