use std::fs;
use std::io::{self, Write};
use std::process::ExitCode;
use std::thread;
use std::time::{Duration, Instant};

use loopback_meter_core::{
    CaptureSource, LevelMeter, MeterConfiguration, MeterError, SessionEnd, StereoLevels, ToneSource,
};

const USAGE: &str = "usage: loopback-meter [--seconds N] [--fps N] [--config PATH] [--device ID] [--list-devices] [--tone]";

const BAR_WIDTH: usize = 40;

/// Parsed command line.
#[derive(Debug)]
struct Options {
    seconds: u64,
    fps: u32,
    config: MeterConfiguration,
    device: Option<String>,
    list_devices: bool,
    tone: bool,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            seconds: 10,
            fps: 30,
            config: MeterConfiguration::default(),
            device: None,
            list_devices: false,
            tone: false,
        }
    }
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let options = match parse_args(std::env::args().skip(1)) {
        Ok(options) => options,
        Err(message) => {
            eprintln!("{}\n{}", message, USAGE);
            return ExitCode::from(2);
        }
    };

    match run(options) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

fn parse_args(mut args: impl Iterator<Item = String>) -> Result<Options, String> {
    let mut options = Options::default();

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--seconds" => {
                options.seconds = parse_value(&arg, args.next())?;
                if session_deadline(options.seconds).is_none() {
                    return Err(format!("--seconds {} is out of range", options.seconds));
                }
            }
            "--fps" => {
                options.fps = parse_value(&arg, args.next())?;
                if options.fps == 0 {
                    return Err("--fps must be at least 1".into());
                }
            }
            "--config" => {
                let path = args.next().ok_or("--config needs a path")?;
                let text = fs::read_to_string(&path).map_err(|e| format!("cannot read {}: {}", path, e))?;
                options.config = MeterConfiguration::from_json(&text).map_err(|e| e.to_string())?;
            }
            "--device" => options.device = Some(args.next().ok_or("--device needs an id")?),
            "--list-devices" => options.list_devices = true,
            "--tone" => options.tone = true,
            "-h" | "--help" => return Err("loopback-meter: system audio level meter".into()),
            other => return Err(format!("unknown argument: {}", other)),
        }
    }

    Ok(options)
}

fn parse_value<T: std::str::FromStr>(flag: &str, value: Option<String>) -> Result<T, String> {
    let value = value.ok_or_else(|| format!("{} needs a value", flag))?;
    value
        .parse()
        .map_err(|_| format!("invalid value for {}: {}", flag, value))
}

fn session_deadline(seconds: u64) -> Option<Instant> {
    Instant::now().checked_add(Duration::from_secs(seconds))
}

fn run(options: Options) -> Result<(), MeterError> {
    if options.list_devices {
        return list_devices();
    }
    if options.tone || !cfg!(target_os = "windows") {
        if !options.tone {
            log::info!("No loopback backend on this platform; metering a test tone");
        }
        return meter(ToneSource::new(48_000, 2, 440.0).with_amplitudes(0.5, 0.1), &options);
    }
    run_loopback(&options)
}

#[cfg(target_os = "windows")]
fn run_loopback(options: &Options) -> Result<(), MeterError> {
    use loopback_meter_windows::WasapiLoopbackSource;

    let source = match options.device {
        Some(ref id) => WasapiLoopbackSource::with_device(id.clone()),
        None => WasapiLoopbackSource::default_device()?,
    };
    meter(source, options)
}

#[cfg(not(target_os = "windows"))]
fn run_loopback(_options: &Options) -> Result<(), MeterError> {
    Err(MeterError::DeviceNotAvailable)
}

#[cfg(target_os = "windows")]
fn list_devices() -> Result<(), MeterError> {
    let enumerator = loopback_meter_windows::DeviceEnumerator::new()?;
    for device in enumerator.list_render_devices()? {
        let marker = if device.is_default { "*" } else { " " };
        println!("{} {}  {}", marker, device.id, device.name);
    }
    Ok(())
}

#[cfg(not(target_os = "windows"))]
fn list_devices() -> Result<(), MeterError> {
    println!("no render devices: loopback capture is only available on Windows");
    Ok(())
}

/// Run one metering session, drawing bars until the time runs out or the
/// session faults, then print the report.
fn meter<S: CaptureSource + 'static>(source: S, options: &Options) -> Result<(), MeterError> {
    let mut meter = LevelMeter::initialize(source, options.config.clone())?;
    let format = meter.format();
    log::info!(
        "Metering {} ({} Hz, {} ch)",
        meter.device_name(),
        format.sample_rate,
        format.channels
    );

    let levels = meter.levels();
    let frame = Duration::from_secs(1) / options.fps;
    let deadline = session_deadline(options.seconds)
        .ok_or_else(|| MeterError::ConfigurationFailed(format!("--seconds {} is out of range", options.seconds)))?;

    meter.start()?;

    let mut stdout = io::stdout();
    while Instant::now() < deadline && meter.is_capturing() {
        let line = render_bars(levels.snapshot());
        // Best effort; a closed terminal should not end the session.
        let _ = write!(stdout, "\r{}", line);
        let _ = stdout.flush();
        thread::sleep(frame);
    }
    println!();

    let report = meter.stop()?;
    match serde_json::to_string_pretty(&report) {
        Ok(json) => println!("{}", json),
        Err(e) => log::warn!("Could not serialize session report: {}", e),
    }

    if let SessionEnd::Faulted(ref detail) = report.end {
        return Err(MeterError::StreamFault(detail.clone()));
    }
    Ok(())
}

fn render_bars(levels: StereoLevels) -> String {
    format!("L {}  R {}", bar(levels.left), bar(levels.right))
}

fn bar(level: f32) -> String {
    let filled = ((level.clamp(0.0, 1.0) * BAR_WIDTH as f32).round() as usize).min(BAR_WIDTH);
    format!("[{}{}] {:>4.2}", "#".repeat(filled), " ".repeat(BAR_WIDTH - filled), level)
}
