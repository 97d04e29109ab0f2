//! # vocal-pitch
//!
//! Command-line front-end for the pitch-core detection engine.
//!
//! ## Commands
//! - `live`: sing into the default microphone and watch note, cents and
//!   confidence scroll by
//! - `analyze`: pitch of a WAV recording at one moment or along its length
//! - `settings`: print or write the default detection settings as JSON
//!
//! Logging goes through `env_logger`; set `RUST_LOG=debug` for per-cycle
//! detail from the core.

mod audio;
mod display;
mod settings_file;
mod tuning;
mod wav;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{bail, Result};
use clap::{Args, Parser, Subcommand};
use cpal::traits::StreamTrait;
use crossbeam_channel::RecvTimeoutError;
use log::{info, warn};
use pitch_core::offline::DEFAULT_OFFLINE_WINDOW;
use pitch_core::{DetectionSettings, DetectorConfig, OfflineAnalyzer, PitchDetector};

/// Width of the spectrum line printed in live mode.
const SPECTRUM_COLUMNS: usize = 48;

#[derive(Parser)]
#[command(name = "vocal-pitch")]
#[command(author, version, about = "Real-time vocal pitch detection", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Detect pitch from the default microphone
    Live(LiveArgs),

    /// Detect pitch in a WAV recording
    Analyze(AnalyzeArgs),

    /// Print or save the default detection settings
    Settings(SettingsArgs),
}

#[derive(Args)]
struct LiveArgs {
    /// Settings JSON file (defaults to the live settings)
    #[arg(long, value_name = "FILE")]
    settings: Option<PathBuf>,

    /// Stop after this many seconds
    #[arg(long, default_value = "30")]
    seconds: u64,

    /// Analysis window in samples
    #[arg(long, default_value = "8192")]
    window: usize,

    /// Samples between analysis cycles
    #[arg(long, default_value = "2048")]
    hop: usize,

    /// Also print a spectrum line for each result
    #[arg(long)]
    spectrum: bool,
}

#[derive(Args)]
struct AnalyzeArgs {
    /// Input WAV file
    #[arg(value_name = "INPUT")]
    input: PathBuf,

    /// Analyze a single moment, in seconds
    #[arg(long, conflicts_with = "step")]
    at: Option<f64>,

    /// Analyze the whole file at this interval, in seconds
    #[arg(long)]
    step: Option<f64>,

    /// Settings JSON file (defaults to the offline settings)
    #[arg(long, value_name = "FILE")]
    settings: Option<PathBuf>,

    /// Analysis window in samples
    #[arg(long, default_value_t = DEFAULT_OFFLINE_WINDOW)]
    window: usize,
}

#[derive(Args)]
struct SettingsArgs {
    /// Use the settings tuned for recordings
    #[arg(long)]
    offline: bool,

    /// Write to this file instead of stdout
    #[arg(short, long, value_name = "FILE")]
    out: Option<PathBuf>,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Live(args) => run_live(args),
        Commands::Analyze(args) => run_analyze(args),
        Commands::Settings(args) => run_settings(args),
    }
}

fn settings_or(path: Option<&Path>, fallback: DetectionSettings) -> Result<DetectionSettings> {
    match path {
        Some(path) => {
            let settings = settings_file::load_settings(path)?;
            info!("loaded settings from {}", path.display());
            Ok(settings)
        }
        None => Ok(fallback),
    }
}

fn run_live(args: LiveArgs) -> Result<()> {
    let settings = settings_or(args.settings.as_deref(), DetectionSettings::live())?;
    let config = DetectorConfig {
        window_size: args.window,
        hop_size: args.hop,
        nominal_sample_rate: audio::TARGET_SAMPLE_RATE as f32,
        ..DetectorConfig::default()
    };

    let detector = Arc::new(PitchDetector::with_session(
        config,
        settings,
        Arc::new(audio::InputDeviceSession),
    )?);
    detector.start()?;
    let events = detector.subscribe();

    let (stream, sample_rate) = audio::start_audio_capture(Arc::clone(&detector))?;
    println!("Listening for {} s at {} Hz. Sing!", args.seconds, sample_rate);

    let deadline = Instant::now() + Duration::from_secs(args.seconds);
    // Repeated "no pitch" lines of the same kind are printed once.
    let mut last_reason = None;
    loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            break;
        }
        match events.recv_timeout(remaining) {
            Ok(event) => {
                let reason = event.detection.reason();
                if reason.is_some() && reason == last_reason {
                    continue;
                }
                last_reason = reason;
                println!("{}", display::detection_line(&event.detection));
                if args.spectrum {
                    println!(
                        "          {}",
                        display::event_spectrum_line(&event, SPECTRUM_COLUMNS)
                    );
                }
            }
            Err(RecvTimeoutError::Timeout) => break,
            Err(RecvTimeoutError::Disconnected) => {
                warn!("detector stopped publishing");
                break;
            }
        }
    }

    if let Err(e) = stream.pause() {
        warn!("failed to pause the input stream: {}", e);
    }
    drop(stream);
    detector.stop();
    Ok(())
}

fn run_analyze(args: AnalyzeArgs) -> Result<()> {
    let settings = settings_or(args.settings.as_deref(), DetectionSettings::offline())?;
    let analyzer = OfflineAnalyzer::with_settings(args.window, settings)?;
    let recording = wav::read_first_channel(&args.input)?;
    info!(
        "{}: {:.2} s at {} Hz",
        args.input.display(),
        recording.duration_secs(),
        recording.sample_rate
    );

    match (args.at, args.step) {
        (Some(at), _) => {
            if at > recording.duration_secs() {
                bail!(
                    "{} s is past the end of the recording ({:.2} s)",
                    at,
                    recording.duration_secs()
                );
            }
            let detection = analyzer.analyze(&recording.samples, recording.sample_rate, at)?;
            println!("{:>8.3} s {}", at, display::detection_line(&detection));
        }
        (None, step) => {
            let step = step.unwrap_or(0.1);
            let track = analyzer.analyze_track(&recording.samples, recording.sample_rate, step)?;
            for (t, detection) in track {
                println!("{:>8.3} s {}", t, display::detection_line(&detection));
            }
        }
    }
    Ok(())
}

fn run_settings(args: SettingsArgs) -> Result<()> {
    let settings = if args.offline {
        DetectionSettings::offline()
    } else {
        DetectionSettings::live()
    };
    match args.out {
        Some(path) => {
            settings_file::save_settings(&settings, &path)?;
            println!("Settings written to {}", path.display());
        }
        None => println!("{}", serde_json::to_string_pretty(&settings)?),
    }
    Ok(())
}
