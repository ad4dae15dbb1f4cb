use rtlscan_engine::series::{self, DIFF_SUPPRESSED, Series};
use rtlscan_engine::{ScanProfile, Session, scaling};
use rtlscan_messages::{
    AcquisitionOptions, Event, Gain, Hertz, ScalingMode, ScanConfig, SourceConfig,
};

use anyhow::{Context, bail};
use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum};
use log::{LevelFilter, info, warn};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::str::FromStr;

#[derive(Parser, Debug)]
#[command(author, version, about = "Swept spectrum scanner for RTL-SDR receivers", long_about = None)]
struct Cli {
    /// Verbosity level (-v=info, -vv=debug, -vvv=trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    /// Profile supplying the range and threshold when not given on the command
    /// line. Updated with the values each command ends up using.
    #[arg(long, default_value = "config.txt", global = true)]
    profile: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Sweep the range and print a summary line per sweep
    Scan {
        #[command(flatten)]
        range: RangeArgs,
        #[command(flatten)]
        source: SourceArgs,
        /// Report linear power instead of dB
        #[arg(long, default_value_t = false)]
        linear: bool,
        /// Stop after this many sweeps (runs until killed otherwise)
        #[arg(long)]
        sweeps: Option<u64>,
    },
    /// Average several sweeps into a series file
    Record {
        #[command(flatten)]
        range: RangeArgs,
        #[command(flatten)]
        source: SourceArgs,
        #[arg(short, long)]
        out: PathBuf,
        #[arg(long, default_value_t = 10)]
        sweeps: u64,
    },
    /// Compare two series files and print bins where near - far meets the threshold
    Diff {
        far: PathBuf,
        near: PathBuf,
        /// Minimum difference in dB (profile value when omitted)
        #[arg(long, allow_hyphen_values = true)]
        threshold: Option<f64>,
    },
}

#[derive(Args, Debug)]
struct RangeArgs {
    /// Start frequency (accepts k/M/G suffix, e.g. 87.5M)
    #[arg(long, value_parser = Hertz::from_str)]
    start: Option<Hertz>,
    /// End frequency
    #[arg(long, value_parser = Hertz::from_str)]
    end: Option<Hertz>,
    /// Bin width
    #[arg(long, value_parser = Hertz::from_str)]
    step: Option<Hertz>,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum SourceKind {
    Sim,
    Rtlsdr,
}

#[derive(Args, Debug)]
struct SourceArgs {
    #[arg(long, value_enum, default_value_t = SourceKind::Sim)]
    source: SourceKind,
    /// RTL-SDR device index
    #[arg(long, default_value_t = 0)]
    device: usize,
    /// Tuner gain in dB (automatic when omitted)
    #[arg(short, long)]
    gain: Option<f32>,
    #[arg(long, default_value = "2.048M", value_parser = Hertz::from_str)]
    sample_rate: Hertz,
    /// Frequency correction in ppm
    #[arg(long, default_value_t = 0, allow_hyphen_values = true)]
    ppm: i32,
}

impl SourceArgs {
    fn config(&self) -> SourceConfig {
        match self.source {
            SourceKind::Sim => SourceConfig::Simulated {
                sample_rate: self.sample_rate,
                tones: Vec::new(),
                noise_floor: rtlscan_messages::Decibels(-60.0),
                seed: 0,
            },
            SourceKind::Rtlsdr => SourceConfig::RtlSdr {
                index: self.device,
                sample_rate: self.sample_rate,
                gain: self.gain.map_or(Gain::Auto, Gain::Manual),
                ppm: self.ppm,
            },
        }
    }
}

/// Command line first, then the profile (whose defaults cover the FM broadcast band).
fn resolve_range(args: &RangeArgs, profile: &ScanProfile) -> ScanConfig {
    ScanConfig::new(
        args.start.unwrap_or(profile.config.start),
        args.end.unwrap_or(profile.config.end),
        args.step.unwrap_or(profile.config.step),
    )
}

/// Write the settings in use back to the profile so the next run starts from them.
fn remember(path: &Path, profile: &ScanProfile) {
    match profile.save(path) {
        Ok(()) => info!("Saved profile to {}", path.display()),
        Err(e) => warn!("Cannot save profile {}: {}", path.display(), e),
    }
}

/// Resolve and check the range, then persist it along with the threshold.
fn prepare_range(args: &RangeArgs, profile: &ScanProfile, path: &Path) -> anyhow::Result<ScanConfig> {
    let config = resolve_range(args, profile);
    config.validate().map_err(anyhow::Error::msg)?;
    remember(
        path,
        &ScanProfile {
            config,
            threshold: profile.threshold,
        },
    );
    Ok(config)
}

/// Run a session and hand every completed sweep to `on_sweep` until it stops.
fn run_sweeps(
    config: ScanConfig,
    source: &SourceConfig,
    sweep_limit: Option<u64>,
    mode: ScalingMode,
    mut on_sweep: impl FnMut(u64, &[f32], i32) -> anyhow::Result<()>,
) -> anyhow::Result<()> {
    let mut session = Session::new();
    session.set_scaling(mode);
    let event_rx = session.subscribe();

    let options = AcquisitionOptions {
        sweep_limit,
        ..AcquisitionOptions::default()
    };
    session
        .initialize(config, source, &options)
        .with_context(|| format!("cannot start scan {}..{}", config.start, config.end))?;
    info!("Scanning {} bins", session.buffer_size());

    for event in event_rx.iter() {
        match event {
            Event::SweepComplete { sweep } => {
                let bins = session.bins_vec()?;
                let total = scaling::total_magnitude(&bins);
                on_sweep(sweep, &bins, total)?;
            }
            Event::Stopped { sweeps } => {
                info!("Stopped after {} sweep(s)", sweeps);
                break;
            }
            Event::AcquisitionFailed(msg) => bail!("acquisition failed: {}", msg),
        }
    }

    session.shutdown()?;
    Ok(())
}

fn scan(
    config: ScanConfig,
    source: &SourceConfig,
    linear: bool,
    sweeps: Option<u64>,
) -> anyhow::Result<()> {
    let mode = if linear {
        ScalingMode::Linear
    } else {
        ScalingMode::Decibel
    };
    let stdout = std::io::stdout();
    run_sweeps(config, source, sweeps, mode, |sweep, bins, total| {
        let Some((peak, level)) = bins
            .iter()
            .copied()
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(&b.1))
        else {
            return Ok(());
        };
        writeln!(
            stdout.lock(),
            "sweep {:>5}  total {:>10}  peak {} @ {:.3} MHz",
            sweep,
            total,
            level,
            config.bin_center(peak) / 1e6
        )?;
        Ok(())
    })
}

fn record(config: ScanConfig, source: &SourceConfig, out: &Path, sweeps: u64) -> anyhow::Result<()> {
    let mut series = Series::new(config);
    run_sweeps(config, source, Some(sweeps), ScalingMode::Decibel, |_, bins, _| {
        series.record(bins)?;
        Ok(())
    })?;
    series
        .save(out)
        .with_context(|| format!("cannot write {}", out.display()))?;
    println!(
        "Recorded {} sweep(s) of {} bins to {}",
        series.frames(),
        series.len(),
        out.display()
    );
    Ok(())
}

fn diff(far: &Path, near: &Path, threshold: f64) -> anyhow::Result<()> {
    let far_series =
        Series::load(far).with_context(|| format!("cannot read {}", far.display()))?;
    let near_series =
        Series::load(near).with_context(|| format!("cannot read {}", near.display()))?;
    if far_series.config() != near_series.config() {
        warn!(
            "Series were recorded with different ranges; comparing bin by bin anyway"
        );
    }

    let config = far_series.config();
    let diff = series::difference(&far_series, &near_series, Some(threshold))?;
    let mut stdout = std::io::stdout().lock();
    for (i, value) in diff.iter().enumerate() {
        if *value != DIFF_SUPPRESSED {
            writeln!(stdout, "{:.3} MHz  {:+.1} dB", config.bin_center(i) / 1e6, value)?;
        }
    }
    Ok(())
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let profile = ScanProfile::load_or_default(&cli.profile);

    match cli.command {
        Command::Scan {
            range,
            source,
            linear,
            sweeps,
        } => {
            let config = prepare_range(&range, &profile, &cli.profile)?;
            scan(config, &source.config(), linear, sweeps)
        }
        Command::Record {
            range,
            source,
            out,
            sweeps,
        } => {
            let config = prepare_range(&range, &profile, &cli.profile)?;
            record(config, &source.config(), &out, sweeps)
        }
        Command::Diff {
            far,
            near,
            threshold,
        } => {
            if let Some(threshold) = threshold {
                remember(
                    &cli.profile,
                    &ScanProfile {
                        threshold,
                        ..profile.clone()
                    },
                );
            }
            diff(&far, &near, threshold.unwrap_or(profile.threshold))
        }
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        2 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };
    env_logger::builder()
        .format(|buf, record| {
            writeln!(
                buf,
                "{:<5} - mod path |{}| - target | {} | args: |{}|",
                record.level(),
                record.module_path().unwrap_or(""),
                record.target(),
                record.args()
            )
        })
        .filter_level(level)
        .filter_module("rtlscan_engine::acquisition", level.min(LevelFilter::Info))
        .parse_default_env()
        .init();

    run(cli)
}
