use anyhow::{anyhow, bail, Context, Result};
use biofeed_lib::{
    config::{read_config, MonitorConfig, SourceKind},
    estimator::HeartRateEstimator,
    io::text as text_io,
    signal::{BaselineProfile, Sample},
    source::replay::read_samples_csv,
};
use biofeed_run::{
    artifacts::{read_summary, SAMPLES_FILE, SUMMARY_FILE},
    read_intake_form, Controller, ControllerSettings, MonitorEvent, SessionSummary,
};
use clap::{Parser, Subcommand, ValueEnum};
use log::{info, warn};
use std::{
    io::{self, BufRead, Read},
    path::{Path, PathBuf},
    time::Duration,
};

#[derive(Parser)]
#[command(
    name = "biofeed",
    version,
    about = "Real-time ECG heart-rate monitoring and session recording"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum SourceArg {
    Demo,
    Serial,
    Replay,
}

impl From<SourceArg> for SourceKind {
    fn from(arg: SourceArg) -> Self {
        match arg {
            SourceArg::Demo => SourceKind::Demo,
            SourceArg::Serial => SourceKind::Serial,
            SourceArg::Replay => SourceKind::Replay,
        }
    }
}

/// Source selection shared by the live commands; flags override the config file.
#[derive(clap::Args)]
struct SourceOpts {
    #[arg(long)]
    config: Option<PathBuf>,
    #[arg(long, value_enum)]
    source: Option<SourceArg>,
    /// Device node for `serial`, sample table for `replay`
    #[arg(long)]
    path: Option<PathBuf>,
    /// Seed for the demo generator
    #[arg(long)]
    seed: Option<u64>,
    /// Acquisition period in milliseconds
    #[arg(long, default_value_t = 100)]
    tick_ms: u64,
}

impl SourceOpts {
    fn load(&self) -> Result<MonitorConfig> {
        let mut config = match &self.config {
            Some(path) => read_config(path)?,
            None => MonitorConfig::default(),
        };
        if let Some(kind) = self.source {
            config.source.kind = kind.into();
        }
        if self.path.is_some() {
            config.source.path = self.path.clone();
        }
        if self.seed.is_some() {
            config.source.seed = self.seed;
        }
        config.validate()?;
        Ok(config)
    }

    fn settings(&self, config: MonitorConfig) -> Result<ControllerSettings> {
        if self.tick_ms == 0 {
            bail!("--tick-ms must be positive");
        }
        Ok(ControllerSettings {
            config,
            tick: Duration::from_millis(self.tick_ms),
        })
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Interactive monitor driven by line commands on stdin
    /// (init, baseline [secs], start INTAKE.json, stop, status, reset, quit)
    Monitor {
        #[command(flatten)]
        source: SourceOpts,
        /// Do not print per-tick samples
        #[arg(long)]
        quiet: bool,
    },
    /// Run connect, baseline, one timed session and finalize, then print the summary
    Record {
        #[arg(long)]
        intake: PathBuf,
        /// Baseline length; defaults to the config value, 0 skips calibration
        #[arg(long)]
        baseline_secs: Option<f64>,
        #[arg(long, default_value_t = 60.0)]
        duration_secs: f64,
        #[arg(long)]
        sessions_dir: Option<PathBuf>,
        #[command(flatten)]
        source: SourceOpts,
    },
    /// Run the heart-rate estimator over newline-delimited voltages (stdin or --input)
    Estimate {
        #[arg(long)]
        input: Option<PathBuf>,
        #[arg(long)]
        config: Option<PathBuf>,
    },
    /// Recompute the summary of a recorded session folder
    Summarize {
        #[arg(long)]
        session: PathBuf,
    },
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();
    match cli.command {
        Commands::Monitor { source, quiet } => cmd_monitor(&source, quiet)?,
        Commands::Record {
            intake,
            baseline_secs,
            duration_secs,
            sessions_dir,
            source,
        } => cmd_record(
            &intake,
            baseline_secs,
            duration_secs,
            sessions_dir,
            &source,
        )?,
        Commands::Estimate { input, config } => {
            cmd_estimate(input.as_deref(), config.as_deref())?
        }
        Commands::Summarize { session } => cmd_summarize(&session)?,
    }
    Ok(())
}

fn seconds(value: f64, flag: &str) -> Result<Duration> {
    if !(value.is_finite() && value >= 0.0) {
        bail!("{flag} must be a non-negative number of seconds");
    }
    Ok(Duration::from_secs_f64(value))
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string(value)?);
    Ok(())
}

fn cmd_monitor(opts: &SourceOpts, quiet: bool) -> Result<()> {
    let config = opts.load()?;
    let default_baseline = config.baseline_seconds;
    let settings = opts.settings(config)?;
    let controller = Controller::from_config(
        settings,
        Box::new(move |sample: &Sample| {
            if !quiet {
                if let Ok(line) = serde_json::to_string(sample) {
                    println!("{line}");
                }
            }
        }),
    );
    let events = controller.events().clone();
    std::thread::spawn(move || {
        for event in events.iter() {
            if let Ok(line) = serde_json::to_string(&event) {
                println!("{line}");
            }
        }
    });

    let stdin = io::stdin();
    for line in stdin.lock().lines() {
        let line = line?;
        let mut words = line.split_whitespace();
        let Some(command) = words.next() else {
            continue;
        };
        let arg = words.next();
        let outcome: Result<()> = match command {
            "init" => controller
                .initialize()
                .map(|name| info!("source {name} ready"))
                .map_err(anyhow::Error::from),
            "baseline" => arg
                .map(|s| s.parse::<f64>().context("baseline length must be a number"))
                .unwrap_or(Ok(default_baseline))
                .and_then(|secs| seconds(secs, "baseline length"))
                .and_then(|dur| controller.begin_baseline(dur).map_err(Into::into)),
            "start" => match arg {
                Some(path) => read_intake_form(Path::new(path))
                    .and_then(|form| form.score().map_err(Into::into))
                    .and_then(|intake| controller.begin_session(intake).map_err(Into::into))
                    .map(|_| ()),
                None => Err(anyhow!("usage: start INTAKE.json")),
            },
            "stop" => controller.end_session().map(|_| ()).map_err(Into::into),
            "status" => controller
                .status()
                .map_err(anyhow::Error::from)
                .and_then(|status| print_json(&status)),
            "reset" => controller.reset().map_err(Into::into),
            "quit" | "exit" => break,
            other => Err(anyhow!("unknown command {other}")),
        };
        if let Err(err) = outcome {
            warn!("{command}: {err:#}");
            eprintln!("error: {err:#}");
        }
    }
    Ok(())
}

fn cmd_record(
    intake: &Path,
    baseline_secs: Option<f64>,
    duration_secs: f64,
    sessions_dir: Option<PathBuf>,
    opts: &SourceOpts,
) -> Result<()> {
    let intake = read_intake_form(intake)?.score()?;
    let mut config = opts.load()?;
    if let Some(dir) = sessions_dir {
        config.sessions_dir = dir;
    }
    let baseline = seconds(
        baseline_secs.unwrap_or(config.baseline_seconds),
        "--baseline-secs",
    )?;
    let duration = seconds(duration_secs, "--duration-secs")?;
    let controller =
        Controller::from_config(opts.settings(config)?, Box::new(|_: &Sample| {}));

    controller.initialize()?;
    if !baseline.is_zero() {
        controller.begin_baseline(baseline)?;
        loop {
            match controller.events().recv()? {
                MonitorEvent::BaselineComplete(_) => break,
                MonitorEvent::BaselineFailed { reason } => {
                    warn!("continuing without a baseline: {reason}");
                    break;
                }
                _ => {}
            }
        }
    }
    let scores = *intake.assessment.scores();
    let level = intake.assessment.level();
    let folder = controller.begin_session(intake)?;
    info!("recording {:.1} s into {}", duration.as_secs_f64(), folder.display());
    std::thread::sleep(duration);
    let report = controller.end_session()?;
    print_json(&serde_json::json!({
        "folder": report.folder,
        "assessment": scores,
        "anxiety_level": level,
        "summary": report.summary,
    }))
}

fn read_voltages(input: Option<&Path>) -> Result<Vec<f64>> {
    match input {
        Some(path) => text_io::read_voltage_series(path),
        None => {
            let mut buf = String::new();
            io::stdin().read_to_string(&mut buf)?;
            text_io::parse_voltage_series(&buf)
        }
    }
}

fn cmd_estimate(input: Option<&Path>, config: Option<&Path>) -> Result<()> {
    let config = match config {
        Some(path) => read_config(path)?,
        None => MonitorConfig::default(),
    };
    let voltages = read_voltages(input)?;
    let mut estimator = HeartRateEstimator::new(config.estimator, config.detector);
    let bpm: Vec<u32> = voltages.iter().map(|&v| estimator.estimate(v)).collect();
    print_json(&bpm)
}

fn cmd_summarize(session: &Path) -> Result<()> {
    let samples = read_samples_csv(&session.join(SAMPLES_FILE))?;
    let summary_path = session.join(SUMMARY_FILE);
    let baseline = if summary_path.exists() {
        let previous = read_summary(&summary_path)?;
        previous
            .baseline
            .ecg_voltage
            .zip(previous.baseline.temperature)
            .map(|(ecg_voltage, temperature)| BaselineProfile {
                ecg_voltage,
                temperature,
            })
    } else {
        None
    };
    let summary = SessionSummary::from_samples(&samples, baseline)
        .with_context(|| format!("{} holds no samples", session.display()))?;
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}
