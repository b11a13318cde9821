//! Host-facing control surface.
//!
//! A single worker thread owns the sample source, the enrichment pipeline, any
//! in-flight baseline calibration and the session recorder. Control requests and
//! acquisition ticks are multiplexed on that thread, so samples are enriched and
//! recorded in strict tick order and never interleave with a session start or stop.

use crate::error::SessionError;
use crate::intake::{AnxietyLevel, Intake};
use crate::recorder::SessionRecorder;
use crate::summary::SessionReport;
use biofeed_lib::{
    baseline::{BaselineReport, Calibration},
    config::MonitorConfig,
    pipeline::Pipeline,
    signal::{unix_now, BaselineProfile, Sample},
    source::SampleSource,
};
use crossbeam_channel::{bounded, select, tick, unbounded, Receiver, Sender};
use log::{debug, info, warn};
use serde::Serialize;
use std::path::PathBuf;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};
use thiserror::Error;

pub type BoxedSource = Box<dyn SampleSource + Send>;

/// Opens a fresh source on every `initialize`.
pub type SourceFactory = Box<dyn FnMut() -> anyhow::Result<BoxedSource> + Send>;

/// Streaming callback, invoked on the worker thread once per enriched sample.
pub type SampleCallback = Box<dyn FnMut(&Sample) + Send>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Idle,
    Connected,
    Baseline,
    Recording,
    Analysis,
}

#[derive(Debug, Error)]
pub enum ControlError {
    #[error("no sensor connected, initialize first")]
    NotConnected,
    #[error("baseline calibration is already running")]
    CalibrationInProgress,
    #[error("cannot re-initialize while a session is recording")]
    SessionActive,
    #[error("failed to open sample source: {0:#}")]
    Source(anyhow::Error),
    #[error(transparent)]
    Session(#[from] SessionError),
    #[error("monitor worker is no longer running")]
    WorkerGone,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum MonitorEvent {
    Initialized { source: String },
    Phase { phase: Phase },
    BaselineComplete(BaselineReport),
    BaselineFailed { reason: String },
    SessionStarted {
        folder: PathBuf,
        assessment_total: u32,
        anxiety_level: AnxietyLevel,
    },
    SessionStopped(SessionReport),
}

#[derive(Debug, Clone, Serialize)]
pub struct MonitorStatus {
    pub phase: Phase,
    pub source: Option<String>,
    pub baseline: Option<BaselineProfile>,
    pub calibrating: bool,
    pub session: Option<PathBuf>,
    pub recorded: usize,
    pub bpm: u32,
}

#[derive(Debug, Clone)]
pub struct ControllerSettings {
    pub config: MonitorConfig,
    /// Acquisition period of the worker.
    pub tick: Duration,
}

impl Default for ControllerSettings {
    fn default() -> Self {
        Self {
            config: MonitorConfig::default(),
            tick: Duration::from_millis(100),
        }
    }
}

type Reply<T> = Sender<Result<T, ControlError>>;

enum Command {
    Initialize(Reply<String>),
    BeginBaseline(Duration, Reply<()>),
    BeginSession(Box<Intake>, Reply<PathBuf>),
    EndSession(Reply<SessionReport>),
    Reset(Reply<()>),
    Status(Sender<MonitorStatus>),
    Shutdown,
}

pub struct Controller {
    command_tx: Sender<Command>,
    event_rx: Receiver<MonitorEvent>,
    worker: Option<JoinHandle<()>>,
}

impl Controller {
    pub fn spawn(
        settings: ControllerSettings,
        factory: SourceFactory,
        on_sample: SampleCallback,
    ) -> Self {
        let (command_tx, command_rx) = bounded(32);
        let (event_tx, event_rx) = unbounded();
        let worker = std::thread::spawn(move || {
            MonitorWorker::new(settings, factory, on_sample, command_rx, event_tx).run()
        });
        Self {
            command_tx,
            event_rx,
            worker: Some(worker),
        }
    }

    /// Controller whose sources come from `config.source`.
    pub fn from_config(settings: ControllerSettings, on_sample: SampleCallback) -> Self {
        let source = settings.config.source.clone();
        Self::spawn(settings, Box::new(move || source.open()), on_sample)
    }

    pub fn events(&self) -> &Receiver<MonitorEvent> {
        &self.event_rx
    }

    /// Connect (or reconnect) the sample source. Returns the source name. Refused while
    /// a session is recording or a calibration is running.
    pub fn initialize(&self) -> Result<String, ControlError> {
        self.request(Command::Initialize)
    }

    /// Start a baseline calibration; completion arrives as a
    /// [`MonitorEvent::BaselineComplete`] or [`MonitorEvent::BaselineFailed`].
    pub fn begin_baseline(&self, duration: Duration) -> Result<(), ControlError> {
        self.request(|reply| Command::BeginBaseline(duration, reply))
    }

    pub fn begin_session(&self, intake: Intake) -> Result<PathBuf, ControlError> {
        self.request(|reply| Command::BeginSession(Box::new(intake), reply))
    }

    pub fn end_session(&self) -> Result<SessionReport, ControlError> {
        self.request(Command::EndSession)
    }

    /// Disconnect, drop the baseline and discard any unsaved session. A calibration
    /// still running is reported as [`MonitorEvent::BaselineFailed`].
    pub fn reset(&self) -> Result<(), ControlError> {
        self.request(Command::Reset)
    }

    pub fn status(&self) -> Result<MonitorStatus, ControlError> {
        let (reply_tx, reply_rx) = bounded(1);
        self.command_tx
            .send(Command::Status(reply_tx))
            .map_err(|_| ControlError::WorkerGone)?;
        reply_rx.recv().map_err(|_| ControlError::WorkerGone)
    }

    fn request<T>(
        &self,
        command: impl FnOnce(Reply<T>) -> Command,
    ) -> Result<T, ControlError> {
        let (reply_tx, reply_rx) = bounded(1);
        self.command_tx
            .send(command(reply_tx))
            .map_err(|_| ControlError::WorkerGone)?;
        reply_rx.recv().map_err(|_| ControlError::WorkerGone)?
    }
}

impl Drop for Controller {
    fn drop(&mut self) {
        let _ = self.command_tx.send(Command::Shutdown);
        if let Some(handle) = self.worker.take() {
            let _ = handle.join();
        }
    }
}

struct PendingBaseline {
    calibration: Calibration,
    deadline: Instant,
}

struct MonitorWorker {
    settings: ControllerSettings,
    factory: SourceFactory,
    on_sample: SampleCallback,
    command_rx: Receiver<Command>,
    event_tx: Sender<MonitorEvent>,
    source: Option<BoxedSource>,
    pipeline: Pipeline,
    baseline: Option<PendingBaseline>,
    recorder: SessionRecorder,
    phase: Phase,
}

impl MonitorWorker {
    fn new(
        settings: ControllerSettings,
        factory: SourceFactory,
        on_sample: SampleCallback,
        command_rx: Receiver<Command>,
        event_tx: Sender<MonitorEvent>,
    ) -> Self {
        let pipeline = settings.config.pipeline();
        let recorder = SessionRecorder::new(settings.config.sessions_dir.clone());
        Self {
            settings,
            factory,
            on_sample,
            command_rx,
            event_tx,
            source: None,
            pipeline,
            baseline: None,
            recorder,
            phase: Phase::Idle,
        }
    }

    fn run(mut self) {
        let ticker = tick(self.settings.tick);
        let commands = self.command_rx.clone();
        loop {
            select! {
                recv(commands) -> command => match command {
                    Ok(Command::Shutdown) | Err(_) => break,
                    Ok(command) => self.handle(command),
                },
                recv(ticker) -> _ => self.on_tick(),
            }
        }
        self.recorder.discard();
    }

    fn handle(&mut self, command: Command) {
        match command {
            Command::Initialize(reply) => {
                let _ = reply.send(self.initialize());
            }
            Command::BeginBaseline(duration, reply) => {
                let _ = reply.send(self.begin_baseline(duration));
            }
            Command::BeginSession(intake, reply) => {
                let _ = reply.send(self.begin_session(&intake));
            }
            Command::EndSession(reply) => {
                let _ = reply.send(self.end_session());
            }
            Command::Reset(reply) => {
                self.reset();
                let _ = reply.send(Ok(()));
            }
            Command::Status(reply) => {
                let _ = reply.send(self.status());
            }
            Command::Shutdown => {}
        }
    }

    fn initialize(&mut self) -> Result<String, ControlError> {
        if self.recorder.is_active() {
            return Err(ControlError::SessionActive);
        }
        if self.baseline.is_some() {
            return Err(ControlError::CalibrationInProgress);
        }
        let source = (self.factory)().map_err(ControlError::Source)?;
        let name = source.name().to_string();
        info!("connected to {name}");
        self.source = Some(source);
        self.pipeline = self.settings.config.pipeline();
        self.emit(MonitorEvent::Initialized {
            source: name.clone(),
        });
        self.set_phase(Phase::Connected);
        Ok(name)
    }

    fn begin_baseline(&mut self, duration: Duration) -> Result<(), ControlError> {
        if self.source.is_none() {
            return Err(ControlError::NotConnected);
        }
        if self.baseline.is_some() {
            return Err(ControlError::CalibrationInProgress);
        }
        info!("calibrating baseline for {:.1} s", duration.as_secs_f64());
        self.baseline = Some(PendingBaseline {
            calibration: Calibration::new(),
            deadline: Instant::now() + duration,
        });
        if !self.recorder.is_active() {
            self.set_phase(Phase::Baseline);
        }
        Ok(())
    }

    fn begin_session(&mut self, intake: &Intake) -> Result<PathBuf, ControlError> {
        if self.source.is_none() {
            return Err(ControlError::NotConnected);
        }
        let folder = self.recorder.start(intake)?;
        self.emit(MonitorEvent::SessionStarted {
            folder: folder.clone(),
            assessment_total: intake.assessment.scores().total,
            anxiety_level: intake.assessment.level(),
        });
        self.set_phase(Phase::Recording);
        Ok(folder)
    }

    fn end_session(&mut self) -> Result<SessionReport, ControlError> {
        let report = self.recorder.stop(self.pipeline.baseline())?;
        self.emit(MonitorEvent::SessionStopped(report.clone()));
        self.set_phase(Phase::Analysis);
        Ok(report)
    }

    fn reset(&mut self) {
        self.recorder.discard();
        self.source = None;
        if let Some(pending) = self.baseline.take() {
            warn!(
                "baseline calibration abandoned by reset after {} samples",
                pending.calibration.len()
            );
            self.emit(MonitorEvent::BaselineFailed {
                reason: "calibration interrupted by reset".into(),
            });
        }
        self.pipeline.reset();
        info!("monitor reset");
        self.set_phase(Phase::Idle);
    }

    fn status(&self) -> MonitorStatus {
        MonitorStatus {
            phase: self.phase,
            source: self.source.as_ref().map(|s| s.name().to_string()),
            baseline: self.pipeline.baseline(),
            calibrating: self.baseline.is_some(),
            session: self.recorder.folder().map(|p| p.to_path_buf()),
            recorded: self.recorder.sample_count(),
            bpm: self.pipeline.estimator().last_bpm(),
        }
    }

    fn on_tick(&mut self) {
        self.finish_baseline_if_due();
        let Some(source) = self.source.as_mut() else {
            return;
        };
        let Some(reading) = source.next_reading() else {
            debug!("no reading this tick");
            return;
        };
        let sample = self.pipeline.enrich(reading, unix_now());
        if let Some(pending) = self.baseline.as_mut() {
            pending.calibration.push(&sample);
        }
        self.recorder.record(sample);
        (self.on_sample)(&sample);
    }

    fn finish_baseline_if_due(&mut self) {
        let due = matches!(&self.baseline, Some(p) if Instant::now() >= p.deadline);
        if !due {
            return;
        }
        let Some(pending) = self.baseline.take() else {
            return;
        };
        match pending.calibration.finish() {
            Ok(report) => {
                self.pipeline.set_baseline(report.profile());
                info!(
                    "baseline ECG {:.4} V, temperature {:.2} °C, {:.0} BPM over {} samples",
                    report.ecg_voltage, report.temperature, report.bpm, report.samples
                );
                self.emit(MonitorEvent::BaselineComplete(report));
            }
            Err(err) => {
                warn!("baseline calibration failed: {err}");
                self.emit(MonitorEvent::BaselineFailed {
                    reason: err.to_string(),
                });
            }
        }
        if self.phase == Phase::Baseline {
            self.set_phase(Phase::Connected);
        }
    }

    fn set_phase(&mut self, phase: Phase) {
        if self.phase != phase {
            self.phase = phase;
            self.emit(MonitorEvent::Phase { phase });
        }
    }

    fn emit(&self, event: MonitorEvent) {
        if self.event_tx.send(event).is_err() {
            warn!("monitor event dropped, no listener");
        }
    }
}
