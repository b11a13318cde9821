//! Session recording: buffers enriched samples between `start` and `stop`, then writes
//! the per-session artifacts and appends the consolidated ledger row.

use crate::artifacts::{
    allocate_session_dir, append_ledger, session_folder_name, write_samples_csv, write_summary,
    LedgerRow, INTAKE_FILE, LEDGER_FILE, SAMPLES_FILE, SUMMARY_FILE,
};
use crate::error::SessionError;
use crate::intake::{read_intake, write_intake, Intake};
use crate::summary::{chart_points, SessionReport, SessionSummary, CHART_POINTS};
use biofeed_lib::signal::{BaselineProfile, Sample};
use chrono::{Local, NaiveDateTime};
use log::{debug, info, warn};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Active,
    Finalized,
}

#[derive(Debug)]
struct ActiveSession {
    folder: PathBuf,
    samples: Vec<Sample>,
}

#[derive(Debug)]
enum Stage {
    Idle,
    Active(ActiveSession),
    Finalized(SessionReport),
}

#[derive(Debug)]
pub struct SessionRecorder {
    root: PathBuf,
    stage: Stage,
}

impl SessionRecorder {
    pub fn new<P: Into<PathBuf>>(root: P) -> Self {
        Self {
            root: root.into(),
            stage: Stage::Idle,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn state(&self) -> SessionState {
        match self.stage {
            Stage::Idle => SessionState::Idle,
            Stage::Active(_) => SessionState::Active,
            Stage::Finalized(_) => SessionState::Finalized,
        }
    }

    pub fn is_active(&self) -> bool {
        matches!(self.stage, Stage::Active(_))
    }

    /// Folder of the session being recorded.
    pub fn folder(&self) -> Option<&Path> {
        match &self.stage {
            Stage::Active(active) => Some(&active.folder),
            _ => None,
        }
    }

    pub fn sample_count(&self) -> usize {
        match &self.stage {
            Stage::Active(active) => active.samples.len(),
            _ => 0,
        }
    }

    /// Report of the most recently finalized session, until the next `start`.
    pub fn last_report(&self) -> Option<&SessionReport> {
        match &self.stage {
            Stage::Finalized(report) => Some(report),
            _ => None,
        }
    }

    pub fn start(&mut self, intake: &Intake) -> Result<PathBuf, SessionError> {
        self.start_at(intake, Local::now().naive_local())
    }

    /// Create the session folder and persist the intake before any sample is accepted.
    pub fn start_at(
        &mut self,
        intake: &Intake,
        started: NaiveDateTime,
    ) -> Result<PathBuf, SessionError> {
        if let Stage::Active(active) = &self.stage {
            return Err(SessionError::AlreadyActive(active.folder.clone()));
        }
        let name = session_folder_name(started, &intake.demographics);
        let folder = allocate_session_dir(&self.root, &name)?;
        if let Err(err) = write_intake(&folder.join(INTAKE_FILE), &intake.record()) {
            let _ = fs::remove_dir_all(&folder);
            return Err(err.into());
        }
        info!(
            "session started in {} (assessment total {})",
            folder.display(),
            intake.assessment.scores().total
        );
        self.stage = Stage::Active(ActiveSession {
            folder: folder.clone(),
            samples: Vec::new(),
        });
        Ok(folder)
    }

    /// Append a sample to the active session; ignored in any other state.
    pub fn record(&mut self, sample: Sample) {
        match &mut self.stage {
            Stage::Active(active) => active.samples.push(sample),
            _ => debug!("no active session, sample dropped"),
        }
    }

    /// Finalize the active session. On failure the session stays active with its
    /// buffer intact, so the host can retry or discard it.
    pub fn stop(
        &mut self,
        baseline: Option<BaselineProfile>,
    ) -> Result<SessionReport, SessionError> {
        let Stage::Active(active) = &self.stage else {
            return Err(SessionError::NotActive);
        };
        let summary = SessionSummary::from_samples(&active.samples, baseline)
            .ok_or_else(|| SessionError::EmptySession(active.folder.clone()))?;

        let report = match self.write_artifacts(active, &summary) {
            Ok(()) => SessionReport {
                folder: active.folder.clone(),
                summary,
                chart: chart_points(&active.samples, CHART_POINTS),
            },
            Err(err) => {
                warn!(
                    "failed to finalize session in {}: {err:#}",
                    active.folder.display()
                );
                return Err(err.into());
            }
        };
        info!(
            "session in {} finalized: {} samples, {:.1} s, mean {:.0} BPM",
            report.folder.display(),
            summary.samples,
            summary.duration_s,
            summary.bpm.mean
        );
        self.stage = Stage::Finalized(report.clone());
        Ok(report)
    }

    /// Drop the active session's buffer without finalizing it. Files already written
    /// at start stay on disk.
    pub fn discard(&mut self) -> Option<PathBuf> {
        match std::mem::replace(&mut self.stage, Stage::Idle) {
            Stage::Active(active) => {
                warn!(
                    "discarding session in {} with {} unsaved samples",
                    active.folder.display(),
                    active.samples.len()
                );
                Some(active.folder)
            }
            other => {
                self.stage = other;
                None
            }
        }
    }

    fn write_artifacts(
        &self,
        active: &ActiveSession,
        summary: &SessionSummary,
    ) -> anyhow::Result<()> {
        write_samples_csv(&active.folder.join(SAMPLES_FILE), &active.samples)?;
        write_summary(&active.folder.join(SUMMARY_FILE), summary)?;
        // The ledger row is built from the intake as persisted, not as held in memory.
        let intake = read_intake(&active.folder.join(INTAKE_FILE))?;
        let row = LedgerRow::new(
            Local::now().naive_local(),
            &active.folder,
            &intake,
            summary,
        );
        append_ledger(&self.root.join(LEDGER_FILE), &row)?;
        Ok(())
    }
}
