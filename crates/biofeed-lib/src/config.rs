//! Monitor configuration, read from a TOML file. Every field has a default so an
//! empty file (or no file at all) describes the stock demo setup.

use crate::{
    detectors::beats::BeatDetectorConfig,
    estimator::EstimatorConfig,
    pipeline::Pipeline,
    source::{DemoSource, LineSource, ReplaySource, SampleSource},
};
use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    /// Root folder for per-session folders and the consolidated ledger.
    pub sessions_dir: PathBuf,
    /// Default baseline calibration length (seconds).
    pub baseline_seconds: f64,
    pub source: SourceConfig,
    pub estimator: EstimatorConfig,
    pub detector: BeatDetectorConfig,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            sessions_dir: PathBuf::from("sessions"),
            baseline_seconds: 10.0,
            source: SourceConfig::default(),
            estimator: EstimatorConfig::default(),
            detector: BeatDetectorConfig::default(),
        }
    }
}

impl MonitorConfig {
    pub fn validate(&self) -> Result<()> {
        let est = &self.estimator;
        if est.window_capacity == 0 || est.history_capacity == 0 {
            bail!("estimator window and history capacities must be positive");
        }
        if est.min_samples > est.window_capacity {
            bail!(
                "estimator min_samples ({}) exceeds window_capacity ({})",
                est.min_samples,
                est.window_capacity
            );
        }
        if est.min_peaks < 2 {
            bail!("estimator min_peaks must be at least 2 to form an interval");
        }
        if !(est.min_bpm > 0.0 && est.min_bpm <= est.max_bpm) {
            bail!(
                "estimator BPM range [{}, {}] is empty",
                est.min_bpm,
                est.max_bpm
            );
        }
        if self.detector.min_std <= 0.0 {
            bail!("detector min_std must be positive");
        }
        if !(self.baseline_seconds >= 0.0 && self.baseline_seconds.is_finite()) {
            bail!("baseline_seconds must be a non-negative number");
        }
        Ok(())
    }

    pub fn pipeline(&self) -> Pipeline {
        Pipeline::new(self.estimator, self.detector)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    #[default]
    Demo,
    Serial,
    Replay,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct SourceConfig {
    pub kind: SourceKind,
    /// Device node (serial) or recorded `datos_sensores.csv` (replay).
    pub path: Option<PathBuf>,
    /// Seed for the demo generator; entropy when absent.
    pub seed: Option<u64>,
}

impl SourceConfig {
    pub fn open(&self) -> Result<Box<dyn SampleSource + Send>> {
        match self.kind {
            SourceKind::Demo => Ok(match self.seed {
                Some(seed) => Box::new(DemoSource::with_seed(seed)),
                None => Box::new(DemoSource::new()),
            }),
            SourceKind::Serial => {
                let path = self.path.as_deref().context("serial source needs a path")?;
                Ok(Box::new(LineSource::open(path)?))
            }
            SourceKind::Replay => {
                let path = self.path.as_deref().context("replay source needs a path")?;
                Ok(Box::new(ReplaySource::open(path)?))
            }
        }
    }
}

pub fn read_config(path: &Path) -> Result<MonitorConfig> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("failed to read config {}", path.display()))?;
    let config: MonitorConfig =
        toml::from_str(&contents).with_context(|| format!("parsing config {}", path.display()))?;
    config
        .validate()
        .with_context(|| format!("invalid config {}", path.display()))?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("biofeed.toml");
        fs::write(&path, "").unwrap();
        let config = read_config(&path).unwrap();
        assert_eq!(config.sessions_dir, PathBuf::from("sessions"));
        assert_eq!(config.estimator, EstimatorConfig::default());
        assert_eq!(config.source.kind, SourceKind::Demo);
    }

    #[test]
    fn partial_tables_keep_other_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("biofeed.toml");
        fs::write(
            &path,
            "sessions_dir = \"out\"\nbaseline_seconds = 5\n\n[source]\nkind = \"serial\"\npath = \"/dev/ttyACM0\"\n\n[estimator]\nmin_samples = 40\n\n[detector]\nmin_prominence = 0.4\n",
        )
        .unwrap();
        let config = read_config(&path).unwrap();
        assert_eq!(config.sessions_dir, PathBuf::from("out"));
        assert_eq!(config.baseline_seconds, 5.0);
        assert_eq!(config.source.kind, SourceKind::Serial);
        assert_eq!(config.estimator.min_samples, 40);
        assert_eq!(config.estimator.window_capacity, 100);
        assert_eq!(config.detector.min_prominence, 0.4);
        assert_eq!(config.detector.min_distance, 6);
    }

    #[test]
    fn rejects_inconsistent_estimator() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("biofeed.toml");
        fs::write(&path, "[estimator]\nmin_samples = 150\n").unwrap();
        assert!(read_config(&path).is_err());
        fs::write(&path, "[estimator]\nmin_bpm = 200.0\n").unwrap();
        assert!(read_config(&path).is_err());
    }

    #[test]
    fn serial_source_requires_path() {
        let cfg = SourceConfig {
            kind: SourceKind::Serial,
            path: None,
            seed: None,
        };
        assert!(cfg.open().is_err());
        let demo = SourceConfig {
            seed: Some(1),
            ..SourceConfig::default()
        };
        assert_eq!(demo.open().unwrap().name(), "demo");
    }
}
