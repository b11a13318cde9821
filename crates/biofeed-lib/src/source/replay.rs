use super::SampleSource;
use crate::signal::{Reading, Sample};
use anyhow::{Context, Result};
use csv::{ReaderBuilder, Trim};
use std::collections::VecDeque;
use std::path::Path;

/// Load a per-session sample table (`datos_sensores.csv`).
pub fn read_samples_csv(path: &Path) -> Result<Vec<Sample>> {
    let mut reader = ReaderBuilder::new()
        .trim(Trim::All)
        .has_headers(true)
        .from_path(path)
        .with_context(|| format!("opening samples {}", path.display()))?;
    let mut samples = Vec::new();
    for (idx, row) in reader.deserialize::<Sample>().enumerate() {
        let sample = row.with_context(|| format!("parsing sample row {}", idx + 1))?;
        samples.push(sample);
    }
    Ok(samples)
}

/// Feeds a recorded session back through the pipeline, one row per tick.
#[derive(Debug, Clone)]
pub struct ReplaySource {
    name: String,
    pending: VecDeque<Reading>,
}

impl ReplaySource {
    pub fn open(path: &Path) -> Result<Self> {
        let samples = read_samples_csv(path)?;
        Ok(Self::from_samples(path.display().to_string(), &samples))
    }

    pub fn from_samples(name: impl Into<String>, samples: &[Sample]) -> Self {
        let pending = samples
            .iter()
            .map(|s| Reading {
                ecg_raw: s.ecg_raw,
                ecg_voltage: s.ecg_voltage,
                temperature: s.temperature,
            })
            .collect();
        Self {
            name: name.into(),
            pending,
        }
    }

    pub fn remaining(&self) -> usize {
        self.pending.len()
    }
}

impl SampleSource for ReplaySource {
    fn name(&self) -> &str {
        &self.name
    }

    fn next_reading(&mut self) -> Option<Reading> {
        self.pending.pop_front()
    }
}
