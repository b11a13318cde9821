use crate::{
    detectors::beats::{detect_beats, BeatDetectorConfig},
    signal::{RRSeries, SAMPLE_RATE_HZ},
    window::RollingWindow,
};
use log::debug;
use serde::{Deserialize, Serialize};

/// Tuning surface of the streaming heart-rate estimator.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EstimatorConfig {
    /// Voltage window length (samples); 100 samples is 10 s at 10 Hz.
    pub window_capacity: usize,
    /// Samples required before beat detection runs.
    pub min_samples: usize,
    /// Peaks required for an estimate (two intervals at least).
    pub min_peaks: usize,
    /// Number of accepted readings averaged into the reported BPM.
    pub history_capacity: usize,
    /// BPM reported until the first reading is accepted.
    pub initial_bpm: u32,
    /// Lowest plausible instantaneous BPM.
    pub min_bpm: f64,
    /// Highest plausible instantaneous BPM.
    pub max_bpm: f64,
}

impl Default for EstimatorConfig {
    fn default() -> Self {
        Self {
            window_capacity: 100,
            min_samples: 50,
            min_peaks: 3,
            history_capacity: 5,
            initial_bpm: 70,
            min_bpm: 40.0,
            max_bpm: 180.0,
        }
    }
}

/// Streaming BPM estimator fed one ECG voltage per tick.
///
/// The estimator never fails: cold start, flat signal, too few beats, implausible
/// rates and non-finite input all report the last accepted value instead. Readings
/// outside the plausible range are dropped, not clamped, so a sustained rate outside
/// it keeps reporting the last good value.
#[derive(Debug, Clone)]
pub struct HeartRateEstimator {
    cfg: EstimatorConfig,
    detector: BeatDetectorConfig,
    window: RollingWindow,
    history: RollingWindow,
    last_bpm: u32,
}

impl Default for HeartRateEstimator {
    fn default() -> Self {
        Self::new(EstimatorConfig::default(), BeatDetectorConfig::default())
    }
}

impl HeartRateEstimator {
    pub fn new(cfg: EstimatorConfig, detector: BeatDetectorConfig) -> Self {
        Self {
            window: RollingWindow::new(cfg.window_capacity),
            history: RollingWindow::new(cfg.history_capacity),
            last_bpm: cfg.initial_bpm,
            cfg,
            detector,
        }
    }

    pub fn last_bpm(&self) -> u32 {
        self.last_bpm
    }

    pub fn window_len(&self) -> usize {
        self.window.len()
    }

    /// Push one voltage and return the current smoothed BPM.
    pub fn estimate(&mut self, voltage: f64) -> u32 {
        if !voltage.is_finite() {
            debug!("ignoring non-finite ECG voltage {voltage}");
            return self.last_bpm;
        }
        self.window.push(voltage);
        if self.window.len() < self.cfg.min_samples {
            return self.last_bpm;
        }
        match self.candidate_bpm() {
            Some(candidate) => self.accept(candidate),
            None => self.last_bpm,
        }
    }

    /// Forget the signal history and start over from the seeded BPM.
    pub fn reset(&mut self) {
        self.window.clear();
        self.history.clear();
        self.last_bpm = self.cfg.initial_bpm;
    }

    fn candidate_bpm(&self) -> Option<f64> {
        let events = detect_beats(&self.window.to_vec(), &self.detector);
        if events.len() < self.cfg.min_peaks {
            return None;
        }
        let rr = RRSeries::from_events(&events, SAMPLE_RATE_HZ);
        let mean_interval = rr.mean_positive()?;
        if mean_interval < 0.001 {
            return None;
        }
        let bpm = 60.0 / mean_interval;
        bpm.is_finite().then_some(bpm)
    }

    fn accept(&mut self, candidate: f64) -> u32 {
        if candidate < self.cfg.min_bpm || candidate > self.cfg.max_bpm {
            debug!("dropping implausible BPM candidate {candidate:.1}");
            return self.last_bpm;
        }
        self.history.push(candidate);
        if let Some(mean) = self.history.mean() {
            let rounded = mean.round();
            if rounded.is_finite() && rounded >= 0.0 {
                self.last_bpm = rounded as u32;
            }
        }
        self.last_bpm
    }
}
