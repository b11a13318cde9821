use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

/// Acquisition rate shared by hardware and synthetic sources (Hz).
pub const SAMPLE_RATE_HZ: f64 = 10.0;

/// Seconds between two consecutive samples. Beat spacing and session duration are
/// both derived from it, so it has to match the acquisition rate.
pub const SAMPLE_PERIOD_S: f64 = 1.0 / SAMPLE_RATE_HZ;

/// One raw tuple as delivered by a sample source.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Reading {
    /// ADC code as reported by the board
    pub ecg_raw: i32,
    /// ECG channel in volts
    pub ecg_voltage: f64,
    /// Skin temperature in °C
    pub temperature: f64,
}

/// Enriched sample produced once per tick.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    /// Unix time in seconds
    pub timestamp: f64,
    pub ecg_raw: i32,
    pub ecg_voltage: f64,
    pub temperature: f64,
    /// Relative ECG change against the baseline voltage, 0 without a baseline
    pub ecg_change_percent: f64,
    /// Absolute temperature change against the baseline, 0 without a baseline
    pub temp_change_celsius: f64,
    pub bpm: u32,
}

/// Resting reference values captured once per connection.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BaselineProfile {
    pub ecg_voltage: f64,
    pub temperature: f64,
}

impl BaselineProfile {
    /// Percent change of `voltage` relative to the baseline voltage.
    pub fn ecg_change_percent(&self, voltage: f64) -> f64 {
        if self.ecg_voltage == 0.0 || !self.ecg_voltage.is_finite() {
            return 0.0;
        }
        let change = (voltage - self.ecg_voltage) / self.ecg_voltage * 100.0;
        if change.is_finite() {
            change
        } else {
            0.0
        }
    }

    pub fn temp_change_celsius(&self, temperature: f64) -> f64 {
        let change = temperature - self.temperature;
        if change.is_finite() {
            change
        } else {
            0.0
        }
    }
}

/// Point events on a timeline (e.g., R-peaks indices)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Events {
    pub indices: Vec<usize>,
}

impl Events {
    pub fn from_indices(indices: Vec<usize>) -> Self {
        Self { indices }
    }

    pub fn len(&self) -> usize {
        self.indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }
}

/// RR intervals (seconds)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RRSeries {
    pub rr: Vec<f64>,
}

impl RRSeries {
    pub fn from_events(events: &Events, fs: f64) -> Self {
        let mut rr = Vec::new();
        for w in events.indices.windows(2) {
            let dt = (w[1] as f64 - w[0] as f64) / fs;
            rr.push(dt);
        }
        Self { rr }
    }

    /// Mean of the strictly positive intervals, `None` when there are none.
    pub fn mean_positive(&self) -> Option<f64> {
        let valid: Vec<f64> = self.rr.iter().copied().filter(|dt| *dt > 0.0).collect();
        if valid.is_empty() {
            return None;
        }
        Some(valid.iter().sum::<f64>() / valid.len() as f64)
    }
}

/// Current wall clock as unix seconds.
pub fn unix_now() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|dur| dur.as_secs_f64())
        .unwrap_or(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rr_intervals_use_sample_period() {
        let events = Events::from_indices(vec![3, 11, 19]);
        let rr = RRSeries::from_events(&events, SAMPLE_RATE_HZ);
        assert_eq!(rr.rr.len(), 2);
        assert!((rr.rr[0] - 0.8).abs() < 1e-9);
        assert!((rr.mean_positive().unwrap() - 0.8).abs() < 1e-9);
    }

    #[test]
    fn mean_positive_ignores_non_positive_gaps() {
        let rr = RRSeries {
            rr: vec![0.0, -0.2, 0.6],
        };
        assert!((rr.mean_positive().unwrap() - 0.6).abs() < 1e-9);
        assert!(RRSeries { rr: vec![0.0] }.mean_positive().is_none());
    }

    #[test]
    fn baseline_changes_never_produce_nan() {
        let zero = BaselineProfile {
            ecg_voltage: 0.0,
            temperature: 36.5,
        };
        assert_eq!(zero.ecg_change_percent(1.7), 0.0);
        let base = BaselineProfile {
            ecg_voltage: 1.6,
            temperature: 36.5,
        };
        assert!((base.ecg_change_percent(1.76) - 10.0).abs() < 1e-9);
        assert!((base.temp_change_celsius(36.8) - 0.3).abs() < 1e-9);
    }
}
