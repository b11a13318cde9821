use crate::{
    detectors::beats::BeatDetectorConfig,
    estimator::{EstimatorConfig, HeartRateEstimator},
    signal::{BaselineProfile, Reading, Sample},
};

/// Turns raw readings into enriched samples: BPM from the estimator plus the change
/// fields against the baseline, when one has been calibrated.
#[derive(Debug, Clone, Default)]
pub struct Pipeline {
    estimator: HeartRateEstimator,
    baseline: Option<BaselineProfile>,
}

impl Pipeline {
    pub fn new(estimator: EstimatorConfig, detector: BeatDetectorConfig) -> Self {
        Self {
            estimator: HeartRateEstimator::new(estimator, detector),
            baseline: None,
        }
    }

    pub fn enrich(&mut self, reading: Reading, timestamp: f64) -> Sample {
        let bpm = self.estimator.estimate(reading.ecg_voltage);
        let (ecg_change_percent, temp_change_celsius) = match &self.baseline {
            Some(base) => (
                base.ecg_change_percent(reading.ecg_voltage),
                base.temp_change_celsius(reading.temperature),
            ),
            None => (0.0, 0.0),
        };
        Sample {
            timestamp,
            ecg_raw: reading.ecg_raw,
            ecg_voltage: reading.ecg_voltage,
            temperature: reading.temperature,
            ecg_change_percent,
            temp_change_celsius,
            bpm,
        }
    }

    pub fn baseline(&self) -> Option<BaselineProfile> {
        self.baseline
    }

    pub fn set_baseline(&mut self, profile: BaselineProfile) {
        self.baseline = Some(profile);
    }

    pub fn clear_baseline(&mut self) {
        self.baseline = None;
    }

    pub fn estimator(&self) -> &HeartRateEstimator {
        &self.estimator
    }

    /// Drop the signal history and the baseline, as on a fresh connection.
    pub fn reset(&mut self) {
        self.estimator.reset();
        self.baseline = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reading(v: f64, t: f64) -> Reading {
        Reading {
            ecg_raw: (v * 204.8) as i32,
            ecg_voltage: v,
            temperature: t,
        }
    }

    #[test]
    fn change_fields_are_zero_without_baseline() {
        let mut pipeline = Pipeline::default();
        let sample = pipeline.enrich(reading(1.7, 36.9), 1.0);
        assert_eq!(sample.ecg_change_percent, 0.0);
        assert_eq!(sample.temp_change_celsius, 0.0);
        assert_eq!(sample.bpm, 70);
        assert_eq!(sample.timestamp, 1.0);
    }

    #[test]
    fn change_fields_follow_baseline() {
        let mut pipeline = Pipeline::default();
        pipeline.set_baseline(BaselineProfile {
            ecg_voltage: 1.6,
            temperature: 36.5,
        });
        let sample = pipeline.enrich(reading(1.76, 36.9), 2.0);
        assert!((sample.ecg_change_percent - 10.0).abs() < 1e-9);
        assert!((sample.temp_change_celsius - 0.4).abs() < 1e-9);
    }

    #[test]
    fn reset_forgets_baseline() {
        let mut pipeline = Pipeline::default();
        pipeline.set_baseline(BaselineProfile {
            ecg_voltage: 1.6,
            temperature: 36.5,
        });
        pipeline.enrich(reading(1.6, 36.5), 0.0);
        pipeline.reset();
        assert!(pipeline.baseline().is_none());
        assert_eq!(pipeline.estimator().window_len(), 0);
    }
}
