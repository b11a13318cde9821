use crate::{
    pipeline::Pipeline,
    signal::{unix_now, BaselineProfile, Sample},
    source::SampleSource,
};
use log::info;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CalibrationError {
    #[error("baseline calibration collected no samples")]
    NoSamples,
}

/// Outcome of a calibration run. Only the voltage and temperature means become
/// baseline state; the BPM mean is informational.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BaselineReport {
    pub ecg_voltage: f64,
    pub temperature: f64,
    pub bpm: f64,
    pub samples: usize,
}

impl BaselineReport {
    pub fn profile(&self) -> BaselineProfile {
        BaselineProfile {
            ecg_voltage: self.ecg_voltage,
            temperature: self.temperature,
        }
    }
}

/// Running sums over the samples seen during calibration.
#[derive(Debug, Clone, Default)]
pub struct Calibration {
    ecg_sum: f64,
    temp_sum: f64,
    bpm_sum: f64,
    count: usize,
}

impl Calibration {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, sample: &Sample) {
        self.ecg_sum += sample.ecg_voltage;
        self.temp_sum += sample.temperature;
        self.bpm_sum += sample.bpm as f64;
        self.count += 1;
    }

    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    pub fn finish(&self) -> Result<BaselineReport, CalibrationError> {
        if self.count == 0 {
            return Err(CalibrationError::NoSamples);
        }
        let n = self.count as f64;
        Ok(BaselineReport {
            ecg_voltage: self.ecg_sum / n,
            temperature: self.temp_sum / n,
            bpm: self.bpm_sum / n,
            samples: self.count,
        })
    }
}

/// Sample `source` once per `tick` for `duration` of wall-clock time, then install the
/// resulting baseline on `pipeline`.
///
/// Blocks the calling thread for the whole duration. Ticks without data are skipped;
/// every collected reading also goes through the estimator.
pub fn calibrate<S: SampleSource + ?Sized>(
    pipeline: &mut Pipeline,
    source: &mut S,
    duration: Duration,
    tick: Duration,
) -> Result<BaselineReport, CalibrationError> {
    info!(
        "calibrating baseline from {} for {:.1} s",
        source.name(),
        duration.as_secs_f64()
    );
    let mut calibration = Calibration::new();
    let start = Instant::now();
    while start.elapsed() < duration {
        if let Some(reading) = source.next_reading() {
            let sample = pipeline.enrich(reading, unix_now());
            calibration.push(&sample);
        }
        std::thread::sleep(tick);
    }
    let report = calibration.finish()?;
    pipeline.set_baseline(report.profile());
    info!(
        "baseline ECG {:.4} V, temperature {:.2} °C, {:.0} BPM over {} samples",
        report.ecg_voltage, report.temperature, report.bpm, report.samples
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signal::Reading;

    struct Constant {
        reading: Reading,
        gaps_every: usize,
        ticks: usize,
    }

    impl SampleSource for Constant {
        fn name(&self) -> &str {
            "constant"
        }

        fn next_reading(&mut self) -> Option<Reading> {
            self.ticks += 1;
            if self.gaps_every > 0 && self.ticks % self.gaps_every == 0 {
                None
            } else {
                Some(self.reading)
            }
        }
    }

    fn sample(v: f64, t: f64, bpm: u32) -> Sample {
        Sample {
            timestamp: 0.0,
            ecg_raw: 0,
            ecg_voltage: v,
            temperature: t,
            ecg_change_percent: 0.0,
            temp_change_celsius: 0.0,
            bpm,
        }
    }

    #[test]
    fn averages_collected_samples() {
        let mut calibration = Calibration::new();
        calibration.push(&sample(1.5, 36.0, 60));
        calibration.push(&sample(1.7, 37.0, 80));
        let report = calibration.finish().unwrap();
        assert!((report.ecg_voltage - 1.6).abs() < 1e-12);
        assert!((report.temperature - 36.5).abs() < 1e-12);
        assert!((report.bpm - 70.0).abs() < 1e-12);
        assert_eq!(report.samples, 2);
    }

    #[test]
    fn empty_calibration_is_an_error() {
        assert_eq!(
            Calibration::new().finish().unwrap_err(),
            CalibrationError::NoSamples
        );
    }

    #[test]
    fn calibrate_installs_baseline() {
        let mut pipeline = Pipeline::default();
        let mut source = Constant {
            reading: Reading {
                ecg_raw: 327,
                ecg_voltage: 1.6,
                temperature: 36.4,
            },
            gaps_every: 3,
            ticks: 0,
        };
        let report = calibrate(
            &mut pipeline,
            &mut source,
            Duration::from_millis(60),
            Duration::from_millis(2),
        )
        .unwrap();
        assert!(report.samples > 0);
        assert!((report.ecg_voltage - 1.6).abs() < 1e-9);
        assert_eq!(report.bpm, 70.0);
        assert_eq!(pipeline.baseline(), Some(report.profile()));
    }

    #[test]
    fn zero_duration_collects_nothing() {
        let mut pipeline = Pipeline::default();
        let mut source = Constant {
            reading: Reading {
                ecg_raw: 327,
                ecg_voltage: 1.6,
                temperature: 36.4,
            },
            gaps_every: 0,
            ticks: 0,
        };
        let err = calibrate(&mut pipeline, &mut source, Duration::ZERO, Duration::ZERO);
        assert_eq!(err.unwrap_err(), CalibrationError::NoSamples);
        assert!(pipeline.baseline().is_none());
    }
}
