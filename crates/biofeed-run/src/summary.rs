use biofeed_lib::signal::{BaselineProfile, Sample, SAMPLE_PERIOD_S};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Upper bound on the points handed to a host for charting.
pub const CHART_POINTS: usize = 120;

/// Descriptive statistics of one channel; `desviacion` is the population standard
/// deviation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ChannelStats {
    #[serde(rename = "promedio")]
    pub mean: f64,
    #[serde(rename = "minimo")]
    pub min: f64,
    #[serde(rename = "maximo")]
    pub max: f64,
    #[serde(rename = "desviacion")]
    pub std: f64,
}

impl ChannelStats {
    pub fn from_values(values: &[f64]) -> Option<Self> {
        if values.is_empty() {
            return None;
        }
        let n = values.len() as f64;
        let mean = values.iter().sum::<f64>() / n;
        let min = values.iter().copied().fold(f64::INFINITY, f64::min);
        let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let std = (values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n).sqrt();
        Some(Self {
            mean,
            min,
            max,
            std,
        })
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct BaselineSnapshot {
    #[serde(rename = "ecg_voltaje")]
    pub ecg_voltage: Option<f64>,
    #[serde(rename = "temperatura_celsius")]
    pub temperature: Option<f64>,
}

impl From<Option<BaselineProfile>> for BaselineSnapshot {
    fn from(profile: Option<BaselineProfile>) -> Self {
        Self {
            ecg_voltage: profile.map(|p| p.ecg_voltage),
            temperature: profile.map(|p| p.temperature),
        }
    }
}

/// Reduction of a finalized session (`resumen_sesion.json`).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SessionSummary {
    #[serde(rename = "duracion_segundos")]
    pub duration_s: f64,
    #[serde(rename = "puntos_datos")]
    pub samples: usize,
    pub ecg: ChannelStats,
    #[serde(rename = "temperatura")]
    pub temperature: ChannelStats,
    pub bpm: ChannelStats,
    pub baseline: BaselineSnapshot,
}

impl SessionSummary {
    /// `None` for an empty sample set.
    pub fn from_samples(samples: &[Sample], baseline: Option<BaselineProfile>) -> Option<Self> {
        let ecg: Vec<f64> = samples.iter().map(|s| s.ecg_voltage).collect();
        let temperature: Vec<f64> = samples.iter().map(|s| s.temperature).collect();
        let bpm: Vec<f64> = samples.iter().map(|s| s.bpm as f64).collect();
        Some(Self {
            duration_s: samples.len() as f64 * SAMPLE_PERIOD_S,
            samples: samples.len(),
            ecg: ChannelStats::from_values(&ecg)?,
            temperature: ChannelStats::from_values(&temperature)?,
            bpm: ChannelStats::from_values(&bpm)?,
            baseline: baseline.into(),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ChartPoint {
    pub timestamp: f64,
    pub ecg_voltage: f64,
    pub temperature: f64,
    pub ecg_change_percent: f64,
    pub temp_change_celsius: f64,
    pub bpm: u32,
}

impl From<&Sample> for ChartPoint {
    fn from(s: &Sample) -> Self {
        Self {
            timestamp: s.timestamp,
            ecg_voltage: s.ecg_voltage,
            temperature: s.temperature,
            ecg_change_percent: s.ecg_change_percent,
            temp_change_celsius: s.temp_change_celsius,
            bpm: s.bpm,
        }
    }
}

/// Evenly decimated view of a session, stepping by `max(1, len / max_points)`.
pub fn chart_points(samples: &[Sample], max_points: usize) -> Vec<ChartPoint> {
    let step = (samples.len() / max_points.max(1)).max(1);
    samples.iter().step_by(step).map(ChartPoint::from).collect()
}

/// What a host gets back when a session is finalized.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionReport {
    pub folder: PathBuf,
    pub summary: SessionSummary,
    pub chart: Vec<ChartPoint>,
}
