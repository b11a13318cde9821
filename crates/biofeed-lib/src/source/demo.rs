use super::SampleSource;
use crate::signal::Reading;
use rand::{rngs::StdRng, Rng, SeedableRng};

/// ADC codes per volt of the acquisition board (10-bit over 5 V).
pub const ADC_CODES_PER_VOLT: f64 = 204.8;

const BASE_ECG_V: f64 = 1.6;
const BASE_TEMP_C: f64 = 36.5;
const MAX_STRESS: f64 = 0.08;

/// Synthetic ECG/temperature generator used when no board is attached.
///
/// Each 10-sample cycle carries an R spike over positions 2-3 and an S dip at 4; a
/// stress factor ramps up over the first ticks and lifts both channels slightly.
#[derive(Debug, Clone)]
pub struct DemoSource {
    rng: StdRng,
    tick: u64,
}

impl DemoSource {
    pub fn new() -> Self {
        Self {
            rng: StdRng::from_entropy(),
            tick: 0,
        }
    }

    pub fn with_seed(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            tick: 0,
        }
    }

    fn stress_factor(&self) -> f64 {
        (self.tick as f64 / 100.0).min(MAX_STRESS)
    }
}

impl Default for DemoSource {
    fn default() -> Self {
        Self::new()
    }
}

impl SampleSource for DemoSource {
    fn name(&self) -> &str {
        "demo"
    }

    fn next_reading(&mut self) -> Option<Reading> {
        let stress = self.stress_factor();
        let spike = match self.tick % 10 {
            2 | 3 => self.rng.gen_range(0.3..0.5),
            4 => self.rng.gen_range(-0.1..0.0),
            _ => self.rng.gen_range(-0.05..0.05),
        };
        let ecg_raw = ((BASE_ECG_V + spike + stress * 0.2) * ADC_CODES_PER_VOLT) as i32;
        let ecg_voltage = ecg_raw as f64 / ADC_CODES_PER_VOLT;
        let temperature = BASE_TEMP_C + self.rng.gen_range(-0.1..0.3) + stress * 2.0;
        self.tick += 1;
        Some(Reading {
            ecg_raw,
            ecg_voltage,
            temperature,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::estimator::HeartRateEstimator;

    #[test]
    fn seeded_sources_are_reproducible() {
        let mut a = DemoSource::with_seed(3);
        let mut b = DemoSource::with_seed(3);
        for _ in 0..50 {
            assert_eq!(a.next_reading(), b.next_reading());
        }
    }

    #[test]
    fn readings_stay_in_physiological_ranges() {
        let mut source = DemoSource::with_seed(11);
        for _ in 0..500 {
            let reading = source.next_reading().expect("demo always yields");
            assert!((1.3..2.2).contains(&reading.ecg_voltage));
            assert!((36.3..37.0).contains(&reading.temperature));
            assert_eq!(
                reading.ecg_raw,
                (reading.ecg_voltage * ADC_CODES_PER_VOLT).round() as i32
            );
        }
    }

    #[test]
    fn demo_rhythm_stays_plausible() {
        let mut source = DemoSource::with_seed(5);
        let mut est = HeartRateEstimator::default();
        let mut bpm = 0;
        for _ in 0..300 {
            let reading = source.next_reading().expect("demo always yields");
            bpm = est.estimate(reading.ecg_voltage);
        }
        assert!((40..=180).contains(&bpm), "got {bpm}");
    }
}
