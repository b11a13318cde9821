use crate::signal::Events;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Peak acceptance criteria for the z-scored beat window.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BeatDetectorConfig {
    /// Minimum peak height in normalized units.
    pub min_height: f64,
    /// Minimum horizontal separation between peaks (samples).
    pub min_distance: usize,
    /// Minimum rise above the surrounding valleys (normalized units).
    pub min_prominence: f64,
    /// Windows with a standard deviation below this are treated as flat.
    pub min_std: f64,
}

impl Default for BeatDetectorConfig {
    fn default() -> Self {
        Self {
            min_height: 0.5,
            // 0.6 s at 10 Hz
            min_distance: 6,
            min_prominence: 0.3,
            min_std: 0.001,
        }
    }
}

/// Normalize the window and return the indices of accepted beat peaks.
///
/// Near-flat windows yield no peaks instead of dividing by a vanishing deviation.
pub fn detect_beats(window: &[f64], cfg: &BeatDetectorConfig) -> Events {
    match zscore(window, cfg.min_std) {
        Some(normalized) => Events::from_indices(find_peaks(&normalized, cfg)),
        None => Events::default(),
    }
}

/// z-score with the population standard deviation. `None` for empty, flat or
/// non-finite input.
pub fn zscore(data: &[f64], min_std: f64) -> Option<Vec<f64>> {
    if data.is_empty() {
        return None;
    }
    let n = data.len() as f64;
    let mean = data.iter().sum::<f64>() / n;
    let std = (data.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / n).sqrt();
    if !mean.is_finite() || !std.is_finite() || std < min_std {
        return None;
    }
    Some(data.iter().map(|x| (x - mean) / std).collect())
}

/// Local maxima filtered by height, then distance, then prominence.
pub fn find_peaks(data: &[f64], cfg: &BeatDetectorConfig) -> Vec<usize> {
    let candidates: Vec<usize> = local_maxima(data)
        .into_iter()
        .filter(|&idx| data[idx] >= cfg.min_height)
        .collect();
    let spaced = select_by_distance(data, &candidates, cfg.min_distance);
    spaced
        .into_iter()
        .filter(|&idx| prominence(data, idx) >= cfg.min_prominence)
        .collect()
}

/// Strict local maxima. A flat top counts once, at its middle sample; the first and
/// last samples never qualify.
fn local_maxima(data: &[f64]) -> Vec<usize> {
    let mut peaks = Vec::new();
    if data.len() < 3 {
        return peaks;
    }
    let last = data.len() - 1;
    let mut i = 1;
    while i < last {
        if data[i - 1] < data[i] {
            let mut ahead = i + 1;
            while ahead < last && data[ahead] == data[i] {
                ahead += 1;
            }
            if data[ahead] < data[i] {
                peaks.push((i + ahead - 1) / 2);
                i = ahead;
            }
        }
        i += 1;
    }
    peaks
}

/// Keep the highest peaks first and drop any lower neighbour closer than `distance`.
fn select_by_distance(data: &[f64], peaks: &[usize], distance: usize) -> Vec<usize> {
    if distance <= 1 || peaks.len() < 2 {
        return peaks.to_vec();
    }
    let n = peaks.len();
    let mut keep = vec![true; n];
    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by(|&a, &b| {
        data[peaks[a]]
            .partial_cmp(&data[peaks[b]])
            .unwrap_or(Ordering::Equal)
    });
    for &j in order.iter().rev() {
        if !keep[j] {
            continue;
        }
        let mut k = j;
        while k > 0 {
            k -= 1;
            if peaks[j] - peaks[k] >= distance {
                break;
            }
            keep[k] = false;
        }
        k = j + 1;
        while k < n && peaks[k] - peaks[j] < distance {
            keep[k] = false;
            k += 1;
        }
    }
    peaks
        .iter()
        .zip(keep)
        .filter_map(|(&idx, kept)| kept.then_some(idx))
        .collect()
}

/// Height of the peak above the higher of its two bases. Each base is the lowest
/// point reached before the signal climbs above the peak or the window ends.
fn prominence(data: &[f64], peak: usize) -> f64 {
    let height = data[peak];
    let mut left_min = height;
    for &v in data[..peak].iter().rev() {
        if v > height {
            break;
        }
        left_min = left_min.min(v);
    }
    let mut right_min = height;
    for &v in &data[peak + 1..] {
        if v > height {
            break;
        }
        right_min = right_min.min(v);
    }
    height - left_min.max(right_min)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spike_train(len: usize, period: usize, offset: usize) -> Vec<f64> {
        (0..len)
            .map(|i| if i % period == offset { 1.0 } else { 0.0 })
            .collect()
    }

    #[test]
    fn finds_regular_spikes() {
        let data = spike_train(80, 8, 3);
        let events = detect_beats(&data, &BeatDetectorConfig::default());
        let expected: Vec<usize> = (0..80).filter(|i| i % 8 == 3).collect();
        assert_eq!(events.indices, expected);
    }

    #[test]
    fn flat_window_has_no_peaks() {
        let data = vec![1.6; 100];
        assert!(detect_beats(&data, &BeatDetectorConfig::default()).is_empty());
        let nearly_flat: Vec<f64> = (0..100).map(|i| 1.6 + (i % 2) as f64 * 1e-5).collect();
        assert!(detect_beats(&nearly_flat, &BeatDetectorConfig::default()).is_empty());
    }

    #[test]
    fn plateau_counts_once_at_middle() {
        let data = [0.0, 1.0, 2.0, 2.0, 2.0, 1.0, 0.0];
        assert_eq!(local_maxima(&data), vec![3]);
        let even = [0.0, 2.0, 2.0, 0.0];
        assert_eq!(local_maxima(&even), vec![1]);
    }

    #[test]
    fn edges_are_not_peaks() {
        let data = [3.0, 1.0, 0.0, 1.0, 3.0];
        assert!(local_maxima(&data).is_empty());
    }

    #[test]
    fn distance_keeps_the_higher_peak() {
        let data = [0.0, 1.0, 0.0, 3.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 2.0, 0.0];
        let cfg = BeatDetectorConfig::default();
        assert_eq!(find_peaks(&data, &cfg), vec![3, 11]);
    }

    #[test]
    fn prominence_rejects_shoulder_bumps() {
        let data = [0.0, 2.0, 1.9, 2.1, 0.0];
        let cfg = BeatDetectorConfig {
            min_distance: 1,
            ..BeatDetectorConfig::default()
        };
        assert!((prominence(&data, 1) - 0.1).abs() < 1e-9);
        assert_eq!(find_peaks(&data, &cfg), vec![3]);
    }
}
