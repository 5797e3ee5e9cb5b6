//! Sample statistics for measured cases.

use serde::{Deserialize, Serialize};

/// Summary of a sample set, all values in nanoseconds per iteration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SampleStats {
    pub count: usize,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub median: f64,
    pub p05: f64,
    pub p95: f64,
    /// Population standard deviation.
    pub stddev: f64,
}

impl SampleStats {
    pub fn compute(samples: &[f64]) -> Self {
        if samples.is_empty() {
            return Self::default();
        }
        let mut sorted = samples.to_vec();
        sorted.sort_by(|a, b| a.total_cmp(b));
        let mean = mean_of(&sorted);
        Self {
            count: sorted.len(),
            min: sorted[0],
            max: sorted[sorted.len() - 1],
            mean,
            median: percentile_sorted(&sorted, 0.5),
            p05: percentile_sorted(&sorted, 0.05),
            p95: percentile_sorted(&sorted, 0.95),
            stddev: stddev_of(&sorted, mean),
        }
    }
}

/// Linear interpolation between the two ranks around `p * (n - 1)`.
pub fn percentile_sorted(sorted: &[f64], p: f64) -> f64 {
    match sorted.len() {
        0 => return 0.0,
        1 => return sorted[0],
        _ => {}
    }
    if p <= 0.0 {
        return sorted[0];
    }
    if p >= 1.0 {
        return sorted[sorted.len() - 1];
    }
    let idx = p * (sorted.len() - 1) as f64;
    let lo = idx as usize;
    let hi = (lo + 1).min(sorted.len() - 1);
    let frac = idx - lo as f64;
    sorted[lo] + (sorted[hi] - sorted[lo]) * frac
}

fn mean_of(v: &[f64]) -> f64 {
    if v.is_empty() {
        0.0
    } else {
        v.iter().sum::<f64>() / v.len() as f64
    }
}

fn stddev_of(v: &[f64], mean: f64) -> f64 {
    if v.len() < 2 {
        return 0.0;
    }
    let sum: f64 = v.iter().map(|x| (x - mean) * (x - mean)).sum();
    (sum / v.len() as f64).sqrt()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistogramBin {
    pub lo: f64,
    pub hi: f64,
    pub count: usize,
    pub pct: f64,
    pub cum_pct: f64,
}

/// Equal-width histogram. All samples equal collapses to one bin.
pub fn histogram(samples: &[f64], bins: usize) -> Vec<HistogramBin> {
    if samples.is_empty() {
        return Vec::new();
    }
    let min = samples.iter().copied().fold(f64::INFINITY, f64::min);
    let max = samples.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let bins = if min == max { 1 } else { bins.max(1) };
    let width = if bins == 1 { 0.0 } else { (max - min) / bins as f64 };

    let mut counts = vec![0usize; bins];
    for v in samples {
        let idx = if bins > 1 {
            (((v - min) / width) as usize).min(bins - 1)
        } else {
            0
        };
        counts[idx] += 1;
    }

    let total = samples.len() as f64;
    let mut cumulative = 0usize;
    counts
        .iter()
        .enumerate()
        .map(|(i, &count)| {
            cumulative += count;
            let lo = if bins == 1 { min } else { min + width * i as f64 };
            let hi = if bins == 1 || i == bins - 1 {
                max
            } else {
                min + width * (i + 1) as f64
            };
            HistogramBin {
                lo,
                hi,
                count,
                pct: count as f64 / total * 100.0,
                cum_pct: cumulative as f64 / total * 100.0,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_percentile_interpolates() {
        let v = [1.0, 2.0, 3.0, 4.0, 5.0];
        assert_eq!(percentile_sorted(&v, 0.5), 3.0);
        assert_eq!(percentile_sorted(&v, 0.0), 1.0);
        assert_eq!(percentile_sorted(&v, 1.0), 5.0);
        assert!((percentile_sorted(&v, 0.05) - 1.2).abs() < 1e-9);
        assert!((percentile_sorted(&[10.0, 20.0], 0.5) - 15.0).abs() < 1e-9);
    }

    #[test]
    fn test_stats() {
        let s = SampleStats::compute(&[4.0, 2.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0]);
        assert_eq!(s.count, 8);
        assert_eq!(s.min, 2.0);
        assert_eq!(s.max, 9.0);
        assert_eq!(s.mean, 5.0);
        assert_eq!(s.stddev, 2.0);
        assert_eq!(s.median, 4.5);
        assert_eq!(SampleStats::compute(&[]), SampleStats::default());
    }

    #[test]
    fn test_histogram() {
        let h = histogram(&[1.0, 2.0, 3.0, 4.0], 3);
        assert_eq!(h.len(), 3);
        assert_eq!(h.iter().map(|b| b.count).sum::<usize>(), 4);
        assert_eq!(h[2].hi, 4.0);
        assert_eq!(h[2].cum_pct, 100.0);

        let flat = histogram(&[7.0, 7.0, 7.0], 10);
        assert_eq!(flat.len(), 1);
        assert_eq!(flat[0].count, 3);
        assert_eq!(flat[0].pct, 100.0);
    }
}
