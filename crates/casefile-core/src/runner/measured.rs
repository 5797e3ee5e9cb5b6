//! Timing loops for Benchmark, Jitter and Baseline cases.
//!
//! Calibration doubles the iterations per epoch until one epoch takes at
//! least `min_epoch_time_s`. After warmup, epochs are measured until both
//! `measure_epochs` and `min_total_time_s` are reached, or until
//! `max_total_time_s` has passed.

use std::time::Instant;

use serde::{Deserialize, Serialize};

use super::results::{BenchResult, JitterResult};
use super::stats::{histogram, SampleStats};
use crate::context::{CaseFailure, CaseResult};

const MAX_CALIBRATION_ITERS: u64 = 1 << 30;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BenchConfig {
    pub min_epoch_time_s: f64,
    pub min_total_time_s: f64,
    /// Zero disables the cap.
    pub max_total_time_s: f64,
    pub warmup_epochs: usize,
    pub measure_epochs: usize,
}

impl Default for BenchConfig {
    fn default() -> Self {
        Self {
            min_epoch_time_s: 0.01,
            min_total_time_s: 0.0,
            max_total_time_s: 1.0,
            warmup_epochs: 1,
            measure_epochs: 12,
        }
    }
}

/// Run `iters` calls; stops at the first failing call.
fn run_epoch<F>(call: &mut F, iters: u64) -> Result<f64, CaseFailure>
where
    F: FnMut() -> CaseResult,
{
    let start = Instant::now();
    for _ in 0..iters {
        call()?;
    }
    Ok(start.elapsed().as_secs_f64())
}

fn calibrate<F>(cfg: &BenchConfig, call: &mut F) -> Result<(u64, f64), CaseFailure>
where
    F: FnMut() -> CaseResult,
{
    let mut iters = 1u64;
    loop {
        let secs = run_epoch(call, iters)?;
        if secs >= cfg.min_epoch_time_s || iters >= MAX_CALIBRATION_ITERS {
            return Ok((iters, secs));
        }
        iters *= 2;
    }
}

fn keep_measuring(cfg: &BenchConfig, epochs: usize, total_s: f64, started: Instant) -> bool {
    if epochs >= cfg.measure_epochs && total_s >= cfg.min_total_time_s {
        return false;
    }
    let over_cap = cfg.max_total_time_s > 0.0
        && started.elapsed().as_secs_f64() > cfg.max_total_time_s
        && total_s >= cfg.min_total_time_s;
    !over_cap
}

pub fn measure_bench<F>(cfg: &BenchConfig, mut call: F) -> Result<BenchResult, CaseFailure>
where
    F: FnMut() -> CaseResult,
{
    let (iters, calibration_time_s) = calibrate(cfg, &mut call)?;
    let mut result = BenchResult {
        iters_per_epoch: iters,
        calibration_time_s,
        ..Default::default()
    };
    for _ in 0..cfg.warmup_epochs {
        result.warmup_time_s += run_epoch(&mut call, iters)?;
    }

    let mut epoch_ns = Vec::with_capacity(cfg.measure_epochs);
    let started = Instant::now();
    while keep_measuring(cfg, epoch_ns.len(), result.total_time_s, started) {
        let secs = run_epoch(&mut call, iters)?;
        epoch_ns.push(secs * 1e9 / iters as f64);
        result.total_time_s += secs;
        result.total_iters += iters;
    }
    result.epochs = epoch_ns.len();
    result.stats = SampleStats::compute(&epoch_ns);
    Ok(result)
}

/// Like [`measure_bench`], but every call is timed on its own.
pub fn measure_jitter<F>(cfg: &BenchConfig, bins: usize, mut call: F) -> Result<JitterResult, CaseFailure>
where
    F: FnMut() -> CaseResult,
{
    let (iters, _) = calibrate(cfg, &mut call)?;
    for _ in 0..cfg.warmup_epochs {
        run_epoch(&mut call, iters)?;
    }

    let mut samples = Vec::new();
    let mut result = JitterResult::default();
    let started = Instant::now();
    while keep_measuring(cfg, result.epochs, result.total_time_s, started) {
        let epoch_start = Instant::now();
        for _ in 0..iters {
            let t = Instant::now();
            call()?;
            samples.push(t.elapsed().as_nanos() as f64);
        }
        result.total_time_s += epoch_start.elapsed().as_secs_f64();
        result.epochs += 1;
    }
    result.samples = samples.len();
    result.stats = SampleStats::compute(&samples);
    result.histogram = histogram(&samples, bins);
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quick() -> BenchConfig {
        BenchConfig {
            min_epoch_time_s: 0.0005,
            min_total_time_s: 0.0,
            max_total_time_s: 0.2,
            warmup_epochs: 1,
            measure_epochs: 4,
        }
    }

    #[test]
    fn test_bench_collects_epochs() {
        let mut n = 0u64;
        let r = measure_bench(&quick(), || {
            n = n.wrapping_add(std::hint::black_box(3));
            Ok(())
        })
        .unwrap();
        assert!(r.epochs >= 1);
        assert!(r.iters_per_epoch >= 1);
        assert_eq!(r.total_iters, r.iters_per_epoch * r.epochs as u64);
        assert!(r.stats.min <= r.stats.median && r.stats.median <= r.stats.max);
    }

    #[test]
    fn test_jitter_histogram_covers_samples() {
        let r = measure_jitter(&quick(), 5, || Ok(())).unwrap();
        assert!(r.samples > 0);
        let counted: usize = r.histogram.iter().map(|b| b.count).sum();
        assert_eq!(counted, r.samples);
    }

    #[test]
    fn test_failure_stops_measurement() {
        let mut calls = 0;
        let err = measure_bench(&quick(), || {
            calls += 1;
            if calls == 3 {
                Err(CaseFailure::failed("boom"))
            } else {
                Ok(())
            }
        })
        .unwrap_err();
        assert_eq!(err, CaseFailure::failed("boom"));
    }
}
