//! Case execution.
//!
//! Every invocation runs through [`invoke_once`]: on its own thread, with
//! panics captured and an optional timeout. Fixtures are handed to the
//! body through a [`SharedFixture`] slot, so release follows the last
//! holder even when an invocation is abandoned.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use rayon::prelude::*;
use tracing::{debug, warn};

use casefile_types::{format_tuple, CaseKind};

use super::baseline::{BaselineComparison, BaselineStore};
use super::measured::{measure_bench, measure_jitter};
use super::plan::{ExecutionUnit, Plan};
use super::results::{BenchResult, CaseResultRecord, JitterResult, Outcome};
use super::stats::SampleStats;
use super::RunConfig;
use crate::context::{CaseContext, CaseFailure, CaseResult};
use crate::emit::RegistrationRecord;
use crate::fixture::{FixtureTable, SharedFixture};
use crate::fuzz::{FuzzRunner, Probe};
use crate::guard::{guarded_call, CallOutcome};
use crate::invoke::CallInput;
use crate::model::DEFAULT_JITTER_BINS;

pub const FAIL_FAST_REASON: &str = "fail-fast";

/// Result of a single invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct Invocation {
    pub outcome: Outcome,
    pub message: Option<String>,
    pub logs: Vec<String>,
    pub diagnostics: Vec<String>,
}

impl Invocation {
    fn failed(message: impl Into<String>) -> Self {
        Self {
            outcome: Outcome::Failed,
            message: Some(message.into()),
            logs: Vec::new(),
            diagnostics: Vec::new(),
        }
    }
}

/// Invoke `record` once with `input`.
///
/// With a fixture and a timeout, a previous holder that is still running
/// (an abandoned, timed-out invocation) is waited for at most one timeout;
/// after that the call fails with "fixture busy".
pub fn invoke_once(
    record: &RegistrationRecord,
    attempt: u32,
    fixture: Option<&Arc<SharedFixture>>,
    input: CallInput,
    timeout: Option<Duration>,
) -> Invocation {
    if let (Some(shared), Some(wait)) = (fixture, timeout) {
        if shared.lock(Some(wait)).is_none() {
            warn!(case = %record.case.id, "fixture still held by a timed-out invocation");
            return Invocation::failed("fixture busy");
        }
    }

    let invoke = record.invoke.clone();
    let ctx = Arc::new(CaseContext::new(record.case.id.clone(), attempt));
    let body_ctx = Arc::clone(&ctx);
    let fx = fixture.cloned();
    let outcome = guarded_call(&record.case.id.qualified(), timeout, move || {
        let result = match &fx {
            Some(shared) => match shared.lock(None) {
                Some(mut slot) => invoke.call(&body_ctx, slot.fixture_mut(), &input),
                None => Err(CaseFailure::failed("fixture busy")),
            },
            None => invoke.call(&body_ctx, None, &input),
        };
        result
    });
    // Whatever the body recorded before returning, panicking or hanging.
    let (logs, diagnostics) = ctx.take();

    let (outcome, message) = match outcome {
        CallOutcome::Returned(result) => match result {
            Ok(()) if diagnostics.is_empty() => (Outcome::Passed, None),
            Ok(()) => (Outcome::Failed, Some(diagnostics.join("; "))),
            Err(CaseFailure::Skip(reason)) => (Outcome::Skipped, Some(reason)),
            Err(CaseFailure::Failed(message)) => (Outcome::Failed, Some(message)),
        },
        CallOutcome::Panicked(message) => (Outcome::Crashed, Some(format!("panicked: {}", message))),
        CallOutcome::TimedOut => (
            Outcome::TimedOut,
            Some(format!(
                "timed out after {} ms",
                timeout.map_or(0, |t| t.as_millis())
            )),
        ),
    };
    Invocation {
        outcome,
        message,
        logs,
        diagnostics,
    }
}

enum Measurement {
    Bench(BenchResult),
    Jitter(JitterResult),
}

/// Runs the units of a plan.
pub struct Executor<'a> {
    fixtures: &'a FixtureTable,
    config: &'a RunConfig,
    baselines: &'a BaselineStore,
    pool: rayon::ThreadPool,
    stop: AtomicBool,
}

impl<'a> Executor<'a> {
    pub fn new(
        fixtures: &'a FixtureTable,
        config: &'a RunConfig,
        baselines: &'a BaselineStore,
    ) -> Result<Self, rayon::ThreadPoolBuildError> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(config.execution.jobs)
            .thread_name(|i| format!("casefile-worker-{}", i))
            .build()?;
        Ok(Self {
            fixtures,
            config,
            baselines,
            pool,
            stop: AtomicBool::new(false),
        })
    }

    /// Whether fail-fast has stopped scheduling.
    pub fn stopped(&self) -> bool {
        self.stop.load(Ordering::SeqCst)
    }

    /// Run the parallel phase, then the measured units in order.
    pub fn run_plan(&self, plan: &Plan<'_>, attempt: u32) -> Vec<CaseResultRecord> {
        let parallel: Vec<Vec<CaseResultRecord>> = self.pool.install(|| {
            plan.parallel
                .par_iter()
                .map(|unit| self.run_unit(unit, attempt))
                .collect()
        });
        let mut results: Vec<CaseResultRecord> = parallel.into_iter().flatten().collect();
        for unit in &plan.measured {
            results.extend(self.run_unit(unit, attempt));
        }
        results
    }

    fn run_unit(&self, unit: &ExecutionUnit<'_>, attempt: u32) -> Vec<CaseResultRecord> {
        let mut shared: Option<Result<Arc<SharedFixture>, String>> = None;
        let mut results = Vec::with_capacity(unit.cases.len());
        for record in &unit.cases {
            let case = &record.case;
            if self.stopped() {
                results.push(
                    CaseResultRecord::new(case.id.clone(), attempt, case.kind, Outcome::NotRun)
                        .with_reason(FAIL_FAST_REASON),
                );
                continue;
            }
            if case.should_skip {
                results.push(
                    CaseResultRecord::new(case.id.clone(), attempt, case.kind, Outcome::Skipped)
                        .with_reason(case.skip_reason.clone().unwrap_or_default()),
                );
                continue;
            }

            let fixture = match &unit.shared_fixture {
                Some(name) => shared
                    .get_or_insert_with(|| SharedFixture::acquire(name, self.fixtures))
                    .clone()
                    .map(Some),
                None => match &case.fixture {
                    Some(f) => SharedFixture::acquire(&f.name, self.fixtures).map(Some),
                    None => Ok(None),
                },
            };

            let started = Instant::now();
            let mut result = match fixture {
                Ok(fx) => self.execute(record, attempt, fx.as_ref()),
                Err(reason) => {
                    CaseResultRecord::new(case.id.clone(), attempt, case.kind, Outcome::Failed)
                        .with_reason(reason)
                }
            };
            result.duration_ms = started.elapsed().as_millis() as u64;
            result.requirements = case.requirements.iter().cloned().collect();
            debug!(case = %case.id, attempt, outcome = %result.outcome, "case finished");

            if result.outcome.is_failure() && self.config.execution.fail_fast {
                self.stop.store(true, Ordering::SeqCst);
            }
            results.push(result);
        }
        results
    }

    fn execute(
        &self,
        record: &RegistrationRecord,
        attempt: u32,
        fixture: Option<&Arc<SharedFixture>>,
    ) -> CaseResultRecord {
        match record.case.kind {
            CaseKind::Test => self.run_test(record, attempt, fixture),
            CaseKind::Fuzz => self.run_fuzz(record, attempt, fixture),
            CaseKind::Benchmark | CaseKind::Jitter | CaseKind::Baseline => {
                self.run_measured(record, attempt, fixture)
            }
        }
    }

    fn case_timeout(&self, record: &RegistrationRecord) -> Option<Duration> {
        record.case.timeout().or_else(|| {
            self.config
                .execution
                .default_timeout_ms
                .map(Duration::from_millis)
        })
    }

    fn run_test(
        &self,
        record: &RegistrationRecord,
        attempt: u32,
        fixture: Option<&Arc<SharedFixture>>,
    ) -> CaseResultRecord {
        let case = &record.case;
        let timeout = self.case_timeout(record);
        let parameterized = !case.parameters.is_empty();
        let rows = case.parameter_rows();
        let row_count = rows.len();

        let mut result = CaseResultRecord::new(case.id.clone(), attempt, case.kind, Outcome::Passed);
        let mut first_failure: Option<(Outcome, String)> = None;
        let mut skips: Vec<String> = Vec::new();
        for row in rows {
            let input = if parameterized {
                CallInput::Args(row.clone())
            } else {
                CallInput::None
            };
            let inv = invoke_once(record, attempt, fixture, input, timeout);
            let label = |msg: String| {
                if parameterized {
                    format!("row {}: {}", format_tuple(&row), msg)
                } else {
                    msg
                }
            };
            result.logs.extend(inv.logs);
            result.diagnostics.extend(inv.diagnostics.into_iter().map(label));
            let message = inv.message.unwrap_or_default();
            match inv.outcome {
                Outcome::Passed | Outcome::NotRun => {}
                Outcome::Skipped => skips.push(message),
                failed => {
                    if first_failure.is_none() {
                        first_failure = Some((failed, label(message)));
                    }
                    if failed == Outcome::TimedOut {
                        break;
                    }
                }
            }
        }

        if let Some((outcome, reason)) = first_failure {
            result.outcome = outcome;
            result.reason = Some(reason);
        } else if !skips.is_empty() && skips.len() == row_count {
            result.outcome = Outcome::Skipped;
            result.reason = skips.into_iter().next();
        }
        result
    }

    fn run_fuzz(
        &self,
        record: &RegistrationRecord,
        attempt: u32,
        fixture: Option<&Arc<SharedFixture>>,
    ) -> CaseResultRecord {
        let case = &record.case;
        let mut result = CaseResultRecord::new(case.id.clone(), attempt, case.kind, Outcome::Passed);
        let Some(spec) = &case.fuzz else {
            result.outcome = Outcome::Failed;
            return result.with_reason("fuzz case has no fuzz inputs");
        };

        let mut cfg = self.config.fuzz.clone();
        cfg.per_input_timeout_ms = case
            .timeout_ms
            .or(cfg.per_input_timeout_ms)
            .or(self.config.execution.default_timeout_ms);
        let timeout = cfg.per_input_timeout();
        let target = case.id.qualified();
        let raw_bytes = spec.is_raw_bytes();

        let report = FuzzRunner::new(&target, spec, &cfg).run(|args, _| {
            let input = if raw_bytes {
                CallInput::Bytes(
                    args.first()
                        .and_then(|a| a.as_bytes())
                        .map(<[u8]>::to_vec)
                        .unwrap_or_default(),
                )
            } else {
                CallInput::Args(args.to_vec())
            };
            let inv = invoke_once(record, attempt, fixture, input, Some(timeout));
            Probe::new(inv.outcome, inv.message.unwrap_or_default())
        });

        if let Some(failure) = &report.failure {
            result.outcome = failure.outcome;
            result.reason = Some(format!(
                "{} (minimized input {})",
                failure.message,
                format_tuple(&failure.minimized)
            ));
        }
        result.fuzz = Some(report);
        result
    }

    fn run_measured(
        &self,
        record: &RegistrationRecord,
        attempt: u32,
        fixture: Option<&Arc<SharedFixture>>,
    ) -> CaseResultRecord {
        let case = &record.case;
        let mut result = CaseResultRecord::new(case.id.clone(), attempt, case.kind, Outcome::Passed);

        if case.kind == CaseKind::Baseline && !self.config.baseline.refresh {
            if let Some(entry) = self.baselines.reusable(case.suite(), &case.id) {
                debug!(case = %case.id, "reusing stored baseline");
                result.bench = Some(BenchResult {
                    stats: SampleStats {
                        median: entry.median_ns,
                        stddev: entry.stddev_ns,
                        ..Default::default()
                    },
                    reused: true,
                    ..Default::default()
                });
                return result;
            }
        }

        let input = match case.parameter_rows().into_iter().next() {
            Some(row) if !case.parameters.is_empty() => CallInput::Args(row),
            _ => CallInput::None,
        };
        let invoke = record.invoke.clone();
        let ctx = Arc::new(CaseContext::new(case.id.clone(), attempt));
        let body_ctx = Arc::clone(&ctx);
        let fx = fixture.cloned();
        let cfg = self.config.bench.clone();
        let kind = case.kind;
        let bins = case.jitter_bins.unwrap_or(DEFAULT_JITTER_BINS);

        let outcome = guarded_call(&case.id.qualified(), self.case_timeout(record), move || {
            let mut slot = match &fx {
                Some(shared) => match shared.lock(None) {
                    Some(guard) => Some(guard),
                    None => return Err(CaseFailure::failed("fixture busy")),
                },
                None => None,
            };
            let mut call = || -> CaseResult {
                invoke.call(&body_ctx, slot.as_mut().and_then(|g| g.fixture_mut()), &input)?;
                if body_ctx.has_failures() {
                    return Err(CaseFailure::Failed(body_ctx.failures().join("; ")));
                }
                Ok(())
            };
            let measured = match kind {
                CaseKind::Jitter => measure_jitter(&cfg, bins, &mut call).map(Measurement::Jitter),
                _ => measure_bench(&cfg, &mut call).map(Measurement::Bench),
            };
            measured
        });
        let (logs, diagnostics) = ctx.take();
        result.logs = logs;
        result.diagnostics = diagnostics;

        match outcome {
            CallOutcome::Returned(Ok(measurement)) => {
                let (median, stddev) = match &measurement {
                    Measurement::Bench(b) => (b.stats.median, b.stats.stddev),
                    Measurement::Jitter(j) => (j.stats.median, j.stats.stddev),
                };
                match measurement {
                    Measurement::Bench(b) => result.bench = Some(b),
                    Measurement::Jitter(j) => result.jitter = Some(j),
                }
                if kind == CaseKind::Baseline {
                    self.baselines.record(&case.id, median, stddev);
                } else if let Some(entry) = self.baselines.get(case.suite()) {
                    let cmp = BaselineComparison::new(&entry, median, Some(stddev));
                    if let Some(threshold) = self.config.baseline.regression_threshold_pct {
                        if cmp.exceeds(threshold) {
                            result.outcome = Outcome::Failed;
                            result.reason = Some(format!(
                                "regression: {:+.1}% against baseline `{}` (threshold {}%)",
                                cmp.delta_pct, cmp.baseline_case, threshold
                            ));
                        }
                    }
                    result.baseline = Some(cmp);
                }
            }
            CallOutcome::Returned(Err(CaseFailure::Skip(reason))) => {
                result.outcome = Outcome::Skipped;
                result.reason = Some(reason);
            }
            CallOutcome::Returned(Err(CaseFailure::Failed(message))) => {
                result.outcome = Outcome::Failed;
                result.reason = Some(message);
            }
            CallOutcome::Panicked(message) => {
                result.outcome = Outcome::Crashed;
                result.reason = Some(format!("panicked: {}", message));
            }
            CallOutcome::TimedOut => {
                result.outcome = Outcome::TimedOut;
                result.reason = Some("measurement timed out".to_string());
            }
        }
        result
    }
}
