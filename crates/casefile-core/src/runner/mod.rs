//! Case runner.
//!
//! # Architecture
//!
//! A run moves through `Idle -> Discovering -> Filtering -> Executing ->
//! Reporting -> Done`:
//!
//! - [`selection`]: Picks cases from the registry and checks capabilities
//! - [`plan`]: Groups selected cases into execution units
//! - [`executor`]: Runs units with fixtures, timeouts and fail-fast
//! - [`measured`]: Benchmark and jitter measurement loops
//! - [`baseline`]: Stored baselines and comparisons
//! - [`results`]: Outcomes and the run report

pub mod baseline;
pub mod executor;
pub mod measured;
pub mod plan;
pub mod results;
pub mod selection;
pub mod stats;

use std::fmt;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::fuzz::FuzzConfig;
use crate::registry::Registry;

pub use baseline::{BaselineComparison, BaselineConfig, BaselineEntry, BaselineStore};
pub use executor::{invoke_once, Executor, Invocation, FAIL_FAST_REASON};
pub use measured::{measure_bench, measure_jitter, BenchConfig};
pub use plan::{build_plan, ExecutionUnit, Plan};
pub use results::{
    BenchResult, CaseResultRecord, ExitStatus, JitterResult, Outcome, OutcomeCounts, RunReport,
};
pub use selection::{select, wildcard_match, KindFilter, Selected, Selection, SelectionError};
pub use stats::{histogram, HistogramBin, SampleStats};

/// Scheduling options.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutionConfig {
    /// Worker threads; 0 uses the available parallelism.
    pub jobs: usize,
    /// Timeout for cases without a `timeout` annotation.
    pub default_timeout_ms: Option<u64>,
    pub fail_fast: bool,
    pub shuffle: bool,
    /// Shuffle seed; drawn at random when shuffling without one.
    pub seed: Option<u64>,
    /// Number of times the whole plan runs.
    pub repeat: u32,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            jobs: 0,
            default_timeout_ms: None,
            fail_fast: false,
            shuffle: false,
            seed: None,
            repeat: 1,
        }
    }
}

/// Everything a run needs besides the registry.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    pub selection: Selection,
    pub execution: ExecutionConfig,
    pub bench: BenchConfig,
    pub fuzz: FuzzConfig,
    pub baseline: BaselineConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Discovering,
    Filtering,
    Executing,
    Reporting,
    Done,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Phase::Idle => "idle",
            Phase::Discovering => "discovering",
            Phase::Filtering => "filtering",
            Phase::Executing => "executing",
            Phase::Reporting => "reporting",
            Phase::Done => "done",
        };
        f.write_str(s)
    }
}

/// Errors that stop a run before any case executes.
#[derive(Debug)]
pub enum RunError {
    Selection(SelectionError),
    ThreadPool(String),
    Baseline(String),
}

impl fmt::Display for RunError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunError::Selection(e) => write!(f, "selection error: {}", e),
            RunError::ThreadPool(e) => write!(f, "failed to start worker pool: {}", e),
            RunError::Baseline(e) => write!(f, "failed to load baselines: {}", e),
        }
    }
}

impl std::error::Error for RunError {}

impl From<SelectionError> for RunError {
    fn from(e: SelectionError) -> Self {
        RunError::Selection(e)
    }
}

fn enter(phase: &mut Phase, next: Phase) {
    debug!(from = %phase, to = %next, "runner phase");
    *phase = next;
}

/// Run the selected cases of `registry`.
pub fn run(registry: &Registry, config: &RunConfig) -> Result<RunReport, RunError> {
    let baselines = match &config.baseline.file {
        Some(path) => {
            BaselineStore::load(path).map_err(|e| RunError::Baseline(format!("{:#}", e)))?
        }
        None => BaselineStore::new(),
    };
    let report = run_with_baselines(registry, config, &baselines)?;
    if let Some(path) = &config.baseline.file {
        if let Err(e) = baselines.save(path) {
            warn!(path = %path.display(), error = %format!("{:#}", e), "failed to save baselines");
        }
    }
    Ok(report)
}

/// Run against an existing baseline store, which is updated in place.
pub fn run_with_baselines(
    registry: &Registry,
    config: &RunConfig,
    baselines: &BaselineStore,
) -> Result<RunReport, RunError> {
    let started_at = Utc::now();
    let mut phase = Phase::Idle;

    enter(&mut phase, Phase::Discovering);
    debug!(cases = registry.len(), fixtures = registry.fixtures().len(), "registry ready");

    enter(&mut phase, Phase::Filtering);
    let selected = select(registry, &config.selection)?;
    let (runnable, unmet): (Vec<_>, Vec<_>) = selected.into_iter().partition(|s| s.runnable());
    let records: Vec<_> = runnable.iter().map(|s| s.record).collect();

    enter(&mut phase, Phase::Executing);
    let shuffle_seed = config
        .execution
        .shuffle
        .then(|| config.execution.seed.unwrap_or_else(rand::random));
    let plan = build_plan(&records, shuffle_seed);
    let executor = Executor::new(registry.fixtures(), config, baselines)
        .map_err(|e| RunError::ThreadPool(e.to_string()))?;

    let repeat = config.execution.repeat.max(1);
    let mut results = Vec::with_capacity((plan.case_count() + unmet.len()) * repeat as usize);
    for attempt in 0..repeat {
        debug!(attempt, units = plan.parallel.len() + plan.measured.len(), "executing plan");
        results.extend(unmet.iter().map(|s| {
            let case = &s.record.case;
            let mut result = CaseResultRecord::new(case.id.clone(), attempt, case.kind, Outcome::NotRun)
                .with_reason(format!("missing capability: {}", s.missing.join(", ")));
            result.requirements = case.requirements.iter().cloned().collect();
            result
        }));
        results.extend(executor.run_plan(&plan, attempt));
    }

    enter(&mut phase, Phase::Reporting);
    let report = RunReport::new(started_at, shuffle_seed, results);
    info!(
        total = report.counts.total,
        passed = report.counts.passed,
        failed = report.counts.failures(),
        skipped = report.counts.skipped,
        not_run = report.counts.not_run,
        "run finished"
    );

    enter(&mut phase, Phase::Done);
    Ok(report)
}
