//! Result model of a run.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use casefile_types::{CaseId, CaseKind};

use super::baseline::BaselineComparison;
use super::stats::{HistogramBin, SampleStats};
use crate::fuzz::FuzzReport;

/// Final state of one case execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Passed,
    Failed,
    /// The body panicked.
    Crashed,
    TimedOut,
    Skipped,
    /// Filtered by capabilities, or never scheduled after a fail-fast stop.
    NotRun,
}

impl Outcome {
    pub fn is_failure(&self) -> bool {
        matches!(self, Outcome::Failed | Outcome::Crashed | Outcome::TimedOut)
    }

    /// Fixed-width marker used by the text reporter.
    pub fn marker(&self) -> &'static str {
        match self {
            Outcome::Passed => "[ PASS ]",
            Outcome::Failed => "[ FAIL ]",
            Outcome::Crashed => "[ CRSH ]",
            Outcome::TimedOut => "[ TIME ]",
            Outcome::Skipped => "[ SKIP ]",
            Outcome::NotRun => "[ N/RN ]",
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Outcome::Passed => "passed",
            Outcome::Failed => "failed",
            Outcome::Crashed => "crashed",
            Outcome::TimedOut => "timed out",
            Outcome::Skipped => "skipped",
            Outcome::NotRun => "not run",
        };
        write!(f, "{}", s)
    }
}

/// Timing of a Benchmark or Baseline case.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BenchResult {
    pub epochs: usize,
    pub iters_per_epoch: u64,
    pub total_iters: u64,
    pub calibration_time_s: f64,
    pub warmup_time_s: f64,
    pub total_time_s: f64,
    /// Per-epoch ns/iter statistics.
    pub stats: SampleStats,
    /// Set when the numbers were taken from the baseline store instead of
    /// a fresh measurement.
    #[serde(default)]
    pub reused: bool,
}

/// Per-call samples of a Jitter case.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JitterResult {
    pub epochs: usize,
    pub samples: usize,
    pub total_time_s: f64,
    pub stats: SampleStats,
    pub histogram: Vec<HistogramBin>,
}

/// Result of one case in one repeat iteration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaseResultRecord {
    pub id: CaseId,
    /// Repeat iteration index, starting at 0.
    pub attempt: u32,
    pub kind: CaseKind,
    pub outcome: Outcome,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    /// Non-fatal expectation failures.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub diagnostics: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub logs: Vec<String>,
    pub duration_ms: u64,
    /// Requirements copied from the case, for reporters.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub requirements: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bench: Option<BenchResult>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jitter: Option<JitterResult>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub baseline: Option<BaselineComparison>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fuzz: Option<FuzzReport>,
}

impl CaseResultRecord {
    pub fn new(id: CaseId, attempt: u32, kind: CaseKind, outcome: Outcome) -> Self {
        Self {
            id,
            attempt,
            kind,
            outcome,
            reason: None,
            diagnostics: Vec::new(),
            logs: Vec::new(),
            duration_ms: 0,
            requirements: Vec::new(),
            bench: None,
            jitter: None,
            baseline: None,
            fuzz: None,
        }
    }

    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutcomeCounts {
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub crashed: usize,
    pub timed_out: usize,
    pub skipped: usize,
    pub not_run: usize,
}

impl OutcomeCounts {
    pub fn tally<'a>(results: impl IntoIterator<Item = &'a CaseResultRecord>) -> Self {
        let mut counts = Self::default();
        for r in results {
            counts.total += 1;
            match r.outcome {
                Outcome::Passed => counts.passed += 1,
                Outcome::Failed => counts.failed += 1,
                Outcome::Crashed => counts.crashed += 1,
                Outcome::TimedOut => counts.timed_out += 1,
                Outcome::Skipped => counts.skipped += 1,
                Outcome::NotRun => counts.not_run += 1,
            }
        }
        counts
    }

    pub fn failures(&self) -> usize {
        self.failed + self.crashed + self.timed_out
    }
}

/// Process exit status of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExitStatus {
    /// Nothing failed; NotRun and Skipped do not count as failures.
    Success,
    CaseFailure,
    /// Usage or registration error; nothing ran.
    Error,
}

impl ExitStatus {
    pub fn code(&self) -> i32 {
        match self {
            ExitStatus::Success => 0,
            ExitStatus::CaseFailure => 1,
            ExitStatus::Error => 2,
        }
    }
}

/// Everything a reporter needs about one run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    /// Shuffle seed, when shuffling was enabled.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
    /// Sorted by `(suite, name, attempt)`.
    pub results: Vec<CaseResultRecord>,
    pub counts: OutcomeCounts,
    pub exit_status: ExitStatus,
}

impl RunReport {
    pub fn new(
        started_at: DateTime<Utc>,
        seed: Option<u64>,
        mut results: Vec<CaseResultRecord>,
    ) -> Self {
        results.sort_by(|a, b| a.id.cmp(&b.id).then(a.attempt.cmp(&b.attempt)));
        let counts = OutcomeCounts::tally(&results);
        let exit_status = if counts.failures() > 0 {
            ExitStatus::CaseFailure
        } else {
            ExitStatus::Success
        };
        Self {
            run_id: Uuid::new_v4(),
            started_at,
            finished_at: Utc::now(),
            seed,
            results,
            counts,
            exit_status,
        }
    }

    pub fn exit_code(&self) -> i32 {
        self.exit_status.code()
    }

    pub fn get(&self, id: &CaseId) -> impl Iterator<Item = &CaseResultRecord> {
        let id = id.clone();
        self.results.iter().filter(move |r| r.id == id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_sorting_and_exit_status() {
        let results = vec![
            CaseResultRecord::new(CaseId::new("b", "x"), 0, CaseKind::Test, Outcome::Passed),
            CaseResultRecord::new(CaseId::new("a", "y"), 1, CaseKind::Test, Outcome::NotRun),
            CaseResultRecord::new(CaseId::new("a", "y"), 0, CaseKind::Test, Outcome::Skipped),
        ];
        let report = RunReport::new(Utc::now(), None, results);
        assert_eq!(report.results[0].id, CaseId::new("a", "y"));
        assert_eq!(report.results[0].attempt, 0);
        assert_eq!(report.exit_code(), 0);
        assert_eq!(report.counts.not_run, 1);

        let failing = RunReport::new(
            Utc::now(),
            None,
            vec![CaseResultRecord::new(CaseId::new("a", "z"), 0, CaseKind::Test, Outcome::TimedOut)],
        );
        assert_eq!(failing.exit_code(), 1);
    }

    #[test]
    fn test_outcome_serialization() {
        let json = serde_json::to_string(&Outcome::TimedOut).unwrap();
        assert_eq!(json, "\"timed_out\"");
        assert_eq!(Outcome::NotRun.marker(), "[ N/RN ]");
    }
}
