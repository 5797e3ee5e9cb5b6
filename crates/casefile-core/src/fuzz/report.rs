//! Report types for fuzz target runs.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use casefile_types::ArgValue;

use crate::runner::Outcome;

/// Complete report from a fuzz run, attached to the case result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FuzzReport {
    /// Target identity (`suite/name`).
    pub target: String,
    /// Random seed used for generation.
    pub seed: u64,
    /// Generated or mutated inputs executed.
    pub iterations_run: u64,
    /// Declared seed tuples executed.
    pub seeds_run: u64,
    /// Saved corpus entries replayed before the seeds.
    pub replayed: u64,
    /// Elapsed time in milliseconds.
    pub elapsed_ms: u64,
    /// First failing input, minimized.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure: Option<FuzzFailure>,
}

impl FuzzReport {
    pub fn inputs_run(&self) -> u64 {
        self.replayed + self.seeds_run + self.iterations_run
    }
}

/// The input that stopped the loop.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FuzzFailure {
    /// Index of the failing input within the run.
    pub attempt: u64,
    pub outcome: Outcome,
    pub message: String,
    /// Input as first observed.
    pub original: Vec<ArgValue>,
    /// Input after shrinking; reproduces the same outcome.
    pub minimized: Vec<ArgValue>,
    pub shrink_attempts: usize,
    /// Where the minimized input was saved, if a corpus root is set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub corpus_path: Option<PathBuf>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_serialization() {
        let report = FuzzReport {
            target: "codec/parse".into(),
            seed: 9,
            iterations_run: 10,
            seeds_run: 2,
            replayed: 1,
            elapsed_ms: 5,
            failure: Some(FuzzFailure {
                attempt: 4,
                outcome: Outcome::Failed,
                message: "bad".into(),
                original: vec![ArgValue::Int(300)],
                minimized: vec![ArgValue::Int(256)],
                shrink_attempts: 12,
                corpus_path: None,
            }),
        };
        assert_eq!(report.inputs_run(), 13);
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["failure"]["outcome"], "failed");
        assert!(json["failure"].get("corpus_path").is_none());
    }
}
