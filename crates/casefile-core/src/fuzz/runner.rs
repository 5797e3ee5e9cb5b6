//! Fuzzing execution loop.
//!
//! Replays saved failures, then the declared seeds, then runs generated or
//! mutated inputs until the iteration budget is spent or an input fails.
//! A failing input is shrunk and written back to the corpus.

use std::path::PathBuf;
use std::time::{Duration, Instant};

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use casefile_types::{format_tuple, ArgValue};

use super::corpus::{Corpus, CorpusEntry};
use super::report::{FuzzFailure, FuzzReport};
use super::shrink::shrink;
use super::value_gen::ValueGenerator;
use crate::case::FuzzSpec;
use crate::runner::Outcome;

pub const DEFAULT_PER_INPUT_TIMEOUT_MS: u64 = 1000;

/// Share of generated inputs derived from a corpus entry instead of drawn
/// fresh.
const MUTATION_RATE: f64 = 0.25;

/// Configuration for a fuzz run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FuzzConfig {
    /// Number of generated inputs to run.
    pub iterations: u64,
    /// Random seed for reproducibility.
    pub seed: u64,
    /// Maximum length for generated strings and byte buffers.
    pub max_len: usize,
    /// Per-input timeout; 1000 ms when unset.
    pub per_input_timeout_ms: Option<u64>,
    /// Maximum number of shrink attempts per failure.
    pub shrink_budget: usize,
    /// Corpus directory; nothing is replayed or saved when unset.
    pub corpus_root: Option<PathBuf>,
}

impl Default for FuzzConfig {
    fn default() -> Self {
        Self {
            iterations: 1000,
            seed: 0,
            max_len: 64,
            per_input_timeout_ms: None,
            shrink_budget: 256,
            corpus_root: None,
        }
    }
}

impl FuzzConfig {
    pub fn per_input_timeout(&self) -> Duration {
        Duration::from_millis(
            self.per_input_timeout_ms
                .unwrap_or(DEFAULT_PER_INPUT_TIMEOUT_MS),
        )
    }
}

/// Outcome of running the target on one input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Probe {
    pub outcome: Outcome,
    pub message: String,
}

impl Probe {
    pub fn passed() -> Self {
        Self {
            outcome: Outcome::Passed,
            message: String::new(),
        }
    }

    pub fn new(outcome: Outcome, message: impl Into<String>) -> Self {
        Self {
            outcome,
            message: message.into(),
        }
    }
}

#[derive(Clone, Copy)]
enum Stage {
    Replay,
    Seed,
    Generated,
}

/// Runs one fuzz target.
pub struct FuzzRunner<'a> {
    target: &'a str,
    spec: &'a FuzzSpec,
    config: &'a FuzzConfig,
}

impl<'a> FuzzRunner<'a> {
    pub fn new(target: &'a str, spec: &'a FuzzSpec, config: &'a FuzzConfig) -> Self {
        Self {
            target,
            spec,
            config,
        }
    }

    /// Run the loop. `probe` executes the target on an argument tuple; its
    /// second argument is the attempt index of that execution.
    pub fn run<F>(&self, mut probe: F) -> FuzzReport
    where
        F: FnMut(&[ArgValue], u64) -> Probe,
    {
        let start = Instant::now();
        let corpus = self
            .config
            .corpus_root
            .as_deref()
            .map(|root| Corpus::new(root, self.target));
        let arity = self.spec.inputs.len();

        let replay: Vec<Vec<ArgValue>> = corpus
            .as_ref()
            .map(|c| c.load())
            .unwrap_or_default()
            .into_iter()
            .map(|e| e.args)
            .filter(|args| args.len() == arity)
            .collect();
        if let Some(c) = &corpus {
            if !self.spec.seeds.is_empty() {
                if let Err(e) = c.save_seeds(&self.spec.seeds) {
                    warn!(target = self.target, error = %e, "failed to write seeds");
                }
            }
        }

        let mut report = FuzzReport {
            target: self.target.to_string(),
            seed: self.config.seed,
            iterations_run: 0,
            seeds_run: 0,
            replayed: 0,
            elapsed_ms: 0,
            failure: None,
        };
        let mut pool: Vec<Vec<ArgValue>> = replay.clone();
        pool.extend(self.spec.seeds.iter().cloned());

        let mut gen = ValueGenerator::new(self.config.seed, self.config.max_len);
        let mut schedule = StdRng::seed_from_u64(self.config.seed ^ 0x5eed_f022);
        let mut attempt = 0u64;

        let fixed = replay
            .into_iter()
            .map(|a| (Stage::Replay, a))
            .chain(self.spec.seeds.iter().cloned().map(|a| (Stage::Seed, a)));
        let generated = (0..self.config.iterations).map(|_| {
            let args = match pool.choose(&mut schedule) {
                Some(base) if schedule.gen_bool(MUTATION_RATE) => gen.mutate(&self.spec.inputs, base),
                _ => gen.generate_tuple(&self.spec.inputs),
            };
            (Stage::Generated, args)
        });

        let mut failing: Option<(u64, Vec<ArgValue>, Probe)> = None;
        for (stage, args) in fixed.chain(generated) {
            let result = probe(&args, attempt);
            match stage {
                Stage::Replay => report.replayed += 1,
                Stage::Seed => report.seeds_run += 1,
                Stage::Generated => report.iterations_run += 1,
            }
            if result.outcome.is_failure() {
                debug!(target = self.target, attempt, args = %format_tuple(&args), "fuzz input failed");
                failing = Some((attempt, args, result));
                break;
            }
            attempt += 1;
        }

        if let Some((failed_at, original, first)) = failing {
            let mut shrink_attempt = failed_at;
            let class = first.outcome;
            let shrunk = shrink(
                &self.spec.inputs,
                original.clone(),
                self.config.shrink_budget,
                |trial| {
                    shrink_attempt += 1;
                    probe(trial, shrink_attempt).outcome == class
                },
            );
            // Message of the minimized input, which may differ in detail.
            let message = if shrunk.minimized == original {
                first.message.clone()
            } else {
                shrink_attempt += 1;
                let again = probe(&shrunk.minimized, shrink_attempt);
                if again.outcome == class {
                    again.message
                } else {
                    first.message.clone()
                }
            };
            let corpus_path = corpus.as_ref().and_then(|c| {
                let entry = CorpusEntry {
                    args: shrunk.minimized.clone(),
                    outcome: class,
                    message: message.clone(),
                };
                match c.save_failure(&entry) {
                    Ok(path) => Some(path),
                    Err(e) => {
                        warn!(target = self.target, error = %e, "failed to save corpus entry");
                        None
                    }
                }
            });
            info!(
                target = self.target,
                attempt = failed_at,
                minimized = %format_tuple(&shrunk.minimized),
                shrink_attempts = shrunk.attempts,
                "fuzz target failed"
            );
            report.failure = Some(FuzzFailure {
                attempt: failed_at,
                outcome: class,
                message,
                original,
                minimized: shrunk.minimized,
                shrink_attempts: shrunk.attempts,
                corpus_path,
            });
        }

        report.elapsed_ms = start.elapsed().as_millis() as u64;
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::case::{FuzzInput, InputSource};
    use crate::domain::ResolvedDomain;
    use casefile_types::{ParamType, ScalarType};
    use tempfile::TempDir;

    fn int_spec(seeds: Vec<Vec<ArgValue>>) -> FuzzSpec {
        FuzzSpec {
            inputs: vec![FuzzInput {
                param_index: 0,
                name: "n".into(),
                source: InputSource::Domain {
                    ty: ParamType::Scalar(ScalarType::I32),
                    descriptor: "in_range(0, 100000)".into(),
                    domain: ResolvedDomain::Int {
                        min: 0,
                        max: 100_000,
                        exclude_zero: false,
                    },
                },
            }],
            seeds,
        }
    }

    fn config(iterations: u64) -> FuzzConfig {
        FuzzConfig {
            iterations,
            seed: 11,
            ..Default::default()
        }
    }

    #[test]
    fn test_seeds_run_before_generation() {
        let spec = int_spec(vec![vec![ArgValue::Int(5)], vec![ArgValue::Int(6)]]);
        let cfg = config(10);
        let mut seen = Vec::new();
        let report = FuzzRunner::new("s/t", &spec, &cfg).run(|args, _| {
            seen.push(args[0].clone());
            Probe::passed()
        });
        assert_eq!(&seen[..2], &[ArgValue::Int(5), ArgValue::Int(6)]);
        assert_eq!(report.seeds_run, 2);
        assert_eq!(report.iterations_run, 10);
        assert!(report.failure.is_none());
    }

    #[test]
    fn test_failure_is_shrunk_and_saved() {
        let dir = TempDir::new().unwrap();
        let spec = int_spec(vec![vec![ArgValue::Int(90_000)]]);
        let cfg = FuzzConfig {
            corpus_root: Some(dir.path().to_path_buf()),
            ..config(0)
        };
        let check = |args: &[ArgValue], _: u64| {
            if args[0].as_int().unwrap_or(0) >= 1000 {
                Probe::new(Outcome::Failed, "too big")
            } else {
                Probe::passed()
            }
        };
        let report = FuzzRunner::new("s/t", &spec, &cfg).run(check);
        let failure = report.failure.unwrap();
        assert_eq!(failure.attempt, 0);
        assert_eq!(failure.original, vec![ArgValue::Int(90_000)]);
        assert_eq!(failure.minimized, vec![ArgValue::Int(1000)]);
        assert!(failure.corpus_path.as_ref().unwrap().exists());
        assert!(dir.path().join("s_t").join("seeds.json").exists());

        // The saved failure is replayed first on the next run.
        let spec = int_spec(Vec::new());
        let mut first = None;
        let report = FuzzRunner::new("s/t", &spec, &cfg).run(|args, attempt| {
            if attempt == 0 {
                first = Some(args.to_vec());
            }
            check(args, attempt)
        });
        assert_eq!(report.replayed, 1);
        assert_eq!(first, Some(vec![ArgValue::Int(1000)]));
    }

    #[test]
    fn test_same_seed_same_inputs() {
        let spec = int_spec(Vec::new());
        let cfg = config(50);
        let mut a = Vec::new();
        let mut b = Vec::new();
        FuzzRunner::new("t", &spec, &cfg).run(|x, _| {
            a.push(x.to_vec());
            Probe::passed()
        });
        FuzzRunner::new("t", &spec, &cfg).run(|x, _| {
            b.push(x.to_vec());
            Probe::passed()
        });
        assert_eq!(a, b);
    }
}
