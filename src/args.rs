use clap::Parser;
use std::path::PathBuf;

use casefile_core::fuzz::FuzzConfig;
use casefile_core::runner::{
    BaselineConfig, BenchConfig, ExecutionConfig, KindFilter, RunConfig, Selection,
};
use casefile_types::env_utils::{self, env_list, env_path, env_present, env_var};

/// Options of a case runner binary.
#[derive(Debug, Clone, Parser)]
#[command(author, version, about = "Run registered tests, fuzz targets and benchmarks")]
pub struct RunnerArgs {
    /// Only run cases of this suite. Can be provided multiple times.
    #[arg(long, value_name = "SUITE")]
    pub suite: Vec<String>,

    /// Only run cases carrying every listed tag.
    #[arg(long, value_name = "TAG")]
    pub tag: Vec<String>,

    /// Skip cases carrying any of these tags.
    #[arg(long, value_name = "TAG")]
    pub exclude_tag: Vec<String>,

    /// Glob (`*`, `?`) or substring over `suite/name`.
    #[arg(long, value_name = "PATTERN")]
    pub filter: Option<String>,

    /// Run exactly one case (`suite/name` or a unique bare name).
    #[arg(long, value_name = "CASE")]
    pub run: Option<String>,

    /// Case kind: all, test, fuzz, bench, jitter or baseline.
    #[arg(long, default_value = "all")]
    pub kind: KindFilter,

    /// Capability available in this environment (also CASEFILE_CAPABILITIES).
    #[arg(long, value_name = "NAME")]
    pub capability: Vec<String>,

    /// Worker threads (default: CASEFILE_JOBS, else available parallelism).
    #[arg(long, short = 'j')]
    pub jobs: Option<usize>,

    /// Default per-case timeout in milliseconds (also CASEFILE_TIMEOUT_MS).
    #[arg(long)]
    pub timeout_ms: Option<u64>,

    /// Stop scheduling after the first failure.
    #[arg(long)]
    pub fail_fast: bool,

    /// Shuffle free cases and fixture group members.
    #[arg(long)]
    pub shuffle: bool,

    /// Shuffle and fuzz seed (also CASEFILE_SEED).
    #[arg(long)]
    pub seed: Option<u64>,

    /// Run the whole plan this many times.
    #[arg(long, default_value_t = 1)]
    pub repeat: u32,

    /// Generated inputs per fuzz target.
    #[arg(long, default_value_t = 1000)]
    pub fuzz_iterations: u64,

    /// Maximum generated string/byte length.
    #[arg(long, default_value_t = 64)]
    pub fuzz_max_len: usize,

    /// Shrink attempts per fuzz failure.
    #[arg(long, default_value_t = 256)]
    pub shrink_budget: usize,

    /// Corpus directory for minimized failures (also CASEFILE_CORPUS_DIR).
    #[arg(long, value_name = "DIR")]
    pub corpus_dir: Option<PathBuf>,

    /// Minimum duration of one benchmark epoch, in seconds.
    #[arg(long, default_value_t = 0.01)]
    pub min_epoch_time: f64,

    /// Cap on the measuring time of one benchmark, in seconds.
    #[arg(long, default_value_t = 1.0)]
    pub max_total_time: f64,

    /// Measured epochs per benchmark.
    #[arg(long, default_value_t = 12)]
    pub epochs: usize,

    /// Baseline store to load and update (also CASEFILE_BASELINE_FILE).
    #[arg(long, value_name = "PATH")]
    pub baseline_file: Option<PathBuf>,

    /// Re-measure baselines even when a stored one exists.
    #[arg(long)]
    pub refresh_baselines: bool,

    /// Fail benchmarks slower than their baseline by more than PCT percent.
    #[arg(long, value_name = "PCT")]
    pub regression_threshold: Option<f64>,

    /// List the selected cases without running them.
    #[arg(long)]
    pub list: bool,

    /// Print the report (or listing) as JSON.
    #[arg(long)]
    pub json: bool,

    /// Also write a JUnit XML report.
    #[arg(long, value_name = "PATH")]
    pub junit: Option<PathBuf>,

    /// Disable colored output (also NO_COLOR).
    #[arg(long)]
    pub no_color: bool,

    /// Raise log verbosity (-v info, -vv debug).
    #[arg(long, short, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

impl RunnerArgs {
    pub fn color(&self) -> bool {
        !self.no_color && !env_present(env_utils::NO_COLOR)
    }

    /// Runner configuration with environment fallbacks applied.
    pub fn to_run_config(&self) -> RunConfig {
        let mut capabilities: std::collections::BTreeSet<String> =
            self.capability.iter().cloned().collect();
        capabilities.extend(env_list(env_utils::CAPABILITIES));
        let seed = self.seed.or_else(|| env_var(env_utils::SEED));

        RunConfig {
            selection: Selection {
                suites: self.suite.clone(),
                tags: self.tag.clone(),
                exclude_tags: self.exclude_tag.clone(),
                filter: self.filter.clone(),
                run: self.run.clone(),
                kind: self.kind,
                capabilities,
            },
            execution: ExecutionConfig {
                jobs: self
                    .jobs
                    .or_else(|| env_var(env_utils::JOBS))
                    .unwrap_or(0),
                default_timeout_ms: self
                    .timeout_ms
                    .or_else(|| env_var(env_utils::TIMEOUT_MS)),
                fail_fast: self.fail_fast,
                shuffle: self.shuffle,
                seed,
                repeat: self.repeat.max(1),
            },
            bench: BenchConfig {
                min_epoch_time_s: self.min_epoch_time,
                max_total_time_s: self.max_total_time,
                measure_epochs: self.epochs.max(1),
                ..Default::default()
            },
            fuzz: FuzzConfig {
                iterations: self.fuzz_iterations,
                seed: seed.unwrap_or(0),
                max_len: self.fuzz_max_len,
                shrink_budget: self.shrink_budget,
                corpus_root: self
                    .corpus_dir
                    .clone()
                    .or_else(|| env_path(env_utils::CORPUS_DIR)),
                ..Default::default()
            },
            baseline: BaselineConfig {
                file: self
                    .baseline_file
                    .clone()
                    .or_else(|| env_path(env_utils::BASELINE_FILE)),
                refresh: self.refresh_baselines,
                regression_threshold_pct: self.regression_threshold,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flags_map_to_config() {
        let args = RunnerArgs::parse_from([
            "runner",
            "--suite",
            "io",
            "--tag",
            "fast",
            "--kind",
            "benchmark",
            "--capability",
            "gpu",
            "--jobs",
            "3",
            "--seed",
            "17",
            "--repeat",
            "0",
            "--regression-threshold",
            "5",
        ]);
        let cfg = args.to_run_config();
        assert_eq!(cfg.selection.suites, vec!["io".to_string()]);
        assert_eq!(cfg.selection.kind, KindFilter::Bench);
        assert!(cfg.selection.capabilities.contains("gpu"));
        assert_eq!(cfg.execution.jobs, 3);
        assert_eq!(cfg.execution.seed, Some(17));
        assert_eq!(cfg.execution.repeat, 1);
        assert_eq!(cfg.fuzz.seed, 17);
        assert_eq!(cfg.baseline.regression_threshold_pct, Some(5.0));
    }

    #[test]
    fn test_bad_kind_rejected() {
        assert!(RunnerArgs::try_parse_from(["runner", "--kind", "perf"]).is_err());
    }
}
