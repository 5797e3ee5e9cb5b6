//! Per-suite baseline store.
//!
//! Only Baseline executions write; Benchmark and Jitter cases read the
//! entry of their suite to compute a delta.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use casefile_types::CaseId;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BaselineEntry {
    /// The Baseline case that recorded the entry.
    pub recorded_by: CaseId,
    pub median_ns: f64,
    pub stddev_ns: f64,
    pub recorded_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BaselineConfig {
    /// Store loaded before and written after the run.
    pub file: Option<std::path::PathBuf>,
    /// Re-measure Baseline cases even when the store has their entry.
    pub refresh: bool,
    /// A Benchmark/Jitter median slower than the baseline by more than
    /// this percentage fails.
    pub regression_threshold_pct: Option<f64>,
}

/// Delta of a measured case against its suite's baseline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BaselineComparison {
    pub baseline_case: CaseId,
    pub baseline_median_ns: f64,
    pub median_ns: f64,
    /// `(median - baseline) / baseline * 100`; positive means slower.
    pub delta_pct: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stddev_delta_pct: Option<f64>,
}

impl BaselineComparison {
    pub fn new(entry: &BaselineEntry, median_ns: f64, stddev_ns: Option<f64>) -> Self {
        Self {
            baseline_case: entry.recorded_by.clone(),
            baseline_median_ns: entry.median_ns,
            median_ns,
            delta_pct: delta_pct(entry.median_ns, median_ns),
            stddev_delta_pct: stddev_ns.map(|sd| delta_pct(entry.stddev_ns, sd)),
        }
    }

    pub fn exceeds(&self, threshold_pct: f64) -> bool {
        self.delta_pct > threshold_pct
    }
}

fn delta_pct(base: f64, value: f64) -> f64 {
    if base > 0.0 {
        (value - base) / base * 100.0
    } else {
        0.0
    }
}

/// Baseline entries keyed by suite.
#[derive(Debug, Default)]
pub struct BaselineStore {
    entries: RwLock<BTreeMap<String, BaselineEntry>>,
}

impl BaselineStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a store file. A missing file is an empty store.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            debug!(path = %path.display(), "no baseline file yet");
            return Ok(Self::new());
        }
        let data = fs::read_to_string(path)
            .with_context(|| format!("Failed to read baseline file {}", path.display()))?;
        let entries: BTreeMap<String, BaselineEntry> = serde_json::from_str(&data)
            .with_context(|| format!("Failed to parse baseline file {}", path.display()))?;
        info!(path = %path.display(), suites = entries.len(), "loaded baselines");
        Ok(Self {
            entries: RwLock::new(entries),
        })
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)
                    .with_context(|| format!("Failed to create {}", parent.display()))?;
            }
        }
        let json = serde_json::to_string_pretty(&*self.entries.read())?;
        fs::write(path, json)
            .with_context(|| format!("Failed to write baseline file {}", path.display()))?;
        Ok(())
    }

    pub fn get(&self, suite: &str) -> Option<BaselineEntry> {
        self.entries.read().get(suite).cloned()
    }

    /// Stored entry for `suite` if it was recorded by `case`.
    pub fn reusable(&self, suite: &str, case: &CaseId) -> Option<BaselineEntry> {
        self.get(suite).filter(|e| &e.recorded_by == case)
    }

    pub fn record(&self, case: &CaseId, median_ns: f64, stddev_ns: f64) {
        debug!(case = %case, median_ns, "baseline recorded");
        self.entries.write().insert(
            case.suite.clone(),
            BaselineEntry {
                recorded_by: case.clone(),
                median_ns,
                stddev_ns,
                recorded_at: Utc::now(),
            },
        );
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_record_and_compare() {
        let store = BaselineStore::new();
        let base = CaseId::new("hash", "base");
        store.record(&base, 100.0, 5.0);
        let entry = store.get("hash").unwrap();
        let cmp = BaselineComparison::new(&entry, 150.0, Some(10.0));
        assert_eq!(cmp.delta_pct, 50.0);
        assert_eq!(cmp.stddev_delta_pct, Some(100.0));
        assert!(cmp.exceeds(20.0));
        assert!(!cmp.exceeds(60.0));
        assert!(store.reusable("hash", &base).is_some());
        assert!(store.reusable("hash", &CaseId::new("hash", "other")).is_none());
    }

    #[test]
    fn test_save_and_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("baselines.json");
        let store = BaselineStore::new();
        store.record(&CaseId::new("s", "b"), 42.0, 1.0);
        store.save(&path).unwrap();

        let loaded = BaselineStore::load(&path).unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded.get("s").unwrap().median_ns, 42.0);
        assert!(BaselineStore::load(&dir.path().join("missing.json")).unwrap().is_empty());
    }
}
