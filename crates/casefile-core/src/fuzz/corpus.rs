//! On-disk corpus of minimized failures.
//!
//! Layout: `<root>/<sanitized target>/<sha256 prefix>.json` per failure and
//! `<root>/<sanitized target>/seeds.json` for the declared seed tuples.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, warn};

use casefile_types::ArgValue;

use crate::runner::Outcome;

const SEEDS_FILE: &str = "seeds.json";
const HASH_PREFIX_LEN: usize = 16;

/// A saved failing input.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorpusEntry {
    pub args: Vec<ArgValue>,
    pub outcome: Outcome,
    #[serde(default)]
    pub message: String,
}

/// Corpus directory of one target.
#[derive(Debug, Clone)]
pub struct Corpus {
    dir: PathBuf,
}

impl Corpus {
    pub fn new(root: &Path, target: &str) -> Self {
        Self {
            dir: root.join(sanitize_target(target)),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Saved failures in file-name order. Unreadable entries are skipped.
    pub fn load(&self) -> Vec<CorpusEntry> {
        let Ok(read_dir) = fs::read_dir(&self.dir) else {
            return Vec::new();
        };
        let mut paths: Vec<PathBuf> = read_dir
            .filter_map(|e| e.ok().map(|e| e.path()))
            .filter(|p| p.extension().is_some_and(|ext| ext == "json"))
            .filter(|p| p.file_name().is_some_and(|n| n != SEEDS_FILE))
            .collect();
        paths.sort();

        let mut entries = Vec::with_capacity(paths.len());
        for path in paths {
            let parsed = fs::read_to_string(&path)
                .map_err(anyhow::Error::from)
                .and_then(|s| serde_json::from_str::<CorpusEntry>(&s).map_err(anyhow::Error::from));
            match parsed {
                Ok(entry) => entries.push(entry),
                Err(e) => warn!(path = %path.display(), error = %e, "skipping unreadable corpus entry"),
            }
        }
        debug!(dir = %self.dir.display(), entries = entries.len(), "corpus loaded");
        entries
    }

    /// Write a failure; the file name is derived from the argument tuple so
    /// the same input is stored once.
    pub fn save_failure(&self, entry: &CorpusEntry) -> Result<PathBuf> {
        fs::create_dir_all(&self.dir)
            .with_context(|| format!("Failed to create corpus dir {}", self.dir.display()))?;
        let args_json = serde_json::to_vec(&entry.args)?;
        let digest = hex::encode(Sha256::digest(&args_json));
        let path = self
            .dir
            .join(format!("{}.json", &digest[..HASH_PREFIX_LEN]));
        let json = serde_json::to_string_pretty(entry)?;
        fs::write(&path, json)
            .with_context(|| format!("Failed to write corpus entry {}", path.display()))?;
        Ok(path)
    }

    pub fn save_seeds(&self, seeds: &[Vec<ArgValue>]) -> Result<PathBuf> {
        fs::create_dir_all(&self.dir)
            .with_context(|| format!("Failed to create corpus dir {}", self.dir.display()))?;
        let path = self.dir.join(SEEDS_FILE);
        fs::write(&path, serde_json::to_string_pretty(seeds)?)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        Ok(path)
    }
}

/// Replace every character outside `[A-Za-z0-9_.-]` with `_`.
pub fn sanitize_target(target: &str) -> String {
    let s: String = target
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.') {
                c
            } else {
                '_'
            }
        })
        .collect();
    if s.is_empty() || s.chars().all(|c| c == '.') {
        "_".to_string()
    } else {
        s
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_sanitize() {
        assert_eq!(sanitize_target("parse/utf8 decode"), "parse_utf8_decode");
        assert_eq!(sanitize_target(".."), "_");
    }

    #[test]
    fn test_save_and_load() {
        let dir = TempDir::new().unwrap();
        let corpus = Corpus::new(dir.path(), "codec/roundtrip");
        let entry = CorpusEntry {
            args: vec![ArgValue::Int(-3), ArgValue::Str("é".into())],
            outcome: Outcome::Crashed,
            message: "index out of bounds".into(),
        };
        let a = corpus.save_failure(&entry).unwrap();
        let b = corpus.save_failure(&entry).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.file_stem().unwrap().len(), HASH_PREFIX_LEN);
        corpus.save_seeds(&[vec![ArgValue::Int(1)]]).unwrap();
        fs::write(corpus.dir().join("junk.json"), "{not json").unwrap();

        let loaded = corpus.load();
        assert_eq!(loaded, vec![entry]);
        assert!(Corpus::new(dir.path(), "missing").load().is_empty());
    }
}
