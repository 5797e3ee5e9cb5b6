//! Environment overrides for runner configuration.
//!
//! Every `CASEFILE_*` variable is optional. Values that fail to parse are
//! treated as unset so a typo never aborts a run.
//!
//! ```
//! use casefile_types::env_utils::{env_var_or, env_list};
//!
//! let jobs: usize = env_var_or("CASEFILE_JOBS", 4);
//! let caps: Vec<String> = env_list("CASEFILE_CAPABILITIES");
//! ```

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

pub const JOBS: &str = "CASEFILE_JOBS";
pub const TIMEOUT_MS: &str = "CASEFILE_TIMEOUT_MS";
pub const CAPABILITIES: &str = "CASEFILE_CAPABILITIES";
pub const SEED: &str = "CASEFILE_SEED";
pub const CORPUS_DIR: &str = "CASEFILE_CORPUS_DIR";
pub const BASELINE_FILE: &str = "CASEFILE_BASELINE_FILE";
pub const LOG: &str = "CASEFILE_LOG";
pub const NO_COLOR: &str = "NO_COLOR";

/// Parse a variable, `None` if unset or unparsable.
pub fn env_var<T: FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.trim().parse().ok())
}

pub fn env_var_or<T: FromStr>(key: &str, default: T) -> T {
    env_var(key).unwrap_or(default)
}

/// `1`, `true`, `yes` or `on`, case-insensitive.
pub fn env_bool(key: &str) -> bool {
    std::env::var(key)
        .ok()
        .map(|v| is_truthy(&v))
        .unwrap_or(false)
}

/// Presence check in the `NO_COLOR` convention: any non-empty value counts.
pub fn env_present(key: &str) -> bool {
    std::env::var(key).map(|v| !v.is_empty()).unwrap_or(false)
}

/// Comma-separated list, empty entries dropped.
pub fn env_list(key: &str) -> Vec<String> {
    std::env::var(key)
        .ok()
        .map(|v| {
            v.split(',')
                .map(|s| s.trim())
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

pub fn env_millis(key: &str) -> Option<Duration> {
    env_var::<u64>(key).map(Duration::from_millis)
}

pub fn env_path(key: &str) -> Option<PathBuf> {
    std::env::var_os(key)
        .filter(|v| !v.is_empty())
        .map(PathBuf::from)
}

fn is_truthy(v: &str) -> bool {
    matches!(
        v.trim().to_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_env_var_parsing() {
        std::env::set_var("CASEFILE_TEST_JOBS", " 8 ");
        assert_eq!(env_var::<usize>("CASEFILE_TEST_JOBS"), Some(8));
        std::env::set_var("CASEFILE_TEST_JOBS", "many");
        assert_eq!(env_var_or::<usize>("CASEFILE_TEST_JOBS", 2), 2);
        std::env::remove_var("CASEFILE_TEST_JOBS");
        assert_eq!(env_var::<usize>("CASEFILE_TEST_JOBS"), None);
    }

    #[test]
    fn test_env_bool() {
        std::env::set_var("CASEFILE_TEST_FLAG", "YES");
        assert!(env_bool("CASEFILE_TEST_FLAG"));
        std::env::set_var("CASEFILE_TEST_FLAG", "off");
        assert!(!env_bool("CASEFILE_TEST_FLAG"));
        std::env::remove_var("CASEFILE_TEST_FLAG");
        assert!(!env_bool("CASEFILE_TEST_FLAG"));
    }

    #[test]
    fn test_env_list_drops_empty_entries() {
        std::env::set_var("CASEFILE_TEST_CAPS", "gpu, ,network,");
        assert_eq!(env_list("CASEFILE_TEST_CAPS"), vec!["gpu", "network"]);
        std::env::remove_var("CASEFILE_TEST_CAPS");
        assert!(env_list("CASEFILE_TEST_CAPS").is_empty());
    }

    #[test]
    fn test_env_millis() {
        std::env::set_var("CASEFILE_TEST_TIMEOUT", "250");
        assert_eq!(
            env_millis("CASEFILE_TEST_TIMEOUT"),
            Some(Duration::from_millis(250))
        );
        std::env::remove_var("CASEFILE_TEST_TIMEOUT");
    }
}
