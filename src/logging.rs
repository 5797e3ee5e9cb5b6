//! Logging setup for the binaries.

use tracing_subscriber::EnvFilter;

use casefile_types::env_utils;

fn default_level(verbosity: u8) -> &'static str {
    match verbosity {
        0 => "warn",
        1 => "info",
        _ => "debug",
    }
}

/// Install a stderr fmt subscriber. `CASEFILE_LOG` (an `EnvFilter`
/// directive) overrides the verbosity flags. Calling twice is a no-op.
pub fn init_logging(verbosity: u8) {
    let filter = std::env::var(env_utils::LOG)
        .ok()
        .and_then(|directive| EnvFilter::try_new(directive).ok())
        .unwrap_or_else(|| EnvFilter::new(default_level(verbosity)));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact()
        .try_init();
}
