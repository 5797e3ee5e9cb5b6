//! Casefile
//!
//! Declarative registration of tests, fuzz targets and benchmarks, with a
//! parallel runner and a manifest tool:
//!
//! - **Runner binaries**: register units and call [`runner::run_main`]
//! - **Manifest tool**: `casefile check|emit|list` over scanner manifests
//!
//! The engine lives in [`casefile_core`]; shared data types in
//! [`casefile_types`].

#![allow(clippy::type_complexity)]

pub mod args;
pub mod logging;
pub mod manifest;
pub mod runner;

pub use args::RunnerArgs;
pub use runner::{run_main, run_with_args};

// Re-export the workspace crates
pub use casefile_core;
pub use casefile_types;
