//! Fuzz loop for typed and raw-bytes fuzz targets.
//!
//! # Architecture
//!
//! - [`value_gen`]: Boundary-heavy value generation per resolved domain
//! - [`shrink`]: Greedy minimization of a failing input
//! - [`corpus`]: Saved failures and seed tuples on disk
//! - [`runner`]: The replay/seed/generate loop
//! - [`report`]: Result types attached to the case result
//!
//! The loop itself is independent of how an input is executed; the case
//! runner passes a probe that invokes the target under the usual
//! fixture, timeout and panic-capture rules.

pub mod corpus;
pub mod report;
pub mod runner;
pub mod shrink;
pub mod value_gen;

pub use corpus::{sanitize_target, Corpus, CorpusEntry};
pub use report::{FuzzFailure, FuzzReport};
pub use runner::{FuzzConfig, FuzzRunner, Probe, DEFAULT_PER_INPUT_TIMEOUT_MS};
pub use shrink::{shrink, ShrinkOutcome};
pub use value_gen::ValueGenerator;
