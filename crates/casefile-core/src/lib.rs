//! Casefile Core
//!
//! Declarative test, fuzz and benchmark registration and execution.
//!
//! Declarations (annotations plus a structural shape of the annotated
//! function) are validated into [`CaseSpec`]s, bound to a callable, emitted
//! as registration records, aggregated into a [`Registry`] and run.
//!
//! # Core Modules
//!
//! - [`model`]: Known annotation tags and their argument rules
//! - [`validate`]: Declaration validation into a `CaseSpec`
//! - [`domain`]: Fuzz domain descriptors and literal parsing
//! - [`invoke`]: Callable variants and binding against the shape
//! - [`emit`]: Registration records and the two entry adapters
//! - [`registry`]: Cross-unit aggregation and lookup
//! - [`runner`]: Selection, planning, execution and results
//! - [`fuzz`]: Generation, shrinking and the on-disk corpus
//! - [`report`]: Text, JSON and JUnit output
//!
//! # Example
//!
//! ```ignore
//! use casefile_core::{Invoker, Registry, RunConfig, UnitBuilder};
//!
//! let unit = UnitBuilder::new("tests/math")
//!     .case(add_declaration, Invoker::no_arg(|ctx| ctx.require(1 + 1 == 2, "sum")))
//!     .build();
//! let registry = Registry::aggregate(vec![unit])?;
//! let report = casefile_core::runner::run(&registry, &RunConfig::default())?;
//! std::process::exit(report.exit_code());
//! ```

#![allow(clippy::type_complexity)]

pub mod case;
pub mod context;
pub mod domain;
pub mod emit;
pub mod fixture;
pub mod fuzz;
pub mod guard;
pub mod invoke;
pub mod model;
pub mod registry;
pub mod report;
pub mod runner;
pub mod validate;

pub use case::{CaseSpec, FuzzInput, FuzzSpec, InputSource, Signature};
pub use context::{CaseContext, CaseFailure, CaseResult};
pub use domain::{CharClass, ResolvedDomain};
pub use emit::{
    emit, register_module, ModuleEntry, RecordDescriptor, RegistrationRecord, UnitBuilder,
    UnitDiagnostic, UnitRecords,
};
pub use fixture::{Fixture, FixtureFactory, FixtureRegistration};
pub use invoke::{BindError, CallInput, Case, Invoker};
pub use model::{classify, ModelError, Tag};
pub use registry::{detect_collisions, AggregationError, Collision, Contribution, LookupError, Registry};
pub use runner::{
    CaseResultRecord, ExitStatus, Outcome, RunConfig, RunError, RunReport, Selection,
};
pub use validate::{validate, validate_declaration, ValidationError, ValidationErrorKind};

// Re-export the shared types crate
pub use casefile_types;
