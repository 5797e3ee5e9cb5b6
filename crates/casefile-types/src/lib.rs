//! Shared data types for the casefile workspace.
//!
//! These are the plain, serializable records exchanged between the external
//! declaration scanner, the core library, and the command-line tools:
//! annotations, declaration shapes, case identity, and argument values.

pub mod annotation;
pub mod case;
pub mod env_utils;
pub mod manifest;
pub mod shape;
pub mod value;

pub use annotation::{Annotation, AnnotationArg};
pub use case::{CaseId, CaseKind, FixtureLifetime, FixtureRef, ParameterSet, TemplateBinding};
pub use manifest::{Declaration, DeclarationManifest};
pub use shape::{
    DeclarationShape, Param, ParamType, ScalarType, SourceLocation, TemplateParam,
    TemplateParamKind,
};
pub use value::{format_tuple, ArgValue};
