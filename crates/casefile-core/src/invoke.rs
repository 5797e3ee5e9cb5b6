//! Type-erased case callables.

use std::fmt;
use std::sync::Arc;

use casefile_types::{ArgValue, CaseId};

use crate::case::{CaseSpec, Signature};
use crate::context::{CaseContext, CaseResult};
use crate::fixture::Fixture;

pub type NoArgFn = Arc<dyn Fn(&CaseContext) -> CaseResult + Send + Sync>;
pub type FixtureFn = Arc<dyn Fn(&CaseContext, &mut dyn Fixture) -> CaseResult + Send + Sync>;
pub type BytesFn = Arc<dyn Fn(&CaseContext, &[u8]) -> CaseResult + Send + Sync>;
pub type TypedFn = Arc<dyn Fn(&CaseContext, &[ArgValue]) -> CaseResult + Send + Sync>;

/// One variant per callable shape; dispatch matches exhaustively.
#[derive(Clone)]
pub enum Invoker {
    NoArg(NoArgFn),
    FixtureArg(FixtureFn),
    Bytes(BytesFn),
    TypedArgs(TypedFn),
}

impl Invoker {
    pub fn no_arg<F>(f: F) -> Self
    where
        F: Fn(&CaseContext) -> CaseResult + Send + Sync + 'static,
    {
        Invoker::NoArg(Arc::new(f))
    }

    pub fn fixture<F>(f: F) -> Self
    where
        F: Fn(&CaseContext, &mut dyn Fixture) -> CaseResult + Send + Sync + 'static,
    {
        Invoker::FixtureArg(Arc::new(f))
    }

    pub fn bytes<F>(f: F) -> Self
    where
        F: Fn(&CaseContext, &[u8]) -> CaseResult + Send + Sync + 'static,
    {
        Invoker::Bytes(Arc::new(f))
    }

    pub fn typed<F>(f: F) -> Self
    where
        F: Fn(&CaseContext, &[ArgValue]) -> CaseResult + Send + Sync + 'static,
    {
        Invoker::TypedArgs(Arc::new(f))
    }

    pub fn signature(&self) -> Signature {
        match self {
            Invoker::NoArg(_) => Signature::NoArg,
            Invoker::FixtureArg(_) => Signature::FixtureArg,
            Invoker::Bytes(_) => Signature::Bytes,
            Invoker::TypedArgs(_) => Signature::TypedArgs,
        }
    }
}

impl fmt::Debug for Invoker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Invoker::{:?}", self.signature())
    }
}

/// The input of a single invocation.
#[derive(Debug, Clone, PartialEq)]
pub enum CallInput {
    None,
    Bytes(Vec<u8>),
    Args(Vec<ArgValue>),
}

impl Invoker {
    /// Call the body once.
    ///
    /// A `FixtureArg` body without a fixture, or an input that does not fit
    /// the variant, fails the call instead of panicking.
    pub fn call(
        &self,
        ctx: &CaseContext,
        fixture: Option<&mut dyn Fixture>,
        input: &CallInput,
    ) -> CaseResult {
        match (self, input) {
            (Invoker::NoArg(f), CallInput::None) => f(ctx),
            (Invoker::FixtureArg(f), CallInput::None) => match fixture {
                Some(fx) => f(ctx, fx),
                None => ctx.fail("fixture body invoked without a fixture"),
            },
            (Invoker::Bytes(f), CallInput::Bytes(b)) => f(ctx, b),
            (Invoker::TypedArgs(f), CallInput::Args(a)) => f(ctx, a),
            (inv, input) => ctx.fail(format!(
                "{:?} cannot take input {:?}",
                inv.signature(),
                input
            )),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BindError {
    SignatureMismatch {
        case: CaseId,
        expected: Signature,
        got: Signature,
    },
}

impl fmt::Display for BindError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BindError::SignatureMismatch {
                case,
                expected,
                got,
            } => write!(
                f,
                "case `{}` needs a body of shape {}, got {}",
                case, expected, got
            ),
        }
    }
}

impl std::error::Error for BindError {}

/// A validated case with its callable.
#[derive(Debug, Clone)]
pub struct Case {
    pub spec: CaseSpec,
    pub invoke: Invoker,
}

impl CaseSpec {
    /// Attach the body, checking it has the shape the declaration implies.
    pub fn bind(self, invoke: Invoker) -> Result<Case, BindError> {
        let expected = self.expected_signature();
        if invoke.signature() != expected {
            return Err(BindError::SignatureMismatch {
                case: self.id.clone(),
                expected,
                got: invoke.signature(),
            });
        }
        Ok(Case { spec: self, invoke })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validate::validate;
    use casefile_types::{Annotation, DeclarationShape, ParamType, SourceLocation};

    #[test]
    fn test_bind_checks_signature() {
        let shape = DeclarationShape::free_fn("fuzz_bytes", SourceLocation::new("f.cpp", 3))
            .with_param("data", ParamType::ByteSpan);
        let spec = validate(&[Annotation::new("fuzz").arg("bytes")], &shape).unwrap();
        let err = spec.clone().bind(Invoker::no_arg(|_| Ok(()))).unwrap_err();
        assert!(matches!(
            err,
            BindError::SignatureMismatch {
                expected: Signature::Bytes,
                got: Signature::NoArg,
                ..
            }
        ));
        assert!(spec.bind(Invoker::bytes(|_, _| Ok(()))).is_ok());
    }

    #[test]
    fn test_call_rejects_wrong_input() {
        let ctx = CaseContext::new(CaseId::new("s", "c"), 0);
        let inv = Invoker::typed(|_, args| {
            if args.len() == 2 {
                Ok(())
            } else {
                Err(crate::context::CaseFailure::failed("arity"))
            }
        });
        assert!(inv
            .call(&ctx, None, &CallInput::Args(vec![ArgValue::Int(1), ArgValue::Int(2)]))
            .is_ok());
        assert!(inv.call(&ctx, None, &CallInput::None).is_err());
    }
}
