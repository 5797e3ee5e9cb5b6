//! Per-invocation diagnostic sink handed to every case body.

use std::fmt;

use parking_lot::Mutex;

use casefile_types::CaseId;

/// What a case body returns.
pub type CaseResult = Result<(), CaseFailure>;

/// Early exit from a case body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaseFailure {
    Failed(String),
    /// Runtime skip; the case is reported Skipped with this reason.
    Skip(String),
}

impl CaseFailure {
    pub fn failed(message: impl Into<String>) -> Self {
        CaseFailure::Failed(message.into())
    }

    pub fn skip(reason: impl Into<String>) -> Self {
        CaseFailure::Skip(reason.into())
    }
}

impl fmt::Display for CaseFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CaseFailure::Failed(m) => write!(f, "{}", m),
            CaseFailure::Skip(r) => write!(f, "skipped: {}", r),
        }
    }
}

impl std::error::Error for CaseFailure {}

impl From<anyhow::Error> for CaseFailure {
    fn from(err: anyhow::Error) -> Self {
        CaseFailure::Failed(format!("{:#}", err))
    }
}

/// Collects log lines and non-fatal expectation failures of one case.
///
/// Buffers are per case, so output of concurrently running cases is never
/// interleaved.
#[derive(Debug)]
pub struct CaseContext {
    id: CaseId,
    attempt: u32,
    logs: Mutex<Vec<String>>,
    failures: Mutex<Vec<String>>,
}

impl CaseContext {
    pub fn new(id: CaseId, attempt: u32) -> Self {
        Self {
            id,
            attempt,
            logs: Mutex::new(Vec::new()),
            failures: Mutex::new(Vec::new()),
        }
    }

    pub fn id(&self) -> &CaseId {
        &self.id
    }

    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    pub fn log(&self, line: impl Into<String>) {
        self.logs.lock().push(line.into());
    }

    /// Record a failure if `cond` is false and keep going.
    pub fn expect(&self, cond: bool, message: impl Into<String>) -> bool {
        if !cond {
            self.failures.lock().push(message.into());
        }
        cond
    }

    pub fn expect_eq<T: PartialEq + fmt::Debug>(&self, left: T, right: T, what: &str) -> bool {
        let ok = left == right;
        if !ok {
            self.failures
                .lock()
                .push(format!("{}: expected {:?}, got {:?}", what, right, left));
        }
        ok
    }

    /// Fatal check: returns `Err` so the body can bail out with `?`.
    pub fn require(&self, cond: bool, message: impl Into<String>) -> CaseResult {
        if cond {
            Ok(())
        } else {
            Err(CaseFailure::Failed(message.into()))
        }
    }

    pub fn fail(&self, message: impl Into<String>) -> CaseResult {
        Err(CaseFailure::Failed(message.into()))
    }

    pub fn skip(&self, reason: impl Into<String>) -> CaseResult {
        Err(CaseFailure::Skip(reason.into()))
    }

    pub fn has_failures(&self) -> bool {
        !self.failures.lock().is_empty()
    }

    pub fn failures(&self) -> Vec<String> {
        self.failures.lock().clone()
    }

    pub fn logs(&self) -> Vec<String> {
        self.logs.lock().clone()
    }

    /// Drain both buffers, leaving the context reusable.
    pub fn take(&self) -> (Vec<String>, Vec<String>) {
        (
            std::mem::take(&mut *self.logs.lock()),
            std::mem::take(&mut *self.failures.lock()),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expectations_are_non_fatal() {
        let ctx = CaseContext::new(CaseId::new("s", "c"), 0);
        assert!(!ctx.expect(1 + 1 == 3, "math is broken"));
        assert!(ctx.expect_eq(2, 2, "sum"));
        assert!(!ctx.expect_eq(2, 3, "sum"));
        ctx.log("hello");
        assert!(ctx.has_failures());
        assert_eq!(
            ctx.failures(),
            vec!["math is broken".to_string(), "sum: expected 3, got 2".to_string()]
        );
        let (logs, failures) = ctx.take();
        assert_eq!(logs, vec!["hello".to_string()]);
        assert_eq!(failures.len(), 2);
        assert!(!ctx.has_failures());
    }

    #[test]
    fn test_require_and_skip() {
        let ctx = CaseContext::new(CaseId::new("s", "c"), 0);
        assert!(ctx.require(true, "x").is_ok());
        assert_eq!(ctx.require(false, "x"), Err(CaseFailure::Failed("x".into())));
        assert_eq!(ctx.skip("later"), Err(CaseFailure::Skip("later".into())));
    }
}
