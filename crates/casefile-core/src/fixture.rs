//! Fixtures and their scoped acquisition.
//!
//! Every acquired fixture is owned by a guard whose `Drop` runs
//! `tear_down`, so release happens on every exit path: normal return,
//! failure, panic, or an abandoned (timed-out) invocation finishing later.

use std::any::Any;
use std::collections::BTreeMap;
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Mutex, MutexGuard};
use tracing::debug;

/// A resource set up for one or more cases.
pub trait Fixture: Send + 'static {
    fn set_up(&mut self) -> Result<(), String> {
        Ok(())
    }

    fn tear_down(&mut self) {}

    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl dyn Fixture {
    /// Downcast to the concrete fixture type.
    pub fn downcast_mut<T: Fixture>(&mut self) -> Option<&mut T> {
        self.as_any_mut().downcast_mut::<T>()
    }
}

/// Creates a fresh, not yet set up, fixture instance.
pub type FixtureFactory = Arc<dyn Fn() -> Box<dyn Fixture> + Send + Sync>;

/// A named factory contributed by a registration unit.
#[derive(Clone)]
pub struct FixtureRegistration {
    pub name: String,
    pub factory: FixtureFactory,
}

impl FixtureRegistration {
    pub fn new<F>(name: impl Into<String>, factory: F) -> Self
    where
        F: Fn() -> Box<dyn Fixture> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            factory: Arc::new(factory),
        }
    }
}

impl fmt::Debug for FixtureRegistration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FixtureRegistration")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

/// Fixture factories by name.
pub type FixtureTable = BTreeMap<String, FixtureFactory>;

/// An acquired fixture; tears down when dropped.
pub struct FixtureGuard {
    name: String,
    inner: Option<Box<dyn Fixture>>,
}

impl FixtureGuard {
    /// Create and set up a fixture. Panics in the factory or in `set_up`
    /// are reported as acquisition errors.
    pub fn acquire(name: &str, table: &FixtureTable) -> Result<Self, String> {
        let factory = table
            .get(name)
            .ok_or_else(|| format!("fixture `{}` is not registered", name))?;
        let mut instance = catch_unwind(AssertUnwindSafe(|| factory()))
            .map_err(|p| format!("fixture `{}` factory panicked: {}", name, panic_message(&*p)))?;
        match catch_unwind(AssertUnwindSafe(|| instance.set_up())) {
            Ok(Ok(())) => {}
            Ok(Err(e)) => return Err(format!("fixture `{}` set_up failed: {}", name, e)),
            Err(p) => {
                return Err(format!(
                    "fixture `{}` set_up panicked: {}",
                    name,
                    panic_message(&*p)
                ))
            }
        }
        debug!(fixture = name, "fixture acquired");
        Ok(Self {
            name: name.to_string(),
            inner: Some(instance),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn fixture_mut(&mut self) -> Option<&mut (dyn Fixture + 'static)> {
        self.inner.as_deref_mut()
    }
}

impl Drop for FixtureGuard {
    fn drop(&mut self) {
        if let Some(mut instance) = self.inner.take() {
            if catch_unwind(AssertUnwindSafe(|| instance.tear_down())).is_err() {
                tracing::warn!(fixture = %self.name, "fixture tear_down panicked");
            }
            debug!(fixture = %self.name, "fixture released");
        }
    }
}

/// A per-suite fixture shared by the serial members of one group.
///
/// Holders clone the `Arc`; teardown runs when the last clone drops, which
/// is after the group finishes or after an abandoned invocation returns.
pub struct SharedFixture {
    guard: Mutex<FixtureGuard>,
}

impl SharedFixture {
    pub fn acquire(name: &str, table: &FixtureTable) -> Result<Arc<Self>, String> {
        FixtureGuard::acquire(name, table).map(|guard| {
            Arc::new(Self {
                guard: Mutex::new(guard),
            })
        })
    }

    /// Exclusive access, waiting at most `wait` when a previous holder is
    /// still running.
    pub fn lock(&self, wait: Option<Duration>) -> Option<MutexGuard<'_, FixtureGuard>> {
        match wait {
            Some(w) => self.guard.try_lock_for(w),
            None => Some(self.guard.lock()),
        }
    }
}

pub fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
