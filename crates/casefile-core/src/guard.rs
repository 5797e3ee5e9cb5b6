//! Isolated invocation with panic capture and a wall-clock timeout.
//!
//! Each call runs on its own named thread. On timeout the thread is
//! abandoned: the caller moves on and whatever the call owns is dropped
//! when it eventually returns.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use tracing::warn;

use crate::fixture::panic_message;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallOutcome<T> {
    Returned(T),
    Panicked(String),
    TimedOut,
}

impl<T> CallOutcome<T> {
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> CallOutcome<U> {
        match self {
            CallOutcome::Returned(v) => CallOutcome::Returned(f(v)),
            CallOutcome::Panicked(m) => CallOutcome::Panicked(m),
            CallOutcome::TimedOut => CallOutcome::TimedOut,
        }
    }
}

/// Run `f` on a dedicated thread named `label`.
pub fn guarded_call<F, T>(label: &str, timeout: Option<Duration>, f: F) -> CallOutcome<T>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    let (tx, rx) = mpsc::channel();
    let spawned = thread::Builder::new()
        .name(thread_name(label))
        .spawn(move || {
            let result = catch_unwind(AssertUnwindSafe(f));
            // The receiver is gone when the caller already timed out.
            let _ = tx.send(result);
        });
    if let Err(e) = spawned {
        return CallOutcome::Panicked(format!("failed to spawn case thread: {}", e));
    }

    let received = match timeout {
        Some(limit) => match rx.recv_timeout(limit) {
            Ok(r) => r,
            Err(mpsc::RecvTimeoutError::Timeout) => {
                warn!(case = label, timeout_ms = limit.as_millis() as u64, "case timed out, abandoning its thread");
                return CallOutcome::TimedOut;
            }
            Err(mpsc::RecvTimeoutError::Disconnected) => {
                return CallOutcome::Panicked("case thread exited without a result".to_string())
            }
        },
        None => match rx.recv() {
            Ok(r) => r,
            Err(_) => {
                return CallOutcome::Panicked("case thread exited without a result".to_string())
            }
        },
    };
    match received {
        Ok(value) => CallOutcome::Returned(value),
        Err(payload) => CallOutcome::Panicked(panic_message(&*payload)),
    }
}

/// Thread names cannot contain NUL; control characters become `_`.
fn thread_name(label: &str) -> String {
    let mut name: String = label
        .chars()
        .take(48)
        .map(|c| if c.is_control() { '_' } else { c })
        .collect();
    if name.is_empty() {
        name.push_str("casefile-case");
    }
    name
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_returned() {
        assert_eq!(guarded_call("t", None, || 7), CallOutcome::Returned(7));
    }

    #[test]
    fn test_panic_is_captured() {
        let out: CallOutcome<()> = guarded_call("t", None, || panic!("boom"));
        assert_eq!(out, CallOutcome::Panicked("boom".to_string()));
    }

    #[test]
    fn test_label_with_nul_still_spawns() {
        assert_eq!(thread_name("io/read\0x"), "io/read_x");
        assert_eq!(thread_name(""), "casefile-case");
        assert_eq!(guarded_call("bad\0label", None, || 3), CallOutcome::Returned(3));
    }

    #[test]
    fn test_timeout() {
        let out = guarded_call("slow", Some(Duration::from_millis(20)), || {
            thread::sleep(Duration::from_millis(500));
        });
        assert_eq!(out, CallOutcome::TimedOut);
    }
}
