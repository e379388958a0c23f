//! Execution Context and the abort-to-scheduler mechanism
//!
//! A failing test must stop immediately and hand control back to the engine
//! frame that started it (the `tick` that ran the entry point, or the
//! `resume` that ran a continuation). That transfer is an unwind carrying an
//! `AbortSignal` payload, raised with `resume_unwind` so no panic hook runs,
//! and caught only by `run_armed`.
//!
//! ## Armed Flag
//!
//! At most one abort target may be armed per thread of control. The flag is a
//! thread-local assertion guard, not a lock: arming while armed, failing while
//! disarmed and resuming while armed are programming errors and panic.

use crate::record::RunState;
use crate::reporter::Reporter;
use serde::Serialize;
use std::any::Any;
use std::cell::Cell;
use std::fmt;
use std::panic::{self, AssertUnwindSafe, Location};

thread_local! {
    static ABORT_ARMED: Cell<bool> = const { Cell::new(false) };
}

/// True while an engine frame is ready to catch an abort
pub fn is_armed() -> bool {
    ABORT_ARMED.with(Cell::get)
}

/// Unwind payload used by `Cx::fail`. Only the engine catches it.
#[derive(Debug)]
pub(crate) struct AbortSignal;

/// Keeps the abort target armed; disarms on drop
struct ArmGuard;

impl ArmGuard {
    fn arm() -> Self {
        ABORT_ARMED.with(|armed| {
            assert!(!armed.get(), "abort target armed while already armed");
            armed.set(true);
        });
        ArmGuard
    }
}

impl Drop for ArmGuard {
    fn drop(&mut self) {
        ABORT_ARMED.with(|armed| armed.set(false));
    }
}

/// How an armed call came back to the engine
pub(crate) enum Landing {
    Returned,
    Aborted,
    /// Unwound with something other than an `AbortSignal`
    Panicked(Box<dyn Any + Send + 'static>),
}

/// Arm the abort target, run `f`, disarm.
pub(crate) fn run_armed<F: FnOnce()>(f: F) -> Landing {
    let guard = ArmGuard::arm();
    let result = panic::catch_unwind(AssertUnwindSafe(f));
    drop(guard);

    match result {
        Ok(()) => Landing::Returned,
        Err(payload) if payload.is::<AbortSignal>() => Landing::Aborted,
        Err(payload) => Landing::Panicked(payload),
    }
}

/// Best-effort text of a panic payload
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

// =============================================================================
// Scheduling State
// =============================================================================

/// Cursor and one-shot startup flag owned by the engine
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ExecutionContext {
    /// Index of the record being scheduled; only ever increases
    pub(crate) cursor: usize,
    /// Set by the first `tick`
    pub(crate) started: bool,
}

impl ExecutionContext {
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn started(&self) -> bool {
        self.started
    }

    pub fn armed(&self) -> bool {
        is_armed()
    }
}

// =============================================================================
// Source Locations
// =============================================================================

/// Where a failure was raised
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SourceLocation {
    pub file: &'static str,
    pub line: u32,
}

impl SourceLocation {
    /// Used for failures recorded from a caught panic
    pub const PANIC: SourceLocation = SourceLocation::new("<panic>", 0);

    pub const fn new(file: &'static str, line: u32) -> Self {
        Self { file, line }
    }

    #[track_caller]
    pub fn caller() -> Self {
        Location::caller().into()
    }
}

impl From<&'static Location<'static>> for SourceLocation {
    fn from(location: &'static Location<'static>) -> Self {
        Self::new(location.file(), location.line())
    }
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.file, self.line)
    }
}

// =============================================================================
// Cx: the handle a running test holds
// =============================================================================

/// Handle given to a test body, its startup hook and its continuations.
///
/// A `Cx` only exists inside an armed engine frame, so `fail` always has a
/// target to land on.
pub struct Cx<'a> {
    test_name: &'a str,
    state: &'a mut RunState,
    reporter: &'a mut dyn Reporter,
}

impl<'a> Cx<'a> {
    pub(crate) fn new(
        test_name: &'a str,
        state: &'a mut RunState,
        reporter: &'a mut dyn Reporter,
    ) -> Self {
        Self {
            test_name,
            state,
            reporter,
        }
    }

    pub fn test_name(&self) -> &str {
        self.test_name
    }

    /// Keep the test alive past the current engine call. Each `wait` must be
    /// matched by one `Engine::resume`/`resume_with` before the test completes.
    pub fn wait(&mut self) {
        assert!(is_armed(), "wait called outside a running test");
        self.state.wait_depth += 1;
        tracing::debug!(
            test = self.test_name,
            depth = self.state.wait_depth,
            "test suspended"
        );
    }

    pub fn is_waiting(&self) -> bool {
        self.state.is_waiting()
    }

    pub fn has_failed(&self) -> bool {
        self.state.failed
    }

    /// Fail the current test at the caller's location and abort it.
    #[track_caller]
    pub fn fail(&mut self, message: impl fmt::Display) -> ! {
        let location = SourceLocation::caller();
        self.fail_at(location, Some(format_args!("{}", message)))
    }

    /// Fail the current test and abort back to the engine.
    ///
    /// Only the first failure's message is kept; every call is reported.
    pub fn fail_at(&mut self, location: SourceLocation, message: Option<fmt::Arguments<'_>>) -> ! {
        assert!(is_armed(), "fail called outside a running test");

        let text = message.map(|m| m.to_string());
        if self.state.latch_failure(text.as_deref()) {
            tracing::debug!(test = self.test_name, %location, "test failed");
        }
        self.reporter
            .on_failure(self.test_name, &location, text.as_deref());

        panic::resume_unwind(Box::new(AbortSignal))
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reporter::CaptureReporter;

    #[test]
    fn test_run_armed_returns() {
        assert!(!is_armed());
        let mut seen_armed = false;
        let landing = run_armed(|| seen_armed = is_armed());
        assert!(matches!(landing, Landing::Returned));
        assert!(seen_armed);
        assert!(!is_armed());
    }

    #[test]
    #[allow(unreachable_code)]
    fn test_fail_aborts_and_latches() {
        let mut state = RunState::default();
        let mut reporter = CaptureReporter::new();
        let mut reached = false;

        let landing = run_armed(|| {
            let mut cx = Cx::new("t", &mut state, &mut reporter);
            cx.fail("boom");
            reached = true;
        });

        assert!(matches!(landing, Landing::Aborted));
        assert!(!reached);
        assert!(!is_armed());
        assert!(state.failed);
        assert_eq!(state.message, "boom");
        assert_eq!(reporter.failure_count(), 1);
    }

    #[test]
    fn test_foreign_panic_is_not_an_abort() {
        let landing = run_armed(|| {
            panic!("plain panic");
        });
        match landing {
            Landing::Panicked(payload) => assert_eq!(panic_message(&*payload), "plain panic"),
            _ => panic!("expected a foreign panic"),
        }
        assert!(!is_armed());
    }

    #[test]
    #[should_panic(expected = "already armed")]
    fn test_nested_arm_is_fatal() {
        let _outer = ArmGuard::arm();
        let _inner = ArmGuard::arm();
    }

    #[test]
    fn test_wait_increments_depth() {
        let mut state = RunState::default();
        let mut reporter = CaptureReporter::new();
        run_armed(|| {
            let mut cx = Cx::new("t", &mut state, &mut reporter);
            cx.wait();
            cx.wait();
            assert!(cx.is_waiting());
        });
        assert_eq!(state.wait_depth, 2);
    }

    #[test]
    fn test_caller_location_points_here() {
        let location = SourceLocation::caller();
        assert!(location.file.ends_with("context.rs"));
        assert!(location.line > 0);
        assert_eq!(
            SourceLocation::new("a.rs", 7).to_string(),
            "a.rs:7".to_string()
        );
    }
}
