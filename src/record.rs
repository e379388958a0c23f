//! Test Records and Entry Points
//!
//! A `TestRecord` pairs a test's identity with the code that runs it and the
//! run-state the engine tracks while it runs.
//!
//! ## Entry Points
//!
//! - `EntryPoint::Factory` builds a fresh `AsyncTest` object every run
//! - `EntryPoint::Function` wraps a plain closure; it is the degenerate
//!   `AsyncTest` whose `startup`/`shutdown` are no-ops

use crate::context::Cx;
use std::fmt;
use std::rc::Rc;

/// A single test. Implement this when the test has startup or shutdown code;
/// plain closures can be registered with `Registry::register_fn`.
pub trait AsyncTest {
    /// Runs before `run`, inside the same abortable frame.
    fn startup(&mut self, _cx: &mut Cx<'_>) {}

    /// Runs once the test reaches a terminal state, outside any abortable frame.
    fn shutdown(&mut self) {}

    /// The test body. Call `cx.wait()` to keep the test alive past this tick.
    fn run(&mut self, cx: &mut Cx<'_>);
}

/// Plain test body
pub type TestFn = dyn Fn(&mut Cx<'_>);

/// Builds a new test object for each run
pub type TestFactory = dyn Fn() -> Box<dyn AsyncTest>;

/// How a test is started
pub enum EntryPoint {
    Function(Rc<TestFn>),
    Factory(Box<TestFactory>),
}

impl EntryPoint {
    /// Build the owned instance the engine drives for one run of the test.
    pub fn instantiate(&self) -> Box<dyn AsyncTest> {
        match self {
            EntryPoint::Function(body) => Box::new(FnTest(Rc::clone(body))),
            EntryPoint::Factory(factory) => factory(),
        }
    }
}

impl fmt::Debug for EntryPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntryPoint::Function(_) => f.write_str("Function"),
            EntryPoint::Factory(_) => f.write_str("Factory"),
        }
    }
}

struct FnTest(Rc<TestFn>);

impl AsyncTest for FnTest {
    fn run(&mut self, cx: &mut Cx<'_>) {
        (self.0)(cx)
    }
}

/// Mutable per-test state
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RunState {
    /// Outstanding `wait()` calls not yet matched by a `resume`
    pub wait_depth: u32,
    pub failed: bool,
    /// Message of the first failure; empty if the test passed
    pub message: String,
}

impl RunState {
    pub fn is_waiting(&self) -> bool {
        self.wait_depth > 0
    }

    /// Latch the failure flag. Only the first call stores its message.
    /// Returns true if this call set the latch.
    pub fn latch_failure(&mut self, message: Option<&str>) -> bool {
        if self.failed {
            return false;
        }
        self.failed = true;
        self.message = message.unwrap_or_default().to_string();
        true
    }
}

/// One registered test
pub struct TestRecord {
    pub(crate) name: String,
    pub(crate) class_name: Option<String>,
    pub(crate) entry: EntryPoint,
    /// Present only while the test is executing or suspended
    pub(crate) instance: Option<Box<dyn AsyncTest>>,
    pub(crate) state: RunState,
}

impl TestRecord {
    pub fn new(name: impl Into<String>, class_name: Option<String>, entry: EntryPoint) -> Self {
        Self {
            name: name.into(),
            class_name,
            entry,
            instance: None,
            state: RunState::default(),
        }
    }

    /// Record for a plain closure test
    pub fn from_fn<F>(name: impl Into<String>, body: F) -> Self
    where
        F: Fn(&mut Cx<'_>) + 'static,
    {
        Self::new(name, None, EntryPoint::Function(Rc::new(body)))
    }

    /// Record for a test object built by `factory` on every run
    pub fn from_factory<F>(name: impl Into<String>, class_name: impl Into<String>, factory: F) -> Self
    where
        F: Fn() -> Box<dyn AsyncTest> + 'static,
    {
        Self::new(
            name,
            Some(class_name.into()),
            EntryPoint::Factory(Box::new(factory)),
        )
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Declared class/category label, if any
    pub fn class_name(&self) -> Option<&str> {
        self.class_name.as_deref()
    }

    pub fn entry_point(&self) -> &EntryPoint {
        &self.entry
    }

    pub fn state(&self) -> &RunState {
        &self.state
    }

    pub fn failed(&self) -> bool {
        self.state.failed
    }

    pub fn message(&self) -> &str {
        &self.state.message
    }

    pub fn wait_depth(&self) -> u32 {
        self.state.wait_depth
    }

    /// True while the engine owns a live instance of this test
    pub fn is_active(&self) -> bool {
        self.instance.is_some()
    }
}

impl fmt::Debug for TestRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TestRecord")
            .field("name", &self.name)
            .field("class_name", &self.class_name)
            .field("entry", &self.entry)
            .field("active", &self.instance.is_some())
            .field("state", &self.state)
            .finish()
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_latch_keeps_first_message() {
        let mut state = RunState::default();
        assert!(state.latch_failure(Some("first")));
        assert!(!state.latch_failure(Some("second")));
        assert!(state.failed);
        assert_eq!(state.message, "first");
    }

    #[test]
    fn test_latch_without_message() {
        let mut state = RunState::default();
        assert!(state.latch_failure(None));
        assert!(state.failed);
        assert!(state.message.is_empty());
    }

    #[test]
    fn test_new_record_is_idle() {
        let record = TestRecord::from_fn("idle", |_cx| {});
        assert_eq!(record.name(), "idle");
        assert_eq!(record.class_name(), None);
        assert_eq!(record.wait_depth(), 0);
        assert!(!record.failed());
        assert!(!record.is_active());
        assert!(matches!(record.entry_point(), EntryPoint::Function(_)));
    }

    #[test]
    fn test_factory_record_keeps_class_name() {
        struct Noop;
        impl AsyncTest for Noop {
            fn run(&mut self, _cx: &mut Cx<'_>) {}
        }

        let record = TestRecord::from_factory("noop", "Noop", || Box::new(Noop));
        assert_eq!(record.class_name(), Some("Noop"));
        assert!(matches!(record.entry_point(), EntryPoint::Factory(_)));
        assert!(format!("{:?}", record).contains("Factory"));
    }
}
