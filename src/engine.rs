//! Tick-driven cooperative scheduler
//!
//! The host calls `tick()` once per frame until it returns true. Tests run
//! strictly one at a time in registry order:
//!
//! - `tick` runs the current test's `startup` + `run` inside an armed frame
//! - a test that called `cx.wait()` stays current; later ticks skip it
//! - the host calls `resume`/`resume_with` from its own callbacks, between
//!   ticks, once per `wait`
//! - when the wait depth is back to zero the test is shut down, dropped, and
//!   the cursor moves on
//!
//! A failing test aborts back to the engine frame that ran it and then goes
//! through the same completion path as a passing one.

use crate::config::EngineConfig;
use crate::context::{self, panic_message, run_armed, Cx, ExecutionContext, Landing, SourceLocation};
use crate::record::{RunState, TestRecord};
use crate::registry::Registry;
use crate::reporter::{HumanReporter, Reporter};
use crate::results::{self, RunSummary};
use std::panic;

pub struct Engine {
    registry: Registry,
    context: ExecutionContext,
    reporter: Box<dyn Reporter>,
    /// Record foreign panics in test code as failures instead of re-raising
    catch_panics: bool,
}

impl Engine {
    pub fn new(registry: Registry) -> Self {
        Self {
            registry,
            context: ExecutionContext::default(),
            reporter: Box::new(HumanReporter),
            catch_panics: false,
        }
    }

    /// Build an engine with the reporter, filter and panic policy from `config`
    pub fn with_config(registry: Registry, config: &EngineConfig) -> Self {
        let mut engine = Self::new(registry)
            .with_reporter(config.reporter())
            .catch_panics(config.catch_panics);
        engine.filter(config.filter.as_slice());
        engine
    }

    pub fn with_reporter(mut self, reporter: Box<dyn Reporter>) -> Self {
        self.reporter = reporter;
        self
    }

    pub fn catch_panics(mut self, enabled: bool) -> Self {
        self.catch_panics = enabled;
        self
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn context(&self) -> &ExecutionContext {
        &self.context
    }

    /// Drop the tests that match none of `terms` (see `Registry::filter`).
    ///
    /// # Panics
    ///
    /// If scheduling has already started.
    pub fn filter<S: AsRef<str>>(&mut self, terms: &[S]) {
        assert!(
            !self.context.started,
            "filter applied after the first tick"
        );
        self.registry.filter(terms);
    }

    /// Advance the scheduler by at most one test invocation.
    /// Returns true once every test has finished.
    pub fn tick(&mut self) -> bool {
        if !self.context.started {
            self.context.started = true;
            self.reporter.on_run_start(self.registry.len());
            self.check_consistency();
        }

        let index = self.context.cursor;
        let catch_panics = self.catch_panics;
        let Some(record) = self.registry.get_mut(index) else {
            return true;
        };
        if record.state.is_waiting() {
            return false;
        }

        assert!(
            record.instance.is_none(),
            "test `{}` instantiated while a previous instance is live",
            record.name
        );
        tracing::debug!(test = %record.name, index, "starting test");
        self.reporter.on_test_start(&record.name, index);

        let TestRecord {
            ref name,
            ref entry,
            ref mut instance,
            ref mut state,
            ..
        } = *record;
        let test = instance.insert(entry.instantiate());
        let reporter = &mut *self.reporter;

        let landing = run_armed(|| {
            let mut cx = Cx::new(name, &mut *state, &mut *reporter);
            test.startup(&mut cx);
            test.run(&mut cx);
        });
        settle(landing, name, state, reporter, catch_panics);

        if !record.state.is_waiting() {
            finish(record, &mut *self.reporter);
            self.context.cursor += 1;
        }
        false
    }

    /// Resume the current test without a continuation
    pub fn resume(&mut self) {
        self.resume_inner(None::<fn(&mut Cx<'_>)>);
    }

    /// Resume the current test and run `continuation` as its next piece of
    /// logic. A failure inside `continuation` aborts back here.
    pub fn resume_with<F>(&mut self, continuation: F)
    where
        F: FnOnce(&mut Cx<'_>),
    {
        self.resume_inner(Some(continuation));
    }

    fn resume_inner<F>(&mut self, continuation: Option<F>)
    where
        F: FnOnce(&mut Cx<'_>),
    {
        assert!(
            !context::is_armed(),
            "resume called from inside a running test"
        );

        let index = self.context.cursor;
        let catch_panics = self.catch_panics;
        let Some(record) = self.registry.get_mut(index) else {
            panic!("resume called with no test waiting");
        };
        assert!(
            record.state.is_waiting(),
            "resume called for test `{}` which is not waiting",
            record.name
        );

        record.state.wait_depth -= 1;
        tracing::debug!(
            test = %record.name,
            depth = record.state.wait_depth,
            "test resumed"
        );

        if let Some(continuation) = continuation {
            let TestRecord {
                ref name,
                ref mut state,
                ..
            } = *record;
            let reporter = &mut *self.reporter;

            let landing = run_armed(|| {
                let mut cx = Cx::new(name, &mut *state, &mut *reporter);
                continuation(&mut cx);
            });
            settle(landing, name, state, reporter, catch_panics);
        }

        if !record.state.is_waiting() {
            finish(record, &mut *self.reporter);
            self.context.cursor += 1;
        }
    }

    /// True once every test has reached a terminal state
    pub fn is_finished(&self) -> bool {
        self.context.cursor >= self.registry.len()
    }

    /// Number of tests that reached a terminal state
    pub fn num_tests_run(&self) -> usize {
        self.context.cursor
    }

    /// Whether the current test is suspended
    pub fn is_waiting(&self) -> bool {
        self.registry
            .get(self.context.cursor)
            .is_some_and(|record| record.state.is_waiting())
    }

    pub fn current_test_name(&self) -> Option<&str> {
        self.registry.get(self.context.cursor).map(TestRecord::name)
    }

    /// Pass/fail counts without printing
    pub fn summary(&self) -> RunSummary {
        results::summarize(&self.registry, self.num_tests_run())
    }

    /// Print one line per test through the reporter. Returns true iff no
    /// test failed. Call after `tick` has returned true.
    pub fn show_results(&mut self) -> bool {
        results::show_results(&self.registry, &mut *self.reporter)
    }

    fn check_consistency(&mut self) {
        for finding in self.registry.consistency_findings() {
            tracing::debug!(%finding, "registry consistency check");
            self.reporter.on_warning(&finding.to_string());
        }
    }
}

/// Handle how an armed call came back
fn settle(
    landing: Landing,
    name: &str,
    state: &mut RunState,
    reporter: &mut dyn Reporter,
    catch_panics: bool,
) {
    match landing {
        Landing::Returned => {}
        Landing::Aborted => tracing::debug!(test = name, "test aborted"),
        Landing::Panicked(payload) if catch_panics => {
            let message = format!("panicked: {}", panic_message(&*payload));
            state.latch_failure(Some(&message));
            reporter.on_failure(name, &SourceLocation::PANIC, Some(&message));
        }
        Landing::Panicked(payload) => panic::resume_unwind(payload),
    }
}

/// Shut down and release the instance of a test that reached a terminal state
fn finish(record: &mut TestRecord, reporter: &mut dyn Reporter) {
    if let Some(mut test) = record.instance.take() {
        test.shutdown();
    }
    tracing::debug!(test = %record.name, failed = record.state.failed, "test finished");
    reporter.on_test_finished(&record.name, record.state.failed);
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reporter::{CaptureReporter, CapturedEvent};

    fn engine_with(registry: Registry) -> (Engine, CaptureReporter) {
        let capture = CaptureReporter::new();
        let engine = Engine::new(registry).with_reporter(Box::new(capture.clone()));
        (engine, capture)
    }

    #[test]
    fn test_empty_registry_finishes_immediately() {
        let (mut engine, _capture) = engine_with(Registry::new());
        assert!(engine.tick());
        assert!(engine.tick());
        assert!(engine.is_finished());
        assert_eq!(engine.num_tests_run(), 0);
    }

    #[test]
    fn test_sync_test_completes_in_one_tick() {
        let mut registry = Registry::new();
        registry.register_fn("sync", |_cx| {});
        let (mut engine, _capture) = engine_with(registry);

        assert!(!engine.tick());
        assert_eq!(engine.num_tests_run(), 1);
        assert!(engine.registry().get(0).map_or(false, |r| !r.is_active()));
        assert!(engine.tick());
    }

    #[test]
    fn test_waiting_test_blocks_cursor() {
        let mut registry = Registry::new();
        registry.register_fn("waits", |cx| cx.wait());
        registry.register_fn("after", |_cx| {});
        let (mut engine, capture) = engine_with(registry);

        assert!(!engine.tick());
        assert!(engine.is_waiting());
        assert_eq!(engine.current_test_name(), Some("waits"));
        assert!(engine.registry().get(0).map_or(false, TestRecord::is_active));

        assert!(!engine.tick());
        assert!(!engine.tick());
        assert_eq!(capture.started(), vec!["waits"]);

        engine.resume();
        assert_eq!(engine.num_tests_run(), 1);
        assert!(!engine.is_waiting());
        assert!(!engine.tick());
        assert!(engine.tick());
        assert_eq!(capture.started(), vec!["waits", "after"]);
    }

    #[test]
    fn test_failure_in_continuation_is_latched() {
        let mut registry = Registry::new();
        registry.register_fn("async", |cx| cx.wait());
        let (mut engine, capture) = engine_with(registry);

        engine.tick();
        engine.resume_with(|cx| cx.fail("late failure"));

        let summary = engine.summary();
        assert_eq!(summary.failed, 1);
        assert_eq!(engine.registry().get(0).unwrap().message(), "late failure");
        assert_eq!(capture.failure_count(), 1);
        assert!(engine.tick());
    }

    #[test]
    #[should_panic(expected = "no test waiting")]
    fn test_resume_after_finish_is_fatal() {
        let (mut engine, _capture) = engine_with(Registry::new());
        engine.tick();
        engine.resume();
    }

    #[test]
    #[should_panic(expected = "not waiting")]
    fn test_resume_without_wait_is_fatal() {
        let mut registry = Registry::new();
        registry.register_fn("a", |_cx| {});
        registry.register_fn("b", |_cx| {});
        let (mut engine, _capture) = engine_with(registry);
        engine.tick();
        engine.resume();
    }

    #[test]
    #[should_panic(expected = "after the first tick")]
    fn test_filter_after_start_is_fatal() {
        let (mut engine, _capture) = engine_with(Registry::new());
        engine.tick();
        engine.filter(&["x"]);
    }

    #[test]
    fn test_caught_panic_becomes_failure() {
        let mut registry = Registry::new();
        registry.register_fn("panics", |_cx| panic!("kaboom"));
        registry.register_fn("next", |_cx| {});
        let (engine, capture) = engine_with(registry);
        let mut engine = engine.catch_panics(true);

        while !engine.tick() {}

        let record = engine.registry().get(0).unwrap();
        assert!(record.failed());
        assert_eq!(record.message(), "panicked: kaboom");
        assert_eq!(engine.summary().passed, 1);
        assert!(capture.events().contains(&CapturedEvent::Failure {
            test: "panics".to_string(),
            location: SourceLocation::PANIC,
            message: Some("panicked: kaboom".to_string()),
        }));
    }
}
