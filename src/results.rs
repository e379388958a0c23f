//! Final results: pass/fail counts and the per-test result lines

use crate::registry::Registry;
use crate::reporter::Reporter;
use serde::Serialize;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    /// Registered tests
    pub total: usize,
    /// Tests that reached a terminal state
    pub run: usize,
    pub passed: usize,
    pub failed: usize,
}

impl RunSummary {
    pub fn all_passed(&self) -> bool {
        self.failed == 0
    }

    /// Process exit code for a host: 0 when everything passed
    pub fn exit_code(&self) -> i32 {
        if self.all_passed() {
            0
        } else {
            1
        }
    }
}

pub fn summarize(registry: &Registry, run: usize) -> RunSummary {
    let failed = registry.iter().filter(|record| record.failed()).count();
    RunSummary {
        total: registry.len(),
        run,
        passed: registry.len() - failed,
        failed,
    }
}

/// Report one result per test, then the totals. Returns true iff no test failed.
pub fn show_results(registry: &Registry, reporter: &mut dyn Reporter) -> bool {
    let mut failed = 0usize;
    for record in registry.iter() {
        if record.failed() {
            failed += 1;
            reporter.on_result(record.name(), Some(record.message()));
        } else {
            reporter.on_result(record.name(), None);
        }
    }
    reporter.on_run_finished(registry.len() - failed, failed);
    failed == 0
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::Engine;
    use crate::reporter::CaptureReporter;

    #[test]
    fn test_all_passed_summary() {
        let mut registry = Registry::new();
        registry.register_fn("one", |_cx| {});
        registry.register_fn("two", |_cx| {});
        let capture = CaptureReporter::new();
        let mut engine = Engine::new(registry).with_reporter(Box::new(capture.clone()));
        while !engine.tick() {}

        let summary = engine.summary();
        assert_eq!(summary.run, 2);
        assert_eq!(summary.passed, 2);
        assert!(summary.all_passed());
        assert_eq!(summary.exit_code(), 0);

        assert!(engine.show_results());
        assert_eq!(capture.result_lines(), vec!["PASSED: one", "PASSED: two"]);
    }

    #[test]
    fn test_failure_adds_trailer() {
        let mut registry = Registry::new();
        registry.register_fn("bad", |cx| cx.fail("nope"));
        let capture = CaptureReporter::new();
        let mut engine = Engine::new(registry).with_reporter(Box::new(capture.clone()));
        while !engine.tick() {}

        assert!(!engine.show_results());
        assert_eq!(
            capture.result_lines(),
            vec!["FAILED: bad: nope", " ******** 1 Tests Failed ********"]
        );
        assert_eq!(engine.summary().exit_code(), 1);
    }
}
