//! Reporter Module: the diagnostic output sink
//!
//! The engine never prints on its own. Failure diagnostics, consistency
//! warnings and the final PASSED/FAILED lines all go through a `Reporter`.
//!
//! ## Implementations
//!
//! - `HumanReporter`: plain text, diagnostics to stderr and results to stdout
//! - `JsonReporter`: NDJSON to stdout (for --format=json)
//! - `MultiReporter`: broadcasts to several reporters
//! - `CaptureReporter`: keeps events in memory for hosts and tests
//!
//! When `JsonReporter` is active, ONLY valid JSON goes to stdout.

use crate::context::SourceLocation;
use serde::Serialize;
use std::cell::RefCell;
use std::rc::Rc;

/// Machine-readable events for JSON output
#[derive(Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum MachineEvent<'a> {
    /// Emitted by the first tick
    RunStart { count: usize },
    /// Emitted when a test's entry point is invoked
    TestStart { id: &'a str, index: usize },
    /// Emitted on every `fail`, including repeated ones
    Failure {
        id: &'a str,
        file: &'a str,
        line: u32,
        #[serde(skip_serializing_if = "Option::is_none")]
        message: Option<&'a str>,
    },
    /// Non-fatal engine warning (startup consistency check)
    Warning { message: &'a str },
    /// Emitted when a test reaches a terminal state
    TestFinished {
        id: &'a str,
        status: &'a str, // "pass", "fail"
    },
    /// One line of the final results
    Result {
        id: &'a str,
        status: &'a str,
        #[serde(skip_serializing_if = "Option::is_none")]
        message: Option<&'a str>,
    },
    /// Emitted at the end of the results
    RunFinished { passed: usize, failed: usize },
}

fn status(failed: bool) -> &'static str {
    if failed {
        "fail"
    } else {
        "pass"
    }
}

/// Reporter trait for output abstraction
pub trait Reporter {
    /// Called by the first tick
    fn on_run_start(&mut self, count: usize);

    /// Called when a test's entry point is about to run
    fn on_test_start(&mut self, name: &str, index: usize);

    /// Called on every `fail`
    fn on_failure(&mut self, test: &str, location: &SourceLocation, message: Option<&str>);

    /// Called for non-fatal engine warnings
    fn on_warning(&mut self, message: &str);

    /// Called when a test reaches a terminal state
    fn on_test_finished(&mut self, name: &str, failed: bool);

    /// Called once per test by `show_results`; `failure` is the latched message
    fn on_result(&mut self, name: &str, failure: Option<&str>);

    /// Called at the end of `show_results`
    fn on_run_finished(&mut self, passed: usize, failed: usize);
}

// =============================================================================
// Human Output
// =============================================================================

/// `file:line: error: message`
pub fn format_failure(location: &SourceLocation, message: Option<&str>) -> String {
    format!(
        "{}: error: {}",
        location,
        message.unwrap_or("(unnamed)")
    )
}

/// `PASSED: name` or `FAILED: name: message`
pub fn format_result(name: &str, failure: Option<&str>) -> String {
    match failure {
        Some(message) => format!("FAILED: {}: {}", name, message),
        None => format!("PASSED: {}", name),
    }
}

/// Trailer printed when at least one test failed
pub fn format_trailer(failed: usize) -> String {
    format!(" ******** {} Tests Failed ********", failed)
}

/// Human Reporter - failure lines to stderr, results to stdout
pub struct HumanReporter;

impl Reporter for HumanReporter {
    fn on_run_start(&mut self, _count: usize) {}

    fn on_test_start(&mut self, _name: &str, _index: usize) {}

    fn on_failure(&mut self, _test: &str, location: &SourceLocation, message: Option<&str>) {
        eprintln!("{}", format_failure(location, message));
    }

    fn on_warning(&mut self, message: &str) {
        eprintln!("!! {}", message);
    }

    fn on_test_finished(&mut self, _name: &str, _failed: bool) {}

    fn on_result(&mut self, name: &str, failure: Option<&str>) {
        println!("{}", format_result(name, failure));
    }

    fn on_run_finished(&mut self, _passed: usize, failed: usize) {
        if failed != 0 {
            println!("{}", format_trailer(failed));
        }
    }
}

// =============================================================================
// JSON Output
// =============================================================================

/// JSON Reporter - outputs NDJSON to stdout
pub struct JsonReporter;

impl JsonReporter {
    fn emit(event: &MachineEvent<'_>) {
        match serde_json::to_string(event) {
            Ok(line) => println!("{}", line),
            Err(e) => eprintln!("[frametest] Failed to encode event: {}", e),
        }
    }
}

impl Reporter for JsonReporter {
    fn on_run_start(&mut self, count: usize) {
        Self::emit(&MachineEvent::RunStart { count });
    }

    fn on_test_start(&mut self, name: &str, index: usize) {
        Self::emit(&MachineEvent::TestStart { id: name, index });
    }

    fn on_failure(&mut self, test: &str, location: &SourceLocation, message: Option<&str>) {
        Self::emit(&MachineEvent::Failure {
            id: test,
            file: location.file,
            line: location.line,
            message,
        });
    }

    fn on_warning(&mut self, message: &str) {
        Self::emit(&MachineEvent::Warning { message });
    }

    fn on_test_finished(&mut self, name: &str, failed: bool) {
        Self::emit(&MachineEvent::TestFinished {
            id: name,
            status: status(failed),
        });
    }

    fn on_result(&mut self, name: &str, failure: Option<&str>) {
        Self::emit(&MachineEvent::Result {
            id: name,
            status: status(failure.is_some()),
            message: failure,
        });
    }

    fn on_run_finished(&mut self, passed: usize, failed: usize) {
        Self::emit(&MachineEvent::RunFinished { passed, failed });
    }
}

// =============================================================================
// MultiReporter
// =============================================================================

/// MultiReporter - broadcasts events to multiple reporters
pub struct MultiReporter {
    reporters: Vec<Box<dyn Reporter>>,
}

impl MultiReporter {
    pub fn new(reporters: Vec<Box<dyn Reporter>>) -> Self {
        Self { reporters }
    }
}

impl Reporter for MultiReporter {
    fn on_run_start(&mut self, count: usize) {
        for r in &mut self.reporters {
            r.on_run_start(count);
        }
    }

    fn on_test_start(&mut self, name: &str, index: usize) {
        for r in &mut self.reporters {
            r.on_test_start(name, index);
        }
    }

    fn on_failure(&mut self, test: &str, location: &SourceLocation, message: Option<&str>) {
        for r in &mut self.reporters {
            r.on_failure(test, location, message);
        }
    }

    fn on_warning(&mut self, message: &str) {
        for r in &mut self.reporters {
            r.on_warning(message);
        }
    }

    fn on_test_finished(&mut self, name: &str, failed: bool) {
        for r in &mut self.reporters {
            r.on_test_finished(name, failed);
        }
    }

    fn on_result(&mut self, name: &str, failure: Option<&str>) {
        for r in &mut self.reporters {
            r.on_result(name, failure);
        }
    }

    fn on_run_finished(&mut self, passed: usize, failed: usize) {
        for r in &mut self.reporters {
            r.on_run_finished(passed, failed);
        }
    }
}

// =============================================================================
// CaptureReporter
// =============================================================================

/// Owned copy of a reporter event
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CapturedEvent {
    RunStart(usize),
    TestStart(String, usize),
    Failure {
        test: String,
        location: SourceLocation,
        message: Option<String>,
    },
    Warning(String),
    TestFinished { name: String, failed: bool },
    Result { name: String, failure: Option<String> },
    RunFinished { passed: usize, failed: usize },
}

/// Records every event. Clones share the same event log, so a host can keep
/// one handle and give the other to the engine.
#[derive(Debug, Clone, Default)]
pub struct CaptureReporter {
    events: Rc<RefCell<Vec<CapturedEvent>>>,
}

impl CaptureReporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<CapturedEvent> {
        self.events.borrow().clone()
    }

    /// Failure lines in human format, in the order they were raised
    pub fn failure_lines(&self) -> Vec<String> {
        self.events
            .borrow()
            .iter()
            .filter_map(|event| match event {
                CapturedEvent::Failure {
                    location, message, ..
                } => Some(format_failure(location, message.as_deref())),
                _ => None,
            })
            .collect()
    }

    /// Result lines in human format, trailer included
    pub fn result_lines(&self) -> Vec<String> {
        self.events
            .borrow()
            .iter()
            .filter_map(|event| match event {
                CapturedEvent::Result { name, failure } => {
                    Some(format_result(name, failure.as_deref()))
                }
                CapturedEvent::RunFinished { failed, .. } if *failed != 0 => {
                    Some(format_trailer(*failed))
                }
                _ => None,
            })
            .collect()
    }

    pub fn warnings(&self) -> Vec<String> {
        self.events
            .borrow()
            .iter()
            .filter_map(|event| match event {
                CapturedEvent::Warning(message) => Some(message.clone()),
                _ => None,
            })
            .collect()
    }

    /// Names passed to `on_test_start`, in order
    pub fn started(&self) -> Vec<String> {
        self.events
            .borrow()
            .iter()
            .filter_map(|event| match event {
                CapturedEvent::TestStart(name, _) => Some(name.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn failure_count(&self) -> usize {
        self.events
            .borrow()
            .iter()
            .filter(|event| matches!(event, CapturedEvent::Failure { .. }))
            .count()
    }

    fn push(&self, event: CapturedEvent) {
        self.events.borrow_mut().push(event);
    }
}

impl Reporter for CaptureReporter {
    fn on_run_start(&mut self, count: usize) {
        self.push(CapturedEvent::RunStart(count));
    }

    fn on_test_start(&mut self, name: &str, index: usize) {
        self.push(CapturedEvent::TestStart(name.to_string(), index));
    }

    fn on_failure(&mut self, test: &str, location: &SourceLocation, message: Option<&str>) {
        self.push(CapturedEvent::Failure {
            test: test.to_string(),
            location: *location,
            message: message.map(str::to_string),
        });
    }

    fn on_warning(&mut self, message: &str) {
        self.push(CapturedEvent::Warning(message.to_string()));
    }

    fn on_test_finished(&mut self, name: &str, failed: bool) {
        self.push(CapturedEvent::TestFinished {
            name: name.to_string(),
            failed,
        });
    }

    fn on_result(&mut self, name: &str, failure: Option<&str>) {
        self.push(CapturedEvent::Result {
            name: name.to_string(),
            failure: failure.map(str::to_string),
        });
    }

    fn on_run_finished(&mut self, passed: usize, failed: usize) {
        self.push(CapturedEvent::RunFinished { passed, failed });
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_json_failure_serialization() {
        let event = MachineEvent::Failure {
            id: "Test 1",
            file: "src/sample.rs",
            line: 12,
            message: Some("this should fail"),
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"event\":\"failure\""));
        assert!(json.contains("\"file\":\"src/sample.rs\""));
        assert!(json.contains("\"line\":12"));
        assert!(json.contains("\"message\":\"this should fail\""));
    }

    #[test]
    fn test_json_result_without_message() {
        let event = MachineEvent::Result {
            id: "Test 2",
            status: "pass",
            message: None,
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"event\":\"result\""));
        assert!(!json.contains("message")); // skip_serializing_if = None
    }

    #[test]
    fn test_format_failure_unnamed() {
        let location = SourceLocation::new("a.rs", 3);
        assert_eq!(format_failure(&location, None), "a.rs:3: error: (unnamed)");
        assert_eq!(format_failure(&location, Some("x")), "a.rs:3: error: x");
    }

    #[test]
    fn test_capture_clones_share_events() {
        let capture = CaptureReporter::new();
        let mut handle = capture.clone();
        handle.on_warning("missing declaration for Foo");
        assert_eq!(capture.warnings(), vec!["missing declaration for Foo"]);
    }

    #[test]
    fn test_multi_reporter_broadcasts() {
        let first = CaptureReporter::new();
        let second = CaptureReporter::new();
        let mut multi = MultiReporter::new(vec![Box::new(first.clone()), Box::new(second.clone())]);
        multi.on_result("t", Some("bad"));
        multi.on_run_finished(0, 1);
        assert_eq!(first.result_lines(), second.result_lines());
        assert_eq!(first.result_lines().len(), 2);
    }
}
