//! Integration tests for the tick/wait/resume engine
//!
//! Tests for:
//! - Strict registry-order scheduling
//! - Suspension depth and matching resumes
//! - Abort-on-failure and the first-message latch
//! - Test object lifecycle (startup, run, shutdown)
//! - The four-test sample run end to end

use frametest::reporter::CaptureReporter;
use frametest::{check, check_eq, check_ne, AsyncTest, Cx, Engine, Registry};
use std::cell::RefCell;
use std::rc::Rc;

type Log = Rc<RefCell<Vec<String>>>;
type PendingCallback = Box<dyn FnOnce(&mut Engine)>;
type PendingSlot = Rc<RefCell<Option<PendingCallback>>>;

fn new_log() -> Log {
    Rc::new(RefCell::new(Vec::new()))
}

fn capture_engine(registry: Registry) -> (Engine, CaptureReporter) {
    let capture = CaptureReporter::new();
    let engine = Engine::new(registry).with_reporter(Box::new(capture.clone()));
    (engine, capture)
}

/// Tick until done, firing at most one pending callback between frames
fn drive(engine: &mut Engine, pending: &PendingSlot, max_frames: usize) -> usize {
    let mut frames = 0;
    while !engine.tick() {
        let callback = pending.borrow_mut().take();
        if let Some(callback) = callback {
            callback(engine);
        }
        frames += 1;
        assert!(frames < max_frames, "engine stalled");
    }
    frames
}

// =============================================================================
// Ordering
// =============================================================================

#[test]
fn test_tests_run_in_registration_order() {
    let log = new_log();
    let pending: PendingSlot = Rc::new(RefCell::new(None));
    let mut registry = Registry::new();

    for (i, waits) in [false, true, false, true, false].into_iter().enumerate() {
        let log = Rc::clone(&log);
        let slot = Rc::clone(&pending);
        let name = format!("t{}", i);
        registry.register_fn(name.clone(), move |cx| {
            log.borrow_mut().push(format!("enter {}", name));
            if waits {
                let log = Rc::clone(&log);
                let name = name.clone();
                *slot.borrow_mut() = Some(Box::new(move |engine: &mut Engine| {
                    engine.resume_with(move |_cx| log.borrow_mut().push(format!("resume {}", name)));
                }));
                cx.wait();
            }
        });
    }

    let (mut engine, _capture) = capture_engine(registry);
    drive(&mut engine, &pending, 100);

    assert_eq!(
        *log.borrow(),
        vec![
            "enter t0", "enter t1", "resume t1", "enter t2", "enter t3", "resume t3", "enter t4",
        ]
    );
    assert_eq!(engine.num_tests_run(), 5);
}

#[test]
fn test_suspended_test_blocks_later_tests() {
    let mut registry = Registry::new();
    registry.register_fn("slow", |cx| cx.wait());
    registry.register_fn("fast", |_cx| {});
    let (mut engine, capture) = capture_engine(registry);

    for _ in 0..10 {
        assert!(!engine.tick());
    }
    assert_eq!(capture.started(), vec!["slow"]);
    assert_eq!(engine.num_tests_run(), 0);

    engine.resume();
    assert!(!engine.tick());
    assert!(engine.tick());
    assert_eq!(capture.started(), vec!["slow", "fast"]);
}

#[test]
fn test_sync_test_finishes_within_its_tick() {
    let mut registry = Registry::new();
    registry.register_fn("a", |_cx| {});
    registry.register_fn("b", |_cx| {});
    let (mut engine, _capture) = capture_engine(registry);

    assert!(!engine.tick());
    assert_eq!(engine.num_tests_run(), 1);
    assert!(!engine.tick());
    assert_eq!(engine.num_tests_run(), 2);
    assert!(engine.tick());
}

// =============================================================================
// Suspend / Resume
// =============================================================================

#[test]
fn test_k_waits_need_k_resumes() {
    let mut registry = Registry::new();
    registry.register_fn("triple", |cx| {
        cx.wait();
        cx.wait();
        cx.wait();
    });
    registry.register_fn("after", |_cx| {});
    let (mut engine, _capture) = capture_engine(registry);

    engine.tick();
    assert_eq!(engine.registry().get(0).unwrap().wait_depth(), 3);

    engine.resume();
    assert!(!engine.tick());
    engine.resume();
    assert!(!engine.tick());
    assert!(engine.is_waiting());
    assert_eq!(engine.num_tests_run(), 0);

    engine.resume();
    assert!(!engine.is_waiting());
    assert_eq!(engine.num_tests_run(), 1);
    assert_eq!(engine.current_test_name(), Some("after"));
}

#[test]
fn test_continuation_can_wait_again() {
    let pending: PendingSlot = Rc::new(RefCell::new(None));
    let slot = Rc::clone(&pending);
    let mut registry = Registry::new();
    registry.register_fn("two stage", move |cx| {
        let slot_again = Rc::clone(&slot);
        *slot.borrow_mut() = Some(Box::new(move |engine: &mut Engine| {
            engine.resume_with(move |cx| {
                *slot_again.borrow_mut() = Some(Box::new(|engine: &mut Engine| {
                    engine.resume_with(|cx| check!(cx, !cx.is_waiting(), "last stage still waiting"));
                }));
                cx.wait();
            });
        }));
        cx.wait();
    });
    let (mut engine, _capture) = capture_engine(registry);

    let frames = drive(&mut engine, &pending, 100);
    assert!(frames >= 2);
    assert!(engine.summary().all_passed());
    assert_eq!(engine.num_tests_run(), 1);
}

#[test]
#[should_panic(expected = "not waiting")]
fn test_resume_of_idle_test_is_fatal() {
    let mut registry = Registry::new();
    registry.register_fn("a", |_cx| {});
    registry.register_fn("b", |_cx| {});
    let (mut engine, _capture) = capture_engine(registry);
    engine.tick();
    engine.resume();
}

// =============================================================================
// Failures
// =============================================================================

#[test]
#[allow(unreachable_code)]
fn test_fail_skips_rest_of_test() {
    let log = new_log();
    let inner = Rc::clone(&log);
    let mut registry = Registry::new();
    registry.register_fn("aborts", move |cx| {
        inner.borrow_mut().push("before".to_string());
        cx.fail("stop here");
        inner.borrow_mut().push("after".to_string());
    });
    registry.register_fn("next", |_cx| {});
    let (mut engine, capture) = capture_engine(registry);

    assert!(!engine.tick());
    assert_eq!(*log.borrow(), vec!["before"]);
    assert_eq!(engine.num_tests_run(), 1);
    assert!(!engine.tick());
    assert!(engine.tick());

    let summary = engine.summary();
    assert_eq!(summary.failed, 1);
    assert_eq!(summary.passed, 1);
    assert_eq!(capture.failure_count(), 1);
}

#[test]
fn test_only_first_failure_message_is_kept() {
    let mut registry = Registry::new();
    registry.register_fn("fails twice", |cx| {
        cx.wait();
        cx.fail("first");
    });
    let (mut engine, capture) = capture_engine(registry);

    engine.tick();
    assert!(engine.is_waiting());
    engine.resume_with(|cx| {
        check!(cx, cx.has_failed());
        cx.fail("second");
    });

    let record = engine.registry().get(0).unwrap();
    assert!(record.failed());
    assert_eq!(record.message(), "first");
    // Every call is reported, only the first is latched
    assert_eq!(capture.failure_count(), 2);
    assert!(engine.tick());
}

#[test]
fn test_show_results_counts_failures() {
    let mut registry = Registry::new();
    registry.register_fn("pass", |cx| check_ne!(cx, 1, 2, "differs"));
    registry.register_fn("fail", |cx| check_eq!(cx, 1, 2, "mismatch {}", 42));
    registry.register_fn("pass again", |_cx| {});
    let (mut engine, capture) = capture_engine(registry);
    while !engine.tick() {}

    assert!(!engine.show_results());
    assert_eq!(
        capture.result_lines(),
        vec![
            "PASSED: pass",
            "FAILED: fail: mismatch 42",
            "PASSED: pass again",
            " ******** 1 Tests Failed ********",
        ]
    );
    assert_eq!(engine.summary().failed, 1);
}

#[test]
#[should_panic(expected = "already armed")]
fn test_nested_engine_inside_test_is_fatal() {
    let mut registry = Registry::new();
    registry.register_fn("outer", |_cx| {
        let mut inner = Registry::new();
        inner.register_fn("inner", |_cx| {});
        let mut nested = Engine::new(inner).with_reporter(Box::new(CaptureReporter::new()));
        nested.tick();
    });
    let (mut engine, _capture) = capture_engine(registry);
    engine.tick();
}

#[test]
#[should_panic(expected = "resume called from inside a running test")]
fn test_resume_from_inside_running_test_is_fatal() {
    let mut registry = Registry::new();
    registry.register_fn("outer", |_cx| {
        let mut inner = Registry::new();
        inner.register_fn("inner", |cx| cx.wait());
        let mut nested = Engine::new(inner).with_reporter(Box::new(CaptureReporter::new()));
        nested.resume();
    });
    let (mut engine, _capture) = capture_engine(registry);
    engine.tick();
}

// =============================================================================
// Lifecycle
// =============================================================================

struct Lifecycle {
    log: Log,
    fail_in_startup: bool,
    wait: bool,
}

impl AsyncTest for Lifecycle {
    fn startup(&mut self, cx: &mut Cx<'_>) {
        self.log.borrow_mut().push("startup".to_string());
        if self.fail_in_startup {
            cx.fail("startup failed");
        }
    }

    fn run(&mut self, cx: &mut Cx<'_>) {
        self.log.borrow_mut().push("run".to_string());
        if self.wait {
            cx.wait();
        }
    }

    fn shutdown(&mut self) {
        self.log.borrow_mut().push("shutdown".to_string());
    }
}

impl Drop for Lifecycle {
    fn drop(&mut self) {
        self.log.borrow_mut().push("drop".to_string());
    }
}

fn lifecycle_registry(log: &Log, fail_in_startup: bool, wait: bool) -> Registry {
    let log = Rc::clone(log);
    let mut registry = Registry::new();
    registry.register(frametest::TestRecord::from_factory(
        "lifecycle",
        "Lifecycle",
        move || {
            Box::new(Lifecycle {
                log: Rc::clone(&log),
                fail_in_startup,
                wait,
            })
        },
    ));
    registry
}

#[test]
fn test_lifecycle_order_sync() {
    let log = new_log();
    let (mut engine, _capture) = capture_engine(lifecycle_registry(&log, false, false));
    engine.tick();
    assert_eq!(*log.borrow(), vec!["startup", "run", "shutdown", "drop"]);
    assert!(!engine.registry().get(0).unwrap().is_active());
}

#[test]
fn test_lifecycle_shutdown_after_last_resume() {
    let log = new_log();
    let (mut engine, _capture) = capture_engine(lifecycle_registry(&log, false, true));
    engine.tick();
    engine.tick();
    assert_eq!(*log.borrow(), vec!["startup", "run"]);
    assert!(engine.registry().get(0).unwrap().is_active());

    engine.resume();
    assert_eq!(*log.borrow(), vec!["startup", "run", "shutdown", "drop"]);
    assert!(engine.tick());
}

#[test]
fn test_startup_failure_skips_run_but_shuts_down() {
    let log = new_log();
    let (mut engine, _capture) = capture_engine(lifecycle_registry(&log, true, false));
    engine.tick();
    assert_eq!(*log.borrow(), vec!["startup", "shutdown", "drop"]);
    assert_eq!(engine.registry().get(0).unwrap().message(), "startup failed");
}

// =============================================================================
// End to end
// =============================================================================

#[derive(Default)]
struct FailingSync;

impl AsyncTest for FailingSync {
    fn run(&mut self, cx: &mut Cx<'_>) {
        check_eq!(cx, 1, 2, "this should fail");
        unreachable!("a failed check never returns");
    }
}

#[derive(Default)]
struct PassingSync;

impl AsyncTest for PassingSync {
    fn run(&mut self, cx: &mut Cx<'_>) {
        check_eq!(cx, 2, 2, "this should pass");
    }
}

#[test]
fn test_sample_run_end_to_end() {
    let pending: PendingSlot = Rc::new(RefCell::new(None));
    let mut registry = Registry::new();
    registry.register_type::<FailingSync>("Test 1");
    registry.register_type::<PassingSync>("Test 2");

    let slot = Rc::clone(&pending);
    registry.register_fn("ASync passing test", move |cx| {
        *slot.borrow_mut() = Some(Box::new(|engine: &mut Engine| {
            engine.resume_with(|cx| check_eq!(cx, 3, 3, "should pass (async callback)"));
        }));
        cx.wait();
    });

    let slot = Rc::clone(&pending);
    registry.register_fn("ASync failing test", move |cx| {
        *slot.borrow_mut() = Some(Box::new(|engine: &mut Engine| {
            engine.resume_with(|cx| check_eq!(cx, 3, 2, "this should fail (async callback)"));
        }));
        cx.wait();
    });

    let (mut engine, capture) = capture_engine(registry);
    drive(&mut engine, &pending, 100);

    assert_eq!(engine.num_tests_run(), 4);
    assert!(!engine.show_results());
    assert_eq!(
        capture.result_lines(),
        vec![
            "FAILED: Test 1: this should fail",
            "PASSED: Test 2",
            "PASSED: ASync passing test",
            "FAILED: ASync failing test: this should fail (async callback)",
            " ******** 2 Tests Failed ********",
        ]
    );

    let summary = engine.summary();
    assert_eq!(summary.failed, 2);
    assert_eq!(summary.passed, 2);
    assert_eq!(summary.exit_code(), 1);
    assert_eq!(capture.failure_lines().len(), 2);
}
