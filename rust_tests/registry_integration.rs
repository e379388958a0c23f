//! Integration tests for registration, filtering and the startup
//! consistency check

use frametest::registry::Finding;
use frametest::reporter::CaptureReporter;
use frametest::{AsyncTest, Cx, Engine, Registry};

#[derive(Default)]
struct Networking;

impl AsyncTest for Networking {
    fn run(&mut self, _cx: &mut Cx<'_>) {}
}

#[derive(Default)]
struct Rendering;

impl AsyncTest for Rendering {
    fn run(&mut self, cx: &mut Cx<'_>) {
        cx.fail("frame dropped");
    }
}

fn mixed_registry() -> Registry {
    let mut registry = Registry::new();
    registry.register_type::<Networking>("connect");
    registry.register_fn("Audio Mixer", |_cx| {});
    registry.register_type::<Rendering>("draw sprites");
    registry.register_fn("network teardown", |_cx| {});
    registry
}

fn capture_engine(registry: Registry) -> (Engine, CaptureReporter) {
    let capture = CaptureReporter::new();
    let engine = Engine::new(registry).with_reporter(Box::new(capture.clone()));
    (engine, capture)
}

#[test]
fn test_filter_preserves_relative_order() {
    let mut registry = mixed_registry();
    registry.filter(&["NETWORK"]);
    // "connect" matches through its class label
    assert_eq!(registry.names(), vec!["connect", "network teardown"]);
}

#[test]
fn test_filter_any_term_matches() {
    let mut registry = mixed_registry();
    registry.filter(&["audio", "sprites"]);
    assert_eq!(registry.names(), vec!["Audio Mixer", "draw sprites"]);
}

#[test]
fn test_filtered_tests_excluded_from_run_and_results() {
    let (mut engine, capture) = capture_engine(mixed_registry());
    engine.filter(&["network"]);
    while !engine.tick() {}

    assert_eq!(capture.started(), vec!["connect", "network teardown"]);
    assert!(engine.show_results());
    assert_eq!(
        capture.result_lines(),
        vec!["PASSED: connect", "PASSED: network teardown"]
    );
    assert_eq!(engine.summary().total, 2);
}

#[test]
fn test_filter_matching_nothing_finishes_immediately() {
    let (mut engine, _capture) = capture_engine(mixed_registry());
    engine.filter(&["does-not-exist"]);
    assert!(engine.tick());
    assert!(engine.show_results());
}

#[test]
fn test_retain_with_custom_predicate() {
    let mut registry = mixed_registry();
    registry.retain(|record| record.class_name().is_none());
    assert_eq!(registry.names(), vec!["Audio Mixer", "network teardown"]);
}

#[test]
fn test_duplicate_names_are_accepted() {
    let mut registry = Registry::new();
    registry.register_fn("same", |_cx| {});
    registry.register_fn("same", |cx| cx.fail("second copy"));
    let (mut engine, capture) = capture_engine(registry);
    while !engine.tick() {}

    assert!(!engine.show_results());
    assert_eq!(
        capture.result_lines(),
        vec![
            "PASSED: same",
            "FAILED: same: second copy",
            " ******** 1 Tests Failed ********",
        ]
    );
}

// =============================================================================
// Startup consistency check
// =============================================================================

#[test]
fn test_consistency_check_reports_on_first_tick_only() {
    let mut registry = mixed_registry();
    registry.register_class_name("Networking");
    registry.register_class_name("Physics");
    let (mut engine, capture) = capture_engine(registry);

    engine.tick();
    engine.tick();
    while !engine.tick() {}

    assert_eq!(
        capture.warnings(),
        vec![
            "missing registration for Physics",
            "missing declaration for Rendering",
        ]
    );
}

#[test]
fn test_consistency_check_is_non_fatal() {
    let mut registry = mixed_registry();
    registry.register_class_name("Physics");
    let (mut engine, _capture) = capture_engine(registry);
    while !engine.tick() {}
    assert_eq!(engine.num_tests_run(), 4);
}

#[test]
fn test_consistency_check_skipped_without_declarations() {
    let (mut engine, capture) = capture_engine(mixed_registry());
    while !engine.tick() {}
    assert!(capture.warnings().is_empty());
    assert!(engine.registry().declared_class_names().is_none());
}

#[test]
fn test_fully_paired_declarations_are_clean() {
    let mut registry = mixed_registry();
    registry.register_class_name("Rendering");
    registry.register_class_name("Networking");
    assert_eq!(registry.consistency_findings(), Vec::<Finding>::new());
}

#[test]
fn test_filtered_out_classes_raise_no_warnings() {
    let mut registry = mixed_registry();
    registry.register_class_name("Networking");
    registry.register_class_name("Rendering");
    let (mut engine, capture) = capture_engine(registry);

    engine.filter(&["audio"]);
    while !engine.tick() {}

    assert_eq!(capture.started(), vec!["Audio Mixer"]);
    assert!(capture.warnings().is_empty());
    assert!(engine.show_results());
}

#[test]
fn test_filter_keeps_declaration_of_surviving_class() {
    let mut registry = mixed_registry();
    registry.register_class_name("Networking");
    registry.register_class_name("Rendering");
    registry.register_class_name("Physics");
    let (mut engine, capture) = capture_engine(registry);

    engine.filter(&["connect"]);
    while !engine.tick() {}

    // Physics never had a test, so it is still reported
    assert_eq!(capture.warnings(), vec!["missing registration for Physics"]);
    assert_eq!(
        engine.registry().declared_class_names(),
        Some(&["Networking".to_string(), "Physics".to_string()][..])
    );
}
