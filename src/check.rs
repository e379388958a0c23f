//! Assertion macros for test bodies and continuations
//!
//! Each macro takes the test's `Cx` first. On failure it records the current
//! file and line, formats the message, and aborts the test through
//! `Cx::fail_at`; it never returns to the caller.
//!
//! ```ignore
//! registry.register_fn("adds", |cx| {
//!     check_eq!(cx, 2 + 2, 4, "addition is broken");
//!     check!(cx, !cx.is_waiting(), "not suspended yet");
//! });
//! ```

/// Fail the test unless `cond` holds
#[macro_export]
macro_rules! check {
    ($cx:expr, $cond:expr $(,)?) => {
        $crate::check!($cx, $cond, "check failed: {}", stringify!($cond))
    };
    ($cx:expr, $cond:expr, $($arg:tt)+) => {
        if !($cond) {
            $cx.fail_at(
                $crate::SourceLocation::new(file!(), line!()),
                Some(format_args!($($arg)+)),
            )
        }
    };
}

/// Fail the test unless `expected == actual`
#[macro_export]
macro_rules! check_eq {
    ($cx:expr, $expected:expr, $actual:expr $(,)?) => {
        match (&$expected, &$actual) {
            (expected, actual) => $crate::check!(
                $cx,
                *expected == *actual,
                "expected `{:?}`, got `{:?}`",
                expected,
                actual
            ),
        }
    };
    ($cx:expr, $expected:expr, $actual:expr, $($arg:tt)+) => {
        $crate::check!($cx, $expected == $actual, $($arg)+)
    };
}

/// Fail the test if `unexpected == actual`
#[macro_export]
macro_rules! check_ne {
    ($cx:expr, $unexpected:expr, $actual:expr $(,)?) => {
        match (&$unexpected, &$actual) {
            (unexpected, actual) => $crate::check!(
                $cx,
                *unexpected != *actual,
                "did not expect `{:?}`",
                actual
            ),
        }
    };
    ($cx:expr, $unexpected:expr, $actual:expr, $($arg:tt)+) => {
        $crate::check!($cx, $unexpected != $actual, $($arg)+)
    };
}

#[cfg(test)]
mod tests {
    use crate::engine::Engine;
    use crate::registry::Registry;
    use crate::reporter::CaptureReporter;

    fn run_single<F>(body: F) -> (Engine, CaptureReporter)
    where
        F: Fn(&mut crate::Cx<'_>) + 'static,
    {
        let mut registry = Registry::new();
        registry.register_fn("single", body);
        let capture = CaptureReporter::new();
        let mut engine = Engine::new(registry).with_reporter(Box::new(capture.clone()));
        while !engine.tick() {}
        (engine, capture)
    }

    #[test]
    fn test_check_eq_passes() {
        let (engine, capture) = run_single(|cx| {
            crate::check_eq!(cx, 2, 2, "this should pass");
            crate::check_ne!(cx, 3, 2);
            crate::check!(cx, true);
        });
        assert!(engine.summary().all_passed());
        assert_eq!(capture.failure_count(), 0);
    }

    #[test]
    fn test_check_eq_formats_message() {
        let (engine, capture) = run_single(|cx| {
            let expected = 3;
            crate::check_eq!(cx, expected, 2, "wanted {} (async callback)", expected);
        });
        let record = engine.registry().get(0).unwrap();
        assert_eq!(record.message(), "wanted 3 (async callback)");

        let lines = capture.failure_lines();
        assert_eq!(lines.len(), 1);
        assert!(lines[0].contains("check.rs:"));
        assert!(lines[0].ends_with(": error: wanted 3 (async callback)"));
    }

    #[test]
    fn test_default_messages() {
        let (engine, _capture) = run_single(|cx| crate::check_eq!(cx, 1, 2));
        assert_eq!(engine.registry().get(0).unwrap().message(), "expected `1`, got `2`");

        let (engine, _capture) = run_single(|cx| crate::check!(cx, 1 > 2));
        assert_eq!(engine.registry().get(0).unwrap().message(), "check failed: 1 > 2");
    }
}
