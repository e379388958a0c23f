//! Demo host: a simulated frame loop driving four sample tests.
//!
//! Two tests finish synchronously, two suspend and are continued from a
//! callback the "game" fires between frames. Two of the four fail on purpose.

use anyhow::{bail, Result};
use clap::Parser;
use frametest::config::{load_config, load_config_file, Cli};
use frametest::{check_eq, AsyncTest, Cx, Engine, Registry};
use std::cell::RefCell;
use std::path::Path;
use std::rc::Rc;

/// Callback the host fires on a later frame
type PendingCallback = Box<dyn FnOnce(&mut Engine)>;
type PendingSlot = Rc<RefCell<Option<PendingCallback>>>;

#[derive(Default)]
struct Test1;

impl AsyncTest for Test1 {
    fn run(&mut self, cx: &mut Cx<'_>) {
        check_eq!(cx, 1, 2, "this should fail");
        unreachable!("a failed check never returns");
    }
}

#[derive(Default)]
struct Test2;

impl AsyncTest for Test2 {
    fn run(&mut self, cx: &mut Cx<'_>) {
        check_eq!(cx, 2, 2, "this should pass");
    }
}

fn sample_registry(pending: &PendingSlot) -> Registry {
    let mut registry = Registry::new();

    registry.register_type::<Test1>("Test 1");
    registry.register_class_name("Test1");

    registry.register_type::<Test2>("Test 2");
    registry.register_class_name("Test2");

    let slot = Rc::clone(pending);
    registry.register_fn("ASync passing test", move |cx| {
        *slot.borrow_mut() = Some(Box::new(|engine: &mut Engine| {
            engine.resume_with(|cx| check_eq!(cx, 3, 3, "should pass (async callback)"));
        }));
        cx.wait();
    });

    let slot = Rc::clone(pending);
    registry.register_fn("ASync failing test", move |cx| {
        *slot.borrow_mut() = Some(Box::new(|engine: &mut Engine| {
            engine.resume_with(|cx| check_eq!(cx, 3, 2, "this should fail (async callback)"));
        }));
        cx.wait();
    });

    registry
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    frametest::logging::init();

    let config = match &cli.config {
        Some(path) => load_config_file(path)?,
        None => load_config(Path::new("."))?,
    }
    .merge_cli(&cli);

    let pending: PendingSlot = Rc::new(RefCell::new(None));
    let mut engine = Engine::with_config(sample_registry(&pending), &config);

    // Simulate the frame loop
    let mut frames = 0u64;
    while !engine.tick() {
        let callback = pending.borrow_mut().take();
        if let Some(callback) = callback {
            callback(&mut engine);
        }

        frames += 1;
        if cli.max_ticks.is_some_and(|max| frames >= max) {
            bail!(
                "gave up after {} frames; `{}` is still waiting",
                frames,
                engine.current_test_name().unwrap_or("?")
            );
        }
        std::thread::yield_now();
    }

    eprintln!("[frametest] Finished {} tests in {} frames.", engine.num_tests_run(), frames);

    let passed = engine.show_results();
    eprintln!("[frametest] RESULT: {}", if passed { "passed" } else { "failed" });
    std::process::exit(engine.summary().exit_code());
}
