//! frametest: a cooperative test engine for frame loops
//!
//! Tests run inside the host's own update loop. The host calls
//! `Engine::tick` once per frame; a test may suspend itself with `cx.wait()`
//! and be continued later from a host callback via `Engine::resume_with`.
//! No threads, no blocking.

pub mod check;
pub mod config;
pub mod context;
pub mod engine;
pub mod logging;
pub mod record;
pub mod registry;
pub mod reporter;
pub mod results;

pub use context::{Cx, SourceLocation};
pub use engine::Engine;
pub use record::{AsyncTest, TestRecord};
pub use registry::Registry;
pub use results::RunSummary;
