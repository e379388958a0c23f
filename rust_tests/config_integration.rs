//! Integration tests for config loading and config-driven engines

use frametest::config::{load_config, load_config_file, EngineConfig, OutputFormat, CONFIG_FILE_NAME};
use frametest::Registry;
use frametest::Engine;
use tempfile::TempDir;

#[test]
fn test_load_config_missing_file_gives_defaults() {
    let temp_dir = TempDir::new().unwrap();
    let config = load_config(temp_dir.path()).unwrap();
    assert_eq!(config, EngineConfig::default());
    assert_eq!(config.format, OutputFormat::Human);
}

#[test]
fn test_load_config_reads_table() {
    let temp_dir = TempDir::new().unwrap();
    std::fs::write(
        temp_dir.path().join(CONFIG_FILE_NAME),
        r#"
[frametest]
filter = ["async"]
catch_panics = true
"#,
    )
    .unwrap();

    let config = load_config(temp_dir.path()).unwrap();
    assert_eq!(config.filter, vec!["async"]);
    assert!(config.catch_panics);
}

#[test]
fn test_load_config_malformed_file_is_error() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join(CONFIG_FILE_NAME);
    std::fs::write(&path, "[frametest\nfilter = 3").unwrap();

    let err = load_config(temp_dir.path()).unwrap_err();
    assert!(format!("{:#}", err).contains("failed to parse"));
}

#[test]
fn test_load_explicit_missing_file_is_error() {
    let temp_dir = TempDir::new().unwrap();
    let err = load_config_file(&temp_dir.path().join("nope.toml")).unwrap_err();
    assert!(err.to_string().contains("failed to read"));
}

#[test]
fn test_engine_with_config_applies_filter_and_panic_policy() {
    let mut registry = Registry::new();
    registry.register_fn("async panics", |_cx| panic!("config-driven"));
    registry.register_fn("sync", |_cx| {});

    let config = EngineConfig {
        filter: vec!["ASYNC".to_string()],
        format: OutputFormat::Json,
        catch_panics: true,
    };
    let mut engine = Engine::with_config(registry, &config);
    assert_eq!(engine.registry().names(), vec!["async panics"]);

    while !engine.tick() {}
    let summary = engine.summary();
    assert_eq!(summary.total, 1);
    assert_eq!(summary.failed, 1);
}
