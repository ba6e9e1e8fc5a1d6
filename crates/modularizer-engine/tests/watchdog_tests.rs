//! Tests for the stall watchdog, timeout diagnostics, and config loading

use modularizer_engine::*;
use std::time::Duration;

fn lenient(timeout_ms: u64) -> Modularizer {
    Modularizer::new(LoaderConfig {
        strict: false,
        timeout_ms,
        ..Default::default()
    })
    .unwrap()
    .with_loader(QueuedLoader::new())
}

fn unit(_: &Modularizer, _: &[Instance]) -> Result<Instance> {
    Ok(Instance::new(()))
}

// ===========================================================================
// check_timeout
// ===========================================================================

#[test]
fn nothing_armed_is_not_a_timeout() {
    let engine = lenient(0);
    assert!(!engine.watchdog_armed());
    engine.check_timeout().unwrap();
}

#[test]
fn undefined_dependency_is_reported() {
    let engine = lenient(0);
    engine.define_with("app", &["db"], unit).unwrap();
    assert!(engine.watchdog_armed());

    let err = engine.check_timeout().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Timeout);
    assert!(err.to_string().contains("db was never defined"), "{}", err);

    // disarmed after firing
    assert!(!engine.watchdog_armed());
    engine.check_timeout().unwrap();
}

#[test]
fn cycle_is_reported_once() {
    let engine = lenient(0);
    engine.define_with("a", &["b"], unit).unwrap();
    engine.define_with("b", &["a"], unit).unwrap();

    let message = engine.check_timeout().unwrap_err().to_string();
    assert_eq!(message.matches("circular dependency between").count(), 1);
    assert!(message.contains(" a") && message.contains(" b"), "{}", message);
}

#[test]
fn unloaded_resource_is_reported() {
    let engine = lenient(0);
    engine.register("maps.js").defines("maps").unwrap();
    engine.require("maps", |_, _| Ok(())).unwrap();

    let message = engine.check_timeout().unwrap_err().to_string();
    assert!(
        message.contains("resource maps.js never loaded (needed for maps)"),
        "{}",
        message
    );
}

#[test]
fn loaded_resource_missing_definition_is_reported() {
    let loader = QueuedLoader::new();
    let engine = Modularizer::new(LoaderConfig {
        timeout_ms: 0,
        ..Default::default()
    })
    .unwrap()
    .with_loader(loader.clone());
    engine.register("maps.js").defines("maps").unwrap();
    engine.require("maps", |_, _| Ok(())).unwrap();
    loader.flush().unwrap();

    let message = engine.check_timeout().unwrap_err().to_string();
    assert!(
        message.contains("resource maps.js loaded but did not define maps"),
        "{}",
        message
    );
}

#[test]
fn shared_root_cause_is_deduplicated() {
    let engine = lenient(0);
    engine.register("base.js").defines("base").unwrap();
    engine.require("base", |_, _| Ok(())).unwrap();
    engine.define_with("left", &["base"], unit).unwrap();
    engine.define_with("right", &["base"], unit).unwrap();
    engine.define_with("top", &["left", "right"], unit).unwrap();

    let message = engine.check_timeout().unwrap_err().to_string();
    assert_eq!(message.matches("base.js").count(), 1, "{}", message);
}

#[test]
fn plain_report_without_diagnosis() {
    let engine = Modularizer::new(LoaderConfig {
        strict: false,
        timeout_ms: 0,
        diagnose: false,
        ..Default::default()
    })
    .unwrap()
    .with_loader(QueuedLoader::new());
    engine.define_with("app", &["db"], unit).unwrap();

    let err = engine.check_timeout().unwrap_err();
    assert_eq!(err.to_string(), "timeout: modules never became ready: db");
}

#[test]
fn strict_exceptions_never_time_out() {
    let engine = Modularizer::new(LoaderConfig {
        exceptions: vec![r"^opt\.".to_string()],
        timeout_ms: 0,
        ..Default::default()
    })
    .unwrap()
    .with_loader(QueuedLoader::new());
    engine.define_with("app", &["opt.analytics"], unit).unwrap();
    assert!(engine.watchdog_armed());
    engine.check_timeout().unwrap();
}

#[test]
fn disabled_watchdog_never_arms() {
    let engine = Modularizer::new(LoaderConfig {
        strict: false,
        watchdog: false,
        ..Default::default()
    })
    .unwrap()
    .with_loader(QueuedLoader::new());
    engine.define_with("app", &["db"], unit).unwrap();
    assert!(!engine.watchdog_armed());
    engine.check_timeout().unwrap();
}

#[test]
fn diagnose_on_demand() {
    let engine = lenient(60_000);
    engine.define_with("app", &["db"], unit).unwrap();
    let names = vec![ModuleName::new("app").unwrap()];
    assert_eq!(engine.diagnose(&names), "db was never defined");
}

// ===========================================================================
// watch() on the tokio clock
// ===========================================================================

#[tokio::test(start_paused = true)]
async fn watch_returns_immediately_when_unarmed() {
    let engine = lenient(1_000);
    engine.watch().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn watch_fails_after_timeout() {
    let engine = lenient(7_000);
    engine.define_with("app", &["db"], unit).unwrap();

    let start = tokio::time::Instant::now();
    let err = engine.watch().await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Timeout);
    assert!(start.elapsed() >= Duration::from_millis(7_000));
}

#[tokio::test(start_paused = true)]
async fn progress_pushes_the_deadline_out() {
    let engine = lenient(1_000);
    engine.define_with("a", &["b"], unit).unwrap();
    engine.define_with("c", &["d"], unit).unwrap();

    tokio::time::advance(Duration::from_millis(800)).await;
    engine.define("b", unit).unwrap();
    assert!(engine.knows("a"));

    tokio::time::advance(Duration::from_millis(500)).await;
    engine.check_timeout().unwrap();

    tokio::time::advance(Duration::from_millis(600)).await;
    let message = engine.check_timeout().unwrap_err().to_string();
    assert!(message.contains("d was never defined"), "{}", message);
    assert!(!message.contains("b was never defined"));
}

#[tokio::test(start_paused = true)]
async fn unrelated_progress_keeps_the_deadline() {
    let engine = lenient(1_000);
    engine.define_with("a", &["b"], unit).unwrap();

    tokio::time::advance(Duration::from_millis(800)).await;
    engine.define("unrelated", unit).unwrap();

    tokio::time::advance(Duration::from_millis(300)).await;
    let message = engine.check_timeout().unwrap_err().to_string();
    assert!(message.contains("b was never defined"), "{}", message);
}

#[tokio::test(start_paused = true)]
async fn completed_load_lets_watch_finish() {
    let engine = lenient(1_000);
    engine.define_with("a", &["b"], unit).unwrap();
    engine.define("b", unit).unwrap();
    engine.watch().await.unwrap();
    assert!(!engine.watchdog_armed());
}

// ===========================================================================
// LoaderConfig files
// ===========================================================================

#[test]
fn config_loads_from_toml() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("modularizer.toml");
    std::fs::write(
        &path,
        r#"
base = "/assets/"
strict = false
exceptions = ["^ext\\."]
timeout_ms = 250
"#,
    )
    .unwrap();

    let config = LoaderConfig::load(&path);
    assert_eq!(config.base, "/assets/");
    assert!(!config.strict);
    assert_eq!(config.exceptions, vec![r"^ext\.".to_string()]);
    assert_eq!(config.timeout(), Some(Duration::from_millis(250)));
    assert!(config.diagnose, "unset fields keep defaults");
}

#[test]
fn missing_or_invalid_config_falls_back_to_defaults() {
    let dir = tempfile::tempdir().unwrap();
    assert_eq!(
        LoaderConfig::load(&dir.path().join("absent.toml")),
        LoaderConfig::default()
    );

    let bad = dir.path().join("bad.toml");
    std::fs::write(&bad, "strict = \"sometimes\"").unwrap();
    assert_eq!(LoaderConfig::load(&bad), LoaderConfig::default());
}

#[test]
fn generated_config_parses_back() {
    let config = LoaderConfig {
        cache_buster: Some("7".to_string()),
        exceptions: vec!["^x".to_string()],
        ..Default::default()
    };
    let parsed: LoaderConfig = toml::from_str(&config.to_toml()).unwrap();
    assert_eq!(parsed, config);
}
