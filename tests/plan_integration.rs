//! Integration tests: manifests planned through a real engine.

use modularizer::{check, plan, Manifest};
use modularizer_core::ErrorKind;
use modularizer_engine::LoaderConfig;

const SHOP: &str = r#"
[[resource]]
path = "app.js"
modules = [{ name = "app", requires = ["cart", "ui.button"] }]

[[resource]]
path = "cart.js"
modules = [
    { name = "cart", requires = ["money"] },
    { name = "money" },
]

[[resource]]
path = "ui.js"
modules = [{ name = "ui.button" }, { name = "ui.theme" }]
"#;

fn config() -> LoaderConfig {
    LoaderConfig {
        watchdog: false,
        ..Default::default()
    }
}

fn targets(names: &[&str]) -> Vec<String> {
    names.iter().map(|s| s.to_string()).collect()
}

fn core_error(err: &anyhow::Error) -> Option<ErrorKind> {
    err.chain()
        .find_map(|e| e.downcast_ref::<modularizer_core::Error>())
        .map(|e| e.kind())
}

// ===========================================================================
// Planning
// ===========================================================================

#[test]
fn two_file_manifest_fetches_prerequisite_first() {
    let manifest = Manifest::from_toml_str(
        r#"
[[resource]]
path = "a.js"
modules = [{ name = "X" }]

[[resource]]
path = "b.js"
modules = [{ name = "Y", requires = ["X"] }]
"#,
    )
    .unwrap();

    let plan = plan(&manifest, &targets(&["Y"]), config()).unwrap();
    assert_eq!(plan.fetched, vec!["a.js", "b.js"]);
    assert_eq!(plan.instantiated, vec!["X", "Y"]);
}

#[test]
fn declaration_order_across_files_does_not_matter() {
    let manifest = Manifest::from_toml_str(SHOP).unwrap();
    let plan = plan(&manifest, &targets(&["app"]), config()).unwrap();

    assert_eq!(plan.fetched, vec!["cart.js", "ui.js", "app.js"]);
    assert_eq!(plan.instantiated, vec!["money", "cart", "ui.button", "app"]);
    assert!(!plan.instantiated.contains(&"ui.theme".to_string()));
}

#[test]
fn plan_applies_base_path() {
    let manifest = Manifest::from_toml_str(SHOP).unwrap();
    let config = LoaderConfig {
        base: "/static/".to_string(),
        ..config()
    };
    let plan = plan(&manifest, &targets(&["ui.theme"]), config).unwrap();
    assert_eq!(plan.fetched, vec!["/static/ui.js"]);
    assert_eq!(plan.targets, vec!["ui.theme"]);
}

#[test]
fn plan_serializes_to_json() {
    let manifest = Manifest::from_toml_str(SHOP).unwrap();
    let plan = plan(&manifest, &targets(&["money"]), config()).unwrap();
    let json: serde_json::Value = serde_json::to_value(&plan).unwrap();
    assert_eq!(json["fetched"][0], "cart.js");
    assert_eq!(json["instantiated"][0], "money");
    assert_eq!(json["targets"][0], "money");
}

#[test]
fn unknown_target_is_rejected_in_strict_mode() {
    let manifest = Manifest::from_toml_str(SHOP).unwrap();
    let err = plan(&manifest, &targets(&["nowhere"]), config()).unwrap_err();
    assert_eq!(core_error(&err), Some(ErrorKind::InvalidState));
}

#[test]
fn unknown_target_stalls_in_lenient_mode() {
    let manifest = Manifest::from_toml_str(SHOP).unwrap();
    let config = LoaderConfig {
        strict: false,
        ..config()
    };
    let err = plan(&manifest, &targets(&["nowhere"]), config).unwrap_err();
    assert_eq!(core_error(&err), Some(ErrorKind::Timeout));
    assert!(err.to_string().contains("nowhere was never defined"), "{}", err);
}

#[test]
fn same_file_cycle_is_diagnosed() {
    let manifest = Manifest::from_toml_str(
        r#"
[[resource]]
path = "knot.js"
modules = [
    { name = "left", requires = ["right"] },
    { name = "right", requires = ["left"] },
]
"#,
    )
    .unwrap();
    let err = plan(&manifest, &targets(&["left"]), config()).unwrap_err();
    assert_eq!(core_error(&err), Some(ErrorKind::Timeout));
    assert!(err.to_string().contains("circular dependency between"), "{}", err);
}

// ===========================================================================
// Checking and loading
// ===========================================================================

#[test]
fn check_counts_resources() {
    let manifest = Manifest::from_toml_str(SHOP).unwrap();
    assert_eq!(check(&manifest, config()).unwrap(), 3);
    assert_eq!(manifest.module_count(), 5);
}

#[test]
fn check_rejects_missing_prerequisite() {
    let manifest = Manifest::from_toml_str(
        r#"
[[resource]]
path = "a.js"
modules = [{ name = "a", requires = ["ghost"] }]
"#,
    )
    .unwrap();
    let err = check(&manifest, config()).unwrap_err();
    assert_eq!(core_error(&err), Some(ErrorKind::InvalidDefinition));
    assert!(format!("{:#}", err).contains("ghost"));
}

#[test]
fn manifest_loads_from_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("shop.toml");
    std::fs::write(&path, SHOP).unwrap();
    let manifest = Manifest::load(&path).unwrap();
    assert_eq!(manifest.resources.len(), 3);
    assert_eq!(manifest.resources[1].modules[0].requires, vec!["money"]);
}

#[test]
fn missing_manifest_file_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let err = Manifest::load(&dir.path().join("absent.toml")).unwrap_err();
    assert!(err.to_string().contains("failed to read manifest"));
}
