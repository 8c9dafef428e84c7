//! Integration tests for configuration sources and their composition.

use confwatch::source::{
    ConfigurationSource, EmbeddedConfigurationSource, EmbeddedResources, FileConfigurationSource,
    FileSourceOptions, MergeConfigurationSource, compose_sources, watch_strategy,
};
use serde_json::json;
use std::fs;
use std::sync::Arc;
use tempfile::TempDir;

static RESOURCES: EmbeddedResources = &[
    ("a.yaml", "msg: x\n"),
    ("b.yaml", "msg: y\nextra: 1\n"),
];

fn embedded(path: &str) -> Arc<dyn ConfigurationSource> {
    Arc::new(EmbeddedConfigurationSource::new(RESOURCES, path, false))
}

#[test]
fn test_merge_primary_wins_fallback_fills() {
    let merged = MergeConfigurationSource::new(embedded("a.yaml"), embedded("b.yaml"));
    assert_eq!(
        merged.get_config().unwrap().into_value(),
        json!({"msg": "x", "extra": 1})
    );
}

#[test]
fn test_missing_embedded_resource() {
    let strict = embedded("absent.yaml");
    assert!(strict.get_config().unwrap_err().is_missing_resource());

    let tolerant = EmbeddedConfigurationSource::new(RESOURCES, "absent.yaml", true);
    assert!(tolerant.get_config().unwrap().is_empty());
}

#[test]
fn test_file_layered_over_embedded_defaults() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("override.json");
    fs::write(&path, r#"{"extra": 2, "nested": {"on": true}}"#).unwrap();

    let composed = compose_sources(
        Arc::new(FileConfigurationSource::at(&path)),
        [embedded("a.yaml"), embedded("b.yaml")],
    );
    assert_eq!(
        composed.get_config().unwrap().into_value(),
        json!({"msg": "x", "extra": 2, "nested": {"on": true}})
    );
    assert!(composed.describe().contains("override.json"));
}

#[test]
fn test_file_reload_picks_up_new_content() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("app.yaml");
    fs::write(&path, "level: 1\n").unwrap();
    let source = FileConfigurationSource::at(&path);
    assert_eq!(source.get_config().unwrap().get("level"), Some(&json!(1)));

    fs::write(&path, "level: 2\n").unwrap();
    // Cached until reloaded.
    assert_eq!(source.get_config().unwrap().get("level"), Some(&json!(1)));
    source.reload();
    assert_eq!(source.get_config().unwrap().get("level"), Some(&json!(2)));
}

#[test]
fn test_only_watching_sources_offer_strategy() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("app.yaml");
    fs::write(&path, "a: 1\n").unwrap();

    let plain = FileConfigurationSource::at(&path);
    assert!(watch_strategy(&plain).is_none());

    let mut options = FileSourceOptions::new(&path);
    options.reload_on_change = true;
    let watched = FileConfigurationSource::new(options);
    assert_eq!(watch_strategy(&watched).map(|s| s.name()), Some("file-watch"));
    assert!(watch_strategy(embedded("a.yaml").as_ref()).is_none());
}
