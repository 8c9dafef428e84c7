//! Primary/fallback composition.

use super::ConfigurationSource;
use crate::error::Result;
use crate::tree::ConfigTree;
use std::sync::Arc;

/// Merges a primary source over a fallback source.
///
/// Primary keys win; the fallback only fills keys the primary omits.
/// Concurrent calls are not synchronized beyond what the inner sources do.
pub struct MergeConfigurationSource {
    source: Arc<dyn ConfigurationSource>,
    fallback: Arc<dyn ConfigurationSource>,
}

impl MergeConfigurationSource {
    pub fn new(source: Arc<dyn ConfigurationSource>, fallback: Arc<dyn ConfigurationSource>) -> Self {
        Self { source, fallback }
    }
}

impl ConfigurationSource for MergeConfigurationSource {
    fn get_config(&self) -> Result<ConfigTree> {
        let fallback = self.fallback.get_config()?;
        Ok(self.source.get_config()?.with_fallback(&fallback))
    }

    fn reload(&self) {
        self.fallback.reload();
        self.source.reload();
    }

    fn describe(&self) -> String {
        format!("{} <- {}", self.source.describe(), self.fallback.describe())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ConfigError;
    use crate::source::{EmbeddedConfigurationSource, EmbeddedResources};
    use serde_json::json;
    use std::sync::Mutex;

    static RESOURCES: EmbeddedResources = &[
        ("a.yaml", "msg: x\n"),
        ("b.yaml", "msg: y\nextra: 1\n"),
        ("nested-a.yaml", "db:\n  host: prod\n"),
        ("nested-b.yaml", "db:\n  host: local\n  port: 5432\n"),
    ];

    fn embedded(path: &str, ignore_missing: bool) -> Arc<dyn ConfigurationSource> {
        Arc::new(EmbeddedConfigurationSource::new(RESOURCES, path, ignore_missing))
    }

    #[test]
    fn test_primary_wins_fallback_fills() {
        let merged = MergeConfigurationSource::new(embedded("a.yaml", false), embedded("b.yaml", false));
        assert_eq!(
            merged.get_config().unwrap().into_value(),
            json!({"msg": "x", "extra": 1})
        );
    }

    #[test]
    fn test_nested_merge() {
        let merged = MergeConfigurationSource::new(
            embedded("nested-a.yaml", false),
            embedded("nested-b.yaml", false),
        );
        assert_eq!(
            merged.get_config().unwrap().into_value(),
            json!({"db": {"host": "prod", "port": 5432}})
        );
    }

    #[test]
    fn test_missing_fallback_fails_unless_ignored() {
        let merged = MergeConfigurationSource::new(embedded("a.yaml", false), embedded("absent.yaml", false));
        assert!(merged.get_config().unwrap_err().is_missing_resource());

        let merged = MergeConfigurationSource::new(embedded("a.yaml", false), embedded("absent.yaml", true));
        assert_eq!(merged.get_config().unwrap().into_value(), json!({"msg": "x"}));
    }

    /// Records the order in which sources are reloaded.
    struct RecordingSource {
        name: &'static str,
        log: Arc<Mutex<Vec<&'static str>>>,
    }

    impl ConfigurationSource for RecordingSource {
        fn get_config(&self) -> Result<ConfigTree> {
            Err(ConfigError::missing_resource(self.name))
        }

        fn reload(&self) {
            self.log.lock().unwrap().push(self.name);
        }

        fn describe(&self) -> String {
            self.name.to_string()
        }
    }

    #[test]
    fn test_reload_fallback_then_primary() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let merged = MergeConfigurationSource::new(
            Arc::new(RecordingSource { name: "primary", log: Arc::clone(&log) }),
            Arc::new(RecordingSource { name: "fallback", log: Arc::clone(&log) }),
        );
        merged.reload();
        assert_eq!(*log.lock().unwrap(), vec!["fallback", "primary"]);
        assert_eq!(merged.describe(), "primary <- fallback");
    }
}
