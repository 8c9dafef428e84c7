//! Output formatting for the `confwatch` binary.

use chrono::{DateTime, SecondsFormat, TimeZone};
use clap::ValueEnum;
use serde_json::Value;
use std::collections::BTreeSet;
use std::fmt::Display;
use thiserror::Error;

/// Output format for printed configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Yaml,
    Json,
}

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("failed to render YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("failed to render JSON: {0}")]
    Json(#[from] serde_json::Error),
}

impl OutputFormat {
    pub fn render(&self, value: &Value) -> Result<String, RenderError> {
        let text = match self {
            OutputFormat::Yaml => serde_yaml::to_string(value)?,
            OutputFormat::Json => serde_json::to_string_pretty(value)?,
        };
        Ok(text.trim_end().to_string())
    }
}

/// Top-level keys whose values differ between `old` and `new`, sorted.
///
/// Non-mapping values are compared as a whole under the key `.`.
pub fn changed_keys(old: &Value, new: &Value) -> Vec<String> {
    let (Some(old_map), Some(new_map)) = (old.as_object(), new.as_object()) else {
        return if old == new {
            Vec::new()
        } else {
            vec![".".to_string()]
        };
    };

    old_map
        .keys()
        .chain(new_map.keys())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .filter(|key| old_map.get(*key) != new_map.get(*key))
        .cloned()
        .collect()
}

/// One-line change banner, e.g. `[2026-01-02T03:04:05.000Z] changed: db, server`.
pub fn change_header<Tz>(at: &DateTime<Tz>, keys: &[String]) -> String
where
    Tz: TimeZone,
    Tz::Offset: Display,
{
    let stamp = at.to_rfc3339_opts(SecondsFormat::Millis, true);
    if keys.is_empty() {
        format!("[{stamp}] configuration changed")
    } else {
        format!("[{stamp}] changed: {}", keys.join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use serde_json::json;

    #[test]
    fn test_render() {
        let value = json!({"server": {"port": 8080}});
        assert_eq!(
            OutputFormat::Yaml.render(&value).unwrap(),
            "server:\n  port: 8080"
        );
        assert_eq!(
            OutputFormat::Json.render(&value).unwrap(),
            "{\n  \"server\": {\n    \"port\": 8080\n  }\n}"
        );
    }

    #[test]
    fn test_changed_keys() {
        let old = json!({"a": 1, "b": {"c": 2}, "gone": true});
        let new = json!({"a": 1, "b": {"c": 3}, "added": "x"});
        assert_eq!(changed_keys(&old, &new), vec!["added", "b", "gone"]);
        assert!(changed_keys(&old, &old).is_empty());
        assert_eq!(changed_keys(&json!(1), &json!(2)), vec!["."]);
    }

    #[test]
    fn test_change_header() {
        let at = Utc.with_ymd_and_hms(2026, 1, 2, 3, 4, 5).unwrap();
        assert_eq!(
            change_header(&at, &["db".to_string(), "server".to_string()]),
            "[2026-01-02T03:04:05.000Z] changed: db, server"
        );
        assert_eq!(
            change_header(&at, &[]),
            "[2026-01-02T03:04:05.000Z] configuration changed"
        );
    }
}
