//! Hierarchical configuration trees.
//!
//! A [`ConfigTree`] is an immutable mapping of keys to values (mappings,
//! lists, scalars) produced by a configuration source. Trees are never
//! mutated in place: merging and resolving produce new trees.
//!
//! ## Paths
//! Nested keys are addressed with dot-separated paths: `server.http.port`.
//!
//! ## References
//! String values may contain `${path}` references to other values of the same
//! tree, substituted by [`ConfigTree::resolve`]. `${?path}` marks an optional
//! reference.

mod merge;
mod resolve;

pub use merge::deep_merge;

use crate::error::{ConfigError, Result};
use serde_json::{Map, Value};
use std::fmt;
use std::path::Path;

/// Text format of a configuration resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConfigFormat {
    /// YAML (also accepts JSON, which is a subset).
    #[default]
    Yaml,
    /// Strict JSON.
    Json,
}

impl ConfigFormat {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "yaml" | "yml" => Some(ConfigFormat::Yaml),
            "json" => Some(ConfigFormat::Json),
            _ => None,
        }
    }

    /// Infer the format from a file name's extension, defaulting to YAML.
    pub fn from_path(path: impl AsRef<Path>) -> Self {
        path.as_ref()
            .extension()
            .and_then(|e| e.to_str())
            .and_then(Self::from_str)
            .unwrap_or_default()
    }
}

/// Immutable hierarchical configuration whose root is always a mapping.
#[derive(Clone, PartialEq)]
pub struct ConfigTree {
    root: Value,
}

impl ConfigTree {
    /// A tree with no keys.
    pub fn empty() -> Self {
        Self {
            root: Value::Object(Map::new()),
        }
    }

    /// Wrap a value. Null becomes the empty tree; anything but a mapping is rejected.
    pub fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Null => Ok(Self::empty()),
            Value::Object(_) => Ok(Self { root: value }),
            other => Err(ConfigError::parse(
                "value",
                format!("configuration root must be a mapping, got {}", kind_of(&other)),
            )),
        }
    }

    /// Parse resource text. `origin` names the resource in error messages.
    pub fn parse(text: &str, format: ConfigFormat, origin: &str) -> Result<Self> {
        if text.trim().is_empty() {
            return Ok(Self::empty());
        }

        let value: Value = match format {
            ConfigFormat::Yaml => {
                serde_yaml::from_str(text).map_err(|e| ConfigError::parse(origin, e))?
            }
            ConfigFormat::Json => {
                serde_json::from_str(text).map_err(|e| ConfigError::parse(origin, e))?
            }
        };

        match value {
            Value::Null => Ok(Self::empty()),
            Value::Object(_) => Ok(Self { root: value }),
            other => Err(ConfigError::parse(
                origin,
                format!("configuration root must be a mapping, got {}", kind_of(&other)),
            )),
        }
    }

    /// Merge with `fallback`: keys of `self` win, `fallback` fills the gaps.
    pub fn with_fallback(&self, fallback: &ConfigTree) -> ConfigTree {
        Self {
            root: deep_merge(fallback.root.clone(), self.root.clone()),
        }
    }

    /// Substitute every `${path}` reference.
    ///
    /// A reference that spans a whole string value takes the referenced
    /// value with its type; references embedded in longer strings are
    /// stringified. Paths missing from the tree fall back to an environment
    /// variable of the same name. A missing `${?path}` removes the key when it
    /// spans the whole value and expands to nothing when embedded.
    pub fn resolve(&self) -> Result<ConfigTree> {
        let root = resolve::resolve_references(&self.root)?;
        Ok(Self { root })
    }

    /// Value at a dot-separated path. The empty path is the root.
    pub fn get(&self, path: &str) -> Option<&Value> {
        lookup_path(&self.root, path)
    }

    /// Sub-tree at a dot-separated path, if present and a mapping.
    pub fn at_path(&self, path: &str) -> Option<ConfigTree> {
        match self.get(path)? {
            value @ Value::Object(_) => Some(Self {
                root: value.clone(),
            }),
            _ => None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.root.as_object().is_none_or(Map::is_empty)
    }

    pub fn as_value(&self) -> &Value {
        &self.root
    }

    pub fn into_value(self) -> Value {
        self.root
    }
}

impl Default for ConfigTree {
    fn default() -> Self {
        Self::empty()
    }
}

impl fmt::Debug for ConfigTree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ConfigTree({})", self.root)
    }
}

/// Walk a dot-separated path through nested mappings.
pub(crate) fn lookup_path<'v>(root: &'v Value, path: &str) -> Option<&'v Value> {
    if path.is_empty() {
        return Some(root);
    }
    path.split('.')
        .try_fold(root, |node, key| node.as_object()?.get(key))
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "a list",
        Value::Object(_) => "a mapping",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn yaml(text: &str) -> ConfigTree {
        ConfigTree::parse(text, ConfigFormat::Yaml, "test").unwrap()
    }

    #[test]
    fn test_parse_yaml_and_json() {
        let from_yaml = yaml("server:\n  port: 8080\n");
        let from_json =
            ConfigTree::parse(r#"{"server": {"port": 8080}}"#, ConfigFormat::Json, "test")
                .unwrap();
        assert_eq!(from_yaml, from_json);
        assert_eq!(from_yaml.get("server.port"), Some(&json!(8080)));
    }

    #[test]
    fn test_blank_text_is_empty_tree() {
        assert!(yaml("").is_empty());
        assert!(yaml("   \n").is_empty());
        assert!(yaml("~").is_empty());
    }

    #[test]
    fn test_non_mapping_root_rejected() {
        let err = ConfigTree::parse("- a\n- b\n", ConfigFormat::Yaml, "list.yaml").unwrap_err();
        assert!(matches!(err, ConfigError::Parse { ref origin, .. } if origin == "list.yaml"));
    }

    #[test]
    fn test_invalid_json_rejected() {
        let err = ConfigTree::parse("{not json", ConfigFormat::Json, "bad.json").unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn test_with_fallback_precedence() {
        let primary = yaml("msg: x\n");
        let fallback = yaml("msg: y\nextra: 1\n");
        assert_eq!(
            primary.with_fallback(&fallback).into_value(),
            json!({"msg": "x", "extra": 1})
        );
    }

    #[test]
    fn test_at_path() {
        let tree = yaml("app:\n  http:\n    port: 80\n  name: demo\n");
        let http = tree.at_path("app.http").unwrap();
        assert_eq!(http.into_value(), json!({"port": 80}));
        assert!(tree.at_path("app.name").is_none());
        assert!(tree.at_path("app.grpc").is_none());
        assert_eq!(tree.at_path("").unwrap(), tree);
    }

    #[test]
    fn test_format_from_path() {
        assert_eq!(ConfigFormat::from_path("app.json"), ConfigFormat::Json);
        assert_eq!(ConfigFormat::from_path("app.yml"), ConfigFormat::Yaml);
        assert_eq!(ConfigFormat::from_path("app.conf"), ConfigFormat::Yaml);
        assert_eq!(ConfigFormat::from_path("app"), ConfigFormat::Yaml);
    }

    #[test]
    fn test_from_value() {
        assert!(ConfigTree::from_value(Value::Null).unwrap().is_empty());
        assert!(ConfigTree::from_value(json!({"a": 1})).is_ok());
        assert!(ConfigTree::from_value(json!(3)).is_err());
    }
}
