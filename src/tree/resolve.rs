//! `${path}` reference substitution.

use super::lookup_path;
use crate::error::{ConfigError, Result};
use regex_lite::Regex;
use serde_json::{Map, Value};
use std::sync::LazyLock;

static REFERENCE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\$\{(\?)?\s*([^}\s]+)\s*\}").expect("reference pattern is valid")
});

/// Resolve all references in `root` against `root` itself.
pub(super) fn resolve_references(root: &Value) -> Result<Value> {
    let mut resolver = Resolver {
        root,
        in_progress: Vec::new(),
    };
    Ok(resolver
        .resolve(root)?
        .unwrap_or_else(|| Value::Object(Map::new())))
}

struct Resolver<'a> {
    root: &'a Value,
    /// Reference paths currently being expanded, for cycle detection.
    in_progress: Vec<String>,
}

impl<'a> Resolver<'a> {
    /// `None` means the value disappears (an unresolved optional reference).
    fn resolve(&mut self, value: &'a Value) -> Result<Option<Value>> {
        match value {
            Value::String(s) => self.resolve_string(s),
            Value::Object(map) => {
                let mut resolved = Map::with_capacity(map.len());
                for (key, child) in map {
                    if let Some(child) = self.resolve(child)? {
                        resolved.insert(key.clone(), child);
                    }
                }
                Ok(Some(Value::Object(resolved)))
            }
            Value::Array(items) => {
                let mut resolved = Vec::with_capacity(items.len());
                for item in items {
                    if let Some(item) = self.resolve(item)? {
                        resolved.push(item);
                    }
                }
                Ok(Some(Value::Array(resolved)))
            }
            other => Ok(Some(other.clone())),
        }
    }

    fn resolve_string(&mut self, s: &str) -> Result<Option<Value>> {
        let Some(whole) = REFERENCE.captures(s) else {
            return Ok(Some(Value::String(s.to_string())));
        };

        if let Some(m) = whole.get(0)
            && m.start() == 0
            && m.end() == s.len()
        {
            let optional = whole.get(1).is_some();
            return self.lookup(&whole[2], optional);
        }

        let mut out = String::with_capacity(s.len());
        let mut last = 0;
        for caps in REFERENCE.captures_iter(s) {
            let Some(m) = caps.get(0) else { continue };
            out.push_str(&s[last..m.start()]);
            if let Some(value) = self.lookup(&caps[2], caps.get(1).is_some())? {
                out.push_str(&render(&value));
            }
            last = m.end();
        }
        out.push_str(&s[last..]);
        Ok(Some(Value::String(out)))
    }

    fn lookup(&mut self, path: &str, optional: bool) -> Result<Option<Value>> {
        if self.in_progress.iter().any(|p| p == path) {
            return Err(ConfigError::CircularReference {
                reference: path.to_string(),
            });
        }

        let root = self.root;
        if let Some(raw) = lookup_path(root, path) {
            self.in_progress.push(path.to_string());
            let resolved = self.resolve(raw);
            self.in_progress.pop();
            return resolved;
        }

        match std::env::var(path) {
            Ok(value) => Ok(Some(Value::String(value))),
            Err(_) if optional => Ok(None),
            Err(_) => Err(ConfigError::UnresolvedReference {
                reference: path.to_string(),
            }),
        }
    }
}

fn render(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}
