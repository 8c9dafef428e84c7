//! Resources compiled into the binary.

use super::{ConfigurationSource, SourceCache};
use crate::error::{ConfigError, Result};
use crate::tree::{ConfigFormat, ConfigTree};
use tracing::debug;

/// `(resource path, text)` pairs, typically built with `include_str!`.
pub type EmbeddedResources = &'static [(&'static str, &'static str)];

/// Reads one resource out of a table of embedded resources.
///
/// The format is inferred from the resource path's extension.
pub struct EmbeddedConfigurationSource {
    resources: EmbeddedResources,
    resource_path: String,
    ignore_missing_resource: bool,
    cache: SourceCache,
}

impl EmbeddedConfigurationSource {
    pub fn new(
        resources: EmbeddedResources,
        resource_path: impl Into<String>,
        ignore_missing_resource: bool,
    ) -> Self {
        Self {
            resources,
            resource_path: resource_path.into(),
            ignore_missing_resource,
            cache: SourceCache::new(),
        }
    }

    fn build(&self) -> Result<ConfigTree> {
        let found = self
            .resources
            .iter()
            .find(|(path, _)| *path == self.resource_path);
        if let Some((path, text)) = found {
            return ConfigTree::parse(text, ConfigFormat::from_path(path), path);
        }

        debug!(
            resource = %self.resource_path,
            ignore_missing = self.ignore_missing_resource,
            "Missing configuration resource"
        );
        if self.ignore_missing_resource {
            return Ok(ConfigTree::empty());
        }
        Err(ConfigError::missing_resource(&self.resource_path))
    }
}

impl ConfigurationSource for EmbeddedConfigurationSource {
    fn get_config(&self) -> Result<ConfigTree> {
        self.cache.get_or_build(|| self.build())
    }

    fn reload(&self) {
        self.cache.invalidate();
    }

    fn describe(&self) -> String {
        format!("embedded:{}", self.resource_path)
    }
}
