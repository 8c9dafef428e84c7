//! Configuration documents stored under a key of a key-value store.

use super::{ConfigurationSource, SourceCache, WatchableConfigurationSource};
use crate::error::{ConfigError, Result};
use crate::kv::KeyValueClient;
use crate::reload::{DEFAULT_WATCH_TIMEOUT, KvWatchReloadStrategy, ReloadStrategy};
use crate::tree::{ConfigFormat, ConfigTree};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Options for [`KvConfigurationSource`].
#[derive(Debug, Clone)]
pub struct KvSourceOptions {
    /// Key holding the configuration document.
    pub key: String,
    /// Substitute an empty tree when the key does not exist (default: false).
    pub ignore_missing_resource: bool,
    /// Subscribe to the key and reload on change (default: false).
    pub reload_on_change: bool,
    /// Bound on waiting for the subscription's initial sync (default: 10s).
    pub watch_timeout: Duration,
    /// Format of the stored document (default: YAML).
    pub format: ConfigFormat,
}

impl KvSourceOptions {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            ignore_missing_resource: false,
            reload_on_change: false,
            watch_timeout: DEFAULT_WATCH_TIMEOUT,
            format: ConfigFormat::Yaml,
        }
    }
}

/// Reads one document from a key-value store.
pub struct KvConfigurationSource {
    client: Arc<dyn KeyValueClient>,
    key: String,
    ignore_missing_resource: bool,
    format: ConfigFormat,
    cache: SourceCache,
    reload_strategy: Option<Arc<KvWatchReloadStrategy>>,
}

impl KvConfigurationSource {
    pub fn new(client: Arc<dyn KeyValueClient>, options: KvSourceOptions) -> Self {
        let reload_strategy = options.reload_on_change.then(|| {
            Arc::new(KvWatchReloadStrategy::new(
                Arc::clone(&client),
                options.key.clone(),
                options.watch_timeout,
            ))
        });

        Self {
            client,
            key: options.key,
            ignore_missing_resource: options.ignore_missing_resource,
            format: options.format,
            cache: SourceCache::new(),
            reload_strategy,
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    fn build(&self) -> Result<ConfigTree> {
        if let Some(document) = self.client.get_value_as_string(&self.key)? {
            return ConfigTree::parse(&document, self.format, &self.key);
        }

        debug!(
            key = %self.key,
            ignore_missing = self.ignore_missing_resource,
            "Missing configuration key"
        );
        if self.ignore_missing_resource {
            return Ok(ConfigTree::empty());
        }
        Err(ConfigError::missing_resource(&self.key))
    }
}

impl ConfigurationSource for KvConfigurationSource {
    fn get_config(&self) -> Result<ConfigTree> {
        self.cache.get_or_build(|| self.build())
    }

    fn reload(&self) {
        self.cache.invalidate();
    }

    fn describe(&self) -> String {
        format!("kv:{}", self.key)
    }

    fn as_watchable(&self) -> Option<&dyn WatchableConfigurationSource> {
        Some(self)
    }
}

impl WatchableConfigurationSource for KvConfigurationSource {
    fn should_watch_for_change(&self) -> bool {
        self.reload_strategy.is_some()
    }

    fn reload_strategy(&self) -> Option<Arc<dyn ReloadStrategy>> {
        self.reload_strategy
            .as_ref()
            .map(|strategy| Arc::clone(strategy) as Arc<dyn ReloadStrategy>)
    }
}
