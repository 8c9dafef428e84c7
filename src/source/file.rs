//! Configuration files on the local filesystem.

use super::{ConfigurationSource, SourceCache, WatchableConfigurationSource};
use crate::error::{ConfigError, Result};
use crate::reload::{DEFAULT_DEBOUNCE, FileWatchReloadStrategy, ReloadStrategy};
use crate::tree::{ConfigFormat, ConfigTree};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Options for [`FileConfigurationSource`].
#[derive(Debug, Clone)]
pub struct FileSourceOptions {
    /// File to read.
    pub path: PathBuf,
    /// Substitute an empty tree when the file does not exist (default: false).
    pub ignore_missing_file: bool,
    /// Watch the file and reload on change (default: false).
    pub reload_on_change: bool,
    /// Debounce window for change notifications (default: 200ms).
    pub debounce: Duration,
    /// Text format; inferred from the extension when `None` (default).
    pub format: Option<ConfigFormat>,
}

impl FileSourceOptions {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            ignore_missing_file: false,
            reload_on_change: false,
            debounce: DEFAULT_DEBOUNCE,
            format: None,
        }
    }
}

/// Reads a YAML or JSON file.
pub struct FileConfigurationSource {
    path: PathBuf,
    ignore_missing_file: bool,
    format: ConfigFormat,
    cache: SourceCache,
    reload_strategy: Option<Arc<FileWatchReloadStrategy>>,
}

impl FileConfigurationSource {
    pub fn new(options: FileSourceOptions) -> Self {
        let format = options
            .format
            .unwrap_or_else(|| ConfigFormat::from_path(&options.path));
        let reload_strategy = options
            .reload_on_change
            .then(|| Arc::new(FileWatchReloadStrategy::new(&options.path, options.debounce)));

        Self {
            path: options.path,
            ignore_missing_file: options.ignore_missing_file,
            format,
            cache: SourceCache::new(),
            reload_strategy,
        }
    }

    /// A source for `path` with default options.
    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self::new(FileSourceOptions::new(path))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn build(&self) -> Result<ConfigTree> {
        let origin = self.path.display().to_string();
        match std::fs::read_to_string(&self.path) {
            Ok(text) => ConfigTree::parse(&text, self.format, &origin),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(
                    path = %origin,
                    ignore_missing = self.ignore_missing_file,
                    "Missing configuration file"
                );
                if self.ignore_missing_file {
                    Ok(ConfigTree::empty())
                } else {
                    Err(ConfigError::missing_resource(origin))
                }
            }
            Err(source) => Err(ConfigError::Io { origin, source }),
        }
    }
}

impl ConfigurationSource for FileConfigurationSource {
    fn get_config(&self) -> Result<ConfigTree> {
        self.cache.get_or_build(|| self.build())
    }

    fn reload(&self) {
        debug!(path = %self.path.display(), "Invalidating cached configuration file");
        self.cache.invalidate();
    }

    fn describe(&self) -> String {
        format!("file:{}", self.path.display())
    }

    fn as_watchable(&self) -> Option<&dyn WatchableConfigurationSource> {
        Some(self)
    }
}

impl WatchableConfigurationSource for FileConfigurationSource {
    fn should_watch_for_change(&self) -> bool {
        self.reload_strategy.is_some()
    }

    fn reload_strategy(&self) -> Option<Arc<dyn ReloadStrategy>> {
        self.reload_strategy
            .as_ref()
            .map(|strategy| Arc::clone(strategy) as Arc<dyn ReloadStrategy>)
    }
}
