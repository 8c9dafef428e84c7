//! Configuration sources.
//!
//! A source produces a [`ConfigTree`] on demand. Leaf sources read one backing
//! resource (an embedded resource, a file, a key in a key-value store) and
//! cache the parsed tree until told to [`reload`](ConfigurationSource::reload).
//! [`MergeConfigurationSource`] composes a primary source with a fallback.
//!
//! ## Precedence
//! `compose_sources(primary, [f1, f2])` yields `Merge(Merge(primary, f1), f2)`:
//! the primary wins, `f1` fills its gaps, `f2` fills whatever is still missing.

mod embedded;
mod file;
mod kv;
mod merge;

pub use embedded::{EmbeddedConfigurationSource, EmbeddedResources};
pub use file::{FileConfigurationSource, FileSourceOptions};
pub use kv::{KvConfigurationSource, KvSourceOptions};
pub use merge::MergeConfigurationSource;

use crate::error::Result;
use crate::reload::ReloadStrategy;
use crate::tree::ConfigTree;
use arc_swap::ArcSwapOption;
use std::sync::Arc;

/// Produces configuration trees on demand.
pub trait ConfigurationSource: Send + Sync {
    /// Current tree. Fails with `MissingResource` when the backing resource
    /// is absent and the source does not tolerate absence.
    fn get_config(&self) -> Result<ConfigTree>;

    /// Discard any cached tree so the next `get_config` re-fetches.
    fn reload(&self);

    /// Human-readable description for log messages.
    fn describe(&self) -> String;

    /// The watch capability of this source, if it has one.
    fn as_watchable(&self) -> Option<&dyn WatchableConfigurationSource> {
        None
    }
}

/// A source that knows how to observe changes of its own backing store.
///
/// Providers register the source's strategy automatically.
pub trait WatchableConfigurationSource: ConfigurationSource {
    fn should_watch_for_change(&self) -> bool;

    fn reload_strategy(&self) -> Option<Arc<dyn ReloadStrategy>>;
}

/// The reload strategy a source asks to be watched with, if any.
pub fn watch_strategy(source: &dyn ConfigurationSource) -> Option<Arc<dyn ReloadStrategy>> {
    let watchable = source.as_watchable()?;
    if !watchable.should_watch_for_change() {
        return None;
    }
    watchable.reload_strategy()
}

/// Fold fallbacks onto a primary source, earliest fallback strongest.
pub fn compose_sources(
    primary: Arc<dyn ConfigurationSource>,
    fallbacks: impl IntoIterator<Item = Arc<dyn ConfigurationSource>>,
) -> Arc<dyn ConfigurationSource> {
    fallbacks.into_iter().fold(primary, |source, fallback| {
        Arc::new(MergeConfigurationSource::new(source, fallback))
    })
}

/// Last tree produced by a leaf source.
///
/// Filled with build-if-absent semantics: only an empty cache triggers a
/// build, and the result is installed by compare-and-swap. Concurrent first
/// callers may each build, but all return whichever tree was stored first.
#[derive(Default)]
pub struct SourceCache {
    tree: ArcSwapOption<ConfigTree>,
}

impl SourceCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_or_build(&self, build: impl FnOnce() -> Result<ConfigTree>) -> Result<ConfigTree> {
        if let Some(tree) = self.tree.load_full() {
            return Ok(ConfigTree::clone(&tree));
        }

        let built = Arc::new(build()?);
        let previous = self
            .tree
            .compare_and_swap(&None::<Arc<ConfigTree>>, Some(Arc::clone(&built)));
        let stored = match &*previous {
            Some(existing) => Arc::clone(existing),
            None => built,
        };
        Ok(ConfigTree::clone(&stored))
    }

    pub fn invalidate(&self) {
        self.tree.store(None);
    }

    pub fn is_cached(&self) -> bool {
        self.tree.load().is_some()
    }
}
