use super::{ConfigurationProvider, ProviderOptions};
use crate::error::{ConfigError, Result};
use crate::ext::ConfigurationExtensions;
use crate::notifier::{ChangeListener, ChangeListenersNotifier};
use crate::reload::{ReloadCallback, ReloadStrategy, panic_message};
use crate::source::{ConfigurationSource, compose_sources, watch_strategy};
use crate::tree::ConfigTree;
use arc_swap::ArcSwap;
use serde::de::DeserializeOwned;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex, PoisonError, Weak};
use std::thread::{self, ThreadId};
use tracing::{debug, error, info, trace, warn};

/// The provider that owns sources, reload strategies and the cached value.
///
/// Handles are cheap to clone and share one cache. Construction performs the
/// initial load synchronously and fails if it fails, so a live provider always
/// has a value. Background reloads that fail are logged and leave the previous
/// value in place.
///
/// Reloads are serialized per provider; `get` never waits for them. Listeners
/// run on the thread that triggered the reload, in reload order. A listener
/// may call `close`: reloads queued behind the running one are abandoned. A
/// `reload` issued from a listener of the same provider is skipped.
pub struct RootConfigurationProvider<T> {
    inner: Arc<ProviderInner<T>>,
}

/// A resolved tree and the value converted from it.
struct CachedConfiguration<T> {
    tree: ConfigTree,
    configuration: Arc<T>,
}

struct ProviderInner<T> {
    source: Arc<dyn ConfigurationSource>,
    config_root_path: Option<String>,
    extensions: ConfigurationExtensions<T>,
    cache: ArcSwap<CachedConfiguration<T>>,
    notifier: ChangeListenersNotifier<T>,
    strategies: Vec<Arc<dyn ReloadStrategy>>,
    gate: ReloadGate,
    closed: AtomicBool,
}

/// Admits one reload at a time.
///
/// Waiting reloads give up once the provider is closed, so `close` can join
/// strategy threads that are queued behind a running reload.
#[derive(Default)]
struct ReloadGate {
    owner: Mutex<Option<ThreadId>>,
    released: Condvar,
}

/// Held for the duration of one reload.
struct ReloadPass<'a> {
    gate: &'a ReloadGate,
}

impl ReloadGate {
    fn enter(&self, closed: &AtomicBool) -> Option<ReloadPass<'_>> {
        let current = thread::current().id();
        let mut owner = self.owner.lock().unwrap_or_else(PoisonError::into_inner);
        loop {
            if closed.load(Ordering::Acquire) {
                debug!("Provider closed - ignoring reload");
                return None;
            }
            match *owner {
                None => break,
                Some(id) if id == current => {
                    warn!("Reload requested from a change listener - skipping");
                    return None;
                }
                Some(_) => {
                    owner = self
                        .released
                        .wait(owner)
                        .unwrap_or_else(PoisonError::into_inner);
                }
            }
        }
        *owner = Some(current);
        Some(ReloadPass { gate: self })
    }

    /// Wake every waiting reload so it can observe `closed`.
    fn release_waiters(&self) {
        let _owner = self.owner.lock().unwrap_or_else(PoisonError::into_inner);
        self.released.notify_all();
    }
}

impl Drop for ReloadPass<'_> {
    fn drop(&mut self) {
        *self
            .gate
            .owner
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = None;
        self.gate.released.notify_one();
    }
}

impl<T> RootConfigurationProvider<T>
where
    T: DeserializeOwned + PartialEq + Send + Sync + 'static,
{
    pub fn new(options: ProviderOptions<T>) -> Result<Self> {
        let ProviderOptions {
            source,
            fallbacks,
            reload_strategies,
            config_root_path,
            extensions,
        } = options;

        let mut strategies: Vec<Arc<dyn ReloadStrategy>> = Vec::new();
        strategies.extend(watch_strategy(source.as_ref()));
        strategies.extend(fallbacks.iter().filter_map(|f| watch_strategy(f.as_ref())));
        strategies.extend(reload_strategies);

        let source = compose_sources(source, fallbacks);
        let extensions = ConfigurationExtensions::new(extensions);
        debug!(source = %source.describe(), "Loading initial configuration");
        let initial = load_configuration(source.as_ref(), config_root_path.as_deref(), &extensions)
            .map_err(ConfigError::assembly)?;

        let inner = Arc::new(ProviderInner {
            source,
            config_root_path,
            extensions,
            cache: ArcSwap::from_pointee(initial),
            notifier: ChangeListenersNotifier::new(),
            strategies,
            gate: ReloadGate::default(),
            closed: AtomicBool::new(false),
        });

        // Strategies only start once the cache holds a value.
        let weak = Arc::downgrade(&inner);
        for strategy in &inner.strategies {
            debug!(strategy = strategy.name(), "Starting reload strategy");
            strategy.start(reload_callback(Weak::clone(&weak), strategy.name()));
        }

        info!(
            source = %inner.source.describe(),
            strategies = inner.strategies.len(),
            "Configuration provider ready"
        );
        Ok(Self { inner })
    }

    /// Re-fetch, convert and swap in the configuration.
    ///
    /// Listeners are notified with `(old, new)` if the value changed. On
    /// failure the previous value stays cached. Ignored after `close`.
    pub fn reload(&self) -> Result<()> {
        self.inner.reload()
    }

    /// The resolved tree the current value was converted from.
    pub fn config_tree(&self) -> ConfigTree {
        self.inner.cache.load().tree.clone()
    }

    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::Acquire)
    }
}

impl<T> ConfigurationProvider<T> for RootConfigurationProvider<T>
where
    T: DeserializeOwned + PartialEq + Send + Sync + 'static,
{
    fn get(&self) -> Arc<T> {
        Arc::clone(&self.inner.cache.load().configuration)
    }

    fn register_change_listener(&self, listener: ChangeListener<T>) {
        self.inner.notifier.register_change_listener(listener);
    }

    fn close(&self) {
        self.inner.close();
    }
}

impl<T> Clone for RootConfigurationProvider<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

fn reload_callback<T>(inner: Weak<ProviderInner<T>>, strategy: &'static str) -> ReloadCallback
where
    T: DeserializeOwned + PartialEq + Send + Sync + 'static,
{
    Arc::new(move || {
        let Some(inner) = inner.upgrade() else {
            trace!(strategy, "Provider dropped - skipping reload");
            return;
        };
        if let Err(e) = inner.reload() {
            warn!(
                strategy,
                error = %e,
                "Configuration reload failed; keeping current configuration"
            );
        }
    })
}

/// Fetch, resolve, project, convert and check one configuration value.
fn load_configuration<T: DeserializeOwned>(
    source: &dyn ConfigurationSource,
    config_root_path: Option<&str>,
    extensions: &ConfigurationExtensions<T>,
) -> Result<CachedConfiguration<T>> {
    let tree = source.get_config()?.resolve()?;
    let tree = match config_root_path {
        Some(path) if !path.is_empty() => {
            tree.at_path(path)
                .ok_or_else(|| ConfigError::MissingRootPath {
                    path: path.to_string(),
                })?
        }
        _ => tree,
    };

    let type_name = std::any::type_name::<T>();
    extensions.before_type_conversion(&tree, type_name)?;
    let configuration: T = serde_json::from_value(tree.as_value().clone())
        .map_err(|source| ConfigError::Conversion { type_name, source })?;
    extensions.after_config_assembly(&configuration)?;

    Ok(CachedConfiguration {
        tree,
        configuration: Arc::new(configuration),
    })
}

impl<T> ProviderInner<T>
where
    T: DeserializeOwned + PartialEq + Send + Sync + 'static,
{
    fn reload(&self) -> Result<()> {
        let Some(_pass) = self.gate.enter(&self.closed) else {
            return Ok(());
        };

        self.source.reload();
        let fresh = load_configuration(
            self.source.as_ref(),
            self.config_root_path.as_deref(),
            &self.extensions,
        )
        .map_err(ConfigError::assembly)?;

        let current = self.cache.load_full();
        if current.tree == fresh.tree {
            trace!("Configuration tree unchanged");
            return Ok(());
        }

        let fresh = Arc::new(fresh);
        let previous = self.cache.swap(Arc::clone(&fresh));
        debug!(source = %self.source.describe(), "Configuration reloaded");
        self.notifier
            .notify_listeners_on_config_change_if_needed(&previous.configuration, &fresh.configuration);
        Ok(())
    }
}

impl<T> ProviderInner<T> {
    fn close(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        info!("Closing configuration provider");
        self.gate.release_waiters();
        for strategy in &self.strategies {
            if let Err(panic) = catch_unwind(AssertUnwindSafe(|| strategy.stop())) {
                error!(
                    strategy = strategy.name(),
                    panic = %panic_message(panic.as_ref()),
                    "Unknown error thrown while stopping reload strategy"
                );
            }
        }
        self.extensions.close_extensions();
    }
}

impl<T> Drop for ProviderInner<T> {
    fn drop(&mut self) {
        self.close();
    }
}
