//! Configuration providers.
//!
//! A [`RootConfigurationProvider`] owns the source, the reload strategies and
//! the cached typed value. A [`ConfigurationViewProvider`] projects a parent's
//! value through an extraction function and re-publishes only the changes that
//! affect the projection.

mod options;
mod root;
mod view;

pub use options::ProviderOptions;
pub use root::RootConfigurationProvider;
pub use view::ConfigurationViewProvider;

use crate::notifier::ChangeListener;
use std::sync::Arc;

/// Read access to a typed configuration value plus change notification.
pub trait ConfigurationProvider<T>: Send + Sync {
    /// The current value. Never blocks on a reload in progress.
    fn get(&self) -> Arc<T>;

    /// Register a callback for `(old, new)` pairs of differing values.
    fn register_change_listener(&self, listener: ChangeListener<T>);

    /// Release background resources. Views own none.
    fn close(&self) {}

    /// A provider of the part of this provider's value selected by `extractor`.
    fn create_configuration_provider<C, F>(&self, extractor: F) -> ConfigurationViewProvider<T, C>
    where
        Self: Sized + Clone + 'static,
        T: Send + Sync + 'static,
        C: PartialEq + Send + Sync + 'static,
        F: Fn(&T) -> C + Send + Sync + 'static,
    {
        ConfigurationViewProvider::new(Arc::new(self.clone()), extractor)
    }
}
