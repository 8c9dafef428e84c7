use crate::ext::ConfigurationExtension;
use crate::reload::ReloadStrategy;
use crate::source::ConfigurationSource;
use std::sync::Arc;

/// Everything a [`RootConfigurationProvider`](super::RootConfigurationProvider) is built from.
pub struct ProviderOptions<T> {
    /// Strongest source.
    pub source: Arc<dyn ConfigurationSource>,
    /// Weaker sources, strongest first. Default: none.
    pub fallbacks: Vec<Arc<dyn ConfigurationSource>>,
    /// Strategies started in addition to those of watchable sources. Default: none.
    pub reload_strategies: Vec<Arc<dyn ReloadStrategy>>,
    /// Dot-separated sub-tree to convert instead of the whole tree. Default: the root.
    pub config_root_path: Option<String>,
    /// Hooks around type conversion, in any order. Default: none.
    pub extensions: Vec<Arc<dyn ConfigurationExtension<T>>>,
}

impl<T> ProviderOptions<T> {
    pub fn new(source: Arc<dyn ConfigurationSource>) -> Self {
        Self {
            source,
            fallbacks: Vec::new(),
            reload_strategies: Vec::new(),
            config_root_path: None,
            extensions: Vec::new(),
        }
    }
}
