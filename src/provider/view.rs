use super::ConfigurationProvider;
use crate::notifier::{ChangeListener, ChangeListenersNotifier};
use std::sync::Arc;

type Extractor<P, C> = Arc<dyn Fn(&P) -> C + Send + Sync>;

/// A projection of a parent provider's value.
///
/// Holds no cache of its own: `get` extracts from the parent's current value.
/// Parent changes are forwarded as `(extract(old), extract(new))` through the
/// view's own notifier, so changes outside the projection stay silent. Views
/// of views chain the same way.
pub struct ConfigurationViewProvider<P, C> {
    parent: Arc<dyn ConfigurationProvider<P>>,
    extractor: Extractor<P, C>,
    notifier: Arc<ChangeListenersNotifier<C>>,
}

impl<P, C> ConfigurationViewProvider<P, C>
where
    P: Send + Sync + 'static,
    C: PartialEq + Send + Sync + 'static,
{
    pub fn new(
        parent: Arc<dyn ConfigurationProvider<P>>,
        extractor: impl Fn(&P) -> C + Send + Sync + 'static,
    ) -> Self {
        let extractor: Extractor<P, C> = Arc::new(extractor);
        let notifier = Arc::new(ChangeListenersNotifier::new());

        // The parent keeps only the notifier and extractor alive, not the view.
        let forward_to = Arc::clone(&notifier);
        let extract = Arc::clone(&extractor);
        parent.register_change_listener(Box::new(move |old, new| {
            forward_to.notify_listeners_on_config_change_if_needed(&extract(old), &extract(new));
        }));

        Self {
            parent,
            extractor,
            notifier,
        }
    }
}

impl<P, C> ConfigurationProvider<C> for ConfigurationViewProvider<P, C>
where
    P: Send + Sync + 'static,
    C: PartialEq + Send + Sync + 'static,
{
    fn get(&self) -> Arc<C> {
        let parent = self.parent.get();
        Arc::new((self.extractor)(&parent))
    }

    fn register_change_listener(&self, listener: ChangeListener<C>) {
        self.notifier.register_change_listener(listener);
    }
}

impl<P, C> Clone for ConfigurationViewProvider<P, C> {
    fn clone(&self) -> Self {
        Self {
            parent: Arc::clone(&self.parent),
            extractor: Arc::clone(&self.extractor),
            notifier: Arc::clone(&self.notifier),
        }
    }
}
