//! Change listener fan-out.

use crate::reload::panic_message;
use arc_swap::ArcSwap;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use tracing::{error, trace};

/// Callback receiving `(old, new)` configuration values.
pub type ChangeListener<T> = Box<dyn Fn(&T, &T) + Send + Sync>;

/// Registered listeners for one configuration value.
///
/// Listeners are notified only when the old and new values differ. The list
/// is append-only for the notifier's lifetime; notification works on a
/// snapshot, so a listener may register further listeners.
pub struct ChangeListenersNotifier<T> {
    listeners: ArcSwap<Vec<Arc<ChangeListener<T>>>>,
}

impl<T: PartialEq> ChangeListenersNotifier<T> {
    pub fn new() -> Self {
        Self {
            listeners: ArcSwap::from_pointee(Vec::new()),
        }
    }

    pub fn register_change_listener(&self, listener: ChangeListener<T>) {
        let listener = Arc::new(listener);
        self.listeners.rcu(|current| {
            let mut next = Vec::with_capacity(current.len() + 1);
            next.extend(current.iter().cloned());
            next.push(Arc::clone(&listener));
            next
        });
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.load().len()
    }

    /// Invoke every listener with `(old, new)` unless the two are equal.
    ///
    /// A panicking listener is logged and skipped; the rest still run.
    pub fn notify_listeners_on_config_change_if_needed(&self, old: &T, new: &T) {
        if old == new {
            trace!("Configurations are identical - not notifying listeners");
            return;
        }

        let listeners = self.listeners.load_full();
        if listeners.is_empty() {
            trace!("No listener to notify");
            return;
        }

        trace!(count = listeners.len(), "Notifying listeners about configuration change");
        for listener in listeners.iter() {
            if let Err(panic) = catch_unwind(AssertUnwindSafe(|| listener(old, new))) {
                error!(
                    panic = %panic_message(panic.as_ref()),
                    "Uncaught panic while notifying configuration change listener"
                );
            }
        }
        trace!(count = listeners.len(), "Listeners notified about configuration change");
    }
}

impl<T: PartialEq> Default for ChangeListenersNotifier<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    type Calls = Arc<Mutex<Vec<(String, i32, i32)>>>;

    fn recorder(name: &str, calls: &Calls) -> ChangeListener<i32> {
        let name = name.to_string();
        let calls = Arc::clone(calls);
        Box::new(move |old, new| {
            calls.lock().unwrap().push((name.clone(), *old, *new));
        })
    }

    #[test]
    fn test_equal_values_skip_listeners() {
        let notifier = ChangeListenersNotifier::new();
        let calls: Calls = Arc::default();
        notifier.register_change_listener(recorder("a", &calls));

        notifier.notify_listeners_on_config_change_if_needed(&1, &1);
        assert!(calls.lock().unwrap().is_empty());
    }

    #[test]
    fn test_change_notifies_in_registration_order() {
        let notifier = ChangeListenersNotifier::new();
        let calls: Calls = Arc::default();
        notifier.register_change_listener(recorder("a", &calls));
        notifier.register_change_listener(recorder("b", &calls));

        notifier.notify_listeners_on_config_change_if_needed(&1, &2);
        assert_eq!(
            *calls.lock().unwrap(),
            vec![("a".to_string(), 1, 2), ("b".to_string(), 1, 2)]
        );
    }

    #[test]
    fn test_panicking_listener_is_isolated() {
        let notifier = ChangeListenersNotifier::new();
        let calls: Calls = Arc::default();
        notifier.register_change_listener(Box::new(|_, _| panic!("listener bug")));
        notifier.register_change_listener(recorder("after", &calls));

        notifier.notify_listeners_on_config_change_if_needed(&1, &2);
        assert_eq!(*calls.lock().unwrap(), vec![("after".to_string(), 1, 2)]);
    }

    #[test]
    fn test_listener_may_register_listener() {
        let notifier = Arc::new(ChangeListenersNotifier::<i32>::new());
        let inner = Arc::clone(&notifier);
        notifier.register_change_listener(Box::new(move |_, _| {
            inner.register_change_listener(Box::new(|_, _| {}));
        }));

        notifier.notify_listeners_on_config_change_if_needed(&1, &2);
        assert_eq!(notifier.listener_count(), 2);
    }
}
