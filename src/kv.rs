//! Key-value store boundary.
//!
//! Consul/etcd-style stores are consumed through [`KeyValueClient`]: read the
//! value at a key, and subscribe to changes below a key. Network clients live
//! outside this crate; [`InMemoryKeyValueStore`] is an in-process store with
//! the same semantics, used when embedding and in tests.

use crate::error::{ConfigError, Result};
use crate::reload::{ReloadCallback, invoke_safely};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::{Arc, Mutex, RwLock};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, error, trace};

/// Client of a hierarchical key-value store.
pub trait KeyValueClient: Send + Sync {
    /// Value stored at `key`, or `None` if the key does not exist.
    fn get_value_as_string(&self, key: &str) -> Result<Option<String>>;

    /// Invoke `on_change` whenever `key` or anything below it changes.
    fn subscribe(&self, key: &str, on_change: ReloadCallback)
    -> Result<Box<dyn KeyValueSubscription>>;
}

/// A live change subscription.
pub trait KeyValueSubscription: Send {
    /// Block until the subscription has synced with the store, at most `timeout`.
    fn await_initialized(&self, timeout: Duration) -> Result<()>;

    /// Stop delivering changes.
    fn cancel(&self) -> Result<()>;
}

/// Thread-safe in-process key-value store.
///
/// Every subscription owns an event thread, so callbacks never run on the
/// thread that wrote the value.
#[derive(Clone, Default)]
pub struct InMemoryKeyValueStore {
    inner: Arc<StoreInner>,
}

#[derive(Default)]
struct StoreInner {
    values: RwLock<HashMap<String, String>>,
    watchers: Mutex<HashMap<u64, Watcher>>,
    next_id: AtomicU64,
    /// Artificial delay before a subscription reports itself initialized.
    sync_delay: Mutex<Duration>,
}

struct Watcher {
    prefix: String,
    events: mpsc::Sender<()>,
}

impl InMemoryKeyValueStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Delay new subscriptions' initial sync, simulating a slow store.
    pub fn set_sync_delay(&self, delay: Duration) {
        *self
            .inner
            .sync_delay
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = delay;
    }

    pub fn put(&self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        self.inner
            .values
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .insert(key.clone(), value.into());
        self.inner.notify(&key);
    }

    /// Remove a key. Returns true if it existed.
    pub fn delete(&self, key: &str) -> bool {
        let removed = self
            .inner
            .values
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .remove(key)
            .is_some();
        if removed {
            self.inner.notify(key);
        }
        removed
    }

    /// Number of live subscriptions.
    pub fn subscription_count(&self) -> usize {
        self.inner
            .watchers
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }
}

impl StoreInner {
    fn notify(&self, key: &str) {
        let watchers = self
            .watchers
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        for watcher in watchers.values() {
            if key.starts_with(&watcher.prefix) {
                trace!(key, prefix = %watcher.prefix, "Delivering key-value change");
                let _ = watcher.events.send(());
            }
        }
    }

    fn unregister(&self, id: u64) -> bool {
        self.watchers
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .remove(&id)
            .is_some()
    }
}

impl KeyValueClient for InMemoryKeyValueStore {
    fn get_value_as_string(&self, key: &str) -> Result<Option<String>> {
        Ok(self
            .inner
            .values
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(key)
            .cloned())
    }

    fn subscribe(
        &self,
        key: &str,
        on_change: ReloadCallback,
    ) -> Result<Box<dyn KeyValueSubscription>> {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        let (events_tx, events_rx) = mpsc::channel();
        let (ready_tx, ready_rx) = mpsc::channel();
        let sync_delay = *self
            .inner
            .sync_delay
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        self.inner
            .watchers
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .insert(
                id,
                Watcher {
                    prefix: key.to_string(),
                    events: events_tx,
                },
            );

        let watched = key.to_string();
        let spawned = thread::Builder::new()
            .name(format!("kv-watch-{id}"))
            .spawn(move || {
                if !sync_delay.is_zero() {
                    thread::sleep(sync_delay);
                }
                // Changes that arrived before the initial sync are part of it.
                while events_rx.try_recv().is_ok() {}
                let _ = ready_tx.send(());
                debug!(key = %watched, "Key-value subscription initialized");

                while events_rx.recv().is_ok() {
                    invoke_safely("kv-watch", on_change.as_ref());
                }
                debug!(key = %watched, "Key-value subscription closed");
            });

        let handle = match spawned {
            Ok(handle) => handle,
            Err(e) => {
                self.inner.unregister(id);
                return Err(ConfigError::store(format!(
                    "failed to spawn subscription thread: {e}"
                )));
            }
        };

        Ok(Box::new(InMemorySubscription {
            id,
            store: Arc::clone(&self.inner),
            ready: Mutex::new(ready_rx),
            handle: Mutex::new(Some(handle)),
        }))
    }
}

struct InMemorySubscription {
    id: u64,
    store: Arc<StoreInner>,
    ready: Mutex<mpsc::Receiver<()>>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl KeyValueSubscription for InMemorySubscription {
    fn await_initialized(&self, timeout: Duration) -> Result<()> {
        let ready = self
            .ready
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        match ready.recv_timeout(timeout) {
            Ok(()) => Ok(()),
            Err(RecvTimeoutError::Timeout) => Err(ConfigError::store(format!(
                "subscription not initialized within {}ms",
                timeout.as_millis()
            ))),
            Err(RecvTimeoutError::Disconnected) => {
                Err(ConfigError::store("subscription closed before initializing"))
            }
        }
    }

    fn cancel(&self) -> Result<()> {
        // Dropping the registered sender ends the event thread.
        if !self.store.unregister(self.id) {
            return Ok(());
        }
        let handle = self
            .handle
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take();
        if let Some(handle) = handle
            && handle.thread().id() != thread::current().id()
            && handle.join().is_err()
        {
            error!(id = self.id, "Key-value subscription thread terminated abnormally");
            return Err(ConfigError::store("subscription thread panicked"));
        }
        Ok(())
    }
}

impl Drop for InMemorySubscription {
    fn drop(&mut self) {
        self.store.unregister(self.id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::time::Instant;

    fn wait_for(count: &AtomicUsize, expected: usize) {
        let deadline = Instant::now() + Duration::from_secs(2);
        while count.load(Ordering::SeqCst) < expected && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(10));
        }
    }

    #[test]
    fn test_put_get_delete() {
        let store = InMemoryKeyValueStore::new();
        assert_eq!(store.get_value_as_string("app/config").unwrap(), None);

        store.put("app/config", "a: 1");
        assert_eq!(
            store.get_value_as_string("app/config").unwrap().as_deref(),
            Some("a: 1")
        );

        assert!(store.delete("app/config"));
        assert!(!store.delete("app/config"));
        assert_eq!(store.get_value_as_string("app/config").unwrap(), None);
    }

    #[test]
    fn test_subscription_receives_changes_below_prefix() {
        let store = InMemoryKeyValueStore::new();
        let count = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&count);
        let subscription = store
            .subscribe(
                "app/",
                Arc::new(move || {
                    counter.fetch_add(1, Ordering::SeqCst);
                }),
            )
            .unwrap();
        subscription
            .await_initialized(Duration::from_secs(1))
            .unwrap();

        store.put("app/config", "a: 1");
        store.put("other/config", "a: 1");
        wait_for(&count, 1);
        thread::sleep(Duration::from_millis(50));
        assert_eq!(count.load(Ordering::SeqCst), 1);

        subscription.cancel().unwrap();
        assert_eq!(store.subscription_count(), 0);
        store.put("app/config", "a: 2");
        thread::sleep(Duration::from_millis(50));
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_slow_initial_sync_times_out() {
        let store = InMemoryKeyValueStore::new();
        store.set_sync_delay(Duration::from_millis(300));
        let subscription = store.subscribe("app/", Arc::new(|| {})).unwrap();

        let err = subscription
            .await_initialized(Duration::from_millis(20))
            .unwrap_err();
        assert!(matches!(err, ConfigError::Store { .. }));
        subscription.cancel().unwrap();
    }

    #[test]
    fn test_cancel_twice_is_ok() {
        let store = InMemoryKeyValueStore::new();
        let subscription = store.subscribe("app/", Arc::new(|| {})).unwrap();
        subscription.cancel().unwrap();
        subscription.cancel().unwrap();
    }
}
