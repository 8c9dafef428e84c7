//! Reloads driven by a key-value store's change subscription.

use super::{ReloadCallback, ReloadStrategy, invoke_safely};
use crate::kv::{KeyValueClient, KeyValueSubscription};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{error, info, warn};

const NAME: &str = "kv-watch";

/// Default bound on waiting for a subscription's initial sync.
pub const DEFAULT_WATCH_TIMEOUT: Duration = Duration::from_secs(10);

/// Subscribes to changes of one key path and reloads on every change.
///
/// `start` waits at most `timeout` for the subscription to go live. A slow or
/// unreachable store is logged, never propagated: `start` returns regardless.
pub struct KvWatchReloadStrategy {
    client: Arc<dyn KeyValueClient>,
    key: String,
    timeout: Duration,
    subscription: Mutex<Option<Box<dyn KeyValueSubscription>>>,
}

impl KvWatchReloadStrategy {
    pub fn new(client: Arc<dyn KeyValueClient>, key: impl Into<String>, timeout: Duration) -> Self {
        Self {
            client,
            key: key.into(),
            timeout,
            subscription: Mutex::new(None),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    fn cancel(&self, subscription: Box<dyn KeyValueSubscription>) {
        if let Err(e) = subscription.cancel() {
            warn!(key = %self.key, error = %e, "Unknown error occurred while stopping key-value reload strategy");
        }
    }
}

impl ReloadStrategy for KvWatchReloadStrategy {
    fn start(&self, callback: ReloadCallback) {
        info!(key = %self.key, "Starting key-value watch reload strategy");
        let on_change: ReloadCallback = Arc::new(move || {
            invoke_safely(NAME, callback.as_ref());
        });

        let subscription = match self.client.subscribe(&self.key, on_change) {
            Ok(subscription) => subscription,
            Err(e) => {
                error!(key = %self.key, error = %e, "Unknown error occurred while initializing key-value reload strategy");
                return;
            }
        };

        if let Err(e) = subscription.await_initialized(self.timeout) {
            error!(
                key = %self.key,
                timeout_ms = self.timeout.as_millis() as u64,
                error = %e,
                "Key-value watch did not initialize in time; continuing without confirmation"
            );
        }

        let previous = self
            .subscription
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .replace(subscription);
        if let Some(previous) = previous {
            self.cancel(previous);
        }
    }

    fn stop(&self) {
        let subscription = self
            .subscription
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take();
        if let Some(subscription) = subscription {
            info!(key = %self.key, "Stopping key-value watch reload strategy");
            self.cancel(subscription);
        }
    }

    fn name(&self) -> &'static str {
        NAME
    }
}

impl Drop for KvWatchReloadStrategy {
    fn drop(&mut self) {
        self.stop();
    }
}
