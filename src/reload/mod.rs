//! Reload strategies decide *when* a provider re-fetches its configuration.
//!
//! A strategy is started with a callback and invokes it whenever a reload is
//! due: on a timer, or when the backing store reports a change. A panic inside
//! the callback is caught and logged; the strategy keeps running.

mod file_watch;
mod kv_watch;
mod periodical;

pub use file_watch::{DEFAULT_DEBOUNCE, FileWatchReloadStrategy};
pub use kv_watch::{DEFAULT_WATCH_TIMEOUT, KvWatchReloadStrategy};
pub use periodical::PeriodicalReloadStrategy;

use std::any::Any;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use tracing::error;

/// Callback a strategy invokes to trigger a reload.
pub type ReloadCallback = Arc<dyn Fn() + Send + Sync>;

/// Drives reloads of a configuration provider.
///
/// Lifecycle: `start` → zero or more callback invocations → `stop`.
/// `stop` is idempotent and a no-op if `start` was never called.
pub trait ReloadStrategy: Send + Sync {
    /// Begin triggering `callback`. Must not block indefinitely.
    fn start(&self, callback: ReloadCallback);

    /// Stop triggering and release background resources.
    fn stop(&self);

    /// Short name used in log messages.
    fn name(&self) -> &'static str;
}

/// Run a reload callback, catching and logging a panic.
///
/// Returns false if the callback panicked.
pub(crate) fn invoke_safely(strategy: &str, callback: &(dyn Fn() + Send + Sync)) -> bool {
    match catch_unwind(AssertUnwindSafe(callback)) {
        Ok(()) => true,
        Err(panic) => {
            error!(
                strategy,
                panic = %panic_message(panic.as_ref()),
                "Unknown error thrown while reloading configuration"
            );
            false
        }
    }
}

/// Best-effort text of a panic payload.
pub(crate) fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
