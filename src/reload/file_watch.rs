//! Reloads driven by filesystem change notifications.
//!
//! Watches the parent directory of a configuration file (so that editors
//! which replace the file by rename are still observed) and triggers a reload
//! whenever a debounced batch of events touches the file.

use super::{ReloadCallback, ReloadStrategy, invoke_safely};
use notify::RecursiveMode;
use notify_debouncer_mini::{
    DebounceEventResult, DebouncedEvent, DebouncedEventKind, Debouncer, new_debouncer,
};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::sync::mpsc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, error, info, warn};

const NAME: &str = "file-watch";

/// Default debounce window for coalescing rapid file changes.
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(200);

/// Triggers a reload when a watched file changes on disk.
pub struct FileWatchReloadStrategy {
    path: PathBuf,
    debounce: Duration,
    watch: Mutex<Option<ActiveWatch>>,
}

/// Keeps the debouncer alive. Dropping it closes the event channel,
/// which ends the event thread.
struct ActiveWatch {
    debouncer: Debouncer<notify::RecommendedWatcher>,
    handle: JoinHandle<()>,
}

impl FileWatchReloadStrategy {
    pub fn new(path: impl Into<PathBuf>, debounce: Duration) -> Self {
        Self {
            path: path.into(),
            debounce,
            watch: Mutex::new(None),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn watch_dir(&self) -> PathBuf {
        match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        }
    }

    fn open(&self, callback: ReloadCallback) -> Result<ActiveWatch, notify::Error> {
        let (event_tx, event_rx) = mpsc::channel();
        let mut debouncer = new_debouncer(self.debounce, event_tx)?;

        let watch_dir = self.watch_dir();
        debouncer
            .watcher()
            .watch(&watch_dir, RecursiveMode::NonRecursive)?;
        info!(dir = %watch_dir.display(), file = %self.path.display(), "Watching configuration file");

        let target = self.path.clone();
        let handle = thread::Builder::new()
            .name("config-file-watch".to_string())
            .spawn(move || process_events(event_rx, &target, callback))
            .map_err(|e| notify::Error::generic(&e.to_string()))?;

        Ok(ActiveWatch { debouncer, handle })
    }

    fn close(watch: ActiveWatch) {
        let ActiveWatch { debouncer, handle } = watch;
        drop(debouncer);
        if handle.thread().id() != thread::current().id() && handle.join().is_err() {
            error!(strategy = NAME, "File watch thread terminated abnormally");
        }
    }
}

impl ReloadStrategy for FileWatchReloadStrategy {
    fn start(&self, callback: ReloadCallback) {
        let active = match self.open(callback) {
            Ok(active) => active,
            Err(e) => {
                warn!(
                    file = %self.path.display(),
                    error = %e,
                    "Failed to start configuration file watcher; changes will not be observed"
                );
                return;
            }
        };

        let previous = self
            .watch
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .replace(active);
        if let Some(previous) = previous {
            Self::close(previous);
        }
    }

    fn stop(&self) {
        let active = self
            .watch
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take();
        if let Some(active) = active {
            info!(file = %self.path.display(), "Stopping configuration file watcher");
            Self::close(active);
        }
    }

    fn name(&self) -> &'static str {
        NAME
    }
}

impl Drop for FileWatchReloadStrategy {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Forward debounced batches touching `target` to the callback until the
/// debouncer is dropped.
fn process_events(rx: mpsc::Receiver<DebounceEventResult>, target: &Path, callback: ReloadCallback) {
    loop {
        match rx.recv() {
            Ok(Ok(events)) => {
                if touches_target(&events, target) {
                    debug!(file = %target.display(), "Configuration file change detected");
                    invoke_safely(NAME, callback.as_ref());
                }
            }
            Ok(Err(e)) => {
                error!(file = %target.display(), error = %e, "File watcher error");
            }
            Err(_) => {
                debug!(file = %target.display(), "Configuration file watcher channel closed");
                return;
            }
        }
    }
}

/// Returns true if any data-change event in the batch refers to `target`.
fn touches_target(events: &[DebouncedEvent], target: &Path) -> bool {
    let file_name = target.file_name();
    events.iter().any(|event| {
        matches!(
            event.kind,
            DebouncedEventKind::Any | DebouncedEventKind::AnyContinuous
        ) && (event.path == target || (file_name.is_some() && event.path.file_name() == file_name))
    })
}
