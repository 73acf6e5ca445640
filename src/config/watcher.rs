//! File watcher for hot reload.

use std::fmt::Display;
use std::path::{Path, PathBuf};
use std::time::Duration;

use notify::{Config, Event, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;

/// A watcher that reloads a file whenever it changes on disk.
///
/// Each successful reload is parsed with `load` and sent to the receiver
/// returned by [`FileWatcher::new`]. A reload that fails to parse is logged
/// and dropped, so consumers keep whatever they loaded last.
pub struct FileWatcher<T, F> {
    path: PathBuf,
    load: F,
    update_tx: mpsc::UnboundedSender<T>,
}

impl<T, E, F> FileWatcher<T, F>
where
    T: Send + 'static,
    E: Display,
    F: Fn(&Path) -> Result<T, E> + Send + 'static,
{
    /// Create a new FileWatcher.
    ///
    /// Returns the watcher and a receiver for reloaded values.
    pub fn new(path: &Path, load: F) -> (Self, mpsc::UnboundedReceiver<T>) {
        let (update_tx, update_rx) = mpsc::unbounded_channel();

        (
            Self {
                path: path.to_path_buf(),
                load,
                update_tx,
            },
            update_rx,
        )
    }

    /// Start watching the file in a background thread.
    ///
    /// Watching stops when the returned handle is dropped.
    pub fn run(self) -> Result<RecommendedWatcher, notify::Error> {
        let tx = self.update_tx;
        let load = self.load;
        let path = self.path.clone();

        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| match res {
                Ok(event) => {
                    if event.kind.is_modify() || event.kind.is_create() {
                        tracing::info!(path = ?path, "File change detected, reloading");
                        match load(&path) {
                            Ok(value) => {
                                let _ = tx.send(value);
                            }
                            Err(e) => {
                                tracing::error!(
                                    path = ?path,
                                    error = %e,
                                    "Failed to reload file, keeping current contents"
                                );
                            }
                        }
                    }
                }
                Err(e) => tracing::error!(error = ?e, "Watch error"),
            },
            Config::default().with_poll_interval(Duration::from_secs(2)),
        )?;

        watcher.watch(&self.path, RecursiveMode::NonRecursive)?;

        tracing::info!(path = ?self.path, "File watcher started");
        Ok(watcher)
    }
}
