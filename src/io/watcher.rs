use std::path::{Path, PathBuf};
use std::sync::mpsc;

use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};

use crate::io::store_io::STORE_FILE;

/// Events sent from the file watcher to whoever polls it.
#[derive(Debug)]
pub enum StoreEvent {
    /// The store document or config changed on disk.
    Changed(Vec<PathBuf>),
}

/// A file system watcher for a `.ordo/` directory, reporting writes made by
/// other processes.
pub struct StoreWatcher {
    _watcher: RecommendedWatcher,
    rx: mpsc::Receiver<StoreEvent>,
}

/// Whether a change to `path` matters to readers of the store
fn is_relevant(store_dir: &Path, path: &Path) -> bool {
    if !path.starts_with(store_dir) {
        return false;
    }
    matches!(
        path.file_name().and_then(|n| n.to_str()),
        Some(name) if name == STORE_FILE || name == "config.toml"
    )
}

impl StoreWatcher {
    /// Start watching the given `.ordo/` directory.
    /// Call `poll()` periodically to collect events.
    pub fn start(store_dir: &Path) -> Result<Self, notify::Error> {
        let (tx, rx) = mpsc::channel();
        let store_dir_owned = store_dir.to_path_buf();

        let mut watcher = RecommendedWatcher::new(
            move |result: Result<Event, notify::Error>| {
                let event = match result {
                    Ok(e) => e,
                    Err(e) => {
                        tracing::warn!(error = %e, "store watcher error");
                        return;
                    }
                };

                // Atomic writes show up as a create or rename of the target
                match event.kind {
                    EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_) => {}
                    _ => return,
                }

                let relevant: Vec<PathBuf> = event
                    .paths
                    .into_iter()
                    .filter(|p| is_relevant(&store_dir_owned, p))
                    .collect();

                if !relevant.is_empty() {
                    let _ = tx.send(StoreEvent::Changed(relevant));
                }
            },
            Config::default(),
        )?;

        watcher.watch(store_dir, RecursiveMode::NonRecursive)?;
        Ok(StoreWatcher {
            _watcher: watcher,
            rx,
        })
    }

    /// Non-blocking poll for pending file events.
    /// Returns all queued events (may be empty).
    pub fn poll(&self) -> Vec<StoreEvent> {
        let mut events = Vec::new();
        while let Ok(evt) = self.rx.try_recv() {
            events.push(evt);
        }
        events
    }

    /// Block until an event arrives or the watcher shuts down.
    pub fn wait(&self) -> Option<StoreEvent> {
        self.rx.recv().ok()
    }
}
