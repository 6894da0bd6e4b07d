//
//  watcher.rs
//  routegraph
//
//  Created by hak (tharun)
//

//! File change notifier: an initial scan followed by debounced file-system
//! events, delivered as [`FileEvent`]s on a tokio channel.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use notify::{RecommendedWatcher, RecursiveMode};
use notify_debouncer_mini::{new_debouncer, DebounceEventResult, Debouncer};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::config::RouteGraphConfig;
use crate::error::Result;
use crate::program::{has_source_extension, is_ignored, source_files};

/// A change to one analysed file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileEvent {
    Added { path: PathBuf, content: String },
    Updated { path: PathBuf, content: String },
    Removed { path: PathBuf },
    /// Every file present at start-up has been sent.
    Ready,
}

impl FileEvent {
    pub fn path(&self) -> Option<&Path> {
        match self {
            FileEvent::Added { path, .. }
            | FileEvent::Updated { path, .. }
            | FileEvent::Removed { path } => Some(path),
            FileEvent::Ready => None,
        }
    }
}

/// Watches the configured locations for source changes.
pub struct FileWatcher {
    locations: Vec<PathBuf>,
    extensions: Vec<String>,
    ignore: Vec<String>,
    debounce: Duration,
    known: Arc<Mutex<HashSet<PathBuf>>>,
    debouncer: Option<Debouncer<RecommendedWatcher>>,
}

impl FileWatcher {
    pub fn new(
        locations: Vec<PathBuf>,
        extensions: Vec<String>,
        ignore: Vec<String>,
        debounce_ms: u64,
    ) -> Self {
        Self {
            locations,
            extensions,
            ignore,
            debounce: Duration::from_millis(debounce_ms.max(1)),
            known: Arc::new(Mutex::new(HashSet::new())),
            debouncer: None,
        }
    }

    pub fn from_config(config: &RouteGraphConfig, root: &Path) -> Self {
        Self::new(
            config.watch_locations(root),
            config.project.extensions.clone(),
            config.project.ignore.clone(),
            config.monitor.watch_debounce_ms,
        )
    }

    pub fn locations(&self) -> &[PathBuf] {
        &self.locations
    }

    pub fn is_watching(&self) -> bool {
        self.debouncer.is_some()
    }

    /// Send an `Added` event for every existing file, then `Ready`, then keep
    /// watching. Events arrive on the returned receiver.
    pub fn start(&mut self) -> Result<mpsc::UnboundedReceiver<FileEvent>> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.scan(&tx);

        let known = Arc::clone(&self.known);
        let extensions = self.extensions.clone();
        let ignore = self.ignore.clone();
        // Backends may report canonical paths.
        let locations: Vec<PathBuf> = self
            .locations
            .iter()
            .flat_map(|l| [l.clone(), l.canonicalize().unwrap_or_else(|_| l.clone())])
            .collect();
        let mut debouncer = new_debouncer(self.debounce, move |res: DebounceEventResult| match res {
            Ok(events) => {
                let mut paths: Vec<PathBuf> = events.into_iter().map(|e| e.path).collect();
                paths.sort();
                paths.dedup();
                for path in paths {
                    if !is_watched(&path, &locations, &ignore) || !has_source_extension(&path, &extensions) {
                        continue;
                    }
                    let event = match known.lock() {
                        Ok(mut known) => classify(&path, &mut known),
                        Err(_) => None,
                    };
                    if let Some(event) = event {
                        debug!(path = %path.display(), "file change");
                        let _ = tx.send(event);
                    }
                }
            }
            Err(e) => warn!(error = %e, "watch error"),
        })?;

        for location in &self.locations {
            if !location.exists() {
                warn!(path = %location.display(), "watch location does not exist");
                continue;
            }
            debouncer
                .watcher()
                .watch(location, RecursiveMode::Recursive)?;
        }
        info!(locations = self.locations.len(), "file watcher started");
        self.debouncer = Some(debouncer);
        Ok(rx)
    }

    /// Initial scan: one `Added` per analysable file, then `Ready`.
    pub fn scan(&self, tx: &mpsc::UnboundedSender<FileEvent>) {
        let files = source_files(&self.locations, &self.extensions, &self.ignore);
        let Ok(mut known) = self.known.lock() else {
            return;
        };
        for path in files {
            match fs::read_to_string(&path) {
                Ok(content) => {
                    known.insert(path.clone());
                    let _ = tx.send(FileEvent::Added { path, content });
                }
                Err(e) => warn!(path = %path.display(), error = %e, "failed to read file"),
            }
        }
        debug!(files = known.len(), "initial scan complete");
        let _ = tx.send(FileEvent::Ready);
    }

    /// Stop watching. Already queued events are still delivered.
    pub fn stop(&mut self) {
        if self.debouncer.take().is_some() {
            info!("file watcher stopped");
        }
    }
}

/// Whether `path` lies under one of `locations` and outside any ignored
/// directory below it.
fn is_watched(path: &Path, locations: &[PathBuf], ignore: &[String]) -> bool {
    locations
        .iter()
        .find(|location| path.starts_with(location))
        .is_some_and(|location| !is_ignored(path, location, ignore))
}

/// Map a changed path to an event, tracking which files have been seen.
fn classify(path: &Path, known: &mut HashSet<PathBuf>) -> Option<FileEvent> {
    if path.is_file() {
        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "failed to read changed file");
                return None;
            }
        };
        let path = path.to_path_buf();
        if known.insert(path.clone()) {
            Some(FileEvent::Added { path, content })
        } else {
            Some(FileEvent::Updated { path, content })
        }
    } else if known.remove(path) {
        Some(FileEvent::Removed {
            path: path.to_path_buf(),
        })
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_classify_tracks_lifecycle() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("app.ts");
        let mut known = HashSet::new();

        fs::write(&file, "const a = 1;").unwrap();
        assert!(matches!(classify(&file, &mut known), Some(FileEvent::Added { .. })));

        fs::write(&file, "const a = 2;").unwrap();
        match classify(&file, &mut known) {
            Some(FileEvent::Updated { content, .. }) => assert_eq!(content, "const a = 2;"),
            other => panic!("expected an update, got {other:?}"),
        }

        fs::remove_file(&file).unwrap();
        assert_eq!(
            classify(&file, &mut known),
            Some(FileEvent::Removed { path: file.clone() })
        );
        assert_eq!(classify(&file, &mut known), None, "unknown files are not reported");
    }

    #[test]
    fn test_is_watched_checks_below_location_only() {
        let locations = vec![PathBuf::from("/home/dev/build/app/src")];
        let ignore = vec!["generated".to_string()];

        assert!(is_watched(Path::new("/home/dev/build/app/src/index.ts"), &locations, &ignore));
        assert!(!is_watched(Path::new("/home/dev/build/app/src/dist/a.ts"), &locations, &ignore));
        assert!(!is_watched(Path::new("/home/dev/build/app/src/generated/a.ts"), &locations, &ignore));
        assert!(!is_watched(Path::new("/home/dev/other/index.ts"), &locations, &ignore));
    }

    #[test]
    fn test_scan_sends_files_then_ready() {
        let dir = tempdir().unwrap();
        fs::create_dir_all(dir.path().join("src/routes")).unwrap();
        fs::write(dir.path().join("src/index.ts"), "export {};").unwrap();
        fs::write(dir.path().join("src/routes/users.ts"), "export {};").unwrap();
        fs::write(dir.path().join("src/notes.md"), "# notes").unwrap();

        let watcher = FileWatcher::from_config(&RouteGraphConfig::default(), dir.path());
        assert_eq!(watcher.locations(), &[dir.path().join("src")]);

        let (tx, mut rx) = mpsc::unbounded_channel();
        watcher.scan(&tx);

        let mut added = Vec::new();
        loop {
            match rx.try_recv().unwrap() {
                FileEvent::Added { path, .. } => added.push(path),
                FileEvent::Ready => break,
                other => panic!("unexpected {other:?}"),
            }
        }
        assert_eq!(
            added,
            vec![dir.path().join("src/index.ts"), dir.path().join("src/routes/users.ts")]
        );
        assert!(!watcher.is_watching());
    }
}
