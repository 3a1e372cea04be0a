//! File watcher for detecting new screenshots.
//!
//! This module watches a single directory (non-recursively) for `*.png` files
//! and emits one [`ScreenshotEvent`] per new file.
//!
//! # Architecture
//!
//! The watcher uses the [`notify`] crate to monitor file system events and
//! maintains a seen set of paths so each file fires at most once. The set is
//! pre-populated with the files already present when the watch starts, so
//! pre-existing screenshots never produce events.
//!
//! The notify callback is kept lightweight by sending raw events through an
//! internal channel to a dedicated async task, which handles the stat calls
//! and seen-set bookkeeping.
//!
//! macOS writes screenshots to a hidden dotfile first and renames it into
//! place, so rename events are treated as appearance or removal depending on
//! whether the path still exists, and hidden files are ignored outright.
//!
//! # Example
//!
//! ```no_run
//! use std::path::PathBuf;
//! use tokio::sync::mpsc;
//! use scrscr::watcher::ScreenshotWatcher;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let (tx, mut rx) = mpsc::channel(100);
//!     let _watcher = ScreenshotWatcher::new(PathBuf::from("/Users/me/Screenshots"), tx)?;
//!
//!     while let Some(event) = rx.recv().await {
//!         println!("new screenshot: {}", event.path.display());
//!     }
//!
//!     Ok(())
//! }
//! ```

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use notify::{
    event::{CreateKind, ModifyKind, RemoveKind},
    Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher,
};
use thiserror::Error;
use tokio::sync::{mpsc, RwLock};
use tracing::{debug, error, info, trace, warn};

/// A new screenshot file detected in the watched directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScreenshotEvent {
    /// Path to the new file.
    pub path: PathBuf,
}

/// Internal events from the notify callback, processed by the async task.
#[derive(Debug)]
enum InternalEvent {
    Appeared(PathBuf),
    Renamed(PathBuf),
    Removed(PathBuf),
}

/// Errors that can occur during file watching operations.
#[derive(Error, Debug)]
pub enum WatcherError {
    /// Failed to initialize the file system watcher.
    #[error("failed to create watcher: {0}")]
    WatcherInit(#[from] notify::Error),

    /// Failed to scan the watch directory.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The watch directory does not exist or is not a directory.
    #[error("watch directory does not exist: {0}")]
    DirectoryNotFound(PathBuf),
}

/// Result type for watcher operations.
pub type Result<T> = std::result::Result<T, WatcherError>;

/// Watches a directory for new screenshot files.
///
/// Emits one [`ScreenshotEvent`] per `*.png` file that appears after the
/// watch starts. Files already present at startup are recorded but never
/// emitted. Dropping the watcher ends the subscription.
#[derive(Debug)]
pub struct ScreenshotWatcher {
    /// The underlying file system watcher.
    ///
    /// Kept alive to maintain the watch subscription. Dropping this will stop
    /// watching for events.
    #[allow(dead_code)]
    watcher: RecommendedWatcher,

    /// Paths that have already produced an event or existed at startup.
    seen: Arc<RwLock<HashSet<PathBuf>>>,

    /// The directory being watched.
    watch_dir: PathBuf,
}

impl ScreenshotWatcher {
    /// Creates a new watcher for the specified directory.
    ///
    /// On creation, the watcher:
    /// 1. Records the `*.png` files already present (these never emit events)
    /// 2. Begins monitoring the directory, non-recursively, for new files
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The watch directory does not exist or is not a directory
    /// - The file system watcher cannot be initialized
    /// - The initial directory scan fails
    pub fn new(watch_dir: PathBuf, event_sender: mpsc::Sender<ScreenshotEvent>) -> Result<Self> {
        if !watch_dir.is_dir() {
            return Err(WatcherError::DirectoryNotFound(watch_dir));
        }

        // Record existing files before subscribing so none of them fire
        let seen = Arc::new(RwLock::new(scan_existing_files(&watch_dir)?));

        info!(
            watch_dir = %watch_dir.display(),
            "Initialized screenshot watcher"
        );

        // Create internal channel for notify events
        // This channel bridges the sync notify callback to our async processing task
        let (internal_tx, internal_rx) = mpsc::channel::<InternalEvent>(1000);

        // Spawn the async processing task
        let seen_for_task = Arc::clone(&seen);
        tokio::spawn(async move {
            process_internal_events(internal_rx, seen_for_task, event_sender).await;
        });

        // Create the notify watcher with lightweight callback
        let watcher = create_watcher(internal_tx, watch_dir.clone())?;

        Ok(Self {
            watcher,
            seen,
            watch_dir,
        })
    }

    /// Returns the directory being watched.
    #[must_use]
    pub fn watch_dir(&self) -> &Path {
        &self.watch_dir
    }

    /// Returns the number of paths currently in the seen set.
    pub async fn seen_count(&self) -> usize {
        self.seen.read().await.len()
    }
}

/// Creates the underlying notify watcher with a lightweight callback.
///
/// The callback only filters and forwards events through the internal
/// channel; the stat calls and seen-set updates are done by the async task.
fn create_watcher(
    internal_tx: mpsc::Sender<InternalEvent>,
    watch_dir: PathBuf,
) -> Result<RecommendedWatcher> {
    let mut watcher = RecommendedWatcher::new(
        move |res: std::result::Result<Event, notify::Error>| {
            handle_notify_event(res, &internal_tx);
        },
        Config::default(),
    )?;

    // Only the top level of the screenshot directory is watched
    watcher.watch(&watch_dir, RecursiveMode::NonRecursive)?;

    debug!(
        watch_dir = %watch_dir.display(),
        "Started file watch"
    );

    Ok(watcher)
}

/// Handles events from the notify crate.
///
/// This callback is kept extremely lightweight - it only filters events and
/// sends them through a channel.
fn handle_notify_event(
    res: std::result::Result<Event, notify::Error>,
    internal_tx: &mpsc::Sender<InternalEvent>,
) {
    let event = match res {
        Ok(event) => event,
        Err(e) => {
            error!(error = %e, "File watcher error");
            return;
        }
    };

    trace!(kind = ?event.kind, paths = ?event.paths, "Received notify event");

    for path in &event.paths {
        if !is_watched_png(path) {
            continue;
        }

        let internal_event = match event.kind {
            EventKind::Create(CreateKind::File) | EventKind::Create(CreateKind::Any) => {
                Some(InternalEvent::Appeared(path.clone()))
            }
            EventKind::Modify(ModifyKind::Name(_)) => Some(InternalEvent::Renamed(path.clone())),
            EventKind::Remove(RemoveKind::File) | EventKind::Remove(RemoveKind::Any) => {
                Some(InternalEvent::Removed(path.clone()))
            }
            _ => {
                trace!(kind = ?event.kind, path = %path.display(), "Ignoring event kind");
                None
            }
        };

        if let Some(evt) = internal_event {
            // Use try_send to avoid blocking the notify thread
            // If the channel is full, we'll miss some events, but that's
            // preferable to blocking the file system watcher
            if let Err(e) = internal_tx.try_send(evt) {
                warn!(error = %e, "Failed to queue internal event, channel may be full");
            }
        }
    }
}

/// Returns whether a path is a visible `.png` file by name.
///
/// Hidden files are excluded because macOS writes screenshots to a dotfile
/// first and renames it into place once complete.
fn is_watched_png(path: &Path) -> bool {
    if path.extension().is_none_or(|ext| ext != "png") {
        return false;
    }
    path.file_name()
        .and_then(|name| name.to_str())
        .is_some_and(|name| !name.starts_with('.'))
}

/// Async task that processes internal events.
///
/// Centralizes the seen-set bookkeeping into a single managed task so the
/// notify callback never blocks on locks or I/O.
async fn process_internal_events(
    mut rx: mpsc::Receiver<InternalEvent>,
    seen: Arc<RwLock<HashSet<PathBuf>>>,
    sender: mpsc::Sender<ScreenshotEvent>,
) {
    while let Some(event) = rx.recv().await {
        match event {
            InternalEvent::Appeared(path) => {
                handle_appeared(&path, &seen, &sender).await;
            }
            InternalEvent::Renamed(path) => {
                // A rename shows up once for the old name and once for the
                // new one; a stat tells them apart
                if path.is_file() {
                    handle_appeared(&path, &seen, &sender).await;
                } else {
                    handle_removed(&path, &seen).await;
                }
            }
            InternalEvent::Removed(path) => {
                handle_removed(&path, &seen).await;
            }
        }
    }

    debug!("Internal event processor shutting down");
}

/// Handles a file appearance, emitting at most one event per path.
async fn handle_appeared(
    path: &Path,
    seen: &Arc<RwLock<HashSet<PathBuf>>>,
    sender: &mpsc::Sender<ScreenshotEvent>,
) {
    if !path.is_file() {
        trace!(path = %path.display(), "Ignoring non-file appearance");
        return;
    }

    {
        let mut guard = seen.write().await;
        if !guard.insert(path.to_path_buf()) {
            debug!(path = %path.display(), "Path already seen, skipping");
            return;
        }
    }

    info!(path = %path.display(), "New screenshot detected");

    if let Err(e) = sender
        .send(ScreenshotEvent {
            path: path.to_path_buf(),
        })
        .await
    {
        error!(error = %e, "Failed to send screenshot event");
    }
}

/// Handles a file removal so a later file with the same name fires again.
async fn handle_removed(path: &Path, seen: &Arc<RwLock<HashSet<PathBuf>>>) {
    let mut guard = seen.write().await;
    if guard.remove(path) {
        debug!(path = %path.display(), "Screenshot removed, cleared from seen set");
    }
}

/// Scans the top level of a directory for existing `.png` files.
///
/// These are recorded as seen on startup, meaning they never emit events.
fn scan_existing_files(dir: &Path) -> Result<HashSet<PathBuf>> {
    let mut seen = HashSet::new();

    for entry in fs::read_dir(dir)?.flatten() {
        let path = entry.path();
        if path.is_file() && is_watched_png(&path) {
            debug!(path = %path.display(), "Found existing screenshot");
            seen.insert(path);
        }
    }

    info!(file_count = seen.len(), "Scanned existing screenshots");

    Ok(seen)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use std::io::Write;
    use tempfile::TempDir;

    /// Creates a temporary directory with a test structure.
    fn create_test_dir() -> TempDir {
        tempfile::tempdir().expect("Failed to create temp dir")
    }

    /// Creates a file with the given content.
    fn create_file(dir: &Path, name: &str, content: &[u8]) -> PathBuf {
        let path = dir.join(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("Failed to create parent dirs");
        }
        let mut file = File::create(&path).expect("Failed to create file");
        file.write_all(content).expect("Failed to write content");
        path
    }

    #[test]
    fn test_filter_accepts_png() {
        assert!(is_watched_png(Path::new("/screens/shot.png")));
    }

    #[test]
    fn test_filter_rejects_other_extensions() {
        assert!(!is_watched_png(Path::new("/screens/shot.jpg")));
        assert!(!is_watched_png(Path::new("/screens/shot.png.part")));
        assert!(!is_watched_png(Path::new("/screens/notes.txt")));
    }

    #[test]
    fn test_filter_rejects_no_extension() {
        assert!(!is_watched_png(Path::new("/screens/README")));
    }

    #[test]
    fn test_filter_rejects_hidden_files() {
        // In-progress macOS captures are dotfiles until renamed
        assert!(!is_watched_png(Path::new("/screens/.shot.png")));
    }

    #[test]
    fn test_scan_existing_files() {
        let temp_dir = create_test_dir();

        create_file(temp_dir.path(), "one.png", b"png");
        create_file(temp_dir.path(), "two.png", b"png");
        create_file(temp_dir.path(), "notes.txt", b"text");
        create_file(temp_dir.path(), ".partial.png", b"png");

        let seen = scan_existing_files(temp_dir.path()).unwrap();

        assert_eq!(seen.len(), 2, "Should find exactly 2 visible PNG files");
        assert!(seen.contains(&temp_dir.path().join("one.png")));
        assert!(seen.contains(&temp_dir.path().join("two.png")));
    }

    #[test]
    fn test_scan_is_not_recursive() {
        let temp_dir = create_test_dir();

        create_file(temp_dir.path(), "top.png", b"png");
        create_file(temp_dir.path(), "nested/below.png", b"png");

        let seen = scan_existing_files(temp_dir.path()).unwrap();

        assert_eq!(seen.len(), 1);
        assert!(seen.contains(&temp_dir.path().join("top.png")));
    }

    #[tokio::test]
    async fn test_appeared_emits_once_per_path() {
        let temp_dir = create_test_dir();
        let path = create_file(temp_dir.path(), "shot.png", b"png");

        let seen = Arc::new(RwLock::new(HashSet::new()));
        let (tx, mut rx) = mpsc::channel(10);

        handle_appeared(&path, &seen, &tx).await;
        handle_appeared(&path, &seen, &tx).await;

        let event = rx.try_recv().expect("first appearance should emit");
        assert_eq!(event.path, path);
        assert!(rx.try_recv().is_err(), "second appearance must not emit");
    }

    #[tokio::test]
    async fn test_appeared_ignores_missing_file() {
        let temp_dir = create_test_dir();
        let path = temp_dir.path().join("ghost.png");

        let seen = Arc::new(RwLock::new(HashSet::new()));
        let (tx, mut rx) = mpsc::channel(10);

        handle_appeared(&path, &seen, &tx).await;

        assert!(rx.try_recv().is_err());
        assert!(seen.read().await.is_empty());
    }

    #[tokio::test]
    async fn test_removal_allows_refire() {
        let temp_dir = create_test_dir();
        let path = create_file(temp_dir.path(), "shot.png", b"png");

        let seen = Arc::new(RwLock::new(HashSet::new()));
        let (tx, mut rx) = mpsc::channel(10);

        handle_appeared(&path, &seen, &tx).await;
        assert!(rx.try_recv().is_ok());

        handle_removed(&path, &seen).await;
        handle_appeared(&path, &seen, &tx).await;

        let event = rx.try_recv().expect("recreated path should emit again");
        assert_eq!(event.path, path);
    }

    #[tokio::test]
    async fn test_watcher_directory_not_found() {
        let (tx, _rx) = mpsc::channel(10);
        let result = ScreenshotWatcher::new(PathBuf::from("/nonexistent/path"), tx);

        assert!(result.is_err());
        assert!(matches!(
            result.unwrap_err(),
            WatcherError::DirectoryNotFound(_)
        ));
    }

    #[tokio::test]
    async fn test_watcher_creation_records_existing() {
        let temp_dir = create_test_dir();
        let (tx, _rx) = mpsc::channel(10);

        create_file(temp_dir.path(), "existing.png", b"png");

        let watcher = ScreenshotWatcher::new(temp_dir.path().to_path_buf(), tx)
            .expect("Should create watcher");

        assert_eq!(watcher.watch_dir(), temp_dir.path());
        assert_eq!(watcher.seen_count().await, 1);
    }

    #[test]
    fn test_watcher_error_display() {
        let err = WatcherError::DirectoryNotFound(PathBuf::from("/test/path"));
        assert_eq!(err.to_string(), "watch directory does not exist: /test/path");
    }
}
