//! Delivery dispatch for new screenshots.
//!
//! One [`Dispatcher::handle`] call per screenshot event: read the file,
//! perform the configured action, optionally delete the source. `handle` is
//! the per-event error boundary; failures are logged and surfaced as a
//! desktop notification, never propagated, so one bad screenshot cannot stop
//! the watch.
//!
//! # Example
//!
//! ```no_run
//! use std::path::Path;
//! use std::sync::Arc;
//! use scrscr::config::Config;
//! use scrscr::delivery::Dispatcher;
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = Arc::new(Config::load(None).expect("configuration"));
//!     let dispatcher = Dispatcher::new(config);
//!     dispatcher
//!         .handle(Path::new("/Users/me/Screenshots/shot.png"))
//!         .await;
//! }
//! ```

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Local;
use rand::Rng;
use thiserror::Error;
use tokio::task;
use tracing::{debug, error, info};

use crate::clipboard::{ClipboardError, ClipboardImage, ClipboardSink, SystemClipboard};
use crate::config::{Action, Config};
use crate::normalize::{self, NormalizeError};
use crate::notifier::{DesktopNotifier, UserNotifier};
use crate::uploader::{RemoteStore, SftpStore, TransferError};

/// Length of the random filename suffix.
const NAME_SUFFIX_LEN: usize = 5;

/// Errors that can occur while handling one screenshot event.
#[derive(Error, Debug)]
pub enum DeliveryError {
    /// Reading the source file failed.
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Normalization failed.
    #[error("normalization failed: {0}")]
    Normalize(#[from] NormalizeError),

    /// The upload failed.
    #[error("upload failed: {0}")]
    Transfer(#[from] TransferError),

    /// A clipboard write failed.
    #[error("clipboard write failed: {0}")]
    Clipboard(#[from] ClipboardError),

    /// Deleting the source file failed.
    #[error("failed to remove {path}: {source}")]
    Remove {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The upload action is selected but no store is wired.
    #[error("no upload target configured")]
    MissingStore,

    /// A blocking task was cancelled or panicked.
    #[error("task failed: {0}")]
    Task(String),
}

/// Per-event delivery pipeline.
///
/// Holds the immutable configuration plus the side-effect boundaries (remote
/// store, clipboard, notifications). Cloning is cheap; each spawned event
/// task gets its own handle.
#[derive(Clone)]
pub struct Dispatcher {
    config: Arc<Config>,
    store: Option<Arc<dyn RemoteStore>>,
    clipboard: Arc<dyn ClipboardSink>,
    notifier: Arc<dyn UserNotifier>,
}

impl Dispatcher {
    /// Creates a dispatcher wired to the real SFTP store, system clipboard,
    /// and desktop notification service.
    #[must_use]
    pub fn new(config: Arc<Config>) -> Self {
        let store = config
            .upload
            .as_ref()
            .map(|target| Arc::new(SftpStore::new(target.clone())) as Arc<dyn RemoteStore>);

        Self {
            config,
            store,
            clipboard: Arc::new(SystemClipboard),
            notifier: Arc::new(DesktopNotifier),
        }
    }

    /// Creates a dispatcher from explicit delivery backends.
    #[must_use]
    pub fn with_parts(
        config: Arc<Config>,
        store: Option<Arc<dyn RemoteStore>>,
        clipboard: Arc<dyn ClipboardSink>,
        notifier: Arc<dyn UserNotifier>,
    ) -> Self {
        Self {
            config,
            store,
            clipboard,
            notifier,
        }
    }

    /// Handles one screenshot event end to end.
    ///
    /// This is the per-event error boundary: any failure is logged and
    /// surfaced as a desktop notification, then swallowed, so in-flight and
    /// future events are unaffected.
    pub async fn handle(&self, path: &Path) {
        debug!(path = %path.display(), "Handling screenshot event");

        if let Err(e) = self.deliver(path).await {
            error!(path = %path.display(), error = %e, "Delivery failed");
            self.notify_failure(&e.to_string()).await;
        }
    }

    async fn deliver(&self, path: &Path) -> Result<(), DeliveryError> {
        match self.config.action {
            Action::Upload => self.deliver_upload(path).await?,
            Action::Clipboard => self.deliver_clipboard(path).await?,
        }

        if self.config.remove {
            tokio::fs::remove_file(path)
                .await
                .map_err(|source| DeliveryError::Remove {
                    path: path.to_path_buf(),
                    source,
                })?;
            info!(path = %path.display(), "Removed source file");
        }

        Ok(())
    }

    /// Upload flow: read, normalize, upload under a generated name, then
    /// put the public link on the clipboard and report it.
    ///
    /// A transfer failure stops the event before the clipboard is touched.
    async fn deliver_upload(&self, path: &Path) -> Result<(), DeliveryError> {
        let (store, target) = match (&self.store, &self.config.upload) {
            (Some(store), Some(target)) => (Arc::clone(store), target),
            _ => return Err(DeliveryError::MissingStore),
        };

        let bytes = read_file(path).await?;

        let downscale = self.config.downscale;
        let bytes = task::spawn_blocking(move || normalize::normalize(bytes, downscale))
            .await
            .map_err(|e| DeliveryError::Task(e.to_string()))??;

        let name = generate_name();

        let name_for_store = name.clone();
        task::spawn_blocking(move || store.put(&bytes, &name_for_store))
            .await
            .map_err(|e| DeliveryError::Task(e.to_string()))??;

        let link = format!("{}/{}", target.view_url, name);

        let clipboard = Arc::clone(&self.clipboard);
        let link_for_clipboard = link.clone();
        task::spawn_blocking(move || clipboard.set_text(&link_for_clipboard))
            .await
            .map_err(|e| DeliveryError::Task(e.to_string()))??;

        info!(link = %link, "Screenshot ready");
        self.notify_success(&link, path).await;

        Ok(())
    }

    /// Clipboard flow: read, decode, and place the pixels on the clipboard.
    async fn deliver_clipboard(&self, path: &Path) -> Result<(), DeliveryError> {
        let bytes = read_file(path).await?;

        let clipboard = Arc::clone(&self.clipboard);
        task::spawn_blocking(move || {
            let image = ClipboardImage::decode(&bytes)?;
            clipboard.set_image(&image)
        })
        .await
        .map_err(|e| DeliveryError::Task(e.to_string()))??;

        info!(path = %path.display(), "Screenshot copied to clipboard");
        self.notify_success("Copied to clipboard", path).await;

        Ok(())
    }

    async fn notify_success(&self, body: &str, icon: &Path) {
        let notifier = Arc::clone(&self.notifier);
        let body = body.to_string();
        let icon = icon.to_path_buf();
        let _ = task::spawn_blocking(move || notifier.notify_success(&body, Some(&icon))).await;
    }

    async fn notify_failure(&self, body: &str) {
        let notifier = Arc::clone(&self.notifier);
        let body = body.to_string();
        let _ = task::spawn_blocking(move || notifier.notify_failure(&body)).await;
    }
}

async fn read_file(path: &Path) -> Result<Vec<u8>, DeliveryError> {
    tokio::fs::read(path)
        .await
        .map_err(|source| DeliveryError::Read {
            path: path.to_path_buf(),
            source,
        })
}

/// Generates an upload filename: the local date as `yymmdd`, a dash, and a
/// 5-character random suffix.
fn generate_name() -> String {
    const CHARSET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";

    let date = Local::now().format("%y%m%d");

    let mut rng = rand::rng();
    let suffix: String = (0..NAME_SUFFIX_LEN)
        .map(|_| {
            let idx = rng.random_range(0..CHARSET.len());
            CHARSET[idx] as char
        })
        .collect();

    format!("{date}-{suffix}.png")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_name_format() {
        let name = generate_name();

        // yymmdd (6) + '-' (1) + suffix (5) + ".png" (4)
        assert_eq!(name.len(), 16);
        assert!(name[..6].chars().all(|c| c.is_ascii_digit()));
        assert_eq!(&name[6..7], "-");
        assert!(name[7..12]
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit()));
        assert!(name.ends_with(".png"));
    }

    #[test]
    fn test_generated_name_uses_local_date() {
        let name = generate_name();
        let today = Local::now().format("%y%m%d").to_string();
        assert!(name.starts_with(&today));
    }

    #[test]
    fn test_generated_names_differ() {
        assert_ne!(generate_name(), generate_name());
    }

    #[test]
    fn test_delivery_error_display() {
        let err = DeliveryError::Transfer(TransferError::Resolve("example.com".to_string()));
        assert_eq!(
            err.to_string(),
            "upload failed: could not resolve host: example.com"
        );

        let err = DeliveryError::MissingStore;
        assert_eq!(err.to_string(), "no upload target configured");
    }
}
