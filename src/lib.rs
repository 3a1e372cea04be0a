//! scrscr - screenshot watcher.
//!
//! This crate watches a directory for new screenshot files and delivers each
//! one: either uploaded over SFTP with the public link placed on the
//! clipboard, or copied straight onto the clipboard as image data. Images
//! can be halved before upload and sources deleted after delivery.
//!
//! # Overview
//!
//! A long-running watch on `<screens_dir>/*.png` emits one event per new
//! file. Each event is handled by an independent task: read, optionally
//! normalize, then deliver per the configured action, with the outcome
//! reported through a console line and a desktop notification. Per-event
//! failures are contained; nothing short of startup failure stops the watch.
//!
//! # Modules
//!
//! - [`config`]: Configuration from a TOML file and environment variables
//! - [`detect`]: macOS screenshot directory detection
//! - [`watcher`]: File system watcher for new screenshots
//! - [`normalize`]: Optional HiDPI downscaling before upload
//! - [`delivery`]: Per-event delivery pipeline
//! - [`uploader`]: SFTP remote store
//! - [`clipboard`]: System clipboard sink
//! - [`notifier`]: Desktop notifications

pub mod clipboard;
pub mod config;
pub mod delivery;
pub mod detect;
pub mod normalize;
pub mod notifier;
pub mod uploader;
pub mod watcher;

/// Product name, used as the notification title.
pub const APP_NAME: &str = "scrscr";

pub use clipboard::{ClipboardError, ClipboardImage, ClipboardSink, SystemClipboard};
pub use config::{Action, Config, ConfigError, UploadTarget};
pub use delivery::{DeliveryError, Dispatcher};
pub use detect::{detect_screens_dir, DetectError};
pub use normalize::NormalizeError;
pub use notifier::{DesktopNotifier, UserNotifier};
pub use uploader::{RemoteStore, SftpStore, TransferError};
pub use watcher::{ScreenshotEvent, ScreenshotWatcher, WatcherError};
