//! System clipboard access.
//!
//! The delivery dispatcher writes either a public link (text) or the
//! screenshot itself (pixels) to the clipboard. [`ClipboardSink`] is the seam
//! between the dispatcher and the OS clipboard so tests can observe writes
//! without touching the real one.

use std::borrow::Cow;

use thiserror::Error;
use tracing::debug;

/// Errors that can occur writing to the clipboard.
#[derive(Error, Debug)]
pub enum ClipboardError {
    /// The clipboard could not be opened or written.
    #[error("clipboard access failed: {0}")]
    Backend(#[from] arboard::Error),

    /// The image bytes could not be decoded into pixels.
    #[error("failed to decode image for clipboard: {0}")]
    Decode(#[from] image::ImageError),
}

/// Decoded RGBA pixels ready for the clipboard.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClipboardImage {
    /// Width in pixels.
    pub width: usize,

    /// Height in pixels.
    pub height: usize,

    /// Row-major RGBA bytes, `width * height * 4` long.
    pub rgba: Vec<u8>,
}

impl ClipboardImage {
    /// Decodes encoded image bytes into the RGBA form clipboards accept.
    pub fn decode(bytes: &[u8]) -> Result<Self, ClipboardError> {
        let image = image::load_from_memory(bytes)?;
        let rgba = image.to_rgba8();
        Ok(Self {
            width: rgba.width() as usize,
            height: rgba.height() as usize,
            rgba: rgba.into_raw(),
        })
    }
}

/// Destination for delivery output on the system clipboard.
///
/// Implementations block; the dispatcher calls them from a blocking thread.
pub trait ClipboardSink: Send + Sync {
    /// Places a text value on the clipboard.
    fn set_text(&self, text: &str) -> Result<(), ClipboardError>;

    /// Places image pixels on the clipboard.
    fn set_image(&self, image: &ClipboardImage) -> Result<(), ClipboardError>;
}

/// [`ClipboardSink`] backed by the OS clipboard.
///
/// A fresh handle is opened per write rather than held for the process
/// lifetime.
#[derive(Debug, Default)]
pub struct SystemClipboard;

impl ClipboardSink for SystemClipboard {
    fn set_text(&self, text: &str) -> Result<(), ClipboardError> {
        let mut clipboard = arboard::Clipboard::new()?;
        clipboard.set_text(text)?;
        debug!(len = text.len(), "Wrote text to clipboard");
        Ok(())
    }

    fn set_image(&self, image: &ClipboardImage) -> Result<(), ClipboardError> {
        let mut clipboard = arboard::Clipboard::new()?;
        clipboard.set_image(arboard::ImageData {
            width: image.width,
            height: image.height,
            bytes: Cow::Borrowed(&image.rgba),
        })?;
        debug!(
            width = image.width,
            height = image.height,
            "Wrote image to clipboard"
        );
        Ok(())
    }
}
