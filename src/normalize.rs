//! Image normalization for uploads.
//!
//! Screenshots from HiDPI displays are captured at twice their logical size.
//! When downscaling is enabled, [`normalize`] halves an image's dimensions
//! unless its embedded density marks it as a standard-resolution capture.

use std::io::Cursor;

use image::imageops::FilterType;
use image::ImageFormat;
use thiserror::Error;
use tracing::debug;

/// Density at or above which a capture is treated as HiDPI and halved.
/// Images without density metadata are also halved.
const DENSITY_THRESHOLD_DPI: f64 = 100.0;

/// Metres per inch, for converting PNG pixels-per-metre to DPI.
const METERS_PER_INCH: f64 = 0.0254;

/// Errors that can occur while normalizing an image.
#[derive(Error, Debug)]
pub enum NormalizeError {
    /// The PNG metadata could not be decoded.
    #[error("failed to decode image metadata: {0}")]
    Metadata(#[from] png::DecodingError),

    /// The image could not be decoded or re-encoded.
    #[error("image processing failed: {0}")]
    Image(#[from] image::ImageError),

    /// The image is too small to halve.
    #[error("image too small to downscale: {width}x{height}")]
    TooSmall { width: u32, height: u32 },
}

/// Returns the input unchanged or a half-size re-encode of it.
///
/// When `downscale` is disabled the bytes pass through without being decoded.
/// Otherwise the PNG's density gates the resize: captures below
/// [`DENSITY_THRESHOLD_DPI`] are already at their intended display size and
/// pass through byte-identical, everything else is re-encoded at
/// `floor(width/2) x floor(height/2)`.
///
/// # Errors
///
/// Returns a `NormalizeError` if the bytes cannot be decoded as an image or
/// the image is too small to halve. Callers decide whether that fails the
/// event; there is no silent fallback to the original bytes.
pub fn normalize(bytes: Vec<u8>, downscale: bool) -> Result<Vec<u8>, NormalizeError> {
    if !downscale {
        return Ok(bytes);
    }

    if let Some(dpi) = png_density_dpi(&bytes)? {
        if dpi < DENSITY_THRESHOLD_DPI {
            debug!(dpi, "Density below threshold, keeping original size");
            return Ok(bytes);
        }
    }

    half_size(&bytes)
}

/// Reads the density in DPI from a PNG's pHYs chunk, if one is present
/// with a physical unit.
fn png_density_dpi(bytes: &[u8]) -> Result<Option<f64>, NormalizeError> {
    let decoder = png::Decoder::new(Cursor::new(bytes));
    let reader = decoder.read_info()?;

    Ok(reader.info().pixel_dims.and_then(|dims| match dims.unit {
        png::Unit::Meter => Some(f64::from(dims.xppu) * METERS_PER_INCH),
        png::Unit::Unspecified => None,
    }))
}

/// Re-encodes an image at half its dimensions.
fn half_size(bytes: &[u8]) -> Result<Vec<u8>, NormalizeError> {
    let image = image::load_from_memory(bytes)?;
    let (width, height) = (image.width(), image.height());

    if width < 2 || height < 2 {
        return Err(NormalizeError::TooSmall { width, height });
    }

    debug!(width, height, "Downscaling capture to half size");

    let resized = image.resize_exact(width / 2, height / 2, FilterType::Lanczos3);

    let mut out = Vec::new();
    resized.write_to(&mut Cursor::new(&mut out), ImageFormat::Png)?;
    Ok(out)
}
