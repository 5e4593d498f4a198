//! Decode a downloaded page image into an RGBA buffer.
//!
//! The CDN serves JPEG (occasionally PNG or WebP); the format is sniffed from
//! the bytes, not the URL. Whatever the source format, the result is 8-bit
//! RGBA with the origin at (0, 0) so the tile math can index it directly.

use crate::error::PageError;
use crate::model::PageDescriptor;
use image::RgbaImage;
use tracing::debug;

/// Decode `bytes` and check them against the page's declared size.
///
/// # Errors
/// * [`PageError::Decode`] — not a supported image
/// * [`PageError::EmptyImage`] — zero width or height
/// * [`PageError::DimensionMismatch`] — decoded size ≠ declared size
pub fn decode_page(
    bytes: &[u8],
    descriptor: &PageDescriptor,
    page_num: usize,
) -> Result<RgbaImage, PageError> {
    let decoded = image::load_from_memory(bytes).map_err(|e| PageError::Decode {
        page: page_num,
        detail: e.to_string(),
    })?;
    let rgba = decoded.into_rgba8();
    let (width, height) = rgba.dimensions();

    if width == 0 || height == 0 {
        return Err(PageError::EmptyImage { page: page_num });
    }

    if width != descriptor.declared_width || height != descriptor.declared_height {
        return Err(PageError::DimensionMismatch {
            page: page_num,
            declared_width: descriptor.declared_width,
            declared_height: descriptor.declared_height,
            actual_width: width,
            actual_height: height,
        });
    }

    debug!("Decoded page {} → {}x{} px", page_num, width, height);
    Ok(rgba)
}
