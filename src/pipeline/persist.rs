//! Persist a reassembled page as `{page:03}.png`.
//!
//! PNG keeps the pixels exactly as reassembled. The file is written to a
//! temporary sibling and renamed into place, so an interrupted run never
//! leaves a truncated page behind under its final name.

use crate::error::PageError;
use image::{ImageFormat, RgbaImage};
use std::io::{Cursor, Write};
use std::path::{Path, PathBuf};
use tracing::debug;

/// File name for a 1-indexed page: `7` → `007.png`.
pub fn page_file_name(page_num: usize) -> String {
    format!("{:03}.png", page_num)
}

/// Encode `image` as PNG and write it atomically into `output_dir`.
///
/// Encoding and the blocking write run on tokio's blocking pool.
pub async fn save_page(
    image: RgbaImage,
    output_dir: &Path,
    page_num: usize,
) -> Result<PathBuf, PageError> {
    let path = output_dir.join(page_file_name(page_num));
    let dir = output_dir.to_path_buf();
    let target = path.clone();

    tokio::task::spawn_blocking(move || write_png_atomic(&image, &dir, &target))
        .await
        .map_err(|e| PageError::Persist {
            page: page_num,
            path: path.clone(),
            detail: format!("write task panicked: {e}"),
        })?
        .map_err(|detail| PageError::Persist {
            page: page_num,
            path: path.clone(),
            detail,
        })?;

    debug!("Saved page {} → {}", page_num, path.display());
    Ok(path)
}

fn write_png_atomic(image: &RgbaImage, dir: &Path, target: &Path) -> Result<(), String> {
    let mut buf = Vec::new();
    image
        .write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
        .map_err(|e| format!("PNG encoding failed: {e}"))?;

    let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(|e| e.to_string())?;
    tmp.write_all(&buf).map_err(|e| e.to_string())?;
    tmp.persist(target).map_err(|e| e.error.to_string())?;
    Ok(())
}
