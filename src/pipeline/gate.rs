//! Size gate: reject photos too small to hold legible card text.
//!
//! Only the image header is read; pixel data is never decoded here. Running
//! this before the conditioner means a thumbnail costs one header read
//! instead of dozens of JPEG encodes.

use crate::error::IdOcrError;
use image::ImageReader;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Pixel dimensions read from an image header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

impl Dimensions {
    /// `true` when both dimensions meet their floor.
    pub fn meets(&self, min_width: u32, min_height: u32) -> bool {
        self.width >= min_width && self.height >= min_height
    }
}

/// Read the pixel dimensions of an image without decoding it.
pub fn read_dimensions(path: &Path) -> Result<Dimensions, IdOcrError> {
    let unreadable = |detail: String| IdOcrError::UnreadableImage {
        path: path.to_path_buf(),
        detail,
    };

    let (width, height) = ImageReader::open(path)
        .map_err(|e| unreadable(e.to_string()))?
        .with_guessed_format()
        .map_err(|e| unreadable(e.to_string()))?
        .into_dimensions()
        .map_err(|e| unreadable(e.to_string()))?;

    Ok(Dimensions { width, height })
}

/// Check that the image is at least `min_width` × `min_height` pixels.
///
/// Returns `Ok(false)` for an image that is readable but too small, and
/// `Err` only when the header cannot be read at all.
pub fn check_minimum_resolution(
    path: &Path,
    min_width: u32,
    min_height: u32,
) -> Result<bool, IdOcrError> {
    let dims = read_dimensions(path)?;
    let ok = dims.meets(min_width, min_height);
    debug!(
        "Size gate: {}x{} px (min {}x{}) → {}",
        dims.width,
        dims.height,
        min_width,
        min_height,
        if ok { "pass" } else { "reject" }
    );
    Ok(ok)
}

/// Async wrapper that runs the header read on the blocking pool.
pub async fn check_minimum_resolution_async(
    path: PathBuf,
    min_width: u32,
    min_height: u32,
) -> Result<bool, IdOcrError> {
    tokio::task::spawn_blocking(move || check_minimum_resolution(&path, min_width, min_height))
        .await
        .map_err(|e| IdOcrError::Internal(format!("Size gate task panicked: {}", e)))?
}
