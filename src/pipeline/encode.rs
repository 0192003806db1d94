//! Image conditioning: photo → base64 JPEG under the service's byte ceiling.
//!
//! OCR.space rejects uploads above 1 MiB on the free tier, and phone photos
//! routinely come out at 3–8 MB. The conditioner walks a fixed schedule of
//! (width, JPEG quality) pairs, cheapest loss first: quality drops in steps
//! at a given width, and only once quality has bottomed out does the width
//! shrink (with quality reset). Resolution carries more of the fine print on
//! a card than a second quality cut does.
//!
//! The walk is a bounded `for` loop over at most
//! [`ConditioningConfig::max_attempts`] encodes. If the floors are reached
//! and the image is still oversized, the last encode is returned as best
//! effort and the service gets to decide.

use crate::config::ConditioningConfig;
use crate::error::IdOcrError;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, ImageReader, RgbImage};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// A JPEG-encoded, base64-wrapped photo ready for upload.
#[derive(Clone, PartialEq, Eq)]
pub struct ConditionedImage {
    /// Standard base64 of the JPEG bytes (no data-URL prefix).
    pub base64: String,
    /// Encoded width in pixels.
    pub width: u32,
    /// Encoded height in pixels.
    pub height: u32,
    /// JPEG quality (1–100) of the final encode.
    pub quality: u8,
    /// Number of encodes performed to get here.
    pub attempts: usize,
}

impl ConditionedImage {
    /// Decoded payload size estimated from the base64 length (`len × 0.75`).
    pub fn estimated_byte_size(&self) -> usize {
        self.base64.len() * 3 / 4
    }

    /// `true` when the estimated size is within `max_bytes`.
    pub fn fits(&self, max_bytes: usize) -> bool {
        self.estimated_byte_size() <= max_bytes
    }

    /// The image as a `data:` URL, the form OCR.space expects in `base64Image`.
    pub fn data_url(&self) -> String {
        format!("data:image/jpeg;base64,{}", self.base64)
    }
}

impl std::fmt::Debug for ConditionedImage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConditionedImage")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("quality", &self.quality)
            .field("attempts", &self.attempts)
            .field("estimated_byte_size", &self.estimated_byte_size())
            .finish()
    }
}

/// Condition an in-memory image against the schedule and byte ceiling.
///
/// The photo is never enlarged: the first target width is
/// `min(schedule.start_width, img.width())`.
///
/// # Errors
/// [`IdOcrError::InvalidConfig`] when the schedule fails
/// [`ConditioningConfig::validate`] or `max_bytes` is zero; no encode is
/// attempted in that case.
pub fn condition_image(
    img: &DynamicImage,
    schedule: &ConditioningConfig,
    max_bytes: usize,
) -> Result<ConditionedImage, IdOcrError> {
    check_schedule(schedule, max_bytes)?;
    walk_schedule(img, schedule, max_bytes)
        .map_err(|e| IdOcrError::Internal(format!("JPEG encoding failed: {e}")))
}

fn check_schedule(schedule: &ConditioningConfig, max_bytes: usize) -> Result<(), IdOcrError> {
    if max_bytes == 0 {
        return Err(IdOcrError::InvalidConfig("max_bytes must be ≥ 1".into()));
    }
    schedule.validate()
}

fn walk_schedule(
    img: &DynamicImage,
    schedule: &ConditioningConfig,
    max_bytes: usize,
) -> Result<ConditionedImage, image::ImageError> {
    let source = img.to_rgb8();
    let max_attempts = schedule.max_attempts();

    let mut width = schedule.start_width.min(source.width());
    let mut quality = schedule.start_quality;
    let mut resized = resize_to_width(&source, width);
    let mut current = encode_jpeg(&resized, quality, 1)?;

    for attempt in 2..=max_attempts {
        let floors_reached = quality <= schedule.floor_quality && width <= schedule.floor_width;
        if current.fits(max_bytes) || floors_reached {
            break;
        }

        if quality > schedule.floor_quality {
            quality = quality
                .saturating_sub(schedule.quality_step)
                .max(schedule.floor_quality);
        } else {
            width = width
                .saturating_sub(schedule.width_step)
                .max(schedule.floor_width);
            quality = schedule.start_quality;
            resized = resize_to_width(&source, width);
        }

        debug!("Adjusting image: width={}, quality={}", width, quality);
        current = encode_jpeg(&resized, quality, attempt)?;
    }

    if current.fits(max_bytes) {
        info!(
            "Final image size: {}KB ({}x{} q{}, {} encodes)",
            current.estimated_byte_size() / 1024,
            current.width,
            current.height,
            current.quality,
            current.attempts
        );
    } else {
        warn!(
            "Image still {}KB over a {}KB ceiling at the floor settings; sending best effort",
            current.estimated_byte_size() / 1024,
            max_bytes / 1024
        );
    }

    Ok(current)
}

/// Decode the file at `path` and condition it on the blocking pool.
///
/// Decoding and the encode loop are CPU-bound; running them in
/// `spawn_blocking` keeps the Tokio workers free for other attempts.
pub async fn condition_path(
    path: PathBuf,
    schedule: ConditioningConfig,
    max_bytes: usize,
) -> Result<ConditionedImage, IdOcrError> {
    check_schedule(&schedule, max_bytes)?;
    tokio::task::spawn_blocking(move || {
        let img = decode(&path)?;
        walk_schedule(&img, &schedule, max_bytes).map_err(|e| IdOcrError::UnreadableImage {
            path: path.clone(),
            detail: format!("JPEG encoding failed: {e}"),
        })
    })
    .await
    .map_err(|e| IdOcrError::Internal(format!("Conditioning task panicked: {}", e)))?
}

fn decode(path: &Path) -> Result<DynamicImage, IdOcrError> {
    let unreadable = |detail: String| IdOcrError::UnreadableImage {
        path: path.to_path_buf(),
        detail,
    };
    ImageReader::open(path)
        .map_err(|e| unreadable(e.to_string()))?
        .with_guessed_format()
        .map_err(|e| unreadable(e.to_string()))?
        .decode()
        .map_err(|e| unreadable(e.to_string()))
}

/// Scale to `width`, keeping the aspect ratio. A no-op when already that wide.
fn resize_to_width(img: &RgbImage, width: u32) -> RgbImage {
    if width >= img.width() {
        return img.clone();
    }
    let height = ((img.height() as u64 * width as u64) / img.width() as u64).max(1) as u32;
    image::imageops::resize(img, width, height, FilterType::Lanczos3)
}

fn encode_jpeg(
    img: &RgbImage,
    quality: u8,
    attempts: usize,
) -> Result<ConditionedImage, image::ImageError> {
    let mut buf = Vec::new();
    {
        let mut encoder = JpegEncoder::new_with_quality(&mut buf, quality);
        encoder.encode_image(img)?;
    }
    let b64 = STANDARD.encode(&buf);
    debug!(
        "Encoded {}x{} q{} → {} bytes base64",
        img.width(),
        img.height(),
        quality,
        b64.len()
    );
    Ok(ConditionedImage {
        base64: b64,
        width: img.width(),
        height: img.height(),
        quality,
        attempts,
    })
}
