//! Input resolution: normalise a user-supplied path or URL to a local image file.
//!
//! The size gate and the conditioner both read from a file-system path, so a
//! URL is downloaded into a `TempDir` that lives as long as the
//! [`ResolvedInput`]. The directory is removed when the attempt finishes,
//! whichever way it finishes. Magic bytes are sniffed up front so a PDF or an
//! HTML error page is rejected before any decoding work.

use crate::error::IdOcrError;
use image::ImageFormat;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tempfile::TempDir;
use tracing::{debug, info};

/// Bytes read from the head of a file when sniffing its format.
const SNIFF_LEN: usize = 16;

/// Largest body accepted for a URL input (20 MiB). Phone photos of a card
/// stay well under this; anything bigger is not worth conditioning.
pub const MAX_DOWNLOAD_BYTES: u64 = 20 * 1024 * 1024;

/// The resolved input — either a local path or a downloaded temp file.
pub enum ResolvedInput {
    /// Input was already a local file.
    Local(PathBuf),
    /// Input was a URL; image downloaded to a temporary directory.
    Downloaded { path: PathBuf, _temp_dir: TempDir },
}

impl ResolvedInput {
    /// Get the path to the image regardless of how it was resolved.
    pub fn path(&self) -> &Path {
        match self {
            ResolvedInput::Local(p) => p,
            ResolvedInput::Downloaded { path, .. } => path,
        }
    }
}

/// Check if the input string looks like a URL.
pub fn is_url(input: &str) -> bool {
    input.starts_with("http://") || input.starts_with("https://")
}

/// Resolve the input string to a local image path.
pub async fn resolve_input(input: &str, timeout_secs: u64) -> Result<ResolvedInput, IdOcrError> {
    let input = input.trim();
    if input.is_empty() {
        return Err(IdOcrError::InvalidInput {
            input: input.to_string(),
        });
    }
    if is_url(input) {
        download_url(input, timeout_secs, MAX_DOWNLOAD_BYTES).await
    } else {
        resolve_local(input)
    }
}

/// Resolve a local file path, validating existence and image magic bytes.
fn resolve_local(path_str: &str) -> Result<ResolvedInput, IdOcrError> {
    let path = PathBuf::from(path_str);

    if !path.exists() {
        return Err(IdOcrError::FileNotFound { path });
    }

    match std::fs::File::open(&path) {
        Ok(f) => {
            let mut head = Vec::with_capacity(SNIFF_LEN);
            f.take(SNIFF_LEN as u64)
                .read_to_end(&mut head)
                .map_err(|e| IdOcrError::UnreadableImage {
                    path: path.clone(),
                    detail: e.to_string(),
                })?;
            if image::guess_format(&head).is_err() {
                return Err(IdOcrError::NotAnImage { path });
            }
        }
        Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
            return Err(IdOcrError::PermissionDenied { path });
        }
        Err(_) => {
            return Err(IdOcrError::FileNotFound { path });
        }
    }

    debug!("Resolved local image: {}", path.display());
    Ok(ResolvedInput::Local(path))
}

/// Fetch `url` into an owned temp dir, refusing bodies over `limit` bytes.
///
/// The body is read chunk by chunk so an oversized or non-image response is
/// abandoned early: a declared `Content-Length` over the limit fails before
/// any bytes are read, and the format is sniffed as soon as the first
/// [`SNIFF_LEN`] bytes arrive. The temp file takes its extension from the
/// sniffed format, not from the URL.
async fn download_url(url: &str, timeout_secs: u64, limit: u64) -> Result<ResolvedInput, IdOcrError> {
    info!("Downloading image from: {}", url);

    let failed = |reason: String| IdOcrError::DownloadFailed {
        url: url.to_string(),
        reason,
    };
    let from_reqwest = |e: reqwest::Error| {
        if e.is_timeout() {
            IdOcrError::DownloadTimeout {
                url: url.to_string(),
                secs: timeout_secs,
            }
        } else {
            failed(e.to_string())
        }
    };
    let too_large = || IdOcrError::DownloadTooLarge {
        url: url.to_string(),
        limit,
    };

    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| failed(e.to_string()))?;

    let mut response = client.get(url).send().await.map_err(from_reqwest)?;

    if !response.status().is_success() {
        return Err(failed(format!("HTTP {}", response.status())));
    }
    if response.content_length().is_some_and(|n| n > limit) {
        return Err(too_large());
    }

    let mut bytes: Vec<u8> = Vec::new();
    let mut format = None;
    while let Some(chunk) = response.chunk().await.map_err(from_reqwest)? {
        if (bytes.len() + chunk.len()) as u64 > limit {
            return Err(too_large());
        }
        bytes.extend_from_slice(&chunk);
        if format.is_none() && bytes.len() >= SNIFF_LEN {
            format = Some(sniff_download(url, &bytes)?);
        }
    }
    let format = match format {
        Some(f) => f,
        None => sniff_download(url, &bytes)?,
    };

    let temp_dir = TempDir::new().map_err(|e| IdOcrError::Internal(e.to_string()))?;
    let ext = format.extensions_str().first().copied().unwrap_or("img");
    let file_path = temp_dir.path().join(format!("download.{ext}"));

    tokio::fs::write(&file_path, &bytes)
        .await
        .map_err(|e| IdOcrError::Internal(format!("Failed to write temp file: {}", e)))?;

    info!(
        "Downloaded {} bytes ({:?}) to: {}",
        bytes.len(),
        format,
        file_path.display()
    );

    Ok(ResolvedInput::Downloaded {
        path: file_path,
        _temp_dir: temp_dir,
    })
}

fn sniff_download(url: &str, head: &[u8]) -> Result<ImageFormat, IdOcrError> {
    image::guess_format(head).map_err(|_| IdOcrError::NotAnImage {
        path: PathBuf::from(url),
    })
}
