//! Error types for the idcard-ocr library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`IdOcrError`] — **Plumbing**: a stage could not do its job at all
//!   (file missing, image undecodable, service unreachable, bad config).
//!   Returned as `Err(IdOcrError)` from constructors and individual stage
//!   functions.
//!
//! * [`FailureKind`] — **User-facing**: the small taxonomy an extraction
//!   attempt can end in. Stored inside
//!   [`crate::output::ExtractionResult::Failure`] so the caller always gets
//!   a value back and can turn it into retake guidance.
//!
//! The orchestrator in [`crate::extract`] is the only place that converts
//! the first kind into the second.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Errors raised by pipeline stages, configuration and the submission boundary.
#[derive(Debug, Error)]
pub enum IdOcrError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("Image file not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// The input string is empty or otherwise unusable as a handle.
    #[error("Invalid input '{input}': not a file path or a valid HTTP/HTTPS URL")]
    InvalidInput { input: String },

    /// HTTP URL was syntactically valid but download failed.
    #[error("Failed to download '{url}': {reason}\nCheck your internet connection.")]
    DownloadFailed { url: String, reason: String },

    /// Download exceeded the configured timeout.
    #[error("Download timed out after {secs}s for '{url}'")]
    DownloadTimeout { url: String, secs: u64 },

    /// The downloaded body is larger than any card photo has reason to be.
    #[error("Download from '{url}' exceeds {limit} bytes")]
    DownloadTooLarge { url: String, limit: u64 },

    /// The file was read but is not an image format we can decode.
    #[error("File is not a supported image: '{path}'")]
    NotAnImage { path: PathBuf },

    /// The image header or pixel data could not be decoded or re-encoded.
    #[error("Could not read image '{path}': {detail}")]
    UnreadableImage { path: PathBuf, detail: String },

    // ── Recognition errors ────────────────────────────────────────────────
    /// The recognition request could not complete (network, TLS, HTTP status).
    #[error("OCR service request failed: {message}")]
    Transport { message: String },

    /// The recognition request did not finish within the configured bound.
    #[error("OCR service did not respond within {secs}s")]
    RecognitionTimeout { secs: u64 },

    /// The service answered, but not with the JSON shape we expect.
    #[error("Unexpected OCR service response: {detail}")]
    MalformedResponse { detail: String },

    // ── Boundary errors ───────────────────────────────────────────────────
    /// A record field is missing or malformed at the submission boundary.
    #[error("Invalid {field}: {detail}")]
    InvalidRecord { field: &'static str, detail: String },

    /// An extraction attempt ended in a user-facing failure.
    ///
    /// Returned by [`crate::output::ExtractionResult::into_result`] when the
    /// caller wants to treat any failure as an error.
    #[error("{kind}: {reason}")]
    ExtractionFailed { kind: FailureKind, reason: String },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// No API key was supplied for the OCR.space client.
    #[error("OCR service API key is not configured.\nSet OCR_SPACE_API_KEY or pass --api-key.")]
    MissingApiKey,

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// The user-facing outcome of a failed extraction attempt.
///
/// Every variant is independently retriable by re-invoking the pipeline;
/// only [`FailureKind::TransportError`] is worth retrying with the *same*
/// photograph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// The photo could not be found, decoded or re-encoded.
    UnreadableImage,
    /// The photo is below the minimum pixel resolution.
    InputTooSmall,
    /// The OCR service could not be reached or did not answer in time.
    TransportError,
    /// The OCR service reported a processing fault.
    ServiceProcessingError,
    /// The OCR service could not extract any text from the image.
    ParseFailure,
    /// Text was recognised but required fields are missing or malformed.
    ValidationFailure,
}

impl FailureKind {
    /// Actionable advice to show the person holding the camera.
    pub fn guidance(&self) -> &'static str {
        match self {
            FailureKind::UnreadableImage => "Capture the card again; the photo could not be opened.",
            FailureKind::InputTooSmall => {
                "Move closer so the card fills the frame, or use a higher camera resolution."
            }
            FailureKind::TransportError => {
                "Check your internet connection and try again with the same photo."
            }
            FailureKind::ServiceProcessingError => {
                "Retake the photo in even lighting with the camera focused on the card."
            }
            FailureKind::ParseFailure => {
                "No text could be read. Make sure the card is well-lit and the text is clearly visible."
            }
            FailureKind::ValidationFailure => {
                "Some details could not be read. Align the card with the frame, avoid glare, and retake."
            }
        }
    }

    /// `true` when the same photo can be resubmitted without retaking it.
    pub fn is_retriable_immediately(&self) -> bool {
        matches!(self, FailureKind::TransportError)
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FailureKind::UnreadableImage => "unreadable image",
            FailureKind::InputTooSmall => "input too small",
            FailureKind::TransportError => "transport error",
            FailureKind::ServiceProcessingError => "service processing error",
            FailureKind::ParseFailure => "parse failure",
            FailureKind::ValidationFailure => "validation failure",
        };
        f.write_str(s)
    }
}
