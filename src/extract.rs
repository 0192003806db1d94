//! Extraction entry points: one photo in, one [`ExtractionResult`] out.
//!
//! [`ExtractionPipeline`] walks a single attempt through the stages in
//! [`crate::pipeline`] and stops at the first one that fails. Stage functions
//! return `Result<_, IdOcrError>`; this module is where those errors become
//! a [`FailureKind`] with a human-readable reason, so nothing past
//! [`ExtractionPipeline::extract_document_details`] ever sees an `Err`.
//!
//! There is no retry loop here. Deciding whether to resubmit the same photo
//! or ask for a retake is the caller's call; [`FailureKind::is_retriable_immediately`]
//! exists to help with it.

use crate::config::ExtractionConfig;
use crate::error::{FailureKind, IdOcrError};
use crate::output::ExtractionResult;
use crate::pipeline::recognize::{accept_outcome, OcrSpaceClient, TextRecognizer};
use crate::pipeline::{encode, fields, gate, input, validate};
use crate::progress::Stage;
use futures::stream::{self, StreamExt};
use std::io::Write;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Reason attached to [`FailureKind::InputTooSmall`].
pub const RESOLUTION_TOO_LOW: &str = "Image resolution too low. Please provide a clearer image.";

/// Reason attached to [`FailureKind::ValidationFailure`].
pub const INCOMPLETE_DETAILS: &str = "Could not extract all required CNIC details";

/// A configured extraction pipeline.
///
/// Cheap to clone; the recognizer is shared behind an `Arc`.
#[derive(Clone)]
pub struct ExtractionPipeline {
    config: ExtractionConfig,
    recognizer: Arc<dyn TextRecognizer>,
}

impl ExtractionPipeline {
    /// Build a pipeline that talks to OCR.space.
    ///
    /// Fails with [`IdOcrError::MissingApiKey`] when no key is configured.
    pub fn new(config: ExtractionConfig) -> Result<Self, IdOcrError> {
        let client = OcrSpaceClient::new(&config)?;
        Self::with_recognizer(config, Arc::new(client))
    }

    /// Build a pipeline around any [`TextRecognizer`].
    ///
    /// Fails with [`IdOcrError::InvalidConfig`] when `config` does not pass
    /// [`ExtractionConfig::validate`].
    pub fn with_recognizer(
        config: ExtractionConfig,
        recognizer: Arc<dyn TextRecognizer>,
    ) -> Result<Self, IdOcrError> {
        config.validate()?;
        Ok(Self { config, recognizer })
    }

    pub fn config(&self) -> &ExtractionConfig {
        &self.config
    }

    /// Run one extraction attempt on a local path or HTTP(S) URL.
    ///
    /// Always returns a value; see [`ExtractionResult`] for how to read it.
    pub async fn extract_document_details(&self, input_str: impl AsRef<str>) -> ExtractionResult {
        let input_str = input_str.as_ref();
        let start = Instant::now();
        info!("Starting extraction: {}", input_str);

        if let Some(ref cb) = self.config.progress_callback {
            cb.on_extraction_start(input_str);
        }
        self.stage(input_str, Stage::Idle);

        let result = self.run(input_str).await;

        match &result {
            ExtractionResult::Success { .. } => info!(
                "Extraction complete: {} in {}ms",
                input_str,
                start.elapsed().as_millis()
            ),
            ExtractionResult::Failure { kind, reason, .. } => warn!(
                "Extraction failed ({}): {} after {}ms: {}",
                kind,
                input_str,
                start.elapsed().as_millis(),
                reason
            ),
        }

        if let Some(ref cb) = self.config.progress_callback {
            cb.on_extraction_complete(input_str, &result);
        }
        result
    }

    /// Run independent attempts over several inputs, at most `concurrency` at a time.
    ///
    /// Results come back in input order regardless of completion order.
    pub async fn extract_many<S: AsRef<str>>(
        &self,
        inputs: &[S],
        concurrency: usize,
    ) -> Vec<ExtractionResult> {
        stream::iter(inputs.iter().map(|s| self.extract_document_details(s.as_ref())))
            .buffered(concurrency.max(1))
            .collect()
            .await
    }

    async fn run(&self, input_str: &str) -> ExtractionResult {
        let cfg = &self.config;

        // ── Step 1: Resolve input ────────────────────────────────────────
        // `resolved` owns any downloaded temp dir until this attempt ends.
        let resolved = match input::resolve_input(input_str, cfg.download_timeout_secs).await {
            Ok(r) => r,
            Err(e) => return stage_failure(&e),
        };
        let path = resolved.path().to_path_buf();

        // ── Step 2: Size gate ────────────────────────────────────────────
        match gate::check_minimum_resolution_async(path.clone(), cfg.min_width, cfg.min_height)
            .await
        {
            Ok(true) => {}
            Ok(false) => {
                return ExtractionResult::failure(FailureKind::InputTooSmall, RESOLUTION_TOO_LOW)
            }
            Err(e) => return stage_failure(&e),
        }
        self.stage(input_str, Stage::SizeChecked);

        // ── Step 3: Condition ────────────────────────────────────────────
        let image = match encode::condition_path(path, cfg.conditioning, cfg.max_bytes).await {
            Ok(img) => img,
            Err(e) => return stage_failure(&e),
        };
        self.stage(input_str, Stage::Conditioned);

        // ── Step 4: Recognise ────────────────────────────────────────────
        let timeout = Duration::from_secs(cfg.api_timeout_secs);
        let outcome = match tokio::time::timeout(timeout, self.recognizer.recognize(&image)).await {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(e)) => return stage_failure(&e),
            Err(_) => {
                return stage_failure(&IdOcrError::RecognitionTimeout {
                    secs: cfg.api_timeout_secs,
                })
            }
        };
        drop(image);

        let text = match accept_outcome(outcome) {
            Ok(text) => text,
            Err((kind, reason)) => return ExtractionResult::failure(kind, reason),
        };
        self.stage(input_str, Stage::Recognized);

        // ── Step 5: Extract fields ───────────────────────────────────────
        debug!("Recognised text ({} chars): {:?}", text.len(), text);
        let record = fields::extract_fields(&text);
        self.stage(input_str, Stage::Extracted);

        // ── Step 6: Validate ─────────────────────────────────────────────
        let missing = validate::missing_fields(&record);
        if !missing.is_empty() {
            let names: Vec<String> = missing.iter().map(|f| f.to_string()).collect();
            debug!("Missing fields: {}", names.join(", "));
            return ExtractionResult::Failure {
                kind: FailureKind::ValidationFailure,
                reason: INCOMPLETE_DETAILS.to_string(),
                raw_text: Some(text),
                partial_details: Some(record),
            };
        }
        self.stage(input_str, Stage::Validated);

        ExtractionResult::Success {
            details: record,
            raw_text: text,
        }
    }

    fn stage(&self, input_str: &str, stage: Stage) {
        debug!("{}: {}", input_str, stage);
        if let Some(ref cb) = self.config.progress_callback {
            cb.on_stage(input_str, stage);
        }
    }
}

impl std::fmt::Debug for ExtractionPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExtractionPipeline")
            .field("config", &self.config)
            .field("recognizer", &"<dyn TextRecognizer>")
            .finish()
    }
}

/// Which user-facing failure a stage error ends the attempt in.
pub fn failure_kind_for(err: &IdOcrError) -> FailureKind {
    match err {
        IdOcrError::DownloadFailed { .. }
        | IdOcrError::DownloadTimeout { .. }
        | IdOcrError::Transport { .. }
        | IdOcrError::RecognitionTimeout { .. } => FailureKind::TransportError,
        IdOcrError::MalformedResponse { .. } => FailureKind::ServiceProcessingError,
        IdOcrError::ExtractionFailed { kind, .. } => *kind,
        IdOcrError::InvalidRecord { .. } => FailureKind::ValidationFailure,
        IdOcrError::FileNotFound { .. }
        | IdOcrError::PermissionDenied { .. }
        | IdOcrError::InvalidInput { .. }
        | IdOcrError::NotAnImage { .. }
        | IdOcrError::DownloadTooLarge { .. }
        | IdOcrError::UnreadableImage { .. }
        | IdOcrError::InvalidConfig(_)
        | IdOcrError::MissingApiKey
        | IdOcrError::Internal(_) => FailureKind::UnreadableImage,
    }
}

fn stage_failure(err: &IdOcrError) -> ExtractionResult {
    ExtractionResult::failure(failure_kind_for(err), err.to_string())
}

// ── Convenience entry points ─────────────────────────────────────────────

/// Extract card details from a file path or URL.
///
/// This is the primary entry point for the library.
///
/// # Errors
/// Returns `Err` only when the pipeline cannot be built (no API key).
/// Every per-photo problem is reported inside the returned
/// [`ExtractionResult`].
pub async fn extract_document_details(
    input_str: impl AsRef<str>,
    config: &ExtractionConfig,
) -> Result<ExtractionResult, IdOcrError> {
    let pipeline = ExtractionPipeline::new(config.clone())?;
    Ok(pipeline.extract_document_details(input_str).await)
}

/// Synchronous wrapper around [`extract_document_details`].
///
/// Creates a temporary tokio runtime internally.
pub fn extract_sync(
    input_str: impl AsRef<str>,
    config: &ExtractionConfig,
) -> Result<ExtractionResult, IdOcrError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| IdOcrError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(extract_document_details(input_str, config))
}

/// Extract card details from image bytes already in memory.
///
/// The bytes are written to a managed [`tempfile`] that is removed when the
/// attempt returns.
///
/// # Example
/// ```rust,no_run
/// use idcard_ocr::{extract_from_bytes, ExtractionConfig};
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let bytes: Vec<u8> = std::fs::read("card.jpg")?;
/// let config = ExtractionConfig::builder().api_key("K0000000000000").build()?;
/// let result = extract_from_bytes(&bytes, &config).await?;
/// println!("{}", serde_json::to_string_pretty(&result)?);
/// # Ok(())
/// # }
/// ```
pub async fn extract_from_bytes(
    bytes: &[u8],
    config: &ExtractionConfig,
) -> Result<ExtractionResult, IdOcrError> {
    let pipeline = ExtractionPipeline::new(config.clone())?;
    pipeline.extract_from_bytes(bytes).await
}

impl ExtractionPipeline {
    /// [`Self::extract_document_details`] for in-memory image bytes.
    pub async fn extract_from_bytes(&self, bytes: &[u8]) -> Result<ExtractionResult, IdOcrError> {
        let mut tmp = tempfile::NamedTempFile::new()
            .map_err(|e| IdOcrError::Internal(format!("tempfile: {e}")))?;
        tmp.write_all(bytes)
            .map_err(|e| IdOcrError::Internal(format!("tempfile write: {e}")))?;
        let path = tmp.path().to_string_lossy().to_string();
        // `tmp` is dropped (and the file deleted) when the attempt returns
        Ok(self.extract_document_details(&path).await)
    }
}
