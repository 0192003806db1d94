//! Progress-callback trait for per-stage extraction events.
//!
//! Inject an [`Arc<dyn ExtractionProgressCallback>`] via
//! [`crate::config::ExtractionConfigBuilder::progress_callback`] to observe
//! an attempt as it walks the pipeline's state machine:
//!
//! ```text
//! Idle ─▶ SizeChecked ─▶ Conditioned ─▶ Recognized ─▶ Extracted ─▶ Validated
//!   │          │              │              │             │
//!   └──────────┴──────────────┴──────────────┴─────────────┴──▶ Failure
//! ```
//!
//! The trait is `Send + Sync` because [`crate::extract::ExtractionPipeline::extract_many`]
//! runs attempts concurrently and they all share one callback.
//!
//! # Example
//!
//! ```rust
//! use idcard_ocr::{ExtractionConfig, ExtractionProgressCallback, Stage};
//! use std::sync::Arc;
//!
//! struct Printer;
//!
//! impl ExtractionProgressCallback for Printer {
//!     fn on_stage(&self, input: &str, stage: Stage) {
//!         eprintln!("{input}: {stage}");
//!     }
//! }
//!
//! let config = ExtractionConfig::builder()
//!     .progress_callback(Arc::new(Printer) as Arc<dyn ExtractionProgressCallback>)
//!     .build()
//!     .unwrap();
//! ```

use crate::output::ExtractionResult;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// The stage an extraction attempt has successfully reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// Nothing has run yet.
    Idle,
    /// The photo passed the minimum-resolution gate.
    SizeChecked,
    /// The photo was re-encoded under the byte ceiling (or best effort).
    Conditioned,
    /// The OCR service returned usable text.
    Recognized,
    /// Fields were pulled out of the text.
    Extracted,
    /// The record passed validation.
    Validated,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Stage::Idle => "idle",
            Stage::SizeChecked => "size checked",
            Stage::Conditioned => "conditioned",
            Stage::Recognized => "recognized",
            Stage::Extracted => "extracted",
            Stage::Validated => "validated",
        };
        f.write_str(s)
    }
}

/// Called by the pipeline as an attempt moves between stages.
///
/// All methods have default no-op implementations so callers only override
/// what they care about. `input` is the handle passed to the pipeline, which
/// lets one callback tell concurrent attempts apart.
pub trait ExtractionProgressCallback: Send + Sync {
    /// Called once before the size gate runs.
    fn on_extraction_start(&self, input: &str) {
        let _ = input;
    }

    /// Called each time the attempt reaches a new stage.
    ///
    /// Every attempt opens with [`Stage::Idle`], sent right after
    /// [`Self::on_extraction_start`].
    fn on_stage(&self, input: &str, stage: Stage) {
        let _ = (input, stage);
    }

    /// Called once with the final result, success or failure.
    fn on_extraction_complete(&self, input: &str, result: &ExtractionResult) {
        let _ = (input, result);
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl ExtractionProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::ExtractionConfig`].
pub type ProgressCallback = Arc<dyn ExtractionProgressCallback>;
