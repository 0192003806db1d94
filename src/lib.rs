//! # idcard-ocr
//!
//! Read the holder details off a photographed national identity card.
//!
//! ## Why this crate?
//!
//! Phone photos of identity cards are large, unevenly lit, and laid out a
//! little differently every time. This crate turns one into a structured
//! record (identity number, name, father's name, dates of birth and
//! expiry, gender) by shrinking it under the OCR service's upload ceiling,
//! sending it to [OCR.space](https://ocr.space), and pulling each field out
//! of the returned text with its own pattern. Every attempt ends in an
//! [`ExtractionResult`] that says either "here are the details" or exactly
//! which stage gave up and why.
//!
//! ## Pipeline Overview
//!
//! ```text
//! photo (path / URL / bytes)
//!  │
//!  ├─ 1. Input      resolve local file or download from URL
//!  ├─ 2. Gate       reject below 800×500 px from the header alone
//!  ├─ 3. Condition  JPEG re-encode under 1 MiB (CPU-bound, spawn_blocking)
//!  ├─ 4. Recognize  one OCR.space request, bounded by a timeout
//!  ├─ 5. Extract    independent per-field patterns
//!  └─ 6. Validate   all required fields present → Success
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use idcard_ocr::{extract_document_details, ExtractionConfig, ExtractionResult};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ExtractionConfig::builder()
//!         .api_key(std::env::var("OCR_SPACE_API_KEY")?)
//!         .build()?;
//!
//!     match extract_document_details("card-front.jpg", &config).await? {
//!         ExtractionResult::Success { details, .. } => {
//!             println!("{:?} {:?}", details.identity_number, details.name);
//!         }
//!         ExtractionResult::Failure { kind, reason, .. } => {
//!             eprintln!("{reason}\n{}", kind.guidance());
//!         }
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `idcard-ocr` binary (clap + anyhow + indicatif + tracing-subscriber) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! idcard-ocr = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod error;
pub mod extract;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod submission;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{ConditioningConfig, ExtractionConfig, ExtractionConfigBuilder};
pub use error::{FailureKind, IdOcrError};
pub use extract::{extract_document_details, extract_from_bytes, extract_sync, ExtractionPipeline};
pub use output::{DocumentRecord, ExtractionResult, Gender};
pub use pipeline::encode::ConditionedImage;
pub use pipeline::fields::Field;
pub use pipeline::recognize::{OcrSpaceClient, RecognitionOutcome, TextRecognizer};
pub use progress::{ExtractionProgressCallback, NoopProgressCallback, ProgressCallback, Stage};
pub use submission::{from_backend_date, to_backend_date, SubmissionRecord};
