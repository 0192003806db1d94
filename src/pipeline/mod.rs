//! Pipeline stages for identity-card extraction.
//!
//! Each submodule implements exactly one step; [`crate::extract`] wires them
//! together and owns the mapping from stage errors to [`crate::FailureKind`].
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ gate ──▶ encode ──▶ recognize ──▶ fields ──▶ validate
//! (URL/path) (header) (JPEG b64)  (OCR.space)   (regex)    (required?)
//! ```
//!
//! 1. [`input`]     — resolve the user-supplied path or URL to a local image file
//! 2. [`gate`]      — reject photos below the minimum resolution from the header alone
//! 3. [`encode`]    — re-encode under the byte ceiling; CPU-bound, runs in `spawn_blocking`
//! 4. [`recognize`] — the only stage with network I/O; one request, no retry
//! 5. [`fields`]    — independent per-field patterns over the recognised text
//! 6. [`validate`]  — required-field and identity-format check on the record

pub mod encode;
pub mod fields;
pub mod gate;
pub mod input;
pub mod recognize;
pub mod validate;
