//! Result types returned across the library boundary.
//!
//! [`ExtractionResult`] is the only value an extraction attempt hands back:
//! the orchestrator never propagates an error past itself, so a caller can
//! match on the result and decide between "accept", "retry the upload" and
//! "ask for a retake".

use crate::error::{FailureKind, IdOcrError};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Card holder's gender as read from the card text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Gender {
    Male,
    Female,
}

impl fmt::Display for Gender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Gender::Male => f.write_str("Male"),
            Gender::Female => f.write_str("Female"),
        }
    }
}

/// Structured fields pulled out of recognised card text.
///
/// Every field is optional: a partially filled record is normal intermediate
/// state and is returned alongside a validation failure so the UI can show
/// what was read. Dates are in the on-device display form `DD.MM.YYYY`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub identity_number: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub father_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_of_birth: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_of_expiry: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gender: Option<Gender>,
}

/// The outcome of one extraction attempt.
///
/// Serialised with a `status` tag (`success` / `failure`) and camelCase
/// field names, matching [`DocumentRecord`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum ExtractionResult {
    /// Every required field was read and validated.
    Success {
        details: DocumentRecord,
        raw_text: String,
    },
    /// The attempt stopped at some stage; see `kind` for which.
    Failure {
        kind: FailureKind,
        reason: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        raw_text: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        partial_details: Option<DocumentRecord>,
    },
}

impl ExtractionResult {
    /// A failure with no recognised text or partial record attached.
    pub fn failure(kind: FailureKind, reason: impl Into<String>) -> Self {
        ExtractionResult::Failure {
            kind,
            reason: reason.into(),
            raw_text: None,
            partial_details: None,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, ExtractionResult::Success { .. })
    }

    /// Validated details on success, or whatever was read on a validation failure.
    pub fn details(&self) -> Option<&DocumentRecord> {
        match self {
            ExtractionResult::Success { details, .. } => Some(details),
            ExtractionResult::Failure {
                partial_details, ..
            } => partial_details.as_ref(),
        }
    }

    pub fn raw_text(&self) -> Option<&str> {
        match self {
            ExtractionResult::Success { raw_text, .. } => Some(raw_text),
            ExtractionResult::Failure { raw_text, .. } => raw_text.as_deref(),
        }
    }

    pub fn failure_kind(&self) -> Option<FailureKind> {
        match self {
            ExtractionResult::Success { .. } => None,
            ExtractionResult::Failure { kind, .. } => Some(*kind),
        }
    }

    pub fn reason(&self) -> Option<&str> {
        match self {
            ExtractionResult::Success { .. } => None,
            ExtractionResult::Failure { reason, .. } => Some(reason),
        }
    }

    /// Convert into a `Result`, treating any failure as an error.
    pub fn into_result(self) -> Result<DocumentRecord, IdOcrError> {
        match self {
            ExtractionResult::Success { details, .. } => Ok(details),
            ExtractionResult::Failure { kind, reason, .. } => {
                Err(IdOcrError::ExtractionFailed { kind, reason })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_serialises_camel_case_and_skips_unset() {
        let rec = DocumentRecord {
            identity_number: Some("42201-8345146-7".into()),
            father_name: Some("Imran Khan".into()),
            gender: Some(Gender::Female),
            ..Default::default()
        };
        let json = serde_json::to_value(&rec).unwrap();
        assert_eq!(json["identityNumber"], "42201-8345146-7");
        assert_eq!(json["fatherName"], "Imran Khan");
        assert_eq!(json["gender"], "Female");
        assert!(json.get("name").is_none());
    }

    #[test]
    fn failure_carries_partial_details() {
        let partial = DocumentRecord {
            name: Some("Sarah Khan".into()),
            ..Default::default()
        };
        let result = ExtractionResult::Failure {
            kind: FailureKind::ValidationFailure,
            reason: "missing".into(),
            raw_text: Some("Name: Sarah Khan".into()),
            partial_details: Some(partial.clone()),
        };
        assert!(!result.is_success());
        assert_eq!(result.details(), Some(&partial));
        assert_eq!(result.raw_text(), Some("Name: Sarah Khan"));
        assert_eq!(result.failure_kind(), Some(FailureKind::ValidationFailure));
    }

    #[test]
    fn tagged_json_shape() {
        let result = ExtractionResult::failure(FailureKind::InputTooSmall, "too small");
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["status"], "failure");
        assert_eq!(json["kind"], "input_too_small");
        assert!(json.get("rawText").is_none());
    }

    #[test]
    fn field_names_are_camel_case_throughout() {
        let result = ExtractionResult::Failure {
            kind: FailureKind::ValidationFailure,
            reason: "missing".into(),
            raw_text: Some("Name: Sarah Khan".into()),
            partial_details: Some(DocumentRecord {
                name: Some("Sarah Khan".into()),
                ..Default::default()
            }),
        };
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["rawText"], "Name: Sarah Khan");
        assert_eq!(json["partialDetails"]["name"], "Sarah Khan");
        assert!(json.get("raw_text").is_none());
        assert!(json.get("partial_details").is_none());

        let ok = ExtractionResult::Success {
            details: DocumentRecord::default(),
            raw_text: "text".into(),
        };
        let json = serde_json::to_value(&ok).unwrap();
        assert_eq!(json["status"], "success");
        assert_eq!(json["rawText"], "text");

        let back: ExtractionResult = serde_json::from_value(json).unwrap();
        assert_eq!(back, ok);
    }

    #[test]
    fn into_result_maps_failure() {
        let err = ExtractionResult::failure(FailureKind::ParseFailure, "blank")
            .into_result()
            .unwrap_err();
        assert!(matches!(
            err,
            IdOcrError::ExtractionFailed {
                kind: FailureKind::ParseFailure,
                ..
            }
        ));
    }
}
