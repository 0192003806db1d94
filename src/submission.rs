//! The record handed to the upload collaborator.
//!
//! [`DocumentRecord`] is what the extractor could read; [`SubmissionRecord`]
//! is what the backend accepts. Converting between them is strict: every
//! field must be present (gender included), the identity number must be in
//! `DDDDD-DDDDDDD-D` form once whitespace is removed, and dates move from the
//! on-card `DD.MM.YYYY` to ISO `YYYY-MM-DD`.

use crate::error::IdOcrError;
use crate::output::{DocumentRecord, Gender};
use crate::pipeline::validate::RE_IDENTITY_STRICT;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

static RE_DISPLAY_DATE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^([0-9]{1,2})\.([0-9]{1,2})\.([0-9]{4})$").unwrap());

static RE_ISO_DATE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^([0-9]{4})-([0-9]{1,2})-([0-9]{1,2})$").unwrap());

/// A complete, boundary-formatted card record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionRecord {
    pub identity_number: String,
    pub name: String,
    pub father_name: String,
    /// ISO `YYYY-MM-DD`.
    pub date_of_birth: String,
    /// ISO `YYYY-MM-DD`.
    pub date_of_expiry: String,
    pub gender: String,
}

impl TryFrom<&DocumentRecord> for SubmissionRecord {
    type Error = IdOcrError;

    fn try_from(record: &DocumentRecord) -> Result<Self, Self::Error> {
        let identity_number: String = required("identityNumber", record.identity_number.as_deref())?
            .chars()
            .filter(|c| !c.is_whitespace())
            .collect();
        if !RE_IDENTITY_STRICT.is_match(&identity_number) {
            return Err(IdOcrError::InvalidRecord {
                field: "identityNumber",
                detail: format!("'{identity_number}' is not in DDDDD-DDDDDDD-D form"),
            });
        }

        let gender = record.gender.map(|g| g.to_string());

        Ok(Self {
            identity_number,
            name: required("name", record.name.as_deref())?.to_string(),
            father_name: required("fatherName", record.father_name.as_deref())?.to_string(),
            date_of_birth: to_backend_date(required("dateOfBirth", record.date_of_birth.as_deref())?)
                .map_err(|e| relabel(e, "dateOfBirth"))?,
            date_of_expiry: to_backend_date(required(
                "dateOfExpiry",
                record.date_of_expiry.as_deref(),
            )?)
            .map_err(|e| relabel(e, "dateOfExpiry"))?,
            gender: required("gender", gender.as_deref())?.to_string(),
        })
    }
}

impl TryFrom<DocumentRecord> for SubmissionRecord {
    type Error = IdOcrError;

    fn try_from(record: DocumentRecord) -> Result<Self, Self::Error> {
        Self::try_from(&record)
    }
}

impl From<&SubmissionRecord> for DocumentRecord {
    fn from(s: &SubmissionRecord) -> Self {
        let gender = match s.gender.to_ascii_lowercase().as_str() {
            "female" => Some(Gender::Female),
            "male" => Some(Gender::Male),
            _ => None,
        };
        DocumentRecord {
            identity_number: Some(s.identity_number.clone()),
            name: Some(s.name.clone()),
            father_name: Some(s.father_name.clone()),
            date_of_birth: from_backend_date(&s.date_of_birth).ok(),
            date_of_expiry: from_backend_date(&s.date_of_expiry).ok(),
            gender,
        }
    }
}

/// `DD.MM.YYYY` → `YYYY-MM-DD`.
///
/// Day and month are carried over as written; `1.2.1990` becomes `1990-2-1`.
pub fn to_backend_date(display: &str) -> Result<String, IdOcrError> {
    let caps = RE_DISPLAY_DATE
        .captures(display.trim())
        .ok_or_else(|| IdOcrError::InvalidRecord {
            field: "date",
            detail: format!("'{display}' is not in DD.MM.YYYY form"),
        })?;
    Ok(format!("{}-{}-{}", &caps[3], &caps[2], &caps[1]))
}

/// `YYYY-MM-DD` → `DD.MM.YYYY`.
pub fn from_backend_date(iso: &str) -> Result<String, IdOcrError> {
    let caps = RE_ISO_DATE
        .captures(iso.trim())
        .ok_or_else(|| IdOcrError::InvalidRecord {
            field: "date",
            detail: format!("'{iso}' is not in YYYY-MM-DD form"),
        })?;
    Ok(format!("{}.{}.{}", &caps[3], &caps[2], &caps[1]))
}

fn required<'a>(field: &'static str, value: Option<&'a str>) -> Result<&'a str, IdOcrError> {
    match value.map(str::trim) {
        Some(v) if !v.is_empty() => Ok(v),
        _ => Err(IdOcrError::InvalidRecord {
            field,
            detail: "missing".to_string(),
        }),
    }
}

fn relabel(err: IdOcrError, field: &'static str) -> IdOcrError {
    match err {
        IdOcrError::InvalidRecord { detail, .. } => IdOcrError::InvalidRecord { field, detail },
        other => other,
    }
}
