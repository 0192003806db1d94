//! Field extraction: unstructured OCR text → [`DocumentRecord`].
//!
//! OCR output from a card photo is a loose stream of labels and values whose
//! line breaks, spacing and punctuation vary from one capture to the next.
//! Rather than one grammar for the whole card, each field has its own
//! independent rule that either finds its value or leaves the field unset.
//! A smudged father's name therefore costs one field, not the record.
//!
//! ## Rules
//!
//! | Field | Finds |
//! |-------|-------|
//! | identity number | `DDDDD-DDDDDDD-D`, separators `-`, a space, or none |
//! | name | text after `Name` up to `Father` / `Identity` / `Date` / a digit / end |
//! | father's name | text after `Father` / `Father's Name` up to `Identity` / `Date` / a digit / end |
//! | date of birth | `D.M.YYYY` or `D-M-YYYY` after `Date of Birth` |
//! | date of expiry | the same shape after `Date of Expiry` or `Expiry Date` |
//!
//! Gender is not a rule: it is `Female` when the word "female" appears
//! anywhere in the text, otherwise `Male`.

use crate::output::{DocumentRecord, Gender};
use once_cell::sync::Lazy;
use regex::Regex;
use std::fmt;

/// A required, text-valued field of the record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    IdentityNumber,
    Name,
    FatherName,
    DateOfBirth,
    DateOfExpiry,
}

impl Field {
    /// Every text field, in record order.
    pub const ALL: [Field; 5] = [
        Field::IdentityNumber,
        Field::Name,
        Field::FatherName,
        Field::DateOfBirth,
        Field::DateOfExpiry,
    ];

    /// The camelCase key this field uses in JSON.
    pub fn key(&self) -> &'static str {
        match self {
            Field::IdentityNumber => "identityNumber",
            Field::Name => "name",
            Field::FatherName => "fatherName",
            Field::DateOfBirth => "dateOfBirth",
            Field::DateOfExpiry => "dateOfExpiry",
        }
    }

    pub fn get<'a>(&self, record: &'a DocumentRecord) -> Option<&'a str> {
        match self {
            Field::IdentityNumber => record.identity_number.as_deref(),
            Field::Name => record.name.as_deref(),
            Field::FatherName => record.father_name.as_deref(),
            Field::DateOfBirth => record.date_of_birth.as_deref(),
            Field::DateOfExpiry => record.date_of_expiry.as_deref(),
        }
    }

    fn set(&self, record: &mut DocumentRecord, value: Option<String>) {
        let slot = match self {
            Field::IdentityNumber => &mut record.identity_number,
            Field::Name => &mut record.name,
            Field::FatherName => &mut record.father_name,
            Field::DateOfBirth => &mut record.date_of_birth,
            Field::DateOfExpiry => &mut record.date_of_expiry,
        };
        *slot = value;
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Field::IdentityNumber => "identity number",
            Field::Name => "name",
            Field::FatherName => "father's name",
            Field::DateOfBirth => "date of birth",
            Field::DateOfExpiry => "date of expiry",
        };
        f.write_str(s)
    }
}

/// One independent extractor.
struct FieldRule {
    field: Field,
    find: fn(&str) -> Option<String>,
}

static RULES: [FieldRule; 5] = [
    FieldRule {
        field: Field::IdentityNumber,
        find: find_identity_number,
    },
    FieldRule {
        field: Field::Name,
        find: find_name,
    },
    FieldRule {
        field: Field::FatherName,
        find: find_father_name,
    },
    FieldRule {
        field: Field::DateOfBirth,
        find: find_date_of_birth,
    },
    FieldRule {
        field: Field::DateOfExpiry,
        find: find_date_of_expiry,
    },
];

/// Run every rule over `text`. Never fails; unmatched fields stay `None`.
pub fn extract_fields(text: &str) -> DocumentRecord {
    let mut record = DocumentRecord::default();
    for rule in &RULES {
        rule.field.set(&mut record, (rule.find)(text));
    }
    record.gender = Some(infer_gender(text));
    record
}

/// `Female` if "female" occurs anywhere (case-insensitive), else `Male`.
pub fn infer_gender(text: &str) -> Gender {
    if text.to_lowercase().contains("female") {
        Gender::Female
    } else {
        Gender::Male
    }
}

// ── Identity number ──────────────────────────────────────────────────────────

static RE_IDENTITY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b[0-9]{5}[-\s]?[0-9]{7}[-\s]?[0-9]\b").unwrap());

fn find_identity_number(text: &str) -> Option<String> {
    RE_IDENTITY
        .find(text)
        .map(|m| normalize_identity_number(m.as_str()))
}

/// Replace each whitespace character with a hyphen.
///
/// Idempotent: an already-hyphenated number comes back unchanged.
pub fn normalize_identity_number(raw: &str) -> String {
    raw.chars()
        .map(|c| if c.is_whitespace() { '-' } else { c })
        .collect()
}

// ── Names ────────────────────────────────────────────────────────────────────

static RE_NAME_LABEL: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)name\s*[:.]?\s*").unwrap());
static RE_NAME_STOP: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^(?:\s*father|identity|date|[0-9])").unwrap());

static RE_FATHER_LABEL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)father(?:['’]s)?(?:\s*name)?\s*[:.]?\s*").unwrap());
static RE_FATHER_STOP: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^(?:\s*identity|date|[0-9])").unwrap());

static RE_WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

fn find_name(text: &str) -> Option<String> {
    labelled_name(text, &RE_NAME_LABEL, &RE_NAME_STOP)
}

fn find_father_name(text: &str) -> Option<String> {
    labelled_name(text, &RE_FATHER_LABEL, &RE_FATHER_STOP)
}

/// Find the shortest run of letters and spaces after `label` that ends at a stop marker.
///
/// Label occurrences are tried left to right. For each, the value is the
/// text following the label, cut at the first position where `stop` matches
/// or the text ends. A value that runs into any other character (a comma,
/// an apostrophe) before reaching a stop is not a match, and the next label
/// occurrence is tried instead.
///
/// A label followed directly by a stop (`Name:\nFather's Name: …`) ends the
/// search with `None`. Moving on would read the `Name` inside the father's
/// label as the holder's.
fn labelled_name(text: &str, label: &Regex, stop: &Regex) -> Option<String> {
    for m in label.find_iter(text) {
        let rest = &text[m.end()..];
        let run_end = rest
            .char_indices()
            .find(|(_, c)| !(c.is_ascii_alphabetic() || c.is_whitespace()))
            .map(|(i, _)| i)
            .unwrap_or(rest.len());

        let cut = rest[..run_end]
            .char_indices()
            .map(|(i, _)| i)
            .chain(std::iter::once(run_end))
            .find(|&i| i == rest.len() || stop.is_match(&rest[i..]));

        if let Some(cut) = cut {
            let cleaned = clean_name(&rest[..cut]);
            return (!cleaned.is_empty()).then_some(cleaned);
        }
    }
    None
}

/// Trim, collapse internal whitespace, and drop anything but ASCII letters and spaces.
pub fn clean_name(raw: &str) -> String {
    let collapsed = RE_WHITESPACE.replace_all(raw.trim(), " ");
    collapsed
        .chars()
        .filter(|c| c.is_ascii_alphabetic() || c.is_whitespace())
        .collect::<String>()
        .trim()
        .to_string()
}

// ── Dates ────────────────────────────────────────────────────────────────────

static RE_DATE_OF_BIRTH: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)date\s*of\s*birth\s*[:.]?\s*([0-9]{1,2}[-.][0-9]{1,2}[-.][0-9]{4})").unwrap()
});
static RE_DATE_OF_EXPIRY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)(?:date\s*of\s*expiry|expiry\s*date)\s*[:.]?\s*([0-9]{1,2}[-.][0-9]{1,2}[-.][0-9]{4})",
    )
    .unwrap()
});

fn find_date_of_birth(text: &str) -> Option<String> {
    RE_DATE_OF_BIRTH
        .captures(text)
        .map(|c| format_display_date(&c[1]))
}

fn find_date_of_expiry(text: &str) -> Option<String> {
    RE_DATE_OF_EXPIRY
        .captures(text)
        .map(|c| format_display_date(&c[1]))
}

/// `14-03-1990` → `14.03.1990`.
pub fn format_display_date(raw: &str) -> String {
    raw.replace('-', ".")
}

// ── Tests ────────────────────────────────────────────────────────────────────
