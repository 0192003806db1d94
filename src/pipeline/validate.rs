//! Record validation: is the extracted record good enough to hand on?
//!
//! A record passes when the identity number is in its normalised
//! `DDDDD-DDDDDDD-D` form and the name, father's name and both dates are
//! present and non-blank. Gender is not checked; the extractor always
//! sets it.

use crate::output::DocumentRecord;
use crate::pipeline::fields::Field;
use once_cell::sync::Lazy;
use regex::Regex;

/// The normalised identity-number shape, anchored at both ends.
pub(crate) static RE_IDENTITY_STRICT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[0-9]{5}-[0-9]{7}-[0-9]$").unwrap());

/// `true` when every required field is present and well-formed.
pub fn validate(record: &DocumentRecord) -> bool {
    missing_fields(record).is_empty()
}

/// The required fields that did not come through, in record order.
///
/// A field is listed when it is absent or blank. The identity number is
/// also listed when it is present but not in `DDDDD-DDDDDDD-D` form, for
/// example when the card printed it without separators.
pub fn missing_fields(record: &DocumentRecord) -> Vec<Field> {
    Field::ALL
        .into_iter()
        .filter(|f| match f.get(record).map(str::trim) {
            None | Some("") => true,
            Some(v) if *f == Field::IdentityNumber => !RE_IDENTITY_STRICT.is_match(v),
            Some(_) => false,
        })
        .collect()
}
