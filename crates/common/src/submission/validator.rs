//! Presence checks on the canonical field map

use super::fields::REQUIRED;
use super::normalizer::FormFields;
use crate::errors::{AppError, Result};

/// Fail on the first required field that is absent or blank.
///
/// Only presence is checked. The contact string in particular is accepted in
/// whatever shape the client typed it.
pub fn validate(fields: &FormFields) -> Result<()> {
    match REQUIRED.iter().find(|name| fields.get_present(name).is_none()) {
        Some(name) => Err(AppError::MissingField {
            field: (*name).to_string(),
        }),
        None => Ok(()),
    }
}
