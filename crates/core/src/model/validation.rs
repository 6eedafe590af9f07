//! Field-level validation rules shared by the exam, curriculum and user models.

use thiserror::Error;

pub const NAME_MIN_LEN: usize = 2;
pub const NAME_MAX_LEN: usize = 100;
pub const CODE_MIN_LEN: usize = 2;
pub const CODE_MAX_LEN: usize = 50;
pub const DESCRIPTION_MAX_LEN: usize = 1000;
pub const NOTES_MAX_LEN: usize = 5000;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ValidationError {
    #[error("{field} must be between {min} and {max} characters")]
    Length {
        field: &'static str,
        min: usize,
        max: usize,
    },

    #[error("{field} must be at most {max} characters")]
    TooLong { field: &'static str, max: usize },

    #[error("{field} may only contain uppercase letters, digits, '-' and '_'")]
    InvalidCode { field: &'static str },
}

fn char_len(value: &str) -> usize {
    value.chars().count()
}

/// Trim and length-check a display name.
///
/// # Errors
///
/// Returns `ValidationError::Length` when the trimmed name is out of range.
pub fn name(field: &'static str, raw: &str) -> Result<String, ValidationError> {
    let trimmed = raw.trim();
    let len = char_len(trimmed);
    if !(NAME_MIN_LEN..=NAME_MAX_LEN).contains(&len) {
        return Err(ValidationError::Length {
            field,
            min: NAME_MIN_LEN,
            max: NAME_MAX_LEN,
        });
    }
    Ok(trimmed.to_owned())
}

/// Normalize a hierarchy code to upper case and check its alphabet.
///
/// # Errors
///
/// Returns `ValidationError` when the code is too short, too long, or contains
/// characters outside `[A-Z0-9_-]`.
pub fn code(field: &'static str, raw: &str) -> Result<String, ValidationError> {
    let normalized = raw.trim().to_uppercase();
    let len = char_len(&normalized);
    if !(CODE_MIN_LEN..=CODE_MAX_LEN).contains(&len) {
        return Err(ValidationError::Length {
            field,
            min: CODE_MIN_LEN,
            max: CODE_MAX_LEN,
        });
    }
    let valid = normalized
        .chars()
        .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || c == '_' || c == '-');
    if !valid {
        return Err(ValidationError::InvalidCode { field });
    }
    Ok(normalized)
}

/// Trim optional free text; blank input becomes `None`.
///
/// # Errors
///
/// Returns `ValidationError::TooLong` when the text exceeds `max` characters.
pub fn optional_text(
    field: &'static str,
    raw: Option<String>,
    max: usize,
) -> Result<Option<String>, ValidationError> {
    let Some(raw) = raw else {
        return Ok(None);
    };
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    if char_len(trimmed) > max {
        return Err(ValidationError::TooLong { field, max });
    }
    Ok(Some(trimmed.to_owned()))
}
