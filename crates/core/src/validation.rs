//! Input validation utilities.

use crate::{CareError, CareResult};
use chrono::NaiveTime;

const MAX_IDENTIFIER_LEN: usize = 254;

/// Validates a challenge identifier (email address or phone number).
///
/// Only structural checks are applied: non-blank, bounded length, no whitespace or control
/// characters. Whether the contact point exists is the delivery channel's concern.
pub fn validate_identifier(identifier: &str) -> CareResult<String> {
    let trimmed = identifier.trim();

    if trimmed.is_empty() {
        return Err(CareError::InvalidInput(
            "email or phone number is required".into(),
        ));
    }

    if trimmed.len() > MAX_IDENTIFIER_LEN {
        return Err(CareError::InvalidInput(format!(
            "identifier exceeds maximum length of {} characters",
            MAX_IDENTIFIER_LEN
        )));
    }

    if trimmed.chars().any(|c| c.is_whitespace() || c.is_control()) {
        return Err(CareError::InvalidInput(
            "identifier must not contain whitespace".into(),
        ));
    }

    Ok(trimmed.to_string())
}

/// True when the identifier names an email address rather than a phone number.
pub fn is_email_identifier(identifier: &str) -> bool {
    identifier.contains('@')
}

/// Parses an `HH:MM` time label.
pub fn parse_time_label(label: &str) -> CareResult<NaiveTime> {
    NaiveTime::parse_from_str(label.trim(), "%H:%M").map_err(|_| {
        CareError::InvalidInput(format!("time '{}' must use HH:MM format", label))
    })
}
