//! CLI input validation functions.
//!
//! These validators are used by clap's `value_parser` attribute to validate
//! user input at parse time, providing immediate feedback for invalid values.

use crate::domain::{MAX_DESCRIPTION_LENGTH, MAX_DISPLAY_NAME_LENGTH, validate_name};

/// Validate permission ID prefix format.
///
/// Delegates to the validator in `commands::init` so there is a single
/// source of truth for the rules.
pub fn validate_prefix(s: &str) -> Result<String, String> {
    use crate::commands::init;

    let trimmed = s.trim();
    init::validate_prefix(trimmed).map_err(|e| e.to_string())?;
    Ok(trimmed.to_string())
}

/// Validate a permission machine name such as `users.edit`.
pub fn validate_permission_name(s: &str) -> Result<String, String> {
    let s = s.trim();
    validate_name(s)?;
    Ok(s.to_string())
}

/// Validate a permission reference: an ID or a machine name.
pub fn validate_reference(s: &str) -> Result<String, String> {
    let s = s.trim();
    if s.is_empty() {
        return Err("Permission reference cannot be empty".to_string());
    }
    if s.chars().any(char::is_whitespace) {
        return Err(format!("Permission reference '{s}' cannot contain whitespace"));
    }
    Ok(s.to_string())
}

/// Validate a display name: single line, at most 200 characters.
pub fn validate_display_name(s: &str) -> Result<String, String> {
    let s = s.trim();

    if s.is_empty() {
        return Err("Display name cannot be empty".to_string());
    }

    if s.len() > MAX_DISPLAY_NAME_LENGTH {
        return Err(format!(
            "Display name cannot exceed {} characters, got {} characters",
            MAX_DISPLAY_NAME_LENGTH,
            s.len()
        ));
    }

    if s.contains('\n') || s.contains('\r') {
        return Err("Display name cannot contain newline characters".to_string());
    }

    reject_control_chars(s, "Display name")?;
    Ok(s.to_string())
}

/// Validate a description. Newlines are allowed.
pub fn validate_description(s: &str) -> Result<String, String> {
    if s.len() > MAX_DESCRIPTION_LENGTH {
        return Err(format!(
            "Description cannot exceed {MAX_DESCRIPTION_LENGTH} characters"
        ));
    }
    reject_control_chars(s, "Description")?;
    Ok(s.to_string())
}

/// Control characters other than tab, LF and CR.
fn reject_control_chars(s: &str, field_name: &str) -> Result<(), String> {
    if let Some(pos) = s.chars().position(|c| {
        let code = c as u32;
        (code < 0x20 && code != 0x09 && code != 0x0A && code != 0x0D)
            || (0x7F..=0x9F).contains(&code)
    }) {
        return Err(format!(
            "{field_name} contains invalid control character at position {pos}"
        ));
    }
    Ok(())
}
