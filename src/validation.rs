use crate::error::{AppError, AppResult};

// =============================================================================
// Validation Constants
// =============================================================================

/// Maximum length of a submission title, in characters.
pub const MAX_TITLE_LENGTH: usize = 100;

/// Maximum number of digits in a Discord user ID.
///
/// Discord snowflakes are unsigned 64-bit integers, at most 20 decimal digits.
pub const MAX_DISCORD_ID_LENGTH: usize = 20;

/// Maximum length for feed/site links.
pub const MAX_LINK_LENGTH: usize = 2048;

/// Flag values treated as `true` (case-insensitive).
const TRUTHY_FLAGS: [&str; 2] = ["true", "on"];

fn invalid(field: &str, reason: impl Into<String>) -> AppError {
    AppError::InvalidField {
        field: field.to_string(),
        reason: reason.into(),
    }
}

/// Return the trimmed value of a required text field.
///
/// Absent and whitespace-only values are both reported as `MissingField`.
pub fn required_text(value: Option<&str>, field: &str) -> AppResult<String> {
    optional_text(value).ok_or_else(|| AppError::MissingField(field.to_string()))
}

/// Trimmed value of an optional text field; blank counts as absent.
pub fn optional_text(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

/// Interpret a form flag. Only `"true"` and `"on"` are `true`.
pub fn parse_flag(value: Option<&str>) -> bool {
    value.is_some_and(|v| {
        let v = v.trim();
        TRUTHY_FLAGS.iter().any(|t| v.eq_ignore_ascii_case(t))
    })
}

/// Split comma-separated tag values into individual tags.
///
/// Every value is split, entries are trimmed and blanks dropped. Order is
/// preserved across values.
pub fn split_tags(values: &[String]) -> Vec<String> {
    values
        .iter()
        .flat_map(|v| v.split(','))
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

/// Validate a Discord user ID.
///
/// Rules:
/// - Must be 1 to 20 ASCII digits
pub fn validate_discord_id(id: &str) -> AppResult<()> {
    if id.is_empty() || !id.bytes().all(|b| b.is_ascii_digit()) {
        return Err(invalid("discord", "must be a numeric Discord user ID"));
    }

    if id.len() > MAX_DISCORD_ID_LENGTH {
        return Err(invalid(
            "discord",
            format!("cannot exceed {MAX_DISCORD_ID_LENGTH} digits"),
        ));
    }

    Ok(())
}

/// Validate a submission title.
///
/// Rules:
/// - At most 100 characters
/// - No control characters
pub fn validate_title(title: &str) -> AppResult<()> {
    let length = title.chars().count();
    if length > MAX_TITLE_LENGTH {
        return Err(invalid(
            "title",
            format!("cannot exceed {MAX_TITLE_LENGTH} characters (got {length})"),
        ));
    }

    if let Some(pos) = title.chars().position(|c| c.is_control()) {
        return Err(invalid(
            "title",
            format!("contains invalid control character at position {pos}"),
        ));
    }

    Ok(())
}

/// Validate a link submitted to the actions route.
///
/// Rules:
/// - Must start with `http://` or `https://` and have a host part
/// - No whitespace or control characters
/// - At most 2048 bytes
pub fn validate_link(link: &str) -> AppResult<()> {
    if link.len() > MAX_LINK_LENGTH {
        return Err(invalid(
            "link",
            format!("cannot exceed {MAX_LINK_LENGTH} characters"),
        ));
    }

    let rest = link
        .strip_prefix("https://")
        .or_else(|| link.strip_prefix("http://"))
        .ok_or_else(|| invalid("link", "must be an http(s) URL"))?;

    if rest.is_empty() || rest.starts_with('/') {
        return Err(invalid("link", "must include a host"));
    }

    if link.chars().any(|c| c.is_whitespace() || c.is_control()) {
        return Err(invalid("link", "cannot contain whitespace"));
    }

    Ok(())
}
