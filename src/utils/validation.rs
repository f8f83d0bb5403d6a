//! Input validation utilities
//!
//! Provides input sanitation shared by account management and the server
//! engine's command handling.

/// Validate that an identifier is not empty, fits `max_length` and contains
/// no whitespace or control characters anywhere.
pub fn is_valid_identifier(input: &str, max_length: usize) -> bool {
    !input.is_empty()
        && input.len() <= max_length
        && !input.chars().any(|c| c.is_whitespace() || c.is_control())
}

/// Returns whether the input carries line breaks or NUL bytes.
pub fn has_line_breaks(input: &str) -> bool {
    input.contains(['\r', '\n', '\0'])
}
