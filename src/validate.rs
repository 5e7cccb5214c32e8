use crate::error::ValidationError;

/// Accepted response length range, in characters.
pub const MIN_RESPONSE_CHARS: usize = 10;
pub const MAX_RESPONSE_CHARS: usize = 750;

/// Refusal and meta phrases that disqualify a generated response.
/// Matched case-insensitively as substrings.
const REFUSAL_PATTERNS: &[&str] = &[
    "i'm sorry, but i can't",
    "i cannot assist",
    "as an ai",
    "i'm an ai assistant",
];

/// Accept or reject a candidate response before delivery.
///
/// Rejects empty text, text outside
/// [`MIN_RESPONSE_CHARS`, `MAX_RESPONSE_CHARS`], and anything matching a
/// known refusal pattern.
pub fn validate_response(text: &str) -> Result<(), ValidationError> {
    if text.is_empty() {
        return Err(ValidationError::Empty);
    }

    let len = text.chars().count();
    if !(MIN_RESPONSE_CHARS..=MAX_RESPONSE_CHARS).contains(&len) {
        return Err(ValidationError::Length(len));
    }

    let lower = text.to_lowercase();
    if REFUSAL_PATTERNS.iter().any(|p| lower.contains(p)) {
        return Err(ValidationError::Refusal);
    }

    Ok(())
}
