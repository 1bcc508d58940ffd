//! Instructions sent to the vision model.
//!
//! Callers can override the default via [`crate::config::BatchConfig::instruction`];
//! the constant here is used only when no override is provided.

/// Default instruction sent alongside every page image.
pub const HANDWRITING_INSTRUCTION: &str =
    "Extract HIGH QUALITY text from the handwriting in the image";

/// Resolve the instruction for a batch, honouring a caller override.
pub fn instruction_or_default(custom: Option<&str>) -> &str {
    match custom {
        Some(s) if !s.trim().is_empty() => s,
        _ => HANDWRITING_INSTRUCTION,
    }
}
