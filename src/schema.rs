// 📐 Shape Layer - Input Validation
// Preconditions a movement must satisfy before it reaches storage

use thiserror::Error;

// ============================================================================
// VALIDATION ERROR
// ============================================================================

/// Rejected input. Always recoverable: fix the field and retry.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{field}: {message}")]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

impl ValidationError {
    pub fn new(field: &str, message: impl Into<String>) -> Self {
        Self {
            field: field.to_string(),
            message: message.into(),
        }
    }
}

// ============================================================================
// FIELD VALIDATORS
// ============================================================================

/// Trimmed, non-empty description
pub fn validate_description(description: &str) -> Result<&str, ValidationError> {
    let trimmed = description.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::new("description", "Required field is empty"));
    }
    Ok(trimmed)
}

/// Finite, non-negative amount
pub fn validate_amount(amount: f64) -> Result<f64, ValidationError> {
    if !amount.is_finite() {
        return Err(ValidationError::new(
            "amount",
            format!("Must be a finite number, got {}", amount),
        ));
    }
    if amount < 0.0 {
        return Err(ValidationError::new(
            "amount",
            format!("Must not be negative, got {}", amount),
        ));
    }
    // Normalise -0.0 so it never prints as a negative amount
    Ok(amount + 0.0)
}

/// Parse amount text typed into a form or passed on the command line
pub fn parse_amount(text: &str) -> Result<f64, ValidationError> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::new("amount", "Required field is empty"));
    }

    let amount: f64 = trimmed
        .parse()
        .map_err(|_| ValidationError::new("amount", format!("Must be numeric, got '{}'", trimmed)))?;

    validate_amount(amount)
}
