//! Validation Utilities
//!
//! Message-body validation shared by the HTTP handlers and the gateway, plus
//! the bridge from `validator` derive errors into `AppError`.

use validator::ValidationErrors;

use super::error::AppError;

/// Validate a message body before it reaches the store. Enforced on both the
/// gateway `send`/`edit` path and the REST surface.
pub fn validate_body(body: &str, max_length: usize) -> Result<(), AppError> {
    if body.trim().is_empty() {
        return Err(AppError::Validation("Message body must not be empty".into()));
    }
    if body.chars().count() > max_length {
        return Err(AppError::Validation(format!(
            "Message body exceeds {} characters",
            max_length
        )));
    }
    Ok(())
}

/// Convert validation errors to AppError
pub fn validation_error(errors: ValidationErrors) -> AppError {
    let message = errors
        .field_errors()
        .iter()
        .flat_map(|(field, errs)| {
            errs.iter().map(move |e| {
                format!(
                    "{}: {}",
                    field,
                    e.message.clone().map(|m| m.to_string()).unwrap_or_default()
                )
            })
        })
        .next()
        .unwrap_or_else(|| "Validation failed".into());

    AppError::Validation(message)
}
