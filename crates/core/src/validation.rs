//! Client-side input checks.
//!
//! Request payloads implement [`Validate`] so malformed input is rejected
//! before it reaches the network. Server-side validation (HTTP 422) remains
//! authoritative; these checks only mirror the form rules.

use crate::error::{DomainError, DomainResult, FieldErrors};

/// A payload that can be checked before submission.
pub trait Validate {
    fn validate(&self) -> DomainResult<()>;
}

/// Non-blank text, trimmed.
pub fn required(field: &str, value: &str) -> DomainResult<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(DomainError::field(field, "is required"));
    }
    Ok(trimmed.to_string())
}

/// Text no longer than `max` characters.
pub fn max_len(field: &str, value: &str, max: usize) -> DomainResult<()> {
    if value.chars().count() > max {
        return Err(DomainError::field(field, format!("must be at most {max} characters")));
    }
    Ok(())
}

/// Digits only, ignoring common punctuation (`.`, `-`, `/`, spaces).
///
/// Returns the bare digit string.
pub fn digits(field: &str, value: &str, min: usize, max: usize) -> DomainResult<String> {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '0'..='9' => out.push(c),
            '.' | '-' | '/' | ' ' | '(' | ')' => {}
            _ => return Err(DomainError::field(field, "must contain only digits")),
        }
    }
    let len = out.len();
    if len < min || len > max {
        let msg = if min == max {
            format!("must have {min} digits")
        } else {
            format!("must have between {min} and {max} digits")
        };
        return Err(DomainError::field(field, msg));
    }
    Ok(out)
}

/// Collects field checks into a single error.
#[derive(Debug, Default)]
pub struct Checks {
    errors: FieldErrors,
}

impl Checks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn check<T>(&mut self, field: &str, result: DomainResult<T>) -> Option<T> {
        self.errors.check(field, result)
    }

    pub fn fail(&mut self, field: &str, msg: impl Into<String>) {
        self.errors.add(field, msg);
    }

    pub fn finish(self) -> DomainResult<()> {
        self.errors.into_result()
    }
}
