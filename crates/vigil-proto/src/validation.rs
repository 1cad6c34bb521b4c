//! Input validation for Vigil protocol types.
//!
//! Snapshot validation rejects a report as a whole: values are never
//! clamped and a failing snapshot must not reach the cache, the archive,
//! or alert evaluation.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::ProtoError;
use crate::snapshot::MetricSnapshot;

/// Maximum length for server identifiers.
pub const MAX_SERVER_ID_LENGTH: usize = 255;

/// Maximum length for recipient e-mail addresses (RFC 5321 octet limit).
pub const MAX_EMAIL_LENGTH: usize = 254;

/// Regex for valid server identifiers (hostname-ish: alphanumeric start,
/// then alphanumerics, dots, hyphens, underscores).
static SERVER_ID_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[a-zA-Z0-9][a-zA-Z0-9._-]*$").unwrap_or_else(|_| unreachable!())
});

/// Regex for plausible e-mail addresses. Deliberately loose: one `@`, no
/// whitespace, a dotted domain. Deliverability is the transport's problem.
static EMAIL_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap_or_else(|_| unreachable!())
});

/// Validation error with detailed information.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// The field that failed validation.
    pub field: String,
    /// Description of the validation failure.
    pub message: String,
}

impl ValidationError {
    /// Create a new validation error.
    #[must_use]
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

impl std::error::Error for ValidationError {}

impl From<ValidationError> for ProtoError {
    fn from(e: ValidationError) -> Self {
        Self::Validation(e.to_string())
    }
}

/// Result of validation that may contain multiple errors.
#[derive(Debug, Clone, Default)]
pub struct ValidationResult {
    errors: Vec<ValidationError>,
}

impl ValidationResult {
    /// Create a new empty validation result.
    #[must_use]
    pub const fn new() -> Self {
        Self { errors: Vec::new() }
    }

    /// Add an error to the result.
    pub fn add_error(&mut self, error: ValidationError) {
        self.errors.push(error);
    }

    /// Add an error with field and message.
    pub fn error(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.errors.push(ValidationError::new(field, message));
    }

    /// Check if validation passed (no errors).
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    /// Get all errors.
    #[must_use]
    pub fn errors(&self) -> &[ValidationError] {
        &self.errors
    }

    /// Convert to Result, returning Err if there are any errors.
    ///
    /// # Errors
    ///
    /// Returns the first validation error if validation failed.
    pub fn into_result(self) -> Result<(), ValidationError> {
        self.errors.into_iter().next().map_or(Ok(()), Err)
    }

    /// Merge another validation result into this one.
    pub fn merge(&mut self, other: Self) {
        self.errors.extend(other.errors);
    }
}

/// Validate a server identifier.
///
/// # Errors
///
/// Returns an error if the identifier is empty, longer than
/// [`MAX_SERVER_ID_LENGTH`], or contains characters outside the allowed
/// alphabet.
pub fn validate_server_id(id: &str) -> Result<(), ValidationError> {
    if id.is_empty() {
        return Err(ValidationError::new("server_id", "cannot be empty"));
    }
    if id.len() > MAX_SERVER_ID_LENGTH {
        return Err(ValidationError::new(
            "server_id",
            format!("exceeds {MAX_SERVER_ID_LENGTH} characters"),
        ));
    }
    if !SERVER_ID_REGEX.is_match(id) {
        return Err(ValidationError::new(
            "server_id",
            "must start with an alphanumeric and contain only alphanumerics, '.', '_', '-'",
        ));
    }
    Ok(())
}

/// Validate a recipient e-mail address.
///
/// # Errors
///
/// Returns an error if the address is empty, too long, or not shaped like
/// `local@domain.tld`.
pub fn validate_email(email: &str) -> Result<(), ValidationError> {
    if email.is_empty() {
        return Err(ValidationError::new("email", "cannot be empty"));
    }
    if email.len() > MAX_EMAIL_LENGTH {
        return Err(ValidationError::new(
            "email",
            format!("exceeds {MAX_EMAIL_LENGTH} characters"),
        ));
    }
    if !EMAIL_REGEX.is_match(email) {
        return Err(ValidationError::new(
            "email",
            format!("'{email}' is not a valid e-mail address"),
        ));
    }
    Ok(())
}

fn check_percent(result: &mut ValidationResult, field: &str, value: f64) {
    if !(0.0..=100.0).contains(&value) {
        result.error(field, format!("must be between 0 and 100, got {value}"));
    }
}

/// Validate a metric snapshot against the ingest range rules.
///
/// Checks, in order: `cpu.total` and every per-core value in `[0, 100]`,
/// `memory.total` strictly positive, `memory.used` non-negative and not
/// above `memory.total`, `disk.percent` in `[0, 100]`. Non-finite values
/// fail the range they are checked against.
///
/// # Errors
///
/// Returns the first offending field with a description; the snapshot must
/// then be rejected as a whole.
pub fn validate_snapshot(snapshot: &MetricSnapshot) -> Result<(), ValidationError> {
    let mut result = ValidationResult::new();

    check_percent(&mut result, "cpu.total", snapshot.cpu.total);
    for (idx, core) in snapshot.cpu.per_core.iter().enumerate() {
        if !(0.0..=100.0).contains(core) {
            result.error(
                format!("cpu.per_core[{idx}]"),
                format!("must be between 0 and 100, got {core}"),
            );
        }
    }

    if !snapshot.memory.total.is_finite() || snapshot.memory.total <= 0.0 {
        result.error(
            "memory.total",
            format!("must be positive, got {}", snapshot.memory.total),
        );
    } else if !snapshot.memory.used.is_finite() || snapshot.memory.used < 0.0 {
        result.error(
            "memory.used",
            format!("must be non-negative, got {}", snapshot.memory.used),
        );
    } else if snapshot.memory.used > snapshot.memory.total {
        result.error(
            "memory.used",
            format!(
                "exceeds memory.total ({} > {})",
                snapshot.memory.used, snapshot.memory.total
            ),
        );
    }

    check_percent(&mut result, "disk.percent", snapshot.disk.percent);

    result.into_result()
}
