//! Validation error types

/// Error information for a specific field that failed validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldValidationError {
    /// The field that failed validation.
    pub field: String,
    /// Human-readable validation error message.
    pub message: String,
    /// Name of the rule that rejected the value, if any.
    pub rule: Option<String>,
}

impl FieldValidationError {
    /// Creates a new field validation error.
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
            rule: None,
        }
    }

    /// Creates a new field validation error raised by a named rule.
    pub fn with_rule(field: impl Into<String>, message: impl Into<String>, rule: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
            rule: Some(rule.into()),
        }
    }
}

impl std::fmt::Display for FieldValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if let Some(rule) = &self.rule {
            write!(f, "{}: {} ({})", self.field, self.message, rule)
        } else {
            write!(f, "{}: {}", self.field, self.message)
        }
    }
}

/// One or more fields of a row failed local validation.
#[derive(Debug, Clone, thiserror::Error)]
#[error("Validation failed: {}", .fields.iter().map(ToString::to_string).collect::<Vec<_>>().join("; "))]
pub struct ValidationError {
    pub fields: Vec<FieldValidationError>,
}

impl ValidationError {
    pub fn new(fields: Vec<FieldValidationError>) -> Self {
        Self { fields }
    }

    pub fn single(field: FieldValidationError) -> Self {
        Self { fields: vec![field] }
    }
}
