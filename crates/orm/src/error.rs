//! Error types for the ORM engine
//!
//! Every failure surfaced by the engine is a `ModelError`. Validation
//! failures carry a structured `FieldError` so callers can react on the
//! stable code instead of the message.

use serde::{Deserialize, Serialize};
use std::fmt;
use themis_validation::ValidationError;

/// Result type alias for model operations
pub type ModelResult<T> = Result<T, ModelError>;

/// ORM error type alias
pub type OrmError = ModelError;

/// ORM result type alias
pub type OrmResult<T> = ModelResult<T>;

/// A validation failure bound to a model attribute
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldError {
    /// Stable error code, e.g. `EREQUIRED`
    pub code: String,
    /// The model being validated
    pub model: String,
    /// The attribute that failed
    pub field: String,
    /// Human-readable message, possibly translated
    pub message: String,
    /// The untranslated message
    pub inner_message: String,
}

impl FieldError {
    /// Bind a rule failure to a model attribute
    pub fn from_validation(model: &str, field: &str, error: ValidationError) -> Self {
        Self {
            code: error.code,
            model: model.to_string(),
            field: field.to_string(),
            message: error.message,
            inner_message: error.inner_message,
        }
    }
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}.{}: {} ({})",
            self.model, self.field, self.message, self.code
        )
    }
}

/// Error types for ORM operations
#[derive(Debug, Clone)]
pub enum ModelError {
    /// Storage adapter execution error
    Database(String),
    /// Object or model not found
    NotFound(String),
    /// Attribute validation failed
    Validation(FieldError),
    /// Model has no primary key, or an object is missing its key value
    MissingPrimaryKey(String),
    /// Inherited association cannot be reconciled with the requesting model
    Mapping(String),
    /// Serialization/deserialization error
    Serialization(String),
    /// Migration error
    Migration(String),
    /// Transaction error
    Transaction(String),
    /// Schema definition error
    Schema(String),
    /// Query building error
    Query(String),
    /// Event listener error
    Event(String),
    /// Configuration error
    Configuration(String),
    /// The current user lacks the privilege for the operation
    Permission { model: String, message: String },
    /// A declared constraint was violated
    Constraint {
        model: String,
        fields: Vec<String>,
        message: String,
    },
}

impl ModelError {
    /// Stable error code for programmatic handling
    pub fn code(&self) -> &str {
        match self {
            ModelError::Database(_) => "EDATA",
            ModelError::NotFound(_) => "ENOTFOUND",
            ModelError::Validation(error) => &error.code,
            ModelError::MissingPrimaryKey(_) => "ENOKEY",
            ModelError::Mapping(_) => "EMAPPING",
            ModelError::Serialization(_) => "ESERIAL",
            ModelError::Migration(_) => "EMIGRATE",
            ModelError::Transaction(_) => "ETRANS",
            ModelError::Schema(_) => "ESCHEMA",
            ModelError::Query(_) => "EQUERY",
            ModelError::Event(_) => "EEVENT",
            ModelError::Configuration(_) => "ECONFIG",
            ModelError::Permission { .. } => "EACCESS",
            ModelError::Constraint { .. } => "EUNQ",
        }
    }

    /// The field error when this is a validation failure
    pub fn as_field_error(&self) -> Option<&FieldError> {
        match self {
            ModelError::Validation(error) => Some(error),
            _ => None,
        }
    }
}

impl fmt::Display for ModelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModelError::Database(msg) => write!(f, "Database error: {}", msg),
            ModelError::NotFound(what) => write!(f, "Not found: {}", what),
            ModelError::Validation(error) => write!(f, "Validation error: {}", error),
            ModelError::MissingPrimaryKey(model) => {
                write!(f, "Primary key is missing or invalid for model '{}'", model)
            }
            ModelError::Mapping(msg) => write!(f, "Mapping error: {}", msg),
            ModelError::Serialization(msg) => write!(f, "Serialization error: {}", msg),
            ModelError::Migration(msg) => write!(f, "Migration error: {}", msg),
            ModelError::Transaction(msg) => write!(f, "Transaction error: {}", msg),
            ModelError::Schema(msg) => write!(f, "Schema error: {}", msg),
            ModelError::Query(msg) => write!(f, "Query error: {}", msg),
            ModelError::Event(msg) => write!(f, "Event error: {}", msg),
            ModelError::Configuration(msg) => write!(f, "Configuration error: {}", msg),
            ModelError::Permission { model, message } => {
                write!(f, "Access denied on '{}': {}", model, message)
            }
            ModelError::Constraint {
                model,
                fields,
                message,
            } => write!(
                f,
                "Constraint violation on '{}' ({}): {}",
                model,
                fields.join(", "),
                message
            ),
        }
    }
}

impl std::error::Error for ModelError {}

impl From<FieldError> for ModelError {
    fn from(err: FieldError) -> Self {
        ModelError::Validation(err)
    }
}

// Rule failures raised outside the engine carry no model or field
impl From<ValidationError> for ModelError {
    fn from(err: ValidationError) -> Self {
        ModelError::Validation(FieldError::from_validation("", "", err))
    }
}

// Convert from serde_json errors
impl From<serde_json::Error> for ModelError {
    fn from(err: serde_json::Error) -> Self {
        ModelError::Serialization(err.to_string())
    }
}

// Convert from anyhow errors raised by adapters and listeners
impl From<anyhow::Error> for ModelError {
    fn from(err: anyhow::Error) -> Self {
        ModelError::Database(err.to_string())
    }
}

impl From<crate::config::ConfigError> for ModelError {
    fn from(err: crate::config::ConfigError) -> Self {
        ModelError::Configuration(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use themis_validation::codes;

    #[test]
    fn test_field_error_from_validation() {
        let error = FieldError::from_validation(
            "Product",
            "price",
            ValidationError::new(codes::RANGE, "The value should be between 0 to 1000."),
        );
        let model_error = ModelError::from(error);

        assert_eq!(model_error.code(), "ERANGE");
        let field_error = model_error.as_field_error().unwrap();
        assert_eq!(field_error.model, "Product");
        assert_eq!(field_error.field, "price");
        assert!(model_error.to_string().contains("Product.price"));
    }

    #[test]
    fn test_error_codes() {
        assert_eq!(ModelError::Mapping("x".into()).code(), "EMAPPING");
        assert_eq!(
            ModelError::Permission {
                model: "User".into(),
                message: "denied".into()
            }
            .code(),
            "EACCESS"
        );
        assert_eq!(ModelError::NotFound("User(1)".into()).code(), "ENOTFOUND");
    }

    #[test]
    fn test_conversion_from_serde_json() {
        let err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        match ModelError::from(err) {
            ModelError::Serialization(msg) => assert!(!msg.is_empty()),
            other => panic!("Expected serialization error, got {:?}", other),
        }
    }

    #[test]
    fn test_constraint_display() {
        let err = ModelError::Constraint {
            model: "User".into(),
            fields: vec!["email".into()],
            message: "A user with this email already exists".into(),
        };
        assert_eq!(
            err.to_string(),
            "Constraint violation on 'User' (email): A user with this email already exists"
        );
    }
}
