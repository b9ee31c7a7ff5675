//! Validation error type

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub type ValidationResult<T> = Result<T, ValidationError>;

/// Stable validation error codes
pub mod codes {
    pub const REQUIRED: &str = "EREQUIRED";
    pub const MAX_LENGTH: &str = "EMAXLEN";
    pub const MIN_LENGTH: &str = "EMINLEN";
    pub const MIN_VALUE: &str = "EMINVAL";
    pub const MAX_VALUE: &str = "EMAXVAL";
    pub const RANGE: &str = "ERANGE";
    pub const PATTERN: &str = "EPATTERN";
    pub const VALIDATE: &str = "EVALIDATE";
}

/// A single validation failure reported by a rule
#[derive(Debug, Clone, Error, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
#[error("{message} ({code})")]
pub struct ValidationError {
    /// Error code for programmatic handling
    pub code: String,
    /// Human-readable message, possibly rewritten by a translator
    pub message: String,
    /// The untranslated message
    pub inner_message: String,
    /// Additional context, e.g. the rule parameters
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<serde_json::Value>,
}

impl ValidationError {
    /// Create a validation error with a code and message
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        let message = message.into();
        Self {
            code: code.into(),
            inner_message: message.clone(),
            message,
            context: None,
        }
    }

    /// Replace the visible message, keeping the untranslated one
    pub fn message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    /// Set additional context
    pub fn context(mut self, context: serde_json::Value) -> Self {
        self.context = Some(context);
        self
    }
}
