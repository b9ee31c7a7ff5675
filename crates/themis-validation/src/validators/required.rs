//! Required value validator

use crate::error::{codes, ValidationError, ValidationResult};
use crate::traits::ValidationRule;
use async_trait::async_trait;
use serde_json::Value;

/// Validator that ensures a value is present and not empty
#[derive(Debug, Clone, Default)]
pub struct RequiredValidator {
    /// Custom error message
    pub message: Option<String>,
}

impl RequiredValidator {
    /// Create a new required validator with the default message
    pub fn new() -> Self {
        Self { message: None }
    }

    /// Create a required validator with a custom message
    pub fn with_message(message: impl Into<String>) -> Self {
        Self {
            message: Some(message.into()),
        }
    }

    fn is_empty(value: &Value) -> bool {
        match value {
            Value::Null => true,
            Value::String(s) => s.is_empty(),
            _ => false,
        }
    }
}

#[async_trait]
impl ValidationRule for RequiredValidator {
    fn validate_sync(&self, value: &Value) -> ValidationResult<()> {
        if Self::is_empty(value) {
            let message = self
                .message
                .clone()
                .unwrap_or_else(|| "A value is required.".to_string());
            return Err(ValidationError::new(codes::REQUIRED, message));
        }
        Ok(())
    }

    fn rule_name(&self) -> &'static str {
        "required"
    }
}
