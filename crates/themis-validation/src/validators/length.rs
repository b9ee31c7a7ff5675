//! String length validators

use super::format_bound;
use crate::error::{codes, ValidationError, ValidationResult};
use crate::traits::ValidationRule;
use async_trait::async_trait;
use serde_json::{json, Value};

fn length_of(value: &Value) -> Option<usize> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.chars().count()),
        Value::Array(items) => Some(items.len()),
        other => Some(other.to_string().chars().count()),
    }
}

/// Validator for a maximum number of characters
#[derive(Debug, Clone)]
pub struct MaxLengthValidator {
    pub max_length: usize,
    /// Custom error message
    pub message: Option<String>,
}

impl MaxLengthValidator {
    pub fn new(max_length: usize) -> Self {
        Self {
            max_length,
            message: None,
        }
    }

    /// Set custom error message
    pub fn message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }
}

#[async_trait]
impl ValidationRule for MaxLengthValidator {
    fn validate_sync(&self, value: &Value) -> ValidationResult<()> {
        match length_of(value) {
            Some(length) if length > self.max_length => {
                let message = self.message.clone().unwrap_or_else(|| {
                    format!(
                        "The value is too long. It should have {} characters or fewer.",
                        self.max_length
                    )
                });
                Err(ValidationError::new(codes::MAX_LENGTH, message)
                    .context(json!({ "maxLength": self.max_length })))
            }
            _ => Ok(()),
        }
    }

    fn rule_name(&self) -> &'static str {
        "max_length"
    }

    fn parameters(&self) -> Option<Value> {
        Some(json!({ "maxLength": self.max_length }))
    }
}

/// Validator for a minimum number of characters
#[derive(Debug, Clone)]
pub struct MinLengthValidator {
    pub min_length: usize,
    /// Custom error message
    pub message: Option<String>,
}

impl MinLengthValidator {
    pub fn new(min_length: usize) -> Self {
        Self {
            min_length,
            message: None,
        }
    }

    /// Set custom error message
    pub fn message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }
}

#[async_trait]
impl ValidationRule for MinLengthValidator {
    fn validate_sync(&self, value: &Value) -> ValidationResult<()> {
        match length_of(value) {
            Some(length) if length < self.min_length => {
                let message = self.message.clone().unwrap_or_else(|| {
                    format!(
                        "The value is too short. It should have {} characters or more.",
                        format_bound(self.min_length as f64)
                    )
                });
                Err(ValidationError::new(codes::MIN_LENGTH, message)
                    .context(json!({ "minLength": self.min_length })))
            }
            _ => Ok(()),
        }
    }

    fn rule_name(&self) -> &'static str {
        "min_length"
    }

    fn parameters(&self) -> Option<Value> {
        Some(json!({ "minLength": self.min_length }))
    }
}
