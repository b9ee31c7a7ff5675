//! Custom validation functions and closures

use crate::error::{codes, ValidationError, ValidationResult};
use crate::traits::ValidationRule;
use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::Arc;

/// Type alias for sync validation functions
pub type SyncValidationFn = Arc<dyn Fn(&Value) -> ValidationResult<()> + Send + Sync>;

/// Custom validator wrapping a user-defined function
#[derive(Clone)]
pub struct CustomValidator {
    /// Name/identifier for this custom validator
    pub name: String,
    validator: SyncValidationFn,
    /// Custom error message
    pub message: Option<String>,
}

impl CustomValidator {
    /// Create a new custom validator with a sync function
    pub fn new<F>(name: impl Into<String>, validator: F) -> Self
    where
        F: Fn(&Value) -> ValidationResult<()> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            validator: Arc::new(validator),
            message: None,
        }
    }

    /// Create a validator from a predicate, failing with `EVALIDATE`
    pub fn predicate<F>(name: impl Into<String>, predicate: F) -> Self
    where
        F: Fn(&Value) -> bool + Send + Sync + 'static,
    {
        Self::new(name, move |value| {
            if predicate(value) {
                Ok(())
            } else {
                Err(ValidationError::new(
                    codes::VALIDATE,
                    "The value seems to be invalid.",
                ))
            }
        })
    }

    /// Set custom error message
    pub fn message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }
}

impl std::fmt::Debug for CustomValidator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CustomValidator")
            .field("name", &self.name)
            .field("message", &self.message)
            .finish()
    }
}

#[async_trait]
impl ValidationRule for CustomValidator {
    fn validate_sync(&self, value: &Value) -> ValidationResult<()> {
        if value.is_null() {
            return Ok(());
        }
        match ((self.validator)(value), &self.message) {
            (Err(error), Some(message)) => Err(ValidationError {
                message: message.clone(),
                inner_message: message.clone(),
                ..error
            }),
            (result, _) => result,
        }
    }

    fn rule_name(&self) -> &'static str {
        "custom"
    }

    fn parameters(&self) -> Option<Value> {
        Some(json!({ "name": self.name }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_custom_predicate() {
        let even = CustomValidator::predicate("even", |v| v.as_i64().map_or(false, |n| n % 2 == 0));

        assert!(even.validate(&json!(4)).await.is_ok());
        let error = even.validate(&json!(3)).await.unwrap_err();
        assert_eq!(error.code, "EVALIDATE");
    }

    #[tokio::test]
    async fn test_custom_message_overrides_function_message() {
        let validator = CustomValidator::new("never", |_| {
            Err(ValidationError::new("ECUSTOM", "nope"))
        })
        .message("Always fails");

        let error = validator.validate(&json!("x")).await.unwrap_err();
        assert_eq!(error.code, "ECUSTOM");
        assert_eq!(error.message, "Always fails");
    }

    #[test]
    fn test_custom_validator_skips_null() {
        let validator = CustomValidator::predicate("never", |_| false);
        assert!(validator.validate_sync(&Value::Null).is_ok());
    }
}
