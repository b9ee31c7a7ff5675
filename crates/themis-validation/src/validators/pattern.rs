//! Regular expression validator

use super::value_to_text;
use crate::error::{codes, ValidationError, ValidationResult};
use crate::traits::ValidationRule;
use async_trait::async_trait;
use regex::Regex;
use serde_json::{json, Value};

/// Validator for a regular expression pattern
#[derive(Debug, Clone)]
pub struct PatternValidator {
    pattern: Regex,
    /// Custom error message
    pub message: Option<String>,
}

impl PatternValidator {
    /// Create a new pattern validator
    pub fn new(pattern: &str) -> Result<Self, regex::Error> {
        Ok(Self {
            pattern: Regex::new(pattern)?,
            message: None,
        })
    }

    /// Create a validator from an existing Regex
    pub fn from_regex(regex: Regex) -> Self {
        Self {
            pattern: regex,
            message: None,
        }
    }

    /// Set custom error message
    pub fn message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    /// Get the pattern string
    pub fn pattern_string(&self) -> &str {
        self.pattern.as_str()
    }
}

#[async_trait]
impl ValidationRule for PatternValidator {
    fn validate_sync(&self, value: &Value) -> ValidationResult<()> {
        let Some(text) = value_to_text(value) else {
            return Ok(());
        };

        if !self.pattern.is_match(&text) {
            let message = self
                .message
                .clone()
                .unwrap_or_else(|| "The value seems to be invalid.".to_string());
            return Err(ValidationError::new(codes::PATTERN, message)
                .context(json!({ "pattern": self.pattern.as_str() })));
        }
        Ok(())
    }

    fn rule_name(&self) -> &'static str {
        "pattern"
    }

    fn parameters(&self) -> Option<Value> {
        Some(json!({ "pattern": self.pattern.as_str() }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_pattern_validator() {
        let validator = PatternValidator::new(r"^\d{3}-\d{4}$").unwrap();

        assert!(validator.validate(&json!("555-1234")).await.is_ok());
        let error = validator.validate(&json!("5551234")).await.unwrap_err();
        assert_eq!(error.code, "EPATTERN");
        assert_eq!(error.message, "The value seems to be invalid.");
    }

    #[tokio::test]
    async fn test_pattern_validator_checks_numbers_as_text() {
        let validator = PatternValidator::new(r"^[+-]?\d+$").unwrap();

        assert!(validator.validate(&json!(-12)).await.is_ok());
        assert!(validator.validate(&json!(1.5)).await.is_err());
    }

    #[test]
    fn test_pattern_validator_custom_message() {
        let validator = PatternValidator::new("^a").unwrap().message("Must start with a");
        let error = validator.validate_sync(&json!("b")).unwrap_err();
        assert_eq!(error.message, "Must start with a");
        assert_eq!(validator.pattern_string(), "^a");
    }

    #[test]
    fn test_invalid_pattern_is_rejected() {
        assert!(PatternValidator::new("(unclosed").is_err());
    }
}
