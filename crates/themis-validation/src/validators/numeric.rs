//! Numeric value validators

use super::format_bound;
use crate::error::{codes, ValidationError, ValidationResult};
use crate::traits::ValidationRule;
use async_trait::async_trait;
use serde_json::{json, Value};

/// Extract a numeric value from a JSON value
fn numeric_value(value: &Value) -> Option<f64> {
    match value {
        Value::Number(num) => num.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
}

/// Validator for an inclusive lower bound
#[derive(Debug, Clone)]
pub struct MinValueValidator {
    pub min_value: f64,
    /// Custom error message
    pub message: Option<String>,
}

impl MinValueValidator {
    pub fn new(min_value: f64) -> Self {
        Self {
            min_value,
            message: None,
        }
    }
}

#[async_trait]
impl ValidationRule for MinValueValidator {
    fn validate_sync(&self, value: &Value) -> ValidationResult<()> {
        match numeric_value(value) {
            Some(number) if number < self.min_value => {
                let message = self.message.clone().unwrap_or_else(|| {
                    format!(
                        "The value should be greater than or equal to {}.",
                        format_bound(self.min_value)
                    )
                });
                Err(ValidationError::new(codes::MIN_VALUE, message)
                    .context(json!({ "minValue": self.min_value })))
            }
            _ => Ok(()),
        }
    }

    fn rule_name(&self) -> &'static str {
        "min_value"
    }

    fn parameters(&self) -> Option<Value> {
        Some(json!({ "minValue": self.min_value }))
    }
}

/// Validator for an inclusive upper bound
#[derive(Debug, Clone)]
pub struct MaxValueValidator {
    pub max_value: f64,
    /// Custom error message
    pub message: Option<String>,
}

impl MaxValueValidator {
    pub fn new(max_value: f64) -> Self {
        Self {
            max_value,
            message: None,
        }
    }
}

#[async_trait]
impl ValidationRule for MaxValueValidator {
    fn validate_sync(&self, value: &Value) -> ValidationResult<()> {
        match numeric_value(value) {
            Some(number) if number > self.max_value => {
                let message = self.message.clone().unwrap_or_else(|| {
                    format!(
                        "The value should be lower or equal to {}.",
                        format_bound(self.max_value)
                    )
                });
                Err(ValidationError::new(codes::MAX_VALUE, message)
                    .context(json!({ "maxValue": self.max_value })))
            }
            _ => Ok(()),
        }
    }

    fn rule_name(&self) -> &'static str {
        "max_value"
    }

    fn parameters(&self) -> Option<Value> {
        Some(json!({ "maxValue": self.max_value }))
    }
}

/// Validator for an inclusive range
#[derive(Debug, Clone)]
pub struct RangeValidator {
    pub min_value: f64,
    pub max_value: f64,
    /// Custom error message
    pub message: Option<String>,
}

impl RangeValidator {
    pub fn new(min_value: f64, max_value: f64) -> Self {
        Self {
            min_value,
            max_value,
            message: None,
        }
    }
}

#[async_trait]
impl ValidationRule for RangeValidator {
    fn validate_sync(&self, value: &Value) -> ValidationResult<()> {
        match numeric_value(value) {
            Some(number) if number < self.min_value || number > self.max_value => {
                let message = self.message.clone().unwrap_or_else(|| {
                    format!(
                        "The value should be between {} to {}.",
                        format_bound(self.min_value),
                        format_bound(self.max_value)
                    )
                });
                Err(ValidationError::new(codes::RANGE, message).context(json!({
                    "minValue": self.min_value,
                    "maxValue": self.max_value
                })))
            }
            _ => Ok(()),
        }
    }

    fn rule_name(&self) -> &'static str {
        "range"
    }

    fn parameters(&self) -> Option<Value> {
        Some(json!({ "minValue": self.min_value, "maxValue": self.max_value }))
    }
}
