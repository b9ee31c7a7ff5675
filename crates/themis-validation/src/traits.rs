//! Core validation trait

use crate::error::ValidationResult;
use async_trait::async_trait;
use serde_json::Value;

/// A rule that validates one attribute value.
///
/// Synchronous rules implement `validate_sync`; rules that need I/O override
/// `validate`. Callers always go through `validate`.
#[async_trait]
pub trait ValidationRule: Send + Sync {
    /// Validate a value without suspending
    fn validate_sync(&self, _value: &Value) -> ValidationResult<()> {
        Ok(())
    }

    /// Validate a value, possibly asynchronously
    async fn validate(&self, value: &Value) -> ValidationResult<()> {
        self.validate_sync(value)
    }

    /// Get the validation rule name
    fn rule_name(&self) -> &'static str;

    /// Get validation rule parameters as JSON
    fn parameters(&self) -> Option<Value> {
        None
    }
}
