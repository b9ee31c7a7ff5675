//! Composite validator for named data types

use super::length::{MaxLengthValidator, MinLengthValidator};
use super::numeric::{MaxValueValidator, MinValueValidator, RangeValidator};
use super::pattern::PatternValidator;
use crate::error::ValidationResult;
use crate::rules::TypeRules;
use crate::traits::ValidationRule;
use async_trait::async_trait;
use serde_json::Value;

/// Validator composed from the pattern, range and length properties of a
/// data type. Sub-checks run in a fixed order: pattern, range, min length,
/// max length.
pub struct DataTypeValidator {
    /// The data type name this validator was built for
    pub type_name: String,
    rules: Vec<Box<dyn ValidationRule>>,
}

impl DataTypeValidator {
    /// Build a validator from type rules
    pub fn new(type_name: impl Into<String>, type_rules: &TypeRules) -> Result<Self, regex::Error> {
        let mut rules: Vec<Box<dyn ValidationRule>> = Vec::new();

        if let Some(pattern) = &type_rules.pattern {
            let mut validator = PatternValidator::new(pattern)?;
            if let Some(message) = &type_rules.pattern_message {
                validator = validator.message(message.clone());
            }
            rules.push(Box::new(validator));
        }

        match (type_rules.min_value, type_rules.max_value) {
            (Some(min), Some(max)) => rules.push(Box::new(RangeValidator::new(min, max))),
            (Some(min), None) => rules.push(Box::new(MinValueValidator::new(min))),
            (None, Some(max)) => rules.push(Box::new(MaxValueValidator::new(max))),
            (None, None) => {}
        }

        if let Some(min_length) = type_rules.min_length {
            rules.push(Box::new(MinLengthValidator::new(min_length)));
        }
        if let Some(max_length) = type_rules.max_length {
            rules.push(Box::new(MaxLengthValidator::new(max_length)));
        }

        Ok(Self {
            type_name: type_name.into(),
            rules,
        })
    }

    /// Number of composed sub-checks
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

impl std::fmt::Debug for DataTypeValidator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DataTypeValidator")
            .field("type_name", &self.type_name)
            .field(
                "rules",
                &self.rules.iter().map(|r| r.rule_name()).collect::<Vec<_>>(),
            )
            .finish()
    }
}

#[async_trait]
impl ValidationRule for DataTypeValidator {
    fn validate_sync(&self, value: &Value) -> ValidationResult<()> {
        for rule in &self.rules {
            rule.validate_sync(value)?;
        }
        Ok(())
    }

    fn rule_name(&self) -> &'static str {
        "data_type"
    }

    fn parameters(&self) -> Option<Value> {
        Some(serde_json::json!({ "type": self.type_name }))
    }
}
