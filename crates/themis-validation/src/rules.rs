//! Declarative validation properties shared by data types and attributes

use serde::{Deserialize, Serialize};

/// Pattern, range and length rules as they appear in a data type or an
/// attribute `validation` document
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TypeRules {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pattern_message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_value: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_value: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_length: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_length: Option<usize>,
}

impl TypeRules {
    /// True when no rule is declared
    pub fn is_empty(&self) -> bool {
        self.pattern.is_none()
            && self.min_value.is_none()
            && self.max_value.is_none()
            && self.min_length.is_none()
            && self.max_length.is_none()
    }

    pub fn pattern(mut self, pattern: impl Into<String>) -> Self {
        self.pattern = Some(pattern.into());
        self
    }

    pub fn range(mut self, min: f64, max: f64) -> Self {
        self.min_value = Some(min);
        self.max_value = Some(max);
        self
    }

    pub fn min_value(mut self, min: f64) -> Self {
        self.min_value = Some(min);
        self
    }

    pub fn max_value(mut self, max: f64) -> Self {
        self.max_value = Some(max);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_rules_from_json() {
        let rules: TypeRules =
            serde_json::from_str(r#"{"minValue": 0, "maxValue": 1000, "pattern": "^\\d+$"}"#)
                .unwrap();

        assert_eq!(rules.min_value, Some(0.0));
        assert_eq!(rules.max_value, Some(1000.0));
        assert!(!rules.is_empty());
        assert!(TypeRules::default().is_empty());
    }
}
