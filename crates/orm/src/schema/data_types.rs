//! Built-in data types
//!
//! A data type names a primitive field type and optionally carries the
//! pattern/range/length rules the structural validator enforces.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use themis_validation::TypeRules;

const INTEGER_PATTERN: &str = r"^[+-]?\d+$";
const NUMBER_PATTERN: &str = r"^[+-]?(\d+\.?\d*|\.\d+)([eE][+-]?\d+)?$";

/// A primitive data type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataType {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    /// Type names this type specializes, nearest first
    #[serde(default)]
    pub supertypes: Vec<String>,
    #[serde(default)]
    pub numeric: bool,
    #[serde(default)]
    pub rules: TypeRules,
}

impl DataType {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            label: None,
            supertypes: Vec::new(),
            numeric: false,
            rules: TypeRules::default(),
        }
    }

    fn numeric(mut self) -> Self {
        self.numeric = true;
        self
    }

    fn supertype(mut self, name: &str) -> Self {
        self.supertypes.push(name.to_string());
        self
    }

    fn rules(mut self, rules: TypeRules) -> Self {
        self.rules = rules;
        self
    }

    fn pattern(mut self, pattern: &str, message: &str) -> Self {
        self.rules.pattern = Some(pattern.to_string());
        self.rules.pattern_message = Some(message.to_string());
        self
    }

    /// True for the given type name or any of its supertypes
    pub fn is(&self, name: &str) -> bool {
        self.name == name || self.supertypes.iter().any(|s| s == name)
    }
}

/// Registry of primitive data types. Any field type not found here is
/// treated as a model reference.
#[derive(Debug, Clone)]
pub struct DataTypeRegistry {
    types: HashMap<String, DataType>,
}

impl Default for DataTypeRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl DataTypeRegistry {
    pub fn empty() -> Self {
        Self {
            types: HashMap::new(),
        }
    }

    /// Registry seeded with the built-in types
    pub fn with_defaults() -> Self {
        let integer = TypeRules::default().pattern(INTEGER_PATTERN);
        let number = TypeRules::default().pattern(NUMBER_PATTERN);

        let mut registry = Self::empty();
        for data_type in [
            DataType::new("Counter").numeric().supertype("Integer"),
            DataType::new("Integer")
                .numeric()
                .pattern(INTEGER_PATTERN, "The value should be an integer."),
            DataType::new("Short")
                .numeric()
                .supertype("Integer")
                .rules(integer.clone().range(-32768.0, 32767.0)),
            DataType::new("Number")
                .numeric()
                .pattern(NUMBER_PATTERN, "The value should be a number."),
            DataType::new("Float")
                .numeric()
                .supertype("Number")
                .rules(number.clone()),
            DataType::new("Decimal")
                .numeric()
                .supertype("Number")
                .rules(number.clone()),
            DataType::new("PositiveInteger")
                .numeric()
                .supertype("Integer")
                .rules(integer.clone().min_value(1.0)),
            DataType::new("NegativeInteger")
                .numeric()
                .supertype("Integer")
                .rules(integer.clone().max_value(-1.0)),
            DataType::new("NonNegativeInteger")
                .numeric()
                .supertype("Integer")
                .rules(integer.clone().min_value(0.0)),
            DataType::new("NonPositiveInteger")
                .numeric()
                .supertype("Integer")
                .rules(integer.max_value(0.0)),
            DataType::new("NonNegativeNumber")
                .numeric()
                .supertype("Number")
                .rules(number.clone().min_value(0.0)),
            DataType::new("NonPositiveNumber")
                .numeric()
                .supertype("Number")
                .rules(number.max_value(0.0)),
            DataType::new("Boolean"),
            DataType::new("Text"),
            DataType::new("Date"),
            DataType::new("DateTime"),
            DataType::new("Time"),
            DataType::new("Json"),
            DataType::new("Binary"),
            DataType::new("Guid").supertype("Text").pattern(
                r"^[0-9a-fA-F]{8}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{12}$",
                "The value should be a valid unique identifier.",
            ),
            DataType::new("Email").supertype("Text").pattern(
                r"^[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}$",
                "The value should be a valid email address.",
            ),
            DataType::new("URL").supertype("Text").pattern(
                r"^https?://[^\s/$.?#].[^\s]*$",
                "The value should be a valid URL.",
            ),
            DataType::new("AbsoluteURI").supertype("Text").pattern(
                r"^[a-zA-Z][a-zA-Z0-9+.-]*:[^\s]+$",
                "The value should be an absolute URI.",
            ),
            DataType::new("Language").supertype("Text").pattern(
                r"^[a-z]{2}(-[A-Z]{2})?$",
                "The value should be a valid language code.",
            ),
        ] {
            registry.register(data_type);
        }
        registry
    }

    /// Add or replace a type
    pub fn register(&mut self, data_type: DataType) {
        self.types.insert(data_type.name.clone(), data_type);
    }

    pub fn get(&self, name: &str) -> Option<&DataType> {
        self.types.get(name)
    }

    pub fn is_primitive(&self, name: &str) -> bool {
        self.types.contains_key(name)
    }

    pub fn is_numeric(&self, name: &str) -> bool {
        self.types.get(name).map(|t| t.numeric).unwrap_or(false)
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}
