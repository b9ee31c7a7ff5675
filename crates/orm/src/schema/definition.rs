//! Model document format
//!
//! The JSON shape of an entity model:
//! `{name, inherits?, version, sealed?, abstract?, hidden?, source?, view?,
//! caching?, fields, constraints?, views?, privileges?, eventListeners?, seed?}`.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::str::FromStr;
use themis_validation::TypeRules;

use crate::config::ConfigError;
use crate::mapping::AssociationMapping;

fn default_version() -> String {
    "1.0".to_string()
}

/// Caching mode of a model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CachingMode {
    #[default]
    None,
    Always,
    Conditional,
}

impl FromStr for CachingMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "none" => Ok(CachingMode::None),
            "always" => Ok(CachingMode::Always),
            "conditional" => Ok(CachingMode::Conditional),
            _ => Err(ConfigError::InvalidValue {
                field: "caching".to_string(),
                value: s.to_string(),
                expected: "none, always or conditional".to_string(),
            }),
        }
    }
}

/// An entity model document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelDefinition {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inherits: Option<String>,
    #[serde(default = "default_version")]
    pub version: String,
    #[serde(default)]
    pub sealed: bool,
    #[serde(default, rename = "abstract")]
    pub is_abstract: bool,
    #[serde(default)]
    pub hidden: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub view: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub caching: Option<CachingMode>,
    #[serde(default)]
    pub fields: Vec<FieldDefinition>,
    #[serde(default)]
    pub constraints: Vec<ConstraintDefinition>,
    #[serde(default)]
    pub views: Vec<ViewDefinition>,
    #[serde(default)]
    pub privileges: Vec<PrivilegeDefinition>,
    #[serde(default)]
    pub event_listeners: Vec<ListenerDefinition>,
    #[serde(default)]
    pub seed: Vec<Map<String, Value>>,
}

impl ModelDefinition {
    /// Create an empty definition with the default version
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            title: None,
            inherits: None,
            version: default_version(),
            sealed: false,
            is_abstract: false,
            hidden: false,
            source: None,
            view: None,
            caching: None,
            fields: Vec::new(),
            constraints: Vec::new(),
            views: Vec::new(),
            privileges: Vec::new(),
            event_listeners: Vec::new(),
            seed: Vec::new(),
        }
    }

    pub fn inherits(mut self, base: impl Into<String>) -> Self {
        self.inherits = Some(base.into());
        self
    }

    pub fn version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    pub fn field(mut self, field: FieldDefinition) -> Self {
        self.fields.push(field);
        self
    }

    pub fn constraint(mut self, constraint: ConstraintDefinition) -> Self {
        self.constraints.push(constraint);
        self
    }

    /// Parse a definition from a JSON document
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

/// Extra validation declared on a field
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldValidation {
    /// Name of a data type whose rules apply
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub type_name: Option<String>,
    /// Identifier of a registered custom validator
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub validator: Option<String>,
    #[serde(flatten)]
    pub rules: TypeRules,
}

/// A declared field. Unset options inherit from the overridden base
/// attribute, if any.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldDefinition {
    pub name: String,
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub type_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub primary: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nullable: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub readonly: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub editable: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub many: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scale: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub calculation: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub validation: Option<FieldValidation>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mapping: Option<AssociationMapping>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub indexed: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub property: Option<String>,
}

impl FieldDefinition {
    pub fn new(name: impl Into<String>, type_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            type_name: Some(type_name.into()),
            ..Default::default()
        }
    }

    pub fn primary(mut self) -> Self {
        self.primary = Some(true);
        self.nullable = Some(false);
        self
    }

    pub fn not_null(mut self) -> Self {
        self.nullable = Some(false);
        self
    }

    pub fn readonly(mut self) -> Self {
        self.readonly = Some(true);
        self
    }

    pub fn many(mut self, many: bool) -> Self {
        self.many = Some(many);
        self
    }

    pub fn size(mut self, size: usize) -> Self {
        self.size = Some(size);
        self
    }

    pub fn value(mut self, value: Value) -> Self {
        self.value = Some(value);
        self
    }

    pub fn calculation(mut self, calculation: Value) -> Self {
        self.calculation = Some(calculation);
        self
    }

    pub fn validation(mut self, validation: FieldValidation) -> Self {
        self.validation = Some(validation);
        self
    }

    pub fn mapping(mut self, mapping: AssociationMapping) -> Self {
        self.mapping = Some(mapping);
        self
    }

    pub fn indexed(mut self) -> Self {
        self.indexed = Some(true);
        self
    }
}

/// A declared constraint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConstraintDefinition {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub fields: Vec<String>,
}

impl ConstraintDefinition {
    pub fn unique<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            kind: "unique".to_string(),
            description: None,
            fields: fields.into_iter().map(Into::into).collect(),
        }
    }

    pub fn is_unique(&self) -> bool {
        self.kind.eq_ignore_ascii_case("unique")
    }
}

/// A declared view over the model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewDefinition {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default)]
    pub fields: Vec<String>,
}

/// Privilege scope
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PrivilegeKind {
    #[default]
    Global,
    #[serde(rename = "self")]
    Own,
    Parent,
}

/// A declared privilege
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrivilegeDefinition {
    pub mask: u32,
    #[serde(default, rename = "type")]
    pub kind: PrivilegeKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub account: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter: Option<String>,
}

/// A user-declared event listener, resolved by `type` through the listener
/// registry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListenerDefinition {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(rename = "type")]
    pub type_name: String,
    #[serde(default)]
    pub disabled: bool,
}
