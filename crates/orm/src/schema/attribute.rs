//! Resolved attributes

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use serde_json::Value;

use super::data_types::DataTypeRegistry;
use super::definition::{FieldDefinition, FieldValidation};
use crate::mapping::AssociationMapping;

static PLURAL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"([a-zA-Z]+?)([e']s|[^aiou]s)$").expect("plural pattern"));

/// True when a field name reads as an English plural (`orders`, `groups`)
pub fn is_plural(name: &str) -> bool {
    PLURAL.is_match(name)
}

/// A field after inheritance resolution, bound to the model that owns its
/// storage column
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Attribute {
    pub name: String,
    #[serde(rename = "type")]
    pub type_name: String,
    pub title: Option<String>,
    /// The model owning the storage column
    pub model: String,
    pub primary: bool,
    pub nullable: bool,
    pub readonly: bool,
    pub editable: bool,
    pub many: bool,
    pub size: Option<usize>,
    pub scale: Option<u32>,
    pub value: Option<Value>,
    pub calculation: Option<Value>,
    pub validation: Option<FieldValidation>,
    pub mapping: Option<AssociationMapping>,
    pub indexed: bool,
    pub property: Option<String>,
    /// Set on attributes copied from a base model and then altered
    pub cloned: bool,
}

impl Attribute {
    /// Resolve a declared field that overrides nothing
    pub fn from_field(field: &FieldDefinition, model: &str, types: &DataTypeRegistry) -> Self {
        let type_name = field.type_name.clone().unwrap_or_else(|| "Text".to_string());
        let primary = field.primary.unwrap_or(false);
        let many = field
            .many
            .unwrap_or_else(|| infer_many(&field.name, &type_name, field.mapping.as_ref(), types));

        Self {
            name: field.name.clone(),
            type_name,
            title: field.title.clone(),
            model: model.to_string(),
            primary,
            nullable: field.nullable.unwrap_or(!primary),
            readonly: field.readonly.unwrap_or(false),
            editable: field.editable.unwrap_or(true),
            many,
            size: field.size,
            scale: field.scale,
            value: field.value.clone(),
            calculation: field.calculation.clone(),
            validation: field.validation.clone(),
            mapping: field.mapping.clone(),
            indexed: field.indexed.unwrap_or(false),
            property: field.property.clone(),
            cloned: false,
        }
    }

    /// Shallow merge of an inherited attribute with a local override. The
    /// column stays with the declaring ancestor unless the override is the
    /// primary key.
    pub fn merge(base: &Attribute, field: &FieldDefinition, model: &str) -> Self {
        let mut merged = base.clone();
        if let Some(type_name) = &field.type_name {
            merged.type_name = type_name.clone();
        }
        if field.title.is_some() {
            merged.title = field.title.clone();
        }
        if let Some(primary) = field.primary {
            merged.primary = primary;
        }
        if let Some(nullable) = field.nullable {
            merged.nullable = nullable;
        }
        if let Some(readonly) = field.readonly {
            merged.readonly = readonly;
        }
        if let Some(editable) = field.editable {
            merged.editable = editable;
        }
        if let Some(many) = field.many {
            merged.many = many;
        }
        if field.size.is_some() {
            merged.size = field.size;
        }
        if field.scale.is_some() {
            merged.scale = field.scale;
        }
        if field.value.is_some() {
            merged.value = field.value.clone();
        }
        if field.calculation.is_some() {
            merged.calculation = field.calculation.clone();
        }
        if field.validation.is_some() {
            merged.validation = field.validation.clone();
        }
        if field.mapping.is_some() {
            merged.mapping = field.mapping.clone();
        }
        if let Some(indexed) = field.indexed {
            merged.indexed = indexed;
        }
        if field.property.is_some() {
            merged.property = field.property.clone();
        }
        if merged.primary {
            merged.model = model.to_string();
        }
        merged.cloned = true;
        merged
    }

    /// Copy of an inherited primary key owned by the derived model. Counter
    /// keys become Integer since the derived row reuses the base identity.
    pub fn inherited_key(base: &Attribute, model: &str) -> Self {
        let mut key = base.clone();
        key.model = model.to_string();
        if key.type_name == "Counter" {
            key.type_name = "Integer".to_string();
        }
        key.cloned = true;
        key
    }

    /// Name under which the value is exposed on objects
    pub fn property_name(&self) -> &str {
        self.property.as_deref().unwrap_or(&self.name)
    }
}

fn infer_many(
    name: &str,
    type_name: &str,
    mapping: Option<&AssociationMapping>,
    types: &DataTypeRegistry,
) -> bool {
    if mapping.map(|m| m.is_junction()).unwrap_or(false) {
        return true;
    }
    !types.is_primitive(type_name) && is_plural(name)
}
