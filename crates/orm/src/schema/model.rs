//! Resolved model handle

use serde_json::{Map, Number, Value};
use std::sync::Arc;
use tracing::warn;

use super::attribute::Attribute;
use super::data_types::DataTypeRegistry;
use super::definition::{CachingMode, FieldDefinition, ModelDefinition};
use super::registry::ModelEntry;
use crate::adapter::Row;
use crate::config::DataConfiguration;
use crate::error::{ModelError, ModelResult};
use crate::events::EventPipeline;
use crate::mapping::{self, AssociationMapping};
use crate::object::ObjectState;

/// How an attribute is stored
#[derive(Debug, Clone, PartialEq)]
pub enum StorageKind {
    /// Plain column on the owning storage object
    Column,
    /// Column holding the key of an associated parent
    ForeignKey(AssociationMapping),
    /// Values kept elsewhere: a junction or the children of a one-to-many
    Collection(AssociationMapping),
    /// Not stored
    Virtual,
}

/// A registered model bound to its configuration
#[derive(Clone)]
pub struct DataModel {
    config: Arc<DataConfiguration>,
    entry: Arc<ModelEntry>,
    name: String,
}

impl std::fmt::Debug for DataModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DataModel").field("name", &self.name).finish()
    }
}

impl DataModel {
    pub(crate) fn new(config: Arc<DataConfiguration>, entry: Arc<ModelEntry>) -> Self {
        let name = entry.definition().name.clone();
        Self {
            config,
            entry,
            name,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn config(&self) -> &Arc<DataConfiguration> {
        &self.config
    }

    pub fn definition(&self) -> Arc<ModelDefinition> {
        self.entry.definition()
    }

    pub fn version(&self) -> String {
        self.definition().version.clone()
    }

    pub fn is_sealed(&self) -> bool {
        self.definition().sealed
    }

    pub fn is_abstract(&self) -> bool {
        self.definition().is_abstract
    }

    pub fn is_hidden(&self) -> bool {
        self.definition().hidden
    }

    /// Storage object, `<name><source suffix>` unless declared
    pub fn source_adapter(&self) -> String {
        let definition = self.definition();
        definition
            .source
            .clone()
            .unwrap_or_else(|| format!("{}{}", self.name, self.config.settings().source_suffix))
    }

    /// Read view, `<name><view suffix>` unless declared
    pub fn view_adapter(&self) -> String {
        let definition = self.definition();
        definition
            .view
            .clone()
            .unwrap_or_else(|| format!("{}{}", self.name, self.config.settings().view_suffix))
    }

    pub fn caching(&self) -> CachingMode {
        self.definition()
            .caching
            .unwrap_or(self.config.settings().default_caching)
    }

    /// The directly inherited model
    pub fn base(&self) -> ModelResult<Option<DataModel>> {
        match &self.definition().inherits {
            None => Ok(None),
            Some(base) => self.config.model(base).map(Some).ok_or_else(|| {
                ModelError::Schema(format!(
                    "Base model '{}' of '{}' is not registered",
                    base, self.name
                ))
            }),
        }
    }

    /// Ancestor names, nearest first
    pub fn super_types(&self) -> ModelResult<Vec<String>> {
        let mut names = Vec::new();
        let mut current = self.base()?;
        while let Some(model) = current {
            if model.name == self.name || names.contains(&model.name) {
                return Err(ModelError::Schema(format!(
                    "Circular inheritance detected for model '{}'",
                    self.name
                )));
            }
            names.push(model.name.clone());
            current = model.base()?;
        }
        Ok(names)
    }

    /// Resolved attributes: own fields in declaration order, then inherited
    /// ones not overridden locally. Memoized until the registry changes.
    pub fn attributes(&self) -> Arc<Vec<Arc<Attribute>>> {
        if let Some(attributes) = self.entry.cached_attributes() {
            return attributes;
        }
        let attributes = Arc::new(self.resolve_attributes());
        self.entry.store_attributes(attributes.clone());
        attributes
    }

    fn resolve_attributes(&self) -> Vec<Arc<Attribute>> {
        let definition = self.definition();
        let types = self.config.data_types();

        let inherited = match self.super_types().and_then(|_| self.base()) {
            Ok(Some(base)) => base.attributes(),
            Ok(None) => Arc::new(Vec::new()),
            Err(e) => {
                warn!("Ignoring inheritance of '{}': {}", self.name, e);
                Arc::new(Vec::new())
            }
        };

        let mut attributes = Vec::with_capacity(definition.fields.len() + inherited.len());
        for field in &definition.fields {
            let attribute = match inherited.iter().find(|a| a.name == field.name) {
                Some(base) => Attribute::merge(base, field, &self.name),
                None => Attribute::from_field(field, &self.name, types),
            };
            attributes.push(Arc::new(attribute));
        }

        let has_own_key = attributes.iter().any(|a| a.primary);
        for base in inherited.iter() {
            if definition.fields.iter().any(|f| f.name == base.name) {
                continue;
            }
            if base.primary {
                if !has_own_key {
                    attributes.push(Arc::new(Attribute::inherited_key(base, &self.name)));
                }
            } else {
                attributes.push(Arc::clone(base));
            }
        }
        attributes
    }

    /// Drop memoized attributes of this model
    pub fn clear_attributes(&self) {
        self.entry.clear();
    }

    pub fn attribute(&self, name: &str) -> Option<Arc<Attribute>> {
        self.attributes().iter().find(|a| a.name == name).cloned()
    }

    /// Attributes whose column lives in this model's storage object
    pub fn own_attributes(&self) -> Vec<Arc<Attribute>> {
        self.attributes()
            .iter()
            .filter(|a| a.model == self.name)
            .cloned()
            .collect()
    }

    /// The primary key attribute, if any
    pub fn key(&self) -> Option<Arc<Attribute>> {
        self.attributes().iter().find(|a| a.primary).cloned()
    }

    pub fn primary_key(&self) -> ModelResult<Arc<Attribute>> {
        self.key()
            .ok_or_else(|| ModelError::MissingPrimaryKey(self.name.clone()))
    }

    /// Append a field to the definition and invalidate resolutions
    pub fn append_field(&self, field: FieldDefinition) {
        self.config.mappings().clear();
        self.config.schema().append_field(&self.name, field);
    }

    /// Association metadata of an attribute, inferred when not declared
    pub fn infer_mapping(&self, name: &str) -> ModelResult<Option<AssociationMapping>> {
        mapping::infer_mapping(self, name)
    }

    /// How the attribute is persisted for this model
    pub fn storage_kind(&self, attribute: &Attribute) -> ModelResult<StorageKind> {
        match self.infer_mapping(&attribute.name)? {
            None if attribute.many => Ok(StorageKind::Virtual),
            None => Ok(StorageKind::Column),
            Some(mapping) if mapping.is_junction() => Ok(StorageKind::Collection(mapping)),
            Some(mapping) => {
                let holds_key = mapping.child_field() == attribute.name
                    && (mapping.child_model() == self.name
                        || mapping.child_model() == attribute.model);
                if holds_key {
                    Ok(StorageKind::ForeignKey(mapping))
                } else {
                    Ok(StorageKind::Collection(mapping))
                }
            }
        }
    }

    /// Listener pipeline of this model, built on first use
    pub fn pipeline(&self) -> ModelResult<Arc<EventPipeline>> {
        if let Some(pipeline) = self.entry.cached_pipeline() {
            return Ok(pipeline);
        }
        let pipeline = Arc::new(EventPipeline::for_model(self)?);
        self.entry.store_pipeline(pipeline.clone());
        Ok(pipeline)
    }

    /// Storage row for this model's own columns. Associated objects are
    /// reduced to their key. Non-editable attributes are left out of
    /// updates.
    pub fn cast(&self, payload: &Row, state: ObjectState) -> ModelResult<Row> {
        let mut row = Map::new();
        for attribute in self.own_attributes() {
            let Some(value) = payload.get(&attribute.name) else {
                continue;
            };
            if state == ObjectState::Update && !attribute.editable && !attribute.primary {
                continue;
            }
            match self.storage_kind(&attribute)? {
                StorageKind::Column => {
                    row.insert(attribute.name.clone(), value.clone());
                }
                StorageKind::ForeignKey(mapping) => {
                    row.insert(
                        attribute.name.clone(),
                        key_of(value, mapping.parent_field()),
                    );
                }
                StorageKind::Collection(_) | StorageKind::Virtual => {}
            }
        }
        Ok(row)
    }

    /// Typed object from a storage row. Columns that are not attributes are
    /// dropped.
    pub fn convert(&self, row: &Row) -> Row {
        let types = self.config.data_types();
        let mut object = Map::new();
        for attribute in self.attributes().iter() {
            if let Some(value) = row.get(&attribute.name) {
                object.insert(
                    attribute.name.clone(),
                    convert_value(types, &attribute.type_name, value),
                );
            }
        }
        object
    }
}

/// Key of an associated object, or the value itself when already scalar
pub(crate) fn key_of(value: &Value, key: &str) -> Value {
    match value {
        Value::Object(object) => object.get(key).cloned().unwrap_or(Value::Null),
        other => other.clone(),
    }
}

fn convert_value(types: &DataTypeRegistry, type_name: &str, value: &Value) -> Value {
    if type_name == "Boolean" {
        return match value {
            Value::Number(n) => Value::Bool(n.as_f64().map(|f| f != 0.0).unwrap_or(false)),
            Value::String(s) => match s.as_str() {
                "true" | "1" => Value::Bool(true),
                "false" | "0" => Value::Bool(false),
                _ => value.clone(),
            },
            other => other.clone(),
        };
    }
    if types.is_numeric(type_name) {
        if let Value::String(s) = value {
            if let Ok(i) = s.trim().parse::<i64>() {
                return Value::Number(i.into());
            }
            if let Some(n) = s.trim().parse::<f64>().ok().and_then(Number::from_f64) {
                return Value::Number(n);
            }
        }
    }
    value.clone()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::ModelDefinition;
    use serde_json::json;

    fn config() -> Arc<DataConfiguration> {
        DataConfiguration::builder()
            .model(
                ModelDefinition::new("Thing")
                    .field(FieldDefinition::new("id", "Counter").primary())
                    .field(FieldDefinition::new("name", "Text").size(100))
                    .field(FieldDefinition::new("dateCreated", "DateTime")),
            )
            .model(
                ModelDefinition::new("Product")
                    .inherits("Thing")
                    .field(FieldDefinition::new("price", "Number"))
                    .field(FieldDefinition::new("active", "Boolean"))
                    .field(FieldDefinition {
                        name: "name".to_string(),
                        nullable: Some(false),
                        ..Default::default()
                    }),
            )
            .build()
            .unwrap()
    }

    #[test]
    fn test_inherited_attributes() {
        let config = config();
        let thing = config.model("Thing").unwrap();
        let product = config.model("Product").unwrap();

        let names: Vec<String> = product.attributes().iter().map(|a| a.name.clone()).collect();
        assert_eq!(names, vec!["price", "active", "name", "id", "dateCreated"]);

        let key = product.key().unwrap();
        assert_eq!(key.model, "Product");
        assert_eq!(key.type_name, "Integer");

        let own = thing.attribute("dateCreated").unwrap();
        let inherited = product.attribute("dateCreated").unwrap();
        assert!(Arc::ptr_eq(&own, &inherited));

        let name = product.attribute("name").unwrap();
        assert!(name.cloned);
        assert!(!name.nullable);
        assert_eq!(name.model, "Thing");
    }

    #[test]
    fn test_attributes_memoized_until_cleared() {
        let config = config();
        let product = config.model("Product").unwrap();
        let first = product.attributes();
        assert!(Arc::ptr_eq(&first, &product.attributes()));

        product.append_field(FieldDefinition::new("sku", "Text"));
        let product = config.model("Product").unwrap();
        assert!(product.attribute("sku").is_some());
    }

    #[test]
    fn test_adapters_and_super_types() {
        let config = config();
        let product = config.model("Product").unwrap();
        assert_eq!(product.source_adapter(), "ProductBase");
        assert_eq!(product.view_adapter(), "ProductData");
        assert_eq!(product.super_types().unwrap(), vec!["Thing".to_string()]);
    }

    #[test]
    fn test_circular_inheritance() {
        let config = DataConfiguration::builder()
            .model(ModelDefinition::new("A").inherits("B"))
            .model(ModelDefinition::new("B").inherits("A"))
            .build()
            .unwrap();
        let a = config.model("A").unwrap();
        assert!(matches!(a.super_types(), Err(ModelError::Schema(_))));
        assert!(a.attributes().is_empty());
    }

    #[test]
    fn test_missing_primary_key() {
        let config = DataConfiguration::builder()
            .model(ModelDefinition::new("Note").field(FieldDefinition::new("body", "Text")))
            .build()
            .unwrap();
        let note = config.model("Note").unwrap();
        assert!(matches!(note.primary_key(), Err(ModelError::MissingPrimaryKey(_))));
    }

    #[test]
    fn test_cast_own_columns() {
        let config = config();
        let product = config.model("Product").unwrap();
        let payload = json!({ "id": 3, "name": "Lamp", "price": 10, "unknown": true });
        let row = product
            .cast(payload.as_object().unwrap(), ObjectState::Insert)
            .unwrap();

        assert_eq!(row.get("id"), Some(&json!(3)));
        assert_eq!(row.get("price"), Some(&json!(10)));
        assert!(row.get("name").is_none());
        assert!(row.get("unknown").is_none());
    }

    #[test]
    fn test_convert_row() {
        let config = config();
        let product = config.model("Product").unwrap();
        let row = json!({ "id": "3", "price": "10.5", "active": 1, "extra": "x" });
        let object = product.convert(row.as_object().unwrap());

        assert_eq!(object.get("id"), Some(&json!(3)));
        assert_eq!(object.get("price"), Some(&json!(10.5)));
        assert_eq!(object.get("active"), Some(&json!(true)));
        assert!(object.get("extra").is_none());
    }

    #[test]
    fn test_cast_of_converted_row_round_trips() {
        let config = config();
        let product = config.model("Product").unwrap();
        let row = json!({ "id": 7, "price": 12.5, "active": true });
        let object = product.convert(row.as_object().unwrap());
        let cast = product.cast(&object, ObjectState::Update).unwrap();
        assert_eq!(&cast, row.as_object().unwrap());
    }
}
