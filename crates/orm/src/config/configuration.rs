//! Data configuration
//!
//! Owns everything a context needs to resolve models: settings, the schema
//! registry, data types, and the pluggable registries for validators,
//! listeners, value functions and permissions. Built once and shared
//! behind an `Arc`.

use dashmap::DashMap;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

use super::settings::OrmSettings;
use crate::cache::DataCache;
use crate::error::{ModelError, ModelResult};
use crate::events::EventListener;
use crate::functions::{FunctionRegistry, ValueFunction};
use crate::mapping::MappingCache;
use crate::permission::{PermissionStrategy, PrivilegeStrategy};
use crate::schema::{
    ConstraintDefinition, DataModel, DataType, DataTypeRegistry, FieldDefinition,
    ModelDefinition, SchemaRegistry,
};
use crate::validation::{NoTranslation, Translator, ValidatorFactory};

/// Name of the built-in model describing the migration history
pub const MIGRATION_MODEL: &str = "Migration";

/// Shared engine configuration
pub struct DataConfiguration {
    settings: OrmSettings,
    schema: SchemaRegistry,
    data_types: DataTypeRegistry,
    validators: HashMap<String, Arc<dyn ValidatorFactory>>,
    listeners: HashMap<String, Arc<dyn EventListener>>,
    functions: FunctionRegistry,
    permissions: Arc<dyn PermissionStrategy>,
    translator: Arc<dyn Translator>,
    mappings: MappingCache,
    versions: DashMap<String, String>,
    cache: DataCache,
}

impl std::fmt::Debug for DataConfiguration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DataConfiguration")
            .field("settings", &self.settings)
            .field("models", &self.schema.names())
            .field("validators", &self.validators.keys().collect::<Vec<_>>())
            .field("listeners", &self.listeners.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl DataConfiguration {
    pub fn builder() -> DataConfigurationBuilder {
        DataConfigurationBuilder::new()
    }

    pub fn settings(&self) -> &OrmSettings {
        &self.settings
    }

    pub fn schema(&self) -> &SchemaRegistry {
        &self.schema
    }

    pub fn data_types(&self) -> &DataTypeRegistry {
        &self.data_types
    }

    pub fn functions(&self) -> &FunctionRegistry {
        &self.functions
    }

    pub fn permissions(&self) -> &dyn PermissionStrategy {
        self.permissions.as_ref()
    }

    pub fn translator(&self) -> &dyn Translator {
        self.translator.as_ref()
    }

    pub fn mappings(&self) -> &MappingCache {
        &self.mappings
    }

    pub fn cache(&self) -> &DataCache {
        &self.cache
    }

    pub fn validator(&self, name: &str) -> Option<Arc<dyn ValidatorFactory>> {
        self.validators.get(name).cloned()
    }

    pub fn listener(&self, name: &str) -> Option<Arc<dyn EventListener>> {
        self.listeners.get(name).cloned()
    }

    /// Resolve a registered model
    pub fn model(self: &Arc<Self>, name: &str) -> Option<DataModel> {
        self.schema
            .entry(name)
            .map(|entry| DataModel::new(self.clone(), entry))
    }

    /// Register or replace a model definition
    pub fn set_model_definition(&self, definition: ModelDefinition) {
        self.mappings.clear();
        self.schema.set_model_definition(definition);
    }

    /// Last migrated version recorded for a model. Models sharing a storage
    /// object are tracked separately and settle through the history table.
    pub fn applied_version(&self, model: &str) -> Option<String> {
        self.versions.get(model).map(|v| v.value().clone())
    }

    pub(crate) fn set_applied_version(&self, model: &str, version: &str) {
        self.versions.insert(model.to_string(), version.to_string());
    }

    /// Forget every applied version so the next operation re-checks history
    pub fn reset_applied_versions(&self) {
        self.versions.clear();
    }
}

/// Builder for [`DataConfiguration`]
pub struct DataConfigurationBuilder {
    settings: OrmSettings,
    definitions: Vec<ModelDefinition>,
    data_types: DataTypeRegistry,
    validators: HashMap<String, Arc<dyn ValidatorFactory>>,
    listeners: HashMap<String, Arc<dyn EventListener>>,
    functions: FunctionRegistry,
    permissions: Arc<dyn PermissionStrategy>,
    translator: Arc<dyn Translator>,
}

impl Default for DataConfigurationBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl DataConfigurationBuilder {
    pub fn new() -> Self {
        Self {
            settings: OrmSettings::default(),
            definitions: Vec::new(),
            data_types: DataTypeRegistry::with_defaults(),
            validators: HashMap::new(),
            listeners: HashMap::new(),
            functions: FunctionRegistry::with_defaults(),
            permissions: Arc::new(PrivilegeStrategy),
            translator: Arc::new(NoTranslation),
        }
    }

    pub fn settings(mut self, settings: OrmSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn model(mut self, definition: ModelDefinition) -> Self {
        self.definitions.push(definition);
        self
    }

    /// Add model documents from JSON, either a single object or an array
    pub fn models_from_json(mut self, json: &str) -> ModelResult<Self> {
        let value: Value = serde_json::from_str(json)?;
        match value {
            Value::Array(items) => {
                for item in items {
                    self.definitions.push(serde_json::from_value(item)?);
                }
            }
            other => self.definitions.push(serde_json::from_value(other)?),
        }
        Ok(self)
    }

    pub fn data_type(mut self, data_type: DataType) -> Self {
        self.data_types.register(data_type);
        self
    }

    pub fn validator(mut self, name: impl Into<String>, factory: impl ValidatorFactory + 'static) -> Self {
        self.validators.insert(name.into(), Arc::new(factory));
        self
    }

    pub fn listener(mut self, name: impl Into<String>, listener: Arc<dyn EventListener>) -> Self {
        self.listeners.insert(name.into(), listener);
        self
    }

    pub fn function(mut self, name: impl Into<String>, function: ValueFunction) -> Self {
        self.functions.register(name, function);
        self
    }

    pub fn permission_strategy(mut self, strategy: Arc<dyn PermissionStrategy>) -> Self {
        self.permissions = strategy;
        self
    }

    pub fn translator(mut self, translator: Arc<dyn Translator>) -> Self {
        self.translator = translator;
        self
    }

    pub fn build(self) -> ModelResult<Arc<DataConfiguration>> {
        self.settings.validate()?;

        let schema = SchemaRegistry::new();
        schema.set_model_definition(migration_model(&self.settings));
        for definition in self.definitions {
            if definition.name.trim().is_empty() {
                return Err(ModelError::Schema(
                    "Model definition without a name".to_string(),
                ));
            }
            schema.set_model_definition(definition);
        }

        Ok(Arc::new(DataConfiguration {
            settings: self.settings,
            schema,
            data_types: self.data_types,
            validators: self.validators,
            listeners: self.listeners,
            functions: self.functions,
            permissions: self.permissions,
            translator: self.translator,
            mappings: MappingCache::new(),
            versions: DashMap::new(),
            cache: DataCache::new(),
        }))
    }
}

fn migration_model(settings: &OrmSettings) -> ModelDefinition {
    let mut definition = ModelDefinition::new(MIGRATION_MODEL)
        .field(FieldDefinition::new("id", "Counter").primary())
        .field(FieldDefinition::new("appliesTo", "Text").not_null().size(180))
        .field(FieldDefinition::new("model", "Text").size(120))
        .field(FieldDefinition::new("description", "Text").size(512))
        .field(FieldDefinition::new("version", "Text").not_null().size(40))
        .constraint(ConstraintDefinition::unique(["appliesTo", "version"]));
    definition.source = Some(settings.migrations_table.clone());
    definition.view = Some(settings.migrations_table.clone());
    definition.sealed = true;
    definition.hidden = true;
    definition
}
