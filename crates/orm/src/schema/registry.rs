//! Model definition registry

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use super::attribute::Attribute;
use super::definition::{FieldDefinition, ModelDefinition};
use crate::events::EventPipeline;

fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}

/// A registered definition with its memoized resolutions
#[derive(Debug)]
pub struct ModelEntry {
    definition: RwLock<Arc<ModelDefinition>>,
    attributes: RwLock<Option<Arc<Vec<Arc<Attribute>>>>>,
    pipeline: RwLock<Option<Arc<EventPipeline>>>,
}

impl ModelEntry {
    fn new(definition: ModelDefinition) -> Self {
        Self {
            definition: RwLock::new(Arc::new(definition)),
            attributes: RwLock::new(None),
            pipeline: RwLock::new(None),
        }
    }

    pub fn definition(&self) -> Arc<ModelDefinition> {
        read(&self.definition).clone()
    }

    pub(crate) fn cached_attributes(&self) -> Option<Arc<Vec<Arc<Attribute>>>> {
        read(&self.attributes).clone()
    }

    pub(crate) fn store_attributes(&self, attributes: Arc<Vec<Arc<Attribute>>>) {
        *write(&self.attributes) = Some(attributes);
    }

    pub(crate) fn cached_pipeline(&self) -> Option<Arc<EventPipeline>> {
        read(&self.pipeline).clone()
    }

    pub(crate) fn store_pipeline(&self, pipeline: Arc<EventPipeline>) {
        *write(&self.pipeline) = Some(pipeline);
    }

    /// Drop memoized attributes and listeners
    pub fn clear(&self) {
        *write(&self.attributes) = None;
        *write(&self.pipeline) = None;
    }

    /// Append a field to the stored definition
    pub fn append_field(&self, field: FieldDefinition) {
        let mut definition = write(&self.definition);
        let mut updated = (**definition).clone();
        updated.fields.push(field);
        *definition = Arc::new(updated);
    }
}

/// Definitions keyed by model name. Lookup is case-sensitive first, then
/// falls back to a case-insensitive match.
#[derive(Debug, Default)]
pub struct SchemaRegistry {
    entries: RwLock<HashMap<String, Arc<ModelEntry>>>,
}

impl SchemaRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register or replace a definition. Memoized attributes of every model
    /// are dropped since inheritance may reach the replaced entry.
    pub fn set_model_definition(&self, definition: ModelDefinition) {
        let name = definition.name.clone();
        {
            let mut entries = write(&self.entries);
            entries.insert(name.clone(), Arc::new(ModelEntry::new(definition)));
        }
        self.clear_attributes();
        tracing::debug!("Registered model definition '{}'", name);
    }

    /// Register a definition only when no model of that name exists.
    /// Returns true when the definition was added.
    pub fn set_if_absent(&self, definition: ModelDefinition) -> bool {
        if self.entry(&definition.name).is_some() {
            return false;
        }
        self.set_model_definition(definition);
        true
    }

    pub fn get_model_definition(&self, name: &str) -> Option<Arc<ModelDefinition>> {
        self.entry(name).map(|entry| entry.definition())
    }

    pub fn entry(&self, name: &str) -> Option<Arc<ModelEntry>> {
        let entries = read(&self.entries);
        if let Some(entry) = entries.get(name) {
            return Some(entry.clone());
        }
        entries
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, entry)| entry.clone())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entry(name).is_some()
    }

    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = read(&self.entries).keys().cloned().collect();
        names.sort();
        names
    }

    /// Drop memoized resolutions of every model
    pub fn clear_attributes(&self) {
        let entries: Vec<Arc<ModelEntry>> = read(&self.entries).values().cloned().collect();
        for entry in entries {
            entry.clear();
        }
    }

    /// Append a field to a registered model and invalidate resolutions
    pub fn append_field(&self, model: &str, field: FieldDefinition) -> bool {
        match self.entry(model) {
            Some(entry) => {
                entry.append_field(field);
                self.clear_attributes();
                true
            }
            None => false,
        }
    }
}
