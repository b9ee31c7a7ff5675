//! # themis-orm: Schema-Driven ORM Engine
//!
//! Declarative model documents (attributes, inheritance, associations,
//! constraints) become live persistence, validation, event and automatic
//! migration behavior against any `StorageAdapter`.
//!
//! The crate is organized around the configuration registry: models are
//! resolved from it on demand, every write runs through the model's event
//! pipeline, and storage objects are migrated before first use.

pub mod adapter;
pub mod cache;
pub mod config;
pub mod context;
pub mod error;
pub mod events;
pub mod functions;
pub mod mapping;
pub mod migration;
pub mod object;
pub mod permission;
pub mod persistence;
pub mod schema;
pub mod validation;

use std::future::Future;
use std::pin::Pin;

/// Boxed future used by recursive persistence and migration routines
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

// Re-export core types
pub use adapter::{
    finish_transaction, AdapterTransaction, Filter, Join, MemoryAdapter, QueryExpression,
    QueryResult, Row, StorageAdapter,
};
pub use cache::DataCache;
pub use config::{ConfigError, DataConfiguration, DataConfigurationBuilder, OrmSettings};
pub use context::{DataContext, UserIdentity};
pub use error::*;
pub use events::{DataEvent, EventListener, EventPhase, EventPipeline, ExecuteEvent, UpgradeEvent};
pub use functions::{value_function, FunctionRegistry, ValueFunction};
pub use mapping::{AssociationKind, AssociationMapping, CascadeMode};
pub use migration::{MigrationPlanner, MigrationRecord};
pub use object::{DataObject, ObjectState};
pub use permission::{PermissionStrategy, PrivilegeStrategy};
pub use persistence::{ExecuteOptions, Persister};
pub use schema::{
    Attribute, CachingMode, DataModel, DataType, DataTypeRegistry, FieldDefinition,
    ModelDefinition, SchemaRegistry, StorageKind,
};
pub use validation::{NoTranslation, Translator, ValidationEngine, ValidatorFactory};
