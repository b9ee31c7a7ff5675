//! Event Pipeline
//!
//! Persistence, reads and migrations emit phase events. Listeners run in
//! registration order and the first error stops the phase, which aborts the
//! surrounding operation and its transaction.

pub mod listeners;
pub mod pipeline;

pub use pipeline::*;

use async_trait::async_trait;
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

use crate::adapter::{AdapterTransaction, QueryExpression, Row};
use crate::context::DataContext;
use crate::error::{ModelError, ModelResult};
use crate::migration::MigrationRecord;
use crate::object::{DataObject, ObjectState};
use crate::schema::DataModel;

/// Event phases
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventPhase {
    BeforeSave,
    AfterSave,
    BeforeRemove,
    AfterRemove,
    BeforeExecute,
    AfterExecute,
    BeforeUpgrade,
    AfterUpgrade,
}

impl EventPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventPhase::BeforeSave => "before.save",
            EventPhase::AfterSave => "after.save",
            EventPhase::BeforeRemove => "before.remove",
            EventPhase::AfterRemove => "after.remove",
            EventPhase::BeforeExecute => "before.execute",
            EventPhase::AfterExecute => "after.execute",
            EventPhase::BeforeUpgrade => "before.upgrade",
            EventPhase::AfterUpgrade => "after.upgrade",
        }
    }
}

impl fmt::Display for EventPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventPhase {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "before.save" => Ok(EventPhase::BeforeSave),
            "after.save" => Ok(EventPhase::AfterSave),
            "before.remove" => Ok(EventPhase::BeforeRemove),
            "after.remove" => Ok(EventPhase::AfterRemove),
            "before.execute" => Ok(EventPhase::BeforeExecute),
            "after.execute" => Ok(EventPhase::AfterExecute),
            "before.upgrade" => Ok(EventPhase::BeforeUpgrade),
            "after.upgrade" => Ok(EventPhase::AfterUpgrade),
            other => Err(ModelError::Event(format!("Unknown event phase '{}'", other))),
        }
    }
}

/// Origin of a registered listener
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ListenerKind {
    StateValidator,
    DefaultValue,
    CalculatedValue,
    Caching,
    UserDefined,
    Validation,
    Constraint,
    Association,
    Permission,
    View,
    Seed,
}

/// Save and remove event
pub struct DataEvent<'a> {
    pub model: &'a DataModel,
    pub context: &'a DataContext,
    pub target: &'a mut DataObject,
    /// Working state, listeners on `before.save` may change it
    pub state: ObjectState,
    /// Stored row when a listener looked it up
    pub previous: Option<Row>,
    pub tx: &'a mut dyn AdapterTransaction,
}

/// Read event
pub struct ExecuteEvent<'a> {
    pub model: &'a DataModel,
    pub context: &'a DataContext,
    pub query: QueryExpression,
    /// Key of the requested object, when reading by key
    pub key: Option<Value>,
    /// Caller asked for cached results
    pub cache: bool,
    /// Set by a `before.execute` listener to skip execution
    pub result: Option<Vec<Row>>,
    pub tx: &'a mut dyn AdapterTransaction,
}

/// Migration event
pub struct UpgradeEvent<'a> {
    pub model: &'a DataModel,
    pub context: &'a DataContext,
    pub migration: &'a MigrationRecord,
    pub tx: &'a mut dyn AdapterTransaction,
}

/// A model event listener. Every handler defaults to a no-op; `phases`
/// lists the handlers the pipeline wires.
#[async_trait]
pub trait EventListener: Send + Sync {
    fn phases(&self) -> &'static [EventPhase];

    async fn before_save(&self, _event: &mut DataEvent<'_>) -> ModelResult<()> {
        Ok(())
    }

    async fn after_save(&self, _event: &mut DataEvent<'_>) -> ModelResult<()> {
        Ok(())
    }

    async fn before_remove(&self, _event: &mut DataEvent<'_>) -> ModelResult<()> {
        Ok(())
    }

    async fn after_remove(&self, _event: &mut DataEvent<'_>) -> ModelResult<()> {
        Ok(())
    }

    async fn before_execute(&self, _event: &mut ExecuteEvent<'_>) -> ModelResult<()> {
        Ok(())
    }

    async fn after_execute(&self, _event: &mut ExecuteEvent<'_>) -> ModelResult<()> {
        Ok(())
    }

    async fn before_upgrade(&self, _event: &mut UpgradeEvent<'_>) -> ModelResult<()> {
        Ok(())
    }

    async fn after_upgrade(&self, _event: &mut UpgradeEvent<'_>) -> ModelResult<()> {
        Ok(())
    }
}
