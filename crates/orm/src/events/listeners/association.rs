//! Association persistence

use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use tracing::debug;

use crate::adapter::{Filter, QueryExpression, Row};
use crate::error::{ModelError, ModelResult};
use crate::events::{DataEvent, EventListener, EventPhase};
use crate::mapping::{AssociationMapping, CascadeMode};
use crate::migration::MigrationPlanner;
use crate::object::{DataObject, ObjectState};
use crate::persistence::Persister;
use crate::schema::model::key_of;
use crate::schema::{Attribute, DataModel, StorageKind};

/// Attributes of the model stored outside its own row
fn collections(model: &DataModel) -> ModelResult<Vec<(Arc<Attribute>, AssociationMapping)>> {
    let mut found = Vec::new();
    for attribute in model.own_attributes() {
        if let StorageKind::Collection(mapping) = model.storage_kind(&attribute)? {
            found.push((attribute, mapping));
        }
    }
    Ok(found)
}

fn is_parent(model: &DataModel, mapping: &AssociationMapping) -> ModelResult<bool> {
    Ok(mapping.parent_model() == model.name()
        || model.super_types()?.iter().any(|s| s == mapping.parent_model()))
}

fn is_removal(item: &Value) -> bool {
    item.get("$state").and_then(Value::as_u64) == Some(ObjectState::Delete.code() as u64)
}

/// Saves associated collections after the owner is stored and applies
/// cascade rules before it is removed. Objects without a key are saved
/// first; items flagged with `$state: 4` are detached.
pub struct AssociationListener;

impl AssociationListener {
    async fn attach_junction(
        &self,
        event: &mut DataEvent<'_>,
        mapping: &AssociationMapping,
        owner: Value,
        items: Vec<Value>,
    ) -> ModelResult<()> {
        let context = event.context;
        let adapter = mapping.association_adapter.clone().unwrap_or_default();
        let junction = context.model(&adapter)?;
        let planner = MigrationPlanner::new(context);
        let persister = Persister::new(context);
        planner.migrate_within(&junction, &mut *event.tx).await?;

        let parent_side = is_parent(event.model, mapping)?;
        let (owner_field, other_field) = if parent_side {
            (mapping.object_field(), mapping.value_field())
        } else {
            (mapping.value_field(), mapping.object_field())
        };
        let other_model = if parent_side {
            mapping.child_model()
        } else {
            mapping.parent_model()
        };
        let other_key = if parent_side {
            mapping.child_field()
        } else {
            mapping.parent_field()
        };

        for item in items {
            let value = if mapping.is_tag() {
                key_of(&item, mapping.value_field())
            } else {
                let value = key_of(&item, other_key);
                if value.is_null() && item.is_object() {
                    let other = context.model(other_model)?;
                    planner.migrate_within(&other, &mut *event.tx).await?;
                    let saved = persister
                        .save_within(&other, DataObject::from_value(other_model, item.clone())?, &mut *event.tx)
                        .await?;
                    saved.get(other_key).cloned().unwrap_or(Value::Null)
                } else {
                    value
                }
            };
            if value.is_null() {
                return Err(ModelError::Mapping(format!(
                    "Item of '{}' has no value to associate",
                    adapter
                )));
            }

            let filter = Filter::new()
                .eq(owner_field, owner.clone())
                .eq(other_field, value.clone());
            if is_removal(&item) {
                event
                    .tx
                    .execute(&QueryExpression::delete(junction.source_adapter(), filter))
                    .await?;
                continue;
            }

            let existing = event
                .tx
                .execute(&QueryExpression::select(junction.source_adapter(), filter).limit(1))
                .await?;
            if !existing.rows.is_empty() {
                debug!("{} already links {} and {}", adapter, owner, value);
                continue;
            }

            let mut row = Row::new();
            row.insert(owner_field.to_string(), owner.clone());
            row.insert(other_field.to_string(), value);
            persister
                .save_within(
                    &junction,
                    DataObject::new(junction.name(), row).with_state(ObjectState::Insert),
                    &mut *event.tx,
                )
                .await?;
        }
        Ok(())
    }

    async fn save_children(
        &self,
        event: &mut DataEvent<'_>,
        mapping: &AssociationMapping,
        owner: Value,
        items: Vec<Value>,
    ) -> ModelResult<()> {
        let context = event.context;
        let child = context.model(mapping.child_model())?;
        let child_key = child.primary_key()?;
        MigrationPlanner::new(context)
            .migrate_within(&child, &mut *event.tx)
            .await?;
        let persister = Persister::new(context);

        for item in items {
            let mut object = match item {
                Value::Object(_) => DataObject::from_value(child.name(), item)?,
                Value::Null => continue,
                key => {
                    let mut payload = Row::new();
                    payload.insert(child_key.name.clone(), key);
                    DataObject::new(child.name(), payload)
                }
            };
            if object.state == Some(ObjectState::Delete) {
                object.set(mapping.child_field(), Value::Null);
                object.state = Some(ObjectState::Update);
            } else {
                object.set(mapping.child_field(), owner.clone());
            }
            persister.save_within(&child, object, &mut *event.tx).await?;
        }
        Ok(())
    }
}

#[async_trait]
impl EventListener for AssociationListener {
    fn phases(&self) -> &'static [EventPhase] {
        &[EventPhase::AfterSave, EventPhase::BeforeRemove]
    }

    async fn after_save(&self, event: &mut DataEvent<'_>) -> ModelResult<()> {
        let model = event.model;
        for (attribute, mapping) in collections(model)? {
            let Some(Value::Array(items)) = event.target.get(&attribute.name).cloned() else {
                continue;
            };
            let key_field = if mapping.is_junction() && !is_parent(model, &mapping)? {
                mapping.child_field()
            } else {
                mapping.parent_field()
            };
            let owner = event.target.get(key_field).cloned().unwrap_or(Value::Null);
            if owner.is_null() {
                return Err(ModelError::Mapping(format!(
                    "{}.{} cannot be saved without {}",
                    model.name(),
                    attribute.name,
                    key_field
                )));
            }

            if mapping.is_junction() {
                self.attach_junction(event, &mapping, owner, items).await?;
            } else if is_parent(model, &mapping)? {
                self.save_children(event, &mapping, owner, items).await?;
            }
        }
        Ok(())
    }

    async fn before_remove(&self, event: &mut DataEvent<'_>) -> ModelResult<()> {
        let model = event.model;
        let context = event.context;
        for (attribute, mapping) in collections(model)? {
            if mapping.cascade == CascadeMode::None {
                continue;
            }
            let parent_side = is_parent(model, &mapping)?;
            let key_field = if mapping.is_junction() && !parent_side {
                mapping.child_field()
            } else {
                mapping.parent_field()
            };
            let Some(owner) = event.target.key_value(key_field).cloned() else {
                continue;
            };

            if mapping.is_junction() {
                let adapter = mapping.association_adapter.clone().unwrap_or_default();
                let junction = context.model(&adapter)?;
                MigrationPlanner::new(context)
                    .migrate_within(&junction, &mut *event.tx)
                    .await?;
                let field = if parent_side {
                    mapping.object_field()
                } else {
                    mapping.value_field()
                };
                let removed = event
                    .tx
                    .execute(&QueryExpression::delete(
                        junction.source_adapter(),
                        Filter::new().eq(field, owner),
                    ))
                    .await?;
                debug!("Removed {} {} row(s) of {}", removed.affected, adapter, attribute.name);
                continue;
            }

            if !parent_side {
                continue;
            }
            let child = context.model(mapping.child_model())?;
            let Some(holder) = child.attribute(mapping.child_field()) else {
                continue;
            };
            let storage = context
                .config()
                .model(&holder.model)
                .map(|m| m.source_adapter())
                .unwrap_or_else(|| child.source_adapter());
            MigrationPlanner::new(context)
                .migrate_within(&child, &mut *event.tx)
                .await?;
            let filter = Filter::new().eq(mapping.child_field(), owner);

            match mapping.cascade {
                CascadeMode::Null => {
                    let mut values = Row::new();
                    values.insert(mapping.child_field().to_string(), Value::Null);
                    event
                        .tx
                        .execute(&QueryExpression::update(storage, values, filter))
                        .await?;
                }
                CascadeMode::Delete => {
                    let children = event
                        .tx
                        .execute(&QueryExpression::select(storage, filter))
                        .await?;
                    let persister = Persister::new(context);
                    for row in children.rows {
                        let object = DataObject::new(child.name(), row).with_state(ObjectState::Delete);
                        persister.remove_within(&child, object, &mut *event.tx).await?;
                    }
                }
                CascadeMode::None => {}
            }
        }
        Ok(())
    }
}
