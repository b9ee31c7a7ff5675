//! Unique constraints

use async_trait::async_trait;
use serde_json::Value;
use tracing::warn;

use crate::adapter::{AdapterTransaction, Filter, QueryExpression, Row};
use crate::error::{ModelError, ModelResult};
use crate::events::{DataEvent, EventListener, EventPhase};
use crate::schema::model::key_of;
use crate::schema::{ConstraintDefinition, DataModel, StorageKind};

/// Storage object and filter matching the constraint values of `payload`.
/// `None` when a value is missing or the fields span several storage
/// objects.
pub(crate) fn constraint_filter(
    model: &DataModel,
    constraint: &ConstraintDefinition,
    payload: &Row,
) -> ModelResult<Option<(String, Filter)>> {
    let mut owner: Option<String> = None;
    let mut filter = Filter::new();

    for field in &constraint.fields {
        let Some(attribute) = model.attribute(field) else {
            return Err(ModelError::Schema(format!(
                "Constraint of '{}' names unknown field '{}'",
                model.name(),
                field
            )));
        };
        match &owner {
            None => owner = Some(attribute.model.clone()),
            Some(current) if *current != attribute.model => {
                warn!(
                    "Constraint on {}({}) spans several storage objects, skipped",
                    model.name(),
                    constraint.fields.join(", ")
                );
                return Ok(None);
            }
            Some(_) => {}
        }

        let value = match payload.get(field) {
            None | Some(Value::Null) => return Ok(None),
            Some(value) => value,
        };
        let value = match model.storage_kind(&attribute)? {
            StorageKind::ForeignKey(mapping) => key_of(value, mapping.parent_field()),
            _ => value.clone(),
        };
        filter = filter.eq(field.clone(), value);
    }

    let Some(owner) = owner else {
        return Ok(None);
    };
    let source = model
        .config()
        .model(&owner)
        .map(|m| m.source_adapter())
        .unwrap_or_else(|| model.source_adapter());
    Ok(Some((source, filter)))
}

/// First stored row matching any unique constraint of the model
pub(crate) async fn find_by_constraints(
    model: &DataModel,
    payload: &Row,
    tx: &mut dyn AdapterTransaction,
) -> ModelResult<Option<Row>> {
    let definition = model.definition();
    for constraint in definition.constraints.iter().filter(|c| c.is_unique()) {
        let Some((source, filter)) = constraint_filter(model, constraint, payload)? else {
            continue;
        };
        let result = tx
            .execute(&QueryExpression::select(source, filter).limit(1))
            .await?;
        if let Some(row) = result.rows.into_iter().next() {
            return Ok(Some(row));
        }
    }
    Ok(None)
}

/// Rejects objects duplicating the values of a unique constraint
pub struct UniqueConstraintListener;

#[async_trait]
impl EventListener for UniqueConstraintListener {
    fn phases(&self) -> &'static [EventPhase] {
        &[EventPhase::BeforeSave]
    }

    async fn before_save(&self, event: &mut DataEvent<'_>) -> ModelResult<()> {
        let model = event.model;
        let key = model.primary_key()?;
        let definition = model.definition();

        for constraint in definition.constraints.iter().filter(|c| c.is_unique()) {
            let mut payload = event.previous.clone().unwrap_or_default();
            for (name, value) in &event.target.payload {
                payload.insert(name.clone(), value.clone());
            }
            let Some((source, filter)) = constraint_filter(model, constraint, &payload)? else {
                continue;
            };

            let result = event.tx.execute(&QueryExpression::select(source, filter)).await?;
            let own_key = event.target.key_value(&key.name);
            let duplicate = result
                .rows
                .iter()
                .any(|row| own_key.is_none() || row.get(&key.name) != own_key);
            if duplicate {
                return Err(ModelError::Constraint {
                    model: model.name().to_string(),
                    fields: constraint.fields.clone(),
                    message: constraint.description.clone().unwrap_or_else(|| {
                        format!(
                            "An object with the same {} already exists",
                            constraint.fields.join(", ")
                        )
                    }),
                });
            }
        }
        Ok(())
    }
}
