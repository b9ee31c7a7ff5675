//! Object state resolution

use async_trait::async_trait;
use tracing::debug;

use super::constraint::find_by_constraints;
use crate::adapter::{Filter, QueryExpression};
use crate::error::{ModelError, ModelResult};
use crate::events::{DataEvent, EventListener, EventPhase};
use crate::object::ObjectState;

/// Settles insert versus update before anything else runs. An inferred
/// insert matching a unique constraint becomes an update of that object;
/// an inferred update whose key is not stored becomes an insert.
pub struct StateListener;

#[async_trait]
impl EventListener for StateListener {
    fn phases(&self) -> &'static [EventPhase] {
        &[EventPhase::BeforeSave, EventPhase::BeforeRemove]
    }

    async fn before_save(&self, event: &mut DataEvent<'_>) -> ModelResult<()> {
        let model = event.model;
        let key = model.primary_key()?;
        let explicit = event.target.state.is_some();

        match event.state {
            ObjectState::Insert => {
                if explicit || event.target.key_value(&key.name).is_some() {
                    return Ok(());
                }
                if let Some(existing) = find_by_constraints(model, &event.target.payload, &mut *event.tx).await? {
                    if let Some(id) = existing.get(&key.name) {
                        debug!("{} matched an existing object, updating", model.name());
                        event.target.set(key.name.clone(), id.clone());
                        event.state = ObjectState::Update;
                        event.previous = Some(existing);
                    }
                }
            }
            ObjectState::Update => match event.target.key_value(&key.name).cloned() {
                Some(id) => {
                    let result = event
                        .tx
                        .execute(
                            &QueryExpression::select(
                                model.source_adapter(),
                                Filter::new().eq(key.name.clone(), id.clone()),
                            )
                            .limit(1),
                        )
                        .await?;
                    match result.rows.into_iter().next() {
                        Some(existing) => event.previous = Some(existing),
                        None if explicit => {
                            return Err(ModelError::NotFound(format!("{}({})", model.name(), id)))
                        }
                        None => event.state = ObjectState::Insert,
                    }
                }
                None => {
                    let existing = find_by_constraints(model, &event.target.payload, &mut *event.tx)
                        .await?
                        .ok_or_else(|| {
                            ModelError::NotFound(format!(
                                "{} object to update could not be identified",
                                model.name()
                            ))
                        })?;
                    if let Some(id) = existing.get(&key.name) {
                        event.target.set(key.name.clone(), id.clone());
                    }
                    event.previous = Some(existing);
                }
            },
            ObjectState::Delete => {}
        }
        Ok(())
    }

    async fn before_remove(&self, event: &mut DataEvent<'_>) -> ModelResult<()> {
        let model = event.model;
        let key = model.primary_key()?;
        if event.target.key_value(&key.name).is_some() {
            return Ok(());
        }
        let existing = find_by_constraints(model, &event.target.payload, &mut *event.tx)
            .await?
            .ok_or_else(|| ModelError::MissingPrimaryKey(model.name().to_string()))?;
        if let Some(id) = existing.get(&key.name) {
            event.target.set(key.name.clone(), id.clone());
        }
        event.previous = Some(existing);
        Ok(())
    }
}
