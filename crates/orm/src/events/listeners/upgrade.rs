//! Views and seed data created after an upgrade

use async_trait::async_trait;
use tracing::{debug, info};

use crate::adapter::{Filter, Join, QueryExpression};
use crate::error::ModelResult;
use crate::events::{EventListener, EventPhase, UpgradeEvent};
use crate::object::{DataObject, ObjectState};
use crate::persistence::Persister;
use crate::schema::StorageKind;

/// Materializes the model view over its source joined with the base view,
/// plus any declared views
pub struct ViewListener;

#[async_trait]
impl EventListener for ViewListener {
    fn phases(&self) -> &'static [EventPhase] {
        &[EventPhase::AfterUpgrade]
    }

    async fn after_upgrade(&self, event: &mut UpgradeEvent<'_>) -> ModelResult<()> {
        let model = event.model;
        let view = model.view_adapter();
        let source = model.source_adapter();
        if view == source {
            return Ok(());
        }

        let key = model.primary_key()?;
        let mut fields = Vec::new();
        for attribute in model.attributes().iter() {
            if matches!(
                model.storage_kind(attribute)?,
                StorageKind::Column | StorageKind::ForeignKey(_)
            ) {
                fields.push(attribute.name.clone());
            }
        }

        let mut query = QueryExpression::select(source, Filter::new()).fields(fields);
        if let Some(base) = model.base()? {
            query = query.join(Join {
                table: base.view_adapter(),
                left: key.name.clone(),
                right: key.name.clone(),
            });
        }
        if !event.tx.create_view(&view, &query).await? {
            debug!("Adapter does not create views, '{}' skipped", view);
            return Ok(());
        }

        for declared in &model.definition().views {
            let query = QueryExpression::select(view.clone(), Filter::new()).fields(declared.fields.clone());
            event.tx.create_view(&declared.name, &query).await?;
        }
        Ok(())
    }
}

/// Inserts the model's seed objects into an empty storage object
pub struct SeedListener;

#[async_trait]
impl EventListener for SeedListener {
    fn phases(&self) -> &'static [EventPhase] {
        &[EventPhase::AfterUpgrade]
    }

    async fn after_upgrade(&self, event: &mut UpgradeEvent<'_>) -> ModelResult<()> {
        let model = event.model;
        let seed = model.definition().seed.clone();
        if seed.is_empty() {
            return Ok(());
        }

        let existing = event
            .tx
            .execute(&QueryExpression::select(model.source_adapter(), Filter::new()).limit(1))
            .await?;
        if !existing.rows.is_empty() {
            debug!("{} already holds data, seed skipped", model.name());
            return Ok(());
        }

        let context = event.context.clone().unattended(true);
        let persister = Persister::new(&context);
        let count = seed.len();
        for payload in seed {
            let object = DataObject::new(model.name(), payload).with_state(ObjectState::Insert);
            persister.save_within(model, object, &mut *event.tx).await?;
        }
        info!("Seeded {} {} object(s)", count, model.name());
        Ok(())
    }
}
