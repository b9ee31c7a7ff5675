use async_trait::async_trait;

use crate::error::ModelResult;
use crate::events::{DataEvent, EventListener, EventPhase, ExecuteEvent};
use crate::schema::CachingMode;

fn enabled(event: &ExecuteEvent<'_>) -> bool {
    match event.model.caching() {
        CachingMode::Always => true,
        CachingMode::Conditional => event.cache,
        CachingMode::None => false,
    }
}

/// Serves reads by key from the object cache and evicts on writes
pub struct CachingListener;

#[async_trait]
impl EventListener for CachingListener {
    fn phases(&self) -> &'static [EventPhase] {
        &[
            EventPhase::BeforeExecute,
            EventPhase::AfterExecute,
            EventPhase::AfterSave,
            EventPhase::AfterRemove,
        ]
    }

    async fn before_execute(&self, event: &mut ExecuteEvent<'_>) -> ModelResult<()> {
        if !enabled(event) {
            return Ok(());
        }
        if let Some(key) = &event.key {
            if let Some(row) = event.model.config().cache().get(event.model.name(), key) {
                tracing::debug!("Cache hit for {}({})", event.model.name(), key);
                event.result = Some(vec![row]);
            }
        }
        Ok(())
    }

    async fn after_execute(&self, event: &mut ExecuteEvent<'_>) -> ModelResult<()> {
        if !enabled(event) {
            return Ok(());
        }
        if let (Some(key), Some([row])) = (&event.key, event.result.as_deref()) {
            event
                .model
                .config()
                .cache()
                .set(event.model.name(), key, row.clone());
        }
        Ok(())
    }

    async fn after_save(&self, event: &mut DataEvent<'_>) -> ModelResult<()> {
        evict(event)
    }

    async fn after_remove(&self, event: &mut DataEvent<'_>) -> ModelResult<()> {
        evict(event)
    }
}

fn evict(event: &DataEvent<'_>) -> ModelResult<()> {
    let key = event.model.primary_key()?;
    if let Some(value) = event.target.key_value(&key.name) {
        event.model.config().cache().remove(event.model.name(), value);
    }
    Ok(())
}
