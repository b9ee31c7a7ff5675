use async_trait::async_trait;

use crate::error::ModelResult;
use crate::events::{DataEvent, EventListener, EventPhase};
use crate::validation::ValidationEngine;

/// Runs the validation engine over the object being saved
pub struct ValidationListener;

#[async_trait]
impl EventListener for ValidationListener {
    fn phases(&self) -> &'static [EventPhase] {
        &[EventPhase::BeforeSave]
    }

    async fn before_save(&self, event: &mut DataEvent<'_>) -> ModelResult<()> {
        ValidationEngine::new(event.model)
            .validate(&event.target.payload, event.state)
            .await
    }
}
