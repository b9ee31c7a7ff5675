//! Privilege enforcement

use async_trait::async_trait;

use crate::context::DataContext;
use crate::error::{ModelError, ModelResult};
use crate::events::{DataEvent, EventListener, EventPhase, ExecuteEvent};
use crate::permission::{mask_for, masks, PermissionRequest};
use crate::schema::DataModel;

async fn demand(model: &DataModel, context: &DataContext, mask: u32, operation: &str) -> ModelResult<()> {
    let definition = model.definition();
    let request = PermissionRequest {
        model: model.name(),
        privileges: &definition.privileges,
        mask,
        user: context.user(),
        unattended: context.is_unattended(),
    };
    if context.config().permissions().has_privilege(&request).await? {
        return Ok(());
    }
    Err(ModelError::Permission {
        model: model.name().to_string(),
        message: format!(
            "Access denied. The current user lacks the {} privilege.",
            operation
        ),
    })
}

/// Denies operations the acting user holds no privilege for
pub struct PermissionListener;

#[async_trait]
impl EventListener for PermissionListener {
    fn phases(&self) -> &'static [EventPhase] {
        &[
            EventPhase::BeforeSave,
            EventPhase::BeforeRemove,
            EventPhase::BeforeExecute,
        ]
    }

    async fn before_save(&self, event: &mut DataEvent<'_>) -> ModelResult<()> {
        let operation = match event.state {
            crate::object::ObjectState::Insert => "create",
            crate::object::ObjectState::Update => "update",
            crate::object::ObjectState::Delete => "delete",
        };
        demand(event.model, event.context, mask_for(event.state), operation).await
    }

    async fn before_remove(&self, event: &mut DataEvent<'_>) -> ModelResult<()> {
        demand(event.model, event.context, masks::DELETE, "delete").await
    }

    async fn before_execute(&self, event: &mut ExecuteEvent<'_>) -> ModelResult<()> {
        demand(event.model, event.context, masks::READ, "read").await
    }
}
