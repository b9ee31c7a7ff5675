//! Default and calculated values

use async_trait::async_trait;
use serde_json::Value;

use crate::error::ModelResult;
use crate::events::{DataEvent, EventListener, EventPhase};
use crate::functions::FunctionContext;
use crate::object::ObjectState;

/// Fills missing attributes declaring a `value` on insert
pub struct DefaultValueListener;

#[async_trait]
impl EventListener for DefaultValueListener {
    fn phases(&self) -> &'static [EventPhase] {
        &[EventPhase::BeforeSave]
    }

    async fn before_save(&self, event: &mut DataEvent<'_>) -> ModelResult<()> {
        if event.state != ObjectState::Insert {
            return Ok(());
        }
        let model = event.model;
        let functions = model.config().functions();
        for attribute in model.attributes().iter() {
            let Some(expression) = &attribute.value else {
                continue;
            };
            if !matches!(event.target.get(&attribute.name), None | Some(Value::Null)) {
                continue;
            }
            let value = functions.evaluate(
                expression,
                &FunctionContext {
                    model: model.name(),
                    target: &event.target.payload,
                    user: event.context.user(),
                },
            )?;
            event.target.set(attribute.name.clone(), value);
        }
        Ok(())
    }
}

/// Recomputes attributes declaring a `calculation` on every save
pub struct CalculatedValueListener;

#[async_trait]
impl EventListener for CalculatedValueListener {
    fn phases(&self) -> &'static [EventPhase] {
        &[EventPhase::BeforeSave]
    }

    async fn before_save(&self, event: &mut DataEvent<'_>) -> ModelResult<()> {
        let model = event.model;
        let functions = model.config().functions();
        for attribute in model.attributes().iter() {
            let Some(expression) = &attribute.calculation else {
                continue;
            };
            let value = functions.evaluate(
                expression,
                &FunctionContext {
                    model: model.name(),
                    target: &event.target.payload,
                    user: event.context.user(),
                },
            )?;
            event.target.set(attribute.name.clone(), value);
        }
        Ok(())
    }
}
