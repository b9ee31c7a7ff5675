//! Listener registration and dispatch

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

use super::listeners::{
    AssociationListener, CachingListener, CalculatedValueListener, DefaultValueListener,
    PermissionListener, SeedListener, StateListener, UniqueConstraintListener, ValidationListener,
    ViewListener,
};
use super::{DataEvent, EventListener, EventPhase, ExecuteEvent, ListenerKind, UpgradeEvent};
use crate::error::{ModelError, ModelResult};
use crate::schema::{CachingMode, DataModel};

/// A listener wired into the pipeline
#[derive(Clone)]
pub struct RegisteredListener {
    pub kind: ListenerKind,
    pub name: String,
    pub listener: Arc<dyn EventListener>,
}

/// Listeners of one model keyed by phase, in registration order
#[derive(Default)]
pub struct EventPipeline {
    listeners: HashMap<EventPhase, Vec<RegisteredListener>>,
}

impl fmt::Debug for EventPipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut map = f.debug_map();
        for (phase, listeners) in &self.listeners {
            let names: Vec<&str> = listeners.iter().map(|l| l.name.as_str()).collect();
            map.entry(&phase.as_str(), &names);
        }
        map.finish()
    }
}

impl EventPipeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wire a listener to each phase it declares
    pub fn register(&mut self, kind: ListenerKind, name: impl Into<String>, listener: Arc<dyn EventListener>) {
        let name = name.into();
        for phase in listener.phases() {
            self.listeners
                .entry(*phase)
                .or_default()
                .push(RegisteredListener {
                    kind,
                    name: name.clone(),
                    listener: listener.clone(),
                });
        }
    }

    pub fn listeners(&self, phase: EventPhase) -> &[RegisteredListener] {
        self.listeners.get(&phase).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Listener kinds of a phase in dispatch order
    pub fn kinds(&self, phase: EventPhase) -> Vec<ListenerKind> {
        self.listeners(phase).iter().map(|l| l.kind).collect()
    }

    /// Standard pipeline of a model: state, defaults, calculations, caching,
    /// declared listeners, validation, constraints, associations and
    /// finally permissions. Views and seed data follow upgrades.
    pub fn for_model(model: &DataModel) -> ModelResult<Self> {
        let definition = model.definition();
        let mut pipeline = Self::new();

        pipeline.register(ListenerKind::StateValidator, "state", Arc::new(StateListener));
        pipeline.register(ListenerKind::DefaultValue, "default", Arc::new(DefaultValueListener));
        pipeline.register(
            ListenerKind::CalculatedValue,
            "calculated",
            Arc::new(CalculatedValueListener),
        );
        if matches!(model.caching(), CachingMode::Always | CachingMode::Conditional) {
            pipeline.register(ListenerKind::Caching, "caching", Arc::new(CachingListener));
        }

        for declared in definition.event_listeners.iter().filter(|l| !l.disabled) {
            let listener = model.config().listener(&declared.type_name).ok_or_else(|| {
                ModelError::Configuration(format!(
                    "Unknown event listener '{}' declared by model '{}'",
                    declared.type_name,
                    model.name()
                ))
            })?;
            let name = declared.name.clone().unwrap_or_else(|| declared.type_name.clone());
            pipeline.register(ListenerKind::UserDefined, name, listener);
        }

        pipeline.register(ListenerKind::Validation, "validation", Arc::new(ValidationListener));
        if definition.constraints.iter().any(|c| c.is_unique()) {
            pipeline.register(
                ListenerKind::Constraint,
                "unique",
                Arc::new(UniqueConstraintListener),
            );
        }
        pipeline.register(ListenerKind::Association, "association", Arc::new(AssociationListener));
        pipeline.register(ListenerKind::Permission, "permission", Arc::new(PermissionListener));

        pipeline.register(ListenerKind::View, "view", Arc::new(ViewListener));
        if !definition.seed.is_empty() {
            pipeline.register(ListenerKind::Seed, "seed", Arc::new(SeedListener));
        }

        debug!("Built event pipeline for '{}': {:?}", model.name(), pipeline);
        Ok(pipeline)
    }

    /// Dispatch a save or remove phase
    pub async fn emit(&self, phase: EventPhase, event: &mut DataEvent<'_>) -> ModelResult<()> {
        for registered in self.listeners(phase) {
            let result = match phase {
                EventPhase::BeforeSave => registered.listener.before_save(event).await,
                EventPhase::AfterSave => registered.listener.after_save(event).await,
                EventPhase::BeforeRemove => registered.listener.before_remove(event).await,
                EventPhase::AfterRemove => registered.listener.after_remove(event).await,
                _ => Ok(()),
            };
            stop_on_error(phase, registered, result)?;
        }
        Ok(())
    }

    /// Dispatch a read phase
    pub async fn emit_execute(&self, phase: EventPhase, event: &mut ExecuteEvent<'_>) -> ModelResult<()> {
        for registered in self.listeners(phase) {
            let result = match phase {
                EventPhase::BeforeExecute => registered.listener.before_execute(event).await,
                EventPhase::AfterExecute => registered.listener.after_execute(event).await,
                _ => Ok(()),
            };
            stop_on_error(phase, registered, result)?;
        }
        Ok(())
    }

    /// Dispatch a migration phase
    pub async fn emit_upgrade(&self, phase: EventPhase, event: &mut UpgradeEvent<'_>) -> ModelResult<()> {
        for registered in self.listeners(phase) {
            let result = match phase {
                EventPhase::BeforeUpgrade => registered.listener.before_upgrade(event).await,
                EventPhase::AfterUpgrade => registered.listener.after_upgrade(event).await,
                _ => Ok(()),
            };
            stop_on_error(phase, registered, result)?;
        }
        Ok(())
    }
}

fn stop_on_error(phase: EventPhase, registered: &RegisteredListener, result: ModelResult<()>) -> ModelResult<()> {
    if let Err(e) = &result {
        debug!("Listener '{}' stopped {}: {}", registered.name, phase, e);
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DataConfiguration;
    use crate::schema::{FieldDefinition, ListenerDefinition, ModelDefinition};

    struct Audit;

    #[async_trait::async_trait]
    impl EventListener for Audit {
        fn phases(&self) -> &'static [EventPhase] {
            &[EventPhase::BeforeSave, EventPhase::AfterRemove]
        }
    }

    fn definition() -> ModelDefinition {
        let mut definition = ModelDefinition::new("Order")
            .field(FieldDefinition::new("id", "Counter").primary());
        definition.event_listeners.push(ListenerDefinition {
            name: None,
            type_name: "audit".to_string(),
            disabled: false,
        });
        definition
    }

    #[test]
    fn test_registration_order() {
        let config = DataConfiguration::builder()
            .model(definition())
            .listener("audit", Arc::new(Audit))
            .build()
            .unwrap();
        let model = config.model("Order").unwrap();
        let pipeline = EventPipeline::for_model(&model).unwrap();

        assert_eq!(
            pipeline.kinds(EventPhase::BeforeSave),
            vec![
                ListenerKind::StateValidator,
                ListenerKind::DefaultValue,
                ListenerKind::CalculatedValue,
                ListenerKind::UserDefined,
                ListenerKind::Validation,
                ListenerKind::Permission,
            ]
        );
        assert_eq!(pipeline.kinds(EventPhase::AfterRemove), vec![ListenerKind::UserDefined]);
        assert_eq!(pipeline.kinds(EventPhase::AfterUpgrade), vec![ListenerKind::View]);
        assert_eq!(pipeline.listeners(EventPhase::BeforeSave)[3].name, "audit");
    }

    #[test]
    fn test_caching_and_constraints_registered_when_declared() {
        let mut definition = ModelDefinition::new("Order")
            .field(FieldDefinition::new("id", "Counter").primary())
            .field(FieldDefinition::new("code", "Text"))
            .constraint(crate::schema::ConstraintDefinition::unique(["code"]));
        definition.caching = Some(CachingMode::Always);
        let config = DataConfiguration::builder().model(definition).build().unwrap();
        let model = config.model("Order").unwrap();
        let pipeline = EventPipeline::for_model(&model).unwrap();

        let kinds = pipeline.kinds(EventPhase::BeforeSave);
        assert!(kinds.contains(&ListenerKind::Constraint));
        assert_eq!(
            pipeline.kinds(EventPhase::BeforeExecute),
            vec![ListenerKind::Caching, ListenerKind::Permission]
        );
    }

    #[test]
    fn test_unknown_listener_is_configuration_error() {
        let config = DataConfiguration::builder().model(definition()).build().unwrap();
        let model = config.model("Order").unwrap();
        assert!(matches!(
            EventPipeline::for_model(&model),
            Err(ModelError::Configuration(_))
        ));
    }
}
