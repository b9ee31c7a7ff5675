//! Validation Engine
//!
//! Builds the validator chain of every eligible attribute and runs it
//! against the object being saved. The chain is, in order: required,
//! max length, the registered custom validator, the rules of the declared
//! validation type, and the rules of the attribute's own data type. The
//! first failure stops validation of the whole object.

use serde_json::Value;
use themis_validation::{
    DataTypeValidator, MaxLengthValidator, RequiredValidator, ValidationError, ValidationRule,
};
use tracing::debug;

use crate::adapter::Row;
use crate::error::{FieldError, ModelError, ModelResult};
use crate::object::ObjectState;
use crate::schema::{Attribute, DataModel, StorageKind};

/// Creates validator instances for attributes naming it in
/// `validation.validator`
pub trait ValidatorFactory: Send + Sync {
    fn create_instance(&self, attribute: &Attribute) -> Box<dyn ValidationRule>;
}

impl<F> ValidatorFactory for F
where
    F: Fn(&Attribute) -> Box<dyn ValidationRule> + Send + Sync,
{
    fn create_instance(&self, attribute: &Attribute) -> Box<dyn ValidationRule> {
        self(attribute)
    }
}

/// Rewrites validation messages for display
pub trait Translator: Send + Sync {
    fn translate(&self, message: &str) -> String;
}

/// Leaves messages untouched
#[derive(Debug, Clone, Copy, Default)]
pub struct NoTranslation;

impl Translator for NoTranslation {
    fn translate(&self, message: &str) -> String {
        message.to_string()
    }
}

/// Validates objects of one model
pub struct ValidationEngine<'a> {
    model: &'a DataModel,
}

impl<'a> ValidationEngine<'a> {
    pub fn new(model: &'a DataModel) -> Self {
        Self { model }
    }

    /// Whether an attribute takes part in validation of the payload
    pub fn is_eligible(&self, attribute: &Attribute, payload: &Row, state: ObjectState) -> ModelResult<bool> {
        if attribute.many {
            return Ok(false);
        }
        if let StorageKind::Collection(_) | StorageKind::Virtual = self.model.storage_kind(attribute)? {
            return Ok(false);
        }
        let eligible = match state {
            ObjectState::Insert => {
                if attribute.primary && attribute.type_name == "Counter" {
                    false
                } else if attribute.readonly {
                    attribute.calculation.is_some() || attribute.value.is_some()
                } else {
                    true
                }
            }
            ObjectState::Update => {
                payload.contains_key(&attribute.name)
                    && (!attribute.readonly || attribute.calculation.is_some())
            }
            ObjectState::Delete => false,
        };
        Ok(eligible)
    }

    /// Validator chain of an attribute
    pub fn rules_for(&self, attribute: &Attribute) -> ModelResult<Vec<Box<dyn ValidationRule>>> {
        let config = self.model.config();
        let types = config.data_types();
        let mut rules: Vec<Box<dyn ValidationRule>> = Vec::new();

        if !attribute.nullable && !attribute.primary {
            rules.push(Box::new(RequiredValidator::new()));
        }

        let validation = attribute.validation.as_ref();
        let max_length = validation
            .and_then(|v| v.rules.max_length)
            .or(attribute.size.filter(|_| !types.is_numeric(&attribute.type_name)));
        if let Some(max_length) = max_length {
            rules.push(Box::new(MaxLengthValidator::new(max_length)));
        }

        if let Some(name) = validation.and_then(|v| v.validator.as_deref()) {
            let factory = config.validator(name).ok_or_else(|| {
                ModelError::Configuration(format!(
                    "Unknown validator '{}' on {}.{}",
                    name,
                    self.model.name(),
                    attribute.name
                ))
            })?;
            rules.push(factory.create_instance(attribute));
        }

        if let Some(validation) = validation {
            match &validation.type_name {
                Some(type_name) => {
                    let data_type = types.get(type_name).ok_or_else(|| {
                        ModelError::Configuration(format!(
                            "Unknown validation type '{}' on {}.{}",
                            type_name,
                            self.model.name(),
                            attribute.name
                        ))
                    })?;
                    rules.push(Box::new(compile(type_name, &data_type.rules)?));
                }
                None if !validation.rules.is_empty() => {
                    rules.push(Box::new(compile("validation", &validation.rules)?));
                }
                None => {}
            }
        }

        if let Some(data_type) = types.get(&attribute.type_name) {
            if !data_type.rules.is_empty() {
                rules.push(Box::new(compile(&data_type.name, &data_type.rules)?));
            }
        }

        Ok(rules)
    }

    /// Validate a payload, failing on the first invalid attribute
    pub async fn validate(&self, payload: &Row, state: ObjectState) -> ModelResult<()> {
        for attribute in self.model.attributes().iter() {
            if !self.is_eligible(attribute, payload, state)? {
                continue;
            }
            let value = payload.get(&attribute.name).unwrap_or(&Value::Null);
            for rule in self.rules_for(attribute)? {
                if let Err(error) = rule.validate(value).await {
                    debug!(
                        "{}.{} failed {}: {}",
                        self.model.name(),
                        attribute.name,
                        rule.rule_name(),
                        error
                    );
                    return Err(self.field_error(attribute, error).into());
                }
            }
        }
        Ok(())
    }

    fn field_error(&self, attribute: &Attribute, error: ValidationError) -> FieldError {
        let translated = self.model.config().translator().translate(&error.message);
        FieldError::from_validation(self.model.name(), &attribute.name, error.message(translated))
    }
}

fn compile(type_name: &str, rules: &themis_validation::TypeRules) -> ModelResult<DataTypeValidator> {
    DataTypeValidator::new(type_name, rules).map_err(|e| {
        ModelError::Configuration(format!("Invalid pattern for '{}': {}", type_name, e))
    })
}
