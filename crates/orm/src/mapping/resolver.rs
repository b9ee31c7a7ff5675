//! Association inference
//!
//! Declared mappings are adopted, re-pointed at the requesting model when
//! inherited. Undeclared ones are inferred from the attribute type:
//! primitive collections become tag junctions, model references become
//! one-to-many associations or many-to-many junctions depending on what
//! the associated model declares back.

use dashmap::DashMap;
use tracing::debug;

use super::{
    AssociationKind, AssociationMapping, CascadeMode, JUNCTION_OBJECT_FIELD, JUNCTION_VALUE_FIELD,
    TAG_OBJECT_FIELD, TAG_VALUE_FIELD,
};
use crate::error::{ModelError, ModelResult};
use crate::schema::{Attribute, ConstraintDefinition, DataModel, FieldDefinition, ModelDefinition};

/// Resolved mappings keyed by (model, attribute). Plain attributes are
/// cached as `None`. Unknown attributes and failed resolutions are not
/// cached.
pub type MappingCache = DashMap<(String, String), Option<AssociationMapping>>;

/// Association metadata of `name` on `model`, or `None` for plain values
pub fn infer_mapping(model: &DataModel, name: &str) -> ModelResult<Option<AssociationMapping>> {
    let cache_key = (model.name().to_string(), name.to_string());
    if let Some(cached) = model.config().mappings().get(&cache_key) {
        return Ok(cached.value().clone());
    }

    let Some(attribute) = model.attribute(name) else {
        return Ok(None);
    };

    let mapping = match &attribute.mapping {
        Some(declared) => Some(complete(model, &attribute, repoint(model, &attribute, declared)?)?),
        None => infer_from_type(model, &attribute)?,
    };

    if let Some(mapping) = &mapping {
        if mapping.is_junction() {
            ensure_junction_model(model, &attribute, mapping)?;
        }
        debug!(
            "Resolved {:?} mapping for {}.{}",
            mapping.association_type,
            model.name(),
            name
        );
    }
    model.config().mappings().insert(cache_key, mapping.clone());
    Ok(mapping)
}

/// Point an inherited mapping at the requesting model through its super
/// type chain
fn repoint(
    model: &DataModel,
    attribute: &Attribute,
    declared: &AssociationMapping,
) -> ModelResult<AssociationMapping> {
    let mut mapping = declared.clone();
    if attribute.model == model.name()
        || mapping.child_model() == model.name()
        || mapping.parent_model() == model.name()
    {
        return Ok(mapping);
    }

    let super_types = model.super_types()?;
    if super_types.iter().any(|t| t == mapping.child_model()) {
        mapping.child_model = Some(model.name().to_string());
    } else if super_types.iter().any(|t| t == mapping.parent_model()) {
        mapping.parent_model = Some(model.name().to_string());
    } else {
        return Err(ModelError::Mapping(format!(
            "Inherited association '{}.{}' refers to neither '{}' nor one of its super types",
            attribute.model,
            attribute.name,
            model.name()
        )));
    }
    Ok(mapping)
}

/// Fill the parts a declared junction may leave out
fn complete(
    model: &DataModel,
    attribute: &Attribute,
    mut mapping: AssociationMapping,
) -> ModelResult<AssociationMapping> {
    if !mapping.is_junction() {
        return Ok(mapping);
    }
    if mapping.parent_model.is_none() {
        mapping.parent_model = Some(model.name().to_string());
        mapping.parent_field = Some(model.primary_key()?.name.clone());
    }
    if mapping.child_model.is_none() {
        if let Some(associated) = model.config().model(&attribute.type_name) {
            mapping.child_model = Some(associated.name().to_string());
            mapping.child_field = Some(associated.primary_key()?.name.clone());
        }
    }
    if mapping.association_adapter.is_none() {
        mapping.association_adapter = Some(junction_name(model, attribute));
    }
    if mapping.refers_to.is_none() {
        mapping.refers_to = Some(attribute.name.clone());
    }
    Ok(mapping)
}

fn infer_from_type(model: &DataModel, attribute: &Attribute) -> ModelResult<Option<AssociationMapping>> {
    let config = model.config();

    if config.data_types().is_primitive(&attribute.type_name) {
        if !attribute.many {
            return Ok(None);
        }
        let key = model.primary_key()?;
        return Ok(Some(AssociationMapping {
            association_type: AssociationKind::Junction,
            association_adapter: Some(junction_name(model, attribute)),
            association_object_field: Some(TAG_OBJECT_FIELD.to_string()),
            association_value_field: Some(TAG_VALUE_FIELD.to_string()),
            parent_model: Some(model.name().to_string()),
            parent_field: Some(key.name.clone()),
            child_model: None,
            child_field: None,
            cascade: CascadeMode::Delete,
            refers_to: Some(attribute.name.clone()),
        }));
    }

    let Some(associated) = config.model(&attribute.type_name) else {
        return Ok(None);
    };

    let self_reference = associated.name() == model.name();
    let foreign = associated
        .attributes()
        .iter()
        .find(|a| a.type_name == model.name() && !(self_reference && a.name == attribute.name))
        .cloned();

    let mapping = match foreign {
        Some(foreign) if foreign.many => AssociationMapping::association(
            associated.name(),
            associated.primary_key()?.name.clone(),
            model.name(),
            attribute.name.clone(),
        )
        .cascade(CascadeMode::Null),
        Some(foreign) => {
            let mut mapping = AssociationMapping::association(
                model.name(),
                model.primary_key()?.name.clone(),
                associated.name(),
                foreign.name.clone(),
            );
            mapping.refers_to = Some(foreign.property_name().to_string());
            mapping
        }
        None if attribute.many => AssociationMapping {
            association_type: AssociationKind::Junction,
            association_adapter: Some(junction_name(model, attribute)),
            association_object_field: Some(JUNCTION_OBJECT_FIELD.to_string()),
            association_value_field: Some(JUNCTION_VALUE_FIELD.to_string()),
            parent_model: Some(model.name().to_string()),
            parent_field: Some(model.primary_key()?.name.clone()),
            child_model: Some(associated.name().to_string()),
            child_field: Some(associated.primary_key()?.name.clone()),
            cascade: CascadeMode::Delete,
            refers_to: Some(attribute.name.clone()),
        },
        None => AssociationMapping::association(
            associated.name(),
            associated.primary_key()?.name.clone(),
            model.name(),
            attribute.name.clone(),
        )
        .cascade(CascadeMode::Null),
    };
    Ok(Some(mapping))
}

fn junction_name(model: &DataModel, attribute: &Attribute) -> String {
    format!("{}{}", model.name(), upper_first(&attribute.name))
}

fn upper_first(name: &str) -> String {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Register the hidden model describing a junction storage object
fn ensure_junction_model(
    model: &DataModel,
    attribute: &Attribute,
    mapping: &AssociationMapping,
) -> ModelResult<()> {
    let adapter = mapping.association_adapter.clone().ok_or_else(|| {
        ModelError::Mapping(format!(
            "Junction '{}.{}' has no association adapter",
            model.name(),
            attribute.name
        ))
    })?;

    let object_field = mapping.object_field().to_string();
    let value_field = mapping.value_field().to_string();
    let value_type = if mapping.is_tag() {
        attribute.type_name.clone()
    } else {
        mapping.child_model().to_string()
    };

    let mut definition = ModelDefinition::new(adapter.clone())
        .field(FieldDefinition::new("id", "Counter").primary())
        .field(FieldDefinition::new(object_field.clone(), mapping.parent_model()).not_null().indexed())
        .field(FieldDefinition::new(value_field.clone(), value_type).not_null().indexed())
        .constraint(ConstraintDefinition::unique([object_field, value_field]));
    definition.source = Some(adapter.clone());
    definition.view = Some(adapter.clone());
    definition.hidden = true;

    if model.config().schema().set_if_absent(definition) {
        // A new model may turn plain attributes of its type into associations
        model.config().mappings().retain(|_, cached| cached.is_some());
        debug!("Registered junction model '{}'", adapter);
    }
    Ok(())
}
