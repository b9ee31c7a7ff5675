//! Association Resolver
//!
//! Describes how two models relate. Explicit mappings come from field
//! declarations; everything else is inferred from field types, see
//! [`resolver`].

pub mod resolver;

pub use resolver::*;

use serde::{Deserialize, Serialize};

/// Default object column of tag junctions
pub const TAG_OBJECT_FIELD: &str = "object";
/// Default value column of tag junctions
pub const TAG_VALUE_FIELD: &str = "value";
/// Default object column of many-to-many junctions
pub const JUNCTION_OBJECT_FIELD: &str = "parentId";
/// Default value column of many-to-many junctions
pub const JUNCTION_VALUE_FIELD: &str = "valueId";

/// Association kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssociationKind {
    /// One-to-many through a foreign key column on the child
    #[default]
    Association,
    /// Many-to-many through a junction storage object
    Junction,
}

/// What happens to dependents when the parent is removed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CascadeMode {
    #[default]
    None,
    Null,
    Delete,
}

/// An association between a parent and a child model
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssociationMapping {
    #[serde(default)]
    pub association_type: AssociationKind,
    /// Junction storage object
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub association_adapter: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub association_object_field: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub association_value_field: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_field: Option<String>,
    /// Absent for tag mappings over primitive values
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub child_model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub child_field: Option<String>,
    #[serde(default)]
    pub cascade: CascadeMode,
    /// Field on the other side this mapping is reached through
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refers_to: Option<String>,
}

impl AssociationMapping {
    /// One-to-many association
    pub fn association(
        parent_model: impl Into<String>,
        parent_field: impl Into<String>,
        child_model: impl Into<String>,
        child_field: impl Into<String>,
    ) -> Self {
        Self {
            association_type: AssociationKind::Association,
            parent_model: Some(parent_model.into()),
            parent_field: Some(parent_field.into()),
            child_model: Some(child_model.into()),
            child_field: Some(child_field.into()),
            ..Default::default()
        }
    }

    /// Many-to-many association through `adapter`
    pub fn junction(adapter: impl Into<String>) -> Self {
        Self {
            association_type: AssociationKind::Junction,
            association_adapter: Some(adapter.into()),
            ..Default::default()
        }
    }

    pub fn parent(mut self, model: impl Into<String>, field: impl Into<String>) -> Self {
        self.parent_model = Some(model.into());
        self.parent_field = Some(field.into());
        self
    }

    pub fn child(mut self, model: impl Into<String>, field: impl Into<String>) -> Self {
        self.child_model = Some(model.into());
        self.child_field = Some(field.into());
        self
    }

    pub fn cascade(mut self, cascade: CascadeMode) -> Self {
        self.cascade = cascade;
        self
    }

    pub fn is_junction(&self) -> bool {
        self.association_type == AssociationKind::Junction
    }

    /// A junction over primitive values
    pub fn is_tag(&self) -> bool {
        self.is_junction() && self.child_model.is_none()
    }

    /// Column of the junction holding the parent key
    pub fn object_field(&self) -> &str {
        match &self.association_object_field {
            Some(field) => field,
            None if self.is_tag() => TAG_OBJECT_FIELD,
            None => JUNCTION_OBJECT_FIELD,
        }
    }

    /// Column of the junction holding the child key or tag value
    pub fn value_field(&self) -> &str {
        match &self.association_value_field {
            Some(field) => field,
            None if self.is_tag() => TAG_VALUE_FIELD,
            None => JUNCTION_VALUE_FIELD,
        }
    }

    pub fn parent_model(&self) -> &str {
        self.parent_model.as_deref().unwrap_or_default()
    }

    pub fn child_model(&self) -> &str {
        self.child_model.as_deref().unwrap_or_default()
    }

    pub fn parent_field(&self) -> &str {
        self.parent_field.as_deref().unwrap_or_default()
    }

    pub fn child_field(&self) -> &str {
        self.child_field.as_deref().unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_junction_defaults() {
        let tag = AssociationMapping::junction("UserTags").parent("User", "id");
        assert!(tag.is_tag());
        assert_eq!(tag.object_field(), "object");
        assert_eq!(tag.value_field(), "value");

        let groups = AssociationMapping::junction("UserGroups")
            .parent("User", "id")
            .child("Group", "id");
        assert!(!groups.is_tag());
        assert_eq!(groups.object_field(), "parentId");
        assert_eq!(groups.value_field(), "valueId");
    }

    #[test]
    fn test_serde_shape() {
        let mapping = AssociationMapping::association("Customer", "id", "Order", "customer")
            .cascade(CascadeMode::Null);
        let json = serde_json::to_value(&mapping).unwrap();
        assert_eq!(json["associationType"], "association");
        assert_eq!(json["parentModel"], "Customer");
        assert_eq!(json["childField"], "customer");
        assert_eq!(json["cascade"], "null");
    }
}
