//! Data context
//!
//! Binds a configuration to a storage adapter and the acting user. Every
//! persistence operation runs against a context.

use std::sync::Arc;

use crate::adapter::StorageAdapter;
use crate::config::DataConfiguration;
use crate::error::{ModelError, ModelResult};
use crate::schema::DataModel;

/// The acting user
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserIdentity {
    pub name: String,
    pub groups: Vec<String>,
}

impl UserIdentity {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            groups: Vec::new(),
        }
    }

    pub fn group(mut self, group: impl Into<String>) -> Self {
        self.groups.push(group.into());
        self
    }

    pub fn is_member_of(&self, account: &str) -> bool {
        self.groups.iter().any(|g| g.eq_ignore_ascii_case(account))
    }
}

/// Configuration, adapter and user for a unit of work
#[derive(Clone)]
pub struct DataContext {
    config: Arc<DataConfiguration>,
    adapter: Arc<dyn StorageAdapter>,
    user: Option<UserIdentity>,
    unattended: bool,
}

impl std::fmt::Debug for DataContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DataContext")
            .field("adapter", &self.adapter.name())
            .field("user", &self.user)
            .field("unattended", &self.unattended)
            .finish()
    }
}

impl DataContext {
    pub fn new(config: Arc<DataConfiguration>, adapter: Arc<dyn StorageAdapter>) -> Self {
        Self {
            config,
            adapter,
            user: None,
            unattended: false,
        }
    }

    pub fn with_user(mut self, user: UserIdentity) -> Self {
        self.user = Some(user);
        self
    }

    /// Unattended contexts bypass permission checks
    pub fn unattended(mut self, unattended: bool) -> Self {
        self.unattended = unattended;
        self
    }

    pub fn config(&self) -> &Arc<DataConfiguration> {
        &self.config
    }

    pub fn adapter(&self) -> &dyn StorageAdapter {
        self.adapter.as_ref()
    }

    pub fn user(&self) -> Option<&UserIdentity> {
        self.user.as_ref()
    }

    pub fn is_unattended(&self) -> bool {
        self.unattended
    }

    /// Resolve a model with a valid inheritance chain
    pub fn model(&self, name: &str) -> ModelResult<DataModel> {
        let model = self
            .config
            .model(name)
            .ok_or_else(|| ModelError::NotFound(format!("Model '{}'", name)))?;
        model.super_types()?;
        Ok(model)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::MemoryAdapter;
    use crate::schema::ModelDefinition;

    #[test]
    fn test_model_lookup() {
        let config = DataConfiguration::builder()
            .model(ModelDefinition::new("Product").inherits("Missing"))
            .build()
            .unwrap();
        let context = DataContext::new(config, Arc::new(MemoryAdapter::new()));

        assert!(matches!(context.model("Order"), Err(ModelError::NotFound(_))));
        assert!(matches!(context.model("Product"), Err(ModelError::Schema(_))));
    }

    #[test]
    fn test_user_groups() {
        let user = UserIdentity::new("alice").group("Administrators");
        assert!(user.is_member_of("administrators"));
        assert!(!user.is_member_of("Guests"));
    }
}
