//! Privilege checks
//!
//! Models declare privileges as `{mask, type, account}`. The default
//! strategy grants an operation when a global privilege covers its mask for
//! the user, one of the user's groups, or every account (`*`).

use async_trait::async_trait;

use crate::context::UserIdentity;
use crate::error::ModelResult;
use crate::object::ObjectState;
use crate::schema::{PrivilegeDefinition, PrivilegeKind};

/// Privilege mask bits
pub mod masks {
    pub const READ: u32 = 1;
    pub const CREATE: u32 = 2;
    pub const UPDATE: u32 = 4;
    pub const DELETE: u32 = 8;
    pub const EXECUTE: u32 = 16;
}

/// Mask required to persist an object in the given state
pub fn mask_for(state: ObjectState) -> u32 {
    match state {
        ObjectState::Insert => masks::CREATE,
        ObjectState::Update => masks::UPDATE,
        ObjectState::Delete => masks::DELETE,
    }
}

/// An access decision to make
#[derive(Debug, Clone, Copy)]
pub struct PermissionRequest<'a> {
    pub model: &'a str,
    pub privileges: &'a [PrivilegeDefinition],
    pub mask: u32,
    pub user: Option<&'a UserIdentity>,
    pub unattended: bool,
}

/// Decides whether an operation is allowed
#[async_trait]
pub trait PermissionStrategy: Send + Sync {
    async fn has_privilege(&self, request: &PermissionRequest<'_>) -> ModelResult<bool>;
}

/// Default strategy over declared global privileges. Models declaring no
/// privileges are open.
#[derive(Debug, Clone, Copy, Default)]
pub struct PrivilegeStrategy;

#[async_trait]
impl PermissionStrategy for PrivilegeStrategy {
    async fn has_privilege(&self, request: &PermissionRequest<'_>) -> ModelResult<bool> {
        if request.unattended || request.privileges.is_empty() {
            return Ok(true);
        }

        let granted = request
            .privileges
            .iter()
            .filter(|p| p.kind == PrivilegeKind::Global && p.mask & request.mask == request.mask)
            .any(|p| match p.account.as_deref() {
                None | Some("*") => true,
                Some(account) => request
                    .user
                    .map(|u| u.name.eq_ignore_ascii_case(account) || u.is_member_of(account))
                    .unwrap_or(false),
            });
        Ok(granted)
    }
}
