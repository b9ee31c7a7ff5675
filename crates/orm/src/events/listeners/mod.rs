//! Built-in listeners

mod association;
mod caching;
mod constraint;
mod permission;
mod state;
mod upgrade;
mod validation;
mod values;

pub use association::AssociationListener;
pub use caching::CachingListener;
pub use constraint::UniqueConstraintListener;
pub use permission::PermissionListener;
pub use state::StateListener;
pub use upgrade::{SeedListener, ViewListener};
pub use validation::ValidationListener;
pub use values::{CalculatedValueListener, DefaultValueListener};
