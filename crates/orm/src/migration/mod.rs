//! Migration Planner
//!
//! Turns a model's storage attributes into a migration record, applies it
//! through the adapter inside one transaction, and keeps a history table so
//! each model version is applied once.

pub mod planner;
pub mod record;

pub use planner::*;
pub use record::*;
