//! Schema Registry
//!
//! Holds raw model documents keyed by name and resolves them into
//! `DataModel`s with inheritance-merged attribute sets.

pub mod attribute;
pub mod data_types;
pub mod definition;
pub mod model;
pub mod registry;

pub use attribute::*;
pub use data_types::*;
pub use definition::*;
pub use model::*;
pub use registry::*;
