//! Engine configuration
//!
//! `OrmSettings` holds the tunable engine settings; `DataConfiguration`
//! is the configuration instance that owns the schema registry and every
//! registry and cache the engine consults.

pub mod configuration;
pub mod settings;

pub use configuration::*;
pub use settings::*;
