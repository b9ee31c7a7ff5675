//! # themis-validation
//!
//! Attribute-level validator rules used by the themis ORM validation engine.
//! Every rule validates a single JSON value and reports the first failure
//! with a stable error code.

pub mod error;
pub mod rules;
pub mod traits;
pub mod validators;

pub use error::{codes, ValidationError, ValidationResult};
pub use rules::TypeRules;
pub use traits::ValidationRule;

pub use validators::{
    custom::CustomValidator,
    data_type::DataTypeValidator,
    length::{MaxLengthValidator, MinLengthValidator},
    numeric::{MaxValueValidator, MinValueValidator, RangeValidator},
    pattern::PatternValidator,
    required::RequiredValidator,
};
