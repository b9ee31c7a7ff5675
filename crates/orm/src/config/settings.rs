use crate::schema::CachingMode;
use std::env;

/// Settings errors
#[derive(Debug, Clone, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for {field}: '{value}', expected {expected}")]
    InvalidValue {
        field: String,
        value: String,
        expected: String,
    },

    #[error("Missing required setting: {field}")]
    MissingRequired { field: String },

    #[error("Unknown {kind} '{name}'")]
    UnknownIdentifier { kind: String, name: String },
}

/// Engine settings
#[derive(Debug, Clone, PartialEq)]
pub struct OrmSettings {
    /// Storage object holding the migration history
    pub migrations_table: String,
    /// Caching mode for models that do not declare one
    pub default_caching: CachingMode,
    /// Suffix appended to the model name when `source` is absent
    pub source_suffix: String,
    /// Suffix appended to the model name when `view` is absent
    pub view_suffix: String,
    /// Ask the adapter for pre-allocated identities before inserting
    pub use_next_identity: bool,
}

impl Default for OrmSettings {
    fn default() -> Self {
        Self {
            migrations_table: "migrations".to_string(),
            default_caching: CachingMode::None,
            source_suffix: "Base".to_string(),
            view_suffix: "Data".to_string(),
            use_next_identity: true,
        }
    }
}

impl OrmSettings {
    /// Load settings from `THEMIS_*` environment variables over the defaults
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut settings = Self::default();

        if let Ok(table) = env::var("THEMIS_MIGRATIONS_TABLE") {
            settings.migrations_table = table;
        }

        if let Ok(caching) = env::var("THEMIS_DEFAULT_CACHING") {
            settings.default_caching = caching.parse()?;
        }

        if let Ok(suffix) = env::var("THEMIS_SOURCE_SUFFIX") {
            settings.source_suffix = suffix;
        }

        if let Ok(suffix) = env::var("THEMIS_VIEW_SUFFIX") {
            settings.view_suffix = suffix;
        }

        if let Ok(flag) = env::var("THEMIS_USE_NEXT_IDENTITY") {
            settings.use_next_identity = flag.parse().map_err(|_| ConfigError::InvalidValue {
                field: "use_next_identity".to_string(),
                value: flag,
                expected: "true or false".to_string(),
            })?;
        }

        settings.validate()?;
        Ok(settings)
    }

    /// Validate the settings
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.migrations_table.trim().is_empty() {
            return Err(ConfigError::MissingRequired {
                field: "migrations_table".to_string(),
            });
        }

        if self.source_suffix == self.view_suffix {
            return Err(ConfigError::InvalidValue {
                field: "view_suffix".to_string(),
                value: self.view_suffix.clone(),
                expected: "a suffix different from the source suffix".to_string(),
            });
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_settings_are_valid() {
        let settings = OrmSettings::default();
        assert!(settings.validate().is_ok());
        assert_eq!(settings.migrations_table, "migrations");
        assert_eq!(settings.source_suffix, "Base");
        assert_eq!(settings.view_suffix, "Data");
    }

    #[test]
    fn test_validate_rejects_empty_migrations_table() {
        let settings = OrmSettings {
            migrations_table: " ".to_string(),
            ..Default::default()
        };
        assert!(matches!(
            settings.validate(),
            Err(ConfigError::MissingRequired { .. })
        ));
    }

    #[test]
    fn test_validate_rejects_equal_suffixes() {
        let settings = OrmSettings {
            view_suffix: "Base".to_string(),
            ..Default::default()
        };
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_from_env() {
        env::set_var("THEMIS_MIGRATIONS_TABLE", "schema_history");
        env::set_var("THEMIS_DEFAULT_CACHING", "always");
        let settings = OrmSettings::from_env().unwrap();
        env::remove_var("THEMIS_MIGRATIONS_TABLE");
        env::remove_var("THEMIS_DEFAULT_CACHING");

        assert_eq!(settings.migrations_table, "schema_history");
        assert_eq!(settings.default_caching, CachingMode::Always);
    }
}
