//! Migration records

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::adapter::Row;

/// A column to create on the storage object
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MigrationField {
    pub name: String,
    #[serde(rename = "type")]
    pub type_name: String,
    #[serde(default)]
    pub primary: bool,
    #[serde(default = "nullable_default")]
    pub nullable: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scale: Option<u32>,
}

fn nullable_default() -> bool {
    true
}

/// An index to create on the storage object
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MigrationIndex {
    pub name: String,
    pub columns: Vec<String>,
    #[serde(default)]
    pub unique: bool,
}

/// The schema change for one model version
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MigrationRecord {
    /// Storage object the migration applies to
    pub applies_to: String,
    pub model: String,
    pub version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub add: Vec<MigrationField>,
    #[serde(default)]
    pub indexes: Vec<MigrationIndex>,
    /// Set by the adapter when the storage object already matched
    #[serde(default)]
    pub updated: bool,
}

impl MigrationRecord {
    pub fn new(applies_to: impl Into<String>, model: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            applies_to: applies_to.into(),
            model: model.into(),
            version: version.into(),
            description: None,
            add: Vec::new(),
            indexes: Vec::new(),
            updated: false,
        }
    }

    pub fn field(&self, name: &str) -> Option<&MigrationField> {
        self.add.iter().find(|f| f.name == name)
    }

    /// History row recording this migration
    pub fn history_row(&self) -> Row {
        let mut row = Row::new();
        row.insert("appliesTo".to_string(), json!(self.applies_to));
        row.insert("model".to_string(), json!(self.model));
        row.insert(
            "description".to_string(),
            self.description.clone().map(Value::String).unwrap_or(Value::Null),
        );
        row.insert("version".to_string(), json!(self.version));
        row
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_history_row() {
        let mut record = MigrationRecord::new("ProductBase", "Product", "1.0");
        record.description = Some("Product migration".to_string());
        let row = record.history_row();

        assert_eq!(row["appliesTo"], "ProductBase");
        assert_eq!(row["version"], "1.0");
        assert_eq!(row["description"], "Product migration");
    }

    #[test]
    fn test_record_serde_shape() {
        let record = MigrationRecord {
            add: vec![MigrationField {
                name: "id".to_string(),
                type_name: "Counter".to_string(),
                primary: true,
                nullable: false,
                size: None,
                scale: None,
            }],
            ..MigrationRecord::new("UserBase", "User", "2.0")
        };
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["appliesTo"], "UserBase");
        assert_eq!(json["add"][0]["type"], "Counter");

        let parsed: MigrationRecord = serde_json::from_value(json).unwrap();
        assert_eq!(parsed, record);
    }
}
