//! Data objects and their persistence state

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::adapter::Row;
use crate::error::{ModelError, ModelResult};

/// Pending persistence action of an object
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum ObjectState {
    Insert = 1,
    Update = 2,
    Delete = 4,
}

impl ObjectState {
    pub fn code(self) -> u8 {
        self as u8
    }

    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            1 => Some(ObjectState::Insert),
            2 => Some(ObjectState::Update),
            4 => Some(ObjectState::Delete),
            _ => None,
        }
    }
}

impl From<ObjectState> for u8 {
    fn from(state: ObjectState) -> Self {
        state.code()
    }
}

impl TryFrom<u8> for ObjectState {
    type Error = String;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        ObjectState::from_code(code).ok_or_else(|| format!("Invalid object state {}", code))
    }
}

/// An object travelling through the save and remove pipelines
#[derive(Debug, Clone, PartialEq)]
pub struct DataObject {
    /// Model name the object belongs to
    pub type_name: String,
    /// Explicit state, inferred from key presence when absent
    pub state: Option<ObjectState>,
    pub payload: Row,
}

impl DataObject {
    pub fn new(type_name: impl Into<String>, payload: Row) -> Self {
        Self {
            type_name: type_name.into(),
            state: None,
            payload,
        }
    }

    /// Build from a JSON object. A `$state` member sets the explicit state.
    pub fn from_value(type_name: impl Into<String>, value: Value) -> ModelResult<Self> {
        let mut payload = match value {
            Value::Object(map) => map,
            other => {
                return Err(ModelError::Serialization(format!(
                    "Expected an object, found {}",
                    other
                )))
            }
        };

        let state = match payload.remove("$state") {
            None | Some(Value::Null) => None,
            Some(value) => {
                let code = value
                    .as_u64()
                    .and_then(|c| u8::try_from(c).ok())
                    .and_then(ObjectState::from_code)
                    .ok_or_else(|| {
                        ModelError::Serialization(format!("Invalid object state {}", value))
                    })?;
                Some(code)
            }
        };

        Ok(Self {
            type_name: type_name.into(),
            state,
            payload,
        })
    }

    pub fn with_state(mut self, state: ObjectState) -> Self {
        self.state = Some(state);
        self
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.payload.get(name)
    }

    pub fn set(&mut self, name: impl Into<String>, value: Value) {
        self.payload.insert(name.into(), value);
    }

    /// Value of the key attribute when present and not null
    pub fn key_value(&self, key: &str) -> Option<&Value> {
        self.payload.get(key).filter(|v| !v.is_null())
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.payload)
    }
}

impl From<DataObject> for Map<String, Value> {
    fn from(object: DataObject) -> Self {
        object.payload
    }
}
