//! Validated argument map handed to a handler.

use super::descriptor::OperationDescriptor;
use super::handler::OperationFailure;
use crate::taxonomy::{codes, ContractError};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};

/// Parameter name to typed value, in declaration order. Defaults are already applied.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Arguments(Map<String, Value>);

impl Arguments {
    pub fn new() -> Self {
        Self(Map::new())
    }

    /// Validate a structured payload against the descriptor's visible parameters.
    ///
    /// Applies the same admission rules as the command-line grammar: unknown keys,
    /// missing required values, type and constraint failures all carry the field name.
    pub fn from_payload(descriptor: &OperationDescriptor, payload: &Value) -> Result<Self, ContractError> {
        let map = match payload {
            Value::Object(map) => map,
            Value::Null => return Self::from_payload(descriptor, &Value::Object(Map::new())),
            other => {
                return Err(ContractError::new(
                    codes::MALFORMED_PAYLOAD,
                    format!(
                        "Arguments for '{}' must be an object, got {}",
                        descriptor.name(),
                        crate::param::coerce::kind_of(other)
                    ),
                ))
            }
        };

        if let Some(unknown) = map
            .keys()
            .find(|key| descriptor.visible_parameters().all(|p| p.name() != key.as_str()))
        {
            return Err(ContractError::unknown_argument(
                unknown,
                format!("Unknown parameter '{}' for '{}'", unknown, descriptor.name()),
            ));
        }

        let definitions = descriptor.definitions();
        let mut arguments = Arguments::new();
        for parameter in descriptor.visible_parameters() {
            let value = match (map.get(parameter.name()), parameter.default()) {
                (Some(value), _) => parameter.admit_value(value, definitions)?,
                (None, Some(default)) => default.clone(),
                (None, None) => return Err(ContractError::missing_required(parameter.name())),
            };
            arguments.insert(parameter.name(), value);
        }
        Ok(arguments)
    }

    pub fn insert(&mut self, name: impl Into<String>, value: Value) {
        self.0.insert(name.into(), value);
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }

    pub fn get_str(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(Value::as_str)
    }

    pub fn get_i64(&self, name: &str) -> Option<i64> {
        self.get(name).and_then(Value::as_i64)
    }

    pub fn get_f64(&self, name: &str) -> Option<f64> {
        self.get(name).and_then(Value::as_f64)
    }

    pub fn get_bool(&self, name: &str) -> Option<bool> {
        self.get(name).and_then(Value::as_bool)
    }

    /// Deserialize one argument into a concrete type.
    pub fn parse<T: DeserializeOwned>(&self, name: &str) -> Result<T, OperationFailure> {
        let value = self.get(name).cloned().unwrap_or(Value::Null);
        serde_json::from_value(value)
            .map_err(|e| OperationFailure::new(format!("argument '{}' has an unexpected shape: {}", name, e)))
    }

    /// Copy with secret values replaced, for logs and echoes.
    pub fn redacted(&self, descriptor: &OperationDescriptor) -> Value {
        let map = self
            .0
            .iter()
            .map(|(name, value)| {
                let shown = match descriptor.parameter(name) {
                    Some(parameter) => parameter.redact(value),
                    None => value.clone(),
                };
                (name.clone(), shown)
            })
            .collect();
        Value::Object(map)
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.0)
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }
}

impl From<Map<String, Value>> for Arguments {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}
