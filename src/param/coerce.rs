//! Coercion of raw command-line tokens and structured payload values into typed values.
//!
//! Both paths accept exactly the same value set for a given type so the parser and the
//! schema never disagree. Unions try alternatives in declaration order.

use super::value_type::{Definitions, ValueType};
use serde_json::{Map, Number, Value};

/// Why a value was rejected.
#[derive(Debug, Clone, PartialEq)]
pub enum CoerceError {
    /// The value is not of the expected shape.
    Type(String),
    /// The value has the right shape but is outside the allowed set (e.g. not an enum choice).
    Constraint(String),
}

impl CoerceError {
    pub fn reason(&self) -> &str {
        match self {
            CoerceError::Type(reason) | CoerceError::Constraint(reason) => reason,
        }
    }
}

/// Token spelling of the absent value for `optional[T]`.
pub const NULL_TOKEN: &str = "null";

/// Coerce one command-line token.
pub fn coerce_token(
    ty: &ValueType,
    token: &str,
    definitions: &Definitions,
) -> Result<Value, CoerceError> {
    match ty {
        ValueType::String | ValueType::Path => Ok(Value::String(token.to_string())),
        ValueType::Integer => parse_integer(token)
            .ok_or_else(|| CoerceError::Type(format!("'{}' is not a valid integer", token))),
        ValueType::Float => parse_float(token)
            .ok_or_else(|| CoerceError::Type(format!("'{}' is not a valid number", token))),
        ValueType::Boolean => match token {
            "true" => Ok(Value::Bool(true)),
            "false" => Ok(Value::Bool(false)),
            _ => Err(CoerceError::Type(format!(
                "'{}' is not a boolean (expected true or false)",
                token
            ))),
        },
        ValueType::Enum(choices) => {
            if choices.iter().any(|c| c == token) {
                Ok(Value::String(token.to_string()))
            } else {
                Err(not_a_choice(token, choices))
            }
        }
        ValueType::Optional(inner) => {
            if token == NULL_TOKEN {
                Ok(Value::Null)
            } else {
                coerce_token(inner, token, definitions)
            }
        }
        ValueType::Array(_) | ValueType::Object(_) => {
            let parsed: Value = serde_json::from_str(token).map_err(|e| {
                CoerceError::Type(format!("'{}' is not valid JSON for {}: {}", token, ty, e))
            })?;
            check_value(ty, &parsed, definitions)
        }
        ValueType::Union(alternatives) => first_match(alternatives, |alt| {
            coerce_token(alt, token, definitions)
        }),
        ValueType::Named(_) => {
            let target = ty
                .resolve(definitions)
                .map_err(|e| CoerceError::Type(e.to_string()))?;
            coerce_token(target, token, definitions)
        }
    }
}

/// Check (and normalise) a structured payload value.
pub fn check_value(
    ty: &ValueType,
    value: &Value,
    definitions: &Definitions,
) -> Result<Value, CoerceError> {
    match ty {
        ValueType::String | ValueType::Path => match value {
            Value::String(_) => Ok(value.clone()),
            other => Err(expected("a string", other)),
        },
        ValueType::Integer => match value {
            Value::Number(n) => integral(n).ok_or_else(|| expected("an integer", value)),
            other => Err(expected("an integer", other)),
        },
        ValueType::Float => match value {
            Value::Number(_) => Ok(value.clone()),
            other => Err(expected("a number", other)),
        },
        ValueType::Boolean => match value {
            Value::Bool(_) => Ok(value.clone()),
            other => Err(expected("a boolean", other)),
        },
        ValueType::Enum(choices) => match value {
            Value::String(s) if choices.iter().any(|c| c == s) => Ok(value.clone()),
            Value::String(s) => Err(not_a_choice(s, choices)),
            other => Err(expected("a string", other)),
        },
        ValueType::Optional(inner) => match value {
            Value::Null => Ok(Value::Null),
            other => check_value(inner, other, definitions),
        },
        ValueType::Array(item) => match value {
            Value::Array(items) => items
                .iter()
                .map(|v| check_value(item, v, definitions))
                .collect::<Result<Vec<_>, _>>()
                .map(Value::Array),
            other => Err(expected("an array", other)),
        },
        ValueType::Object(fields) => match value {
            Value::Object(map) => {
                if let Some(unknown) = map.keys().find(|k| !fields.iter().any(|f| &f.name == *k)) {
                    return Err(CoerceError::Type(format!("unknown field '{}'", unknown)));
                }
                let mut out = Map::new();
                for field in fields {
                    match map.get(&field.name) {
                        Some(v) => {
                            let checked = check_value(&field.value_type, v, definitions)
                                .map_err(|e| nested(&field.name, e))?;
                            out.insert(field.name.clone(), checked);
                        }
                        None if field.required => {
                            return Err(CoerceError::Type(format!(
                                "missing required field '{}'",
                                field.name
                            )))
                        }
                        None => {}
                    }
                }
                Ok(Value::Object(out))
            }
            other => Err(expected("an object", other)),
        },
        ValueType::Union(alternatives) => {
            first_match(alternatives, |alt| check_value(alt, value, definitions))
        }
        ValueType::Named(_) => {
            let target = ty
                .resolve(definitions)
                .map_err(|e| CoerceError::Type(e.to_string()))?;
            check_value(target, value, definitions)
        }
    }
}

/// Try each alternative in order; the first success wins. When every alternative fails,
/// a constraint failure is preferred over a type failure because it is more specific.
pub(crate) fn first_match<F>(alternatives: &[ValueType], mut attempt: F) -> Result<Value, CoerceError>
where
    F: FnMut(&ValueType) -> Result<Value, CoerceError>,
{
    let mut constraint_failure = None;
    for alternative in alternatives {
        match attempt(alternative) {
            Ok(value) => return Ok(value),
            Err(CoerceError::Constraint(reason)) => {
                constraint_failure.get_or_insert(reason);
            }
            Err(CoerceError::Type(_)) => {}
        }
    }
    match constraint_failure {
        Some(reason) => Err(CoerceError::Constraint(reason)),
        None => {
            let names: Vec<String> = alternatives.iter().map(|a| a.to_string()).collect();
            Err(CoerceError::Type(format!(
                "value matches none of: {}",
                names.join(", ")
            )))
        }
    }
}

/// Spell a value as a single token that [`coerce_token`] reads back.
pub fn render_token(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => NULL_TOKEN.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        other => other.to_string(),
    }
}

fn parse_integer(token: &str) -> Option<Value> {
    if let Ok(i) = token.parse::<i64>() {
        return Some(Value::from(i));
    }
    let f = token.parse::<f64>().ok()?;
    Number::from_f64(f).and_then(|n| integral(&n))
}

fn parse_float(token: &str) -> Option<Value> {
    let f = token.parse::<f64>().ok()?;
    if !f.is_finite() {
        return None;
    }
    Number::from_f64(f).map(Value::Number)
}

/// Signed 64-bit integers, plus floats with no fractional part in that range (JSON does not
/// distinguish `3` and `3.0`).
fn integral(n: &Number) -> Option<Value> {
    if n.is_i64() {
        return Some(Value::Number(n.clone()));
    }
    let f = n.as_f64()?;
    if f.is_finite() && f.fract() == 0.0 && f >= i64::MIN as f64 && f < i64::MAX as f64 {
        Some(Value::from(f as i64))
    } else {
        None
    }
}

fn expected(what: &str, got: &Value) -> CoerceError {
    CoerceError::Type(format!("expected {}, got {}", what, kind_of(got)))
}

fn not_a_choice(got: &str, choices: &[String]) -> CoerceError {
    CoerceError::Constraint(format!(
        "'{}' is not one of: {}",
        got,
        choices.join(", ")
    ))
}

fn nested(field: &str, err: CoerceError) -> CoerceError {
    match err {
        CoerceError::Type(reason) => CoerceError::Type(format!("{}: {}", field, reason)),
        CoerceError::Constraint(reason) => {
            CoerceError::Constraint(format!("{}: {}", field, reason))
        }
    }
}

pub(crate) fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
