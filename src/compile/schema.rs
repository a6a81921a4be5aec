//! Schema Compiler: a self-contained JSON Schema for an operation.
//!
//! Output never contains `$ref`: named definitions and local JSON-pointer references are
//! inlined by value. Properties follow declaration order, so compiling the same descriptor
//! twice yields identical bytes.
//!
//! Constraints are emitted on the branch they apply to. A union with `max=2` becomes
//! `anyOf[{string, maxLength:2}, {integer, maximum:2}]`, which accepts exactly the values
//! the parser accepts.

use crate::error::SchemaError;
use crate::operation::{OperationDescriptor, ReturnShape};
use crate::param::{Constraints, Definitions, Parameter, ValueType};
use serde_json::{json, Map, Number, Value};

/// JSON Schema dialect declared by compiled input schemas.
pub const DIALECT: &str = "https://json-schema.org/draft/2020-12/schema";

/// Keywords whose values are data, not subschemas.
const LITERAL_KEYWORDS: &[&str] = &[
    "enum", "const", "default", "examples", "required", "description", "title", "type",
    "pattern", "format", "$comment",
];

/// Keywords whose values map names to subschemas.
const SCHEMA_MAPS: &[&str] = &["properties", "patternProperties", "dependentSchemas"];

/// Definition tables dropped once every reference is inlined.
const DEFINITION_TABLES: &[&str] = &["$defs", "definitions"];

/// Full tool contract: identity, hints, input and output schemas, declared errors.
pub fn compile_schema(descriptor: &OperationDescriptor) -> Result<Value, SchemaError> {
    let mut schema = Map::new();
    schema.insert("name".to_string(), json!(descriptor.name()));
    schema.insert("version".to_string(), json!(descriptor.version()));
    schema.insert("description".to_string(), json!(descriptor.documentation()));
    schema.insert("annotations".to_string(), descriptor.annotations().hints());
    schema.insert("input_schema".to_string(), input_schema(descriptor));
    if let Some(output) = output_schema(descriptor)? {
        schema.insert("output_schema".to_string(), output);
    }
    let errors: Vec<Value> = descriptor
        .declared_errors()
        .iter()
        .map(|(code, declared)| {
            json!({
                "code": code.to_string(),
                "category": code.category(),
                "retryable": declared.retryable.unwrap_or(code.category().default_retryable()),
                "description": declared.documentation,
            })
        })
        .collect();
    schema.insert("errors".to_string(), Value::Array(errors));
    if !descriptor.capabilities().is_empty() {
        schema.insert("capabilities".to_string(), json!(descriptor.capabilities()));
    }
    if let Some(message) = descriptor.deprecated() {
        schema.insert("deprecated".to_string(), json!(message));
    }
    Ok(Value::Object(schema))
}

/// Object schema for the visible parameters. Injected parameters are omitted.
pub fn input_schema(descriptor: &OperationDescriptor) -> Value {
    let definitions = descriptor.definitions();
    let mut properties = Map::new();
    let mut required = Vec::new();
    for parameter in descriptor.visible_parameters() {
        properties.insert(
            parameter.name().to_string(),
            parameter_schema(parameter, definitions),
        );
        if parameter.required() {
            required.push(json!(parameter.name()));
        }
    }
    json!({
        "$schema": DIALECT,
        "type": "object",
        "properties": properties,
        "required": required,
        "additionalProperties": false,
    })
}

/// Return-value schema, if the operation declares one.
pub fn output_schema(descriptor: &OperationDescriptor) -> Result<Option<Value>, SchemaError> {
    match descriptor.return_shape() {
        Some(ReturnShape::Type(value_type)) => Ok(Some(type_schema(
            value_type,
            &Constraints::default(),
            descriptor.definitions(),
        ))),
        Some(ReturnShape::Schema(schema)) => inline_refs(schema).map(Some),
        None => Ok(None),
    }
}

fn parameter_schema(parameter: &Parameter, definitions: &Definitions) -> Value {
    let mut schema = type_schema(parameter.value_type(), parameter.constraints(), definitions);
    if let Value::Object(map) = &mut schema {
        if let Some(doc) = parameter.documentation() {
            map.insert("description".to_string(), json!(doc));
        }
        if parameter.is_secret() {
            map.insert("writeOnly".to_string(), json!(true));
        } else if let Some(default) = parameter.default() {
            map.insert("default".to_string(), default.clone());
        }
    }
    schema
}

/// Schema for a structural type with the given value constraints.
pub fn type_schema(value_type: &ValueType, constraints: &Constraints, definitions: &Definitions) -> Value {
    let mut map = Map::new();
    match value_type {
        ValueType::String | ValueType::Path | ValueType::Enum(_) => {
            map.insert("type".to_string(), json!("string"));
            match value_type {
                ValueType::Path => {
                    map.insert("format".to_string(), json!("path"));
                }
                ValueType::Enum(choices) => {
                    map.insert("enum".to_string(), json!(choices));
                }
                _ => {}
            }
            bounds(&mut map, constraints, "minLength", "maxLength");
            if let Some(pattern) = &constraints.pattern {
                map.insert("pattern".to_string(), json!(pattern.as_str()));
            }
        }
        ValueType::Integer => {
            // Integers are signed 64-bit; declared bounds only ever narrow that range.
            map.insert("type".to_string(), json!("integer"));
            let minimum = match constraints.min {
                Some(min) if min > i64::MIN as f64 => number(min),
                _ => json!(i64::MIN),
            };
            let maximum = match constraints.max {
                Some(max) if max < i64::MAX as f64 => number(max),
                _ => json!(i64::MAX),
            };
            map.insert("minimum".to_string(), minimum);
            map.insert("maximum".to_string(), maximum);
        }
        ValueType::Float => {
            map.insert("type".to_string(), json!("number"));
            bounds(&mut map, constraints, "minimum", "maximum");
        }
        ValueType::Boolean => {
            map.insert("type".to_string(), json!("boolean"));
        }
        ValueType::Optional(inner) => {
            map.insert(
                "anyOf".to_string(),
                json!([type_schema(inner, constraints, definitions), {"type": "null"}]),
            );
        }
        ValueType::Array(item) => {
            map.insert("type".to_string(), json!("array"));
            map.insert("items".to_string(), item_schema(item, constraints, definitions));
            bounds(&mut map, constraints, "minItems", "maxItems");
        }
        ValueType::Object(fields) => {
            let mut properties = Map::new();
            let mut required = Vec::new();
            for field in fields {
                let mut schema = type_schema(&field.value_type, &Constraints::default(), definitions);
                if let (Some(doc), Value::Object(field_map)) = (&field.documentation, &mut schema) {
                    field_map.insert("description".to_string(), json!(doc));
                }
                properties.insert(field.name.clone(), schema);
                if field.required {
                    required.push(json!(field.name));
                }
            }
            map.insert("type".to_string(), json!("object"));
            map.insert("properties".to_string(), Value::Object(properties));
            map.insert("required".to_string(), Value::Array(required));
            map.insert("additionalProperties".to_string(), json!(false));
        }
        ValueType::Union(alternatives) => {
            let branches: Vec<Value> = alternatives
                .iter()
                .map(|alternative| type_schema(alternative, constraints, definitions))
                .collect();
            map.insert("anyOf".to_string(), Value::Array(branches));
        }
        ValueType::Named(name) => {
            // References were checked at registration; an unknown name cannot reach here.
            return match definitions.get(name) {
                Some(target) => type_schema(target, constraints, definitions),
                None => json!({}),
            };
        }
    }
    Value::Object(map)
}

/// Array items only inherit the pattern, and only where the item is a string.
fn item_schema(item: &ValueType, constraints: &Constraints, definitions: &Definitions) -> Value {
    match item {
        ValueType::String | ValueType::Path | ValueType::Enum(_) => {
            type_schema(item, &constraints.pattern_only(), definitions)
        }
        ValueType::Optional(inner) => json!({
            "anyOf": [item_schema(inner, constraints, definitions), {"type": "null"}]
        }),
        ValueType::Union(alternatives) => {
            let branches: Vec<Value> = alternatives
                .iter()
                .map(|alternative| item_schema(alternative, constraints, definitions))
                .collect();
            json!({ "anyOf": branches })
        }
        ValueType::Named(name) => match definitions.get(name) {
            Some(target) => item_schema(target, constraints, definitions),
            None => json!({}),
        },
        other => type_schema(other, &Constraints::default(), definitions),
    }
}

fn bounds(map: &mut Map<String, Value>, constraints: &Constraints, min_key: &str, max_key: &str) {
    if let Some(min) = constraints.min {
        map.insert(min_key.to_string(), number(min));
    }
    if let Some(max) = constraints.max {
        map.insert(max_key.to_string(), number(max));
    }
}

/// Integral bounds render without a fraction (`5`, not `5.0`).
fn number(value: f64) -> Value {
    if value.fract() == 0.0 && value.abs() < 9.0e15 {
        json!(value as i64)
    } else {
        Number::from_f64(value).map(Value::Number).unwrap_or(Value::Null)
    }
}

/// Dereference every local `$ref` in a raw schema and drop its definition tables.
///
/// Sibling keywords next to a `$ref` override the referenced schema's keywords.
/// Fails on cyclic, unresolvable, or non-local references.
pub fn inline_refs(schema: &Value) -> Result<Value, SchemaError> {
    let mut stack = Vec::new();
    resolve_schema(schema, schema, &mut stack)
}

fn resolve_schema(node: &Value, root: &Value, stack: &mut Vec<String>) -> Result<Value, SchemaError> {
    let Value::Object(map) = node else {
        return Ok(node.clone());
    };

    if let Some(Value::String(reference)) = map.get("$ref") {
        let pointer = reference
            .strip_prefix('#')
            .ok_or_else(|| SchemaError::UnsupportedRef(reference.clone()))?;
        if stack.contains(reference) {
            let mut path = stack.clone();
            path.push(reference.clone());
            return Err(SchemaError::Cycle(path.join(" -> ")));
        }
        let target = root
            .pointer(pointer)
            .ok_or_else(|| SchemaError::UnresolvedRef(reference.clone()))?;
        stack.push(reference.clone());
        let resolved = resolve_schema(target, root, stack)?;
        stack.pop();

        let siblings: Vec<(&String, &Value)> = map
            .iter()
            .filter(|(k, _)| k.as_str() != "$ref" && !DEFINITION_TABLES.contains(&k.as_str()))
            .collect();
        if siblings.is_empty() {
            return Ok(resolved);
        }
        let mut merged = match resolved {
            Value::Object(resolved_map) => resolved_map,
            other => {
                // Boolean schemas cannot carry siblings; wrap them.
                let mut wrapper = Map::new();
                wrapper.insert("allOf".to_string(), json!([other]));
                wrapper
            }
        };
        for (key, value) in siblings {
            merged.insert(key.clone(), resolve_keyword(key, value, root, stack)?);
        }
        return Ok(Value::Object(merged));
    }

    let mut out = Map::new();
    for (key, value) in map {
        if DEFINITION_TABLES.contains(&key.as_str()) {
            continue;
        }
        out.insert(key.clone(), resolve_keyword(key, value, root, stack)?);
    }
    Ok(Value::Object(out))
}

fn resolve_keyword(key: &str, value: &Value, root: &Value, stack: &mut Vec<String>) -> Result<Value, SchemaError> {
    if LITERAL_KEYWORDS.contains(&key) {
        return Ok(value.clone());
    }
    match value {
        Value::Object(entries) if SCHEMA_MAPS.contains(&key) => {
            let mut out = Map::new();
            for (name, subschema) in entries {
                out.insert(name.clone(), resolve_schema(subschema, root, stack)?);
            }
            Ok(Value::Object(out))
        }
        Value::Object(_) => resolve_schema(value, root, stack),
        Value::Array(items) => items
            .iter()
            .map(|item| resolve_schema(item, root, stack))
            .collect::<Result<Vec<_>, _>>()
            .map(Value::Array),
        other => Ok(other.clone()),
    }
}

/// True if any `$ref` keyword remains in the schema. Property names and literal data
/// (`default`, `enum`, ...) are not keywords and never count.
pub fn contains_ref(value: &Value) -> bool {
    match value {
        Value::Object(map) => map.iter().any(|(key, value)| keyword_contains_ref(key, value)),
        Value::Array(items) => items.iter().any(contains_ref),
        _ => false,
    }
}

fn keyword_contains_ref(key: &str, value: &Value) -> bool {
    if key == "$ref" {
        return true;
    }
    if LITERAL_KEYWORDS.contains(&key) {
        return false;
    }
    match value {
        Value::Object(entries) if SCHEMA_MAPS.contains(&key) => entries.values().any(contains_ref),
        other => contains_ref(other),
    }
}
