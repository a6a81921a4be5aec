//! Compiled schemas are self-contained and agree with what the dispatcher admits.

use super::support::{calc_registry, primary_json, run_context};
use opspec::compile::compile_schema;
use opspec::dispatch::{Dispatcher, Input, InvocationContext};
use opspec::envelope::OutputMode;
use opspec::operation::{handler_fn, Arguments, CallContext, OperationDescriptor, OperationFailure, Registry};
use opspec::param::{parse_type, Parameter};
use serde_json::{json, Value};
use std::sync::Arc;

fn contains_ref(value: &Value) -> bool {
    match value {
        Value::Object(map) => map.contains_key("$ref") || map.contains_key("$defs") || map.values().any(contains_ref),
        Value::Array(items) => items.iter().any(contains_ref),
        _ => false,
    }
}

async fn echo(args: Arguments, _cx: CallContext) -> Result<Value, OperationFailure> {
    Ok(args.into_value())
}

fn geometry_registry() -> Registry {
    let mut registry = Registry::new("geo");
    registry
        .add(
            OperationDescriptor::builder("shift")
                .doc("Shift a point.")
                .define("Point", parse_type("{x: int, y: int}").unwrap())
                .param(Parameter::positional("origin", parse_type("Point").unwrap()))
                .param(Parameter::named("path", parse_type("list[Point]").unwrap()).default(json!([])))
                .returns_schema(json!({
                    "$defs": {"Point": {"type": "object", "properties": {"x": {"type": "integer"}}}},
                    "type": "array",
                    "items": {"$ref": "#/$defs/Point"}
                })),
            handler_fn(echo),
        )
        .unwrap();
    registry
}

#[test]
fn test_schemas_are_self_contained() {
    for registry in [calc_registry(), geometry_registry()] {
        for handle in registry.operations() {
            let schema = compile_schema(handle.descriptor()).unwrap();
            assert!(!contains_ref(&schema), "{} has references", handle.name());
        }
    }
}

#[test]
fn test_named_definitions_are_inlined() {
    let registry = geometry_registry();
    let schema = compile_schema(registry.get("shift").unwrap().descriptor()).unwrap();
    let origin = &schema["input_schema"]["properties"]["origin"];
    assert_eq!(origin["type"], json!("object"));
    assert_eq!(origin["required"], json!(["x", "y"]));
    assert_eq!(
        schema["input_schema"]["properties"]["path"]["items"]["properties"]["y"]["type"],
        json!("integer")
    );
    assert_eq!(schema["output_schema"]["items"]["properties"]["x"]["type"], json!("integer"));
}

#[test]
fn test_parameter_type_mapping() {
    let registry = calc_registry();
    let schema = compile_schema(registry.get("search").unwrap().descriptor()).unwrap();
    let input = &schema["input_schema"];
    let properties = input["properties"].as_object().unwrap();

    assert_eq!(properties["tags"]["type"], json!("array"));
    assert_eq!(properties["tags"]["items"], json!({"type": "string"}));
    assert_eq!(
        properties["limit"]["anyOf"],
        json!([
            {"type": "integer", "minimum": i64::MIN, "maximum": i64::MAX},
            {"type": "null"}
        ])
    );
    assert_eq!(properties["limit"]["default"], json!(null));
    assert_eq!(properties["mode"]["enum"], json!(["fast", "deep"]));
    assert!(!properties.contains_key("session"));
    assert_eq!(input["required"], json!(["tags"]));
    assert_eq!(input["additionalProperties"], json!(false));
    assert_eq!(
        properties.keys().collect::<Vec<_>>(),
        vec!["tags", "limit", "mode"]
    );
    assert_eq!(schema["annotations"]["readOnlyHint"], json!(true));
}

#[test]
fn test_secrets_are_write_only_without_default() {
    let registry = calc_registry();
    let schema = compile_schema(registry.get("create").unwrap().descriptor()).unwrap();
    let token = &schema["input_schema"]["properties"]["token"];
    assert_eq!(token["writeOnly"], json!(true));
    assert!(token.get("default").is_none());
}

#[test]
fn test_declared_errors_listed() {
    let registry = calc_registry();
    let schema = compile_schema(registry.get("fail").unwrap().descriptor()).unwrap();
    let codes: Vec<&str> = schema["errors"]
        .as_array()
        .unwrap()
        .iter()
        .filter_map(|e| e["code"].as_str())
        .collect();
    assert_eq!(codes, vec!["I0100", "A0100", "S0100", "R0100"]);
}

#[tokio::test]
async fn test_all_schemas_flag_emits_array() {
    let ctx = run_context();
    let response = ctx.run(["--schema", "--output", "structured"]).await;
    assert_eq!(response.exit_code, 0);
    let all = primary_json(&response);
    let names: Vec<&str> = all.as_array().unwrap().iter().filter_map(|s| s["name"].as_str()).collect();
    assert_eq!(names, vec!["add", "search", "create", "fail", "noop"]);
}

#[tokio::test]
async fn test_schema_validation_agrees_with_dispatcher() {
    let registry = Arc::new(calc_registry());
    let dispatcher = Dispatcher::new(Arc::clone(&registry));
    let cx = InvocationContext::new(OutputMode::Structured).dry_run(true);
    let schema = compile_schema(registry.get("search").unwrap().descriptor()).unwrap();
    let validator = jsonschema::validator_for(&schema["input_schema"]).unwrap();

    let payloads = [
        json!({"tags": ["a"]}),
        json!({"tags": [], "limit": null, "mode": "deep"}),
        json!({"tags": ["a"], "limit": 3}),
        json!({"tags": "a"}),
        json!({"tags": ["a"], "limit": 1.5}),
        json!({"tags": ["a"], "mode": "slow"}),
        json!({"tags": ["a"], "extra": 1}),
        json!({"limit": 2}),
    ];
    for payload in payloads {
        let outcome = dispatcher.invoke("search", Input::Payload(payload.clone()), &cx).await;
        assert_eq!(
            validator.is_valid(&payload),
            outcome.is_success(),
            "disagreement on {}",
            payload
        );
    }
}
