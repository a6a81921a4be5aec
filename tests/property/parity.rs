//! Property-based tests: the token grammar, the payload path and the compiled schema
//! accept the same values.

use opspec::compile::{compile_schema, Grammar};
use opspec::operation::{Arguments, OperationDescriptor};
use opspec::param::{parse_type, Parameter, ValueType};
use proptest::prelude::*;
use serde_json::{json, Map, Value};
use std::sync::atomic::{AtomicUsize, Ordering};

fn record() -> OperationDescriptor {
    OperationDescriptor::builder("record")
        .doc("Store a record.")
        .param(Parameter::positional("id", ValueType::Integer).min(-1000.0).max(1000.0))
        .param(Parameter::positional("label", ValueType::String))
        .param(Parameter::named("ratio", ValueType::Float).default(1.0))
        .param(Parameter::named("loud", ValueType::Boolean).default(false))
        .param(Parameter::named("level", parse_type("enum[low, mid, high]").unwrap()).default("low"))
        .param(Parameter::named("tags", parse_type("list[str]").unwrap()).default(json!([])))
        .param(Parameter::named("limit", parse_type("optional[int]").unwrap()).default(Value::Null))
        .build()
        .unwrap()
}

fn level() -> impl Strategy<Value = String> {
    prop_oneof![Just("low"), Just("mid"), Just("high")].prop_map(str::to_string)
}

fn arguments(
    id: i64,
    label: String,
    ratio: f64,
    loud: bool,
    level: String,
    tags: Vec<String>,
    limit: Option<i64>,
) -> Arguments {
    let mut map = Map::new();
    map.insert("id".to_string(), json!(id));
    map.insert("label".to_string(), json!(label));
    map.insert("ratio".to_string(), json!(ratio));
    map.insert("loud".to_string(), json!(loud));
    map.insert("level".to_string(), json!(level));
    map.insert("tags".to_string(), json!(tags));
    map.insert("limit".to_string(), json!(limit));
    Arguments::from(map)
}

/// Valid arguments survive token rendering, token parsing, payload admission and schema
/// validation unchanged.
#[test]
fn test_valid_arguments_agree_everywhere() {
    let descriptor = record();
    let grammar = Grammar::compile(&descriptor);
    let schema = compile_schema(&descriptor).unwrap();
    let validator = jsonschema::validator_for(&schema["input_schema"]).unwrap();
    let mut runner = proptest::test_runner::TestRunner::default();

    runner
        .run(
            &(
                -1000i64..=1000,
                any::<String>(),
                -1.0e6f64..1.0e6,
                any::<bool>(),
                level(),
                proptest::collection::vec(any::<String>(), 0..4),
                proptest::option::of(any::<i64>()),
            ),
            |(id, label, ratio, loud, level, tags, limit)| {
                let expected = arguments(id, label, ratio, loud, level, tags, limit);

                let tokens = grammar.render_tokens(&expected);
                let parsed = grammar.parse(&tokens).unwrap();
                prop_assert_eq!(&parsed, &expected, "tokens: {:?}", tokens);

                let payload = expected.clone().into_value();
                let admitted = Arguments::from_payload(&descriptor, &payload).unwrap();
                prop_assert_eq!(&admitted, &expected);

                prop_assert!(validator.is_valid(&payload));
                Ok(())
            },
        )
        .unwrap();
}

/// Bounds are enforced identically by the grammar, the payload path and the schema.
#[test]
fn test_bounds_agree_everywhere() {
    let descriptor = record();
    let grammar = Grammar::compile(&descriptor);
    let schema = compile_schema(&descriptor).unwrap();
    let validator = jsonschema::validator_for(&schema["input_schema"]).unwrap();
    let mut runner = proptest::test_runner::TestRunner::default();

    runner
        .run(&(-5000i64..5000), |id| {
            let token_ok = grammar.parse(&[id.to_string(), "x".to_string()]).is_ok();
            let payload = json!({"id": id, "label": "x"});
            let payload_ok = Arguments::from_payload(&descriptor, &payload).is_ok();
            let schema_ok = validator.is_valid(&payload);

            prop_assert_eq!(token_ok, (-1000..=1000).contains(&id));
            prop_assert_eq!(token_ok, payload_ok);
            prop_assert_eq!(payload_ok, schema_ok);
            Ok(())
        })
        .unwrap();
}

/// Enum membership is decided the same way on every path.
#[test]
fn test_enum_membership_agrees_everywhere() {
    let descriptor = record();
    let grammar = Grammar::compile(&descriptor);
    let schema = compile_schema(&descriptor).unwrap();
    let validator = jsonschema::validator_for(&schema["input_schema"]).unwrap();
    let mut runner = proptest::test_runner::TestRunner::default();

    let candidates = prop_oneof![level(), "[a-z]{0,6}"];
    runner
        .run(&candidates, |choice| {
            let tokens = vec!["1".to_string(), "x".to_string(), format!("--level={}", choice)];
            let token_ok = grammar.parse(&tokens).is_ok();
            let payload = json!({"id": 1, "label": "x", "level": choice});
            let payload_ok = Arguments::from_payload(&descriptor, &payload).is_ok();

            prop_assert_eq!(token_ok, ["low", "mid", "high"].contains(&choice.as_str()));
            prop_assert_eq!(token_ok, payload_ok);
            prop_assert_eq!(payload_ok, validator.is_valid(&payload));
            Ok(())
        })
        .unwrap();
}

/// Unions, arrays of unions, patterns, lengths, shared object types and numbers at the
/// edges of the integer range.
fn shapes() -> OperationDescriptor {
    OperationDescriptor::builder("shapes")
        .doc("Exercise every structural type.")
        .define("Point", parse_type("{x: int, y?: float}").unwrap())
        .param(Parameter::positional("key", parse_type("str | int").unwrap()).max(3.0))
        .param(
            Parameter::named("ids", parse_type("list[str | int]").unwrap())
                .pattern("^a")
                .default(json!([])),
        )
        .param(
            Parameter::named("code", ValueType::String)
                .min(2.0)
                .max(4.0)
                .pattern("^[a-z]+$")
                .default("ab"),
        )
        .param(Parameter::named("origin", ValueType::Named("Point".to_string())).default(json!({"x": 0})))
        .param(Parameter::named("count", ValueType::Integer).default(0))
        .param(Parameter::named("ratio", ValueType::Float).default(0.0))
        .param(Parameter::named("level", parse_type("enum[low, high]").unwrap()).default("low"))
        .build()
        .unwrap()
}

fn scalar() -> impl Strategy<Value = Value> {
    prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::from),
        (-10i64..10).prop_map(Value::from),
        any::<i64>().prop_map(Value::from),
        Just(Value::from(u64::MAX)),
        prop_oneof![
            Just(1e19),
            Just(-1e19),
            Just(9.223372036854775807e18),
            Just(-9.223372036854775808e18),
            Just(3.0),
            Just(2.5),
            Just(-0.5),
        ]
        .prop_map(Value::from),
        any::<f64>().prop_map(Value::from),
        "[a-z0-9]{0,5}".prop_map(Value::from),
    ]
}

fn any_json() -> impl Strategy<Value = Value> {
    scalar().prop_recursive(2, 8, 3, |inner| {
        prop_oneof![
            proptest::collection::vec(inner.clone(), 0..3).prop_map(Value::Array),
            proptest::collection::btree_map("[xyz]", inner, 0..3)
                .prop_map(|fields| Value::Object(fields.into_iter().collect())),
        ]
    })
}

/// Each field is either drawn near its declared type or is an arbitrary JSON value.
fn field(near: impl Strategy<Value = Value> + 'static) -> impl Strategy<Value = Value> {
    prop_oneof![3 => near, 1 => any_json()]
}

fn shapes_payload() -> impl Strategy<Value = Value> {
    let key = prop_oneof!["[a-z0-9]{0,4}".prop_map(Value::from), (-10i64..10).prop_map(Value::from), scalar()];
    let ids = proptest::collection::vec(
        prop_oneof![
            "a[a-z0-9]{0,3}".prop_map(Value::from),
            "[a-z0-9]{0,3}".prop_map(Value::from),
            scalar(),
        ],
        0..4,
    )
    .prop_map(Value::Array);
    let code = "[a-z0-9]{0,5}".prop_map(Value::from);
    let origin = proptest::collection::btree_map("[xyz]", scalar(), 0..3)
        .prop_map(|fields| Value::Object(fields.into_iter().collect()));
    let level = prop_oneof![Just("low"), Just("high"), Just("mid")].prop_map(Value::from);
    (
        proptest::option::weighted(0.9, field(key)),
        proptest::option::of(field(ids)),
        proptest::option::of(field(code)),
        proptest::option::of(field(origin)),
        proptest::option::of(field(scalar())),
        proptest::option::of(field(scalar())),
        proptest::option::of(field(level)),
        proptest::option::weighted(0.05, any_json()),
    )
        .prop_map(|(key, ids, code, origin, count, ratio, level, extra)| {
            let mut payload = Map::new();
            for (name, value) in [
                ("key", key),
                ("ids", ids),
                ("code", code),
                ("origin", origin),
                ("count", count),
                ("ratio", ratio),
                ("level", level),
                ("extra", extra),
            ] {
                if let Some(value) = value {
                    payload.insert(name.to_string(), value);
                }
            }
            Value::Object(payload)
        })
}

/// Over arbitrary payloads, the schema and the payload path accept exactly the same set,
/// and whatever they accept renders to tokens the grammar accepts too.
#[test]
fn test_arbitrary_payloads_agree_everywhere() {
    let descriptor = shapes();
    let grammar = Grammar::compile(&descriptor);
    let schema = compile_schema(&descriptor).unwrap();
    let validator = jsonschema::validator_for(&schema["input_schema"]).unwrap();
    let accepted = AtomicUsize::new(0);
    let mut runner = proptest::test_runner::TestRunner::new(proptest::test_runner::Config {
        cases: 1024,
        ..Default::default()
    });

    runner
        .run(&shapes_payload(), |payload| {
            let admitted = Arguments::from_payload(&descriptor, &payload);
            let schema_ok = validator.is_valid(&payload);
            prop_assert_eq!(
                schema_ok,
                admitted.is_ok(),
                "payload {} admitted as {:?}",
                payload,
                admitted
            );

            if let Ok(arguments) = admitted {
                accepted.fetch_add(1, Ordering::Relaxed);
                let tokens = grammar.render_tokens(&arguments);
                let parsed = grammar.parse(&tokens);
                prop_assert!(parsed.is_ok(), "tokens {:?} rejected: {:?}", tokens, parsed);
                if let Ok(parsed) = parsed {
                    prop_assert!(validator.is_valid(&parsed.into_value()), "tokens {:?}", tokens);
                }
            }
            Ok(())
        })
        .unwrap();

    assert!(accepted.load(Ordering::Relaxed) > 0);
}

