//! Property-based tests for determinism guarantees

use opspec::compile::{compile_schema, render_dense, render_verbose, Grammar};
use opspec::operation::{OperationDescriptor, RESERVED_FLAGS};
use opspec::param::{parse_type, Parameter};
use proptest::prelude::*;
use std::collections::BTreeSet;

const TYPES: &[&str] = &[
    "int",
    "float",
    "str",
    "bool",
    "path",
    "list[int]",
    "optional[str]",
    "enum[red, green, blue]",
    "{x: int, y?: str}",
    "int | str",
];

/// (name, type index, positional, documentation)
type ParamSpec = (String, usize, bool, Option<String>);

fn param_specs() -> impl Strategy<Value = Vec<ParamSpec>> {
    proptest::collection::vec(
        (
            "[a-z][a-z0-9_]{0,8}",
            0..TYPES.len(),
            any::<bool>(),
            proptest::option::of("[ -~]{0,40}"),
        ),
        0..6,
    )
}

/// Build a descriptor from specs; `None` when the combination is not registrable.
fn build(doc: &str, specs: &[ParamSpec]) -> Option<OperationDescriptor> {
    let mut seen = BTreeSet::new();
    let mut builder = OperationDescriptor::builder("generated").doc(doc);
    for (name, type_index, positional, documentation) in specs {
        if RESERVED_FLAGS.contains(&name.replace('_', "-").as_str()) || !seen.insert(name.clone()) {
            continue;
        }
        let value_type = parse_type(TYPES[*type_index]).ok()?;
        let mut param = if *positional {
            Parameter::positional(name.clone(), value_type)
        } else {
            Parameter::named(name.clone(), value_type)
        };
        if let Some(documentation) = documentation {
            param = param.doc(documentation.clone());
        }
        builder = builder.param(param);
    }
    builder.build().ok()
}

/// Two independently built descriptors from the same declaration project to
/// byte-identical schemas, help and usage.
#[test]
fn test_projection_determinism_property() {
    let mut runner = proptest::test_runner::TestRunner::default();

    runner
        .run(&("[ -~]{0,60}", param_specs()), |(doc, specs)| {
            let (Some(first), Some(second)) = (build(&doc, &specs), build(&doc, &specs)) else {
                return Ok(());
            };

            let schema_a = serde_json::to_string(&compile_schema(&first).unwrap()).unwrap();
            let schema_b = serde_json::to_string(&compile_schema(&second).unwrap()).unwrap();
            prop_assert_eq!(schema_a, schema_b);

            prop_assert_eq!(render_verbose(&first, "app"), render_verbose(&second, "app"));
            prop_assert_eq!(render_dense(&first), render_dense(&second));
            let grammar_a = Grammar::compile(&first);
            let grammar_b = Grammar::compile(&second);
            prop_assert_eq!(grammar_a.usage(), grammar_b.usage());
            Ok(())
        })
        .unwrap();
}

/// Schema properties follow declaration order.
#[test]
fn test_schema_property_order_property() {
    let mut runner = proptest::test_runner::TestRunner::default();

    runner
        .run(&param_specs(), |specs| {
            let Some(descriptor) = build("Generated.", &specs) else {
                return Ok(());
            };
            let schema = compile_schema(&descriptor).unwrap();
            let compiled: Vec<String> = schema["input_schema"]["properties"]
                .as_object()
                .unwrap()
                .keys()
                .cloned()
                .collect();
            let declared: Vec<String> = descriptor
                .visible_parameters()
                .map(|p| p.name().to_string())
                .collect();
            prop_assert_eq!(compiled, declared);
            Ok(())
        })
        .unwrap();
}
