//! Property-based tests for envelope encoding: purity, exclusivity and exit codes.

use opspec::envelope::{encode, OutputMode, Outcome};
use opspec::taxonomy::{ContractError, ErrorCategory, ErrorCode};
use proptest::prelude::*;
use serde_json::Value;

fn json_value() -> impl Strategy<Value = Value> {
    let leaf = prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::Bool),
        any::<i64>().prop_map(Value::from),
        "[ -~]{0,12}".prop_map(Value::String),
    ];
    leaf.prop_recursive(3, 24, 4, |inner| {
        prop_oneof![
            proptest::collection::vec(inner.clone(), 0..4).prop_map(Value::Array),
            proptest::collection::btree_map("[a-z]{1,6}", inner, 0..4)
                .prop_map(|map| Value::Object(map.into_iter().collect())),
        ]
    })
}

fn outcome() -> impl Strategy<Value = Outcome> {
    let success = json_value().prop_map(|value| Outcome::success("op", Some("1.0.0".to_string()), value));
    let failure = (0..ErrorCategory::ALL.len(), 1u16..10000, "[ -~]{1,30}").prop_map(|(index, number, message)| {
        let code = ErrorCode::new(ErrorCategory::ALL[index], number);
        Outcome::failure("op", Some("1.0.0".to_string()), ContractError::new(code, message))
    });
    prop_oneof![success, failure]
}

fn modes() -> impl Strategy<Value = OutputMode> {
    prop_oneof![
        Just(OutputMode::Human),
        Just(OutputMode::Structured),
        Just(OutputMode::StructuredStream),
        Just(OutputMode::Plain),
    ]
}

/// Encoding the same outcome twice yields the same bytes.
#[test]
fn test_encoding_is_pure() {
    let mut runner = proptest::test_runner::TestRunner::default();
    runner
        .run(&(outcome(), modes()), |(outcome, mode)| {
            prop_assert_eq!(encode(&outcome, mode), encode(&outcome, mode));
            Ok(())
        })
        .unwrap();
}

/// A structured envelope carries exactly one of `result` and `error`, and only on the
/// primary channel.
#[test]
fn test_structured_envelope_exclusivity() {
    let mut runner = proptest::test_runner::TestRunner::default();
    runner
        .run(&outcome(), |outcome| {
            let rendered = encode(&outcome, OutputMode::Structured);
            prop_assert!(rendered.secondary.is_empty());
            prop_assert_eq!(rendered.primary_str().lines().count(), 1);

            let envelope: Value = serde_json::from_str(rendered.primary_str()).unwrap();
            let has_result = envelope.get("result").is_some();
            let has_error = envelope.get("error").is_some();
            prop_assert!(has_result != has_error);
            prop_assert_eq!(envelope["ok"].as_bool(), Some(has_result));
            prop_assert_eq!(outcome.is_success(), has_result);
            Ok(())
        })
        .unwrap();
}

/// Stream mode emits one envelope per item of a non-empty list, otherwise exactly one.
#[test]
fn test_stream_envelope_count() {
    let mut runner = proptest::test_runner::TestRunner::default();
    runner
        .run(&outcome(), |outcome| {
            let rendered = encode(&outcome, OutputMode::StructuredStream);
            let expected = match &outcome.result {
                Ok(Value::Array(items)) if !items.is_empty() => items.len(),
                _ => 1,
            };
            prop_assert_eq!(rendered.primary_str().lines().count(), expected);
            Ok(())
        })
        .unwrap();
}

/// Exit codes follow the category, and text modes keep errors off the primary channel.
#[test]
fn test_exit_codes_and_channels() {
    let mut runner = proptest::test_runner::TestRunner::default();
    runner
        .run(&(outcome(), prop_oneof![Just(OutputMode::Human), Just(OutputMode::Plain)]), |(outcome, mode)| {
            let rendered = encode(&outcome, mode);
            match outcome.error() {
                None => prop_assert_eq!(outcome.exit_code(), 0),
                Some(error) => {
                    prop_assert_eq!(outcome.exit_code(), error.category().exit_code());
                    prop_assert_eq!(error.code.to_string().chars().next(), Some(error.category().letter()));
                    prop_assert!(rendered.primary.is_empty());
                    prop_assert!(rendered.secondary_str().contains(&error.code.to_string()));
                }
            }
            Ok(())
        })
        .unwrap();
}
