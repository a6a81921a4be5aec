//! End-to-end invocation scenarios through the CLI route and the dispatcher.

use super::support::{calc_registry, primary_json, primary_lines, run_context, CREATE_CALLS};
use opspec::cli::RunContext;
use opspec::config::EngineConfig;
use opspec::dispatch::{CapabilityPolicy, Dispatcher, Input, InvocationContext};
use opspec::envelope::OutputMode;
use opspec::taxonomy::ErrorCategory;
use serde_json::json;
use std::sync::atomic::Ordering;
use std::sync::Arc;

#[tokio::test]
async fn test_add_structured_envelope() {
    let ctx = run_context();
    let response = ctx.run(["add", "3", "--output", "structured"]).await;
    assert_eq!(response.exit_code, 0);
    assert!(response.rendered.secondary.is_empty());

    let envelope = primary_json(&response);
    assert_eq!(envelope["ok"], json!(true));
    assert_eq!(envelope["result"], json!(3));
    assert!(envelope.get("error").is_none());
    assert_eq!(envelope["meta"]["operation"], json!("add"));
    assert_eq!(envelope["meta"]["version"], json!("1.0.0"));
    assert_eq!(envelope["meta"]["annotations"], json!(["read_only", "idempotent"]));
}

#[tokio::test]
async fn test_missing_required_never_executes() {
    let ctx = run_context();
    let response = ctx.run(["add", "--b", "2", "--output", "structured"]).await;
    assert_eq!(response.exit_code, 2);

    let envelope = primary_json(&response);
    assert_eq!(envelope["ok"], json!(false));
    assert!(envelope.get("result").is_none());
    assert_eq!(envelope["error"]["code"], json!("I0001"));
    assert_eq!(envelope["error"]["category"], json!("Input"));
    assert_eq!(envelope["error"]["field"], json!("a"));
}

#[tokio::test]
async fn test_type_and_unknown_flag_errors() {
    let ctx = run_context();
    let response = ctx.run(["add", "three", "--output", "structured"]).await;
    assert_eq!(primary_json(&response)["error"]["code"], json!("I0003"));

    let response = ctx.run(["add", "3", "--c", "1", "--output", "structured"]).await;
    let envelope = primary_json(&response);
    assert_eq!(envelope["error"]["code"], json!("I0002"));
    assert_eq!(envelope["error"]["field"], json!("c"));

    let response = ctx
        .run(["search", "--tags", "x", "--mode", "slow", "--output", "structured"])
        .await;
    let envelope = primary_json(&response);
    assert_eq!(envelope["error"]["code"], json!("I0004"));
    assert_eq!(envelope["error"]["field"], json!("mode"));
}

#[tokio::test]
async fn test_unknown_operation_suggests_closest() {
    let ctx = run_context();
    let response = ctx.run(["ad", "1", "--output", "structured"]).await;
    assert_eq!(response.exit_code, 2);
    let envelope = primary_json(&response);
    assert_eq!(envelope["error"]["code"], json!("I0005"));
    assert_eq!(envelope["meta"]["version"], json!(null));
    assert_eq!(envelope["error"]["suggestion"]["command"], json!("calc add --help"));
}

#[tokio::test]
async fn test_human_mode_routes_errors_to_secondary() {
    let ctx = run_context();
    let response = ctx.run(["add"]).await;
    assert_eq!(response.exit_code, 2);
    assert!(response.rendered.primary.is_empty());
    let stderr = response.rendered.secondary_str();
    assert!(stderr.contains("I0001"));
    assert!(stderr.contains("field: a"));
}

#[tokio::test]
async fn test_human_mode_is_silent_on_empty_result() {
    let ctx = run_context();
    let response = ctx.run(["noop"]).await;
    assert_eq!(response.exit_code, 0);
    assert!(response.rendered.primary.is_empty());
    assert!(response.rendered.secondary.is_empty());

    let response = ctx.run(["noop", "--output", "structured"]).await;
    assert_eq!(primary_json(&response)["result"], json!(null));
}

#[tokio::test]
async fn test_stream_mode_one_envelope_per_item() {
    let ctx = run_context();
    let response = ctx
        .run(["search", "--tags", "a", "--tags", "b", "--limit", "5", "--output", "stream"])
        .await;
    assert_eq!(response.exit_code, 0);
    let lines = primary_lines(&response);
    assert_eq!(lines.len(), 2);
    assert_eq!(lines[0]["result"], json!({"tag": "a", "limit": 5}));
    assert_eq!(lines[1]["result"], json!({"tag": "b", "limit": 5}));
    assert!(lines.iter().all(|line| line["meta"]["operation"] == json!("search")));

    // An empty list still produces exactly one envelope.
    let response = ctx.run(["search", "--no-tags", "--output", "stream"]).await;
    let lines = primary_lines(&response);
    assert_eq!(lines.len(), 1);
    assert_eq!(lines[0]["result"], json!([]));
}

#[tokio::test]
async fn test_human_mode_renders_records_as_table() {
    let ctx = run_context();
    let response = ctx.run(["search", "--tags", "alpha"]).await;
    let text = response.rendered.primary_str();
    assert!(text.contains("tag"));
    assert!(text.contains("alpha"));
}

#[tokio::test]
async fn test_declared_errors_map_to_category_exit_codes() {
    let ctx = run_context();
    let cases = [
        ("I0100", ErrorCategory::Input, 2),
        ("A0100", ErrorCategory::Auth, 30),
        ("S0100", ErrorCategory::State, 10),
        ("R0100", ErrorCategory::Runtime, 70),
    ];
    for (code, category, exit_code) in cases {
        let response = ctx.run(["fail", code, "--output", "structured"]).await;
        assert_eq!(response.exit_code, exit_code, "{}", code);
        assert_eq!(category.exit_code(), exit_code);
        let envelope = primary_json(&response);
        assert_eq!(envelope["error"]["code"], json!(code));
        assert_eq!(envelope["error"]["category"], json!(category.as_str()));
        assert_eq!(envelope["error"]["retryable"], json!(category.default_retryable()));
    }
}

#[tokio::test]
async fn test_undeclared_code_is_unclassified() {
    let ctx = run_context();
    let response = ctx.run(["fail", "S0999", "--output", "structured"]).await;
    assert_eq!(response.exit_code, 70);
    let envelope = primary_json(&response);
    assert_eq!(envelope["error"]["code"], json!("X0001"));
    assert_eq!(envelope["error"]["retryable"], json!(false));
    assert!(envelope["error"].get("details").is_none());

    let response = ctx.run(["fail", "S0999", "--output", "structured", "--verbose"]).await;
    let envelope = primary_json(&response);
    assert_eq!(envelope["error"]["details"]["code"], json!("S0999"));
}

#[tokio::test]
async fn test_idempotency_keys() {
    let ctx = run_context();

    // Idempotent operations replay the cached success.
    let first = ctx.run(["add", "1", "--idempotency-key", "k1", "--output", "structured"]).await;
    let second = ctx.run(["add", "1", "--idempotency-key", "k1", "--output", "structured"]).await;
    assert_eq!(primary_json(&first)["result"], primary_json(&second)["result"]);

    // Non-idempotent operations refuse the repeat without executing.
    let before = CREATE_CALLS.load(Ordering::SeqCst);
    let first = ctx.run(["create", "r1", "--idempotency-key", "k2", "--output", "structured"]).await;
    assert_eq!(first.exit_code, 0);
    let second = ctx.run(["create", "r1", "--idempotency-key", "k2", "--output", "structured"]).await;
    assert_eq!(second.exit_code, 2);
    let envelope = primary_json(&second);
    assert_eq!(envelope["error"]["code"], json!("I0006"));
    assert_eq!(envelope["error"]["retryable"], json!(false));
    assert_eq!(CREATE_CALLS.load(Ordering::SeqCst), before + 1);
}

#[tokio::test]
async fn test_dry_run_redacts_secrets() {
    let ctx = run_context();
    let response = ctx
        .run(["create", "r2", "--token", "hunter2", "--dry-run", "--output", "structured"])
        .await;
    assert_eq!(response.exit_code, 0);
    let envelope = primary_json(&response);
    assert_eq!(envelope["result"]["dry_run"], json!(true));
    assert_eq!(envelope["result"]["arguments"]["name"], json!("r2"));
    assert_eq!(envelope["result"]["arguments"]["token"], json!("***"));
    assert!(!response.rendered.primary_str().contains("hunter2"));
}

#[tokio::test]
async fn test_policy_denies_destructive_operation() {
    let ctx = RunContext::new(Arc::new(calc_registry()), EngineConfig::default())
        .with_policy(CapabilityPolicy::default().deny_destructive());
    let response = ctx.run(["create", "r3", "--output", "structured"]).await;
    assert_eq!(response.exit_code, 30);
    assert_eq!(primary_json(&response)["error"]["code"], json!("A0001"));

    let response = ctx.run(["add", "1", "--output", "structured"]).await;
    assert_eq!(response.exit_code, 0);
}

#[tokio::test]
async fn test_payload_and_injected_values() {
    let dispatcher = Dispatcher::new(Arc::new(calc_registry()));
    let cx = InvocationContext::new(OutputMode::Structured).inject("session", json!("s-42"));

    let outcome = dispatcher
        .invoke("search", Input::Payload(json!({"tags": ["x"], "limit": null})), &cx)
        .await;
    assert_eq!(outcome.result, Ok(json!([{"tag": "x", "limit": null}])));

    // Injected parameters are not part of the external surface.
    let outcome = dispatcher
        .invoke("search", Input::Payload(json!({"tags": ["x"], "session": "forged"})), &cx)
        .await;
    assert_eq!(outcome.error().map(|e| e.code.to_string()), Some("I0002".to_string()));
}
