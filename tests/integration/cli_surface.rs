//! Command-line surface: global flag placement, `--`, and output writing.

use super::support::{primary_json, run_context};
use opspec::cli::{write_rendered, Invocation};
use serde_json::json;

#[tokio::test]
async fn test_global_flags_anywhere() {
    let ctx = run_context();
    for args in [
        vec!["--output", "structured", "add", "3", "--b", "4"],
        vec!["add", "--output", "structured", "3", "--b", "4"],
        vec!["add", "3", "--b", "4", "--output=structured"],
    ] {
        let response = ctx.run(args.clone()).await;
        assert_eq!(primary_json(&response)["result"], json!(7), "{:?}", args);
    }
}

#[tokio::test]
async fn test_output_aliases() {
    let ctx = run_context();
    let response = ctx.run(["add", "3", "--output", "json"]).await;
    assert_eq!(primary_json(&response)["ok"], json!(true));

    let response = ctx.run(["add", "3", "--output", "jsonl"]).await;
    assert_eq!(response.rendered.primary_str().lines().count(), 1);

    let response = ctx.run(["add", "3", "--output", "plain"]).await;
    assert_eq!(response.rendered.primary_str(), "3\n");
}

#[tokio::test]
async fn test_negative_numbers_are_values() {
    let ctx = run_context();
    let response = ctx.run(["add", "-5", "--b=-3", "--output", "structured"]).await;
    assert_eq!(primary_json(&response)["result"], json!(-8));
}

#[tokio::test]
async fn test_double_dash_protects_operation_values() {
    let ctx = run_context();
    let response = ctx
        .run(["--dry-run", "--output", "structured", "create", "--", "--verbose"])
        .await;
    assert_eq!(response.exit_code, 0);
    let envelope = primary_json(&response);
    assert_eq!(envelope["result"]["arguments"]["name"], json!("--verbose"));
}

#[tokio::test]
async fn test_bad_global_values_are_input_errors() {
    let ctx = run_context();
    let response = ctx.run(["add", "1", "--output", "xml"]).await;
    assert_eq!(response.exit_code, 2);
    assert!(response.rendered.secondary_str().contains("I0003"));

    let response = ctx.run(["add", "1", "--timeout", "soon", "--output", "structured"]).await;
    assert_eq!(response.exit_code, 2);

    let response = ctx.run(["add", "1", "--timeout", "0", "--output", "structured"]).await;
    let envelope = primary_json(&response);
    assert_eq!(envelope["error"]["code"], json!("I0004"));
    assert_eq!(envelope["error"]["field"], json!("timeout"));
}

#[tokio::test]
async fn test_repeated_scalar_flag_keeps_last() {
    let ctx = run_context();
    let response = ctx
        .run(["add", "1", "--b", "2", "--b", "10", "--output", "structured"])
        .await;
    assert_eq!(primary_json(&response)["result"], json!(11));
}

#[test]
fn test_invocation_keeps_operation_tokens_in_order() {
    let invocation = Invocation::parse(["search", "--tags", "a", "--verbose", "--tags", "b"]).unwrap();
    assert_eq!(invocation.operation.as_deref(), Some("search"));
    assert_eq!(invocation.tokens, vec!["--tags", "a", "--tags", "b"]);
    assert!(invocation.globals.verbose);
}

#[tokio::test]
async fn test_write_rendered_splits_channels() {
    let ctx = run_context();
    let response = ctx.run(["add"]).await;
    let mut stdout = Vec::new();
    let mut stderr = Vec::new();
    write_rendered(&response.rendered, &mut stdout, &mut stderr).unwrap();
    assert!(stdout.is_empty());
    assert!(String::from_utf8(stderr).unwrap().contains("I0001"));
}
