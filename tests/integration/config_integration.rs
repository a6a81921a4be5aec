//! Configuration files driving the CLI route.

use super::support::{calc_registry, primary_json};
use opspec::cli::RunContext;
use opspec::config::{ConfigLoader, EngineConfig};
use opspec::envelope::OutputMode;
use opspec::operation::{handler_fn, Arguments, CallContext, OperationDescriptor, OperationFailure, Registry};
use opspec::param::{Parameter, ValueType};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

fn write_config(dir: &TempDir, contents: &str) -> std::path::PathBuf {
    let path = dir.path().join("opspec.toml");
    std::fs::write(&path, contents).unwrap();
    path
}

async fn wait(args: Arguments, cx: CallContext) -> Result<Value, OperationFailure> {
    let seconds = args.get_f64("seconds").unwrap_or(0.0);
    tokio::select! {
        _ = tokio::time::sleep(Duration::from_secs_f64(seconds)) => Ok(json!("done")),
        _ = cx.cancelled() => Err(OperationFailure::new("cancelled")),
    }
}

fn wait_registry() -> Registry {
    let mut registry = Registry::new("waiter");
    registry
        .add(
            OperationDescriptor::builder("wait")
                .doc("Wait a while.")
                .param(Parameter::positional("seconds", ValueType::Float).min(0.0)),
            handler_fn(wait),
        )
        .unwrap();
    registry
}

#[tokio::test]
async fn test_configured_output_mode() {
    let dir = TempDir::new().unwrap();
    let path = write_config(&dir, "[defaults]\noutput = \"plain\"\n");
    let config = ConfigLoader::load_from_file(&path).unwrap();
    assert_eq!(config.defaults.output, OutputMode::Plain);

    let ctx = RunContext::new(Arc::new(calc_registry()), config);
    let response = ctx.run(["add", "3", "--b", "4"]).await;
    assert_eq!(response.rendered.primary_str(), "7\n");

    // The flag still wins over the file.
    let response = ctx.run(["add", "3", "--output", "structured"]).await;
    assert_eq!(primary_json(&response)["result"], json!(3));
}

#[tokio::test]
async fn test_configured_timeout_applies_and_flag_overrides() {
    let dir = TempDir::new().unwrap();
    let path = write_config(&dir, "[defaults]\ntimeout_secs = 0.05\n");
    let config = ConfigLoader::load_from_file(&path).unwrap();
    let ctx = RunContext::new(Arc::new(wait_registry()), config);

    let response = ctx.run(["wait", "5", "--output", "structured"]).await;
    assert_eq!(response.exit_code, 70);
    let envelope = primary_json(&response);
    assert_eq!(envelope["error"]["code"], json!("R0001"));
    assert_eq!(envelope["error"]["retryable"], json!(true));

    let response = ctx
        .run(["wait", "0.01", "--timeout", "5", "--output", "structured"])
        .await;
    assert_eq!(response.exit_code, 0);
    assert_eq!(primary_json(&response)["result"], json!("done"));
}

#[tokio::test]
async fn test_disabled_idempotency_ignores_keys() {
    let dir = TempDir::new().unwrap();
    let path = write_config(&dir, "[idempotency]\nenabled = false\n");
    let config = ConfigLoader::load_from_file(&path).unwrap();
    assert!(!config.idempotency.enabled);

    let ctx = RunContext::new(Arc::new(calc_registry()), config);
    for _ in 0..2 {
        let response = ctx
            .run(["create", "cfg", "--idempotency-key", "same", "--output", "structured"])
            .await;
        assert_eq!(response.exit_code, 0);
    }
}

#[tokio::test]
async fn test_verbose_errors_from_config() {
    let mut config = EngineConfig::default();
    config.defaults.verbose_errors = true;
    let ctx = RunContext::new(Arc::new(calc_registry()), config);
    let response = ctx.run(["fail", "S0999", "--output", "structured"]).await;
    assert_eq!(
        primary_json(&response)["error"]["details"]["message"],
        json!("requested failure")
    );
}

#[test]
fn test_invalid_config_is_rejected() {
    let dir = TempDir::new().unwrap();
    let path = write_config(&dir, "[logging]\nformat = \"yaml\"\n");
    let err = ConfigLoader::load_from_file(&path).unwrap_err();
    assert!(err.to_string().contains("format"));
}
