//! Opspec CLI Binary
//!
//! Demonstration application: a handful of operations registered once and exposed
//! through the engine's CLI surface, schemas and help.

use anyhow::Context;
use opspec::cli::{emit, GlobalArgs, Invocation, RunContext};
use opspec::config::{ConfigLoader, EngineConfig};
use opspec::envelope::{encode, Outcome};
use opspec::error::RegistrationError;
use opspec::logging::{init_logging, LoggingConfig};
use opspec::operation::{
    handler_fn, Annotation, Arguments, CallContext, OperationDescriptor, OperationFailure, Registry,
};
use opspec::param::{parse_type, Parameter, RawParam, ValueType};
use opspec::taxonomy::UNCLASSIFIED_EXIT_CODE;
use serde_json::{json, Value};
use std::process;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info};

const PROGRAM: &str = "opspec";

#[tokio::main]
async fn main() {
    let args: Vec<String> = std::env::args().skip(1).collect();
    match run(args).await {
        Ok(code) => process::exit(code),
        Err(e) => {
            error!("Start-up failed: {:#}", e);
            eprintln!("{}: {:#}", PROGRAM, e);
            process::exit(UNCLASSIFIED_EXIT_CODE);
        }
    }
}

async fn run(args: Vec<String>) -> anyhow::Result<i32> {
    let invocation = match Invocation::parse(args) {
        Ok(invocation) => invocation,
        Err(err) => {
            // No config yet: report with built-in defaults.
            let outcome = Outcome::failure(PROGRAM, None, err);
            let mode = EngineConfig::default().defaults.output;
            emit(&encode(&outcome, mode)).context("Failed to write output")?;
            return Ok(outcome.exit_code());
        }
    };

    let config = load_config(&invocation.globals)?;
    init_logging(Some(&build_logging_config(&invocation.globals, &config)))
        .context("Failed to initialize logging")?;
    info!(operation = invocation.operation.as_deref(), "Opspec CLI starting");

    let registry = build_registry().context("Failed to register operations")?;
    let context = RunContext::new(Arc::new(registry), config);
    let response = context.execute(&invocation).await;
    emit(&response.rendered).context("Failed to write output")?;
    debug!(exit_code = response.exit_code, "Command finished");
    Ok(response.exit_code)
}

fn load_config(globals: &GlobalArgs) -> anyhow::Result<EngineConfig> {
    match &globals.config {
        Some(path) => ConfigLoader::load_from_file(path)
            .with_context(|| format!("Failed to load configuration from {}", path.display())),
        None => {
            let workspace = std::env::current_dir().context("Failed to resolve working directory")?;
            ConfigLoader::load(&workspace).context("Failed to load configuration")
        }
    }
}

/// Build logging configuration from CLI args and the loaded config.
/// Precedence: CLI flags override environment, which overrides the config file.
fn build_logging_config(globals: &GlobalArgs, config: &EngineConfig) -> LoggingConfig {
    let mut logging = config.logging.clone();
    if globals.verbose {
        logging.level = "debug".to_string();
    }
    if let Some(level) = &globals.log_level {
        logging.level = level.clone();
    }
    if let Some(format) = &globals.log_format {
        logging.format = format.clone();
    }
    logging
}

fn build_registry() -> Result<Registry, RegistrationError> {
    let mut registry = Registry::new(PROGRAM);

    registry.add(
        OperationDescriptor::builder("add")
            .doc("Add two integers.\n\nThe second operand defaults to zero.")
            .param(Parameter::positional("a", ValueType::Integer).doc("First operand"))
            .param(Parameter::named("b", ValueType::Integer).default(0).doc("Second operand"))
            .returns(ValueType::Integer)
            .annotate(Annotation::ReadOnly | Annotation::Idempotent)
            .example(json!({"a": 3, "b": 4}), "Adds 3 and 4"),
        handler_fn(add),
    )?;

    registry.add(
        OperationDescriptor::builder("greet")
            .doc("Greet someone by name.")
            .param(Parameter::positional("name", ValueType::String).min(1.0).doc("Who to greet"))
            .param(Parameter::named("greeting", ValueType::String).default("Hello"))
            .param(Parameter::named("shout", ValueType::Boolean).default(false).doc("Upper-case the greeting"))
            .param(Parameter::named("times", ValueType::Integer).default(1).min(1.0).max(5.0))
            .returns(ValueType::String)
            .annotate(Annotation::ReadOnly | Annotation::Idempotent)
            .example(json!({"name": "Ada", "shout": true}), "Shouted greeting"),
        handler_fn(greet),
    )?;

    registry.add(
        OperationDescriptor::builder("range")
            .doc("List integers from start (inclusive) to stop (exclusive).\n\nUse --output stream to get one envelope per value.")
            .param(Parameter::positional("start", ValueType::Integer))
            .param(Parameter::positional("stop", ValueType::Integer))
            .param(Parameter::named("step", ValueType::Integer).default(1).min(1.0).max(1000.0))
            .returns(ValueType::Array(Box::new(ValueType::Integer)))
            .annotate(Annotation::ReadOnly | Annotation::Idempotent)
            .error("I0100", "Range would produce more than 10000 values."),
        handler_fn(range),
    )?;

    registry.add(
        OperationDescriptor::builder("divide")
            .doc("Divide one number by another.")
            .param(Parameter::positional("numerator", ValueType::Float))
            .param(Parameter::positional("denominator", ValueType::Float))
            .returns(ValueType::Float)
            .annotate(Annotation::ReadOnly | Annotation::Idempotent)
            .error_with_retry("I0100", "Denominator is zero.", false),
        handler_fn(divide),
    )?;

    registry.add(
        OperationDescriptor::builder("sleep")
            .doc("Wait for a number of seconds; stops early when cancelled.")
            .param(Parameter::positional("seconds", ValueType::Float).min(0.0).max(3600.0))
            .annotate(Annotation::Idempotent),
        handler_fn(sleep),
    )?;

    let tags = parse_type("list[str]")?;
    registry.add(
        OperationDescriptor::builder("inspect")
            .doc("Echo validated arguments back, with secrets redacted.")
            .param(Parameter::named("tags", tags).default(json!([])).doc("Repeat to add more"))
            .signature(RawParam {
                name: "limit".to_string(),
                annotation: "optional[int]".to_string(),
                default: Some(Value::Null),
                min: Some(0.0),
                ..RawParam::default()
            })
            .signature(RawParam {
                name: "mode".to_string(),
                annotation: "enum[fast, thorough]".to_string(),
                default: Some(json!("fast")),
                documentation: Some("Inspection depth".to_string()),
                ..RawParam::default()
            })
            .signature(RawParam {
                name: "api_key".to_string(),
                annotation: "str".to_string(),
                default: Some(json!("")),
                secret: true,
                ..RawParam::default()
            })
            .returns_schema(json!({
                "$defs": {"echo": {"type": "object", "additionalProperties": true}},
                "$ref": "#/$defs/echo"
            }))
            .annotate(Annotation::ReadOnly),
        handler_fn(inspect),
    )?;

    Ok(registry)
}

async fn add(args: Arguments, _cx: CallContext) -> Result<Value, OperationFailure> {
    let a: i64 = args.parse("a")?;
    let b: i64 = args.parse("b")?;
    a.checked_add(b)
        .map(|sum| json!(sum))
        .ok_or_else(|| OperationFailure::new("integer overflow"))
}

async fn greet(args: Arguments, _cx: CallContext) -> Result<Value, OperationFailure> {
    let name: String = args.parse("name")?;
    let greeting: String = args.parse("greeting")?;
    let times: usize = args.parse("times")?;
    let mut line = format!("{}, {}!", greeting, name);
    if args.get_bool("shout").unwrap_or(false) {
        line = line.to_uppercase();
    }
    Ok(json!(vec![line; times].join(" ")))
}

async fn range(args: Arguments, _cx: CallContext) -> Result<Value, OperationFailure> {
    let start: i64 = args.parse("start")?;
    let stop: i64 = args.parse("stop")?;
    let step: i64 = args.parse("step")?;
    Ok(json!(range_values(start, stop, step)?))
}

const RANGE_LIMIT: i128 = 10_000;

/// Values of `start..stop` by `step`, refusing ranges longer than [`RANGE_LIMIT`].
/// The length is computed in `i128` so the full `i64` span cannot overflow.
fn range_values(start: i64, stop: i64, step: i64) -> Result<Vec<i64>, OperationFailure> {
    if step < 1 {
        return Err(OperationFailure::coded("I0100", "step must be at least 1").with_field("step"));
    }
    let span = i128::from(stop) - i128::from(start);
    let count = if span > 0 { (span + i128::from(step) - 1) / i128::from(step) } else { 0 };
    if count > RANGE_LIMIT {
        return Err(OperationFailure::coded("I0100", format!("range would produce {} values", count))
            .with_field("stop"));
    }
    let step = usize::try_from(step).map_err(|_| OperationFailure::coded("I0100", "step is too large"))?;
    Ok((start..stop).step_by(step).collect())
}

async fn divide(args: Arguments, _cx: CallContext) -> Result<Value, OperationFailure> {
    let numerator: f64 = args.parse("numerator")?;
    let denominator: f64 = args.parse("denominator")?;
    if denominator == 0.0 {
        return Err(OperationFailure::coded("I0100", "cannot divide by zero").with_field("denominator"));
    }
    Ok(json!(numerator / denominator))
}

async fn sleep(args: Arguments, cx: CallContext) -> Result<Value, OperationFailure> {
    let seconds: f64 = args.parse("seconds")?;
    tokio::select! {
        _ = tokio::time::sleep(Duration::from_secs_f64(seconds)) => Ok(Value::Null),
        _ = cx.cancelled() => Err(OperationFailure::new("cancelled")),
    }
}

async fn inspect(args: Arguments, cx: CallContext) -> Result<Value, OperationFailure> {
    let mut echo = args.into_value();
    if let Some(key) = echo.get_mut("api_key") {
        if key.as_str().is_some_and(|k| !k.is_empty()) {
            *key = json!("***");
            cx.warn("api_key was supplied and has been redacted");
        }
    }
    Ok(echo)
}
