//! Shared fixtures: a small "calc" application registered the way a host would.

use opspec::cli::{Response, RunContext};
use opspec::config::EngineConfig;
use opspec::operation::{
    handler_fn, Annotation, Arguments, CallContext, OperationDescriptor, OperationFailure, Registry,
};
use opspec::param::{parse_type, Parameter, ValueType};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Number of times `create` has executed, across all tests in this binary.
pub static CREATE_CALLS: AtomicUsize = AtomicUsize::new(0);

async fn add(args: Arguments, _cx: CallContext) -> Result<Value, OperationFailure> {
    Ok(json!(args.get_i64("a").unwrap_or(0) + args.get_i64("b").unwrap_or(0)))
}

async fn search(args: Arguments, _cx: CallContext) -> Result<Value, OperationFailure> {
    let tags: Vec<String> = args.parse("tags")?;
    Ok(Value::Array(
        tags.into_iter()
            .map(|tag| json!({"tag": tag, "limit": args.get("limit").cloned().unwrap_or(Value::Null)}))
            .collect(),
    ))
}

async fn create(args: Arguments, _cx: CallContext) -> Result<Value, OperationFailure> {
    CREATE_CALLS.fetch_add(1, Ordering::SeqCst);
    Ok(json!({"created": args.get_str("name").unwrap_or_default()}))
}

async fn fail(args: Arguments, _cx: CallContext) -> Result<Value, OperationFailure> {
    let code: String = args.parse("code")?;
    Err(OperationFailure::coded(code, "requested failure"))
}

async fn noop(_args: Arguments, _cx: CallContext) -> Result<Value, OperationFailure> {
    Ok(Value::Null)
}

/// Registry shared by the integration tests.
pub fn calc_registry() -> Registry {
    let mut registry = Registry::new("calc");
    registry
        .add(
            OperationDescriptor::builder("add")
                .doc("Add two integers.")
                .param(Parameter::positional("a", ValueType::Integer).doc("First operand"))
                .param(Parameter::named("b", ValueType::Integer).default(0))
                .returns(ValueType::Integer)
                .annotate(Annotation::ReadOnly | Annotation::Idempotent)
                .example(json!({"a": 3, "b": 4}), "Adds two numbers"),
            handler_fn(add),
        )
        .unwrap();
    registry
        .add(
            OperationDescriptor::builder("search")
                .doc("Search by tag.\n\nReturns one record per tag.")
                .param(Parameter::named("tags", parse_type("list[str]").unwrap()).doc("Tags to match"))
                .param(Parameter::named("limit", parse_type("optional[int]").unwrap()).default(Value::Null))
                .param(Parameter::named("mode", parse_type("enum[fast, deep]").unwrap()).default("fast"))
                .param(Parameter::named("session", ValueType::String).injected().default("anonymous"))
                .returns(parse_type("list[{tag: str, limit: int?}]").unwrap())
                .annotate(Annotation::ReadOnly),
            handler_fn(search),
        )
        .unwrap();
    registry
        .add(
            OperationDescriptor::builder("create")
                .doc("Create a record. Not idempotent.")
                .param(Parameter::positional("name", ValueType::String))
                .param(Parameter::named("token", ValueType::String).secret().default(""))
                .annotate(Annotation::Destructive),
            handler_fn(create),
        )
        .unwrap();
    registry
        .add(
            OperationDescriptor::builder("fail")
                .doc("Fail with a declared code.")
                .param(Parameter::positional("code", ValueType::String))
                .error("A0100", "Not allowed.")
                .error("S0100", "Wrong state.")
                .error("R0100", "Transient runtime failure.")
                .error("I0100", "Bad input detected by the operation."),
            handler_fn(fail),
        )
        .unwrap();
    registry
        .add(OperationDescriptor::builder("noop").doc("Do nothing."), handler_fn(noop))
        .unwrap();
    registry
}

pub fn run_context() -> RunContext {
    RunContext::new(Arc::new(calc_registry()), EngineConfig::default())
}

/// Parse the primary channel as a single JSON document.
pub fn primary_json(response: &Response) -> Value {
    serde_json::from_str(response.rendered.primary_str().trim()).unwrap()
}

/// Parse the primary channel as JSON lines.
pub fn primary_lines(response: &Response) -> Vec<Value> {
    response
        .rendered
        .primary_str()
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect()
}
