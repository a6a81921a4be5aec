//! Help Compiler: verbose human help and dense agent help from the same descriptor.

use super::grammar::Grammar;
use crate::operation::{Arguments, OperationDescriptor, ReturnShape};
use crate::param::{render_token, ParamKind, Parameter, REDACTED};
use serde_json::Value;
use std::fmt::Write;

/// Full human help: documentation, usage, one line per parameter, errors, examples.
pub fn render_verbose(descriptor: &OperationDescriptor, program: &str) -> String {
    let grammar = Grammar::compile(descriptor);
    let mut out = String::new();

    let _ = writeln!(out, "{} {}", descriptor.name(), descriptor.version());
    if !descriptor.documentation().is_empty() {
        let _ = writeln!(out);
        for line in descriptor.documentation().lines() {
            let _ = writeln!(out, "{}", line.trim_end());
        }
    }
    if let Some(message) = descriptor.deprecated() {
        let _ = writeln!(out);
        let _ = writeln!(out, "DEPRECATED: {}", message);
    }

    let _ = writeln!(out);
    let _ = writeln!(out, "Usage:");
    let _ = writeln!(out, "  {} {}", program, grammar.usage());

    let positionals: Vec<&Parameter> = descriptor
        .visible_parameters()
        .filter(|p| p.kind() == ParamKind::Positional)
        .collect();
    let named: Vec<&Parameter> = descriptor
        .visible_parameters()
        .filter(|p| p.kind() == ParamKind::Named)
        .collect();

    if !positionals.is_empty() {
        let _ = writeln!(out);
        let _ = writeln!(out, "Arguments:");
        let rows: Vec<(String, String)> = positionals
            .iter()
            .map(|p| (format!("<{}>", p.name()), parameter_details(p)))
            .collect();
        write_rows(&mut out, &rows);
    }
    if !named.is_empty() {
        let _ = writeln!(out);
        let _ = writeln!(out, "Options:");
        let rows: Vec<(String, String)> = named
            .iter()
            .map(|p| {
                let label = if p.is_flag() {
                    format!("--{} / --no-{}", p.flag(), p.flag())
                } else {
                    format!("--{} <{}>", p.flag(), p.value_type().array_item().unwrap_or_else(|| p.value_type()))
                };
                (label, parameter_details(p))
            })
            .collect();
        write_rows(&mut out, &rows);
    }

    if let Some(returns) = return_notation(descriptor) {
        let _ = writeln!(out);
        let _ = writeln!(out, "Returns: {}", returns);
    }
    if !descriptor.annotations().is_empty() {
        let _ = writeln!(out, "Annotations: {}", descriptor.annotations().names().join(", "));
    }
    if !descriptor.capabilities().is_empty() {
        let _ = writeln!(out, "Requires: {}", descriptor.capabilities().join(", "));
    }

    if !descriptor.declared_errors().is_empty() {
        let _ = writeln!(out);
        let _ = writeln!(out, "Errors:");
        for (code, declared) in descriptor.declared_errors() {
            let retryable = declared
                .retryable
                .unwrap_or(code.category().default_retryable());
            let _ = writeln!(
                out,
                "  {}  {}{}  {}",
                code,
                code.category(),
                if retryable { ", retryable" } else { "" },
                declared.documentation
            );
        }
    }

    if !descriptor.examples().is_empty() {
        let _ = writeln!(out);
        let _ = writeln!(out, "Examples:");
        for example in descriptor.examples() {
            let shown = match example.arguments.redacted(descriptor) {
                Value::Object(map) => Arguments::from(map),
                _ => example.arguments.clone(),
            };
            let tokens = grammar.render_tokens(&shown);
            let _ = writeln!(out, "  # {}", example.description);
            let _ = writeln!(out, "  {} {} {}", program, descriptor.name(), shell_join(&tokens));
        }
    }
    out
}

fn parameter_details(parameter: &Parameter) -> String {
    let mut parts = Vec::new();
    if !parameter.is_flag() {
        parts.push(parameter.value_type().to_string());
    }
    match parameter.default() {
        None => parts.push("required".to_string()),
        Some(_) if parameter.is_secret() => parts.push(format!("default: {}", REDACTED)),
        Some(default) => parts.push(format!("default: {}", render_token(default))),
    }
    if let Some(constraints) = parameter.constraints().describe() {
        parts.push(constraints);
    }
    if parameter.is_secret() {
        parts.push("secret".to_string());
    }
    let mut details = parts.join(", ");
    if let Some(doc) = parameter.documentation() {
        let _ = write!(details, "  {}", doc);
    }
    details
}

fn write_rows(out: &mut String, rows: &[(String, String)]) {
    let width = rows.iter().map(|(label, _)| label.len()).max().unwrap_or(0);
    for (label, details) in rows {
        let _ = writeln!(out, "  {:width$}  {}", label, details, width = width);
    }
}

/// Dense agent help: a header line, then exactly one line per parameter.
///
/// ```text
/// add: Add two integers.
///   a: int
///   --b: int = 0
///   -> int
///   [read_only, idempotent]
/// ```
pub fn render_dense(descriptor: &OperationDescriptor) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{}: {}", descriptor.name(), descriptor.summary());
    for parameter in descriptor.visible_parameters() {
        let label = match parameter.kind() {
            ParamKind::Positional => parameter.name().to_string(),
            ParamKind::Named => format!("--{}", parameter.flag()),
        };
        let _ = write!(out, "  {}: {}", label, parameter.value_type());
        if let Some(default) = parameter.default() {
            let shown = if parameter.is_secret() {
                REDACTED.to_string()
            } else {
                render_token(default)
            };
            let _ = write!(out, " = {}", shown);
        }
        if let Some(constraints) = parameter.constraints().describe() {
            let _ = write!(out, " {}", constraints);
        }
        if let Some(doc) = parameter.documentation() {
            let _ = write!(out, " # {}", doc.lines().next().unwrap_or(""));
        }
        let _ = writeln!(out);
    }
    if let Some(returns) = return_notation(descriptor) {
        let _ = writeln!(out, "  -> {}", returns);
    }
    if !descriptor.annotations().is_empty() {
        let _ = writeln!(out, "  [{}]", descriptor.annotations().names().join(", "));
    }
    if !descriptor.declared_errors().is_empty() {
        let codes: Vec<String> = descriptor.declared_errors().keys().map(|c| c.to_string()).collect();
        let _ = writeln!(out, "  errors: {}", codes.join(" "));
    }
    if let Some(message) = descriptor.deprecated() {
        let _ = writeln!(out, "  deprecated: {}", message);
    }
    out
}

/// One summary line per operation, in the order given.
pub fn render_catalog<'a, I>(program: &str, descriptors: I) -> String
where
    I: IntoIterator<Item = &'a OperationDescriptor>,
{
    let descriptors: Vec<&OperationDescriptor> = descriptors.into_iter().collect();
    let width = descriptors.iter().map(|d| d.name().len()).max().unwrap_or(0);
    let mut out = String::new();
    let _ = writeln!(out, "Usage: {} <operation> [arguments...] [--output MODE] [--schema] [--help]", program);
    let _ = writeln!(out);
    let _ = writeln!(out, "Operations:");
    for descriptor in descriptors {
        let marker = if descriptor.deprecated().is_some() { " (deprecated)" } else { "" };
        let _ = writeln!(
            out,
            "  {:width$}  {}{}",
            descriptor.name(),
            descriptor.summary(),
            marker,
            width = width
        );
    }
    out
}

fn return_notation(descriptor: &OperationDescriptor) -> Option<String> {
    match descriptor.return_shape()? {
        ReturnShape::Type(value_type) => Some(value_type.to_string()),
        ReturnShape::Schema(schema) => Some(
            schema
                .get("title")
                .or_else(|| schema.get("type"))
                .and_then(|v| v.as_str())
                .unwrap_or("schema")
                .to_string(),
        ),
    }
}

/// Join tokens for display, quoting the ones a shell would split.
fn shell_join(tokens: &[String]) -> String {
    tokens
        .iter()
        .map(|token| {
            let plain = !token.is_empty()
                && token
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || "-_./=:,+@%".contains(c));
            if plain {
                token.clone()
            } else {
                format!("'{}'", token.replace('\'', "'\\''"))
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}
