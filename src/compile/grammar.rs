//! Parser Compiler: command-line grammar projected from a descriptor.
//!
//! Token rules:
//! - positional parameters are consumed strictly in declaration order; the final one may
//!   be an array and then takes every remaining positional token
//! - named parameters accept `--name value` and `--name=value`; a repeated scalar keeps
//!   the last occurrence
//! - boolean flags accept `--name`, `--no-name` and `--name=true|false`
//! - array flags accumulate one item per occurrence; `--no-name` clears to `[]`
//! - `--` ends flag parsing; single-dash tokens such as `-5` are positional values

use crate::operation::{Arguments, OperationDescriptor};
use crate::param::{render_token, Definitions, ParamKind, Parameter};
use crate::taxonomy::{ContractError, Suggestion};
use serde_json::Value;
use std::collections::HashMap;

/// Compiled grammar for one operation.
#[derive(Debug, Clone)]
pub struct Grammar {
    operation: String,
    parameters: Vec<Parameter>,
    definitions: Definitions,
    usage: String,
}

/// Named-flag state collected while scanning.
enum Collected {
    Scalar(Value),
    Items(Vec<String>),
}

impl Grammar {
    pub fn compile(descriptor: &OperationDescriptor) -> Self {
        let parameters: Vec<Parameter> = descriptor.visible_parameters().cloned().collect();
        let usage = render_usage(descriptor.name(), &parameters);
        Self {
            operation: descriptor.name().to_string(),
            parameters,
            definitions: descriptor.definitions().clone(),
            usage,
        }
    }

    /// One-line usage, e.g. `add <a> [--b <int>]`.
    pub fn usage(&self) -> &str {
        &self.usage
    }

    pub fn operation(&self) -> &str {
        &self.operation
    }

    fn named(&self, flag: &str) -> Option<&Parameter> {
        self.parameters
            .iter()
            .find(|p| p.kind() == ParamKind::Named && p.flag() == flag)
    }

    fn positionals(&self) -> impl Iterator<Item = &Parameter> {
        self.parameters.iter().filter(|p| p.kind() == ParamKind::Positional)
    }

    /// Parse raw tokens (without the operation name) into validated arguments.
    pub fn parse(&self, tokens: &[String]) -> Result<Arguments, ContractError> {
        let mut collected: HashMap<&str, Collected> = HashMap::new();
        let mut positional_tokens: Vec<&str> = Vec::new();
        let mut only_positional = false;
        let mut iter = tokens.iter();

        while let Some(token) = iter.next() {
            if only_positional || !token.starts_with("--") {
                positional_tokens.push(token);
                continue;
            }
            if token == "--" {
                only_positional = true;
                continue;
            }

            let body = &token[2..];
            let (flag, inline) = match body.split_once('=') {
                Some((flag, value)) => (flag, Some(value)),
                None => (body, None),
            };

            let Some(parameter) = self.named(flag) else {
                if let Some(negated) = flag.strip_prefix("no-").and_then(|f| self.named(f)) {
                    if inline.is_none() && (negated.is_flag() || negated.is_repeated()) {
                        let cleared = if negated.is_repeated() {
                            Collected::Items(Vec::new())
                        } else {
                            Collected::Scalar(Value::Bool(false))
                        };
                        collected.insert(negated.name(), cleared);
                        continue;
                    }
                }
                return Err(self.unknown_flag(flag));
            };

            if parameter.is_flag() && inline.is_none() {
                collected.insert(parameter.name(), Collected::Scalar(Value::Bool(true)));
                continue;
            }

            let raw = match inline {
                Some(value) => value,
                None => match iter.next() {
                    Some(next) if !next.starts_with("--") => next.as_str(),
                    _ => {
                        return Err(ContractError::type_mismatch(
                            parameter.name(),
                            format!("--{} expects a value", flag),
                        ))
                    }
                },
            };

            if parameter.is_repeated() {
                let slot = collected
                    .entry(parameter.name())
                    .or_insert_with(|| Collected::Items(Vec::new()));
                if let Collected::Items(items) = slot {
                    items.push(raw.to_string());
                }
            } else {
                let value = parameter.admit_token(raw, &self.definitions)?;
                collected.insert(parameter.name(), Collected::Scalar(value));
            }
        }

        let mut positional_values: HashMap<&str, Value> = HashMap::new();
        let mut remaining = positional_tokens.into_iter();
        for parameter in self.positionals() {
            if parameter.is_repeated() {
                let items: Vec<String> = remaining.by_ref().map(str::to_string).collect();
                if !items.is_empty() {
                    let value = parameter.admit_tokens(&items, &self.definitions)?;
                    positional_values.insert(parameter.name(), value);
                }
            } else if let Some(token) = remaining.next() {
                let value = parameter.admit_token(token, &self.definitions)?;
                positional_values.insert(parameter.name(), value);
            }
        }
        if let Some(extra) = remaining.next() {
            return Err(ContractError::unknown_argument(
                extra,
                format!("Unexpected argument '{}' for '{}'", extra, self.operation),
            )
            .with_suggestion(Suggestion::new(format!("Usage: {}", self.usage))));
        }

        let mut arguments = Arguments::new();
        for parameter in &self.parameters {
            let supplied = match parameter.kind() {
                ParamKind::Positional => positional_values.remove(parameter.name()),
                ParamKind::Named => match collected.remove(parameter.name()) {
                    Some(Collected::Scalar(value)) => Some(value),
                    Some(Collected::Items(items)) => Some(parameter.admit_tokens(&items, &self.definitions)?),
                    None => None,
                },
            };
            let value = match (supplied, parameter.default()) {
                (Some(value), _) => value,
                (None, Some(default)) => default.clone(),
                (None, None) => {
                    return Err(ContractError::missing_required(parameter.name())
                        .with_suggestion(Suggestion::new(format!("Usage: {}", self.usage))))
                }
            };
            arguments.insert(parameter.name(), value);
        }
        Ok(arguments)
    }

    fn unknown_flag(&self, flag: &str) -> ContractError {
        let field = flag.replace('-', "_");
        let positional = self
            .positionals()
            .find(|p| p.flag() == flag)
            .map(|p| p.name().to_string());
        let message = format!("Unknown option '--{}' for '{}'", flag, self.operation);
        let suggestion = match positional {
            Some(name) => Suggestion::new(format!("'{}' is positional; pass it without a flag", name)),
            None => Suggestion::new(format!("Usage: {}", self.usage)),
        };
        ContractError::unknown_argument(&field, message).with_suggestion(suggestion)
    }

    /// Render arguments back to tokens that [`Grammar::parse`] reads to the same values.
    ///
    /// Named flags come first in declaration order, then positionals. Values equal to a
    /// default are still rendered so the result is explicit.
    pub fn render_tokens(&self, arguments: &Arguments) -> Vec<String> {
        let mut tokens = Vec::new();
        for parameter in self.parameters.iter().filter(|p| p.kind() == ParamKind::Named) {
            let Some(value) = arguments.get(parameter.name()) else {
                continue;
            };
            let flag = parameter.flag();
            match value {
                Value::Bool(b) if parameter.is_flag() => {
                    tokens.push(if *b { format!("--{}", flag) } else { format!("--no-{}", flag) });
                }
                other if parameter.is_flag() => {
                    tokens.push(format!("--{}={}", flag, render_token(other)));
                }
                Value::Array(items) if parameter.is_repeated() => {
                    if items.is_empty() {
                        tokens.push(format!("--no-{}", flag));
                    }
                    for item in items {
                        push_flag(&mut tokens, &flag, &render_token(item));
                    }
                }
                other => push_flag(&mut tokens, &flag, &render_token(other)),
            }
        }

        let mut positional_tokens = Vec::new();
        for parameter in self.positionals() {
            match arguments.get(parameter.name()) {
                Some(Value::Array(items)) if parameter.is_repeated() => {
                    positional_tokens.extend(items.iter().map(render_token));
                }
                Some(value) => positional_tokens.push(render_token(value)),
                None => break,
            }
        }
        if positional_tokens.iter().any(|t| t.starts_with("--")) {
            tokens.push("--".to_string());
        }
        tokens.extend(positional_tokens);
        tokens
    }
}

fn push_flag(tokens: &mut Vec<String>, flag: &str, value: &str) {
    if value.starts_with("--") {
        tokens.push(format!("--{}={}", flag, value));
    } else {
        tokens.push(format!("--{}", flag));
        tokens.push(value.to_string());
    }
}

fn render_usage(operation: &str, parameters: &[Parameter]) -> String {
    let mut parts = vec![operation.to_string()];
    for parameter in parameters.iter().filter(|p| p.kind() == ParamKind::Positional) {
        let name = parameter.name();
        parts.push(match (parameter.is_repeated(), parameter.required()) {
            (true, _) => format!("<{}>...", name),
            (false, true) => format!("<{}>", name),
            (false, false) => format!("[{}]", name),
        });
    }
    for parameter in parameters.iter().filter(|p| p.kind() == ParamKind::Named) {
        let flag = parameter.flag();
        let rendered = if parameter.is_flag() {
            format!("--{}", flag)
        } else {
            let label = parameter
                .value_type()
                .array_item()
                .unwrap_or_else(|| parameter.value_type());
            format!("--{} <{}>", flag, label)
        };
        let repeat = if parameter.is_repeated() { "..." } else { "" };
        parts.push(if parameter.required() {
            format!("{}{}", rendered, repeat)
        } else {
            format!("[{}]{}", rendered, repeat)
        });
    }
    parts.join(" ")
}
