//! CLI parse: global flags (clap) plus the raw tokens handed to an operation's grammar.
//!
//! Global flags may appear anywhere on the command line. They are lifted out first;
//! everything else belongs to the operation. A `--` stops the lifting so operation
//! values that look like global flags can still be passed.

use crate::envelope::OutputMode;
use crate::taxonomy::{codes, ContractError, Suggestion};
use clap::Parser;
use std::path::PathBuf;

/// Flags the engine owns on every command line.
#[derive(Parser, Debug, Clone, Default, PartialEq)]
#[command(name = "opspec")]
#[command(disable_help_flag = true, disable_version_flag = true, args_override_self = true)]
pub struct GlobalArgs {
    /// Output mode (human, structured, stream, plain)
    #[arg(long, value_enum)]
    pub output: Option<OutputMode>,

    /// Emit the operation's schema (or every schema) instead of running it
    #[arg(long)]
    pub schema: bool,

    /// Time budget for execution, in seconds
    #[arg(long, allow_hyphen_values = true)]
    pub timeout: Option<f64>,

    /// Deduplicate repeated invocations with the same key
    #[arg(long)]
    pub idempotency_key: Option<String>,

    /// Attach raw failure detail and log at debug level
    #[arg(long)]
    pub verbose: bool,

    /// Validate and check policy without executing
    #[arg(long)]
    pub dry_run: bool,

    /// Show help for the operation (or list operations)
    #[arg(long, short = 'h')]
    pub help: bool,

    /// Configuration file path (overrides default config loading)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error, off)
    #[arg(long)]
    pub log_level: Option<String>,

    /// Log format (json, text)
    #[arg(long)]
    pub log_format: Option<String>,
}

/// Global flags that consume a value.
const VALUE_FLAGS: &[&str] = &["output", "timeout", "idempotency-key", "config", "log-level", "log-format"];
/// Global flags that stand alone.
const SWITCH_FLAGS: &[&str] = &["schema", "verbose", "dry-run", "help"];

/// One parsed command line.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Invocation {
    pub globals: GlobalArgs,
    /// First token that is neither a global flag nor its value.
    pub operation: Option<String>,
    /// Remaining tokens, in order, for the operation's grammar.
    pub tokens: Vec<String>,
}

impl Invocation {
    /// Parse process arguments (without the program name).
    pub fn parse<I, S>(args: I) -> Result<Self, ContractError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let args: Vec<String> = args.into_iter().map(Into::into).collect();
        let (global_tokens, operation, tokens) = split_global_flags(&args);
        let globals = GlobalArgs::try_parse_from(std::iter::once("opspec".to_string()).chain(global_tokens))
            .map_err(|err| {
                let rendered = err.to_string();
                let message = rendered
                    .lines()
                    .next()
                    .unwrap_or("invalid global flag")
                    .trim_start_matches("error: ")
                    .to_string();
                ContractError::new(codes::TYPE_MISMATCH, message)
                    .with_suggestion(Suggestion::new("Run with --help to see the accepted flags"))
            })?;
        Ok(Self {
            globals,
            operation,
            tokens,
        })
    }
}

/// Split `args` into (global flag tokens, operation name, operation tokens).
pub fn split_global_flags(args: &[String]) -> (Vec<String>, Option<String>, Vec<String>) {
    let mut globals = Vec::new();
    let mut operation = None;
    let mut rest = Vec::new();
    let mut iter = args.iter();

    while let Some(arg) = iter.next() {
        if arg == "--" {
            rest.push(arg.clone());
            rest.extend(iter.by_ref().cloned());
            break;
        }
        if arg == "-h" {
            globals.push(arg.clone());
            continue;
        }
        if let Some(body) = arg.strip_prefix("--") {
            let name = body.split_once('=').map_or(body, |(name, _)| name);
            if SWITCH_FLAGS.contains(&name) {
                globals.push(arg.clone());
                continue;
            }
            if VALUE_FLAGS.contains(&name) {
                globals.push(arg.clone());
                if !body.contains('=') {
                    if let Some(value) = iter.next() {
                        globals.push(value.clone());
                    }
                }
                continue;
            }
        }
        if operation.is_none() && !arg.starts_with('-') {
            operation = Some(arg.clone());
        } else {
            rest.push(arg.clone());
        }
    }
    (globals, operation, rest)
}
