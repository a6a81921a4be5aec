//! CLI route: turns one parsed command line into rendered output and an exit code.
//!
//! `--schema` and `--help` short-circuit before dispatch and exit 0. Everything else
//! goes through the [`Dispatcher`] and the envelope encoder.

use crate::cli::parse::{GlobalArgs, Invocation};
use crate::compile::{compile_schema, render_catalog, render_dense, render_verbose};
use crate::config::{parse_timeout_secs, EngineConfig};
use crate::dispatch::{Dispatcher, Input, InvocationContext, PolicyCheck};
use crate::envelope::{encode, OutputMode, Outcome, Rendered};
use crate::operation::Registry;
use crate::taxonomy::{codes, ContractError, Suggestion};
use serde_json::Value;
use std::sync::Arc;
use tracing::debug;

/// What the process should write and how it should exit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub rendered: Rendered,
    pub exit_code: i32,
}

impl Response {
    fn text(text: String) -> Self {
        Self {
            rendered: Rendered {
                primary: text.into_bytes(),
                secondary: Vec::new(),
            },
            exit_code: 0,
        }
    }

    fn outcome(outcome: &Outcome, mode: OutputMode) -> Self {
        Self {
            rendered: encode(outcome, mode),
            exit_code: outcome.exit_code(),
        }
    }
}

/// Runtime context for CLI execution: the dispatcher plus the loaded configuration.
pub struct RunContext {
    dispatcher: Dispatcher,
    config: EngineConfig,
}

impl RunContext {
    /// Build from a registry and configuration; config supplies the default budget
    /// and whether idempotency keys are honored.
    pub fn new(registry: Arc<Registry>, config: EngineConfig) -> Self {
        let mut dispatcher = Dispatcher::new(registry);
        if let Some(timeout) = config.timeout() {
            dispatcher = dispatcher.with_default_timeout(timeout);
        }
        if !config.idempotency.enabled {
            dispatcher = dispatcher.without_idempotency();
        }
        Self { dispatcher, config }
    }

    pub fn with_policy<P: PolicyCheck + 'static>(mut self, policy: P) -> Self {
        self.dispatcher = self.dispatcher.with_policy(policy);
        self
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// `--output` if given, otherwise the configured default.
    pub fn output_mode(&self, globals: &GlobalArgs) -> OutputMode {
        globals.output.unwrap_or(self.config.defaults.output)
    }

    /// Parse and execute raw process arguments (without the program name).
    pub async fn run<I, S>(&self, args: I) -> Response
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        match Invocation::parse(args) {
            Ok(invocation) => self.execute(&invocation).await,
            Err(error) => {
                let program = self.dispatcher.registry().application().to_string();
                self.reject(&program, error, self.config.defaults.output)
            }
        }
    }

    pub async fn execute(&self, invocation: &Invocation) -> Response {
        let globals = &invocation.globals;
        let mode = self.output_mode(globals);
        let operation = invocation.operation.as_deref();

        if globals.schema {
            return self.schema(operation, mode);
        }
        if globals.help {
            return self.help(operation, mode);
        }

        let Some(operation) = operation else {
            let program = self.dispatcher.registry().application();
            let error = ContractError::new(codes::UNKNOWN_OPERATION, "No operation given")
                .with_suggestion(Suggestion::new("List the available operations").with_command(format!("{} --help", program)));
            return self.reject(program, error, mode);
        };

        let cx = match self.invocation_context(globals, mode) {
            Ok(cx) => cx,
            Err(error) => return self.reject(operation, error, mode),
        };
        let outcome = self
            .dispatcher
            .invoke(operation, Input::Tokens(invocation.tokens.clone()), &cx)
            .await;
        Response::outcome(&outcome, mode)
    }

    fn invocation_context(&self, globals: &GlobalArgs, mode: OutputMode) -> Result<InvocationContext, ContractError> {
        let mut cx = InvocationContext::new(mode)
            .verbose(globals.verbose || self.config.defaults.verbose_errors)
            .dry_run(globals.dry_run);
        if let Some(key) = &globals.idempotency_key {
            cx = cx.with_idempotency_key(key.clone());
        }
        if let Some(secs) = globals.timeout {
            let timeout =
                parse_timeout_secs(secs).map_err(|msg| ContractError::constraint_violation("timeout", msg))?;
            cx = cx.with_timeout(timeout);
        }
        Ok(cx)
    }

    fn schema(&self, operation: Option<&str>, mode: OutputMode) -> Response {
        let registry = self.dispatcher.registry();
        let compiled = match operation {
            Some(name) => match registry.get(name) {
                Some(handle) => compile_schema(handle.descriptor()),
                None => return self.reject(name, self.dispatcher.unknown_operation(name), mode),
            },
            None => registry
                .operations()
                .iter()
                .map(|handle| compile_schema(handle.descriptor()))
                .collect::<Result<Vec<Value>, _>>()
                .map(Value::Array),
        };
        match compiled {
            Ok(schema) => {
                debug!(operation, "Emitting schema");
                let text = if mode == OutputMode::Human {
                    serde_json::to_string_pretty(&schema)
                } else {
                    serde_json::to_string(&schema)
                };
                Response::text(format!("{}\n", text.unwrap_or_default()))
            }
            Err(err) => {
                let error = ContractError::new(codes::UNCLASSIFIED_FAILURE, err.to_string()).with_retryable(false);
                self.reject(operation.unwrap_or(registry.application()), error, mode)
            }
        }
    }

    fn help(&self, operation: Option<&str>, mode: OutputMode) -> Response {
        let registry = self.dispatcher.registry();
        let program = registry.application();
        match operation {
            Some(name) => match registry.get(name) {
                Some(handle) if mode == OutputMode::Human => Response::text(render_verbose(handle.descriptor(), program)),
                Some(handle) => Response::text(render_dense(handle.descriptor())),
                None => self.reject(name, self.dispatcher.unknown_operation(name), mode),
            },
            None => Response::text(render_catalog(
                program,
                registry.operations().iter().map(|handle| handle.descriptor()),
            )),
        }
    }

    /// Failure raised before dispatch, encoded like any other outcome.
    fn reject(&self, operation: &str, error: ContractError, mode: OutputMode) -> Response {
        let registry = self.dispatcher.registry();
        let handle = registry.get(operation);
        let version = handle.map(|h| h.descriptor().version().to_string());
        let mut outcome = Outcome::failure(operation, version, error);
        if let Some(handle) = handle {
            outcome = outcome.with_annotations(handle.descriptor().annotations());
        }
        Response::outcome(&outcome, mode)
    }
}
