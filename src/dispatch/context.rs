//! Per-invocation state, passed explicitly through the dispatcher.

use crate::envelope::OutputMode;
use serde_json::{Map, Value};
use std::fmt;
use std::time::Duration;

/// Raw caller input.
#[derive(Debug, Clone, PartialEq)]
pub enum Input {
    /// Command-line tokens after the operation name.
    Tokens(Vec<String>),
    /// Structured payload (tool-call arguments).
    Payload(Value),
}

impl Input {
    pub fn tokens<I, S>(tokens: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Input::Tokens(tokens.into_iter().map(Into::into).collect())
    }
}

/// Everything one invocation needs beyond its raw input.
#[derive(Debug, Clone, Default)]
pub struct InvocationContext {
    pub output: OutputMode,
    /// Attach raw failure detail to unclassified errors.
    pub verbose: bool,
    /// Validate and check policy, but do not execute.
    pub dry_run: bool,
    pub idempotency_key: Option<String>,
    /// Time budget for the executing phase; overrides the dispatcher default.
    pub timeout: Option<Duration>,
    /// Values for host-injected parameters.
    pub injected: Map<String, Value>,
}

impl InvocationContext {
    pub fn new(output: OutputMode) -> Self {
        Self {
            output,
            ..Self::default()
        }
    }

    pub fn verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub fn with_idempotency_key(mut self, key: impl Into<String>) -> Self {
        self.idempotency_key = Some(key.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn inject(mut self, name: impl Into<String>, value: Value) -> Self {
        self.injected.insert(name.into(), value);
        self
    }
}

/// Invocation lifecycle: `Pending -> Validating -> Executing -> Succeeded|Failed -> Terminal`.
///
/// Validation failures go straight from `Validating` to `Failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Pending,
    Validating,
    Executing,
    Succeeded,
    Failed,
    Terminal,
}

impl Phase {
    pub fn as_str(self) -> &'static str {
        match self {
            Phase::Pending => "pending",
            Phase::Validating => "validating",
            Phase::Executing => "executing",
            Phase::Succeeded => "succeeded",
            Phase::Failed => "failed",
            Phase::Terminal => "terminal",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
