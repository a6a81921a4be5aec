//! Envelope: the wire-level success/failure wrapper around one invocation's outcome.
//!
//! Exactly one of `result` / `error` is present, selected by `ok`. Field order is fixed
//! by declaration order here, so encoding the same outcome twice yields the same bytes.

pub mod encode;
pub mod human;

pub use encode::{encode, Rendered};

use crate::operation::Annotations;
use crate::taxonomy::{ContractError, ErrorCategory, ErrorCode, Suggestion};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::time::Duration;

/// How an outcome is written to the output channels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OutputMode {
    /// Formatted text; silent on empty success.
    #[default]
    Human,
    /// One JSON envelope.
    #[value(alias = "json")]
    Structured,
    /// One JSON envelope per line; sequences are split per element.
    #[serde(rename = "stream")]
    #[value(name = "stream", alias = "jsonl")]
    StructuredStream,
    /// Bare values, one per line; silent on empty success.
    Plain,
}

impl OutputMode {
    /// Modes that always emit an envelope on the primary channel.
    pub fn is_structured(self) -> bool {
        matches!(self, OutputMode::Structured | OutputMode::StructuredStream)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            OutputMode::Human => "human",
            OutputMode::Structured => "structured",
            OutputMode::StructuredStream => "stream",
            OutputMode::Plain => "plain",
        }
    }
}

impl fmt::Display for OutputMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Captured result of one invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct Outcome {
    pub operation: String,
    /// `None` when the operation could not be resolved.
    pub version: Option<String>,
    pub result: Result<Value, ContractError>,
    pub duration: Duration,
    pub warnings: Vec<String>,
    pub annotations: Annotations,
}

impl Outcome {
    pub fn success(operation: impl Into<String>, version: Option<String>, value: Value) -> Self {
        Self {
            operation: operation.into(),
            version,
            result: Ok(value),
            duration: Duration::ZERO,
            warnings: Vec::new(),
            annotations: Annotations::NONE,
        }
    }

    pub fn failure(operation: impl Into<String>, version: Option<String>, error: ContractError) -> Self {
        Self {
            operation: operation.into(),
            version,
            result: Err(error),
            duration: Duration::ZERO,
            warnings: Vec::new(),
            annotations: Annotations::NONE,
        }
    }

    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration = duration;
        self
    }

    pub fn with_warnings(mut self, warnings: Vec<String>) -> Self {
        self.warnings = warnings;
        self
    }

    pub fn with_annotations(mut self, annotations: Annotations) -> Self {
        self.annotations = annotations;
        self
    }

    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }

    pub fn error(&self) -> Option<&ContractError> {
        self.result.as_ref().err()
    }

    /// Process exit code: `0` on success, otherwise the error category's code.
    pub fn exit_code(&self) -> i32 {
        match &self.result {
            Ok(_) => 0,
            Err(error) => error.exit_code(),
        }
    }

    pub fn envelope(&self) -> Envelope<'_> {
        self.envelope_with(self.result.as_ref().ok())
    }

    /// Envelope carrying `result` in place of the outcome's own value (stream mode).
    pub(crate) fn envelope_with<'a>(&'a self, result: Option<&'a Value>) -> Envelope<'a> {
        let meta = Meta {
            operation: &self.operation,
            version: self.version.as_deref(),
            duration_ms: self.duration.as_millis() as u64,
            warnings: &self.warnings,
            annotations: self.annotations,
        };
        match &self.result {
            Ok(_) => Envelope {
                ok: true,
                result,
                error: None,
                meta,
            },
            Err(error) => Envelope {
                ok: false,
                result: None,
                error: Some(ErrorBody::from(error)),
                meta,
            },
        }
    }
}

/// Serializable envelope view of an [`Outcome`].
#[derive(Debug, Serialize)]
pub struct Envelope<'a> {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<&'a Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorBody<'a>>,
    pub meta: Meta<'a>,
}

#[derive(Debug, Serialize)]
pub struct ErrorBody<'a> {
    pub code: ErrorCode,
    pub category: ErrorCategory,
    pub message: &'a str,
    pub suggestion: Option<&'a Suggestion>,
    pub retryable: bool,
    pub field: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<&'a Value>,
}

impl<'a> From<&'a ContractError> for ErrorBody<'a> {
    fn from(error: &'a ContractError) -> Self {
        Self {
            code: error.code,
            category: error.category(),
            message: &error.message,
            suggestion: error.suggestion.as_ref(),
            retryable: error.retryable,
            field: error.field.as_deref(),
            details: error.details.as_ref(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct Meta<'a> {
    pub operation: &'a str,
    pub version: Option<&'a str>,
    pub duration_ms: u64,
    pub warnings: &'a [String],
    pub annotations: Annotations,
}
