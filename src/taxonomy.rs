//! Error taxonomy: closed failure categories, stable codes, and the classified error value.
//!
//! Every failure leaving the dispatcher is a [`ContractError`] carrying exactly one
//! [`ErrorCategory`]. Categories map to process exit codes and a default retry hint.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

/// Closed set of failure categories. Extending this enum is a breaking change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ErrorCategory {
    Input,
    Auth,
    State,
    Runtime,
    Internal,
}

impl ErrorCategory {
    /// All categories in canonical order.
    pub const ALL: [ErrorCategory; 5] = [
        ErrorCategory::Input,
        ErrorCategory::Auth,
        ErrorCategory::State,
        ErrorCategory::Runtime,
        ErrorCategory::Internal,
    ];

    /// Process exit code for failures in this category.
    pub fn exit_code(self) -> i32 {
        match self {
            ErrorCategory::Input => 2,
            ErrorCategory::Auth => 30,
            ErrorCategory::State => 10,
            ErrorCategory::Runtime => 70,
            ErrorCategory::Internal => 70,
        }
    }

    /// Retry hint used when a concrete error does not override it.
    pub fn default_retryable(self) -> bool {
        match self {
            ErrorCategory::Input => true,
            ErrorCategory::Auth => false,
            ErrorCategory::State => true,
            ErrorCategory::Runtime => true,
            ErrorCategory::Internal => false,
        }
    }

    /// Code prefix letter. Internal uses `X` so it never collides with Input.
    pub fn letter(self) -> char {
        match self {
            ErrorCategory::Input => 'I',
            ErrorCategory::Auth => 'A',
            ErrorCategory::State => 'S',
            ErrorCategory::Runtime => 'R',
            ErrorCategory::Internal => 'X',
        }
    }

    pub fn from_letter(letter: char) -> Option<Self> {
        ErrorCategory::ALL
            .into_iter()
            .find(|category| category.letter() == letter)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ErrorCategory::Input => "Input",
            ErrorCategory::Auth => "Auth",
            ErrorCategory::State => "State",
            ErrorCategory::Runtime => "Runtime",
            ErrorCategory::Internal => "Internal",
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Exit code for anything that escapes the taxonomy.
pub const UNCLASSIFIED_EXIT_CODE: i32 = 70;

/// Highest code number reserved for engine-raised errors in every category.
pub const RESERVED_CODE_MAX: u16 = 99;

/// Stable error code: category letter followed by four digits (e.g. `I0001`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ErrorCode {
    category: ErrorCategory,
    number: u16,
}

impl ErrorCode {
    /// Build a code from its parts. Numbers above 9999 are not representable.
    pub const fn new(category: ErrorCategory, number: u16) -> Self {
        Self { category, number }
    }

    pub fn category(&self) -> ErrorCategory {
        self.category
    }

    pub fn number(&self) -> u16 {
        self.number
    }

    /// True for codes in the engine-reserved block (`0001`-`0099`).
    pub fn is_reserved(&self) -> bool {
        self.number <= RESERVED_CODE_MAX
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{:04}", self.category.letter(), self.number)
    }
}

/// Raised when a string is not a well-formed error code.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Invalid error code '{0}': expected a category letter (I, A, S, R, X) and four digits")]
pub struct InvalidErrorCode(pub String);

impl FromStr for ErrorCode {
    type Err = InvalidErrorCode;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || InvalidErrorCode(s.to_string());
        let mut chars = s.chars();
        let letter = chars.next().ok_or_else(invalid)?;
        let category = ErrorCategory::from_letter(letter).ok_or_else(invalid)?;
        let digits = chars.as_str();
        if digits.len() != 4 || !digits.chars().all(|c| c.is_ascii_digit()) {
            return Err(invalid());
        }
        let number = digits.parse::<u16>().map_err(|_| invalid())?;
        if number == 0 {
            return Err(invalid());
        }
        Ok(ErrorCode::new(category, number))
    }
}

impl Serialize for ErrorCode {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for ErrorCode {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// Engine-raised codes. Never renumber these.
pub mod codes {
    use super::{ErrorCategory, ErrorCode};

    pub const MISSING_REQUIRED: ErrorCode = ErrorCode::new(ErrorCategory::Input, 1);
    pub const UNKNOWN_ARGUMENT: ErrorCode = ErrorCode::new(ErrorCategory::Input, 2);
    pub const TYPE_MISMATCH: ErrorCode = ErrorCode::new(ErrorCategory::Input, 3);
    pub const CONSTRAINT_VIOLATION: ErrorCode = ErrorCode::new(ErrorCategory::Input, 4);
    pub const UNKNOWN_OPERATION: ErrorCode = ErrorCode::new(ErrorCategory::Input, 5);
    pub const DUPLICATE_IDEMPOTENCY_KEY: ErrorCode = ErrorCode::new(ErrorCategory::Input, 6);
    pub const MALFORMED_PAYLOAD: ErrorCode = ErrorCode::new(ErrorCategory::Input, 7);
    pub const POLICY_DENIED: ErrorCode = ErrorCode::new(ErrorCategory::Auth, 1);
    pub const DEADLINE_EXCEEDED: ErrorCode = ErrorCode::new(ErrorCategory::Runtime, 1);
    pub const UNCLASSIFIED_FAILURE: ErrorCode = ErrorCode::new(ErrorCategory::Internal, 1);
    pub const OPERATION_PANICKED: ErrorCode = ErrorCode::new(ErrorCategory::Internal, 2);
}

/// Structured fix attached to an error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Suggestion {
    /// What the caller should do.
    pub message: String,
    /// Concrete invocation that would succeed, when one can be derived.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub command: Option<String>,
}

impl Suggestion {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            command: None,
        }
    }

    pub fn with_command(mut self, command: impl Into<String>) -> Self {
        self.command = Some(command.into());
        self
    }
}

/// A classified failure. The category is always derived from the code.
#[derive(Debug, Clone, PartialEq)]
pub struct ContractError {
    pub code: ErrorCode,
    pub message: String,
    pub suggestion: Option<Suggestion>,
    pub retryable: bool,
    pub field: Option<String>,
    pub details: Option<Value>,
}

impl ContractError {
    /// New error with the category's default retry hint.
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            suggestion: None,
            retryable: code.category().default_retryable(),
            field: None,
            details: None,
        }
    }

    pub fn category(&self) -> ErrorCategory {
        self.code.category()
    }

    pub fn exit_code(&self) -> i32 {
        self.category().exit_code()
    }

    pub fn with_field(mut self, field: impl Into<String>) -> Self {
        self.field = Some(field.into());
        self
    }

    pub fn with_suggestion(mut self, suggestion: Suggestion) -> Self {
        self.suggestion = Some(suggestion);
        self
    }

    pub fn with_retryable(mut self, retryable: bool) -> Self {
        self.retryable = retryable;
        self
    }

    pub fn with_details(mut self, details: Value) -> Self {
        self.details = Some(details);
        self
    }

    pub fn missing_required(field: &str) -> Self {
        ContractError::new(
            codes::MISSING_REQUIRED,
            format!("Missing required parameter '{}'", field),
        )
        .with_field(field)
    }

    pub fn unknown_argument(field: &str, message: impl Into<String>) -> Self {
        ContractError::new(codes::UNKNOWN_ARGUMENT, message).with_field(field)
    }

    pub fn type_mismatch(field: &str, message: impl Into<String>) -> Self {
        ContractError::new(codes::TYPE_MISMATCH, message).with_field(field)
    }

    pub fn constraint_violation(field: &str, message: impl Into<String>) -> Self {
        ContractError::new(codes::CONSTRAINT_VIOLATION, message).with_field(field)
    }
}

impl fmt::Display for ContractError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

impl std::error::Error for ContractError {}
