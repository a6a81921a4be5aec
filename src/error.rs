//! Error types for the command contract engine.
//!
//! These are construction-time and host-level failures. Per-invocation failures are
//! classified [`crate::taxonomy::ContractError`] values instead.

use crate::taxonomy::InvalidErrorCode;
use thiserror::Error;

/// A type or schema cannot be expressed in the structural-type subset.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchemaError {
    #[error("Type '{0}' cannot be represented as a structural type")]
    Unrepresentable(String),

    #[error("Malformed type notation '{notation}': {reason}")]
    MalformedNotation { notation: String, reason: String },

    #[error("Unknown type definition '{0}'")]
    UnknownDefinition(String),

    #[error("Cyclic type definition: {0}")]
    Cycle(String),

    #[error("Unresolvable schema reference '{0}'")]
    UnresolvedRef(String),

    #[error("Unsupported schema reference '{0}': only local JSON pointers are inlined")]
    UnsupportedRef(String),
}

/// Rejected at operation registration time; never surfaces during invocation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistrationError {
    #[error("Invalid parameter '{param}': {reason}")]
    InvalidParameter { param: String, reason: String },

    #[error("Duplicate parameter name '{0}'")]
    DuplicateParameter(String),

    #[error("Parameter '{0}' collides with a reserved CLI flag")]
    ReservedName(String),

    #[error("Default for '{param}' does not satisfy its own type or constraints: {reason}")]
    InvalidDefault { param: String, reason: String },

    #[error("Operation '{0}' cannot be both read_only and destructive")]
    ConflictingAnnotations(String),

    #[error("Only the final positional parameter may be array-typed (found '{0}')")]
    ArrayPositionalNotLast(String),

    #[error("Invalid operation name '{0}'")]
    InvalidName(String),

    #[error("Operation '{0}' is already registered")]
    DuplicateOperation(String),

    #[error(transparent)]
    InvalidErrorCode(#[from] InvalidErrorCode),

    #[error("Error code {0} is declared more than once")]
    DuplicateErrorCode(String),

    #[error("Declared error code {0} is in the engine-reserved range")]
    ReservedErrorCode(String),

    #[error("Schema error: {0}")]
    Schema(#[from] SchemaError),
}

/// Host-level failures: configuration, logging, process surface.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Registration error: {0}")]
    Registration(#[from] RegistrationError),

    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

impl From<config::ConfigError> for EngineError {
    fn from(err: config::ConfigError) -> Self {
        EngineError::ConfigError(err.to_string())
    }
}
