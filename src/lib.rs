//! Opspec: Command Contract Engine
//!
//! One declarative [`operation::OperationDescriptor`] per command, projected into every
//! representation a caller sees: a command-line grammar, a self-contained JSON Schema,
//! verbose and dense help, and a dispatcher whose outcomes are encoded as envelopes.

pub mod cli;
pub mod compile;
pub mod config;
pub mod dispatch;
pub mod envelope;
pub mod error;
pub mod logging;
pub mod operation;
pub mod param;
pub mod taxonomy;
