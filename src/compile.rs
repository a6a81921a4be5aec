//! Representation Compilers: pure projections of an [`OperationDescriptor`].
//!
//! - [`grammar`]: command-line token grammar and usage line
//! - [`schema`]: self-contained JSON Schema
//! - [`help`]: verbose and dense help text
//!
//! None of them re-derive parameter meaning; all admission goes through
//! [`crate::param::Parameter`].
//!
//! [`OperationDescriptor`]: crate::operation::OperationDescriptor

pub mod grammar;
pub mod help;
pub mod schema;

pub use grammar::Grammar;
pub use help::{render_catalog, render_dense, render_verbose};
pub use schema::{compile_schema, inline_refs, input_schema, output_schema, type_schema};
