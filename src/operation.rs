//! Operation Descriptor and registry.
//!
//! An operation is registered once, through [`OperationDescriptor::builder`], and is
//! immutable afterwards. The registry hands back an [`OperationHandle`] that the
//! compilers and the dispatcher share.

pub mod annotations;
pub mod arguments;
pub mod descriptor;
pub mod handler;
pub mod registry;

pub use annotations::{Annotation, Annotations};
pub use arguments::Arguments;
pub use descriptor::{
    DeclaredError, Example, OperationBuilder, OperationDescriptor, ReturnShape, RESERVED_FLAGS,
};
pub use handler::{handler_fn, CallContext, CancellationSignal, FnHandler, Handler, OperationFailure};
pub use registry::{OperationHandle, RegisteredOperation, Registry};
