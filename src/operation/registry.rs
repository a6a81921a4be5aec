//! Operation registry: the single owner of every descriptor in one application.

use super::descriptor::{OperationBuilder, OperationDescriptor};
use super::handler::Handler;
use crate::compile::Grammar;
use crate::error::RegistrationError;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// A registered operation: descriptor, compiled grammar, and handler.
pub struct RegisteredOperation {
    descriptor: OperationDescriptor,
    grammar: Grammar,
    handler: Arc<dyn Handler>,
}

impl RegisteredOperation {
    pub fn descriptor(&self) -> &OperationDescriptor {
        &self.descriptor
    }

    pub fn grammar(&self) -> &Grammar {
        &self.grammar
    }

    pub fn handler(&self) -> Arc<dyn Handler> {
        Arc::clone(&self.handler)
    }

    pub fn name(&self) -> &str {
        self.descriptor.name()
    }
}

impl std::fmt::Debug for RegisteredOperation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegisteredOperation")
            .field("descriptor", &self.descriptor)
            .finish_non_exhaustive()
    }
}

/// Handle returned by registration; cheap to clone and share across invocations.
pub type OperationHandle = Arc<RegisteredOperation>;

/// Holds all operations for one application, in registration order.
#[derive(Debug)]
pub struct Registry {
    application: String,
    operations: Vec<OperationHandle>,
    index: HashMap<String, usize>,
}

impl Registry {
    /// Create an empty registry for the named application.
    pub fn new(application: impl Into<String>) -> Self {
        Self {
            application: application.into(),
            operations: Vec::new(),
            index: HashMap::new(),
        }
    }

    /// Application name used in usage lines and suggestions.
    pub fn application(&self) -> &str {
        &self.application
    }

    /// Register a built descriptor with its handler.
    pub fn register<H>(&mut self, descriptor: OperationDescriptor, handler: H) -> Result<OperationHandle, RegistrationError>
    where
        H: Handler + 'static,
    {
        if self.index.contains_key(descriptor.name()) {
            return Err(RegistrationError::DuplicateOperation(descriptor.name().to_string()));
        }
        let grammar = Grammar::compile(&descriptor);
        let handle = Arc::new(RegisteredOperation {
            descriptor,
            grammar,
            handler: Arc::new(handler),
        });
        debug!(
            operation = handle.name(),
            version = handle.descriptor().version(),
            "Registered operation"
        );
        self.index.insert(handle.name().to_string(), self.operations.len());
        self.operations.push(Arc::clone(&handle));
        Ok(handle)
    }

    /// Build and register in one step.
    pub fn add<H>(&mut self, builder: OperationBuilder, handler: H) -> Result<OperationHandle, RegistrationError>
    where
        H: Handler + 'static,
    {
        self.register(builder.build()?, handler)
    }

    pub fn get(&self, name: &str) -> Option<&OperationHandle> {
        self.index.get(name).map(|&i| &self.operations[i])
    }

    /// All operations in registration order.
    pub fn operations(&self) -> &[OperationHandle] {
        &self.operations
    }

    pub fn names(&self) -> Vec<&str> {
        self.operations.iter().map(|op| op.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.operations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    /// Registered name closest to `name`, for "did you mean" suggestions.
    pub fn closest(&self, name: &str) -> Option<&str> {
        self.operations
            .iter()
            .map(|op| (op.name(), edit_distance(name, op.name())))
            .filter(|(candidate, distance)| *distance <= 2.max(candidate.len() / 3))
            .min_by_key(|(_, distance)| *distance)
            .map(|(candidate, _)| candidate)
    }
}

fn edit_distance(a: &str, b: &str) -> usize {
    let b: Vec<char> = b.chars().collect();
    let mut previous: Vec<usize> = (0..=b.len()).collect();
    for (i, ca) in a.chars().enumerate() {
        let mut current = vec![i + 1];
        for (j, cb) in b.iter().enumerate() {
            let substitution = previous[j] + usize::from(ca != *cb);
            current.push(substitution.min(previous[j + 1] + 1).min(current[j] + 1));
        }
        previous = current;
    }
    previous[b.len()]
}
