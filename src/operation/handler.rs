//! The seam between the engine and the code an operation runs.

use super::arguments::Arguments;
use crate::taxonomy::Suggestion;
use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Notify;

/// Failure raised by a handler.
///
/// A `code` matching one of the operation's declared errors is classified by that
/// declaration; anything else becomes an unclassified internal failure.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{message}")]
pub struct OperationFailure {
    pub code: Option<String>,
    pub message: String,
    pub field: Option<String>,
    pub details: Option<Value>,
    pub suggestion: Option<Suggestion>,
}

impl OperationFailure {
    /// Unclassified failure.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            code: None,
            message: message.into(),
            field: None,
            details: None,
            suggestion: None,
        }
    }

    /// Failure carrying one of the operation's declared codes.
    pub fn coded(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: Some(code.into()),
            ..Self::new(message)
        }
    }

    /// Wrap any error as an unclassified failure.
    pub fn from_error(err: &dyn std::error::Error) -> Self {
        Self::new(err.to_string())
    }

    pub fn with_field(mut self, field: impl Into<String>) -> Self {
        self.field = Some(field.into());
        self
    }

    pub fn with_details(mut self, details: Value) -> Self {
        self.details = Some(details);
        self
    }

    pub fn with_suggestion(mut self, suggestion: Suggestion) -> Self {
        self.suggestion = Some(suggestion);
        self
    }
}

/// Best-effort cancellation flag shared between the dispatcher and a handler.
#[derive(Debug, Clone, Default)]
pub struct CancellationSignal {
    inner: Arc<SignalInner>,
}

#[derive(Debug, Default)]
struct SignalInner {
    cancelled: AtomicBool,
    notify: Notify,
}

impl CancellationSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.inner.cancelled.store(true, Ordering::SeqCst);
        self.inner.notify.notify_waiters();
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::SeqCst)
    }

    /// Resolves once [`CancellationSignal::cancel`] has been called.
    pub async fn cancelled(&self) {
        loop {
            let notified = self.inner.notify.notified();
            if self.is_cancelled() {
                return;
            }
            notified.await;
        }
    }
}

/// Per-call view handed to a handler.
#[derive(Debug, Clone)]
pub struct CallContext {
    operation: String,
    cancel: CancellationSignal,
    warnings: Arc<Mutex<Vec<String>>>,
    verbose: bool,
}

impl CallContext {
    pub fn new(operation: impl Into<String>, cancel: CancellationSignal, verbose: bool) -> Self {
        Self {
            operation: operation.into(),
            cancel,
            warnings: Arc::new(Mutex::new(Vec::new())),
            verbose,
        }
    }

    pub fn operation(&self) -> &str {
        &self.operation
    }

    /// Attach a warning to the envelope's `meta.warnings`.
    pub fn warn(&self, message: impl Into<String>) {
        self.warnings.lock().push(message.into());
    }

    pub fn warnings(&self) -> Vec<String> {
        self.warnings.lock().clone()
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub async fn cancelled(&self) {
        self.cancel.cancelled().await
    }

    pub fn verbose(&self) -> bool {
        self.verbose
    }
}

/// Code an operation runs once its arguments are validated.
#[async_trait]
pub trait Handler: Send + Sync {
    async fn call(&self, arguments: Arguments, cx: CallContext) -> Result<Value, OperationFailure>;
}

/// [`Handler`] backed by an async closure.
pub struct FnHandler<F> {
    f: F,
}

/// Wrap `Fn(Arguments, CallContext) -> impl Future<Output = Result<Value, OperationFailure>>`.
pub fn handler_fn<F, Fut>(f: F) -> FnHandler<F>
where
    F: Fn(Arguments, CallContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Value, OperationFailure>> + Send + 'static,
{
    FnHandler { f }
}

#[async_trait]
impl<F, Fut> Handler for FnHandler<F>
where
    F: Fn(Arguments, CallContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Value, OperationFailure>> + Send + 'static,
{
    async fn call(&self, arguments: Arguments, cx: CallContext) -> Result<Value, OperationFailure> {
        (self.f)(arguments, cx).await
    }
}
