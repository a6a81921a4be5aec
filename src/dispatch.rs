//! Invocation Dispatcher: validates input, consults policy, runs the handler under a
//! time budget and classifies whatever comes back.
//!
//! Every path out of [`Dispatcher::invoke`] is an [`Outcome`]; a failure always carries
//! exactly one category. Handlers never see arguments that failed validation.

pub mod clock;
pub mod context;
pub mod idempotency;
pub mod policy;

pub use clock::{Clock, ManualClock, SystemClock};
pub use context::{Input, InvocationContext, Phase};
pub use idempotency::{Claim, ClaimGuard, IdempotencyCache};
pub use policy::{AllowAll, CapabilityPolicy, PolicyCheck, PolicyDecision, PolicyRequest};

use crate::envelope::Outcome;
use crate::operation::{
    Arguments, CallContext, CancellationSignal, OperationDescriptor, OperationFailure, OperationHandle,
    Registry,
};
use crate::taxonomy::{codes, ContractError, ErrorCode, Suggestion};
use futures::FutureExt;
use serde_json::{json, Value};
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info_span, warn, Instrument};

/// Routes invocations to registered operations.
#[derive(Clone)]
pub struct Dispatcher {
    registry: Arc<Registry>,
    policy: Arc<dyn PolicyCheck>,
    clock: Arc<dyn Clock>,
    default_timeout: Option<Duration>,
    idempotency: Option<IdempotencyCache>,
}

impl Dispatcher {
    pub fn new(registry: Arc<Registry>) -> Self {
        Self {
            registry,
            policy: Arc::new(AllowAll),
            clock: Arc::new(SystemClock),
            default_timeout: None,
            idempotency: Some(IdempotencyCache::new()),
        }
    }

    pub fn with_policy<P: PolicyCheck + 'static>(mut self, policy: P) -> Self {
        self.policy = Arc::new(policy);
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Budget applied when the invocation context does not set one.
    pub fn with_default_timeout(mut self, timeout: Duration) -> Self {
        self.default_timeout = Some(timeout);
        self
    }

    /// Ignore idempotency keys entirely.
    pub fn without_idempotency(mut self) -> Self {
        self.idempotency = None;
        self
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Run one invocation to its terminal state.
    pub async fn invoke(&self, operation: &str, input: Input, cx: &InvocationContext) -> Outcome {
        let span = info_span!("invoke", operation = %operation, output = %cx.output);
        async move {
            debug!(phase = %Phase::Pending, "Invocation received");
            let outcome = self.run(operation, input, cx).await;
            let phase = if outcome.is_success() {
                Phase::Succeeded
            } else {
                Phase::Failed
            };
            debug!(
                phase = %phase,
                duration_ms = outcome.duration.as_millis() as u64,
                code = outcome.error().map(|e| e.code.to_string()),
                "Invocation finished"
            );
            debug!(phase = %Phase::Terminal, "Invocation closed");
            outcome
        }
        .instrument(span)
        .await
    }

    async fn run(&self, operation: &str, input: Input, cx: &InvocationContext) -> Outcome {
        let Some(handle) = self.registry.get(operation).cloned() else {
            return Outcome::failure(operation, None, self.unknown_operation(operation));
        };
        let descriptor = handle.descriptor();
        let version = Some(descriptor.version().to_string());
        let annotations = descriptor.annotations();
        let mut warnings = Vec::new();
        if let Some(message) = descriptor.deprecated() {
            warnings.push(format!("'{}' is deprecated: {}", operation, message));
        }
        let finish = |result: Result<Value, ContractError>, duration: Duration, warnings: Vec<String>| Outcome {
            operation: operation.to_string(),
            version: version.clone(),
            result,
            duration,
            warnings,
            annotations,
        };

        debug!(phase = %Phase::Validating, "Validating arguments");
        let arguments = match validate(&handle, input, cx) {
            Ok(arguments) => arguments,
            Err(error) => {
                debug!(code = %error.code, field = error.field.as_deref(), "Validation failed");
                return finish(Err(error), Duration::ZERO, warnings);
            }
        };
        debug!(arguments = %arguments.redacted(descriptor), "Arguments admitted");

        let request = PolicyRequest {
            operation,
            annotations,
            capabilities: descriptor.capabilities(),
            arguments: &arguments,
        };
        if let PolicyDecision::Deny { reason } = self.policy.check(&request) {
            debug!(reason = %reason, "Policy denied invocation");
            return finish(
                Err(ContractError::new(codes::POLICY_DENIED, reason)),
                Duration::ZERO,
                warnings,
            );
        }

        if cx.dry_run {
            let echo = json!({
                "dry_run": true,
                "operation": operation,
                "arguments": arguments.redacted(descriptor),
            });
            return finish(Ok(echo), Duration::ZERO, warnings);
        }

        let guard = match (&self.idempotency, cx.idempotency_key.as_deref()) {
            (Some(cache), Some(key)) => loop {
                match cache.claim(operation, key, annotations.is_idempotent()) {
                    Claim::Execute(guard) => break Some(guard),
                    Claim::Replay(outcome) => {
                        debug!(key, "Replaying stored outcome");
                        return outcome;
                    }
                    Claim::Wait(receiver) => {
                        debug!(key, "Waiting for in-flight invocation with the same key");
                        idempotency::wait_for_release(receiver).await;
                    }
                    Claim::Duplicate => {
                        let error = ContractError::new(
                            codes::DUPLICATE_IDEMPOTENCY_KEY,
                            format!("Idempotency key '{}' was already used for '{}'", key, operation),
                        )
                        .with_retryable(false)
                        .with_suggestion(Suggestion::new("Use a fresh idempotency key for a new attempt"));
                        return finish(Err(error), Duration::ZERO, warnings);
                    }
                }
            },
            _ => None,
        };

        debug!(phase = %Phase::Executing, "Executing operation");
        let signal = CancellationSignal::new();
        let call_cx = CallContext::new(operation, signal.clone(), cx.verbose);
        let handler = handle.handler();
        let started = self.clock.now();
        let call = AssertUnwindSafe(handler.call(arguments, call_cx.clone())).catch_unwind();
        let budget = cx.timeout.or(self.default_timeout);
        let result = match budget {
            Some(budget) => match tokio::time::timeout(budget, call).await {
                Ok(returned) => self.classify(descriptor, returned, cx.verbose),
                Err(_) => {
                    signal.cancel();
                    warn!(budget_ms = budget.as_millis() as u64, "Time budget exceeded");
                    Err(deadline_exceeded(operation, budget))
                }
            },
            None => self.classify(descriptor, call.await, cx.verbose),
        };
        let duration = self.clock.now().saturating_duration_since(started);

        warnings.extend(call_cx.warnings());
        let outcome = finish(result, duration, warnings);
        if let Some(guard) = guard {
            if outcome.is_success() {
                guard.complete(outcome.clone());
            }
        }
        outcome
    }

    pub(crate) fn unknown_operation(&self, operation: &str) -> ContractError {
        let application = self.registry.application();
        let suggestion = match self.registry.closest(operation) {
            Some(candidate) => Suggestion::new(format!("Did you mean '{}'?", candidate))
                .with_command(format!("{} {} --help", application, candidate)),
            None => Suggestion::new("List the available operations").with_command(format!("{} --help", application)),
        };
        ContractError::new(
            codes::UNKNOWN_OPERATION,
            format!("Unknown operation '{}'", operation),
        )
        .with_suggestion(suggestion)
    }

    fn classify(
        &self,
        descriptor: &OperationDescriptor,
        returned: Result<Result<Value, OperationFailure>, Box<dyn Any + Send>>,
        verbose: bool,
    ) -> Result<Value, ContractError> {
        match returned {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(failure)) => Err(classify_failure(descriptor, failure, verbose)),
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                warn!(panic = %message, "Operation panicked");
                let mut error = ContractError::new(
                    codes::OPERATION_PANICKED,
                    format!("'{}' terminated unexpectedly", descriptor.name()),
                )
                .with_retryable(false);
                if verbose {
                    error = error.with_details(json!({ "panic": message }));
                }
                Err(error)
            }
        }
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("operations", &self.registry.len())
            .field("default_timeout", &self.default_timeout)
            .field("idempotency", &self.idempotency)
            .finish_non_exhaustive()
    }
}

fn validate(handle: &OperationHandle, input: Input, cx: &InvocationContext) -> Result<Arguments, ContractError> {
    let descriptor = handle.descriptor();
    let mut arguments = match input {
        Input::Tokens(tokens) => handle.grammar().parse(&tokens)?,
        Input::Payload(payload) => Arguments::from_payload(descriptor, &payload)?,
    };
    for param in descriptor.injected_parameters() {
        // Injected values come from the host, so a bad one is an internal fault.
        let value = match cx.injected.get(param.name()) {
            Some(value) => param
                .admit_value(value, descriptor.definitions())
                .map_err(|error| {
                    ContractError::new(
                        codes::UNCLASSIFIED_FAILURE,
                        format!("Host supplied an invalid value for '{}': {}", param.name(), error.message),
                    )
                    .with_retryable(false)
                })?,
            None => match param.default() {
                Some(default) => default.clone(),
                None => {
                    return Err(ContractError::new(
                        codes::UNCLASSIFIED_FAILURE,
                        format!("Host did not supply parameter '{}'", param.name()),
                    )
                    .with_retryable(false))
                }
            },
        };
        arguments.insert(param.name(), value);
    }
    Ok(arguments)
}

/// Declared codes keep their meaning; everything else is an unclassified internal failure.
fn classify_failure(descriptor: &OperationDescriptor, failure: OperationFailure, verbose: bool) -> ContractError {
    let declared = failure
        .code
        .as_deref()
        .and_then(|raw| raw.parse::<ErrorCode>().ok())
        .and_then(|code| descriptor.declared_error(&code).map(|declared| (code, declared)));

    match declared {
        Some((code, declared)) => {
            let mut error = ContractError::new(code, failure.message);
            if let Some(retryable) = declared.retryable {
                error = error.with_retryable(retryable);
            }
            error.field = failure.field;
            error.suggestion = failure.suggestion;
            error.details = failure.details;
            error
        }
        None => {
            warn!(code = failure.code.as_deref(), message = %failure.message, "Unclassified operation failure");
            let mut error = ContractError::new(
                codes::UNCLASSIFIED_FAILURE,
                format!("'{}' failed with an unclassified error", descriptor.name()),
            )
            .with_retryable(false);
            if verbose {
                error = error.with_details(json!({
                    "message": failure.message,
                    "code": failure.code,
                    "details": failure.details,
                }));
            }
            error
        }
    }
}

fn deadline_exceeded(operation: &str, budget: Duration) -> ContractError {
    ContractError::new(
        codes::DEADLINE_EXCEEDED,
        format!("'{}' did not finish within {:.3}s", operation, budget.as_secs_f64()),
    )
    .with_retryable(true)
    .with_suggestion(Suggestion::new("Retry with a larger --timeout"))
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
