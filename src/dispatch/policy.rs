//! External policy check, consulted after validation and before execution.
//!
//! The engine does not decide policy; it hands declared annotations and capability
//! requirements to a [`PolicyCheck`] and treats a deny as an `Auth` failure.

use crate::operation::{Annotations, Arguments};
use std::collections::HashSet;

/// What the policy layer sees about one pending invocation.
#[derive(Debug, Clone, Copy)]
pub struct PolicyRequest<'a> {
    pub operation: &'a str,
    pub annotations: Annotations,
    pub capabilities: &'a [String],
    pub arguments: &'a Arguments,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PolicyDecision {
    Allow,
    Deny { reason: String },
}

impl PolicyDecision {
    pub fn deny(reason: impl Into<String>) -> Self {
        PolicyDecision::Deny {
            reason: reason.into(),
        }
    }
}

pub trait PolicyCheck: Send + Sync {
    fn check(&self, request: &PolicyRequest<'_>) -> PolicyDecision;
}

impl<F> PolicyCheck for F
where
    F: Fn(&PolicyRequest<'_>) -> PolicyDecision + Send + Sync,
{
    fn check(&self, request: &PolicyRequest<'_>) -> PolicyDecision {
        self(request)
    }
}

/// Allows everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct AllowAll;

impl PolicyCheck for AllowAll {
    fn check(&self, _request: &PolicyRequest<'_>) -> PolicyDecision {
        PolicyDecision::Allow
    }
}

/// Grants a fixed capability set; optionally refuses destructive operations.
#[derive(Debug, Clone)]
pub struct CapabilityPolicy {
    granted: HashSet<String>,
    allow_destructive: bool,
}

impl CapabilityPolicy {
    pub fn new<I, S>(granted: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            granted: granted.into_iter().map(Into::into).collect(),
            allow_destructive: true,
        }
    }

    pub fn deny_destructive(mut self) -> Self {
        self.allow_destructive = false;
        self
    }
}

impl Default for CapabilityPolicy {
    fn default() -> Self {
        Self::new(Vec::<String>::new())
    }
}

impl PolicyCheck for CapabilityPolicy {
    fn check(&self, request: &PolicyRequest<'_>) -> PolicyDecision {
        if !self.allow_destructive && request.annotations.is_destructive() {
            return PolicyDecision::deny(format!(
                "'{}' is destructive and destructive operations are not allowed",
                request.operation
            ));
        }
        let missing: Vec<&str> = request
            .capabilities
            .iter()
            .filter(|c| !self.granted.contains(c.as_str()))
            .map(String::as_str)
            .collect();
        if missing.is_empty() {
            PolicyDecision::Allow
        } else {
            PolicyDecision::deny(format!(
                "'{}' requires capabilities not granted: {}",
                request.operation,
                missing.join(", ")
            ))
        }
    }
}
