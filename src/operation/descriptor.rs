//! Operation Descriptor: the immutable, canonical model of one command.
//!
//! Descriptors are assembled with [`OperationBuilder`]; every invariant is checked in
//! [`OperationBuilder::build`] so a descriptor that exists is always valid.

use super::annotations::{Annotation, Annotations};
use super::arguments::Arguments;
use crate::compile::schema::inline_refs;
use crate::error::{RegistrationError, SchemaError};
use crate::param::{Definitions, ParamKind, Parameter, ParameterBuilder, RawParam, ValueType};
use crate::taxonomy::ErrorCode;
use serde_json::Value;
use std::collections::{BTreeMap, HashSet};

/// Global CLI flags a parameter flag may not shadow.
pub const RESERVED_FLAGS: &[&str] = &[
    "output",
    "schema",
    "timeout",
    "idempotency-key",
    "verbose",
    "dry-run",
    "help",
    "config",
    "log-level",
    "log-format",
];

/// Description of an operation's return value.
#[derive(Debug, Clone, PartialEq)]
pub enum ReturnShape {
    /// A structural type, compiled like a parameter type.
    Type(ValueType),
    /// A raw JSON Schema; local `$ref`s are inlined when compiled.
    Schema(Value),
}

/// Documentation and retry hint for an operation-specific error code.
#[derive(Debug, Clone, PartialEq)]
pub struct DeclaredError {
    pub documentation: String,
    /// Overrides the category default when set.
    pub retryable: Option<bool>,
}

/// Worked example: argument values plus what they demonstrate.
#[derive(Debug, Clone, PartialEq)]
pub struct Example {
    pub arguments: Arguments,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OperationDescriptor {
    name: String,
    documentation: String,
    parameters: Vec<Parameter>,
    return_shape: Option<ReturnShape>,
    annotations: Annotations,
    declared_errors: BTreeMap<ErrorCode, DeclaredError>,
    examples: Vec<Example>,
    version: String,
    definitions: Definitions,
    capabilities: Vec<String>,
    deprecated: Option<String>,
}

impl OperationDescriptor {
    pub fn builder(name: impl Into<String>) -> OperationBuilder {
        OperationBuilder::new(name.into())
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn documentation(&self) -> &str {
        &self.documentation
    }

    /// First non-empty documentation line.
    pub fn summary(&self) -> &str {
        self.documentation
            .lines()
            .map(str::trim)
            .find(|line| !line.is_empty())
            .unwrap_or("")
    }

    /// All parameters in declaration order, injected ones included.
    pub fn parameters(&self) -> &[Parameter] {
        &self.parameters
    }

    /// Parameters callers can see and supply.
    pub fn visible_parameters(&self) -> impl Iterator<Item = &Parameter> {
        self.parameters.iter().filter(|p| !p.is_injected())
    }

    pub fn injected_parameters(&self) -> impl Iterator<Item = &Parameter> {
        self.parameters.iter().filter(|p| p.is_injected())
    }

    pub fn parameter(&self, name: &str) -> Option<&Parameter> {
        self.parameters.iter().find(|p| p.name() == name)
    }

    pub fn return_shape(&self) -> Option<&ReturnShape> {
        self.return_shape.as_ref()
    }

    pub fn annotations(&self) -> Annotations {
        self.annotations
    }

    pub fn declared_errors(&self) -> &BTreeMap<ErrorCode, DeclaredError> {
        &self.declared_errors
    }

    pub fn declared_error(&self, code: &ErrorCode) -> Option<&DeclaredError> {
        self.declared_errors.get(code)
    }

    pub fn examples(&self) -> &[Example] {
        &self.examples
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn definitions(&self) -> &Definitions {
        &self.definitions
    }

    pub fn capabilities(&self) -> &[String] {
        &self.capabilities
    }

    pub fn deprecated(&self) -> Option<&str> {
        self.deprecated.as_deref()
    }
}

/// Registration-time builder for [`OperationDescriptor`].
///
/// Parameter errors are collected and reported by [`OperationBuilder::build`] so the
/// builder chain stays infallible.
#[derive(Debug)]
pub struct OperationBuilder {
    name: String,
    documentation: String,
    parameters: Vec<Result<Parameter, RegistrationError>>,
    return_shape: Option<ReturnShape>,
    annotations: Annotations,
    declared_errors: Vec<(String, DeclaredError)>,
    examples: Vec<(Value, String)>,
    version: String,
    definitions: Definitions,
    capabilities: Vec<String>,
    deprecated: Option<String>,
}

impl OperationBuilder {
    fn new(name: String) -> Self {
        Self {
            name,
            documentation: String::new(),
            parameters: Vec::new(),
            return_shape: None,
            annotations: Annotations::NONE,
            declared_errors: Vec::new(),
            examples: Vec::new(),
            version: "1.0.0".to_string(),
            definitions: Definitions::new(),
            capabilities: Vec::new(),
            deprecated: None,
        }
    }

    pub fn doc(mut self, documentation: impl Into<String>) -> Self {
        self.documentation = documentation.into();
        self
    }

    pub fn param(mut self, builder: ParameterBuilder) -> Self {
        self.parameters.push(builder.build());
        self
    }

    /// Add a parameter from introspected signature information.
    pub fn signature(mut self, raw: RawParam) -> Self {
        self.parameters.push(Parameter::from_signature(raw));
        self
    }

    pub fn returns(mut self, value_type: ValueType) -> Self {
        self.return_shape = Some(ReturnShape::Type(value_type));
        self
    }

    pub fn returns_schema(mut self, schema: Value) -> Self {
        self.return_shape = Some(ReturnShape::Schema(schema));
        self
    }

    /// Union the given annotations into the set.
    pub fn annotate(mut self, annotations: impl Into<Annotations>) -> Self {
        self.annotations = self.annotations | annotations.into();
        self
    }

    pub fn error(self, code: &str, documentation: impl Into<String>) -> Self {
        self.declare_error(code, documentation.into(), None)
    }

    pub fn error_with_retry(self, code: &str, documentation: impl Into<String>, retryable: bool) -> Self {
        self.declare_error(code, documentation.into(), Some(retryable))
    }

    fn declare_error(mut self, code: &str, documentation: String, retryable: Option<bool>) -> Self {
        self.declared_errors.push((
            code.to_string(),
            DeclaredError {
                documentation,
                retryable,
            },
        ));
        self
    }

    /// Add an example; `arguments` must be an object that validates against the parameters.
    pub fn example(mut self, arguments: Value, description: impl Into<String>) -> Self {
        self.examples.push((arguments, description.into()));
        self
    }

    pub fn version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    /// Declare a shared named type that parameters can reference by name.
    pub fn define(mut self, name: impl Into<String>, value_type: ValueType) -> Self {
        self.definitions.insert(name.into(), value_type);
        self
    }

    pub fn requires(mut self, capability: impl Into<String>) -> Self {
        self.capabilities.push(capability.into());
        self
    }

    pub fn deprecated(mut self, message: impl Into<String>) -> Self {
        self.deprecated = Some(message.into());
        self
    }

    pub fn build(self) -> Result<OperationDescriptor, RegistrationError> {
        if !is_operation_name(&self.name) {
            return Err(RegistrationError::InvalidName(self.name));
        }
        if self.annotations.contains(Annotation::ReadOnly)
            && self.annotations.contains(Annotation::Destructive)
        {
            return Err(RegistrationError::ConflictingAnnotations(self.name));
        }

        for (name, value_type) in &self.definitions {
            if !name.starts_with(|c: char| c.is_ascii_uppercase()) {
                return Err(SchemaError::MalformedNotation {
                    notation: name.clone(),
                    reason: "definition names start with an uppercase letter".to_string(),
                }
                .into());
            }
            value_type.check_references(&self.definitions)?;
        }

        let parameters = self.parameters.into_iter().collect::<Result<Vec<_>, _>>()?;
        check_parameters(&parameters, &self.definitions)?;

        match &self.return_shape {
            Some(ReturnShape::Type(value_type)) => value_type.check_references(&self.definitions)?,
            Some(ReturnShape::Schema(schema)) => {
                inline_refs(schema)?;
            }
            None => {}
        }

        let mut declared_errors = BTreeMap::new();
        for (code, declared) in self.declared_errors {
            let code: ErrorCode = code.parse()?;
            if code.is_reserved() {
                return Err(RegistrationError::ReservedErrorCode(code.to_string()));
            }
            if declared_errors.contains_key(&code) {
                return Err(RegistrationError::DuplicateErrorCode(code.to_string()));
            }
            declared_errors.insert(code, declared);
        }

        let mut descriptor = OperationDescriptor {
            name: self.name,
            documentation: self.documentation.trim().to_string(),
            parameters,
            return_shape: self.return_shape,
            annotations: self.annotations,
            declared_errors,
            examples: Vec::new(),
            version: self.version,
            definitions: self.definitions,
            capabilities: self.capabilities,
            deprecated: self.deprecated,
        };

        let mut examples = Vec::with_capacity(self.examples.len());
        for (arguments, description) in self.examples {
            let arguments = Arguments::from_payload(&descriptor, &arguments).map_err(|e| {
                RegistrationError::InvalidParameter {
                    param: e.field.clone().unwrap_or_else(|| "example".to_string()),
                    reason: format!("example '{}' is invalid: {}", description, e.message),
                }
            })?;
            examples.push(Example {
                arguments,
                description,
            });
        }
        descriptor.examples = examples;
        Ok(descriptor)
    }
}

fn check_parameters(parameters: &[Parameter], definitions: &Definitions) -> Result<(), RegistrationError> {
    let mut seen = HashSet::new();
    for parameter in parameters {
        if !seen.insert(parameter.name()) {
            return Err(RegistrationError::DuplicateParameter(parameter.name().to_string()));
        }
        parameter.validate(definitions)?;
    }

    let visible: Vec<&Parameter> = parameters.iter().filter(|p| !p.is_injected()).collect();
    for parameter in &visible {
        if parameter.kind() == ParamKind::Named && RESERVED_FLAGS.contains(&parameter.flag().as_str()) {
            return Err(RegistrationError::ReservedName(parameter.name().to_string()));
        }
    }

    // `--no-<flag>` must stay unambiguous.
    for parameter in visible.iter().filter(|p| p.is_flag() || (p.kind() == ParamKind::Named && p.is_repeated())) {
        let negated = format!("no_{}", parameter.name());
        if visible.iter().any(|p| p.kind() == ParamKind::Named && p.name() == negated) {
            return Err(RegistrationError::InvalidParameter {
                param: negated,
                reason: format!("collides with the negated form of '--{}'", parameter.flag()),
            });
        }
    }

    let positionals: Vec<&&Parameter> = visible
        .iter()
        .filter(|p| p.kind() == ParamKind::Positional)
        .collect();
    let mut optional_seen: Option<&str> = None;
    for (index, parameter) in positionals.iter().enumerate() {
        if parameter.is_repeated() && index + 1 != positionals.len() {
            return Err(RegistrationError::ArrayPositionalNotLast(parameter.name().to_string()));
        }
        match (parameter.required(), optional_seen) {
            (true, Some(previous)) => {
                return Err(RegistrationError::InvalidParameter {
                    param: parameter.name().to_string(),
                    reason: format!(
                        "required positional follows optional positional '{}'",
                        previous
                    ),
                })
            }
            (false, None) => optional_seen = Some(parameter.name()),
            _ => {}
        }
    }
    Ok(())
}

fn is_operation_name(name: &str) -> bool {
    let mut chars = name.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_lowercase())
        && chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' || c == '_')
}
