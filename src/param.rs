//! Parameter Model: the canonical typed description of one input value.
//!
//! A [`Parameter`] is built once at registration, either explicitly through
//! [`Parameter::positional`]/[`Parameter::named`] or from raw signature information via
//! [`Parameter::from_signature`], and is immutable afterwards. Every representation
//! compiler reads it; none of them re-derive its meaning.

pub mod coerce;
pub mod constraints;
pub mod notation;
pub mod value_type;

pub use coerce::{check_value, coerce_token, render_token, CoerceError, NULL_TOKEN};
pub use constraints::{Constraints, Pattern};
pub use notation::parse_type;
pub use value_type::{Definitions, Field, ValueType};

use crate::error::RegistrationError;
use crate::taxonomy::ContractError;
use serde_json::Value;

/// Placeholder shown instead of secret values.
pub const REDACTED: &str = "***";

/// How a parameter is supplied on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamKind {
    Positional,
    Named,
}

/// Who supplies the value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    /// Visible to callers; appears in every representation.
    Author,
    /// Supplied by the host at dispatch time; hidden from parser, schema and help.
    Injected,
}

/// Canonical description of one parameter.
#[derive(Debug, Clone, PartialEq)]
pub struct Parameter {
    name: String,
    kind: ParamKind,
    value_type: ValueType,
    constraints: Constraints,
    default: Option<Value>,
    documentation: Option<String>,
    is_secret: bool,
    origin: Origin,
}

/// Raw, introspected signature information for one parameter.
#[derive(Debug, Clone, Default)]
pub struct RawParam {
    pub name: String,
    /// Type annotation in the notation read by [`parse_type`].
    pub annotation: String,
    pub default: Option<Value>,
    pub documentation: Option<String>,
    /// Explicit kind; when absent, parameters without a default are positional.
    pub kind: Option<ParamKind>,
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub pattern: Option<String>,
    pub secret: bool,
    pub injected: bool,
}

impl Parameter {
    /// Start a positional parameter.
    pub fn positional(name: impl Into<String>, value_type: ValueType) -> ParameterBuilder {
        ParameterBuilder::new(name.into(), ParamKind::Positional, value_type)
    }

    /// Start a named (`--flag`) parameter.
    pub fn named(name: impl Into<String>, value_type: ValueType) -> ParameterBuilder {
        ParameterBuilder::new(name.into(), ParamKind::Named, value_type)
    }

    /// Build a parameter from introspected signature information.
    ///
    /// Fails with [`SchemaError`] (wrapped) when the annotation falls outside the
    /// structural-type subset.
    pub fn from_signature(raw: RawParam) -> Result<Parameter, RegistrationError> {
        let value_type = parse_type(&raw.annotation)?;
        let kind = raw.kind.unwrap_or(if raw.default.is_some() {
            ParamKind::Named
        } else {
            ParamKind::Positional
        });
        let mut builder = ParameterBuilder::new(raw.name, kind, value_type);
        builder.default = raw.default;
        builder.documentation = raw.documentation;
        builder.min = raw.min;
        builder.max = raw.max;
        builder.pattern = raw.pattern;
        builder.secret = raw.secret;
        if raw.injected {
            builder.origin = Origin::Injected;
        }
        builder.build()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Command-line flag spelling (`max_items` becomes `max-items`).
    pub fn flag(&self) -> String {
        self.name.replace('_', "-")
    }

    pub fn kind(&self) -> ParamKind {
        self.kind
    }

    pub fn value_type(&self) -> &ValueType {
        &self.value_type
    }

    pub fn constraints(&self) -> &Constraints {
        &self.constraints
    }

    pub fn default(&self) -> Option<&Value> {
        self.default.as_ref()
    }

    /// Required exactly when no default is declared.
    pub fn required(&self) -> bool {
        self.default.is_none()
    }

    pub fn documentation(&self) -> Option<&str> {
        self.documentation.as_deref()
    }

    pub fn is_secret(&self) -> bool {
        self.is_secret
    }

    pub fn origin(&self) -> Origin {
        self.origin
    }

    pub fn is_injected(&self) -> bool {
        self.origin == Origin::Injected
    }

    /// Boolean parameters that use bare `--flag` / `--no-flag` forms.
    pub fn is_flag(&self) -> bool {
        self.kind == ParamKind::Named && self.value_type.is_boolean()
    }

    /// Array parameters accumulate one item per occurrence.
    pub fn is_repeated(&self) -> bool {
        self.value_type.array_item().is_some()
    }

    /// Value suitable for logs and echoes.
    pub fn redact(&self, value: &Value) -> Value {
        if self.is_secret {
            Value::String(REDACTED.to_string())
        } else {
            value.clone()
        }
    }

    /// Admit one command-line token for a scalar parameter.
    pub fn admit_token(&self, token: &str, definitions: &Definitions) -> Result<Value, ContractError> {
        self.admit_with(definitions, |ty, defs| coerce_token(ty, token, defs))
    }

    /// Admit accumulated tokens for an array parameter, in encounter order.
    pub fn admit_tokens(&self, tokens: &[String], definitions: &Definitions) -> Result<Value, ContractError> {
        let item = self.value_type.array_item().ok_or_else(|| {
            ContractError::type_mismatch(&self.name, format!("'{}' does not accept repeated values", self.name))
        })?;
        let items = tokens
            .iter()
            .map(|token| self.admit_item(item, token, definitions))
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| self.classify(e))?;
        let value = Value::Array(items);
        self.constraints
            .check(&value)
            .map_err(|reason| ContractError::constraint_violation(&self.name, reason))?;
        Ok(value)
    }

    /// Coerce one array item. A union item picks the first alternative that both coerces and
    /// satisfies the item pattern, so `5` under `list[str | int]` with a string pattern is an
    /// integer rather than a failing string.
    fn admit_item(&self, item: &ValueType, token: &str, definitions: &Definitions) -> Result<Value, CoerceError> {
        let (inner, nullable) = item.strip_optional();
        let inner = inner.resolve(definitions).map_err(|e| CoerceError::Type(e.to_string()))?;
        match inner {
            ValueType::Union(alternatives) if !(nullable && token == NULL_TOKEN) => {
                let item_constraints = self.constraints.pattern_only();
                coerce::first_match(alternatives, |alternative| {
                    let value = coerce_token(alternative, token, definitions)?;
                    item_constraints.check(&value).map_err(CoerceError::Constraint)?;
                    Ok(value)
                })
            }
            _ => coerce_token(item, token, definitions),
        }
    }

    /// Admit a structured payload value.
    pub fn admit_value(&self, value: &Value, definitions: &Definitions) -> Result<Value, ContractError> {
        self.admit_with(definitions, |ty, defs| check_value(ty, value, defs))
    }

    /// Shared admission: coerce by type, then check constraints. A top-level union tries
    /// each alternative in declaration order and accepts the first one that both coerces
    /// and satisfies the constraints.
    fn admit_with<F>(&self, definitions: &Definitions, coerce_fn: F) -> Result<Value, ContractError>
    where
        F: Fn(&ValueType, &Definitions) -> Result<Value, CoerceError>,
    {
        let (inner, nullable) = self.value_type.strip_optional();
        let constrained = |ty: &ValueType| -> Result<Value, CoerceError> {
            let value = coerce_fn(ty, definitions)?;
            self.constraints.check(&value).map_err(CoerceError::Constraint)?;
            Ok(value)
        };
        let result = match inner {
            ValueType::Union(alternatives) => {
                let attempt = coerce::first_match(alternatives, &constrained);
                if nullable {
                    // `null` is only reachable through the optional wrapper.
                    match coerce_fn(&self.value_type, definitions) {
                        Ok(Value::Null) => Ok(Value::Null),
                        _ => attempt,
                    }
                } else {
                    attempt
                }
            }
            _ => constrained(&self.value_type),
        };
        result.map_err(|e| self.classify(e))
    }

    fn classify(&self, err: CoerceError) -> ContractError {
        match err {
            CoerceError::Type(reason) => {
                ContractError::type_mismatch(&self.name, format!("{}: {}", self.name, reason))
            }
            CoerceError::Constraint(reason) => {
                ContractError::constraint_violation(&self.name, format!("{}: {}", self.name, reason))
            }
        }
    }

    /// Check this parameter's invariants against the operation's definitions.
    pub(crate) fn validate(&self, definitions: &Definitions) -> Result<(), RegistrationError> {
        self.value_type.check_references(definitions)?;
        if let Some(default) = &self.default {
            self.admit_value(default, definitions)
                .map_err(|e| RegistrationError::InvalidDefault {
                    param: self.name.clone(),
                    reason: e.message,
                })?;
        }
        Ok(())
    }
}

/// Builder for [`Parameter`].
#[derive(Debug, Clone)]
pub struct ParameterBuilder {
    name: String,
    kind: ParamKind,
    value_type: ValueType,
    default: Option<Value>,
    documentation: Option<String>,
    min: Option<f64>,
    max: Option<f64>,
    pattern: Option<String>,
    secret: bool,
    origin: Origin,
}

impl ParameterBuilder {
    fn new(name: String, kind: ParamKind, value_type: ValueType) -> Self {
        Self {
            name,
            kind,
            value_type,
            default: None,
            documentation: None,
            min: None,
            max: None,
            pattern: None,
            secret: false,
            origin: Origin::Author,
        }
    }

    pub fn default(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(value.into());
        self
    }

    pub fn doc(mut self, documentation: impl Into<String>) -> Self {
        self.documentation = Some(documentation.into());
        self
    }

    pub fn min(mut self, min: f64) -> Self {
        self.min = Some(min);
        self
    }

    pub fn max(mut self, max: f64) -> Self {
        self.max = Some(max);
        self
    }

    pub fn pattern(mut self, pattern: impl Into<String>) -> Self {
        self.pattern = Some(pattern.into());
        self
    }

    pub fn secret(mut self) -> Self {
        self.secret = true;
        self
    }

    pub fn injected(mut self) -> Self {
        self.origin = Origin::Injected;
        self
    }

    /// Validate local invariants and freeze the parameter. Defaults that reference shared
    /// definitions are checked again when the owning operation is built.
    pub fn build(self) -> Result<Parameter, RegistrationError> {
        let invalid = |reason: &str| RegistrationError::InvalidParameter {
            param: self.name.clone(),
            reason: reason.to_string(),
        };

        if !is_identifier(&self.name) {
            return Err(invalid("names must be lowercase identifiers ([a-z][a-z0-9_]*)"));
        }
        if let (Some(min), Some(max)) = (self.min, self.max) {
            if min > max {
                return Err(invalid("min is greater than max"));
            }
        }
        if self.min.map_or(false, |v| !v.is_finite()) || self.max.map_or(false, |v| !v.is_finite()) {
            return Err(invalid("bounds must be finite"));
        }
        if matches!(self.value_type, ValueType::Optional(ref inner) if inner.has_top_level_array()) {
            return Err(invalid(
                "optional arrays cannot be expressed on the command line; use a default of []",
            ));
        }
        if let ValueType::Union(alternatives) = self.value_type.strip_optional().0 {
            if alternatives.iter().any(ValueType::has_top_level_array) {
                return Err(invalid("a union parameter cannot have an array alternative"));
            }
        }
        let is_array = self.value_type.array_item().is_some();
        if is_array && self.kind == ParamKind::Positional && self.default.is_some() {
            return Err(invalid("positional arrays cannot have a default"));
        }

        let pattern = match &self.pattern {
            Some(source) => Some(
                Pattern::new(source).map_err(|e| invalid(&format!("invalid pattern: {}", e)))?,
            ),
            None => None,
        };

        // A required array must carry at least one item: zero occurrences of a repeated flag
        // means the parameter was not supplied.
        let min = if is_array && self.default.is_none() {
            Some(self.min.map_or(1.0, |m| m.max(1.0)))
        } else {
            self.min
        };
        if let (Some(min), Some(max)) = (min, self.max) {
            if min > max {
                return Err(invalid("a required array needs max >= 1"));
            }
        }

        let parameter = Parameter {
            name: self.name,
            kind: self.kind,
            value_type: self.value_type,
            constraints: Constraints {
                min,
                max: self.max,
                pattern,
            },
            default: self.default,
            documentation: self.documentation,
            is_secret: self.secret,
            origin: self.origin,
        };

        let self_contained = parameter
            .value_type
            .check_references(&Definitions::new())
            .is_ok();
        if self_contained {
            parameter.validate(&Definitions::new())?;
        }
        Ok(parameter)
    }
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_lowercase())
        && chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
}
