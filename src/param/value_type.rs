//! Structural value types: the closed type subset every representation is projected from.

use crate::error::SchemaError;
use std::collections::BTreeMap;
use std::fmt;

/// Named type definitions shared across an operation's parameters and return type.
pub type Definitions = BTreeMap<String, ValueType>;

/// A type expressible in the structural subset.
#[derive(Debug, Clone, PartialEq)]
pub enum ValueType {
    String,
    Integer,
    Float,
    Boolean,
    /// A string that names a filesystem location. Never resolved by the engine.
    Path,
    Enum(Vec<String>),
    Optional(Box<ValueType>),
    Array(Box<ValueType>),
    Object(Vec<Field>),
    /// Alternatives tried in declaration order; the first that fits wins.
    Union(Vec<ValueType>),
    /// Reference to an entry in the operation's [`Definitions`].
    Named(String),
}

/// One field of a nested structural object.
#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    pub name: String,
    pub value_type: ValueType,
    pub required: bool,
    pub documentation: Option<String>,
}

impl Field {
    pub fn required(name: impl Into<String>, value_type: ValueType) -> Self {
        Self {
            name: name.into(),
            value_type,
            required: true,
            documentation: None,
        }
    }

    pub fn optional(name: impl Into<String>, value_type: ValueType) -> Self {
        Self {
            name: name.into(),
            value_type,
            required: false,
            documentation: None,
        }
    }

    pub fn doc(mut self, documentation: impl Into<String>) -> Self {
        self.documentation = Some(documentation.into());
        self
    }
}

impl ValueType {
    pub fn optional(inner: ValueType) -> Self {
        ValueType::Optional(Box::new(inner))
    }

    pub fn array(item: ValueType) -> Self {
        ValueType::Array(Box::new(item))
    }

    pub fn enumeration<I, S>(choices: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        ValueType::Enum(choices.into_iter().map(Into::into).collect())
    }

    /// The type with one level of `Optional` removed, and whether it was present.
    pub fn strip_optional(&self) -> (&ValueType, bool) {
        match self {
            ValueType::Optional(inner) => (inner.as_ref(), true),
            other => (other, false),
        }
    }

    pub fn is_boolean(&self) -> bool {
        matches!(self.strip_optional().0, ValueType::Boolean)
    }

    /// Item type when this is an array (through one `Optional` layer).
    pub fn array_item(&self) -> Option<&ValueType> {
        match self.strip_optional().0 {
            ValueType::Array(item) => Some(item.as_ref()),
            _ => None,
        }
    }

    /// True if any alternative at this level (not inside arrays/objects) is an array.
    pub(crate) fn has_top_level_array(&self) -> bool {
        match self {
            ValueType::Array(_) => true,
            ValueType::Optional(inner) => inner.has_top_level_array(),
            ValueType::Union(alternatives) => alternatives.iter().any(|a| a.has_top_level_array()),
            _ => false,
        }
    }

    /// Resolve a `Named` reference (one hop); other types are returned unchanged.
    pub fn resolve<'a>(&'a self, definitions: &'a Definitions) -> Result<&'a ValueType, SchemaError> {
        match self {
            ValueType::Named(name) => definitions
                .get(name)
                .ok_or_else(|| SchemaError::UnknownDefinition(name.clone())),
            other => Ok(other),
        }
    }

    /// Check that every `Named` reference resolves and no definition refers back to itself.
    pub fn check_references(&self, definitions: &Definitions) -> Result<(), SchemaError> {
        let mut stack = Vec::new();
        self.walk_references(definitions, &mut stack)
    }

    fn walk_references(
        &self,
        definitions: &Definitions,
        stack: &mut Vec<String>,
    ) -> Result<(), SchemaError> {
        match self {
            ValueType::Named(name) => {
                if stack.iter().any(|seen| seen == name) {
                    let mut path = stack.clone();
                    path.push(name.clone());
                    return Err(SchemaError::Cycle(path.join(" -> ")));
                }
                let target = definitions
                    .get(name)
                    .ok_or_else(|| SchemaError::UnknownDefinition(name.clone()))?;
                stack.push(name.clone());
                target.walk_references(definitions, stack)?;
                stack.pop();
                Ok(())
            }
            ValueType::Optional(inner) | ValueType::Array(inner) => {
                inner.walk_references(definitions, stack)
            }
            ValueType::Object(fields) => fields
                .iter()
                .try_for_each(|f| f.value_type.walk_references(definitions, stack)),
            ValueType::Union(alternatives) => alternatives
                .iter()
                .try_for_each(|a| a.walk_references(definitions, stack)),
            _ => Ok(()),
        }
    }
}

/// Renders the type in the same notation [`super::notation::parse_type`] reads.
impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValueType::String => f.write_str("str"),
            ValueType::Integer => f.write_str("int"),
            ValueType::Float => f.write_str("float"),
            ValueType::Boolean => f.write_str("bool"),
            ValueType::Path => f.write_str("path"),
            ValueType::Enum(choices) => {
                let rendered: Vec<String> = choices.iter().map(|c| render_choice(c)).collect();
                write!(f, "enum[{}]", rendered.join(", "))
            }
            ValueType::Optional(inner) => write!(f, "optional[{}]", inner),
            ValueType::Array(item) => write!(f, "list[{}]", item),
            ValueType::Object(fields) => {
                let rendered: Vec<String> = fields
                    .iter()
                    .map(|field| {
                        let marker = if field.required { "" } else { "?" };
                        format!("{}{}: {}", field.name, marker, field.value_type)
                    })
                    .collect();
                write!(f, "{{{}}}", rendered.join(", "))
            }
            ValueType::Union(alternatives) => {
                let rendered: Vec<String> = alternatives.iter().map(|a| a.to_string()).collect();
                f.write_str(&rendered.join(" | "))
            }
            ValueType::Named(name) => f.write_str(name),
        }
    }
}

fn render_choice(choice: &str) -> String {
    let bare = !choice.is_empty()
        && choice
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'));
    if bare {
        choice.to_string()
    } else {
        format!("\"{}\"", choice.replace('"', "'"))
    }
}
