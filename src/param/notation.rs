//! Type notation reader: turns an annotation such as `list[int]` or `optional[str]` into a
//! [`ValueType`]. Types outside the structural subset are rejected.
//!
//! Grammar:
//! ```text
//! type    := alt ('|' alt)*
//! alt     := primary '?'*
//! primary := IDENT ('[' args ']')? | '{' (field (',' field)*)? '}'
//! field   := IDENT '?'? ':' type
//! ```
//! `T | None` collapses to `optional[T]`. Capitalised names that are not builtins refer to
//! shared definitions.

use super::value_type::{Field, ValueType};
use crate::error::SchemaError;

/// Builtin names the reader knows but will not represent.
const UNREPRESENTABLE: &[&str] = &[
    "dict", "map", "tuple", "set", "frozenset", "bytes", "bytearray", "any", "object",
    "callable", "complex", "iterator", "generator",
];

/// Parse a type annotation.
pub fn parse_type(notation: &str) -> Result<ValueType, SchemaError> {
    let mut reader = Reader {
        notation,
        chars: notation.char_indices().peekable(),
    };
    let ty = reader.parse_union()?;
    reader.skip_ws();
    if let Some((_, c)) = reader.chars.peek().copied() {
        return Err(reader.malformed(format!("unexpected '{}'", c)));
    }
    Ok(ty)
}

struct Reader<'a> {
    notation: &'a str,
    chars: std::iter::Peekable<std::str::CharIndices<'a>>,
}

impl<'a> Reader<'a> {
    fn malformed(&self, reason: impl Into<String>) -> SchemaError {
        SchemaError::MalformedNotation {
            notation: self.notation.to_string(),
            reason: reason.into(),
        }
    }

    fn skip_ws(&mut self) {
        while matches!(self.chars.peek(), Some((_, c)) if c.is_whitespace()) {
            self.chars.next();
        }
    }

    fn eat(&mut self, expected: char) -> bool {
        self.skip_ws();
        if matches!(self.chars.peek(), Some(&(_, c)) if c == expected) {
            self.chars.next();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, expected: char) -> Result<(), SchemaError> {
        if self.eat(expected) {
            Ok(())
        } else {
            Err(self.malformed(format!("expected '{}'", expected)))
        }
    }

    fn ident(&mut self) -> Result<String, SchemaError> {
        self.skip_ws();
        let mut out = String::new();
        while let Some((_, c)) = self.chars.peek().copied() {
            if c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-') {
                out.push(c);
                self.chars.next();
            } else {
                break;
            }
        }
        if out.is_empty() {
            Err(self.malformed("expected a type name"))
        } else {
            Ok(out)
        }
    }

    fn quoted(&mut self, quote: char) -> Result<String, SchemaError> {
        let mut out = String::new();
        for (_, c) in self.chars.by_ref() {
            if c == quote {
                return Ok(out);
            }
            out.push(c);
        }
        Err(self.malformed("unterminated quoted choice"))
    }

    fn parse_union(&mut self) -> Result<ValueType, SchemaError> {
        let mut alternatives = vec![self.parse_alt()?];
        while self.eat('|') {
            alternatives.push(self.parse_alt()?);
        }

        let nullable = alternatives.iter().any(|a| a.is_none_marker());
        alternatives.retain(|a| !a.is_none_marker());
        let inner = match alternatives.len() {
            0 => return Err(self.malformed("a union needs at least one non-null alternative")),
            1 => alternatives.remove(0),
            _ => ValueType::Union(alternatives),
        };
        Ok(if nullable { ValueType::optional(inner) } else { inner })
    }

    fn parse_alt(&mut self) -> Result<ValueType, SchemaError> {
        let mut ty = self.parse_primary()?;
        while self.eat('?') {
            if ty.is_none_marker() {
                return Err(self.malformed("'?' cannot follow None"));
            }
            ty = ValueType::optional(ty);
        }
        Ok(ty)
    }

    fn parse_primary(&mut self) -> Result<ValueType, SchemaError> {
        if self.eat('{') {
            return self.parse_object();
        }
        let name = self.ident()?;
        let lowered = name.to_ascii_lowercase();
        match lowered.as_str() {
            "str" | "string" => Ok(ValueType::String),
            "int" | "integer" => Ok(ValueType::Integer),
            "float" | "number" => Ok(ValueType::Float),
            "bool" | "boolean" => Ok(ValueType::Boolean),
            "path" | "pathlib.path" => Ok(ValueType::Path),
            "none" | "null" => Ok(none_marker()),
            "list" | "array" => {
                self.expect('[')?;
                let item = self.parse_union()?;
                self.expect(']')?;
                Ok(ValueType::array(item))
            }
            "optional" => {
                self.expect('[')?;
                let inner = self.parse_union()?;
                self.expect(']')?;
                Ok(ValueType::optional(inner))
            }
            "enum" | "literal" => {
                self.expect('[')?;
                let choices = self.parse_choices()?;
                self.expect(']')?;
                Ok(ValueType::Enum(choices))
            }
            other if UNREPRESENTABLE.contains(&other) => {
                Err(SchemaError::Unrepresentable(self.notation.to_string()))
            }
            _ if name.starts_with(|c: char| c.is_ascii_uppercase()) => {
                Ok(ValueType::Named(name))
            }
            _ => Err(SchemaError::Unrepresentable(self.notation.to_string())),
        }
    }

    fn parse_choices(&mut self) -> Result<Vec<String>, SchemaError> {
        let mut choices = Vec::new();
        loop {
            self.skip_ws();
            let choice = match self.chars.peek().copied() {
                Some((_, quote)) if quote == '"' || quote == '\'' => {
                    self.chars.next();
                    self.quoted(quote)?
                }
                _ => self.ident()?,
            };
            if choices.contains(&choice) {
                return Err(self.malformed(format!("duplicate choice '{}'", choice)));
            }
            choices.push(choice);
            if !self.eat(',') {
                break;
            }
        }
        Ok(choices)
    }

    fn parse_object(&mut self) -> Result<ValueType, SchemaError> {
        let mut fields: Vec<Field> = Vec::new();
        if self.eat('}') {
            return Ok(ValueType::Object(fields));
        }
        loop {
            let name = self.ident()?;
            let required = !self.eat('?');
            self.expect(':')?;
            let value_type = self.parse_union()?;
            if fields.iter().any(|f| f.name == name) {
                return Err(self.malformed(format!("duplicate field '{}'", name)));
            }
            fields.push(Field {
                name,
                value_type,
                required,
                documentation: None,
            });
            if !self.eat(',') {
                break;
            }
        }
        self.expect('}')?;
        Ok(ValueType::Object(fields))
    }
}

/// Placeholder for `None` inside a union; never escapes `parse_union`.
fn none_marker() -> ValueType {
    ValueType::Named("\0none".to_string())
}

impl ValueType {
    fn is_none_marker(&self) -> bool {
        matches!(self, ValueType::Named(name) if name == "\0none")
    }
}
