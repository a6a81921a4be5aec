//! Envelope Encoder: `(Outcome, OutputMode) -> bytes` on two channels.
//!
//! Structured modes write the envelope (success or error) to the primary channel so a
//! reader of that channel alone always sees a result or an error. Human and plain modes
//! write results to the primary channel and errors and warnings to the secondary one, and
//! stay silent on an empty success.

use super::human;
use super::{OutputMode, Outcome};
use serde::Serialize;
use serde_json::Value;

/// Encoded bytes for the primary (stdout) and secondary (stderr) channels.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Rendered {
    pub primary: Vec<u8>,
    pub secondary: Vec<u8>,
}

impl Rendered {
    pub fn primary_str(&self) -> &str {
        std::str::from_utf8(&self.primary).unwrap_or("")
    }

    pub fn secondary_str(&self) -> &str {
        std::str::from_utf8(&self.secondary).unwrap_or("")
    }
}

/// Encode an outcome. Pure: the same outcome and mode always give the same bytes.
pub fn encode(outcome: &Outcome, mode: OutputMode) -> Rendered {
    let mut rendered = Rendered::default();
    match mode {
        OutputMode::Structured => {
            write_line(&mut rendered.primary, &outcome.envelope());
        }
        OutputMode::StructuredStream => match &outcome.result {
            Ok(Value::Array(items)) if !items.is_empty() => {
                for item in items {
                    write_line(&mut rendered.primary, &outcome.envelope_with(Some(item)));
                }
            }
            _ => write_line(&mut rendered.primary, &outcome.envelope()),
        },
        OutputMode::Human | OutputMode::Plain => {
            for warning in &outcome.warnings {
                rendered
                    .secondary
                    .extend_from_slice(format!("warning: {}\n", warning).as_bytes());
            }
            match &outcome.result {
                Ok(value) if is_empty(value) => {}
                Ok(value) => {
                    let text = if mode == OutputMode::Human {
                        human::render_value(value)
                    } else {
                        human::render_plain(value)
                    };
                    rendered.primary.extend_from_slice(text.as_bytes());
                }
                Err(error) => {
                    let text = if mode == OutputMode::Human {
                        human::render_error(error)
                    } else {
                        format!("error[{}]: {}\n", error.code, error.message)
                    };
                    rendered.secondary.extend_from_slice(text.as_bytes());
                }
            }
        }
    }
    rendered
}

/// `null`, `""`, `[]` and `{}` count as nothing to show.
pub fn is_empty(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::Object(map) => map.is_empty(),
        _ => false,
    }
}

fn write_line<T: Serialize>(out: &mut Vec<u8>, value: &T) {
    if serde_json::to_writer(&mut *out, value).is_ok() {
        out.push(b'\n');
    }
}
