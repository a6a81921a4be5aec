//! Value constraints: inclusive bounds and an unanchored pattern.
//!
//! `min`/`max` bound numbers by value, strings by character count, and arrays by item
//! count. `pattern` applies to strings and to each string item of an array. `null` always
//! passes; optionality is the type's concern.

use regex::Regex;
use serde_json::Value;
use std::fmt;

/// Compiled regular expression that compares by its source text.
#[derive(Clone)]
pub struct Pattern {
    source: String,
    regex: Regex,
}

impl Pattern {
    pub fn new(source: &str) -> Result<Self, regex::Error> {
        Ok(Self {
            source: source.to_string(),
            regex: Regex::new(source)?,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }

    pub fn is_match(&self, haystack: &str) -> bool {
        self.regex.is_match(haystack)
    }
}

impl PartialEq for Pattern {
    fn eq(&self, other: &Self) -> bool {
        self.source == other.source
    }
}

impl fmt::Debug for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Pattern({:?})", self.source)
    }
}

/// Declared constraints on a parameter value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Constraints {
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub pattern: Option<Pattern>,
}

impl Constraints {
    pub fn is_empty(&self) -> bool {
        self.min.is_none() && self.max.is_none() && self.pattern.is_none()
    }

    /// The constraints that carry over to each item of an array: the pattern alone.
    pub fn pattern_only(&self) -> Constraints {
        Constraints {
            min: None,
            max: None,
            pattern: self.pattern.clone(),
        }
    }

    /// Check a structural value. The error is a human-readable reason.
    pub fn check(&self, value: &Value) -> Result<(), String> {
        match value {
            Value::Number(n) => {
                let v = n.as_f64().unwrap_or(f64::NAN);
                self.check_bounds(v, "value")
            }
            Value::String(s) => {
                self.check_bounds(s.chars().count() as f64, "length")?;
                self.check_pattern(s)
            }
            Value::Array(items) => {
                self.check_bounds(items.len() as f64, "item count")?;
                items
                    .iter()
                    .filter_map(Value::as_str)
                    .try_for_each(|item| self.check_pattern(item))
            }
            _ => Ok(()),
        }
    }

    fn check_bounds(&self, v: f64, what: &str) -> Result<(), String> {
        if let Some(min) = self.min {
            if v < min {
                return Err(format!("{} {} is below the minimum {}", what, v, min));
            }
        }
        if let Some(max) = self.max {
            if v > max {
                return Err(format!("{} {} is above the maximum {}", what, v, max));
            }
        }
        Ok(())
    }

    fn check_pattern(&self, s: &str) -> Result<(), String> {
        match &self.pattern {
            Some(pattern) if !pattern.is_match(s) => Err(format!(
                "'{}' does not match pattern '{}'",
                s,
                pattern.as_str()
            )),
            _ => Ok(()),
        }
    }

    /// Compact human summary, e.g. `range[0, 10] pattern=^a`.
    pub fn describe(&self) -> Option<String> {
        let mut parts = Vec::new();
        match (self.min, self.max) {
            (Some(min), Some(max)) => parts.push(format!("range[{}, {}]", min, max)),
            (Some(min), None) => parts.push(format!("min={}", min)),
            (None, Some(max)) => parts.push(format!("max={}", max)),
            (None, None) => {}
        }
        if let Some(pattern) = &self.pattern {
            parts.push(format!("pattern={}", pattern.as_str()));
        }
        if parts.is_empty() {
            None
        } else {
            Some(parts.join(" "))
        }
    }
}
