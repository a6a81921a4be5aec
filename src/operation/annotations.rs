//! Behavioral annotations as a small bitset: `Annotation::ReadOnly | Annotation::Idempotent`.

use serde::ser::SerializeSeq;
use serde::{Serialize, Serializer};
use serde_json::{json, Value};
use std::fmt;
use std::ops::BitOr;

/// One behavioral hint an external policy layer can read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Annotation {
    ReadOnly,
    Idempotent,
    Destructive,
    OpenWorld,
}

impl Annotation {
    /// Canonical order used for rendering.
    pub const ALL: [Annotation; 4] = [
        Annotation::ReadOnly,
        Annotation::Idempotent,
        Annotation::Destructive,
        Annotation::OpenWorld,
    ];

    fn bit(self) -> u8 {
        match self {
            Annotation::ReadOnly => 1,
            Annotation::Idempotent => 1 << 1,
            Annotation::Destructive => 1 << 2,
            Annotation::OpenWorld => 1 << 3,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Annotation::ReadOnly => "read_only",
            Annotation::Idempotent => "idempotent",
            Annotation::Destructive => "destructive",
            Annotation::OpenWorld => "open_world",
        }
    }
}

impl fmt::Display for Annotation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Set of annotations. Duplicates collapse by construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Annotations(u8);

impl Annotations {
    pub const NONE: Annotations = Annotations(0);

    pub fn contains(&self, annotation: Annotation) -> bool {
        self.0 & annotation.bit() != 0
    }

    pub fn insert(&mut self, annotation: Annotation) {
        self.0 |= annotation.bit();
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    pub fn is_read_only(&self) -> bool {
        self.contains(Annotation::ReadOnly)
    }

    pub fn is_idempotent(&self) -> bool {
        self.contains(Annotation::Idempotent)
    }

    pub fn is_destructive(&self) -> bool {
        self.contains(Annotation::Destructive)
    }

    pub fn iter(&self) -> impl Iterator<Item = Annotation> + '_ {
        Annotation::ALL
            .into_iter()
            .filter(move |annotation| self.contains(*annotation))
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.iter().map(Annotation::as_str).collect()
    }

    /// Tool-calling hint object (`readOnlyHint`, `idempotentHint`, ...).
    pub fn hints(&self) -> Value {
        json!({
            "readOnlyHint": self.is_read_only(),
            "idempotentHint": self.is_idempotent(),
            "destructiveHint": self.is_destructive(),
            "openWorldHint": self.contains(Annotation::OpenWorld),
        })
    }
}

impl From<Annotation> for Annotations {
    fn from(annotation: Annotation) -> Self {
        Annotations(annotation.bit())
    }
}

impl BitOr for Annotation {
    type Output = Annotations;

    fn bitor(self, rhs: Annotation) -> Annotations {
        Annotations(self.bit() | rhs.bit())
    }
}

impl BitOr for Annotations {
    type Output = Annotations;

    fn bitor(self, rhs: Annotations) -> Annotations {
        Annotations(self.0 | rhs.0)
    }
}

impl BitOr<Annotation> for Annotations {
    type Output = Annotations;

    fn bitor(self, rhs: Annotation) -> Annotations {
        Annotations(self.0 | rhs.bit())
    }
}

impl Serialize for Annotations {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let names = self.names();
        let mut seq = serializer.serialize_seq(Some(names.len()))?;
        for name in names {
            seq.serialize_element(name)?;
        }
        seq.end()
    }
}
