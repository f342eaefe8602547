use serde::Serialize;

use declargs_schema::{Binding, FieldDefault, Markers, TypeNode};

/// One named, typed, defaulted unit extracted from a schema by the resolver.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldDef {
    pub name:    String,
    pub ty:      TypeNode,
    pub default: FieldDefault,
    pub help:    Option<String>,
    pub binding: Binding,
    pub markers: Markers,
}

impl FieldDef {
    pub fn is_positional(&self) -> bool {
        self.markers.positional || self.binding != Binding::Keyword
    }
}

/// Token count an instantiator consumes. Fixed at build time and never
/// renegotiated at parse time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Nargs {
    Fixed(usize),
    Variable,
}

impl Nargs {
    pub fn as_fixed(&self) -> Option<usize> {
        match self {
            Nargs::Fixed(n) => Some(*n),
            Nargs::Variable => None,
        }
    }
}

/// One entry of the flat parsed-value map handed to the calling engine.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Parsed {
    /// Raw tokens captured by the flag parser.
    Tokens(Vec<String>),
    /// Result of a token-free boolean store action.
    Flag(bool),
    /// Per-occurrence token groups of a repeatable (append-mode) flag.
    Occurrences(Vec<Vec<String>>),
}
