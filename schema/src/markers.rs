use serde::Serialize;

/// Recognized per-field configuration options.
///
/// Markers attach either directly on a `FieldSchema` or through
/// `TypeNode::Annotated`, and union downward: a marker set on a record field
/// also applies to every field extracted from that record.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Markers {
    /// Expose the field as a positional argument instead of a flag.
    pub positional: bool,
    /// Never parse the field; it always takes its default.
    pub fixed: bool,
    /// Hide the field from generated help.
    pub suppress: bool,
    /// Keep defaulted booleans as value-taking arguments instead of lowering
    /// them to a `--flag` / `--no-flag` pair.
    pub flag_conversion_off: bool,
    /// Collapse a defaulted variant field to its matched option instead of
    /// emitting subcommands.
    pub avoid_subcommands: bool,
    /// Name subcommands after their option type alone, without the owning
    /// field path prefix.
    pub omit_subcommand_prefixes: bool,
    /// Allow nested variable-length sequences by consuming one inner group
    /// per repeated flag occurrence.
    pub use_append_action: bool,
}

impl Markers {
    pub fn positional() -> Self {
        Markers {
            positional: true,
            ..Markers::default()
        }
    }

    pub fn fixed() -> Self {
        Markers {
            fixed: true,
            ..Markers::default()
        }
    }

    pub fn union(self, other: Markers) -> Markers {
        Markers {
            positional:               self.positional || other.positional,
            fixed:                    self.fixed || other.fixed,
            suppress:                 self.suppress || other.suppress,
            flag_conversion_off:      self.flag_conversion_off || other.flag_conversion_off,
            avoid_subcommands:        self.avoid_subcommands || other.avoid_subcommands,
            omit_subcommand_prefixes: self.omit_subcommand_prefixes
                || other.omit_subcommand_prefixes,
            use_append_action:        self.use_append_action || other.use_append_action,
        }
    }
}
