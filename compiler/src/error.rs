use thiserror::Error;

#[derive(Debug, Error)]
pub enum DeclargsError {
    /// A type could not be decomposed into fields. Raised at build time,
    /// before any input is read; callers use it to distinguish "nested
    /// record" from "leaf".
    #[error("Unsupported schema: {0}")]
    UnsupportedSchema(String),

    /// A leaf type has no token conversion. Raised at build time; downgraded
    /// to a fixed field when the owning field carries a default.
    #[error("Unsupported type: {0}")]
    UnsupportedType(String),

    /// A record type reappeared on its own expansion path.
    #[error("Cyclic schema dependency involving type {0:?}")]
    Cycle(String),

    /// Bad input routed to a field, eg explicit input to a fixed field.
    #[error("Binding error for {flag}: {msg}")]
    Binding { flag: String, msg: String },

    /// Token-to-value conversion failed for a supplied argument.
    #[error("Parsing error for {flag}: {msg}")]
    Conversion { flag: String, msg: String },

    /// Required fields received no value. Every missing member is listed,
    /// not only the first.
    #[error("The following arguments are required: {}", .0.join(", "))]
    MissingRequired(Vec<String>),

    /// A constructor rejected its assembled arguments. `path` is empty at
    /// the root invocation and dotted when the failure happened in a nested
    /// subtree.
    #[error("{}{msg}", if .path.is_empty() { String::new() } else { format!("in {}: ", .path) })]
    Constructor { path: String, msg: String },

    /// Delegated flag parser rejected the raw argv.
    #[error("{0}")]
    Usage(String),
}

pub type Result<T> = std::result::Result<T, DeclargsError>;
