//! declargs-compiler
//!
//! This crate implements:
//!  1) Schema resolution (`resolver`): normalizing `(type, default)` pairs
//!     into ordered field lists, with generic binding, subtype narrowing,
//!     and cycle detection,
//!  2) Instantiator synthesis (`instantiator`): token-to-value conversion
//!     functions plus arity/choice metadata per leaf type,
//!  3) Subcommand matching (`matcher`): picking the variant a default value
//!     belongs to,
//!  4) Parser-tree construction (`parser`): the flat argument surface handed
//!     to the flag parser,
//!  5) The calling engine (`calling`): reconstructing a typed `Value` from
//!     the flat parsed output, and
//!  6) Error types (`DeclargsError`).

pub mod calling;
pub mod error;
pub mod instantiator;
pub mod matcher;
pub mod parser;
pub mod resolver;
pub mod strings;
pub mod types;

pub use calling::call_from_parsed;
pub use calling::reconstruct;
pub use error::DeclargsError;
pub use error::Result;
pub use parser::ParserSpec;
pub use resolver::ResolveCtx;
pub use types::{FieldDef, Nargs, Parsed};
