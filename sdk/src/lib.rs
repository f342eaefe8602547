//! declargs
//!
//! This crate is the user-facing surface of the declargs workspace:
//!
//! - `try_cli` / `cli`: compile a schema into a command line, parse argv,
//!   and reconstruct a typed [`Value`],
//! - `to_tokens`: the inverse rendering, producing the argv that reproduces
//!   a value,
//! - the clap bridge (`bridge`) between the compiler's parser tree and the
//!   delegated flag parser.
//!
//! ```
//! use declargs_schema::{FieldSchema, RecordSchema, ScalarKind, TypeNode, Value};
//!
//! let point = RecordSchema::new("Point", vec![
//!     FieldSchema::new("x", TypeNode::Scalar(ScalarKind::Float)),
//!     FieldSchema::new("y", TypeNode::Scalar(ScalarKind::Float))
//!         .with_default(Value::Float(0.0)),
//! ]);
//! let ty = TypeNode::Record(point);
//!
//! let value = declargs::try_cli(&ty, None, &["--x".to_string(), "1.5".to_string()]).unwrap();
//! assert_eq!(value.member("x"), Some(&Value::Float(1.5)));
//! assert_eq!(value.member("y"), Some(&Value::Float(0.0)));
//! ```

use std::collections::BTreeMap;

use declargs_compiler::{calling, DeclargsError, ParserSpec, ResolveCtx, Result};
pub mod bridge;
pub mod tokens;

pub use declargs_compiler::error::DeclargsError as Error;
pub use declargs_compiler::types::Parsed;
pub use declargs_schema::{
    Binding, Constructor, ConstructorRegistry, CustomScalar, EnumSchema, FieldDefault,
    FieldSchema, Markers, RecordSchema, ScalarKind, TypeNode, UnionMember, Value,
};
pub use tokens::{to_tokens, to_tokens_with};

/// Parse `argv` against a schema and reconstruct the typed value.
///
/// `default` seeds the reconstruction the same way a field default would:
/// fields it covers stop being required.
pub fn try_cli(ty: &TypeNode, default: Option<Value>, argv: &[String]) -> Result<Value> {
    try_cli_with(ConstructorRegistry::new(), ty, default, argv, "declargs")
}

/// `try_cli` with a constructor registry and an explicit program name.
pub fn try_cli_with(
    registry: ConstructorRegistry,
    ty: &TypeNode,
    default: Option<Value>,
    argv: &[String],
    program: &str,
) -> Result<Value> {
    let default = match default {
        Some(value) => FieldDefault::value(value),
        None => FieldDefault::MissingNonPropagating,
    };

    let mut ctx = ResolveCtx::new(registry);
    let spec = ParserSpec::from_type(&mut ctx, ty, &default)?;

    // Bare invocation of a tool with required arguments reads as a request
    // for help rather than an attempt to parse.
    if argv.is_empty() && spec.has_required {
        let mut command = bridge::build_command(program, &spec);
        return Err(DeclargsError::Usage(command.render_help().to_string()));
    }

    let command = bridge::build_command(program, &spec);
    let matches = command
        .try_get_matches_from(std::iter::once(program.to_string()).chain(argv.iter().cloned()))
        .map_err(|err| DeclargsError::Usage(err.to_string()))?;

    let mut values: BTreeMap<String, Parsed> = BTreeMap::new();
    bridge::extract(&spec, &matches, "", &mut values)?;
    calling::reconstruct(&mut ctx, ty, &spec, &default, &values)
}

/// Parse the process arguments, printing usage problems and exiting
/// non-zero on failure.
pub fn cli(ty: &TypeNode, default: Option<Value>) -> Value {
    let argv: Vec<String> = std::env::args().skip(1).collect();
    match try_cli(ty, default, &argv) {
        Ok(value) => value,
        Err(err) => {
            eprintln!("{}", err);
            std::process::exit(2);
        }
    }
}

/// Build the parser tree for a type, mostly useful for inspection tooling.
pub fn parser_spec(registry: ConstructorRegistry, ty: &TypeNode) -> Result<ParserSpec> {
    let mut ctx = ResolveCtx::new(registry);
    ParserSpec::from_type(&mut ctx, ty, &FieldDefault::MissingNonPropagating)
}
