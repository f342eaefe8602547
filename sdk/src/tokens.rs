//! Canonical argv rendering: the inverse of parsing. `to_tokens` produces a
//! token sequence that, fed back through `try_cli` with the same type,
//! reconstructs the value.

use declargs_compiler::instantiator::Instantiator;
use declargs_compiler::parser::{ArgKind, ParserSpec};
use declargs_compiler::{strings, DeclargsError, ResolveCtx, Result};
use declargs_schema::{ConstructorRegistry, FieldDefault, TypeNode, Value};

/// Render `value` as the explicit command line that reproduces it.
pub fn to_tokens(ty: &TypeNode, value: &Value) -> Result<Vec<String>> {
    to_tokens_with(ConstructorRegistry::new(), ty, value)
}

pub fn to_tokens_with(
    registry: ConstructorRegistry,
    ty: &TypeNode,
    value: &Value,
) -> Result<Vec<String>> {
    let mut ctx = ResolveCtx::new(registry);
    let spec = ParserSpec::from_type(&mut ctx, ty, &FieldDefault::MissingNonPropagating)?;
    let mut out = Vec::new();
    emit(&spec, value, &mut out)?;
    Ok(out)
}

/// Emit one parser node: flags and positionals first, then the subcommand
/// chain, as the flag parser expects them.
fn emit(spec: &ParserSpec, value: &Value, out: &mut Vec<String>) -> Result<()> {
    for def in &spec.args {
        let member = match member_value(value, &def.path) {
            Some(member) => member,
            // Absent members of a partial record fall back to defaults.
            None => continue,
        };
        match &def.lowered.kind {
            ArgKind::Fixed => {}
            ArgKind::BoolFlagPair { .. } => match member {
                Value::Bool(true) => out.push(strings::flag_name(&def.path)),
                Value::Bool(false) => out.push(strings::flag_name(&def.negated_path())),
                other => {
                    return Err(DeclargsError::Binding {
                        flag: def.display_flag(),
                        msg:  format!("expected a boolean, found {:?}", other),
                    })
                }
            },
            ArgKind::Value { instantiator } => {
                let positional = def.field.is_positional();
                match instantiator {
                    Instantiator::Append { .. } => {
                        let items = match member {
                            Value::List(items) | Value::Set(items) | Value::Tuple(items) => items,
                            other => {
                                return Err(DeclargsError::Binding {
                                    flag: def.display_flag(),
                                    msg:  format!("expected a sequence, found {:?}", other),
                                })
                            }
                        };
                        for item in items {
                            if !positional {
                                out.push(strings::flag_name(&def.path));
                            }
                            out.extend(tokens_for(item, def.display_flag())?);
                        }
                    }
                    _ => {
                        if !positional {
                            out.push(strings::flag_name(&def.path));
                        }
                        out.extend(tokens_for(member, def.display_flag())?);
                    }
                }
            }
        }
    }

    for group in spec.subcommands.values() {
        let member = match member_value(value, &group.path) {
            Some(member) => member,
            None => continue,
        };
        let option = group
            .options
            .iter()
            .find(|o| member.conforms_to(&o.ty))
            .ok_or_else(|| DeclargsError::Binding {
                flag: strings::subcommand_dest(&group.path),
                msg:  format!("value {:?} matches no subcommand option", member),
            })?;
        out.push(option.name.clone());
        emit(&option.spec, member, out)?;
    }

    Ok(())
}

fn tokens_for(value: &Value, flag: String) -> Result<Vec<String>> {
    strings::value_tokens(value).ok_or(DeclargsError::Binding {
        flag,
        msg: "value has no flat token rendering".to_string(),
    })
}

/// Walk a dotted path through nested records (and tuples, whose members are
/// named by index).
fn member_value<'a>(value: &'a Value, path: &str) -> Option<&'a Value> {
    if path.is_empty() {
        return Some(value);
    }
    let mut current = value;
    for segment in path.split(strings::PATH_DELIMITER) {
        current = match current {
            Value::Record(_, members) => members
                .iter()
                .find(|(name, _)| name == segment)
                .map(|(_, v)| v)?,
            Value::Tuple(items) => items.get(segment.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    Some(current)
}
