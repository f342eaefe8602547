//! Reconstruction: turning the flat parsed-value map back into a typed
//! `Value` by walking the same field tree the parser was built from.
//!
//! Arguments in a `ParserSpec` are keyed relative to that parser node, while
//! the value map is keyed by absolute path from the invocation root; the two
//! prefixes are threaded separately and only diverge across subcommand
//! boundaries, where the argument namespace restarts.

use std::collections::{BTreeMap, BTreeSet};

use declargs_schema::{Binding, CallArgs, FieldDefault, RecordSchema, TypeNode, Value};

use crate::error::{DeclargsError, Result};
use crate::instantiator::Instantiator;
use crate::matcher;
use crate::parser::{ArgKind, ArgumentDefinition, ParserSpec, SubcommandGroup};
use crate::resolver::{self, ResolveCtx};
use crate::strings;
use crate::types::{Nargs, Parsed};

/// Reconstruct the root value and verify every parsed entry was routed to
/// some field.
pub fn reconstruct(
    ctx: &mut ResolveCtx,
    ty: &TypeNode,
    spec: &ParserSpec,
    default: &FieldDefault,
    values: &BTreeMap<String, Parsed>,
) -> Result<Value> {
    let (value, consumed) = call_from_parsed(ctx, ty, spec, default, values, "", "")?;
    if let Some(stray) = values.keys().find(|k| !consumed.contains(*k)) {
        return Err(DeclargsError::Binding {
            flag: stray.clone(),
            msg:  "value was not consumed by any field".to_string(),
        });
    }
    Ok(value)
}

/// Reconstruct one subtree, returning the value and the set of value-map
/// keys it consumed.
pub fn call_from_parsed(
    ctx: &mut ResolveCtx,
    ty: &TypeNode,
    spec: &ParserSpec,
    default: &FieldDefault,
    values: &BTreeMap<String, Parsed>,
    rel_prefix: &str,
    abs_prefix: &str,
) -> Result<(Value, BTreeSet<String>)> {
    match node(ctx, ty, spec, default, values, rel_prefix, abs_prefix)? {
        Outcome::Built(value, consumed) => Ok((value, consumed)),
        Outcome::Missing { flags, .. } => Err(DeclargsError::MissingRequired(flags)),
    }
}

/// Result of one subtree: either a value, or the full set of still-missing
/// required flags. Missingness travels upward as data so that an enclosing
/// defaulted group can absorb it when none of its members received input.
enum Outcome {
    Built(Value, BTreeSet<String>),
    Missing {
        flags:    Vec<String>,
        consumed: BTreeSet<String>,
    },
}

fn node(
    ctx: &mut ResolveCtx,
    ty: &TypeNode,
    spec: &ParserSpec,
    default: &FieldDefault,
    values: &BTreeMap<String, Parsed>,
    rel_prefix: &str,
    abs_prefix: &str,
) -> Result<Outcome> {
    let (bare, _) = ty.unwrap_annotations();
    let narrowed = resolver::narrow(bare, default);

    match &narrowed {
        TypeNode::Null => Ok(Outcome::Built(Value::Null, BTreeSet::new())),
        TypeNode::Union(members) if crate::parser::is_record_union(members) => {
            match spec.subcommands.get(rel_prefix) {
                Some(group) => {
                    subcommand_node(ctx, group, values, abs_prefix)
                }
                // No group was emitted for this union: it was collapsed to
                // its matched default option at build time.
                None => match default
                    .as_value()
                    .and_then(|v| matcher::match_option(ctx, v, members))
                {
                    Some(index) => node(
                        ctx,
                        &members[index].ty,
                        spec,
                        default,
                        values,
                        rel_prefix,
                        abs_prefix,
                    ),
                    None => Err(DeclargsError::Binding {
                        flag: strings::subcommand_dest(abs_prefix),
                        msg:  "no subcommand group was built for this field".to_string(),
                    }),
                },
            }
        }
        _ => record_node(ctx, &narrowed, spec, default, values, rel_prefix, abs_prefix),
    }
}

/// Resolve a subcommand selection and hand off to the chosen option parser.
fn subcommand_node(
    ctx: &mut ResolveCtx,
    group: &SubcommandGroup,
    values: &BTreeMap<String, Parsed>,
    abs_prefix: &str,
) -> Result<Outcome> {
    let selector = strings::subcommand_dest(abs_prefix);
    let mut consumed = BTreeSet::new();

    let selected = match values.get(&selector) {
        Some(Parsed::Tokens(tokens)) if tokens.len() == 1 => {
            consumed.insert(selector.clone());
            Some(tokens[0].clone())
        }
        Some(_) => {
            return Err(DeclargsError::Binding {
                flag: selector,
                msg:  "malformed subcommand selection".to_string(),
            })
        }
        None => None,
    };

    let option = match &selected {
        Some(name) => match group.option(name) {
            Some(option) => option,
            None => {
                return Err(DeclargsError::Binding {
                    flag: selector,
                    msg:  format!("unknown subcommand {:?}", name),
                })
            }
        },
        None => match group.default_option() {
            Some(option) => option,
            None => {
                let names: Vec<&str> =
                    group.options.iter().map(|o| o.name.as_str()).collect();
                return Ok(Outcome::Missing {
                    flags: vec![format!("{{{}}}", names.join(","))],
                    consumed,
                });
            }
        },
    };

    let (value, sub_consumed) = call_from_parsed(
        ctx,
        &option.ty,
        &option.spec,
        &option.default,
        values,
        "",
        abs_prefix,
    )?;
    consumed.extend(sub_consumed);
    Ok(Outcome::Built(value, consumed))
}

fn record_node(
    ctx: &mut ResolveCtx,
    narrowed: &TypeNode,
    spec: &ParserSpec,
    default: &FieldDefault,
    values: &BTreeMap<String, Parsed>,
    rel_prefix: &str,
    abs_prefix: &str,
) -> Result<Outcome> {
    let fields = ctx.field_list(narrowed, default)?;

    let mut consumed = BTreeSet::new();
    let mut missing: Vec<String> = Vec::new();
    let mut call = CallArgs::default();
    let mut members: Vec<(String, Value)> = Vec::new();

    for field in &fields {
        if matches!(field.default, FieldDefault::ExcludeFromCall) {
            continue;
        }
        let rel = strings::make_field_name(&[rel_prefix, &field.name]);
        let abs = strings::make_field_name(&[abs_prefix, &field.name]);

        let field_narrowed = resolver::narrow(&field.ty, &field.default);
        let routes_nested = !field.markers.fixed
            && !field.markers.suppress
            && (crate::parser::is_nested(ctx, &field_narrowed)
                || matches!(&field_narrowed, TypeNode::Union(m) if crate::parser::is_record_union(m)));

        let value = if routes_nested {
            match node(ctx, &field.ty, spec, &field.default, values, &rel, &abs)? {
                Outcome::Built(value, sub_consumed) => {
                    consumed.extend(sub_consumed);
                    Some(value)
                }
                Outcome::Missing {
                    flags,
                    consumed: sub_consumed,
                } => {
                    consumed.extend(sub_consumed);
                    missing.extend(flags);
                    None
                }
            }
        } else {
            let arg = spec.arg(&rel).ok_or_else(|| DeclargsError::Binding {
                flag: strings::flag_name(&rel),
                msg:  "field has no parser entry".to_string(),
            })?;
            flat_value(arg, values, &abs, &mut consumed, &mut missing)?
        };

        if let Some(value) = value {
            route(field.binding, &field.name, value, &mut call, &mut members)?;
        }
    }

    if !missing.is_empty() {
        // All-or-nothing: a group none of whose members received input
        // falls back to its default as a whole.
        if consumed.is_empty() {
            if let Some(value) = default.as_value() {
                return Ok(Outcome::Built((**value).clone(), consumed));
            }
        }
        return Ok(Outcome::Missing { flags: missing, consumed });
    }

    let value = construct(ctx, narrowed, call, members, abs_prefix)?;
    Ok(Outcome::Built(value, consumed))
}

/// Produce the value of one flat argument: explicit input, then the field
/// default, then empty-sequence collapse for variable-arity positionals.
/// `None` means the field goes on the missing list.
fn flat_value(
    arg: &ArgumentDefinition,
    values: &BTreeMap<String, Parsed>,
    abs: &str,
    consumed: &mut BTreeSet<String>,
    missing: &mut Vec<String>,
) -> Result<Option<Value>> {
    if let Some(parsed) = values.get(abs) {
        consumed.insert(abs.to_string());
        let value = match (&arg.lowered.kind, parsed) {
            (ArgKind::Fixed, _) => {
                return Err(DeclargsError::Binding {
                    flag: arg.display_flag(),
                    msg:  "field is fixed and does not accept input".to_string(),
                })
            }
            (ArgKind::BoolFlagPair { .. }, Parsed::Flag(value)) => Value::Bool(*value),
            (ArgKind::Value { instantiator }, parsed) => match (instantiator, parsed) {
                (Instantiator::Tokens(f), Parsed::Tokens(tokens)) => {
                    f.call(tokens).map_err(|msg| DeclargsError::Conversion {
                        flag: arg.display_flag(),
                        msg,
                    })?
                }
                (Instantiator::Append { inner, target }, Parsed::Occurrences(groups)) => {
                    let mut items = Vec::with_capacity(groups.len());
                    for group in groups {
                        items.push(inner.call(group).map_err(|msg| {
                            DeclargsError::Conversion {
                                flag: arg.display_flag(),
                                msg,
                            }
                        })?);
                    }
                    target.build(items)
                }
                (Instantiator::Append { inner, target }, Parsed::Tokens(tokens)) => {
                    let item =
                        inner.call(tokens).map_err(|msg| DeclargsError::Conversion {
                            flag: arg.display_flag(),
                            msg,
                        })?;
                    target.build(vec![item])
                }
                _ => {
                    return Err(DeclargsError::Binding {
                        flag: arg.display_flag(),
                        msg:  "mismatched input shape".to_string(),
                    })
                }
            },
            _ => {
                return Err(DeclargsError::Binding {
                    flag: arg.display_flag(),
                    msg:  "mismatched input shape".to_string(),
                })
            }
        };
        return Ok(Some(value));
    }

    if let Some(value) = arg.field.default.as_value() {
        return Ok(Some((**value).clone()));
    }

    // A variable-arity positional that got nothing is an empty sequence,
    // not a missing value.
    if arg.field.is_positional() && arg.lowered.nargs == Nargs::Variable {
        match &arg.lowered.kind {
            ArgKind::Value {
                instantiator: Instantiator::Tokens(f),
            } => {
                if let Ok(value) = f.call(&[]) {
                    return Ok(Some(value));
                }
            }
            ArgKind::Value {
                instantiator: Instantiator::Append { target, .. },
            } => return Ok(Some(target.build(Vec::new()))),
            _ => {}
        }
    }

    missing.push(arg.display_flag());
    Ok(None)
}

/// Route one reconstructed member into the constructor arguments.
fn route(
    binding: Binding,
    name: &str,
    value: Value,
    call: &mut CallArgs,
    members: &mut Vec<(String, Value)>,
) -> Result<()> {
    members.push((name.to_string(), value.clone()));
    match binding {
        Binding::Keyword => call.keyword.push((name.to_string(), value)),
        Binding::Positional => call.positional.push(value),
        Binding::VarPositional => match value {
            Value::List(items) | Value::Tuple(items) | Value::Set(items) => {
                call.positional.extend(items)
            }
            _ => {
                return Err(DeclargsError::Binding {
                    flag: strings::flag_name(name),
                    msg:  "unpack-as-tuple field did not produce a sequence".to_string(),
                })
            }
        },
        Binding::VarKeyword => match value {
            Value::Map(entries) => {
                for (key, entry) in entries {
                    match key {
                        Value::String(key) => call.keyword.push((key, entry)),
                        other => {
                            return Err(DeclargsError::Binding {
                                flag: strings::flag_name(name),
                                msg:  format!(
                                    "unpack-as-mapping key {:?} is not a string",
                                    other
                                ),
                            })
                        }
                    }
                }
            }
            _ => {
                return Err(DeclargsError::Binding {
                    flag: strings::flag_name(name),
                    msg:  "unpack-as-mapping field did not produce a mapping".to_string(),
                })
            }
        },
    }
    Ok(())
}

/// Invoke the target constructor. Records without a registered constructor
/// assemble a `Value::Record` directly; tuples build the tuple.
fn construct(
    ctx: &ResolveCtx,
    narrowed: &TypeNode,
    call: CallArgs,
    members: Vec<(String, Value)>,
    abs_prefix: &str,
) -> Result<Value> {
    match narrowed {
        TypeNode::Tuple(_) => Ok(Value::Tuple(call.positional)),
        TypeNode::Record(schema) | TypeNode::Generic { base: schema, .. } => {
            invoke(schema, call, members, abs_prefix)
        }
        other => match ctx.registry.lookup(other) {
            Some(schema) => invoke(&schema, call, members, abs_prefix),
            None => Err(DeclargsError::UnsupportedSchema(format!(
                "type {} has no constructor",
                other.display_name()
            ))),
        },
    }
}

fn invoke(
    schema: &std::rc::Rc<RecordSchema>,
    call: CallArgs,
    members: Vec<(String, Value)>,
    abs_prefix: &str,
) -> Result<Value> {
    match &schema.construct {
        Some(ctor) => (ctor.0)(call).map_err(|msg| DeclargsError::Constructor {
            path: abs_prefix.to_string(),
            msg,
        }),
        None => Ok(Value::Record(schema.clone(), members)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use declargs_schema::{
        Constructor, ConstructorRegistry, FieldSchema, ScalarKind,
    };
    use std::rc::Rc;

    fn ctx() -> ResolveCtx {
        ResolveCtx::new(ConstructorRegistry::new())
    }

    fn run(
        ty: &TypeNode,
        default: &FieldDefault,
        entries: Vec<(&str, Parsed)>,
    ) -> Result<Value> {
        let mut ctx = ctx();
        let spec = ParserSpec::from_type(&mut ctx, ty, default)?;
        let values: BTreeMap<String, Parsed> = entries
            .into_iter()
            .map(|(k, v)| (k.to_string(), v))
            .collect();
        reconstruct(&mut ctx, ty, &spec, default, &values)
    }

    fn tokens(parts: &[&str]) -> Parsed {
        Parsed::Tokens(parts.iter().map(|s| s.to_string()).collect())
    }

    fn point_schema() -> Rc<RecordSchema> {
        RecordSchema::new(
            "Point",
            vec![
                FieldSchema::new("x", TypeNode::Scalar(ScalarKind::Int)),
                FieldSchema::new("y", TypeNode::Scalar(ScalarKind::Int))
                    .with_default(Value::Int(3)),
            ],
        )
    }

    #[test]
    fn test_default_substitution() {
        let schema = point_schema();
        let got = run(
            &TypeNode::Record(schema.clone()),
            &FieldDefault::MissingNonPropagating,
            vec![("x", tokens(&["5"]))],
        )
        .unwrap();
        assert_eq!(
            got,
            Value::record(&schema, vec![("x", Value::Int(5)), ("y", Value::Int(3))])
        );
    }

    #[test]
    fn test_missing_required_names_flag() {
        let err = run(
            &TypeNode::Record(point_schema()),
            &FieldDefault::MissingNonPropagating,
            vec![],
        )
        .unwrap_err();
        match err {
            DeclargsError::MissingRequired(flags) => {
                assert_eq!(flags, vec!["--x".to_string()])
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_conversion_error_names_flag() {
        let err = run(
            &TypeNode::Record(point_schema()),
            &FieldDefault::MissingNonPropagating,
            vec![("x", tokens(&["abc"]))],
        )
        .unwrap_err();
        match err {
            DeclargsError::Conversion { flag, .. } => assert_eq!(flag, "--x"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_nested_prefix() {
        let inner = RecordSchema::new(
            "Inner",
            vec![FieldSchema::new("lr", TypeNode::Scalar(ScalarKind::Float))
                .with_default(Value::Float(0.1))],
        );
        let outer = RecordSchema::new(
            "Outer",
            vec![FieldSchema::new("model", TypeNode::Record(inner.clone()))],
        );
        let got = run(
            &TypeNode::Record(outer.clone()),
            &FieldDefault::MissingNonPropagating,
            vec![("model.lr", tokens(&["0.5"]))],
        )
        .unwrap();
        assert_eq!(
            got,
            Value::record(
                &outer,
                vec![(
                    "model",
                    Value::record(&inner, vec![("lr", Value::Float(0.5))])
                )]
            )
        );
    }

    fn coord_cli(with_default: bool) -> Rc<RecordSchema> {
        let coord = RecordSchema::new(
            "Coord",
            vec![
                FieldSchema::new("a", TypeNode::Scalar(ScalarKind::Int)),
                FieldSchema::new("b", TypeNode::Scalar(ScalarKind::Int))
                    .with_default(Value::Int(2)),
                FieldSchema::new("c", TypeNode::Scalar(ScalarKind::Int)),
            ],
        );
        let mut field = FieldSchema::new("coord", TypeNode::Record(coord.clone()));
        if with_default {
            field = field.with_default(Value::record(&coord, vec![("b", Value::Int(5))]));
        }
        RecordSchema::new("Cli", vec![field])
    }

    #[test]
    fn test_group_missing_lists_every_member() {
        let err = run(
            &TypeNode::Record(coord_cli(false)),
            &FieldDefault::MissingNonPropagating,
            vec![("coord.b", tokens(&["9"]))],
        )
        .unwrap_err();
        match err {
            DeclargsError::MissingRequired(flags) => {
                assert_eq!(flags, vec!["--coord.a".to_string(), "--coord.c".to_string()])
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_untouched_group_takes_default() {
        let coord = coord_cli(true);
        let got = run(
            &TypeNode::Record(coord.clone()),
            &FieldDefault::MissingNonPropagating,
            vec![],
        )
        .unwrap();
        // The partial default instance passes through unchanged.
        let default = coord.fields[0].default.as_value().unwrap();
        assert_eq!(
            got,
            Value::record(&coord, vec![("coord", (**default).clone())])
        );
    }

    #[test]
    fn test_partial_group_override_rejected() {
        let err = run(
            &TypeNode::Record(coord_cli(true)),
            &FieldDefault::MissingNonPropagating,
            vec![("coord.a", tokens(&["1"]))],
        )
        .unwrap_err();
        match err {
            DeclargsError::MissingRequired(flags) => {
                assert_eq!(flags, vec!["--coord.c".to_string()])
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_subcommand_selection() {
        let checkout = RecordSchema::new(
            "Checkout",
            vec![FieldSchema::new("branch", TypeNode::Scalar(ScalarKind::String))
                .with_default(Value::String("main".into()))],
        );
        let commit = RecordSchema::new(
            "Commit",
            vec![FieldSchema::new(
                "message",
                TypeNode::Scalar(ScalarKind::String),
            )],
        );
        let cli = RecordSchema::new(
            "Cli",
            vec![FieldSchema::new(
                "cmd",
                TypeNode::union(vec![
                    TypeNode::Record(checkout),
                    TypeNode::Record(commit.clone()),
                ]),
            )],
        );

        let got = run(
            &TypeNode::Record(cli.clone()),
            &FieldDefault::MissingNonPropagating,
            vec![
                ("cmd (positional)", tokens(&["cmd:commit"])),
                ("cmd.message", tokens(&["fix parser"])),
            ],
        )
        .unwrap();
        assert_eq!(
            got,
            Value::record(
                &cli,
                vec![(
                    "cmd",
                    Value::record(
                        &commit,
                        vec![("message", Value::String("fix parser".into()))]
                    )
                )]
            )
        );
    }

    #[test]
    fn test_bool_flag() {
        let schema = RecordSchema::new(
            "Opt",
            vec![FieldSchema::new("verbose", TypeNode::Scalar(ScalarKind::Bool))
                .with_default(Value::Bool(false))],
        );
        let got = run(
            &TypeNode::Record(schema.clone()),
            &FieldDefault::MissingNonPropagating,
            vec![("verbose", Parsed::Flag(true))],
        )
        .unwrap();
        assert_eq!(
            got,
            Value::record(&schema, vec![("verbose", Value::Bool(true))])
        );
    }

    #[test]
    fn test_unsupplied_variable_positional_collapses_to_empty() {
        let schema = RecordSchema::new(
            "Opt",
            vec![FieldSchema::new(
                "paths",
                TypeNode::list(TypeNode::Scalar(ScalarKind::String)),
            )
            .positional()],
        );
        let got = run(
            &TypeNode::Record(schema.clone()),
            &FieldDefault::MissingNonPropagating,
            vec![],
        )
        .unwrap();
        assert_eq!(
            got,
            Value::record(&schema, vec![("paths", Value::List(vec![]))])
        );
    }

    #[test]
    fn test_missing_propagation_overrides_child_default() {
        let inner = RecordSchema::new(
            "Inner",
            vec![FieldSchema::new("y", TypeNode::Scalar(ScalarKind::Int))
                .with_default(Value::Int(3))],
        );
        let outer = RecordSchema::new(
            "Outer",
            vec![FieldSchema {
                default: FieldDefault::MissingPropagating,
                ..FieldSchema::new("opt", TypeNode::Record(inner))
            }],
        );
        let err = run(
            &TypeNode::Record(outer),
            &FieldDefault::MissingNonPropagating,
            vec![],
        )
        .unwrap_err();
        match err {
            DeclargsError::MissingRequired(flags) => {
                assert_eq!(flags, vec!["--opt.y".to_string()])
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_constructor_error_is_path_tagged() {
        let inner = Rc::new(RecordSchema {
            construct: Some(Constructor::new(|_| Err("port out of range".to_string()))),
            ..(*RecordSchema::new(
                "Server",
                vec![FieldSchema::new("port", TypeNode::Scalar(ScalarKind::Int))],
            ))
            .clone()
        });
        let outer = RecordSchema::new(
            "Cli",
            vec![FieldSchema::new("server", TypeNode::Record(inner))],
        );
        let err = run(
            &TypeNode::Record(outer),
            &FieldDefault::MissingNonPropagating,
            vec![("server.port", tokens(&["99999"]))],
        )
        .unwrap_err();
        match err {
            DeclargsError::Constructor { path, msg } => {
                assert_eq!(path, "server");
                assert_eq!(msg, "port out of range");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_stray_value_rejected() {
        let err = run(
            &TypeNode::Record(point_schema()),
            &FieldDefault::MissingNonPropagating,
            vec![("x", tokens(&["1"])), ("ghost", tokens(&["2"]))],
        )
        .unwrap_err();
        assert!(matches!(err, DeclargsError::Binding { .. }));
    }
}
