//! Parser-tree construction: turning a resolved schema into the flat
//! argument surface handed to the flag parser.
//!
//! A `ParserSpec` is one parser node. Nested records are flattened into it
//! with dot-prefixed argument paths; variant fields become subcommand groups
//! holding one child `ParserSpec` per option.

use std::collections::BTreeMap;
use std::rc::Rc;

use serde::Serialize;

use declargs_schema::{FieldDefault, Markers, ScalarKind, TypeNode, UnionMember, Value};

use crate::error::{DeclargsError, Result};
use crate::instantiator::{self, Instantiator};
use crate::matcher;
use crate::resolver::{self, ResolveCtx};
use crate::strings;
use crate::types::{FieldDef, Nargs};

/// How one argument consumes command-line input.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ArgKind {
    /// Ordinary value argument backed by an instantiator.
    Value {
        #[serde(skip)]
        instantiator: Instantiator,
    },
    /// Defaulted boolean lowered to a `--flag` / `--no-flag` pair.
    BoolFlagPair { default: bool },
    /// Never consumes tokens; the field always takes its default.
    Fixed,
}

/// Flag-parser-facing lowering of one field.
#[derive(Debug, Clone, Serialize)]
pub struct Lowered {
    pub kind:           ArgKind,
    pub nargs:          Nargs,
    pub metavar:        String,
    pub choices:        Option<Vec<String>>,
    pub help:           Option<String>,
    pub required:       bool,
    /// Canonical token rendering of the default, for help display.
    pub default_tokens: Option<Vec<String>>,
}

/// One flat argument: the dotted path relative to the owning parser node,
/// the resolved field behind it, and its lowering.
#[derive(Debug, Clone, Serialize)]
pub struct ArgumentDefinition {
    pub path:    String,
    pub field:   FieldDef,
    pub lowered: Lowered,
}

impl ArgumentDefinition {
    /// User-facing spelling: `--dotted.flag-name` for keyword arguments,
    /// the raw path for positionals.
    pub fn display_flag(&self) -> String {
        if self.field.is_positional() {
            self.path.clone()
        } else {
            strings::flag_name(&self.path)
        }
    }

    /// Path of the negated half of a bool flag pair: the last segment gains
    /// a `no_` prefix.
    pub fn negated_path(&self) -> String {
        let mut segments: Vec<&str> = self.path.split(strings::PATH_DELIMITER).collect();
        let last = format!("no_{}", segments.pop().unwrap_or_default());
        segments
            .iter()
            .map(|s| s.to_string())
            .chain(std::iter::once(last))
            .collect::<Vec<_>>()
            .join(strings::PATH_DELIMITER)
    }
}

/// One alternative of a subcommand group: its registered name, the option
/// type, the default the option was built with, and its own parser node.
#[derive(Debug, Clone, Serialize)]
pub struct SubcommandOption {
    pub name:    String,
    pub ty:      TypeNode,
    pub default: FieldDefault,
    pub spec:    ParserSpec,
}

/// A variant field lowered to mutually-exclusive subcommands.
#[derive(Debug, Clone, Serialize)]
pub struct SubcommandGroup {
    /// Path of the owning field relative to the parser node the group was
    /// flattened into.
    pub path:         String,
    pub options:      Vec<SubcommandOption>,
    pub required:     bool,
    pub default_name: Option<String>,
    pub default:      Option<Rc<Value>>,
    pub help:         Option<String>,
}

impl SubcommandGroup {
    pub fn option(&self, name: &str) -> Option<&SubcommandOption> {
        self.options.iter().find(|o| o.name == name)
    }

    pub fn default_option(&self) -> Option<&SubcommandOption> {
        self.default_name.as_deref().and_then(|n| self.option(n))
    }
}

/// One parser node: flat arguments plus side tables for help text and
/// subcommand groups, both keyed by dotted path relative to this node.
#[derive(Debug, Clone, Serialize)]
pub struct ParserSpec {
    pub description:      Option<String>,
    pub ty:               TypeNode,
    pub args:             Vec<ArgumentDefinition>,
    pub helptext_by_path: BTreeMap<String, Option<String>>,
    pub subcommands:      BTreeMap<String, SubcommandGroup>,
    pub has_required:     bool,
}

impl ParserSpec {
    fn empty(ty: TypeNode) -> Self {
        ParserSpec {
            description:      None,
            ty,
            args:             Vec::new(),
            helptext_by_path: BTreeMap::new(),
            subcommands:      BTreeMap::new(),
            has_required:     false,
        }
    }

    pub fn arg(&self, path: &str) -> Option<&ArgumentDefinition> {
        self.args.iter().find(|a| a.path == path)
    }

    /// Build the parser tree for a node type: a record, a tuple holding
    /// records, a registry-backed type, or a union over records.
    pub fn from_type(ctx: &mut ResolveCtx, ty: &TypeNode, default: &FieldDefault) -> Result<Self> {
        Self::from_type_inherited(ctx, ty, default, Markers::default())
    }

    /// Same, with the owning field's markers unioned into every extracted
    /// field, so markers cascade through nested records.
    fn from_type_inherited(
        ctx: &mut ResolveCtx,
        ty: &TypeNode,
        default: &FieldDefault,
        inherited: Markers,
    ) -> Result<Self> {
        let (bare, _) = ty.unwrap_annotations();
        let narrowed = resolver::narrow(bare, default);

        match &narrowed {
            TypeNode::Record(schema) | TypeNode::Generic { base: schema, .. } => {
                let schema = schema.clone();
                let fields = ctx.field_list(&narrowed, default)?;
                let mut spec = ParserSpec::empty(narrowed);
                spec.description = schema.description.clone();

                ctx.begin_expansion(&schema)?;
                for field in fields {
                    lower_field(ctx, &mut spec, inherit(field, inherited))?;
                }
                ctx.end_expansion(&schema);
                Ok(spec)
            }
            TypeNode::Union(members) if is_record_union(members) => {
                let mut spec = ParserSpec::empty(narrowed.clone());
                let group = build_group(ctx, "", members, default, None, inherited)?;
                spec.has_required = group.required;
                insert_group(&mut spec, group)?;
                Ok(spec)
            }
            TypeNode::Tuple(_) => {
                let fields = ctx.field_list(&narrowed, default)?;
                let mut spec = ParserSpec::empty(narrowed);
                for field in fields {
                    lower_field(ctx, &mut spec, inherit(field, inherited))?;
                }
                Ok(spec)
            }
            TypeNode::Null => Ok(ParserSpec::empty(TypeNode::Null)),
            other => match ctx.registry.lookup(other) {
                Some(schema) => {
                    let fields = ctx.field_list(&narrowed, default)?;
                    let mut spec = ParserSpec::empty(narrowed);
                    spec.description = schema.description.clone();

                    ctx.begin_expansion(&schema)?;
                    for field in fields {
                        lower_field(ctx, &mut spec, inherit(field, inherited))?;
                    }
                    ctx.end_expansion(&schema);
                    Ok(spec)
                }
                None => Err(DeclargsError::UnsupportedSchema(format!(
                    "root type {} is not a record or a union of records",
                    other.display_name()
                ))),
            },
        }
    }
}

fn inherit(field: FieldDef, inherited: Markers) -> FieldDef {
    FieldDef {
        markers: field.markers.union(inherited),
        ..field
    }
}

/// Whether a field routes through nested resolution rather than a flat
/// instantiator.
pub(crate) fn is_nested(ctx: &ResolveCtx, ty: &TypeNode) -> bool {
    let (ty, _) = ty.unwrap_annotations();
    match ty {
        TypeNode::Record(_) | TypeNode::Generic { .. } => true,
        TypeNode::Tuple(items) => items.iter().any(|t| is_nested(ctx, t)),
        TypeNode::Union(_) | TypeNode::Null => false,
        other => ctx.registry.lookup(other).is_some(),
    }
}

/// A union lowers to subcommands when every non-null option is a record.
pub(crate) fn is_record_union(members: &[UnionMember]) -> bool {
    let mut any_record = false;
    for member in members {
        match member.ty.unwrap_annotations().0 {
            TypeNode::Record(_) | TypeNode::Generic { .. } => any_record = true,
            TypeNode::Null => {}
            _ => return false,
        }
    }
    any_record
}

/// Lower one resolved field into `spec`, in priority order: fixed, variant
/// subcommands, nested record, flat argument.
fn lower_field(ctx: &mut ResolveCtx, spec: &mut ParserSpec, field: FieldDef) -> Result<()> {
    if matches!(field.default, FieldDefault::ExcludeFromCall) {
        return Ok(());
    }
    if field.markers.fixed || field.markers.suppress {
        push_fixed(spec, field);
        return Ok(());
    }

    let narrowed = resolver::narrow(&field.ty, &field.default);

    if let TypeNode::Union(members) = &narrowed {
        if is_record_union(members) {
            if field.markers.avoid_subcommands {
                let matched = field
                    .default
                    .as_value()
                    .and_then(|v| matcher::match_option(ctx, v, members));
                if let Some(index) = matched {
                    // Collapse to the matched option and lower it like any
                    // other nested field.
                    let collapsed = FieldDef {
                        ty: members[index].ty.clone(),
                        ..field
                    };
                    return lower_field(ctx, spec, collapsed);
                }
            }

            let group = build_group(
                ctx,
                &field.name,
                members,
                &field.default,
                field.help.clone(),
                field.markers,
            )?;
            spec.has_required |= group.required;
            spec.helptext_by_path
                .insert(field.name.clone(), field.help.clone());
            insert_group(spec, group)?;
            return Ok(());
        }
    }

    if is_nested(ctx, &narrowed) {
        return lower_nested(ctx, spec, field, &narrowed);
    }

    lower_flat(spec, field)
}

fn push_fixed(spec: &mut ParserSpec, field: FieldDef) {
    let path = field.name.clone();
    let help = if field.markers.suppress {
        None
    } else {
        field.help.clone()
    };
    spec.helptext_by_path.insert(path.clone(), help.clone());
    spec.args.push(ArgumentDefinition {
        path,
        lowered: Lowered {
            kind: ArgKind::Fixed,
            nargs: Nargs::Fixed(0),
            metavar: "{fixed}".to_string(),
            choices: None,
            help,
            required: false,
            default_tokens: None,
        },
        field,
    });
}

/// Flatten a nested record into the current node with dot-prefixed paths.
fn lower_nested(
    ctx: &mut ResolveCtx,
    spec: &mut ParserSpec,
    field: FieldDef,
    narrowed: &TypeNode,
) -> Result<()> {
    let mut child = ParserSpec::from_type_inherited(ctx, narrowed, &field.default, field.markers)?;

    // A concrete record default makes this an all-or-nothing group: members
    // without their own defaults stop being individually required, and the
    // calling engine enforces "override everything or nothing".
    let optional_group = field.default.as_value().is_some();
    if optional_group {
        for arg in child.args.iter_mut() {
            arg.lowered.required = false;
        }
        child.has_required = child.subcommands.values().any(|g| g.required);
    }

    let mut group_help = field.help.clone().or(child.description);
    if optional_group {
        let note = "overrides apply all-or-nothing";
        group_help = Some(match group_help {
            Some(base) => format!("{} ({})", base, note),
            None => format!("({})", note),
        });
    }
    spec.helptext_by_path.insert(field.name.clone(), group_help);

    for mut arg in child.args {
        arg.path = strings::make_field_name(&[&field.name, &arg.path]);
        spec.has_required |= arg.lowered.required;
        spec.args.push(arg);
    }
    for (path, help) in child.helptext_by_path {
        spec.helptext_by_path
            .insert(strings::make_field_name(&[&field.name, &path]), help);
    }
    for (_, mut group) in child.subcommands {
        group.path = strings::make_field_name(&[&field.name, &group.path]);
        spec.has_required |= group.required;
        insert_group(spec, group)?;
    }
    spec.has_required |= child.has_required;
    Ok(())
}

/// Lower a leaf field to a flat argument.
fn lower_flat(spec: &mut ParserSpec, field: FieldDef) -> Result<()> {
    let (bare, _) = field.ty.unwrap_annotations();

    // Defaulted keyword booleans become a --flag / --no-flag pair.
    if matches!(bare, TypeNode::Scalar(ScalarKind::Bool))
        && !field.markers.flag_conversion_off
        && !field.is_positional()
    {
        if let Some(value) = field.default.as_value() {
            if let Value::Bool(default) = **value {
                let path = field.name.clone();
                spec.helptext_by_path.insert(path.clone(), field.help.clone());
                spec.args.push(ArgumentDefinition {
                    path,
                    lowered: Lowered {
                        kind:           ArgKind::BoolFlagPair { default },
                        nargs:          Nargs::Fixed(0),
                        metavar:        String::new(),
                        choices:        None,
                        help:           field.help.clone(),
                        required:       false,
                        default_tokens: Some(vec![if default {
                            "true".to_string()
                        } else {
                            "false".to_string()
                        }]),
                    },
                    field,
                });
                return Ok(());
            }
        }
    }

    let (inst, meta) = match instantiator::instantiator_for(&field.ty, field.markers) {
        Ok(pair) => pair,
        // A leaf with no token conversion still works when a default exists:
        // it degrades to a fixed field that always takes that default.
        Err(DeclargsError::UnsupportedType(msg)) if field.default.as_value().is_some() => {
            tracing::warn!(
                field = %field.name,
                "{}; the field is fixed to its default",
                msg
            );
            push_fixed(spec, field);
            return Ok(());
        }
        Err(err) => return Err(err),
    };

    let default_tokens = field
        .default
        .as_value()
        .and_then(|v| strings::value_tokens(v));
    let required = field.default.as_value().is_none()
        && !(field.is_positional() && meta.nargs == Nargs::Variable);

    let path = field.name.clone();
    spec.helptext_by_path.insert(path.clone(), field.help.clone());
    spec.has_required |= required;
    spec.args.push(ArgumentDefinition {
        path,
        lowered: Lowered {
            kind: ArgKind::Value { instantiator: inst },
            nargs: meta.nargs,
            metavar: meta.metavar,
            choices: meta.choices,
            help: field.help.clone(),
            required,
            default_tokens,
        },
        field,
    });
    Ok(())
}

/// Build the subcommand group for a variant field.
fn build_group(
    ctx: &mut ResolveCtx,
    path: &str,
    members: &[UnionMember],
    default: &FieldDefault,
    help: Option<String>,
    markers: Markers,
) -> Result<SubcommandGroup> {
    let matched = default
        .as_value()
        .and_then(|v| matcher::match_option(ctx, v, members));

    let mut options = Vec::with_capacity(members.len());
    let mut default_name = None;
    let mut default_has_required = false;
    for (index, member) in members.iter().enumerate() {
        let name = member.name_override.clone().unwrap_or_else(|| {
            strings::subcommand_name(path, &member.ty, markers.omit_subcommand_prefixes)
        });

        let option_default = if let (true, Some(value)) =
            (matched == Some(index), default.as_value())
        {
            FieldDefault::Value(value.clone())
        } else if let Some(value) = &member.default_override {
            FieldDefault::Value(value.clone())
        } else if matches!(default, FieldDefault::MissingPropagating) {
            FieldDefault::MissingPropagating
        } else {
            FieldDefault::MissingNonPropagating
        };

        let option_spec = match member.ty.unwrap_annotations().0 {
            TypeNode::Null => ParserSpec::empty(TypeNode::Null),
            ty => ParserSpec::from_type_inherited(ctx, ty, &option_default, markers)?,
        };

        if matched == Some(index) {
            default_name = Some(name.clone());
            default_has_required = option_spec.has_required;
        }
        options.push(SubcommandOption {
            name,
            ty: member.ty.clone(),
            default: option_default,
            spec: option_spec,
        });
    }

    Ok(SubcommandGroup {
        path:     path.to_string(),
        required: default_name.is_none() || default_has_required,
        default:  default.as_value().cloned(),
        default_name,
        options,
        help,
    })
}

/// One flattened parser node maps to one flag-parser command, which supports
/// a single set of mutually-exclusive subcommands.
fn insert_group(spec: &mut ParserSpec, group: SubcommandGroup) -> Result<()> {
    if !spec.subcommands.is_empty() {
        return Err(DeclargsError::UnsupportedSchema(format!(
            "variant field {:?} conflicts with another variant field at the \
             same nesting level; only one is supported per level",
            group.path
        )));
    }
    spec.subcommands.insert(group.path.clone(), group);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use declargs_schema::{ConstructorRegistry, FieldSchema, RecordSchema};

    fn ctx() -> ResolveCtx {
        ResolveCtx::new(ConstructorRegistry::new())
    }

    fn build(ty: &TypeNode) -> ParserSpec {
        ParserSpec::from_type(&mut ctx(), ty, &FieldDefault::MissingNonPropagating).unwrap()
    }

    #[test]
    fn test_flag_naming() {
        let schema = RecordSchema::new(
            "Opt",
            vec![FieldSchema::new(
                "learning_rate",
                TypeNode::Scalar(ScalarKind::Float),
            )],
        );
        let spec = build(&TypeNode::Record(schema));
        let arg = spec.arg("learning_rate").unwrap();
        assert_eq!(arg.display_flag(), "--learning-rate");
        assert!(arg.lowered.required);
        assert!(spec.has_required);
    }

    #[test]
    fn test_nested_prefixing() {
        let inner = RecordSchema::new(
            "Model",
            vec![FieldSchema::new("lr", TypeNode::Scalar(ScalarKind::Float))],
        );
        let outer = RecordSchema::new(
            "Config",
            vec![FieldSchema::new("model", TypeNode::Record(inner))],
        );
        let spec = build(&TypeNode::Record(outer));
        assert!(spec.arg("model.lr").is_some());
        assert_eq!(spec.arg("model.lr").unwrap().display_flag(), "--model.lr");
    }

    #[test]
    fn test_bool_pair_lowering() {
        let schema = RecordSchema::new(
            "Opt",
            vec![
                FieldSchema::new("verbose", TypeNode::Scalar(ScalarKind::Bool))
                    .with_default(Value::Bool(false)),
                FieldSchema::new("strict", TypeNode::Scalar(ScalarKind::Bool)),
            ],
        );
        let spec = build(&TypeNode::Record(schema));

        let verbose = spec.arg("verbose").unwrap();
        assert!(matches!(
            verbose.lowered.kind,
            ArgKind::BoolFlagPair { default: false }
        ));
        assert_eq!(verbose.negated_path(), "no_verbose");

        // Without a default, booleans stay value arguments.
        let strict = spec.arg("strict").unwrap();
        assert!(matches!(strict.lowered.kind, ArgKind::Value { .. }));
        assert_eq!(
            strict.lowered.choices,
            Some(vec!["true".to_string(), "false".to_string()])
        );
        assert!(strict.lowered.required);
    }

    #[test]
    fn test_flag_conversion_off() {
        let schema = RecordSchema::new(
            "Opt",
            vec![FieldSchema::new("verbose", TypeNode::Scalar(ScalarKind::Bool))
                .with_default(Value::Bool(true))
                .with_markers(Markers {
                    flag_conversion_off: true,
                    ..Markers::default()
                })],
        );
        let spec = build(&TypeNode::Record(schema));
        let arg = spec.arg("verbose").unwrap();
        assert!(matches!(arg.lowered.kind, ArgKind::Value { .. }));
        assert_eq!(arg.lowered.default_tokens, Some(vec!["true".to_string()]));
    }

    fn variant_schema() -> Rc<RecordSchema> {
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
        RecordSchema::new(
            "Cli",
            vec![FieldSchema::new(
                "cmd",
                TypeNode::union(vec![
                    TypeNode::Record(checkout),
                    TypeNode::Record(commit),
                ]),
            )],
        )
    }

    #[test]
    fn test_subcommand_group() {
        let spec = build(&TypeNode::Record(variant_schema()));
        let group = spec.subcommands.get("cmd").unwrap();
        assert!(group.required);
        assert_eq!(group.default_name, None);
        let names: Vec<&str> = group.options.iter().map(|o| o.name.as_str()).collect();
        assert_eq!(names, vec!["cmd:checkout", "cmd:commit"]);

        // Option parsers carry their own argument namespaces.
        let checkout = group.option("cmd:checkout").unwrap();
        assert!(checkout.spec.arg("branch").is_some());
        assert!(!checkout.spec.has_required);
    }

    #[test]
    fn test_subcommand_default_resolution() {
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
        let default = Value::record(&checkout, vec![("branch", Value::String("dev".into()))]);
        let schema = RecordSchema::new(
            "Cli",
            vec![FieldSchema::new(
                "cmd",
                TypeNode::union(vec![
                    TypeNode::Record(checkout),
                    TypeNode::Record(commit),
                ]),
            )
            .with_default(default)],
        );

        let spec = build(&TypeNode::Record(schema));
        let group = spec.subcommands.get("cmd").unwrap();
        assert_eq!(group.default_name.as_deref(), Some("cmd:checkout"));
        assert!(!group.required);
        assert!(!spec.has_required);
    }

    #[test]
    fn test_two_variant_fields_on_one_level_rejected() {
        let commands = || {
            TypeNode::union(vec![
                TypeNode::Record(RecordSchema::new("A", vec![])),
                TypeNode::Record(RecordSchema::new("B", vec![])),
            ])
        };
        let schema = RecordSchema::new(
            "Cli",
            vec![
                FieldSchema::new("first", commands()),
                FieldSchema::new("second", commands()),
            ],
        );
        assert!(matches!(
            ParserSpec::from_type(
                &mut ctx(),
                &TypeNode::Record(schema),
                &FieldDefault::MissingNonPropagating
            ),
            Err(DeclargsError::UnsupportedSchema(_))
        ));
    }

    #[test]
    fn test_unsupported_leaf_downgrades_with_default() {
        let schema = RecordSchema::new(
            "Opt",
            vec![
                FieldSchema::new("anything", TypeNode::Any).with_default(Value::Int(3)),
            ],
        );
        let spec = build(&TypeNode::Record(schema));
        let arg = spec.arg("anything").unwrap();
        assert!(matches!(arg.lowered.kind, ArgKind::Fixed));
        assert!(!arg.lowered.required);
    }

    #[test]
    fn test_unsupported_leaf_without_default_errors() {
        let schema = RecordSchema::new(
            "Opt",
            vec![FieldSchema::new("anything", TypeNode::Any)],
        );
        assert!(matches!(
            ParserSpec::from_type(
                &mut ctx(),
                &TypeNode::Record(schema),
                &FieldDefault::MissingNonPropagating
            ),
            Err(DeclargsError::UnsupportedType(_))
        ));
    }

    #[test]
    fn test_optional_group_members_not_required() {
        let coord = RecordSchema::new(
            "Coord",
            vec![
                FieldSchema::new("a", TypeNode::Scalar(ScalarKind::Int)),
                FieldSchema::new("b", TypeNode::Scalar(ScalarKind::Int))
                    .with_default(Value::Int(2)),
                FieldSchema::new("c", TypeNode::Scalar(ScalarKind::Int)),
            ],
        );
        // Partial default instance: `a` and `c` have no per-member value.
        let default = Value::record(&coord, vec![("b", Value::Int(5))]);
        let schema = RecordSchema::new(
            "Cli",
            vec![FieldSchema::new("coord", TypeNode::Record(coord)).with_default(default)],
        );

        let spec = build(&TypeNode::Record(schema));
        assert!(!spec.arg("coord.a").unwrap().lowered.required);
        assert!(!spec.arg("coord.c").unwrap().lowered.required);
        assert!(!spec.has_required);
    }

    #[test]
    fn test_root_union() {
        let a = RecordSchema::new("Alpha", vec![]);
        let b = RecordSchema::new("Beta", vec![]);
        let spec = build(&TypeNode::union(vec![
            TypeNode::Record(a),
            TypeNode::Record(b),
        ]));
        let group = spec.subcommands.get("").unwrap();
        let names: Vec<&str> = group.options.iter().map(|o| o.name.as_str()).collect();
        assert_eq!(names, vec!["alpha", "beta"]);
        assert!(group.required);
    }

    #[test]
    fn test_markers_cascade_into_nested_fields() {
        let inner = RecordSchema::new(
            "Inner",
            vec![FieldSchema::new("verbose", TypeNode::Scalar(ScalarKind::Bool))
                .with_default(Value::Bool(false))],
        );
        let outer = RecordSchema::new(
            "Outer",
            vec![FieldSchema::new("opts", TypeNode::Record(inner))
                .with_markers(Markers {
                    flag_conversion_off: true,
                    ..Markers::default()
                })],
        );

        // The marker on the record field reaches the nested bool, keeping it
        // a value argument instead of a --flag / --no-flag pair.
        let spec = build(&TypeNode::Record(outer));
        let arg = spec.arg("opts.verbose").unwrap();
        assert!(matches!(arg.lowered.kind, ArgKind::Value { .. }));
    }

    #[test]
    fn test_schema_reuse_across_siblings() {
        let node = RecordSchema::new(
            "Node",
            vec![FieldSchema::new("depth", TypeNode::Scalar(ScalarKind::Int))],
        );
        let wrapper = RecordSchema::new(
            "Wrapper",
            vec![
                FieldSchema::new("left", TypeNode::Record(node.clone())),
                FieldSchema::new("right", TypeNode::Record(node)),
            ],
        );

        // The same schema on two sibling paths is reuse, not a cycle.
        let spec = build(&TypeNode::Record(wrapper));
        assert!(spec.arg("left.depth").is_some());
        assert!(spec.arg("right.depth").is_some());
    }
}
