//! Schema resolution: normalizing a type descriptor plus a default instance
//! into an ordered field list.
//!
//! This is the layer that decides whether a field is a nested record (it can
//! be decomposed further) or a leaf (it becomes a single flat argument).
//! Callers treat `UnsupportedSchema` as "leaf", and `Cycle` as a fatal
//! configuration error.

use std::collections::HashMap;
use std::fmt::Write as _;
use std::rc::Rc;

use declargs_schema::{
    Binding, ConstructorRegistry, FieldDefault, RecordSchema, TypeNode, Value,
};

use crate::error::{DeclargsError, Result};
use crate::types::FieldDef;

/// Per-invocation resolution state: the custom-constructor registry, the
/// field-extraction memo cache, and the in-progress set used for cycle
/// detection. Dropped at the end of each invocation, so no state persists.
pub struct ResolveCtx {
    pub registry: ConstructorRegistry,
    memo:         HashMap<String, Vec<FieldDef>>,
    in_progress:  Vec<usize>,
}

impl ResolveCtx {
    pub fn new(registry: ConstructorRegistry) -> Self {
        ResolveCtx {
            registry,
            memo: HashMap::new(),
            in_progress: Vec::new(),
        }
    }

    /// Mark a record as under expansion on the current path. Fails when the
    /// record is already being expanded, which means the schema recurses
    /// into itself.
    pub fn begin_expansion(&mut self, schema: &Rc<RecordSchema>) -> Result<()> {
        let key = Rc::as_ptr(schema) as usize;
        if self.in_progress.contains(&key) {
            return Err(DeclargsError::Cycle(schema.name.clone()));
        }
        self.in_progress.push(key);
        Ok(())
    }

    pub fn end_expansion(&mut self, schema: &Rc<RecordSchema>) {
        let key = Rc::as_ptr(schema) as usize;
        if let Some(pos) = self.in_progress.iter().rposition(|k| *k == key) {
            self.in_progress.remove(pos);
        }
    }

    fn is_expanding(&self, schema: &Rc<RecordSchema>) -> bool {
        self.in_progress.contains(&(Rc::as_ptr(schema) as usize))
    }

    /// Normalize `(ty, default)` into an ordered field list.
    pub fn field_list(&mut self, ty: &TypeNode, default: &FieldDefault) -> Result<Vec<FieldDef>> {
        let (ty, _markers) = ty.unwrap_annotations();
        let ty = narrow(ty, default);

        let key = structural_key(&ty, default);
        if let Some(cached) = self.memo.get(&key) {
            // Cached success still counts as re-entry for cycle purposes.
            if let TypeNode::Record(schema) | TypeNode::Generic { base: schema, .. } = &ty {
                if self.is_expanding(schema) {
                    return Err(DeclargsError::Cycle(schema.name.clone()));
                }
            }
            return Ok(cached.clone());
        }

        let fields = match &ty {
            TypeNode::Record(schema) => {
                if self.is_expanding(schema) {
                    return Err(DeclargsError::Cycle(schema.name.clone()));
                }
                extract_record(schema, default, &HashMap::new())?
            }
            TypeNode::Generic { base, args } => {
                if self.is_expanding(base) {
                    return Err(DeclargsError::Cycle(base.name.clone()));
                }
                if base.params.len() != args.len() {
                    return Err(DeclargsError::UnsupportedSchema(format!(
                        "type {} takes {} parameters but got {} arguments",
                        base.name,
                        base.params.len(),
                        args.len()
                    )));
                }
                let bindings: HashMap<String, TypeNode> = base
                    .params
                    .iter()
                    .cloned()
                    .zip(args.iter().cloned())
                    .collect();
                extract_record(base, default, &bindings)?
            }
            TypeNode::Tuple(items) => extract_tuple(items, default)?,
            other => {
                // Extension point: registered custom constructors make
                // otherwise-atomic types decomposable.
                if let Some(schema) = self.registry.lookup(other) {
                    extract_record(&schema, default, &HashMap::new())?
                } else {
                    return Err(DeclargsError::UnsupportedSchema(format!(
                        "type {} cannot be decomposed into fields",
                        other.display_name()
                    )));
                }
            }
        };

        self.memo.insert(key, fields.clone());
        Ok(fields)
    }
}

/// Narrow a declared descriptor using the runtime shape of its default.
pub fn narrow(ty: &TypeNode, default: &FieldDefault) -> TypeNode {
    let (ty, _) = ty.unwrap_annotations();
    let default_value = match default {
        FieldDefault::Value(v) => v,
        _ => return ty.clone(),
    };

    match (ty, default_value.as_ref()) {
        // A default whose runtime type is a strict subtype of the declared
        // record narrows the descriptor to the runtime type. Unions keep
        // their full choice set.
        (TypeNode::Record(declared), Value::Record(runtime, _)) => {
            if runtime.is_strict_subtype_of(declared) {
                TypeNode::Record(runtime.clone())
            } else {
                ty.clone()
            }
        }
        (TypeNode::Union(_), _) => ty.clone(),

        // Untyped uniform containers with a non-empty default infer element
        // types from the default's contents: heterogeneous contents become a
        // fixed-arity tuple, homogeneous ones a uniform element type.
        (TypeNode::List(inner), Value::List(items))
            if matches!(inner.as_ref(), TypeNode::Any) && !items.is_empty() =>
        {
            match items[0].type_of() {
                _ if !homogeneous(items) => {
                    TypeNode::Tuple(items.iter().map(Value::type_of).collect())
                }
                elem => TypeNode::List(Box::new(elem)),
            }
        }
        (TypeNode::Set(inner), Value::Set(items))
            if matches!(inner.as_ref(), TypeNode::Any) && !items.is_empty() =>
        {
            if homogeneous(items) {
                TypeNode::Set(Box::new(items[0].type_of()))
            } else {
                ty.clone()
            }
        }
        (TypeNode::VarTuple(inner), Value::Tuple(items))
            if matches!(inner.as_ref(), TypeNode::Any) && !items.is_empty() =>
        {
            if homogeneous(items) {
                TypeNode::VarTuple(Box::new(items[0].type_of()))
            } else {
                TypeNode::Tuple(items.iter().map(Value::type_of).collect())
            }
        }
        (TypeNode::Tuple(positions), Value::Tuple(items)) if positions.len() == items.len() => {
            TypeNode::Tuple(
                positions
                    .iter()
                    .zip(items.iter())
                    .map(|(declared, item)| match declared {
                        TypeNode::Any => item.type_of(),
                        other => other.clone(),
                    })
                    .collect(),
            )
        }
        (TypeNode::Any, value) => value.type_of(),
        _ => ty.clone(),
    }
}

fn homogeneous(items: &[Value]) -> bool {
    items
        .windows(2)
        .all(|pair| pair[0].type_of().same_type(&pair[1].type_of()))
}

/// Substitute bound type parameters throughout a descriptor. Bindings thread
/// through nested structure so parameters inherited from an outer generic
/// record resolve too.
pub fn substitute(ty: &TypeNode, bindings: &HashMap<String, TypeNode>) -> TypeNode {
    if bindings.is_empty() {
        return ty.clone();
    }
    match ty {
        TypeNode::Param(name) => bindings.get(name).cloned().unwrap_or_else(|| ty.clone()),
        TypeNode::List(inner) => TypeNode::List(Box::new(substitute(inner, bindings))),
        TypeNode::Set(inner) => TypeNode::Set(Box::new(substitute(inner, bindings))),
        TypeNode::VarTuple(inner) => TypeNode::VarTuple(Box::new(substitute(inner, bindings))),
        TypeNode::Tuple(items) => {
            TypeNode::Tuple(items.iter().map(|t| substitute(t, bindings)).collect())
        }
        TypeNode::Map(k, v) => TypeNode::Map(
            Box::new(substitute(k, bindings)),
            Box::new(substitute(v, bindings)),
        ),
        TypeNode::Union(members) => TypeNode::Union(
            members
                .iter()
                .map(|m| {
                    let mut m = m.clone();
                    m.ty = substitute(&m.ty, bindings);
                    m
                })
                .collect(),
        ),
        TypeNode::Generic { base, args } => TypeNode::Generic {
            base: base.clone(),
            args: args.iter().map(|a| substitute(a, bindings)).collect(),
        },
        TypeNode::Annotated { inner, markers } => TypeNode::Annotated {
            inner:   Box::new(substitute(inner, bindings)),
            markers: *markers,
        },
        other => other.clone(),
    }
}

/// One field per record member. Default priority: parent default's member
/// value, then the member's own declared default, then non-propagating
/// missing. A propagating-missing parent default overrides everything below
/// it, forcing the whole subtree to be required.
fn extract_record(
    schema: &Rc<RecordSchema>,
    default: &FieldDefault,
    bindings: &HashMap<String, TypeNode>,
) -> Result<Vec<FieldDef>> {
    let mut fields = Vec::with_capacity(schema.fields.len());
    for member in &schema.fields {
        let substituted = substitute(&member.ty, bindings);
        let (inner, ty_markers) = substituted.unwrap_annotations();
        if let TypeNode::Param(name) = inner {
            return Err(DeclargsError::UnsupportedSchema(format!(
                "field {:?} of {} has unbound type parameter {:?}",
                member.name, schema.name, name
            )));
        }

        let default = if schema.open && member.excluded {
            FieldDefault::ExcludeFromCall
        } else if matches!(default, FieldDefault::MissingPropagating) {
            FieldDefault::MissingPropagating
        } else if let Some(value) = default
            .as_value()
            .and_then(|parent| parent.member(&member.name).cloned())
        {
            FieldDefault::value(value)
        } else {
            member.default.clone()
        };

        fields.push(FieldDef {
            name:    member.name.clone(),
            ty:      inner.clone(),
            default,
            help:    member.help.clone(),
            binding: member.binding,
            markers: member.markers.union(ty_markers),
        });
    }
    Ok(fields)
}

/// Fixed-order unnamed tuple-like schema: same mechanics as records, with
/// the position index as the field name and positional binding.
fn extract_tuple(items: &[TypeNode], default: &FieldDefault) -> Result<Vec<FieldDef>> {
    let default_items: Option<&[Value]> = match default {
        FieldDefault::Value(v) => match v.as_ref() {
            Value::Tuple(items) => Some(items.as_slice()),
            _ => None,
        },
        _ => None,
    };

    let mut fields = Vec::with_capacity(items.len());
    for (index, item) in items.iter().enumerate() {
        let (inner, ty_markers) = item.unwrap_annotations();
        let default = if matches!(default, FieldDefault::MissingPropagating) {
            FieldDefault::MissingPropagating
        } else if let Some(value) = default_items.and_then(|d| d.get(index)) {
            FieldDefault::value(value.clone())
        } else {
            FieldDefault::MissingNonPropagating
        };
        fields.push(FieldDef {
            name:    index.to_string(),
            ty:      inner.clone(),
            default,
            help:    None,
            binding: Binding::Positional,
            markers: ty_markers,
        });
    }
    Ok(fields)
}

/// Cache key for field extraction: structural over containers, nominal (by
/// allocation) over records and enums. Stable within one invocation, which
/// is exactly the memo's lifetime.
fn structural_key(ty: &TypeNode, default: &FieldDefault) -> String {
    let mut out = String::new();
    push_type_key(ty, &mut out);
    let _ = write!(out, "#{:?}", default);
    out
}

fn push_type_key(ty: &TypeNode, out: &mut String) {
    match ty {
        TypeNode::Null => out.push('0'),
        TypeNode::Scalar(kind) => {
            let _ = write!(out, "s{:?}", kind);
        }
        TypeNode::Enum(schema) => {
            let _ = write!(out, "e{:p}", Rc::as_ptr(schema));
        }
        TypeNode::Literal(values) => {
            let _ = write!(out, "l{:?}", values);
        }
        TypeNode::List(inner) => {
            out.push('L');
            push_type_key(inner, out);
        }
        TypeNode::Set(inner) => {
            out.push('S');
            push_type_key(inner, out);
        }
        TypeNode::VarTuple(inner) => {
            out.push('V');
            push_type_key(inner, out);
        }
        TypeNode::Tuple(items) => {
            out.push('T');
            for item in items {
                push_type_key(item, out);
                out.push(',');
            }
        }
        TypeNode::Map(k, v) => {
            out.push('M');
            push_type_key(k, out);
            out.push(':');
            push_type_key(v, out);
        }
        TypeNode::Union(members) => {
            out.push('U');
            for member in members {
                push_type_key(&member.ty, out);
                out.push('|');
            }
        }
        TypeNode::Record(schema) => {
            let _ = write!(out, "r{:p}", Rc::as_ptr(schema));
        }
        TypeNode::Generic { base, args } => {
            let _ = write!(out, "g{:p}<", Rc::as_ptr(base));
            for arg in args {
                push_type_key(arg, out);
                out.push(',');
            }
            out.push('>');
        }
        TypeNode::Param(name) => {
            let _ = write!(out, "p{}", name);
        }
        TypeNode::Custom(custom) => {
            let _ = write!(out, "c{:p}", Rc::as_ptr(custom));
        }
        TypeNode::Annotated { inner, markers } => {
            let _ = write!(out, "a{:?}", markers);
            push_type_key(inner, out);
        }
        TypeNode::Any => out.push('?'),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use declargs_schema::{FieldSchema, ScalarKind};

    fn int() -> TypeNode {
        TypeNode::Scalar(ScalarKind::Int)
    }

    fn point_schema() -> Rc<RecordSchema> {
        RecordSchema::new(
            "Point",
            vec![
                FieldSchema::new("x", int()),
                FieldSchema::new("y", int()).with_default(Value::Int(3)),
            ],
        )
    }

    #[test]
    fn test_record_extraction_defaults() {
        let schema = point_schema();
        let mut ctx = ResolveCtx::new(ConstructorRegistry::new());

        let fields = ctx
            .field_list(
                &TypeNode::Record(schema.clone()),
                &FieldDefault::MissingNonPropagating,
            )
            .unwrap();
        assert_eq!(fields.len(), 2);
        assert_eq!(fields[0].name, "x");
        assert_eq!(fields[0].default, FieldDefault::MissingNonPropagating);
        assert_eq!(fields[1].default, FieldDefault::value(Value::Int(3)));
    }

    #[test]
    fn test_parent_default_wins_over_declared() {
        let schema = point_schema();
        let parent = Value::record(&schema, vec![("x", Value::Int(1)), ("y", Value::Int(2))]);
        let mut ctx = ResolveCtx::new(ConstructorRegistry::new());

        let fields = ctx
            .field_list(&TypeNode::Record(schema.clone()), &FieldDefault::value(parent))
            .unwrap();
        assert_eq!(fields[0].default, FieldDefault::value(Value::Int(1)));
        assert_eq!(fields[1].default, FieldDefault::value(Value::Int(2)));
    }

    #[test]
    fn test_propagating_missing_overrides_declared_defaults() {
        let schema = point_schema();
        let mut ctx = ResolveCtx::new(ConstructorRegistry::new());

        let fields = ctx
            .field_list(
                &TypeNode::Record(schema.clone()),
                &FieldDefault::MissingPropagating,
            )
            .unwrap();
        // `y` declares a default, but a propagating-missing parent forces the
        // whole subtree to be required.
        assert_eq!(fields[1].default, FieldDefault::MissingPropagating);
    }

    #[test]
    fn test_resolution_idempotence() {
        let schema = point_schema();
        let mut ctx = ResolveCtx::new(ConstructorRegistry::new());
        let ty = TypeNode::Record(schema);

        let first = ctx
            .field_list(&ty, &FieldDefault::MissingNonPropagating)
            .unwrap();
        let second = ctx
            .field_list(&ty, &FieldDefault::MissingNonPropagating)
            .unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_container_narrowing() {
        let heterogeneous = FieldDefault::value(Value::List(vec![
            Value::Int(1),
            Value::String("a".into()),
        ]));
        assert_eq!(
            narrow(&TypeNode::list(TypeNode::Any), &heterogeneous),
            TypeNode::Tuple(vec![int(), TypeNode::Scalar(ScalarKind::String)])
        );

        let homogeneous = FieldDefault::value(Value::List(vec![Value::Int(1), Value::Int(2)]));
        assert_eq!(
            narrow(&TypeNode::list(TypeNode::Any), &homogeneous),
            TypeNode::list(int())
        );
    }

    #[test]
    fn test_subtype_narrowing() {
        let base = point_schema();
        let child = Rc::new(RecordSchema {
            name:        "Point3".to_string(),
            params:      vec![],
            fields:      vec![
                FieldSchema::new("x", int()),
                FieldSchema::new("y", int()),
                FieldSchema::new("z", int()),
            ],
            parent:      Some(base.clone()),
            open:        false,
            description: None,
            construct:   None,
        });
        let default = FieldDefault::value(Value::record(
            &child,
            vec![("x", Value::Int(0)), ("y", Value::Int(0)), ("z", Value::Int(0))],
        ));
        assert_eq!(
            narrow(&TypeNode::Record(base), &default),
            TypeNode::Record(child)
        );
    }

    #[test]
    fn test_generic_binding() {
        let schema = RecordSchema::generic(
            "Wrapper",
            &["T"],
            vec![FieldSchema::new("value", TypeNode::Param("T".into()))],
        );
        let mut ctx = ResolveCtx::new(ConstructorRegistry::new());
        let ty = TypeNode::Generic {
            base: schema,
            args: vec![int()],
        };
        let fields = ctx
            .field_list(&ty, &FieldDefault::MissingNonPropagating)
            .unwrap();
        assert_eq!(fields[0].ty, int());
    }

    #[test]
    fn test_unbound_param_rejected() {
        let schema = RecordSchema::generic(
            "Wrapper",
            &["T"],
            vec![FieldSchema::new("value", TypeNode::Param("T".into()))],
        );
        let mut ctx = ResolveCtx::new(ConstructorRegistry::new());
        let err = ctx
            .field_list(
                &TypeNode::Record(schema),
                &FieldDefault::MissingNonPropagating,
            )
            .unwrap_err();
        assert!(matches!(err, DeclargsError::UnsupportedSchema(_)));
    }

    #[test]
    fn test_cycle_detection() {
        let schema = point_schema();
        let mut ctx = ResolveCtx::new(ConstructorRegistry::new());
        ctx.begin_expansion(&schema).unwrap();
        let err = ctx
            .field_list(
                &TypeNode::Record(schema.clone()),
                &FieldDefault::MissingNonPropagating,
            )
            .unwrap_err();
        assert!(matches!(err, DeclargsError::Cycle(_)));
        ctx.end_expansion(&schema);
    }

    #[test]
    fn test_leaf_types_are_unsupported() {
        let mut ctx = ResolveCtx::new(ConstructorRegistry::new());
        let err = ctx
            .field_list(&int(), &FieldDefault::MissingNonPropagating)
            .unwrap_err();
        assert!(matches!(err, DeclargsError::UnsupportedSchema(_)));
    }

    #[test]
    fn test_registry_rewrites_custom_types() {
        let mut registry = ConstructorRegistry::new();
        registry.register(
            |ty| matches!(ty, TypeNode::Custom(c) if c.name == "Duration"),
            |_| {
                RecordSchema::new(
                    "Duration",
                    vec![FieldSchema::new("seconds", TypeNode::Scalar(ScalarKind::UInt))],
                )
            },
        );
        let custom = TypeNode::Custom(declargs_schema::CustomScalar::new("Duration", |_| {
            Ok(Value::Null)
        }));
        let mut ctx = ResolveCtx::new(registry);
        let fields = ctx
            .field_list(&custom, &FieldDefault::MissingNonPropagating)
            .unwrap();
        assert_eq!(fields[0].name, "seconds");
    }
}
