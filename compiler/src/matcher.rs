//! Subcommand matching: given a default value and the options of a union
//! over records, pick the option the default belongs to. Used to decide
//! which subcommand is preselected when none is named on the command line.

use std::collections::BTreeMap;
use std::rc::Rc;

use declargs_schema::{TypeNode, UnionMember, Value};

use crate::resolver::ResolveCtx;

/// A type with the types of its defaulted members, used for deep structural
/// matching of a default value against a union option.
#[derive(Debug, Clone)]
pub struct TypeTree {
    pub ty:       TypeNode,
    pub children: BTreeMap<String, TypeTree>,
}

/// Match `default` against `options`, in four tiers:
///
/// 1. identity against a per-option default override,
/// 2. value equality against a per-option default override,
/// 3. deep structural match of type trees,
/// 4. structural subtype of the declared option type.
///
/// Returns the index of the first option the earliest succeeding tier
/// accepts. No tier matching is reported with a warning; the caller then
/// treats the field as defaultless.
pub fn match_option(
    ctx: &mut ResolveCtx,
    default: &Rc<Value>,
    options: &[UnionMember],
) -> Option<usize> {
    for (i, option) in options.iter().enumerate() {
        if let Some(override_value) = &option.default_override {
            if Rc::ptr_eq(default, override_value) {
                return Some(i);
            }
        }
    }

    for (i, option) in options.iter().enumerate() {
        if let Some(override_value) = &option.default_override {
            if **override_value == **default {
                return Some(i);
            }
        }
    }

    let instance = tree_of_value(default);
    for (i, option) in options.iter().enumerate() {
        if let Some(declared) = tree_of_option(ctx, option) {
            if trees_match(&instance, &declared) {
                return Some(i);
            }
        }
    }

    let instance_ty = default.type_of();
    for (i, option) in options.iter().enumerate() {
        if is_structural_subtype(&instance_ty, &option.ty) {
            return Some(i);
        }
    }

    tracing::warn!(
        default = ?default,
        "default matched no variant; an explicit subcommand will be required"
    );
    None
}

/// Type tree of an instance value: its runtime type, with one child per
/// record member.
fn tree_of_value(value: &Value) -> TypeTree {
    let mut children = BTreeMap::new();
    if let Value::Record(_, fields) = value {
        for (name, member) in fields {
            children.insert(name.clone(), tree_of_value(member));
        }
    }
    TypeTree {
        ty: value.type_of(),
        children,
    }
}

/// Type tree of a union option: built from its default override when one is
/// set, otherwise from the declared type with the defaults its own fields
/// carry. Options that cannot be resolved produce no tree.
fn tree_of_option(ctx: &mut ResolveCtx, option: &UnionMember) -> Option<TypeTree> {
    if let Some(override_value) = &option.default_override {
        return Some(tree_of_value(override_value));
    }

    let (ty, _) = option.ty.unwrap_annotations();
    let mut children = BTreeMap::new();
    if matches!(ty, TypeNode::Record(_) | TypeNode::Generic { .. }) {
        let fields = ctx
            .field_list(ty, &declargs_schema::FieldDefault::MissingNonPropagating)
            .ok()?;
        for field in fields {
            if let Some(value) = field.default.as_value() {
                children.insert(field.name.clone(), tree_of_value(value));
            }
        }
    }
    Some(TypeTree {
        ty: ty.clone(),
        children,
    })
}

/// Two trees match when the roots are the same nominal type and every member
/// present on both sides matches recursively. Members only one side knows
/// about (eg fields without declared defaults) are ignored.
fn trees_match(instance: &TypeTree, declared: &TypeTree) -> bool {
    if !roots_equal(&instance.ty, &declared.ty) {
        return false;
    }
    for (name, child) in &instance.children {
        if let Some(declared_child) = declared.children.get(name) {
            if !trees_match(child, declared_child) {
                return false;
            }
        }
    }
    true
}

fn roots_equal(a: &TypeNode, b: &TypeNode) -> bool {
    let (a, _) = a.unwrap_annotations();
    let (b, _) = b.unwrap_annotations();
    match (a, b) {
        (TypeNode::Record(x), TypeNode::Record(y)) => x == y,
        (
            TypeNode::Generic { base: x, .. },
            TypeNode::Generic { base: y, .. },
        ) => x == y,
        (TypeNode::Record(x), TypeNode::Generic { base: y, .. }) => x == y,
        (TypeNode::Generic { base: x, .. }, TypeNode::Record(y)) => x == y,
        _ => a.same_type(b),
    }
}

/// Loose structural subtyping for the last-resort tier: every alternative on
/// the instance side must fit some alternative on the declared side, records
/// compare by their nominal parent chain, containers recurse.
pub fn is_structural_subtype(instance: &TypeNode, declared: &TypeNode) -> bool {
    let (instance, _) = instance.unwrap_annotations();
    let (declared, _) = declared.unwrap_annotations();
    match (instance, declared) {
        (_, TypeNode::Any) => true,
        (TypeNode::Union(members), _) => members
            .iter()
            .all(|m| is_structural_subtype(&m.ty, declared)),
        (_, TypeNode::Union(members)) => members
            .iter()
            .any(|m| is_structural_subtype(instance, &m.ty)),
        (TypeNode::Record(a), TypeNode::Record(b)) => a.is_subtype_of(b),
        (TypeNode::Generic { base: a, .. }, TypeNode::Record(b)) => a.is_subtype_of(b),
        (TypeNode::Record(a), TypeNode::Generic { base: b, .. }) => a.is_subtype_of(b),
        (TypeNode::Generic { base: a, args: x }, TypeNode::Generic { base: b, args: y }) => {
            a.is_subtype_of(b)
                && x.len() == y.len()
                && x.iter().zip(y).all(|(p, q)| is_structural_subtype(p, q))
        }
        (TypeNode::List(a), TypeNode::List(b))
        | (TypeNode::Set(a), TypeNode::Set(b))
        | (TypeNode::VarTuple(a), TypeNode::VarTuple(b)) => is_structural_subtype(a, b),
        (TypeNode::Tuple(a), TypeNode::Tuple(b)) => {
            a.len() == b.len() && a.iter().zip(b).all(|(p, q)| is_structural_subtype(p, q))
        }
        (TypeNode::Map(ak, av), TypeNode::Map(bk, bv)) => {
            is_structural_subtype(ak, bk) && is_structural_subtype(av, bv)
        }
        _ => instance == declared,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use declargs_schema::{
        ConstructorRegistry, FieldSchema, RecordSchema, ScalarKind, TypeNode, Value,
    };

    fn ctx() -> ResolveCtx {
        ResolveCtx::new(ConstructorRegistry::new())
    }

    fn checkout() -> Rc<RecordSchema> {
        RecordSchema::new(
            "Checkout",
            vec![FieldSchema::new("branch", TypeNode::Scalar(ScalarKind::String))],
        )
    }

    fn commit() -> Rc<RecordSchema> {
        RecordSchema::new(
            "Commit",
            vec![FieldSchema::new("message", TypeNode::Scalar(ScalarKind::String))],
        )
    }

    fn options(a: &Rc<RecordSchema>, b: &Rc<RecordSchema>) -> Vec<UnionMember> {
        vec![
            UnionMember::new(TypeNode::Record(a.clone())),
            UnionMember::new(TypeNode::Record(b.clone())),
        ]
    }

    #[test]
    fn test_identity_match() {
        let a = checkout();
        let b = commit();
        let shared = Rc::new(Value::record(&a, vec![("branch", Value::String("main".into()))]));

        let mut options = options(&a, &b);
        options[1].default_override = Some(shared.clone());
        // Identity beats structural: the override on option 1 is this exact
        // allocation, even though option 0 also matches structurally.
        assert_eq!(match_option(&mut ctx(), &shared, &options), Some(1));
    }

    #[test]
    fn test_value_equality_match() {
        let a = checkout();
        let b = commit();
        let mut options = options(&a, &b);
        options[1].default_override = Some(Rc::new(Value::record(
            &b,
            vec![("message", Value::String("wip".into()))],
        )));

        let default = Rc::new(Value::record(
            &b,
            vec![("message", Value::String("wip".into()))],
        ));
        assert_eq!(match_option(&mut ctx(), &default, &options), Some(1));
    }

    #[test]
    fn test_structural_match_by_schema() {
        let a = checkout();
        let b = commit();
        let options = options(&a, &b);

        let default = Rc::new(Value::record(
            &b,
            vec![("message", Value::String("wip".into()))],
        ));
        assert_eq!(match_option(&mut ctx(), &default, &options), Some(1));
    }

    #[test]
    fn test_subtype_match() {
        let base = checkout();
        let derived = Rc::new(RecordSchema {
            parent: Some(base.clone()),
            ..(*RecordSchema::new(
                "TrackedCheckout",
                vec![
                    FieldSchema::new("branch", TypeNode::Scalar(ScalarKind::String)),
                    FieldSchema::new("remote", TypeNode::Scalar(ScalarKind::String)),
                ],
            ))
            .clone()
        });
        let other = commit();
        let options = options(&base, &other);

        let default = Rc::new(Value::record(
            &derived,
            vec![
                ("branch", Value::String("main".into())),
                ("remote", Value::String("origin".into())),
            ],
        ));
        assert_eq!(match_option(&mut ctx(), &default, &options), Some(0));
    }

    #[test]
    fn test_no_match() {
        let a = checkout();
        let b = commit();
        let options = options(&a, &b);

        let stray = RecordSchema::new(
            "Stray",
            vec![FieldSchema::new("x", TypeNode::Scalar(ScalarKind::Int))],
        );
        let default = Rc::new(Value::record(&stray, vec![("x", Value::Int(1))]));
        assert_eq!(match_option(&mut ctx(), &default, &options), None);
    }
}
