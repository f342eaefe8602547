use std::fmt;
use std::rc::Rc;

use serde::ser::{SerializeMap, SerializeSeq};
use serde::{Serialize, Serializer};

use crate::ty::{EnumSchema, RecordSchema, ScalarKind, TypeNode, UnionMember};

/// This type holds dynamic schema data.
///
/// Values can represent anything a declargs schema describes: default
/// instances supplied at build time and the typed object graph reconstructed
/// from parsed command-line input. Records and enums keep a reference to
/// their schema so that runtime types can be recovered for subtype narrowing
/// and subcommand matching.
#[derive(Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    UInt(u64),
    Float(f64),
    String(String),
    Enum(Rc<EnumSchema>, String),
    List(Vec<Value>),
    Set(Vec<Value>),
    Tuple(Vec<Value>),
    Map(Vec<(Value, Value)>),
    Record(Rc<RecordSchema>, Vec<(String, Value)>),
}

impl Value {
    /// A convenience method to extract the value out of a [Bool](#variant.Bool).
    /// Returns `false` for other value kinds.
    pub fn as_bool(&self) -> bool {
        match *self {
            Value::Bool(value) => value,
            _ => false,
        }
    }

    /// A convenience method to extract the value out of an [Int](#variant.Int).
    /// Returns `0` for other value kinds.
    pub fn as_int(&self) -> i64 {
        match *self {
            Value::Int(value) => value,
            _ => 0,
        }
    }

    /// A convenience method to extract the value out of a [UInt](#variant.UInt).
    /// Returns `0` for other value kinds.
    pub fn as_uint(&self) -> u64 {
        match *self {
            Value::UInt(value) => value,
            _ => 0,
        }
    }

    /// A convenience method to extract the value out of a [Float](#variant.Float).
    /// Returns `0.0` for other value kinds.
    pub fn as_float(&self) -> f64 {
        match *self {
            Value::Float(value) => value,
            _ => 0.0,
        }
    }

    /// A convenience method to extract the value out of a [String](#variant.String)
    /// or the variant name out of an [Enum](#variant.Enum). Returns `""` for
    /// other value kinds.
    pub fn as_string(&self) -> &str {
        match *self {
            Value::String(ref value) => value.as_str(),
            Value::Enum(_, ref variant) => variant.as_str(),
            _ => "",
        }
    }

    /// A convenience method to get the elements out of a
    /// [List](#variant.List), [Set](#variant.Set), or [Tuple](#variant.Tuple).
    /// Returns an empty slice for other value kinds.
    pub fn as_slice(&self) -> &[Value] {
        match *self {
            Value::List(ref values) | Value::Set(ref values) | Value::Tuple(ref values) => {
                values.as_slice()
            }
            _ => &[],
        }
    }

    /// A convenience method to look up a member of a [Record](#variant.Record).
    pub fn member(&self, name: &str) -> Option<&Value> {
        match *self {
            Value::Record(_, ref members) => members
                .iter()
                .find(|(member, _)| member == name)
                .map(|(_, value)| value),
            _ => None,
        }
    }

    /// The record schema behind a [Record](#variant.Record) value.
    pub fn record_schema(&self) -> Option<&Rc<RecordSchema>> {
        match *self {
            Value::Record(ref schema, _) => Some(schema),
            _ => None,
        }
    }

    /// Single-token display form for scalar-ish values; used for choice
    /// lists, default rendering, and canonical token output. Containers are
    /// rendered by flattening their element tokens instead.
    pub fn display_token(&self) -> String {
        match self {
            Value::Null => "none".to_string(),
            Value::Bool(true) => "true".to_string(),
            Value::Bool(false) => "false".to_string(),
            Value::Int(v) => v.to_string(),
            Value::UInt(v) => v.to_string(),
            Value::Float(v) => v.to_string(),
            Value::String(v) => v.clone(),
            Value::Enum(_, variant) => variant.clone(),
            // Not reachable from token rendering; kept total for display.
            Value::List(_) | Value::Set(_) | Value::Tuple(_) => "[...]".to_string(),
            Value::Map(_) => "{...}".to_string(),
            Value::Record(schema, _) => schema.name.clone(),
        }
    }

    /// The runtime type of a value. Container element types are unified when
    /// homogeneous; heterogeneous contents fall back to element type `Any`
    /// (the resolver narrows those to fixed tuples where it needs to).
    pub fn type_of(&self) -> TypeNode {
        match self {
            Value::Null => TypeNode::Null,
            Value::Bool(_) => TypeNode::Scalar(ScalarKind::Bool),
            Value::Int(_) => TypeNode::Scalar(ScalarKind::Int),
            Value::UInt(_) => TypeNode::Scalar(ScalarKind::UInt),
            Value::Float(_) => TypeNode::Scalar(ScalarKind::Float),
            Value::String(_) => TypeNode::Scalar(ScalarKind::String),
            Value::Enum(schema, _) => TypeNode::Enum(schema.clone()),
            Value::List(values) => TypeNode::List(Box::new(unify_element_types(values))),
            Value::Set(values) => TypeNode::Set(Box::new(unify_element_types(values))),
            Value::Tuple(values) => TypeNode::Tuple(values.iter().map(Value::type_of).collect()),
            Value::Map(entries) => {
                let keys: Vec<Value> = entries.iter().map(|(k, _)| k.clone()).collect();
                let vals: Vec<Value> = entries.iter().map(|(_, v)| v.clone()).collect();
                TypeNode::Map(
                    Box::new(unify_element_types(&keys)),
                    Box::new(unify_element_types(&vals)),
                )
            }
            Value::Record(schema, _) => TypeNode::Record(schema.clone()),
        }
    }

    /// Build a record value from `(member, value)` pairs.
    pub fn record(schema: &Rc<RecordSchema>, members: Vec<(&str, Value)>) -> Value {
        Value::Record(
            schema.clone(),
            members
                .into_iter()
                .map(|(name, value)| (name.to_string(), value))
                .collect(),
        )
    }

    /// Shallow nominal conformance check of a value against a descriptor.
    pub fn conforms_to(&self, ty: &TypeNode) -> bool {
        let (ty, _) = ty.unwrap_annotations();
        match (self, ty) {
            (_, TypeNode::Any) => true,
            (Value::Null, TypeNode::Null) => true,
            (Value::Bool(_), TypeNode::Scalar(ScalarKind::Bool)) => true,
            (Value::Int(_), TypeNode::Scalar(ScalarKind::Int)) => true,
            (Value::UInt(_), TypeNode::Scalar(ScalarKind::UInt)) => true,
            (Value::Float(_), TypeNode::Scalar(ScalarKind::Float)) => true,
            (Value::String(_), TypeNode::Scalar(ScalarKind::String))
            | (Value::String(_), TypeNode::Scalar(ScalarKind::Path)) => true,
            (Value::Enum(schema, _), TypeNode::Enum(other)) => schema == other,
            (value, TypeNode::Literal(options)) => options.contains(value),
            (Value::List(_), TypeNode::List(_)) => true,
            (Value::Set(_), TypeNode::Set(_)) => true,
            (Value::Tuple(items), TypeNode::Tuple(types)) => items.len() == types.len(),
            (Value::Tuple(_), TypeNode::VarTuple(_)) => true,
            (Value::Map(_), TypeNode::Map(_, _)) => true,
            (value, TypeNode::Union(members)) => matches_union(value, members),
            (Value::Record(schema, _), TypeNode::Record(declared)) => {
                schema.is_subtype_of(declared)
            }
            (Value::Record(schema, _), TypeNode::Generic { base, .. }) => {
                schema.is_subtype_of(base)
            }
            _ => false,
        }
    }
}

/// Unify the runtime types of a container's elements; `Any` when empty or
/// heterogeneous.
fn unify_element_types(values: &[Value]) -> TypeNode {
    let mut unified: Option<TypeNode> = None;
    for value in values {
        let ty = value.type_of();
        match &unified {
            None => unified = Some(ty),
            Some(existing) if existing.same_type(&ty) => {}
            Some(_) => return TypeNode::Any,
        }
    }
    unified.unwrap_or(TypeNode::Any)
}

fn matches_union(value: &Value, members: &[UnionMember]) -> bool {
    members.iter().any(|m| value.conforms_to(&m.ty))
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("none"),
            Value::Bool(v) => write!(f, "{}", v),
            Value::Int(v) => write!(f, "{}", v),
            Value::UInt(v) => write!(f, "{}", v),
            Value::Float(v) => write!(f, "{}", v),
            Value::String(v) => write!(f, "{:?}", v),
            Value::Enum(schema, variant) => write!(f, "{}.{}", schema.name, variant),
            Value::List(values) | Value::Tuple(values) => {
                f.debug_list().entries(values).finish()
            }
            Value::Set(values) => f.debug_set().entries(values).finish(),
            Value::Map(entries) => f
                .debug_map()
                .entries(entries.iter().map(|(k, v)| (k, v)))
                .finish(),
            Value::Record(schema, members) => {
                let mut out = f.debug_struct(&schema.name);
                for (name, value) in members {
                    out.field(name, value);
                }
                out.finish()
            }
        }
    }
}

// Values serialize into natural JSON: records become objects, enums become
// their variant names, maps become objects keyed by display token.
impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Value::Null => serializer.serialize_unit(),
            Value::Bool(v) => serializer.serialize_bool(*v),
            Value::Int(v) => serializer.serialize_i64(*v),
            Value::UInt(v) => serializer.serialize_u64(*v),
            Value::Float(v) => serializer.serialize_f64(*v),
            Value::String(v) => serializer.serialize_str(v),
            Value::Enum(_, variant) => serializer.serialize_str(variant),
            Value::List(values) | Value::Set(values) | Value::Tuple(values) => {
                let mut seq = serializer.serialize_seq(Some(values.len()))?;
                for value in values {
                    seq.serialize_element(value)?;
                }
                seq.end()
            }
            Value::Map(entries) => {
                let mut map = serializer.serialize_map(Some(entries.len()))?;
                for (key, value) in entries {
                    map.serialize_entry(&key.display_token(), value)?;
                }
                map.end()
            }
            Value::Record(_, members) => {
                let mut map = serializer.serialize_map(Some(members.len()))?;
                for (name, value) in members {
                    map.serialize_entry(name, value)?;
                }
                map.end()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ty::FieldSchema;

    #[test]
    fn test_debug_format() {
        let schema = RecordSchema::new(
            "Point",
            vec![
                FieldSchema::new("x", TypeNode::Scalar(ScalarKind::Float)),
                FieldSchema::new("y", TypeNode::Scalar(ScalarKind::Float)),
            ],
        );
        let value = Value::record(
            &schema,
            vec![("x", Value::Float(0.5)), ("y", Value::Float(-0.5))],
        );
        assert_eq!(format!("{:?}", value), "Point { x: 0.5, y: -0.5 }");
    }

    #[test]
    fn test_type_of_containers() {
        let homogeneous = Value::List(vec![Value::Int(1), Value::Int(2)]);
        assert_eq!(
            homogeneous.type_of(),
            TypeNode::list(TypeNode::Scalar(ScalarKind::Int))
        );

        let heterogeneous = Value::List(vec![Value::Int(1), Value::String("a".into())]);
        assert_eq!(heterogeneous.type_of(), TypeNode::list(TypeNode::Any));

        let tuple = Value::Tuple(vec![Value::Int(1), Value::String("a".into())]);
        assert_eq!(
            tuple.type_of(),
            TypeNode::Tuple(vec![
                TypeNode::Scalar(ScalarKind::Int),
                TypeNode::Scalar(ScalarKind::String),
            ])
        );
    }

    #[test]
    fn test_conforms_to_subtype() {
        let base = RecordSchema::new("Base", vec![]);
        let child = Rc::new(RecordSchema {
            name:        "Child".to_string(),
            params:      vec![],
            fields:      vec![],
            parent:      Some(base.clone()),
            open:        false,
            description: None,
            construct:   None,
        });
        let value = Value::record(&child, vec![]);
        assert!(value.conforms_to(&TypeNode::Record(base)));
    }
}
