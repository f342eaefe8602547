use std::fmt;
use std::rc::Rc;

use serde::Serialize;

use crate::markers::Markers;
use crate::value::Value;

/// A token-to-value converter for a leaf type that the compiler cannot
/// decompose on its own. The function receives exactly one raw token.
#[derive(Clone)]
pub struct ParseFn(pub Rc<dyn Fn(&str) -> Result<Value, String>>);

impl ParseFn {
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&str) -> Result<Value, String> + 'static,
    {
        ParseFn(Rc::new(f))
    }
}

impl fmt::Debug for ParseFn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ParseFn(..)")
    }
}

impl PartialEq for ParseFn {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

/// Positional and keyword values collected for a record constructor.
#[derive(Debug, Clone, Default)]
pub struct CallArgs {
    pub positional: Vec<Value>,
    pub keyword:    Vec<(String, Value)>,
}

/// A user-supplied constructor for a record type. The default behavior, when
/// no constructor is registered, is to assemble a `Value::Record` directly.
#[derive(Clone)]
pub struct Constructor(pub Rc<dyn Fn(CallArgs) -> Result<Value, String>>);

impl Constructor {
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(CallArgs) -> Result<Value, String> + 'static,
    {
        Constructor(Rc::new(f))
    }
}

impl fmt::Debug for Constructor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Constructor(..)")
    }
}

impl PartialEq for Constructor {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

/// Built-in scalar leaves. Each one has a `(token) -> value` conversion with
/// a fixed single-token arity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ScalarKind {
    Bool,
    Int,
    UInt,
    Float,
    String,
    Path,
}

impl ScalarKind {
    /// Display form used for metavars, eg `INT`.
    pub fn display_name(&self) -> &'static str {
        match self {
            ScalarKind::Bool => "BOOL",
            ScalarKind::Int => "INT",
            ScalarKind::UInt => "UINT",
            ScalarKind::Float => "FLOAT",
            ScalarKind::String => "STR",
            ScalarKind::Path => "PATH",
        }
    }

    /// Convert a single raw token into a typed value.
    pub fn parse_token(&self, token: &str) -> Result<Value, String> {
        match self {
            ScalarKind::Bool => match token {
                "true" => Ok(Value::Bool(true)),
                "false" => Ok(Value::Bool(false)),
                _ => Err(format!("invalid boolean {:?} (choose from true, false)", token)),
            },
            ScalarKind::Int => token
                .parse::<i64>()
                .map(Value::Int)
                .map_err(|_| format!("invalid integer {:?}", token)),
            ScalarKind::UInt => token
                .parse::<u64>()
                .map(Value::UInt)
                .map_err(|_| format!("invalid unsigned integer {:?}", token)),
            ScalarKind::Float => token
                .parse::<f64>()
                .map(Value::Float)
                .map_err(|_| format!("invalid float {:?}", token)),
            ScalarKind::String | ScalarKind::Path => Ok(Value::String(token.to_owned())),
        }
    }
}

/// A named closed set of variants, surfaced on the command line as a choice
/// restriction over the variant names.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EnumSchema {
    pub name:     String,
    pub variants: Vec<String>,
}

impl EnumSchema {
    pub fn new(name: impl Into<String>, variants: &[&str]) -> Rc<Self> {
        Rc::new(EnumSchema {
            name:     name.into(),
            variants: variants.iter().map(|v| (*v).to_string()).collect(),
        })
    }
}

/// A leaf type with a registered `(token) -> value` converter, for types the
/// resolver should treat as atomic rather than decomposable.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CustomScalar {
    pub name: String,
    #[serde(skip)]
    pub parse: ParseFn,
}

impl CustomScalar {
    pub fn new<F>(name: impl Into<String>, parse: F) -> Rc<Self>
    where
        F: Fn(&str) -> Result<Value, String> + 'static,
    {
        Rc::new(CustomScalar {
            name:  name.into(),
            parse: ParseFn::new(parse),
        })
    }
}

/// One alternative of a variant (union) type. The overrides feed the
/// subcommand matcher and the subcommand naming scheme.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UnionMember {
    pub ty:               TypeNode,
    pub name_override:    Option<String>,
    pub default_override: Option<Rc<Value>>,
}

impl UnionMember {
    pub fn new(ty: TypeNode) -> Self {
        UnionMember {
            ty,
            name_override:    None,
            default_override: None,
        }
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name_override = Some(name.into());
        self
    }

    pub fn with_default(mut self, default: Rc<Value>) -> Self {
        self.default_override = Some(default);
        self
    }
}

/// How a field's reconstructed value is routed into its constructor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Binding {
    Keyword,
    Positional,
    /// Splice a sequence value into the positional argument list.
    VarPositional,
    /// Splice a mapping value into the keyword argument list.
    VarKeyword,
}

/// A "no value" sentinel or a concrete default for a field.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum FieldDefault {
    /// Concrete default value.
    Value(Rc<Value>),
    /// Unset, and every descendant field is forced to be required as well.
    MissingPropagating,
    /// Unset for this field only.
    MissingNonPropagating,
    /// Schema-visible, but omitted from the reconstructed call entirely.
    ExcludeFromCall,
}

impl FieldDefault {
    pub fn value(v: Value) -> Self {
        FieldDefault::Value(Rc::new(v))
    }

    pub fn is_missing(&self) -> bool {
        !matches!(self, FieldDefault::Value(_))
    }

    pub fn as_value(&self) -> Option<&Rc<Value>> {
        match self {
            FieldDefault::Value(v) => Some(v),
            _ => None,
        }
    }
}

/// One named, typed, defaulted member of a record schema.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldSchema {
    pub name:     String,
    pub ty:       TypeNode,
    pub default:  FieldDefault,
    pub help:     Option<String>,
    pub binding:  Binding,
    /// Only meaningful on partially-open records: the member exists in the
    /// schema but is not settable, and lowers to `ExcludeFromCall`.
    pub excluded: bool,
    pub markers:  Markers,
}

impl FieldSchema {
    pub fn new(name: impl Into<String>, ty: TypeNode) -> Self {
        FieldSchema {
            name:     name.into(),
            ty,
            default:  FieldDefault::MissingNonPropagating,
            help:     None,
            binding:  Binding::Keyword,
            excluded: false,
            markers:  Markers::default(),
        }
    }

    pub fn with_default(mut self, v: Value) -> Self {
        self.default = FieldDefault::value(v);
        self
    }

    pub fn with_help(mut self, help: impl Into<String>) -> Self {
        self.help = Some(help.into());
        self
    }

    pub fn positional(mut self) -> Self {
        self.binding = Binding::Positional;
        self
    }

    pub fn excluded(mut self) -> Self {
        self.excluded = true;
        self
    }

    pub fn with_markers(mut self, markers: Markers) -> Self {
        self.markers = markers;
        self
    }
}

/// A named aggregate of fields with a constructor consuming them.
///
/// `parent` is the author-declared nominal "is-a" edge used for subtype
/// narrowing and structural subcommand matching. `params` are type variable
/// names that `TypeNode::Generic` binds to concrete arguments.
#[derive(Debug, Clone, Serialize)]
pub struct RecordSchema {
    pub name:        String,
    pub params:      Vec<String>,
    pub fields:      Vec<FieldSchema>,
    pub parent:      Option<Rc<RecordSchema>>,
    /// Partially-open record: excluded members are visible in the schema but
    /// omitted from the reconstructed call.
    pub open:        bool,
    pub description: Option<String>,
    #[serde(skip)]
    pub construct:   Option<Constructor>,
}

impl RecordSchema {
    pub fn new(name: impl Into<String>, fields: Vec<FieldSchema>) -> Rc<Self> {
        Rc::new(RecordSchema {
            name:        name.into(),
            params:      Vec::new(),
            fields,
            parent:      None,
            open:        false,
            description: None,
            construct:   None,
        })
    }

    pub fn generic(
        name: impl Into<String>,
        params: &[&str],
        fields: Vec<FieldSchema>,
    ) -> Rc<Self> {
        Rc::new(RecordSchema {
            name:        name.into(),
            params:      params.iter().map(|p| (*p).to_string()).collect(),
            fields,
            parent:      None,
            open:        false,
            description: None,
            construct:   None,
        })
    }

    pub fn field(&self, name: &str) -> Option<&FieldSchema> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Nominal subtype check along the explicit `parent` chain. A schema is
    /// a subtype of itself.
    pub fn is_subtype_of(self: &Rc<Self>, other: &Rc<RecordSchema>) -> bool {
        let mut current = Some(self.clone());
        while let Some(schema) = current {
            if Rc::ptr_eq(&schema, other) {
                return true;
            }
            current = schema.parent.clone();
        }
        false
    }

    /// Strict subtype: a subtype of `other` that is not `other` itself.
    pub fn is_strict_subtype_of(self: &Rc<Self>, other: &Rc<RecordSchema>) -> bool {
        !Rc::ptr_eq(self, other) && self.is_subtype_of(other)
    }
}

// Records are nominal: two schemas are the same type only if they are the
// same allocation or carry the same name.
impl PartialEq for RecordSchema {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::eq(self, other) || self.name == other.name
    }
}

/// A possibly parametric, possibly annotated node describing a value's shape.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum TypeNode {
    /// The null/unit type; parses only the literal token `none`.
    Null,
    Scalar(ScalarKind),
    Enum(Rc<EnumSchema>),
    /// Restriction to an explicit list of literal scalar values.
    Literal(Vec<Value>),
    List(Box<TypeNode>),
    Set(Box<TypeNode>),
    /// Fixed-order heterogeneous tuple.
    Tuple(Vec<TypeNode>),
    /// Variable-length homogeneous tuple.
    VarTuple(Box<TypeNode>),
    Map(Box<TypeNode>, Box<TypeNode>),
    /// Closed choice among alternatives; surfaced as subcommands when the
    /// alternatives are records.
    Union(Vec<UnionMember>),
    Record(Rc<RecordSchema>),
    /// A generic record instantiation binding `base.params` to `args`.
    Generic {
        base: Rc<RecordSchema>,
        args: Vec<TypeNode>,
    },
    /// An unbound type variable; must be substituted before lowering.
    Param(String),
    Custom(Rc<CustomScalar>),
    /// Marker attachment point; markers union into the owning field's set.
    Annotated {
        inner:   Box<TypeNode>,
        markers: Markers,
    },
    /// An unconstrained type. Only usable when a default allows narrowing.
    Any,
}

impl TypeNode {
    pub fn list(inner: TypeNode) -> Self {
        TypeNode::List(Box::new(inner))
    }

    pub fn set(inner: TypeNode) -> Self {
        TypeNode::Set(Box::new(inner))
    }

    pub fn var_tuple(inner: TypeNode) -> Self {
        TypeNode::VarTuple(Box::new(inner))
    }

    pub fn map(key: TypeNode, value: TypeNode) -> Self {
        TypeNode::Map(Box::new(key), Box::new(value))
    }

    /// `Union[Null, inner]`, with the null alternative first.
    pub fn optional(inner: TypeNode) -> Self {
        TypeNode::Union(vec![
            UnionMember::new(TypeNode::Null),
            UnionMember::new(inner),
        ])
    }

    pub fn union(options: Vec<TypeNode>) -> Self {
        TypeNode::Union(options.into_iter().map(UnionMember::new).collect())
    }

    pub fn annotated(inner: TypeNode, markers: Markers) -> Self {
        TypeNode::Annotated {
            inner:   Box::new(inner),
            markers,
        }
    }

    /// Strip `Annotated` wrappers, returning the inner type and the union of
    /// all marker sets found along the way.
    pub fn unwrap_annotations(&self) -> (&TypeNode, Markers) {
        let mut node = self;
        let mut markers = Markers::default();
        while let TypeNode::Annotated { inner, markers: m } = node {
            markers = markers.union(*m);
            node = inner;
        }
        (node, markers)
    }

    /// Human-readable name, used for metavars and subcommand naming.
    pub fn display_name(&self) -> String {
        match self {
            TypeNode::Null => "None".to_string(),
            TypeNode::Scalar(kind) => kind.display_name().to_string(),
            TypeNode::Enum(e) => e.name.clone(),
            TypeNode::Literal(values) => format!(
                "{{{}}}",
                values
                    .iter()
                    .map(|v| v.display_token())
                    .collect::<Vec<_>>()
                    .join(",")
            ),
            TypeNode::List(inner) => format!("List[{}]", inner.display_name()),
            TypeNode::Set(inner) => format!("Set[{}]", inner.display_name()),
            TypeNode::Tuple(items) => format!(
                "Tuple[{}]",
                items
                    .iter()
                    .map(|t| t.display_name())
                    .collect::<Vec<_>>()
                    .join(",")
            ),
            TypeNode::VarTuple(inner) => format!("Tuple[{},...]", inner.display_name()),
            TypeNode::Map(k, v) => {
                format!("Map[{},{}]", k.display_name(), v.display_name())
            }
            TypeNode::Union(members) => members
                .iter()
                .map(|m| m.ty.display_name())
                .collect::<Vec<_>>()
                .join("|"),
            TypeNode::Record(schema) => schema.name.clone(),
            TypeNode::Generic { base, args } => format!(
                "{}[{}]",
                base.name,
                args.iter()
                    .map(|a| a.display_name())
                    .collect::<Vec<_>>()
                    .join(",")
            ),
            TypeNode::Param(name) => name.clone(),
            TypeNode::Custom(custom) => custom.name.clone(),
            TypeNode::Annotated { inner, .. } => inner.display_name(),
            TypeNode::Any => "Any".to_string(),
        }
    }

    /// Whether two descriptors denote the same nominal type. Annotations are
    /// transparent; records and enums compare by identity-or-name.
    pub fn same_type(&self, other: &TypeNode) -> bool {
        let (a, _) = self.unwrap_annotations();
        let (b, _) = other.unwrap_annotations();
        a == b
    }
}
