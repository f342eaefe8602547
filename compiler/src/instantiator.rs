//! Instantiator synthesis: mapping one resolved type descriptor to a
//! token-to-value conversion function plus arity and choice metadata.
//!
//! Some examples of descriptors and the instantiators they synthesize:
//!
//! ```text
//! Scalar(Int)          consumes 1 token:  "5"        -> Int(5)
//! List[Int]            consumes N tokens: "1" "2"    -> List[Int(1), Int(2)]
//! Tuple[Int, Float]    consumes 2 tokens: "1" "0.5"  -> Tuple[Int(1), Float(0.5)]
//! Map[Str, Int]        consumes 2k:       "a" "1"    -> Map{"a": Int(1)}
//! ```

use std::fmt;
use std::rc::Rc;

use serde::Serialize;

use declargs_schema::{Markers, ScalarKind, TypeNode, UnionMember, Value};

use crate::error::{DeclargsError, Result};
use crate::strings;
use crate::types::Nargs;

/// A pure tokens-to-value conversion function.
#[derive(Clone)]
pub struct TokenFn(Rc<dyn Fn(&[String]) -> std::result::Result<Value, String>>);

impl TokenFn {
    fn new<F>(f: F) -> Self
    where
        F: Fn(&[String]) -> std::result::Result<Value, String> + 'static,
    {
        TokenFn(Rc::new(f))
    }

    pub fn call(&self, tokens: &[String]) -> std::result::Result<Value, String> {
        (self.0)(tokens)
    }
}

impl fmt::Debug for TokenFn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("TokenFn(..)")
    }
}

/// Which container an append-mode or sequence instantiator assembles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SeqTarget {
    List,
    Set,
    Tuple,
}

impl SeqTarget {
    pub fn build(&self, items: Vec<Value>) -> Value {
        match self {
            SeqTarget::List => Value::List(items),
            // Sets drop duplicate elements, preserving first-seen order.
            SeqTarget::Set => {
                let mut out: Vec<Value> = Vec::with_capacity(items.len());
                for item in items {
                    if !out.contains(&item) {
                        out.push(item);
                    }
                }
                Value::Set(out)
            }
            SeqTarget::Tuple => Value::Tuple(items),
        }
    }
}

/// Converts raw tokens into a typed value.
#[derive(Debug, Clone)]
pub enum Instantiator {
    /// Consumes one group of tokens.
    Tokens(TokenFn),
    /// Token-free boolean store action; the flag parser hands back a bool.
    Flag,
    /// "Append across repeats": the inner instantiator runs once per flag
    /// occurrence and the results are collected into the target container.
    Append { inner: TokenFn, target: SeqTarget },
}

/// Parameters the flag-parsing primitive needs for one argument.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Metadata {
    pub nargs:   Nargs,
    pub metavar: String,
    pub choices: Option<Vec<String>>,
}

impl Metadata {
    pub fn check_choices(&self, tokens: &[String]) -> std::result::Result<(), String> {
        if let Some(choices) = &self.choices {
            for token in tokens {
                if !choices.contains(token) {
                    return Err(format!(
                        "invalid choice: {:?} (choose from {})",
                        token,
                        choices.join(", ")
                    ));
                }
            }
        }
        Ok(())
    }
}

/// Synthesize an instantiator for a resolved descriptor.
///
/// `UnsupportedType` failures are downgraded by the parser-tree builder to a
/// fixed field when the owning field carries a default.
pub fn instantiator_for(ty: &TypeNode, markers: Markers) -> Result<(Instantiator, Metadata)> {
    let (ty, ty_markers) = ty.unwrap_annotations();
    let markers = markers.union(ty_markers);

    // The append marker changes the shape of the contract: one inner group
    // per flag occurrence, so the inner arity may be variable.
    if markers.use_append_action {
        if let Some((elem, target)) = sequence_element(ty) {
            let (inner, meta) = token_fn_for(elem, false)?;
            return Ok((
                Instantiator::Append { inner, target },
                Metadata {
                    nargs:   meta.nargs,
                    metavar: strings::multi_metavar_from_single(&meta.metavar),
                    choices: meta.choices,
                },
            ));
        }
    }

    let (f, meta) = token_fn_for(ty, false)?;
    Ok((Instantiator::Tokens(f), meta))
}

fn sequence_element(ty: &TypeNode) -> Option<(&TypeNode, SeqTarget)> {
    match ty {
        TypeNode::List(inner) => Some((inner.as_ref(), SeqTarget::List)),
        TypeNode::Set(inner) => Some((inner.as_ref(), SeqTarget::Set)),
        TypeNode::VarTuple(inner) => Some((inner.as_ref(), SeqTarget::Tuple)),
        _ => None,
    }
}

/// Recursive synthesis. With `fixed_only` set, a variable-arity result is an
/// error; container rules use this to reject nested variable-length
/// sequences.
fn token_fn_for(ty: &TypeNode, fixed_only: bool) -> Result<(TokenFn, Metadata)> {
    let (ty, _) = ty.unwrap_annotations();
    let out = dispatch(ty)?;
    if fixed_only && out.1.nargs == Nargs::Variable {
        return Err(DeclargsError::UnsupportedType(format!(
            "found an unsupported variable-length nested sequence of type {}; \
             set the repeatable marker to parse it across flag repeats",
            ty.display_name()
        )));
    }
    Ok(out)
}

fn dispatch(ty: &TypeNode) -> Result<(TokenFn, Metadata)> {
    match ty {
        TypeNode::Null => Ok(null_instantiator()),
        TypeNode::List(inner) => sequence_instantiator(inner, SeqTarget::List),
        TypeNode::Set(inner) => sequence_instantiator(inner, SeqTarget::Set),
        TypeNode::VarTuple(inner) => sequence_instantiator(inner, SeqTarget::Tuple),
        TypeNode::Tuple(items) => tuple_instantiator(items),
        TypeNode::Map(key, value) => map_instantiator(key, value),
        TypeNode::Union(members) => union_instantiator(members),
        TypeNode::Literal(values) => literal_instantiator(values),
        TypeNode::Scalar(kind) => Ok(scalar_instantiator(*kind)),
        TypeNode::Enum(schema) => {
            let schema = schema.clone();
            let variants = schema.variants.clone();
            let cloned = schema.clone();
            let f = TokenFn::new(move |tokens| {
                let token = single_token(tokens)?;
                if cloned.variants.iter().any(|v| v == token) {
                    Ok(Value::Enum(cloned.clone(), token.to_string()))
                } else {
                    Err(format!(
                        "invalid choice: {:?} (choose from {})",
                        token,
                        cloned.variants.join(", ")
                    ))
                }
            });
            Ok((
                f,
                Metadata {
                    nargs:   Nargs::Fixed(1),
                    metavar: format!("{{{}}}", variants.join(",")),
                    choices: Some(variants),
                },
            ))
        }
        TypeNode::Custom(custom) => {
            let custom = custom.clone();
            let metavar = custom.name.to_uppercase();
            let f = TokenFn::new(move |tokens| {
                let token = single_token(tokens)?;
                (custom.parse.0)(token)
            });
            Ok((
                f,
                Metadata {
                    nargs: Nargs::Fixed(1),
                    metavar,
                    choices: None,
                },
            ))
        }
        TypeNode::Any => Err(DeclargsError::UnsupportedType(
            "an unconstrained type is not parsable".to_string(),
        )),
        TypeNode::Param(name) => Err(DeclargsError::UnsupportedType(format!(
            "unbound type parameter {:?} is not parsable",
            name
        ))),
        TypeNode::Record(schema) | TypeNode::Generic { base: schema, .. } => {
            Err(DeclargsError::UnsupportedType(format!(
                "record type {} has no single-argument token conversion",
                schema.name
            )))
        }
        TypeNode::Annotated { inner, .. } => dispatch(inner),
    }
}

fn single_token(tokens: &[String]) -> std::result::Result<&str, String> {
    match tokens {
        [token] => Ok(token.as_str()),
        _ => Err(format!("expected one token, got {}", tokens.len())),
    }
}

fn null_instantiator() -> (TokenFn, Metadata) {
    let f = TokenFn::new(|tokens| {
        // Other inputs are caught by the choice restriction first.
        match single_token(tokens)? {
            "none" => Ok(Value::Null),
            other => Err(format!("invalid choice: {:?} (choose from none)", other)),
        }
    });
    (
        f,
        Metadata {
            nargs:   Nargs::Fixed(1),
            metavar: "{none}".to_string(),
            choices: Some(vec!["none".to_string()]),
        },
    )
}

fn scalar_instantiator(kind: ScalarKind) -> (TokenFn, Metadata) {
    let choices = match kind {
        ScalarKind::Bool => Some(vec!["true".to_string(), "false".to_string()]),
        _ => None,
    };
    let metavar = match &choices {
        Some(choices) => format!("{{{}}}", choices.join(",")),
        None => kind.display_name().to_string(),
    };
    let f = TokenFn::new(move |tokens| kind.parse_token(single_token(tokens)?));
    (
        f,
        Metadata {
            nargs: Nargs::Fixed(1),
            metavar,
            choices,
        },
    )
}

/// Variable-length sequences consume tokens in chunks of the inner arity.
fn sequence_instantiator(inner: &TypeNode, target: SeqTarget) -> Result<(TokenFn, Metadata)> {
    let (elem, elem_meta) = token_fn_for(inner, true)?;
    let step = elem_meta
        .nargs
        .as_fixed()
        .expect("fixed_only synthesis returned variable arity");
    let elem_choices = elem_meta.choices.clone();

    let f = TokenFn::new(move |tokens| {
        if step == 0 || tokens.len() % step != 0 {
            return Err(format!(
                "input of length {} is not divisible by {}",
                tokens.len(),
                step
            ));
        }
        let mut items = Vec::with_capacity(tokens.len() / step);
        for chunk in tokens.chunks(step) {
            items.push(elem.call(chunk)?);
        }
        Ok(target.build(items))
    });

    Ok((
        f,
        Metadata {
            nargs:   Nargs::Variable,
            metavar: strings::multi_metavar_from_single(&elem_meta.metavar),
            choices: elem_choices,
        },
    ))
}

/// Fixed tuples concatenate one fixed-arity instantiator per position.
fn tuple_instantiator(items: &[TypeNode]) -> Result<(TokenFn, Metadata)> {
    let mut fns = Vec::with_capacity(items.len());
    let mut metas = Vec::with_capacity(items.len());
    let mut total = 0usize;
    for item in items {
        let (f, meta) = token_fn_for(item, true)?;
        total += meta.nargs.as_fixed().expect("fixed_only returned variable");
        fns.push(f);
        metas.push(meta);
    }

    // The flag parser applies one flat choice list to every token, so the
    // aggregate carries choices only when every position shares one set.
    // Anything else is validated per position at conversion time.
    let shared_choices = match metas.split_first() {
        Some((first, rest))
            if first.choices.is_some() && rest.iter().all(|m| m.choices == first.choices) =>
        {
            first.choices.clone()
        }
        _ => None,
    };

    let metavar = metas
        .iter()
        .map(|m| m.metavar.clone())
        .collect::<Vec<_>>()
        .join(" ");
    let steps: Vec<usize> = metas.iter().map(|m| m.nargs.as_fixed().unwrap()).collect();
    let inner_metas = metas;

    let f = TokenFn::new(move |tokens| {
        if tokens.len() != total {
            return Err(format!(
                "expected {} tokens, got {}",
                total,
                tokens.len()
            ));
        }
        let mut out = Vec::with_capacity(fns.len());
        let mut index = 0;
        for ((f, step), meta) in fns.iter().zip(&steps).zip(&inner_metas) {
            let chunk = &tokens[index..index + step];
            meta.check_choices(chunk)?;
            out.push(f.call(chunk)?);
            index += step;
        }
        Ok(Value::Tuple(out))
    });

    Ok((
        f,
        Metadata {
            nargs: Nargs::Fixed(total),
            metavar,
            choices: shared_choices,
        },
    ))
}

/// Mappings consume key tokens and value tokens pairwise.
fn map_instantiator(key: &TypeNode, value: &TypeNode) -> Result<(TokenFn, Metadata)> {
    let (key_fn, key_meta) = token_fn_for(key, true)?;
    let (value_fn, value_meta) = token_fn_for(value, true)?;
    let key_step = key_meta.nargs.as_fixed().expect("fixed_only returned variable");
    let value_step = value_meta.nargs.as_fixed().expect("fixed_only returned variable");
    let pair = key_step + value_step;
    let metavar =
        strings::multi_metavar_from_single(&format!("{} {}", key_meta.metavar, value_meta.metavar));

    let f = TokenFn::new(move |tokens| {
        if tokens.len() % pair != 0 {
            return Err("incomplete set of key-value pairs".to_string());
        }
        let mut entries = Vec::with_capacity(tokens.len() / pair);
        let mut index = 0;
        while index < tokens.len() {
            let key_chunk = &tokens[index..index + key_step];
            index += key_step;
            let value_chunk = &tokens[index..index + value_step];
            index += value_step;

            key_meta.check_choices(key_chunk)?;
            value_meta.check_choices(value_chunk)?;
            entries.push((key_fn.call(key_chunk)?, value_fn.call(value_chunk)?));
        }
        Ok(Value::Map(entries))
    });

    Ok((
        f,
        Metadata {
            nargs: Nargs::Variable,
            metavar,
            choices: None,
        },
    ))
}

/// Unions try their options left to right at parse time, checking each
/// option's choices first and accumulating per-option failures.
fn union_instantiator(members: &[UnionMember]) -> Result<(TokenFn, Metadata)> {
    // Null options sort first so that eg `Optional[Str]` prefers parsing the
    // literal `none` token as null rather than as the string "none".
    let mut options: Vec<&UnionMember> = members.iter().collect();
    options.sort_by_key(|m| !matches!(m.ty.unwrap_annotations().0, TypeNode::Null));

    let mut fns = Vec::with_capacity(options.len());
    let mut metas = Vec::with_capacity(options.len());
    let mut names = Vec::with_capacity(options.len());
    let mut nargs: Option<Nargs> = None;
    for member in &options {
        let (f, meta) = token_fn_for(&member.ty, false)?;
        if !matches!(member.ty.unwrap_annotations().0, TypeNode::Null) {
            // Unify arity across non-null options, falling back to variable
            // on any mismatch.
            nargs = match nargs {
                None => Some(meta.nargs),
                Some(existing) if existing == meta.nargs => Some(existing),
                Some(_) => Some(Nargs::Variable),
            };
        }
        names.push(member.ty.display_name());
        fns.push(f);
        metas.push(meta);
    }
    let nargs = nargs.unwrap_or(Nargs::Fixed(1));

    let metavar = strings::join_union_metavars(
        &metas.iter().map(|m| m.metavar.clone()).collect::<Vec<_>>(),
    );
    let option_names = names.clone();

    let f = TokenFn::new(move |tokens| {
        let mut errors = Vec::new();
        for ((f, meta), name) in fns.iter().zip(&metas).zip(&option_names) {
            if let Err(msg) = meta.check_choices(tokens) {
                errors.push(format!("{}: {}", name, msg));
                continue;
            }
            match meta.nargs {
                Nargs::Fixed(n) if n != tokens.len() => {
                    errors.push(format!(
                        "{}: input length {} did not match expected argument count {}",
                        name,
                        tokens.len(),
                        n
                    ));
                    continue;
                }
                _ => {}
            }
            match f.call(tokens) {
                Ok(value) => return Ok(value),
                Err(msg) => errors.push(format!("{}: {}", name, msg)),
            }
        }
        Err(format!(
            "no option could be instantiated from {:?}:\n- {}",
            tokens,
            errors.join("\n- ")
        ))
    });

    Ok((
        f,
        Metadata {
            nargs,
            metavar,
            choices: None,
        },
    ))
}

/// Enumerated-literal restriction: a single token mapped back from its
/// display form. All literals must share one underlying scalar kind.
fn literal_instantiator(values: &[Value]) -> Result<(TokenFn, Metadata)> {
    if values.is_empty() {
        return Err(DeclargsError::UnsupportedType(
            "empty literal restriction".to_string(),
        ));
    }
    let first = values[0].type_of();
    if !values.iter().all(|v| v.type_of().same_type(&first)) {
        return Err(DeclargsError::UnsupportedType(
            "literal options must share one underlying scalar type".to_string(),
        ));
    }

    let choices: Vec<String> = values.iter().map(Value::display_token).collect();
    let owned: Vec<Value> = values.to_vec();
    let display = choices.clone();
    let f = TokenFn::new(move |tokens| {
        let token = single_token(tokens)?;
        match display.iter().position(|c| c == token) {
            Some(index) => Ok(owned[index].clone()),
            None => Err(format!(
                "invalid choice: {:?} (choose from {})",
                token,
                display.join(", ")
            )),
        }
    });

    Ok((
        f,
        Metadata {
            nargs:   Nargs::Fixed(1),
            metavar: format!("{{{}}}", choices.join(",")),
            choices: Some(choices),
        },
    ))
}
