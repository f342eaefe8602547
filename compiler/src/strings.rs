//! Naming utilities: dotted paths, flag spellings, subcommand names, and
//! default rendering.

use lazy_static::lazy_static;
use regex::Regex;

use declargs_schema::{TypeNode, Value};

pub const PATH_DELIMITER: &str = ".";

lazy_static! {
    // Characters that survive shell quoting untouched.
    static ref SHELL_SAFE: Regex = Regex::new(r"^[A-Za-z0-9_@%+=:,./-]+$").unwrap();
}

/// Join path segments with the nesting delimiter, skipping empty parts.
///
/// `["parent", "child"]` => `"parent.child"`
pub fn make_field_name(parts: &[&str]) -> String {
    parts
        .iter()
        .filter(|p| !p.is_empty())
        .cloned()
        .collect::<Vec<_>>()
        .join(PATH_DELIMITER)
}

/// Destination key for a subcommand selector in the flat value map.
pub fn subcommand_dest(path: &str) -> String {
    if path.is_empty() {
        "(positional)".to_string()
    } else {
        format!("{} (positional)", path)
    }
}

/// Flag spelling for a dotted path: per-segment word separators render as
/// hyphens, leading underscore runs are preserved.
///
/// `"model.learning_rate"` => `"model.learning-rate"`
/// `"_private_field"` => `"_private-field"`
pub fn swap_delimiters(path: &str) -> String {
    path.split(PATH_DELIMITER)
        .map(|segment| {
            let leading = segment.len() - segment.trim_start_matches('_').len();
            let (prefix, rest) = segment.split_at(leading);
            format!("{}{}", prefix, rest.replace('_', "-"))
        })
        .collect::<Vec<_>>()
        .join(PATH_DELIMITER)
}

/// `--flag` spelling for a keyword argument at `path`.
pub fn flag_name(path: &str) -> String {
    format!("--{}", swap_delimiters(path))
}

/// Hyphen-separated lowercase form of a CamelCase type name.
///
/// `"HttpServerConfig"` => `"http-server-config"`
pub fn hyphen_separated_from_camel_case(name: &str) -> String {
    let mut out = String::with_capacity(name.len() + 4);
    let chars: Vec<char> = name.chars().collect();
    for (i, c) in chars.iter().enumerate() {
        if c.is_ascii_uppercase() && i > 0 {
            let prev_lower = chars[i - 1].is_ascii_lowercase() || chars[i - 1].is_ascii_digit();
            let next_lower = chars.get(i + 1).map_or(false, |n| n.is_ascii_lowercase());
            if prev_lower || next_lower {
                out.push('-');
            }
        }
        out.push(c.to_ascii_lowercase());
    }
    out
}

fn type_subcommand_suffix(ty: &TypeNode) -> String {
    match ty {
        TypeNode::Null => "none".to_string(),
        TypeNode::Generic { base, args } => {
            let mut parts = vec![hyphen_separated_from_camel_case(&base.name)];
            parts.extend(args.iter().map(type_subcommand_suffix));
            parts.join("-")
        }
        other => hyphen_separated_from_camel_case(&other.display_name()),
    }
}

/// Subcommand name for one union option: the hyphenated type name, prefixed
/// by the owning field path unless the prefix is empty or omitted.
pub fn subcommand_name(prefix: &str, ty: &TypeNode, omit_prefix: bool) -> String {
    let suffix = type_subcommand_suffix(ty);
    if prefix.is_empty() || omit_prefix {
        suffix
    } else {
        format!("{}:{}", prefix, suffix)
    }
}

/// Quote a token for display in help text, shlex style: tokens made only of
/// shell-safe characters pass through, everything else is single-quoted.
pub fn shell_quote(token: &str) -> String {
    if !token.is_empty() && SHELL_SAFE.is_match(token) {
        token.to_string()
    } else {
        format!("'{}'", token.replace('\'', r"'\''"))
    }
}

/// Metavar for a variable-length argument built from a single-entry metavar.
pub fn multi_metavar_from_single(single: &str) -> String {
    if single.len() >= 32 {
        format!("{} [...]", single)
    } else {
        format!("{} [{} ...]", single, single)
    }
}

/// Merge union option metavars: adjacent brace-delimited choice sets are
/// collapsed into one set, multi-token entries get wrapped in braces, and the
/// results are pipe-joined.
///
/// `{0,1,2}`, `{3,4}`, `STR` => `{0,1,2,3,4}|STR`
pub fn join_union_metavars(metavars: &[String]) -> String {
    if metavars.is_empty() {
        return String::new();
    }
    let mut merged: Vec<String> = vec![metavars[0].clone()];
    for curr in &metavars[1..] {
        let prev = merged.last().unwrap().clone();
        if prev.starts_with('{') && prev.ends_with('}') && curr.starts_with('{') && curr.ends_with('}')
        {
            let combined = format!("{},{}", &prev[..prev.len() - 1], &curr[1..]);
            *merged.last_mut().unwrap() = combined;
        } else {
            merged.push(curr.clone());
        }
    }
    for m in merged.iter_mut() {
        if m.contains(' ') {
            *m = format!("{{{}}}", m);
        }
    }
    merged.join("|")
}

/// Canonical token rendering of a value, as it would be typed on the command
/// line. Containers flatten to their element tokens in order; records have no
/// flat form and render as `None`.
pub fn value_tokens(value: &Value) -> Option<Vec<String>> {
    match value {
        Value::Record(..) => None,
        Value::List(items) | Value::Set(items) | Value::Tuple(items) => {
            let mut out = Vec::with_capacity(items.len());
            for item in items {
                out.extend(value_tokens(item)?);
            }
            Some(out)
        }
        Value::Map(entries) => {
            let mut out = Vec::with_capacity(entries.len() * 2);
            for (key, val) in entries {
                out.extend(value_tokens(key)?);
                out.extend(value_tokens(val)?);
            }
            Some(out)
        }
        leaf => Some(vec![leaf.display_token()]),
    }
}
