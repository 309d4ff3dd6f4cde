//! # Environment Substitution
//!
//! `.env` parsing and compose-style `${VAR}` interpolation.
//!
//! Supported forms: `$VAR`, `${VAR}`, `${VAR:-default}`, `${VAR-default}`,
//! `${VAR:+alt}`, `${VAR+alt}`, `${VAR:?msg}`, `${VAR?msg}` and `$$` as an
//! escaped dollar. Unset variables without a default expand to an empty string.
//! Defaults and alternatives are themselves interpolated.

use crate::types::{DockgeError, Result};
use serde_yaml::Value;
use std::collections::BTreeMap;

/// Variables available to substitution.
pub type Environment = BTreeMap<String, String>;

// =============================================================================
// .ENV PARSING
// =============================================================================

/// Parse `.env` text into an [`Environment`]. Invalid lines are skipped.
#[must_use]
pub fn parse_env(text: &str) -> Environment {
    let mut env = Environment::new();
    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let line = line
            .strip_prefix("export ")
            .map(str::trim_start)
            .unwrap_or(line);
        let Some((key, value)) = line.split_once('=') else {
            continue;
        };
        let key = key.trim();
        if !is_env_key(key) {
            continue;
        }
        env.insert(key.to_string(), parse_env_value(value.trim()));
    }
    env
}

fn is_env_key(key: &str) -> bool {
    !key.is_empty()
        && key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'))
}

fn parse_env_value(value: &str) -> String {
    if let Some(inner) = quoted(value, '"') {
        return inner.replace("\\n", "\n").replace("\\\"", "\"");
    }
    if let Some(inner) = quoted(value, '\'') {
        return inner.to_string();
    }
    match value.find(" #") {
        Some(pos) => value[..pos].trim_end().to_string(),
        None => value.to_string(),
    }
}

/// Content between an opening quote at the start and the last matching quote.
fn quoted(value: &str, quote: char) -> Option<&str> {
    let rest = value.strip_prefix(quote)?;
    let end = rest.rfind(quote)?;
    Some(&rest[..end])
}

// =============================================================================
// INTERPOLATION
// =============================================================================

/// Interpolate every variable reference in `input`.
#[must_use]
pub fn substitute(input: &str, env: &Environment) -> String {
    let mut out = String::with_capacity(input.len());
    let mut rest = input;
    while let Some(pos) = rest.find('$') {
        out.push_str(&rest[..pos]);
        let after = &rest[pos + 1..];

        if let Some(stripped) = after.strip_prefix('$') {
            out.push('$');
            rest = stripped;
            continue;
        }

        if let Some(body) = after.strip_prefix('{') {
            match closing_brace(body) {
                Some(end) => {
                    out.push_str(&expand_braced(&body[..end], env));
                    rest = &body[end + 1..];
                }
                None => {
                    out.push('$');
                    rest = after;
                }
            }
            continue;
        }

        let len = name_len(after);
        if len == 0 {
            out.push('$');
        } else {
            out.push_str(env.get(&after[..len]).map(String::as_str).unwrap_or_default());
        }
        rest = &after[len..];
    }
    out.push_str(rest);
    out
}

fn name_len(s: &str) -> usize {
    let mut chars = s.char_indices();
    match chars.next() {
        Some((_, c)) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return 0,
    }
    chars
        .find(|(_, c)| !(c.is_ascii_alphanumeric() || *c == '_'))
        .map(|(i, _)| i)
        .unwrap_or(s.len())
}

/// Byte offset of the `}` closing a `${`, honoring nested braces.
fn closing_brace(body: &str) -> Option<usize> {
    let mut depth = 0usize;
    for (i, b) in body.bytes().enumerate() {
        match b {
            b'{' => depth += 1,
            b'}' if depth == 0 => return Some(i),
            b'}' => depth -= 1,
            _ => {}
        }
    }
    None
}

fn expand_braced(body: &str, env: &Environment) -> String {
    let len = name_len(body);
    if len == 0 {
        return format!("${{{body}}}");
    }
    let value = env.get(&body[..len]).map(String::as_str);
    let modifier = &body[len..];
    let is_set = value.is_some();
    let non_empty = value.is_some_and(|v| !v.is_empty());

    let (op, arg) = [":-", ":+", ":?", "-", "+", "?"]
        .iter()
        .find_map(|op| modifier.strip_prefix(op).map(|arg| (*op, arg)))
        .unwrap_or(("", modifier));

    match op {
        "" if arg.is_empty() => value.unwrap_or_default().to_string(),
        ":-" if non_empty => value.unwrap_or_default().to_string(),
        ":-" => substitute(arg, env),
        "-" if is_set => value.unwrap_or_default().to_string(),
        "-" => substitute(arg, env),
        ":+" if non_empty => substitute(arg, env),
        "+" if is_set => substitute(arg, env),
        ":+" | "+" => String::new(),
        ":?" | "?" => value.unwrap_or_default().to_string(),
        _ => format!("${{{body}}}"),
    }
}

/// Interpolate every string scalar of a YAML tree. Keys are left untouched.
#[must_use]
pub fn substitute_value(value: &Value, env: &Environment) -> Value {
    match value {
        Value::String(s) => Value::String(substitute(s, env)),
        Value::Sequence(items) => {
            Value::Sequence(items.iter().map(|v| substitute_value(v, env)).collect())
        }
        Value::Mapping(map) => Value::Mapping(
            map.iter()
                .map(|(k, v)| (k.clone(), substitute_value(v, env)))
                .collect(),
        ),
        Value::Tagged(tagged) => {
            let mut tagged = tagged.as_ref().clone();
            tagged.value = substitute_value(&tagged.value, env);
            Value::Tagged(Box::new(tagged))
        }
        Value::Null | Value::Bool(_) | Value::Number(_) => value.clone(),
    }
}

/// Parse YAML, substitute it and render it back.
pub fn envsubst_yaml(yaml: &str, env: &Environment) -> Result<String> {
    let value: Value =
        serde_yaml::from_str(yaml).map_err(|e| DockgeError::Validation(e.to_string()))?;
    serde_yaml::to_string(&substitute_value(&value, env))
        .map_err(|e| DockgeError::Serialization(e.to_string()))
}

// =============================================================================
// TESTS
// =============================================================================
