//! `<var:NAME>` placeholder discovery and substitution.
//!
//! Component configuration may carry placeholders such as `<var:model>` in
//! any string, including map keys. [`find_variables`] lists them in
//! depth-first order, [`replace_variables`] substitutes bound values.
//!
//! Both functions are total: unknown shapes pass through untouched.
//!
//! ## Substitution rules
//!
//! - A string that is exactly one placeholder is replaced by the bound value
//!   itself, which may change its type (string to object, int, leaf...).
//!   Unbound exact placeholders are left as-is.
//! - A string with embedded placeholders is rewritten per bound variable:
//!   a string binding is inlined; any other binding sanitizes the whole
//!   string instead (`<`, `>` and `:` become `-`, runs of `-` collapse) and
//!   the bound value is dropped.
//! - Map keys go through the same rules but stay keys only when the result
//!   is still a string; otherwise the original key is kept.

use crate::value::{LeafRef, Map, Value};
use once_cell::sync::Lazy;
use regex::Regex;
use std::fmt::Debug;

/// Variable name to replacement value.
///
/// Bindings are applied in insertion order, which decides the result when
/// string and non-string bindings share one embedded string.
pub type Bindings = Map;

static VARIABLE: Lazy<Regex> = Lazy::new(|| Regex::new(r"<var:(.*?)>").expect("valid regex"));

static EXACT_VARIABLE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^<var:([^>]*)>$").expect("valid regex"));

static SANITIZE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[<>:]").expect("valid regex"));

static DASH_RUN: Lazy<Regex> = Lazy::new(|| Regex::new(r"-+").expect("valid regex"));

/// An object that participates in variable resolution without being plain data.
///
/// Components and documents implement this so that a configuration tree can
/// hold them directly and still have its placeholders resolved.
pub trait Leaf: Debug + Send + Sync {
    /// Variable names this object references, in discovery order.
    fn variables(&self) -> Vec<String>;

    /// A copy of this object with `bindings` substituted.
    fn with_variables(&self, bindings: &Bindings) -> LeafRef;

    /// Plain data view, used for serialization.
    fn to_value(&self) -> Value;
}

/// Collect placeholder names from `value` in depth-first order.
///
/// Mapping values are visited in insertion order. Map keys are not
/// inspected. Duplicates are kept.
pub fn find_variables(value: &Value) -> Vec<String> {
    let mut out = Vec::new();
    collect_variables(value, &mut out);
    out
}

fn collect_variables(value: &Value, out: &mut Vec<String>) {
    match value {
        Value::Object(map) => {
            for v in map.values() {
                collect_variables(v, out);
            }
        }
        Value::Array(items) => {
            for v in items {
                collect_variables(v, out);
            }
        }
        Value::String(s) => out.extend(variables_in_str(s)),
        Value::Leaf(leaf) => out.extend(leaf.variables()),
        _ => {}
    }
}

/// Placeholder names embedded in a single string.
pub fn variables_in_str(s: &str) -> Vec<String> {
    VARIABLE
        .captures_iter(s)
        .filter_map(|c| c.get(1).map(|m| m.as_str().to_string()))
        .collect()
}

/// Substitute `bindings` into `value`.
pub fn replace_variables(value: &Value, bindings: &Bindings) -> Value {
    match value {
        Value::Object(map) => {
            let mut out = Map::with_capacity(map.len());
            for (k, v) in map {
                let key = match replace_in_str(k, bindings) {
                    Value::String(s) => s,
                    _ => k.clone(),
                };
                out.insert(key, replace_variables(v, bindings));
            }
            Value::Object(out)
        }
        Value::String(s) => replace_in_str(s, bindings),
        Value::Array(items) => {
            Value::Array(items.iter().map(|v| replace_variables(v, bindings)).collect())
        }
        Value::Leaf(leaf) => Value::Leaf(leaf.with_variables(bindings)),
        other => other.clone(),
    }
}

/// Substitute `bindings` into a string, returning a plain string result
/// unless the string is an exact placeholder bound to a non-string.
pub fn replace_in_str(s: &str, bindings: &Bindings) -> Value {
    if let Some(caps) = EXACT_VARIABLE.captures(s) {
        let name = caps.get(1).map(|m| m.as_str()).unwrap_or_default();
        return match bindings.get(name) {
            Some(bound) => bound.clone(),
            None => Value::String(s.to_string()),
        };
    }

    let present: Vec<String> = variables_in_str(s)
        .into_iter()
        .map(|v| v.trim().to_string())
        .collect();
    if present.is_empty() {
        return Value::String(s.to_string());
    }

    let mut out = s.to_string();
    for (name, bound) in bindings {
        if !present.iter().any(|p| p == name) {
            continue;
        }
        match bound {
            Value::String(text) => {
                out = out.replace(&format!("<var:{}>", name), text);
            }
            _ => out = sanitize(&out),
        }
    }
    Value::String(out)
}

/// Replace `<`, `>` and `:` with `-` and collapse dash runs.
pub fn sanitize(s: &str) -> String {
    let replaced = SANITIZE.replace_all(s, "-");
    DASH_RUN.replace_all(&replaced, "-").into_owned()
}
