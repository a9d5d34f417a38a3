//! `{{ name }}` placeholder substitution for manifest text

use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex::{Captures, Regex};
use serde_json::Value;
use tracing::warn;

/// Caller-supplied variables, usually parsed from a JSON object
pub type Variables = BTreeMap<String, Value>;

static PLACEHOLDER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\{\{\s*([A-Za-z_][A-Za-z0-9_]*(?:\.[A-Za-z0-9_]+)*)\s*\}\}")
        .expect("placeholder pattern is valid")
});

/// Replace every `{{ name }}` (or `{{ name.field }}`) placeholder.
///
/// Strings are inserted verbatim and other values as JSON text. Undefined
/// names render as an empty string.
#[must_use]
pub fn render(text: &str, vars: &Variables) -> String {
    PLACEHOLDER
        .replace_all(text, |caps: &Captures<'_>| {
            let path = &caps[1];
            match lookup(vars, path) {
                Some(Value::String(s)) => s.clone(),
                Some(Value::Null) => String::new(),
                Some(other) => other.to_string(),
                None => {
                    warn!(variable = %path, "undefined manifest variable");
                    String::new()
                }
            }
        })
        .into_owned()
}

fn lookup<'a>(vars: &'a Variables, path: &str) -> Option<&'a Value> {
    let mut segments = path.split('.');
    let mut value = vars.get(segments.next()?)?;
    for segment in segments {
        value = match value {
            Value::Object(map) => map.get(segment)?,
            Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    Some(value)
}
