//! Dotted paths into JSON values
//!
//! `$` is the root, segments are separated by dots and numeric segments index
//! into arrays: `$.query.pages.0.title`. A leading `$` is optional.

use serde_json::Value;

/// Resolve a dotted path against a value
pub fn resolve<'a>(value: &'a Value, path: &str) -> Option<&'a Value> {
    let path = path.trim();
    let path = path.strip_prefix('$').unwrap_or(path);

    path.split('.')
        .filter(|segment| !segment.is_empty())
        .try_fold(value, |current, segment| match current {
            Value::Object(map) => map.get(segment),
            Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
            _ => None,
        })
}

/// Whether a string is a template referring into organism properties
pub fn is_template(value: &str) -> bool {
    value.starts_with('$')
}

/// Fill a template value from a source.
///
/// Strings starting with `$` are replaced by the value at that path (or null),
/// arrays and objects are rendered recursively, anything else is copied.
pub fn render(template: &Value, source: &Value) -> Value {
    match template {
        Value::String(s) if is_template(s) => resolve(source, s).cloned().unwrap_or(Value::Null),
        Value::Array(items) => Value::Array(items.iter().map(|t| render(t, source)).collect()),
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(k, t)| (k.clone(), render(t, source)))
                .collect(),
        ),
        other => other.clone(),
    }
}
