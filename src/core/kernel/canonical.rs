use serde_json::{Map, Number, Value};

/// Flatten a parameter tree into sorted `path=value` entries.
///
/// Object keys and list indices are joined with `.`; top-level keys are bare.
/// Null and empty-string object fields produce no entry, so a tree padded
/// with such fields canonicalizes exactly like the tree without them. Scalar
/// elements of a list field are always emitted, `null` and `""` included
/// (`ids.0=null`, `ids.1=`). The result is sorted so the signature does not
/// depend on source key order.
///
/// A list that is not an object field (top level, or nested directly inside
/// another list) is walked like an object keyed by index. A top-level scalar
/// has no path and yields nothing.
pub fn canonicalize(params: &Value) -> Vec<String> {
    let mut entries = Vec::new();
    match params {
        Value::Object(map) => walk_object(map, None, &mut entries),
        Value::Array(items) => walk_indexed(items, None, &mut entries),
        _ => {}
    }
    entries.sort_unstable();
    entries
}

/// Join canonical entries into the string that gets digested.
pub fn canonical_string(entries: &[String]) -> String {
    entries.join("&")
}

fn child_path(prefix: Option<&str>, key: &str) -> String {
    match prefix {
        Some(prefix) => format!("{}.{}", prefix, key),
        None => key.to_string(),
    }
}

fn walk_object(map: &Map<String, Value>, prefix: Option<&str>, out: &mut Vec<String>) {
    for (key, value) in map {
        walk_field(value, child_path(prefix, key), out);
    }
}

/// Indices treated as object keys: null and empty elements are skipped.
fn walk_indexed(items: &[Value], prefix: Option<&str>, out: &mut Vec<String>) {
    for (index, value) in items.iter().enumerate() {
        walk_field(value, child_path(prefix, &index.to_string()), out);
    }
}

/// Elements of a list-valued field.
fn walk_list(items: &[Value], prefix: &str, out: &mut Vec<String>) {
    for (index, value) in items.iter().enumerate() {
        let path = child_path(Some(prefix), &index.to_string());
        match value {
            Value::Object(map) => walk_object(map, Some(&path), out),
            Value::Array(nested) => walk_indexed(nested, Some(&path), out),
            scalar => out.push(format!("{}={}", path, render_scalar(scalar))),
        }
    }
}

fn walk_field(value: &Value, path: String, out: &mut Vec<String>) {
    match value {
        Value::Null => {}
        Value::String(s) if s.is_empty() => {}
        Value::Array(items) => walk_list(items, &path, out),
        Value::Object(map) => walk_object(map, Some(&path), out),
        scalar => out.push(format!("{}={}", path, render_scalar(scalar))),
    }
}

fn render_scalar(value: &Value) -> String {
    match value {
        Value::Null => "null".to_string(),
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => render_number(n),
        // containers are walked, never rendered
        Value::Array(_) | Value::Object(_) => String::new(),
    }
}

/// Render a number the way it reads as a literal: integral floats drop the
/// fractional part (`2.0` renders as `2`).
fn render_number(n: &Number) -> String {
    if n.is_i64() || n.is_u64() {
        return n.to_string();
    }
    match n.as_f64() {
        Some(f) if f.is_finite() && f.fract() == 0.0 && f.abs() < 9_007_199_254_740_992.0 => {
            format!("{}", f as i64)
        }
        Some(f) => f.to_string(),
        None => n.to_string(),
    }
}
