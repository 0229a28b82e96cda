//! `{{placeholder}}` expansion over the `config`, `input` and `secret` namespaces.
//!
//! Expansion is forgiving: a placeholder that resolves to nothing becomes an
//! empty string (or `null` in value mode) and an unclosed `{{` is kept as text.

pub mod path;

pub use path::{resolve_path, resolve_path_in_map};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

const INPUT_PREFIX: &str = "input.";
const SECRET_PREFIX: &str = "secret.";

/// Bindings for one request build.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DeclarativeContext {
    #[serde(default)]
    pub config: Map<String, Value>,
    #[serde(default)]
    pub input: Map<String, Value>,
    #[serde(default)]
    pub credentials: Map<String, Value>,
}

impl DeclarativeContext {
    pub fn new(
        config: Map<String, Value>,
        input: Map<String, Value>,
        credentials: Map<String, Value>,
    ) -> Self {
        Self {
            config,
            input,
            credentials,
        }
    }

    pub fn resolve(&self, token: &str) -> Option<&Value> {
        let token = token.trim();
        if let Some(path) = token.strip_prefix(INPUT_PREFIX) {
            return resolve_path_in_map(&self.input, path);
        }
        if let Some(path) = token.strip_prefix(SECRET_PREFIX) {
            return resolve_path_in_map(&self.credentials, path);
        }
        resolve_path_in_map(&self.config, token)
    }
}

/// String mode: every placeholder is replaced by its textual rendering.
pub fn expand_template(template: &str, context: &DeclarativeContext) -> String {
    substitute_placeholders(template, |token| {
        context
            .resolve(token)
            .map(value_to_text)
            .unwrap_or_default()
    })
}

/// Value mode: walks nested values, keeping the type of single-placeholder strings
/// and dropping `{value, omit_empty: true}` entries whose expansion is empty.
pub fn expand_template_value(value: &Value, context: &DeclarativeContext) -> Value {
    expand_value_inner(value, context).unwrap_or(Value::Null)
}

/// Path-segment mode: resolved values are percent-encoded unless they already
/// carry a `%XX` escape.
pub fn expand_template_for_url_path(template: &str, context: &DeclarativeContext) -> String {
    substitute_placeholders(template, |token| {
        let text = context
            .resolve(token)
            .map(value_to_text)
            .unwrap_or_default();
        encode_path_segment(&text)
    })
}

pub fn encode_path_segment(segment: &str) -> String {
    if looks_percent_encoded(segment) {
        return segment.to_string();
    }
    urlencoding::encode(segment).into_owned()
}

pub fn looks_percent_encoded(text: &str) -> bool {
    let bytes = text.as_bytes();
    bytes.windows(3).any(|window| {
        window[0] == b'%' && window[1].is_ascii_hexdigit() && window[2].is_ascii_hexdigit()
    })
}

/// Empty means `""`, `[]`, `{}` or `null`. Booleans and numbers never are.
pub fn is_empty_value(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(text) => text.is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::Object(map) => map.is_empty(),
        Value::Bool(_) | Value::Number(_) => false,
    }
}

pub fn value_to_text(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

fn expand_value_inner(value: &Value, context: &DeclarativeContext) -> Option<Value> {
    match value {
        Value::String(text) => Some(expand_string_value(text, context)),
        Value::Array(items) => Some(Value::Array(
            items
                .iter()
                .filter_map(|item| expand_value_inner(item, context))
                .collect(),
        )),
        Value::Object(map) => {
            if let Some((inner, omit_empty)) = as_omittable_field(map) {
                let expanded = expand_value_inner(inner, context).unwrap_or(Value::Null);
                if omit_empty && is_empty_value(&expanded) {
                    return None;
                }
                return Some(expanded);
            }
            let mut out = Map::new();
            for (key, entry) in map {
                if let Some(expanded) = expand_value_inner(entry, context) {
                    out.insert(key.clone(), expanded);
                }
            }
            Some(Value::Object(out))
        }
        other => Some(other.clone()),
    }
}

fn expand_string_value(text: &str, context: &DeclarativeContext) -> Value {
    if let Some(token) = sole_placeholder(text) {
        return context.resolve(token).cloned().unwrap_or(Value::Null);
    }
    Value::String(expand_template(text, context))
}

/// `{value}` or `{value, omit_empty}` with nothing else in the object.
fn as_omittable_field(map: &Map<String, Value>) -> Option<(&Value, bool)> {
    let inner = map.get("value")?;
    let omit_empty = match map.get("omit_empty") {
        Some(Value::Bool(flag)) => *flag,
        Some(_) => return None,
        None => false,
    };
    let expected_len = if map.contains_key("omit_empty") { 2 } else { 1 };
    if map.len() != expected_len {
        return None;
    }
    Some((inner, omit_empty))
}

fn sole_placeholder(text: &str) -> Option<&str> {
    let trimmed = text.trim();
    let inner = trimmed.strip_prefix("{{")?.strip_suffix("}}")?;
    if inner.contains("{{") || inner.contains("}}") || inner.trim().is_empty() {
        return None;
    }
    Some(inner.trim())
}

fn substitute_placeholders<F>(template: &str, mut resolve: F) -> String
where
    F: FnMut(&str) -> String,
{
    let mut rendered = String::with_capacity(template.len());
    let mut cursor = template;

    while let Some(start) = cursor.find("{{") {
        rendered.push_str(&cursor[..start]);
        let after_open = &cursor[start + 2..];
        let Some(close_offset) = after_open.find("}}") else {
            rendered.push_str(&cursor[start..]);
            return rendered;
        };
        let token = after_open[..close_offset].trim();
        if !token.is_empty() {
            rendered.push_str(&resolve(token));
        }
        cursor = &after_open[close_offset + 2..];
    }

    rendered.push_str(cursor);
    rendered
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn context() -> DeclarativeContext {
        DeclarativeContext::new(
            json!({"owner": "octocat", "repo": "hello world"})
                .as_object()
                .cloned()
                .unwrap_or_default(),
            json!({"title": "Bug", "labels": ["a", "b"], "count": 0})
                .as_object()
                .cloned()
                .unwrap_or_default(),
            json!({"github": {"token": "t0k"}})
                .as_object()
                .cloned()
                .unwrap_or_default(),
        )
    }

    #[test]
    fn unclosed_placeholder_is_kept_verbatim() {
        assert_eq!(
            expand_template("a {{owner}} b {{repo", &context()),
            "a octocat b {{repo"
        );
    }

    #[test]
    fn secret_namespace_resolves_nested_paths() {
        assert_eq!(
            expand_template("Bearer {{secret.github.token}}", &context()),
            "Bearer t0k"
        );
    }

    #[test]
    fn percent_escape_detection_requires_two_hex_digits() {
        assert!(looks_percent_encoded("a%2Fb"));
        assert!(!looks_percent_encoded("100%"));
        assert!(!looks_percent_encoded("%zz"));
    }
}
