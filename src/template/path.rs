use serde_json::{Map, Value};

/// Walks `value` along a dot-separated path. Numeric segments index arrays.
pub fn resolve_path<'a>(value: &'a Value, path: &str) -> Option<&'a Value> {
    let mut current = value;
    for segment in path_segments(path) {
        current = step(current, segment)?;
    }
    Some(current)
}

pub fn resolve_path_in_map<'a>(map: &'a Map<String, Value>, path: &str) -> Option<&'a Value> {
    let mut segments = path_segments(path);
    let first = segments.next()?;
    let mut current = map.get(first)?;
    for segment in segments {
        current = step(current, segment)?;
    }
    Some(current)
}

fn path_segments(path: &str) -> impl Iterator<Item = &str> {
    path.split('.')
        .map(str::trim)
        .filter(|segment| !segment.is_empty())
}

fn step<'a>(value: &'a Value, segment: &str) -> Option<&'a Value> {
    match value {
        Value::Object(object) => object.get(segment),
        Value::Array(items) => segment
            .parse::<usize>()
            .ok()
            .and_then(|index| items.get(index)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn resolves_nested_objects_and_array_indices() {
        let value = json!({"body": {"items": [{"id": 7}]}});
        assert_eq!(resolve_path(&value, "body.items.0.id"), Some(&json!(7)));
        assert_eq!(resolve_path(&value, "body.items.3.id"), None);
        assert_eq!(resolve_path(&value, "body.missing"), None);
    }
}
