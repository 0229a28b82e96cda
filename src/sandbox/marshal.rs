use rquickjs::{Ctx, Exception, Value};
use serde_json::{Map, Value as JsonValue};

pub fn json_to_js<'js>(ctx: &Ctx<'js>, value: &JsonValue) -> rquickjs::Result<Value<'js>> {
    let text = serde_json::to_string(value)
        .map_err(|err| Exception::throw_message(ctx, &format!("failed to encode value: {err}")))?;
    ctx.json_parse(text)
}

pub fn map_to_js<'js>(ctx: &Ctx<'js>, map: &Map<String, JsonValue>) -> rquickjs::Result<Value<'js>> {
    let text = serde_json::to_string(map)
        .map_err(|err| Exception::throw_message(ctx, &format!("failed to encode value: {err}")))?;
    ctx.json_parse(text)
}

/// Functions, symbols and `undefined` have no JSON form and come back as null.
pub fn js_to_json<'js>(ctx: &Ctx<'js>, value: Value<'js>) -> rquickjs::Result<JsonValue> {
    if value.is_undefined() || value.is_null() || value.is_function() {
        return Ok(JsonValue::Null);
    }
    let Some(text) = ctx.json_stringify(value)? else {
        return Ok(JsonValue::Null);
    };
    let text = text.to_string()?;
    serde_json::from_str(&text)
        .map_err(|err| Exception::throw_message(ctx, &format!("failed to decode value: {err}")))
}

/// Script results: nothing becomes `{}`, objects pass through, anything else
/// is wrapped under `result`.
pub fn normalize_result(value: JsonValue) -> Map<String, JsonValue> {
    match value {
        JsonValue::Null => Map::new(),
        JsonValue::Object(map) => map,
        other => Map::from_iter([("result".to_string(), other)]),
    }
}

#[cfg(test)]
mod tests {
    use super::normalize_result;
    use serde_json::json;

    #[test]
    fn normalizes_result_shapes() {
        assert!(normalize_result(json!(null)).is_empty());
        assert_eq!(
            normalize_result(json!({"a": 1})).get("a"),
            Some(&json!(1))
        );
        assert_eq!(
            normalize_result(json!([1, 2])).get("result"),
            Some(&json!([1, 2]))
        );
        assert_eq!(normalize_result(json!(7)).get("result"), Some(&json!(7)));
    }
}
