use sandflow::template::{
    encode_path_segment, expand_template, expand_template_for_url_path, expand_template_value,
    DeclarativeContext,
};
use serde_json::{json, Map, Value};

fn object(value: Value) -> Map<String, Value> {
    value.as_object().cloned().expect("object literal")
}

fn context() -> DeclarativeContext {
    DeclarativeContext::new(
        object(json!({"owner": "octocat", "repo": "hello world", "nested": {"id": 7}})),
        object(json!({
            "title": "Found a bug",
            "labels": ["bug", "p1"],
            "count": 3,
            "draft": false,
            "assignee": "",
            "path": "a%2Fb"
        })),
        object(json!({"github": {"token": "ghp_x"}})),
    )
}

#[test]
fn string_mode_renders_every_namespace() {
    let rendered = expand_template(
        "{{owner}}/{{input.title}}/{{secret.github.token}}/{{nested.id}}",
        &context(),
    );
    assert_eq!(rendered, "octocat/Found a bug/ghp_x/7");
}

#[test]
fn string_mode_misses_render_empty() {
    assert_eq!(
        expand_template("[{{input.missing}}][{{nope}}][{{secret.x}}]", &context()),
        "[][][]"
    );
}

#[test]
fn string_mode_renders_structured_values_as_json() {
    assert_eq!(
        expand_template("labels={{input.labels}}", &context()),
        r#"labels=["bug","p1"]"#
    );
}

#[test]
fn single_placeholder_keeps_value_type() {
    let expanded = expand_template_value(
        &json!({
            "labels": "{{input.labels}}",
            "count": "{{input.count}}",
            "draft": "{{input.draft}}",
            "missing": "{{input.missing}}",
            "mixed": "n={{input.count}}"
        }),
        &context(),
    );
    assert_eq!(
        expanded,
        json!({
            "labels": ["bug", "p1"],
            "count": 3,
            "draft": false,
            "missing": null,
            "mixed": "n=3"
        })
    );
}

#[test]
fn omit_empty_drops_only_empty_values() {
    let expanded = expand_template_value(
        &json!({
            "title": {"value": "{{input.title}}", "omit_empty": true},
            "assignee": {"value": "{{input.assignee}}", "omit_empty": true},
            "milestone": {"value": "{{input.milestone}}", "omit_empty": true},
            "draft": {"value": "{{input.draft}}", "omit_empty": true},
            "kept": {"value": "{{input.assignee}}"}
        }),
        &context(),
    );
    assert_eq!(
        expanded,
        json!({"title": "Found a bug", "draft": false, "kept": ""})
    );
}

#[test]
fn objects_with_extra_keys_are_not_omittable_wrappers() {
    let expanded = expand_template_value(
        &json!({"field": {"value": "{{input.assignee}}", "omit_empty": true, "other": 1}}),
        &context(),
    );
    assert_eq!(
        expanded,
        json!({"field": {"value": "", "omit_empty": true, "other": 1}})
    );
}

#[test]
fn omit_empty_inside_arrays_removes_the_element() {
    let expanded = expand_template_value(
        &json!(["{{owner}}", {"value": "{{input.assignee}}", "omit_empty": true}]),
        &context(),
    );
    assert_eq!(expanded, json!(["octocat"]));
}

#[test]
fn url_path_mode_encodes_segments_once() {
    let url = expand_template_for_url_path(
        "https://api.example.test/repos/{{owner}}/{{repo}}/files/{{input.path}}",
        &context(),
    );
    assert_eq!(
        url,
        "https://api.example.test/repos/octocat/hello%20world/files/a%2Fb"
    );
}

#[test]
fn path_encoding_is_idempotent() {
    for raw in ["hello world", "a/b", "ümlaut", "x?y=z&w"] {
        let once = encode_path_segment(raw);
        assert_eq!(encode_path_segment(&once), once, "re-encoding {raw}");
    }
}
