mod support;

use sandflow::capability::{CapabilityError, UreqHttpClient};
use sandflow::declarative::{execute_declarative, BlockDefinition, DeclarativeError};
use sandflow::shared::Deadline;
use sandflow::template::DeclarativeContext;
use serde_json::{json, Map, Value};
use std::time::Duration;
use support::MockHttpServer;

fn object(value: Value) -> Map<String, Value> {
    value.as_object().cloned().expect("object literal")
}

fn issue_block(base_url: &str) -> BlockDefinition {
    serde_json::from_value(json!({
        "request": {
            "url": format!("{base_url}/repos/{{{{owner}}}}/{{{{repo}}}}/issues"),
            "method": "POST",
            "headers": {
                "Authorization": "token {{secret.github_token}}",
                "Accept": "application/vnd.github+json"
            },
            "body": {
                "title": "{{input.title}}",
                "body": {"value": "{{input.description}}", "omit_empty": true},
                "labels": "{{input.labels}}"
            }
        },
        "response": {
            "successStatus": [200, 201],
            "outputMapping": {"id": "body.id", "number": "body.number"}
        }
    }))
    .expect("parse block definition")
}

fn issue_context() -> DeclarativeContext {
    DeclarativeContext::new(
        object(json!({"owner": "octocat", "repo": "hello-world"})),
        object(json!({"title": "Test Issue Title", "labels": ["bug"]})),
        object(json!({"github_token": "ghp_secret"})),
    )
}

#[test]
fn github_issue_block_maps_created_response() {
    let server = MockHttpServer::start(1, |_| {
        (201, r#"{"id":12345,"number":1,"state":"open"}"#.to_string())
    });
    let block = issue_block(&server.base_url);
    let http = UreqHttpClient::new(Duration::from_secs(5), "sandflow-test");

    let output = execute_declarative(
        &Deadline::after(Duration::from_secs(10)),
        block.request.as_ref().expect("request config"),
        block.response.as_ref(),
        &issue_context(),
        &http,
    )
    .expect("declarative request");
    assert_eq!(output, object(json!({"id": 12345, "number": 1})));

    let requests = server.finish();
    assert_eq!(requests.len(), 1);
    let request = &requests[0];
    assert_eq!(request.method, "POST");
    assert_eq!(request.path, "/repos/octocat/hello-world/issues");
    assert_eq!(request.header("authorization"), Some("token ghp_secret"));
    assert_eq!(request.header("content-type"), Some("application/json"));
    let body: Value = serde_json::from_str(&request.body).expect("json body");
    assert_eq!(body, json!({"title": "Test Issue Title", "labels": ["bug"]}));
}

#[test]
fn rejected_status_reports_code_and_body() {
    let server = MockHttpServer::start(1, |_| {
        (400, r#"{"message":"Validation Failed"}"#.to_string())
    });
    let block = issue_block(&server.base_url);
    let http = UreqHttpClient::new(Duration::from_secs(5), "sandflow-test");

    let err = execute_declarative(
        &Deadline::none(),
        block.request.as_ref().expect("request config"),
        block.response.as_ref(),
        &issue_context(),
        &http,
    )
    .expect_err("400 must fail");
    assert_eq!(err.status(), Some(400));
    assert!(err.to_string().contains("400"));
    assert!(err.to_string().contains("Validation Failed"));
    server.finish();
}

#[test]
fn missing_mapping_returns_the_full_envelope() {
    let server = MockHttpServer::start(1, |request| {
        assert_eq!(request.method, "GET");
        (200, r#"{"login":"octocat"}"#.to_string())
    });
    let block: BlockDefinition = serde_json::from_value(json!({
        "request": {
            "url": format!("{}/users/{{{{input.user}}}}", server.base_url),
            "queryParams": {"per_page": "{{per_page}}"}
        }
    }))
    .expect("parse block definition");
    let http = UreqHttpClient::new(Duration::from_secs(5), "sandflow-test");

    let output = execute_declarative(
        &Deadline::none(),
        block.request.as_ref().expect("request config"),
        None,
        &DeclarativeContext::new(
            object(json!({"per_page": 10})),
            object(json!({"user": "octo cat"})),
            Map::new(),
        ),
        &http,
    )
    .expect("declarative request");
    assert_eq!(output.get("status"), Some(&json!(200)));
    assert_eq!(output.get("body"), Some(&json!({"login": "octocat"})));
    assert_eq!(
        output
            .get("headers")
            .and_then(|headers| headers.get("content-type")),
        Some(&json!("application/json"))
    );

    let requests = server.finish();
    assert_eq!(requests[0].path, "/users/octo%20cat?per_page=10");
}

#[test]
fn expired_deadline_fails_before_sending() {
    let block = issue_block("http://127.0.0.1:9");
    let http = UreqHttpClient::new(Duration::from_secs(5), "sandflow-test");
    let deadline = Deadline::none();
    deadline.cancel();

    let err = execute_declarative(
        &deadline,
        block.request.as_ref().expect("request config"),
        block.response.as_ref(),
        &issue_context(),
        &http,
    )
    .expect_err("cancelled deadline");
    assert!(matches!(
        err,
        DeclarativeError::Transport {
            source: CapabilityError::DeadlineExceeded { .. },
            ..
        }
    ));
}

#[test]
fn block_definitions_reject_unknown_fields() {
    let err = serde_json::from_value::<BlockDefinition>(json!({
        "request": {"url": "https://x.test", "verb": "GET"}
    }))
    .expect_err("unknown field");
    assert!(err.to_string().contains("verb"));
}
