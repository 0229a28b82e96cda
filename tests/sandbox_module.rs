use sandflow::capability::{
    CapabilityError, ChatRequest, ChatResponse, ExecutionContext, HttpClient, HttpRequest,
    HttpResponse, LlmService, TokenUsage,
};
use sandflow::config::SandboxSettings;
use sandflow::sandbox::{ScriptEngine, SandboxError};
use sandflow::shared::{Deadline, LogSink, MemoryLogSink};
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

#[derive(Default)]
struct RecordingHttpClient {
    requests: Mutex<Vec<HttpRequest>>,
}

impl HttpClient for RecordingHttpClient {
    fn send(
        &self,
        _deadline: &Deadline,
        request: &HttpRequest,
    ) -> Result<HttpResponse, CapabilityError> {
        self.requests
            .lock()
            .expect("lock requests")
            .push(request.clone());
        Ok(HttpResponse {
            status: 200,
            headers: BTreeMap::from([("x-request-id".to_string(), "r-1".to_string())]),
            body: r#"{"ok":true,"items":[1,2]}"#.to_string(),
        })
    }
}

struct EchoLlm;

impl LlmService for EchoLlm {
    fn chat(
        &self,
        _deadline: &Deadline,
        provider: &str,
        model: &str,
        request: &ChatRequest,
    ) -> Result<ChatResponse, CapabilityError> {
        let last = request
            .messages
            .last()
            .map(|message| message.content.clone())
            .unwrap_or_default();
        Ok(ChatResponse {
            content: format!("{provider}/{model}: {last}"),
            finish_reason: Some("stop".to_string()),
            tool_calls: None,
            usage: TokenUsage {
                input_tokens: 3,
                output_tokens: 5,
            },
        })
    }
}

fn object(value: Value) -> Map<String, Value> {
    value.as_object().cloned().expect("object literal")
}

fn engine() -> ScriptEngine {
    ScriptEngine::new(SandboxSettings::default())
}

fn plain_context() -> ExecutionContext {
    ExecutionContext::builder(Arc::new(RecordingHttpClient::default())).build()
}

fn run(script: &str, input: Value) -> Result<Map<String, Value>, SandboxError> {
    engine().execute(&Deadline::none(), script, &object(input), &plain_context())
}

#[test]
fn body_scripts_receive_input_and_return_objects() {
    let output = run("return { doubled: input.n * 2 };", json!({"n": 21})).expect("run");
    assert_eq!(output, object(json!({"doubled": 42})));
}

#[test]
fn execute_function_form_is_invoked() {
    let output = run(
        "function execute(input, context) { return { greeting: 'hi ' + input.name }; }",
        json!({"name": "ada"}),
    )
    .expect("run");
    assert_eq!(output, object(json!({"greeting": "hi ada"})));
}

#[test]
fn async_execute_results_are_awaited() {
    let output = run(
        "async function execute(input) { const v = await Promise.resolve(input.v); return { v }; }",
        json!({"v": 7}),
    )
    .expect("run");
    assert_eq!(output, object(json!({"v": 7})));
}

#[test]
fn non_object_results_are_wrapped_and_null_is_empty() {
    assert_eq!(
        run("return [1, 2];", json!({})).expect("run"),
        object(json!({"result": [1, 2]}))
    );
    assert_eq!(
        run("return 'done';", json!({})).expect("run"),
        object(json!({"result": "done"}))
    );
    assert!(run("return null;", json!({})).expect("run").is_empty());
    assert!(run("let x = 1;", json!({})).expect("run").is_empty());
}

#[test]
fn last_expression_is_the_result_without_a_return() {
    assert_eq!(
        run("input.a + 1", json!({"a": 1})).expect("run"),
        object(json!({"result": 2}))
    );
    assert_eq!(
        run("const total = input.a * 10;\n({ total, seen: true })", json!({"a": 4})).expect("run"),
        object(json!({"total": 40, "seen": true}))
    );
}

#[test]
fn execute_mentioned_only_in_comments_or_strings_keeps_body_form() {
    assert_eq!(
        run(
            "// unlike function execute(input) we mutate in place\ninput.seen = true;",
            json!({}),
        )
        .expect("comment mention"),
        object(json!({"result": true}))
    );
    assert!(run("const note = 'call function execute(x) later';", json!({}))
        .expect("string mention")
        .is_empty());
}

#[test]
fn execute_bound_with_const_is_invoked() {
    let output = run(
        "const execute = (input, context) => ({ via: typeof context.http, n: input.n });",
        json!({"n": 3}),
    )
    .expect("run");
    assert_eq!(output, object(json!({"via": "object", "n": 3})));
}

#[test]
fn thrown_errors_keep_clock_times_in_messages() {
    let err = run("throw new Error('deadline at 12:30:45 passed');", json!({})).expect_err("throws");
    let SandboxError::Execution { message } = err else {
        panic!("expected execution error, got {err:?}");
    };
    assert!(message.contains("deadline at 12:30:45 passed"), "{message}");
}

#[test]
fn blank_code_is_invalid() {
    assert_eq!(run("   \n", json!({})), Err(SandboxError::InvalidCode));
}

#[test]
fn syntax_errors_are_compilation_failures() {
    let err = run("return {;", json!({})).expect_err("syntax error");
    assert!(matches!(err, SandboxError::Compilation { .. }), "{err:?}");
}

#[test]
fn thrown_errors_are_execution_failures_without_stack_frames() {
    let err = run("throw new Error('boom');", json!({})).expect_err("thrown");
    let SandboxError::Execution { message } = err else {
        panic!("expected execution error, got {err:?}");
    };
    assert!(message.contains("boom"));
    assert!(!message.contains("    at "));
    assert!(!message.contains(".rs"));
}

#[test]
fn infinite_loops_time_out() {
    let engine = ScriptEngine::new(SandboxSettings {
        timeout_ms: 150,
        ..SandboxSettings::default()
    });
    let started = Instant::now();
    let err = engine
        .execute(&Deadline::none(), "while (true) {}", &Map::new(), &plain_context())
        .expect_err("timeout");
    assert!(err.is_timeout(), "{err:?}");
    assert!(started.elapsed() < Duration::from_secs(5));
}

#[test]
fn caller_deadline_bounds_execution() {
    let err = engine()
        .execute(
            &Deadline::after(Duration::from_millis(100)),
            "while (true) {}",
            &Map::new(),
            &plain_context(),
        )
        .expect_err("timeout");
    assert!(matches!(err, SandboxError::Timeout { .. }), "{err:?}");
}

#[test]
fn globals_do_not_leak_between_runs() {
    let first = run("leaked = 42; return { set: true };", json!({})).expect("first run");
    assert_eq!(first, object(json!({"set": true})));
    let second = run("return { kind: typeof leaked };", json!({})).expect("second run");
    assert_eq!(second, object(json!({"kind": "undefined"})));
}

#[test]
fn host_globals_are_hidden() {
    let output = run(
        "return { process: typeof process, require: typeof require, g: typeof globalThis };",
        json!({}),
    )
    .expect("run");
    assert_eq!(
        output,
        object(json!({"process": "undefined", "require": "undefined", "g": "undefined"}))
    );
}

#[test]
fn dynamic_code_evaluation_is_blocked() {
    for script in [
        "return eval('1 + 1');",
        "return Function('return 1')();",
        "return (function () {}).constructor('return 1')();",
        "return (async function () {}).constructor('return 1')();",
    ] {
        let err = run(script, json!({})).expect_err(script);
        let SandboxError::Execution { message } = err else {
            panic!("expected execution error for {script}, got {err:?}");
        };
        assert!(message.contains("SecurityError"), "{script}: {message}");
    }
}

#[test]
fn uninstalled_capabilities_are_absent() {
    let output = run(
        "return { llm: typeof context.llm, vector: typeof ctx.vector, http: typeof context.http.request };",
        json!({}),
    )
    .expect("run");
    assert_eq!(
        output,
        object(json!({"llm": "undefined", "vector": "undefined", "http": "function"}))
    );
}

#[test]
fn http_capability_round_trips_through_the_host_client() {
    let http = Arc::new(RecordingHttpClient::default());
    let context = ExecutionContext::builder(http.clone()).build();
    let output = engine()
        .execute(
            &Deadline::none(),
            r#"
            const res = context.http.request({
                method: 'post',
                url: 'https://api.example.test/items',
                body: { name: input.name }
            });
            return { status: res.status, ok: res.body.ok, count: res.body.items.length };
            "#,
            &object(json!({"name": "widget"})),
            &context,
        )
        .expect("run");
    assert_eq!(output, object(json!({"status": 200, "ok": true, "count": 2})));

    let requests = http.requests.lock().expect("lock requests");
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].method, "POST");
    assert_eq!(requests[0].header("content-type"), Some("application/json"));
    assert_eq!(requests[0].body.as_deref(), Some(r#"{"name":"widget"}"#));
}

#[test]
fn llm_capability_is_installed_when_supplied() {
    let context = ExecutionContext::builder(Arc::new(RecordingHttpClient::default()))
        .with_llm(Arc::new(EchoLlm))
        .build();
    let output = engine()
        .execute(
            &Deadline::none(),
            "const r = ctx.llm.chat('openai', 'gpt-x', { messages: [{ role: 'user', content: 'ping' }] }); return { content: r.content, out: r.usage.output_tokens };",
            &Map::new(),
            &context,
        )
        .expect("run");
    assert_eq!(
        output,
        object(json!({"content": "openai/gpt-x: ping", "out": 5}))
    );
}

#[test]
fn bad_capability_arguments_are_reported_as_such() {
    let context = ExecutionContext::builder(Arc::new(RecordingHttpClient::default()))
        .with_llm(Arc::new(EchoLlm))
        .build();
    let err = engine()
        .execute(
            &Deadline::none(),
            "return context.llm.chat(42);",
            &Map::new(),
            &context,
        )
        .expect_err("argument error");
    let SandboxError::CapabilityArgument { message } = err else {
        panic!("expected capability argument error, got {err:?}");
    };
    assert!(message.starts_with("llm.chat:"), "{message}");
}

#[test]
fn scripts_can_catch_capability_errors() {
    let output = run(
        "try { context.http.request({}); return { caught: false }; } catch (e) { return { caught: true, name: e.name }; }",
        json!({}),
    )
    .expect("run");
    assert_eq!(
        output,
        object(json!({"caught": true, "name": "CapabilityArgumentError"}))
    );
}

#[test]
fn credentials_are_exposed_read_only_as_data() {
    let context = ExecutionContext::builder(Arc::new(RecordingHttpClient::default()))
        .with_credentials(object(json!({"apiKey": "k-1"})))
        .build();
    let output = engine()
        .execute(
            &Deadline::none(),
            "return { key: context.credentials.apiKey };",
            &Map::new(),
            &context,
        )
        .expect("run");
    assert_eq!(output, object(json!({"key": "k-1"})));
}

#[test]
fn console_and_context_log_write_script_events() {
    let sink = Arc::new(MemoryLogSink::new());
    let logger: Arc<dyn LogSink> = sink.clone();
    let context = ExecutionContext::builder(Arc::new(RecordingHttpClient::default()))
        .with_logger(logger)
        .build();
    engine()
        .execute(
            &Deadline::none(),
            "console.log('hello', 1, { a: true }); context.log('step done', { n: 2 }); return {};",
            &Map::new(),
            &context,
        )
        .expect("run");

    let events = sink.events();
    assert_eq!(events.first().map(String::as_str), Some("sandbox.execute.started"));
    assert_eq!(events.last().map(String::as_str), Some("sandbox.execute.completed"));
    let script_logs = sink
        .entries()
        .into_iter()
        .filter(|entry| entry.get("event") == Some(&json!("script.log")))
        .collect::<Vec<_>>();
    assert_eq!(script_logs.len(), 2);
    assert_eq!(script_logs[0].get("message"), Some(&json!("hello 1 {\"a\":true}")));
    assert_eq!(script_logs[1].get("fields"), Some(&json!({"n": 2})));
}
