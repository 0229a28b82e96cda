//! Sandboxed JavaScript execution.
//!
//! Every call builds a fresh QuickJS runtime, locks down the global scope,
//! installs `input`, `context`/`ctx` and `console`, then runs the script under
//! a deadline watcher. Nothing survives between calls.
//!
//! Code without a top-level `return` runs as a script and yields its last
//! expression; code with one runs as a function body. A declared `execute`
//! is called with `(input, context)` in either form.

pub mod bindings;
pub mod error;
pub mod marshal;
pub mod sanitize;
pub mod security;
pub mod watcher;

pub use error::SandboxError;
pub use sanitize::sanitize_message;
pub use watcher::{DeadlineWatcher, InterruptSignal};

use crate::capability::ExecutionContext;
use crate::config::SandboxSettings;
use crate::shared::{Deadline, LogLevel};
use bindings::{build_context_object, install_console, CAPABILITY_ARGUMENT_ERROR};
use marshal::{js_to_json, map_to_js, normalize_result};
use rquickjs::{CatchResultExt, CaughtError, Context, Ctx, Function, Runtime, Value};
use serde_json::{Map, Value as JsonValue};
use std::time::{Duration, Instant};

/// Global set by the first statement of the script form. Still unset after
/// a failure means the code did not parse as a script.
const SCRIPT_ENTERED: &str = "__sandflow_entered";

const EXECUTE_LOOKUP: &str = "typeof execute === \"function\" ? execute : undefined";

/// Function-body form `(input, context, ctx)`, used when the code only
/// parses with a top-level `return`. Also the compile check for all code.
pub fn wrap_function_body(script: &str) -> String {
    format!(
        "(function (input, context, ctx) {{\n{script}\n;if (typeof execute === \"function\") return execute(input, context);\n}})"
    )
}

/// Script form whose completion value (the last evaluated expression) is
/// the result.
pub fn script_source(script: &str) -> String {
    format!("var {SCRIPT_ENTERED} = true; {script}")
}

#[derive(Debug, Clone, Default)]
pub struct ScriptEngine {
    settings: SandboxSettings,
}

impl ScriptEngine {
    pub fn new(settings: SandboxSettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &SandboxSettings {
        &self.settings
    }

    pub fn execute(
        &self,
        deadline: &Deadline,
        script: &str,
        input: &Map<String, JsonValue>,
        context: &ExecutionContext,
    ) -> Result<Map<String, JsonValue>, SandboxError> {
        let logger = context.logger();
        if script.trim().is_empty() {
            logger.log(
                LogLevel::Warn,
                "sandbox.execute.failed",
                "script rejected before execution",
                &[("error_kind", JsonValue::from(SandboxError::InvalidCode.kind()))],
            );
            return Err(SandboxError::InvalidCode);
        }

        let started = Instant::now();
        logger.log(
            LogLevel::Info,
            "sandbox.execute.started",
            "script execution started",
            &[
                ("code_bytes", JsonValue::from(script.len())),
                ("input_keys", JsonValue::from(input.len())),
            ],
        );

        let result = self.run(deadline, script, input, context, started);
        let duration_ms = JsonValue::from(started.elapsed().as_millis() as u64);
        match &result {
            Ok(output) => logger.log(
                LogLevel::Info,
                "sandbox.execute.completed",
                "script execution completed",
                &[
                    ("duration_ms", duration_ms),
                    ("output_keys", JsonValue::from(output.len())),
                ],
            ),
            Err(err) => logger.log(
                LogLevel::Error,
                "sandbox.execute.failed",
                &err.to_string(),
                &[
                    ("duration_ms", duration_ms),
                    ("error_kind", JsonValue::from(err.kind())),
                ],
            ),
        }
        result
    }

    fn run(
        &self,
        deadline: &Deadline,
        script: &str,
        input: &Map<String, JsonValue>,
        context: &ExecutionContext,
        started: Instant,
    ) -> Result<Map<String, JsonValue>, SandboxError> {
        let budget = deadline.child(Duration::from_millis(self.settings.timeout_ms));
        let signal = InterruptSignal::new();

        let runtime = Runtime::new().map_err(runtime_error)?;
        runtime.set_memory_limit(self.settings.memory_limit_bytes);
        runtime.set_max_stack_size(self.settings.max_stack_bytes);
        let interrupt = signal.clone();
        runtime.set_interrupt_handler(Some(Box::new(move || interrupt.is_fired())));
        let js_context = Context::full(&runtime).map_err(runtime_error)?;

        let watcher = DeadlineWatcher::spawn(budget.clone(), signal).map_err(|err| {
            SandboxError::Runtime {
                message: format!("failed to start deadline watcher: {err}"),
            }
        })?;
        let outcome = js_context.with(|ctx| run_in_context(&ctx, &budget, script, input, context));
        if !watcher.finish() {
            return Err(SandboxError::timeout(started.elapsed()));
        }
        outcome
    }
}

fn run_in_context<'js>(
    ctx: &Ctx<'js>,
    deadline: &Deadline,
    script: &str,
    input: &Map<String, JsonValue>,
    context: &ExecutionContext,
) -> Result<Map<String, JsonValue>, SandboxError> {
    ctx.eval::<(), _>(security::prelude())
        .catch(ctx)
        .map_err(setup_error)?;
    install_console(ctx, context.logger())
        .catch(ctx)
        .map_err(setup_error)?;
    let context_object = build_context_object(ctx, deadline, context)
        .catch(ctx)
        .map_err(setup_error)?;
    let input_value = map_to_js(ctx, input).catch(ctx).map_err(setup_error)?;

    let body_entry: Function<'js> = ctx
        .eval(wrap_function_body(script))
        .catch(ctx)
        .map_err(|err| SandboxError::Compilation {
            message: sanitize_message(&describe(err).1),
        })?;

    let globals = ctx.globals();
    for name in ["context", "ctx"] {
        globals
            .set(name, context_object.clone())
            .catch(ctx)
            .map_err(setup_error)?;
    }
    globals
        .set("input", input_value.clone())
        .catch(ctx)
        .map_err(setup_error)?;

    let value: Value<'js> = match ctx.eval::<Value<'js>, _>(script_source(script)).catch(ctx) {
        Ok(completion) => {
            let execute: Option<Function<'js>> = ctx
                .eval(EXECUTE_LOOKUP)
                .catch(ctx)
                .map_err(execution_error)?;
            match execute {
                Some(execute) => execute
                    .call((input_value, context_object))
                    .catch(ctx)
                    .map_err(execution_error)?,
                None => completion,
            }
        }
        Err(err) if script_entered(ctx) => return Err(execution_error(err)),
        Err(_) => body_entry
            .call((input_value, context_object.clone(), context_object))
            .catch(ctx)
            .map_err(execution_error)?,
    };
    let value = match value.as_promise() {
        Some(promise) => promise
            .finish::<Value<'js>>()
            .catch(ctx)
            .map_err(execution_error)?,
        None => value,
    };
    let output = js_to_json(ctx, value).catch(ctx).map_err(execution_error)?;
    Ok(normalize_result(output))
}

fn script_entered(ctx: &Ctx<'_>) -> bool {
    ctx.globals()
        .get::<_, Option<bool>>(SCRIPT_ENTERED)
        .ok()
        .flatten()
        .unwrap_or(false)
}

/// Returns the thrown error's `name` (when it has one) and its message.
fn describe(err: CaughtError<'_>) -> (Option<String>, String) {
    match err {
        CaughtError::Exception(exception) => {
            let name = exception
                .get::<_, Option<String>>("name")
                .ok()
                .flatten()
                .filter(|name| !name.is_empty());
            let message = exception.message().unwrap_or_default();
            let text = match &name {
                Some(name) if name != "Error" => format!("{name}: {message}"),
                _ => message,
            };
            (name, text)
        }
        CaughtError::Value(value) => {
            let text = value
                .as_string()
                .and_then(|text| text.to_string().ok())
                .unwrap_or_else(|| "script threw a non-error value".to_string());
            (None, text)
        }
        CaughtError::Error(err) => (None, err.to_string()),
    }
}

fn execution_error(err: CaughtError<'_>) -> SandboxError {
    if let CaughtError::Error(inner) = &err {
        return SandboxError::Runtime {
            message: sanitize_message(&inner.to_string()),
        };
    }
    let (name, text) = describe(err);
    let message = sanitize_message(&text);
    if name.as_deref() == Some(CAPABILITY_ARGUMENT_ERROR) {
        let message = message
            .strip_prefix(&format!("{CAPABILITY_ARGUMENT_ERROR}: "))
            .map(str::to_string)
            .unwrap_or(message);
        return SandboxError::CapabilityArgument { message };
    }
    SandboxError::Execution { message }
}

fn setup_error(err: CaughtError<'_>) -> SandboxError {
    SandboxError::Runtime {
        message: sanitize_message(&describe(err).1),
    }
}

fn runtime_error(err: rquickjs::Error) -> SandboxError {
    SandboxError::Runtime {
        message: sanitize_message(&err.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn function_body_form_falls_through_to_execute() {
        let body = wrap_function_body("return 1;");
        assert!(body.starts_with("(function (input, context, ctx) {\nreturn 1;"));
        assert!(body.contains("if (typeof execute === \"function\") return execute(input, context);"));
    }

    #[test]
    fn script_form_marks_entry_on_the_first_line() {
        assert_eq!(
            script_source("input.a + 1"),
            "var __sandflow_entered = true; input.a + 1"
        );
    }
}
