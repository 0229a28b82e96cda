//! Installs `console` and the `context` object into a fresh script context.

use super::marshal::{js_to_json, map_to_js};
use super::sanitize::sanitize_message;
use crate::capability::{CapabilityError, CapabilityKind, CapabilityRegistry, ExecutionContext};
use crate::shared::{Deadline, LogLevel, LogSink};
use rquickjs::function::Rest;
use rquickjs::{Ctx, Exception, Function, Object, Value};
use serde_json::Value as JsonValue;
use std::sync::Arc;

pub(crate) const CAPABILITY_ARGUMENT_ERROR: &str = "CapabilityArgumentError";
const CAPABILITY_ERROR: &str = "CapabilityError";

const CONSOLE_METHODS: &[(&str, LogLevel)] = &[
    ("log", LogLevel::Info),
    ("info", LogLevel::Info),
    ("warn", LogLevel::Warn),
    ("error", LogLevel::Error),
    ("debug", LogLevel::Debug),
];

pub fn install_console<'js>(ctx: &Ctx<'js>, logger: &Arc<dyn LogSink>) -> rquickjs::Result<()> {
    let console = Object::new(ctx.clone())?;
    for (name, level) in CONSOLE_METHODS {
        let logger = Arc::clone(logger);
        let level = *level;
        let method = *name;
        let function = Function::new(
            ctx.clone(),
            move |ctx: Ctx<'js>, args: Rest<Value<'js>>| -> rquickjs::Result<()> {
                let message = render_log_args(&ctx, args.0)?;
                logger.log(
                    level,
                    "script.log",
                    &message,
                    &[("source", JsonValue::String(format!("console.{method}")))],
                );
                Ok(())
            },
        )?;
        console.set(*name, function)?;
    }
    ctx.globals().set("console", console)?;
    Ok(())
}

/// Builds the object passed to scripts as both `context` and `ctx`.
pub fn build_context_object<'js>(
    ctx: &Ctx<'js>,
    deadline: &Deadline,
    execution: &ExecutionContext,
) -> rquickjs::Result<Object<'js>> {
    let object = Object::new(ctx.clone())?;
    let registry = execution.capabilities().clone();
    for (kind, binding) in registry.iter() {
        let namespace = Object::new(ctx.clone())?;
        for method in binding.methods() {
            let function = capability_function(ctx, registry.clone(), *kind, method, deadline.clone())?;
            namespace.set(*method, function)?;
        }
        object.set(kind.namespace(), namespace)?;
    }

    object.set("credentials", map_to_js(ctx, execution.credentials())?)?;

    let logger = Arc::clone(execution.logger());
    let log = Function::new(
        ctx.clone(),
        move |ctx: Ctx<'js>, args: Rest<Value<'js>>| -> rquickjs::Result<()> {
            let mut args = args.0.into_iter();
            let message = match args.next() {
                Some(value) => render_log_args(&ctx, vec![value])?,
                None => String::new(),
            };
            let fields = match args.next() {
                Some(value) => js_to_json(&ctx, value)?,
                None => JsonValue::Null,
            };
            logger.log(
                LogLevel::Info,
                "script.log",
                &message,
                &[
                    ("source", JsonValue::String("context.log".to_string())),
                    ("fields", fields),
                ],
            );
            Ok(())
        },
    )?;
    object.set("log", log)?;
    Ok(object)
}

fn capability_function<'js>(
    ctx: &Ctx<'js>,
    registry: CapabilityRegistry,
    kind: CapabilityKind,
    method: &'static str,
    deadline: Deadline,
) -> rquickjs::Result<Function<'js>> {
    Function::new(
        ctx.clone(),
        move |ctx: Ctx<'js>, args: Rest<Value<'js>>| -> rquickjs::Result<Value<'js>> {
            let mut values = Vec::with_capacity(args.0.len());
            for arg in args.0 {
                values.push(js_to_json(&ctx, arg)?);
            }
            match registry.invoke(kind, &deadline, method, values) {
                Ok(result) => super::marshal::json_to_js(&ctx, &result),
                Err(err) => Err(throw_capability_error(&ctx, &err)),
            }
        },
    )
}

fn throw_capability_error<'js>(ctx: &Ctx<'js>, err: &CapabilityError) -> rquickjs::Error {
    let name = match err {
        CapabilityError::Argument { .. } => CAPABILITY_ARGUMENT_ERROR,
        _ => CAPABILITY_ERROR,
    };
    let message = sanitize_message(&err.to_string());
    let exception = match Exception::from_message(ctx.clone(), &message) {
        Ok(exception) => exception,
        Err(err) => return err,
    };
    if let Err(err) = exception.set("name", name) {
        return err;
    }
    ctx.throw(exception.into_object().into_value())
}

fn render_log_args<'js>(ctx: &Ctx<'js>, args: Vec<Value<'js>>) -> rquickjs::Result<String> {
    let mut parts = Vec::with_capacity(args.len());
    for arg in args {
        if arg.is_undefined() {
            parts.push("undefined".to_string());
            continue;
        }
        match js_to_json(ctx, arg)? {
            JsonValue::String(text) => parts.push(text),
            other => parts.push(other.to_string()),
        }
    }
    Ok(parts.join(" "))
}
