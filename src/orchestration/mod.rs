//! Runs one block: pre-process scripts, then the declarative request or the
//! inline script, then post-process scripts.

pub mod error;

pub use error::{BlockExecutionError, BlockStage};

use crate::capability::ExecutionContext;
use crate::config::SandboxSettings;
use crate::declarative::{execute_declarative, BlockDefinition};
use crate::sandbox::{SandboxError, ScriptEngine};
use crate::shared::{Deadline, LogLevel};
use crate::template::DeclarativeContext;
use serde_json::{Map, Value};
use std::time::Instant;

const DATA_KEY: &str = "data";

#[derive(Debug, Clone, Default)]
pub struct BlockRunner {
    engine: ScriptEngine,
}

impl BlockRunner {
    pub fn new(engine: ScriptEngine) -> Self {
        Self { engine }
    }

    pub fn from_settings(settings: SandboxSettings) -> Self {
        Self::new(ScriptEngine::new(settings))
    }

    pub fn engine(&self) -> &ScriptEngine {
        &self.engine
    }

    pub fn execute_with_declarative(
        &self,
        deadline: &Deadline,
        block: &BlockDefinition,
        config: &Map<String, Value>,
        input: &Map<String, Value>,
        context: &ExecutionContext,
    ) -> Result<Map<String, Value>, BlockExecutionError> {
        let working = self.run_chain(
            deadline,
            BlockStage::PreProcess,
            &block.pre_process_chain,
            input.clone(),
            config,
            context,
        )?;

        let output = if let Some(request) = &block.request {
            let started = Instant::now();
            let declarative = DeclarativeContext::new(
                config.clone(),
                working,
                context.credentials().clone(),
            );
            let result = execute_declarative(
                deadline,
                request,
                block.response.as_ref(),
                &declarative,
                context.http().as_ref(),
            )
            .map_err(|source| BlockExecutionError::Request { source });
            log_stage(context, BlockStage::Request, started, result.as_ref().err());
            result?
        } else if let Some(code) = block.inline_code() {
            let started = Instant::now();
            let result = self
                .engine
                .execute(deadline, code, &working, context)
                .map_err(|source| BlockExecutionError::Code { source });
            log_stage(context, BlockStage::Code, started, result.as_ref().err());
            result?
        } else {
            working
        };

        self.run_chain(
            deadline,
            BlockStage::PostProcess,
            &block.post_process_chain,
            output,
            config,
            context,
        )
    }

    fn run_chain(
        &self,
        deadline: &Deadline,
        stage: BlockStage,
        scripts: &[String],
        data: Map<String, Value>,
        config: &Map<String, Value>,
        context: &ExecutionContext,
    ) -> Result<Map<String, Value>, BlockExecutionError> {
        if scripts.is_empty() {
            return Ok(data);
        }
        let started = Instant::now();
        let mut current = data;
        for (index, script) in scripts.iter().enumerate() {
            let mut chain_input = Map::new();
            chain_input.insert(DATA_KEY.to_string(), Value::Object(current));
            chain_input.insert("config".to_string(), Value::Object(config.clone()));

            match self.engine.execute(deadline, script, &chain_input, context) {
                Ok(result) => current = unwrap_chain_data(result),
                Err(source) => {
                    let err = chain_error(stage, index, source);
                    log_stage(context, stage, started, Some(&err));
                    return Err(err);
                }
            }
        }
        log_stage(context, stage, started, None);
        Ok(current)
    }
}

/// A chain result's `data` object replaces the working value; anything else
/// is taken whole.
fn unwrap_chain_data(mut result: Map<String, Value>) -> Map<String, Value> {
    match result.remove(DATA_KEY) {
        Some(Value::Object(data)) => data,
        Some(other) => Map::from_iter([("result".to_string(), other)]),
        None => result,
    }
}

fn chain_error(stage: BlockStage, index: usize, source: SandboxError) -> BlockExecutionError {
    match stage {
        BlockStage::PostProcess => BlockExecutionError::PostProcess { index, source },
        _ => BlockExecutionError::PreProcess { index, source },
    }
}

fn log_stage(
    context: &ExecutionContext,
    stage: BlockStage,
    started: Instant,
    error: Option<&BlockExecutionError>,
) {
    let duration_ms = Value::from(started.elapsed().as_millis() as u64);
    match error {
        None => context.logger().log(
            LogLevel::Info,
            "block.stage.completed",
            &format!("{stage} stage completed"),
            &[
                ("stage", Value::from(stage.as_str())),
                ("duration_ms", duration_ms),
            ],
        ),
        Some(err) => context.logger().log(
            LogLevel::Error,
            "block.stage.failed",
            &err.to_string(),
            &[
                ("stage", Value::from(stage.as_str())),
                ("duration_ms", duration_ms),
                ("timeout", Value::from(err.is_timeout())),
            ],
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn chain_data_key_replaces_working_value() {
        let result = json!({"data": {"n": 2}, "extra": true})
            .as_object()
            .cloned()
            .unwrap_or_default();
        assert_eq!(Value::Object(unwrap_chain_data(result)), json!({"n": 2}));
    }

    #[test]
    fn chain_result_without_data_is_taken_whole() {
        let result = json!({"n": 3}).as_object().cloned().unwrap_or_default();
        assert_eq!(Value::Object(unwrap_chain_data(result)), json!({"n": 3}));
    }

    #[test]
    fn non_object_data_is_wrapped_as_result() {
        let result = json!({"data": [1, 2]}).as_object().cloned().unwrap_or_default();
        assert_eq!(
            Value::Object(unwrap_chain_data(result)),
            json!({"result": [1, 2]})
        );
    }

    #[test]
    fn stage_errors_carry_their_tag() {
        let err = BlockExecutionError::PreProcess {
            index: 0,
            source: SandboxError::InvalidCode,
        };
        assert!(err.to_string().starts_with("preProcess failed: "));
        assert_eq!(err.stage(), BlockStage::PreProcess);
        let err = BlockExecutionError::PostProcess {
            index: 1,
            source: SandboxError::Timeout { elapsed_ms: 10 },
        };
        assert!(err.to_string().starts_with("postProcess failed: "));
        assert!(err.is_timeout());
    }
}
