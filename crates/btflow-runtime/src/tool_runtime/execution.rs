//! Argument dispatch, retry, and observation formatting for tool calls.
//!
//! Grounded in `btflow/tools/execution.py`'s `_merge_args`/`get_call_mode` and
//! `btflow/nodes/builtin/agent_tools.py`'s `ToolExecutor` (the source of the
//! `max_retries`/`retry_backoff` field names and the linear-backoff formula, since
//! the distilled spec names these generically). The "single-arg vs kwargs" call
//! mode the original determines by inspecting the callable's signature becomes a
//! static property of the tool's declared input schema here — Rust closures carry
//! no inspectable parameter list (REDESIGN FLAGS).

use std::collections::HashMap;
use std::time::Instant;

use btflow_core::{Tool, ToolError, ToolRun, ToolSchema, Value};

use crate::config::{ObservationFormat, ToolRuntimeConfig};
use crate::trace;

#[derive(Debug, Clone)]
pub struct Observation {
    pub tool: String,
    pub ok: bool,
    pub output: Option<Value>,
    pub error: Option<String>,
}

impl Observation {
    pub fn render(&self, format: ObservationFormat) -> String {
        match format {
            ObservationFormat::Json => serde_json::to_string(&self.as_json()).unwrap_or_default(),
            ObservationFormat::Text => match (&self.output, &self.error) {
                (Some(output), _) => format!("[{}] ok: {}", self.tool, output.0),
                (None, Some(error)) => format!("[{}] error: {error}", self.tool),
                (None, None) => format!("[{}] error: unknown", self.tool),
            },
        }
    }

    fn as_json(&self) -> serde_json::Value {
        let mut map = serde_json::Map::new();
        map.insert("tool".to_string(), serde_json::Value::String(self.tool.clone()));
        map.insert("ok".to_string(), serde_json::Value::Bool(self.ok));
        if let Some(output) = &self.output {
            map.insert("output".to_string(), output.0.clone());
        }
        if let Some(error) = &self.error {
            map.insert("error".to_string(), serde_json::Value::String(error.clone()));
        }
        serde_json::Value::Object(map)
    }
}

/// Merges `injected` runtime context into `args` per `prefer_injected`. Object-
/// shaped tools accept a merged mapping; single-arg tools can't accept injected
/// keys at all, so injection is skipped with a warning rather than attempted.
pub fn merge_args(
    args: Value,
    injected: Option<HashMap<String, Value>>,
    schema: &ToolSchema,
    prefer_injected: bool,
) -> Value {
    let Some(injected) = injected else { return args };
    if injected.is_empty() {
        return args;
    }

    if !schema.is_object_shaped() {
        tracing::warn!(tool_schema = %schema.0, "skipping injected context: tool's input schema is not object-shaped");
        return args;
    }

    let mut map = match args.clone().into_json() {
        serde_json::Value::Object(map) => map,
        serde_json::Value::Null => serde_json::Map::new(),
        other => {
            let mut m = serde_json::Map::new();
            m.insert("input".to_string(), other);
            m
        }
    };

    for (key, value) in injected {
        if prefer_injected || !map.contains_key(&key) {
            map.insert(key, value.into_json());
        }
    }

    Value(serde_json::Value::Object(map))
}

fn call_mode(run: &ToolRun) -> &'static str {
    match run {
        ToolRun::Sync(_) => "sync",
        ToolRun::Async(_) => "async",
    }
}

/// Runs `tool` to completion, retrying transient failures up to
/// `config.max_retries` times with linear backoff, and emits `tool_call`/
/// `tool_result` trace events around each attempt. `node` identifies the calling
/// BT leaf and is carried on every emitted event, matching the original's
/// `"node": self.name` field (`btflow/nodes/builtin/agent_tools.py`).
pub async fn execute_tool(
    node: &str,
    tool: &dyn Tool,
    args: Value,
    injected: Option<HashMap<String, Value>>,
    config: &ToolRuntimeConfig,
) -> Observation {
    let merged = merge_args(args, injected, tool.input_schema(), config.prefer_injected);
    let run = tool.run();
    let mode = call_mode(&run);

    let mut attempt: u32 = 0;
    loop {
        attempt += 1;
        trace::emit(
            "tool_call",
            serde_json::json!({
                "node": node, "tool": tool.name(), "mode": mode, "attempt": attempt, "args": merged.0
            }),
        );

        let start = Instant::now();
        let result = run_once(run.clone(), merged.clone()).await;
        let duration_ms = start.elapsed().as_secs_f64() * 1000.0;

        match result {
            Ok(output) => {
                trace::emit(
                    "tool_result",
                    serde_json::json!({
                        "node": node, "tool": tool.name(), "mode": mode, "ok": true,
                        "result": output.0, "duration_ms": duration_ms
                    }),
                );
                return Observation { tool: tool.name().to_string(), ok: true, output: Some(output), error: None };
            }
            Err(err) => {
                if err.retryable() && attempt <= config.max_retries {
                    tokio::time::sleep(config.retry_backoff * attempt).await;
                    continue;
                }
                trace::emit(
                    "tool_result",
                    serde_json::json!({
                        "node": node, "tool": tool.name(), "mode": mode, "ok": false,
                        "error": err.to_string(), "duration_ms": duration_ms
                    }),
                );
                return Observation { tool: tool.name().to_string(), ok: false, output: None, error: Some(err.to_string()) };
            }
        }
    }
}

async fn run_once(run: ToolRun, args: Value) -> Result<Value, ToolError> {
    match run {
        ToolRun::Sync(f) => {
            tokio::task::spawn_blocking(move || f(args))
                .await
                .unwrap_or_else(|e| Err(ToolError::Failed(format!("tool panicked: {e}"))))
        }
        ToolRun::Async(f) => f(args).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    struct AddTool;
    impl Tool for AddTool {
        fn name(&self) -> &str {
            "add"
        }
        fn description(&self) -> &str {
            "adds a and b"
        }
        fn input_schema(&self) -> &ToolSchema {
            static SCHEMA: std::sync::OnceLock<ToolSchema> = std::sync::OnceLock::new();
            SCHEMA.get_or_init(|| {
                ToolSchema(serde_json::json!({"type": "object", "properties": {"a": {}, "b": {}}}))
            })
        }
        fn output_schema(&self) -> &ToolSchema {
            static SCHEMA: std::sync::OnceLock<ToolSchema> = std::sync::OnceLock::new();
            SCHEMA.get_or_init(ToolSchema::string)
        }
        fn run(&self) -> ToolRun {
            ToolRun::Sync(Arc::new(|args| {
                let a = args.0.get("a").and_then(|v| v.as_i64()).unwrap_or(0);
                let b = args.0.get("b").and_then(|v| v.as_i64()).unwrap_or(0);
                Ok(Value::from(a + b))
            }))
        }
    }

    struct FlakyTool {
        remaining_failures: std::sync::Arc<std::sync::atomic::AtomicU32>,
    }
    impl Tool for FlakyTool {
        fn name(&self) -> &str {
            "flaky"
        }
        fn description(&self) -> &str {
            "fails a fixed number of times then succeeds"
        }
        fn input_schema(&self) -> &ToolSchema {
            static SCHEMA: std::sync::OnceLock<ToolSchema> = std::sync::OnceLock::new();
            SCHEMA.get_or_init(ToolSchema::string)
        }
        fn output_schema(&self) -> &ToolSchema {
            self.input_schema()
        }
        fn run(&self) -> ToolRun {
            let remaining = self.remaining_failures.clone();
            ToolRun::Sync(Arc::new(move |value| {
                use std::sync::atomic::Ordering;
                if remaining.load(Ordering::SeqCst) > 0 {
                    remaining.fetch_sub(1, Ordering::SeqCst);
                    return Err(ToolError::Transient("not yet".to_string()));
                }
                Ok(value)
            }))
        }
    }

    #[tokio::test]
    async fn merges_injected_context_into_object_args() {
        let config = ToolRuntimeConfig::default();
        let observation = execute_tool(
            "agent-node",
            &AddTool,
            Value::from(serde_json::json!({"a": 1})),
            Some(HashMap::from([("b".to_string(), Value::from(2_i64))])),
            &config,
        )
        .await;
        assert!(observation.ok);
        assert_eq!(observation.output.unwrap().as_i64(), Some(3));
    }

    #[tokio::test]
    async fn retries_transient_failures_then_succeeds() {
        let mut config = ToolRuntimeConfig::default();
        config.max_retries = 2;
        config.retry_backoff = std::time::Duration::from_millis(1);
        let tool = FlakyTool { remaining_failures: std::sync::Arc::new(std::sync::atomic::AtomicU32::new(2)) };
        let observation = execute_tool("agent-node", &tool, Value::from("hi"), None, &config).await;
        assert!(observation.ok);
    }

    #[tokio::test]
    async fn exhausts_retries_and_reports_failure() {
        let mut config = ToolRuntimeConfig::default();
        config.max_retries = 1;
        config.retry_backoff = std::time::Duration::from_millis(1);
        let tool = FlakyTool { remaining_failures: std::sync::Arc::new(std::sync::atomic::AtomicU32::new(5)) };
        let observation = execute_tool("agent-node", &tool, Value::from("hi"), None, &config).await;
        assert!(!observation.ok);
    }
}
