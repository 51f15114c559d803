//! Tool execution with retries, backoff, and progress events
//! (`tool_start`, `tool_retry`, `tool_complete`/`tool_failed`). An agent
//! runs `1 + max_retries` attempts total, sleeping `retry_delay_secs`
//! between them, and bails early if the shared stop flag is set.
//!
//! `tool_retry` fires once per failed attempt, including the last one that
//! triggers the final `tool_failed` — `examples/original_source/proteus/src/
//! agent/react_agent.py`'s retry loop emits its retry log/event from the
//! `except` branch of every attempt, not just the ones before a following
//! retry, so `max_retries + 1` failures produce `max_retries + 1` events.

use serde_json::Value;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::error::ToolError;
use crate::stream::{StreamBus, StreamEvent};
use crate::tools::Tool;

/// Runs `tool` against `args`, retrying on failure per its descriptor and
/// reporting progress on `stream` under `chat_id`.
pub async fn execute_tool(
    tool: &dyn Tool,
    args: Value,
    chat_id: &str,
    stream: &dyn StreamBus,
    stop_flag: &AtomicBool,
) -> Result<Value, ToolError> {
    let descriptor = tool.descriptor();
    let attempts = 1 + descriptor.max_retries;

    stream.emit(
        chat_id,
        StreamEvent::new("tool_start", serde_json::json!({ "tool": descriptor.name })),
    );

    let mut last_error = None;
    for attempt in 0..attempts {
        if stop_flag.load(Ordering::SeqCst) {
            return Err(ToolError::ExecutionFailed {
                tool: descriptor.name.clone(),
                attempts: attempt,
                message: "stopped before completion".to_string(),
            });
        }

        match tool.invoke(args.clone()).await {
            Ok(result) => {
                stream.emit(
                    chat_id,
                    StreamEvent::new(
                        "tool_complete",
                        serde_json::json!({ "tool": descriptor.name }),
                    ),
                );
                return Ok(result);
            }
            Err(err) => {
                let message = err.to_string();
                stream.emit(
                    chat_id,
                    StreamEvent::new(
                        "tool_retry",
                        serde_json::json!({
                            "tool": descriptor.name,
                            "attempt": attempt,
                            "max_retries": descriptor.max_retries,
                            "error": message,
                        }),
                    ),
                );
                last_error = Some(message);
                if attempt + 1 < attempts {
                    tokio::time::sleep(Duration::from_secs_f64(descriptor.retry_delay_secs)).await;
                }
            }
        }
    }

    let message = last_error.unwrap_or_else(|| "unknown error".to_string());
    stream.emit(
        chat_id,
        StreamEvent::new(
            "tool_failed",
            serde_json::json!({ "tool": descriptor.name, "message": message }),
        ),
    );
    Err(ToolError::ExecutionFailed {
        tool: descriptor.name.clone(),
        attempts,
        message,
    })
}
