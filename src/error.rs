//! Crate-wide error type: one error enum per subsystem, aggregated into a
//! single top-level error. `anyhow` is reserved for the CLI boundary only.

use thiserror::Error;

use crate::utilities::errors::KvsError;

/// Errors surfaced by the tool registry and tool execution pipeline.
#[derive(Debug, Error)]
pub enum ToolError {
    /// The parsed action named a tool that is not registered on this agent.
    #[error("tool not found: {0}")]
    NotFound(String),

    /// Construction-time error: two tools registered under the same name.
    #[error("duplicate tool name: {0}")]
    DuplicateName(String),

    /// The tool ran out of retries. Carries the final attempt's message.
    #[error("tool '{tool}' failed after {attempts} retries: {message}")]
    ExecutionFailed {
        tool: String,
        attempts: u32,
        message: String,
    },
}

/// Errors from the response parser cascade.
#[derive(Debug, Error)]
pub enum ParseError {
    /// All three stages (JSON, regex, LLM-repair) failed to produce a tool
    /// call. The loop does not treat this as fatal — see
    /// [`crate::parser::parse`], which always returns a fallback
    /// `final_answer` instead of propagating this variant to callers.
    #[error("could not parse model output: {0}")]
    Unparseable(String),
}

/// Errors from the model client boundary.
#[derive(Debug, Error)]
pub enum ModelError {
    #[error("model call timed out after {0:?}")]
    Timeout(std::time::Duration),

    #[error("model call failed: {0}")]
    Transport(String),
}

/// Top-level error type for the agent runtime.
#[derive(Debug, Error)]
pub enum AgentMeshError {
    #[error(transparent)]
    Kvs(#[from] KvsError),

    #[error(transparent)]
    Tool(#[from] ToolError),

    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Model(#[from] ModelError),

    /// Raised when an agent's ReAct loop exhausts `max_iterations` without
    /// reaching `final_answer` and without any termination condition firing.
    /// Callers must not silently swallow this.
    #[error("agent '{agent_id}' failed to get final answer after {iterations} iterations")]
    IterationBudgetExhausted { agent_id: String, iterations: u32 },

    /// The model layer raised an "action-bad" style exception; its message
    /// is adopted verbatim as the final answer.
    #[error("action bad: {0}")]
    ActionBad(String),

    #[error("configuration error: {0}")]
    Config(String),
}
