//! Termination conditions for an agent's ReAct loop.
//!
//! Grounded directly on `proteus/src/agent/terminition.py`, which defines
//! exactly these five primitive conditions plus an `any`/`all` composite.
//! Config deserializes the same internally-tagged shape the Python
//! `team_manager.py` emits (`{"type": "ToolTerminationCondition", ...}`) —
//! see [`crate::config`].

use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Instant;

use serde::Deserialize;

/// What [`TerminationCondition::should_terminate`] is evaluated against.
pub struct TerminationContext<'a> {
    pub iteration: u32,
    pub tool_name: Option<&'a str>,
    pub final_answer: Option<&'a str>,
    pub thought: Option<&'a str>,
    pub observation: Option<&'a str>,
    pub started_at: Instant,
    /// Set to `true` by the caller the moment a tool invocation errors, so
    /// `ErrorCount` can be fed without the condition itself touching
    /// execution internals.
    pub tool_errored: bool,
}

/// Which text field a [`TerminationCondition::TextMatch`] condition inspects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TextMatchMode {
    FinalAnswer,
    Thought,
    Observation,
}

/// How a [`TerminationCondition::Composite`] combines its children.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompositeMode {
    Any,
    All,
}

/// A single termination rule, or a boolean combination of rules.
///
/// `#[serde(tag = "type")]` matches the Python config's discriminated-union
/// shape so `TeamConfig` YAML can list these verbatim.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type")]
pub enum TerminationCondition {
    StepLimit { max_steps: u32 },
    ToolName { tool_names: Vec<String> },
    TextMatch { mode: TextMatchMode, pattern: String },
    Timeout { seconds: u64 },
    /// Stateful: terminates once `tool_errored` has been observed
    /// `max_errors` times across the agent's lifetime. The counter lives
    /// alongside the condition via [`ErrorCounter`], since
    /// `TerminationCondition` itself derives `Deserialize` and must stay a
    /// plain value type.
    ErrorCount { max_errors: u32 },
    Composite {
        mode: CompositeMode,
        conditions: Vec<TerminationCondition>,
    },
}

/// Out-of-band counter for [`TerminationCondition::ErrorCount`]. A
/// `TerminationCondition` tree is loaded once from config and shared
/// read-only across iterations, so the mutable error tally lives here
/// instead, keyed by position via a single shared counter per agent (the
/// spec doesn't support more than one `ErrorCount` condition per agent).
#[derive(Default)]
pub struct ErrorCounter(AtomicU32);

impl ErrorCounter {
    pub fn new() -> Self {
        ErrorCounter(AtomicU32::new(0))
    }

    pub fn record_error(&self) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }

    pub fn count(&self) -> u32 {
        self.0.load(Ordering::SeqCst)
    }
}

impl TerminationCondition {
    /// Evaluates this condition (recursively, for `Composite`) against
    /// `ctx`. `errors` supplies the live error tally for `ErrorCount`.
    pub fn should_terminate(&self, ctx: &TerminationContext, errors: &ErrorCounter) -> bool {
        match self {
            TerminationCondition::StepLimit { max_steps } => ctx.iteration >= *max_steps,
            TerminationCondition::ToolName { tool_names } => ctx
                .tool_name
                .map(|name| tool_names.iter().any(|n| n == name))
                .unwrap_or(false),
            TerminationCondition::TextMatch { mode, pattern } => {
                let haystack = match mode {
                    TextMatchMode::FinalAnswer => ctx.final_answer,
                    TextMatchMode::Thought => ctx.thought,
                    TextMatchMode::Observation => ctx.observation,
                };
                haystack
                    .map(|text| text.contains(pattern.as_str()))
                    .unwrap_or(false)
            }
            TerminationCondition::Timeout { seconds } => {
                ctx.started_at.elapsed().as_secs() >= *seconds
            }
            TerminationCondition::ErrorCount { max_errors } => {
                if ctx.tool_errored {
                    errors.record_error();
                }
                errors.count() >= *max_errors
            }
            TerminationCondition::Composite { mode, conditions } => match mode {
                CompositeMode::Any => conditions
                    .iter()
                    .any(|c| c.should_terminate(ctx, errors)),
                CompositeMode::All => conditions
                    .iter()
                    .all(|c| c.should_terminate(ctx, errors)),
            },
        }
    }
}
