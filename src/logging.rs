//! Structured logging initialization.
//!
//! The teacher's own console logger ([`crate::utilities::logger::Logger`])
//! stays in place for human-facing CLI output, but the runtime's internal
//! spans and events — one per ReAct iteration, one per tool call — go
//! through `tracing`, matching the teacher's `bin/server.rs` setup of
//! `tracing_subscriber` with an `EnvFilter`. `#[tracing::instrument]` spans
//! on `AgentCore::run_iteration` and `tools::execution::execute_tool`, with
//! fields recorded per-call (`chat_id`, `tool`, `role`), stand in for
//! spec.md's "Tracing Wrapper" concept of dynamically named,
//! template-interpolated spans — `tracing`'s `field::Empty` plus
//! `Span::record` covers that without needing a bespoke templating layer.

use tracing_subscriber::{fmt, EnvFilter};

/// Initializes the global `tracing` subscriber. `RUST_LOG` (or `verbose`,
/// when no `RUST_LOG` is set) controls the level; call once, from `main` or
/// from test setup.
pub fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("agentmesh={default_level}")));

    let _ = fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}
