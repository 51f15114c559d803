//! # agentmesh
//!
//! Core runtime for a multi-agent orchestration mesh: a bounded ReAct agent
//! loop, role-addressed message queues over a KVS, a model-response parser
//! cascade, and the declarative team configuration that ties them together.

pub mod agent;
pub mod config;
pub mod error;
pub mod kvs;
pub mod logging;
pub mod messaging;
pub mod model;
pub mod parser;
pub mod playbook;
pub mod rpm;
pub mod stream;
pub mod team;
pub mod termination;
pub mod tools;
pub mod utilities;

pub use agent::core::{AgentConfig, AgentCore, AgentFinish};
pub use agent::listener::AgentEventListener;
pub use agent::{AgentCard, Role};
pub use config::{RoleConfig, TeamConfig};
pub use error::AgentMeshError;
pub use kvs::Kvs;
pub use model::ModelClient;
pub use team::TeamOrchestrator;

pub const VERSION: &str = "0.1.0";
