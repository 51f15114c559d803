//! A small CLI that boots a team from a YAML config, seeds one task, and
//! prints whatever comes back on the stream bus. `anyhow` is used here, at
//! the process boundary; library code uses `thiserror` throughout (see
//! `agentmesh::error`).

use std::env;
use std::fs;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};

use agentmesh::kvs::memory_kvs::InMemoryKvs;
use agentmesh::kvs::redis_kvs::RedisKvs;
use agentmesh::model::stub::StubModelClient;
use agentmesh::model::ModelClient;
use agentmesh::stream::memory_bus::InMemoryStreamBus;
use agentmesh::stream::StreamBus;
use agentmesh::{Kvs, TeamConfig, TeamOrchestrator};

#[tokio::main]
async fn main() -> Result<()> {
    agentmesh::logging::init_tracing(env::var("AGENTMESH_VERBOSE").is_ok());

    let mut args = env::args().skip(1);
    let config_path = args
        .next()
        .context("usage: agentmesh-cli <team.yaml> <target-role> <query>")?;
    let target_role = args
        .next()
        .context("usage: agentmesh-cli <team.yaml> <target-role> <query>")?;
    let query = args.collect::<Vec<_>>().join(" ");

    let yaml = fs::read_to_string(&config_path)
        .with_context(|| format!("failed to read team config at {config_path}"))?;
    let config = TeamConfig::from_yaml(&yaml).context("failed to parse team config")?;

    let kvs: Arc<dyn Kvs> = match env::var("AGENTMESH_REDIS_URL") {
        Ok(url) => Arc::new(
            RedisKvs::connect(&url)
                .await
                .with_context(|| format!("failed to connect to redis at {url}"))?,
        ),
        Err(_) => {
            tracing::info!("AGENTMESH_REDIS_URL not set, using in-memory KVS");
            Arc::new(InMemoryKvs::new())
        }
    };

    // No real provider client ships in this crate (spec's Non-goals exclude
    // provider HTTP clients) — the stub always answers with the query
    // echoed back as a `final_answer` call, enough to exercise the loop
    // end to end without a live model.
    let model: Arc<dyn ModelClient> = Arc::new(StubModelClient::new(vec![format!(
        r#"{{"thinking": "done", "tool": {{"name": "final_answer", "params": {{"answer": "{query}"}}}}}}"#
    )]));
    let stream: Arc<dyn StreamBus> = Arc::new(InMemoryStreamBus::new());

    let orchestrator = TeamOrchestrator::new(config, kvs.clone(), model, stream.clone());
    let listeners = orchestrator
        .build_agents()
        .await
        .context("failed to build team agents")?;

    tracing::info!(agents = listeners.len(), "team built, starting listeners");
    let handles = TeamOrchestrator::spawn_all(listeners);

    orchestrator
        .seed_task(&target_role, serde_json::json!({ "query": query }))
        .await
        .context("failed to seed initial task")?;

    tokio::time::sleep(Duration::from_secs(2)).await;
    for handle in handles {
        handle.abort();
    }

    Ok(())
}
