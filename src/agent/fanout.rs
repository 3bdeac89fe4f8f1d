//! Fan-out scheduler.
//!
//! Runs every agent's query unit and gathers the results. Agents fail in
//! isolation: a failing agent contributes an empty list and an `error`
//! progress event, and the rest of the pass carries on.

use super::query::Collector;
use crate::models::{Agent, AgentProgress, IntelItem, IntelMap};
use futures::future::join_all;
use std::time::Duration;
use tracing::{debug, info, warn};

/// How agents are admitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FanoutPolicy {
    /// Every agent at once.
    Concurrent,
    /// Fixed-size groups run one after another, with a pause in between.
    Batched { size: usize, pause: Duration },
}

impl Default for FanoutPolicy {
    fn default() -> Self {
        FanoutPolicy::Batched {
            size: 2,
            pause: Duration::from_millis(1000),
        }
    }
}

async fn run_agent<F>(collector: &Collector<'_>, agent: &Agent, on_progress: &F) -> Vec<IntelItem>
where
    F: Fn(AgentProgress) + Sync,
{
    on_progress(AgentProgress::running(&agent.id));

    match collector.collect(agent).await {
        Ok(items) => {
            debug!("Agent {} collected {} items", agent.id, items.len());
            on_progress(AgentProgress::done(&agent.id, items.len()));
            items
        }
        Err(e) => {
            warn!("Agent {} failed: {}", agent.id, e);
            on_progress(AgentProgress::error(&agent.id, &e.to_string()));
            Vec::new()
        }
    }
}

/// Run all agents under `policy` and return their items by agent id.
///
/// The map holds an entry for every agent, empty for failed ones.
pub async fn collect_all<F>(
    collector: &Collector<'_>,
    agents: &[Agent],
    policy: FanoutPolicy,
    on_progress: F,
) -> IntelMap
where
    F: Fn(AgentProgress) + Sync,
{
    let mut results = IntelMap::new();

    match policy {
        FanoutPolicy::Concurrent => {
            info!("Launching {} agents concurrently", agents.len());
            let outcomes =
                join_all(agents.iter().map(|a| run_agent(collector, a, &on_progress))).await;
            for (agent, items) in agents.iter().zip(outcomes) {
                results.insert(agent.id.clone(), items);
            }
        }
        FanoutPolicy::Batched { size, pause } => {
            let size = size.max(1);
            let batch_count = agents.len().div_ceil(size);
            info!(
                "Launching {} agents in {} batches of {}",
                agents.len(),
                batch_count,
                size
            );

            for (index, batch) in agents.chunks(size).enumerate() {
                let outcomes =
                    join_all(batch.iter().map(|a| run_agent(collector, a, &on_progress))).await;
                for (agent, items) in batch.iter().zip(outcomes) {
                    results.insert(agent.id.clone(), items);
                }

                if index + 1 < batch_count && !pause.is_zero() {
                    tokio::time::sleep(pause).await;
                }
            }
        }
    }

    results
}
