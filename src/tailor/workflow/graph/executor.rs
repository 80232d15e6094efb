// SPDX-License-Identifier: MIT

//! Graph executor

use crate::adk::error::{GraphError, TailorError};
use crate::tailor::workflow::stage::{Stage, StageOutput};
use crate::tailor::workflow::state::PipelineState;
use crate::tailor::workflow::types::StageName;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;

use super::builder::Edge;

/// Safety limit on stage executions per run
pub const MAX_STEPS: u32 = 100;

/// Compiled node ready for execution
pub struct CompiledNode {
    pub stage: Arc<dyn Stage>,
    pub edge: Edge,
}

/// Result of one graph invocation
#[derive(Debug, Clone)]
pub struct GraphRun {
    pub state: PipelineState,
    /// Stages in execution order
    pub path: Vec<StageName>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl GraphRun {
    pub fn visited(&self, stage: StageName) -> bool {
        self.path.contains(&stage)
    }

    pub fn elapsed(&self) -> chrono::Duration {
        self.finished_at - self.started_at
    }
}

/// Validated, immutable graph
pub struct CompiledGraph {
    name: String,
    entry: StageName,
    nodes: HashMap<StageName, CompiledNode>,
    order: Vec<StageName>,
}

impl CompiledGraph {
    pub(super) fn new(
        name: String,
        entry: StageName,
        nodes: HashMap<StageName, CompiledNode>,
        order: Vec<StageName>,
    ) -> Self {
        Self {
            name,
            entry,
            nodes,
            order,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn entry(&self) -> StageName {
        self.entry
    }

    /// Stage names in registration order
    pub fn stage_names(&self) -> &[StageName] {
        &self.order
    }

    pub fn contains(&self, stage: StageName) -> bool {
        self.nodes.contains_key(&stage)
    }

    /// Run the graph from the entry stage until the terminal stage completes
    ///
    /// Stage failures never end up here; they are merged into the state's
    /// error accumulator and routing decides what happens next.
    pub async fn invoke(&self, mut state: PipelineState) -> Result<GraphRun, TailorError> {
        let started_at = Utc::now();
        let mut path = Vec::new();
        let mut current = self.entry;

        log::info!("[{}] Starting run {}", self.name, state.run_id);

        loop {
            if path.len() as u32 >= MAX_STEPS {
                log::error!("[{}] Graph execution exceeded max steps", self.name);
                return Err(TailorError::MaxIterations {
                    kind: "graph steps".to_string(),
                    limit: MAX_STEPS,
                });
            }

            let node = self
                .nodes
                .get(&current)
                .ok_or_else(|| GraphError::UnknownStage(current.to_string()))?;

            state.current_stage = Some(current);
            log::info!("[{}] Executing stage: {}", self.name, current.label());

            let output = node.stage.run(&state).await;
            merge_output(node.stage.as_ref(), output, &mut state);
            path.push(current);

            current = match &node.edge {
                Edge::End => break,
                Edge::Always(next) => *next,
                Edge::Conditional { router, branches } => {
                    let route = router.decide(&state);
                    log::debug!("[{}] {} chose route '{}'", self.name, router.name(), route);
                    *branches
                        .get(&route)
                        .ok_or_else(|| GraphError::UnmappedRoute {
                            stage: current.to_string(),
                            route: route.to_string(),
                        })?
                }
            };
        }

        let finished_at = Utc::now();
        log::info!(
            "[{}] Finished after {} stages ({} ms)",
            self.name,
            path.len(),
            (finished_at - started_at).num_milliseconds()
        );

        Ok(GraphRun {
            state,
            path,
            started_at,
            finished_at,
        })
    }
}

/// Fold a stage's output into the state, enforcing its write contract
fn merge_output(stage: &dyn Stage, output: StageOutput, state: &mut PipelineState) {
    let StageOutput {
        mut update,
        failures,
    } = output;

    let dropped = update.retain_fields(stage.writes());
    if !dropped.is_empty() {
        let names: Vec<&str> = dropped.iter().map(|f| f.as_str()).collect();
        log::error!(
            "Stage {} wrote undeclared fields {:?}; discarding them",
            stage.name(),
            names
        );
    }

    for failure in &failures {
        log::error!("{}", failure);
    }
    if !failures.is_empty() {
        update.errors = Some(failures);
    }

    state.apply_update(update);
}
