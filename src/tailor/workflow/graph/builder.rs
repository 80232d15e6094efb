// SPDX-License-Identifier: MIT

//! Graph builder - declares stages and edges, then compiles and validates them

use crate::adk::error::GraphError;
use crate::tailor::workflow::router::{Route, Router};
use crate::tailor::workflow::stage::Stage;
use crate::tailor::workflow::types::StageName;
use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::sync::Arc;

use super::executor::{CompiledGraph, CompiledNode};

/// Outgoing edge of a stage
pub enum Edge {
    /// Terminal: execution stops after this stage
    End,
    /// Unconditional successor
    Always(StageName),
    /// Router-selected successor
    Conditional {
        router: Arc<dyn Router>,
        branches: BTreeMap<Route, StageName>,
    },
}

impl Edge {
    /// Every stage this edge can lead to
    pub fn targets(&self) -> Vec<StageName> {
        match self {
            Edge::End => vec![],
            Edge::Always(next) => vec![*next],
            Edge::Conditional { branches, .. } => {
                let mut targets: Vec<StageName> = branches.values().copied().collect();
                targets.sort();
                targets.dedup();
                targets
            }
        }
    }
}

/// Mutable graph definition; call [`StateGraph::compile`] to get something runnable
pub struct StateGraph {
    name: String,
    entry: Option<StageName>,
    stages: Vec<Arc<dyn Stage>>,
    edges: Vec<(StageName, Edge)>,
}

impl StateGraph {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            entry: None,
            stages: Vec::new(),
            edges: Vec::new(),
        }
    }

    pub fn add_stage(&mut self, stage: Arc<dyn Stage>) -> &mut Self {
        self.stages.push(stage);
        self
    }

    pub fn set_entry(&mut self, name: StageName) -> &mut Self {
        self.entry = Some(name);
        self
    }

    pub fn add_edge(&mut self, from: StageName, to: StageName) -> &mut Self {
        self.edges.push((from, Edge::Always(to)));
        self
    }

    pub fn add_conditional_edges(
        &mut self,
        from: StageName,
        router: Arc<dyn Router>,
        branches: impl IntoIterator<Item = (Route, StageName)>,
    ) -> &mut Self {
        self.edges.push((
            from,
            Edge::Conditional {
                router,
                branches: branches.into_iter().collect(),
            },
        ));
        self
    }

    /// Mark `from` as the terminal stage
    pub fn set_finish(&mut self, from: StageName) -> &mut Self {
        self.edges.push((from, Edge::End));
        self
    }

    /// Validate the topology and freeze it
    pub fn compile(self) -> Result<CompiledGraph, GraphError> {
        let mut order = Vec::with_capacity(self.stages.len());
        let mut stages: HashMap<StageName, Arc<dyn Stage>> = HashMap::new();
        for stage in self.stages {
            let name = stage.name();
            if stages.insert(name, stage).is_some() {
                return Err(GraphError::DuplicateStage(name.to_string()));
            }
            order.push(name);
        }

        let entry = self
            .entry
            .ok_or_else(|| GraphError::MissingEntry(self.name.clone()))?;
        if !stages.contains_key(&entry) {
            return Err(GraphError::UnknownStage(entry.to_string()));
        }

        let mut edges: HashMap<StageName, Edge> = HashMap::new();
        for (from, edge) in self.edges {
            if !stages.contains_key(&from) {
                return Err(GraphError::UnknownStage(from.to_string()));
            }
            for target in edge.targets() {
                if !stages.contains_key(&target) {
                    return Err(GraphError::UnknownStage(target.to_string()));
                }
            }
            if let Edge::Conditional { router, branches } = &edge {
                check_routes(from, router.as_ref(), branches)?;
            }
            if edges.insert(from, edge).is_some() {
                return Err(GraphError::DuplicateEdge(from.to_string()));
            }
        }

        if let Some(missing) = order.iter().find(|name| !edges.contains_key(name)) {
            return Err(GraphError::MissingEdge(missing.to_string()));
        }

        let terminals: Vec<String> = order
            .iter()
            .filter(|name| matches!(edges.get(name), Some(Edge::End)))
            .map(|name| name.to_string())
            .collect();
        match terminals.len() {
            0 => return Err(GraphError::NoTerminal(self.name)),
            1 => {}
            _ => return Err(GraphError::MultipleTerminals(terminals)),
        }

        check_reachable(entry, &order, &edges)?;
        check_acyclic(entry, &edges)?;

        let mut nodes = HashMap::with_capacity(order.len());
        for (name, stage) in stages {
            let edge = edges
                .remove(&name)
                .ok_or_else(|| GraphError::MissingEdge(name.to_string()))?;
            nodes.insert(name, CompiledNode { stage, edge });
        }

        log::debug!(
            "Compiled graph '{}' with {} stages, entry {}",
            self.name,
            order.len(),
            entry
        );

        Ok(CompiledGraph::new(self.name, entry, nodes, order))
    }
}

/// Every declared route needs a successor and every mapped route must be declared
fn check_routes(
    from: StageName,
    router: &dyn Router,
    branches: &BTreeMap<Route, StageName>,
) -> Result<(), GraphError> {
    let declared: HashSet<Route> = router.routes().into_iter().collect();

    let mut unmapped: Vec<&Route> = declared
        .iter()
        .filter(|r| !branches.contains_key(r))
        .collect();
    unmapped.sort();
    if let Some(route) = unmapped.first() {
        return Err(GraphError::UnmappedRoute {
            stage: from.to_string(),
            route: route.to_string(),
        });
    }

    if let Some(route) = branches.keys().find(|r| !declared.contains(r)) {
        return Err(GraphError::UnknownRoute {
            stage: from.to_string(),
            route: route.to_string(),
        });
    }

    Ok(())
}

fn check_reachable(
    entry: StageName,
    order: &[StageName],
    edges: &HashMap<StageName, Edge>,
) -> Result<(), GraphError> {
    let mut seen = HashSet::from([entry]);
    let mut queue = VecDeque::from([entry]);
    while let Some(current) = queue.pop_front() {
        for next in edges.get(&current).map(Edge::targets).unwrap_or_default() {
            if seen.insert(next) {
                queue.push_back(next);
            }
        }
    }

    match order.iter().find(|name| !seen.contains(name)) {
        Some(unreachable) => Err(GraphError::Unreachable(unreachable.to_string())),
        None => Ok(()),
    }
}

/// Depth-first search for a back edge; reports the cycle path
fn check_acyclic(entry: StageName, edges: &HashMap<StageName, Edge>) -> Result<(), GraphError> {
    fn visit(
        node: StageName,
        edges: &HashMap<StageName, Edge>,
        stack: &mut Vec<StageName>,
        done: &mut HashSet<StageName>,
    ) -> Result<(), GraphError> {
        if let Some(pos) = stack.iter().position(|n| *n == node) {
            let mut cycle: Vec<String> = stack[pos..].iter().map(|n| n.to_string()).collect();
            cycle.push(node.to_string());
            return Err(GraphError::CircularDependency(cycle));
        }
        if done.contains(&node) {
            return Ok(());
        }

        stack.push(node);
        for next in edges.get(&node).map(Edge::targets).unwrap_or_default() {
            visit(next, edges, stack, done)?;
        }
        stack.pop();
        done.insert(node);
        Ok(())
    }

    visit(entry, edges, &mut Vec::new(), &mut HashSet::new())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tailor::workflow::router::{ApplyOrSkip, ContinueOrAbort};
    use crate::tailor::workflow::stage::StageOutput;
    use crate::tailor::workflow::state::{Field, PipelineState};
    use async_trait::async_trait;

    struct NoopStage(StageName);

    #[async_trait]
    impl Stage for NoopStage {
        fn name(&self) -> StageName {
            self.0
        }

        fn writes(&self) -> &'static [Field] {
            &[]
        }

        async fn run(&self, _state: &PipelineState) -> StageOutput {
            StageOutput::default()
        }
    }

    fn stage(name: StageName) -> Arc<dyn Stage> {
        Arc::new(NoopStage(name))
    }

    fn two_stage_graph() -> StateGraph {
        let mut graph = StateGraph::new("test");
        graph
            .add_stage(stage(StageName::Apply))
            .add_stage(stage(StageName::Finalize))
            .set_entry(StageName::Apply);
        graph
    }

    #[test]
    fn test_compile_minimal_graph() {
        let mut graph = two_stage_graph();
        graph
            .add_edge(StageName::Apply, StageName::Finalize)
            .set_finish(StageName::Finalize);

        let compiled = graph.compile().unwrap();
        assert_eq!(compiled.entry(), StageName::Apply);
        assert_eq!(
            compiled.stage_names(),
            &[StageName::Apply, StageName::Finalize]
        );
    }

    #[test]
    fn test_missing_entry() {
        let mut graph = StateGraph::new("no-entry");
        graph
            .add_stage(stage(StageName::Finalize))
            .set_finish(StageName::Finalize);
        assert_eq!(
            graph.compile().err(),
            Some(GraphError::MissingEntry("no-entry".to_string()))
        );
    }

    #[test]
    fn test_unknown_target() {
        let mut graph = two_stage_graph();
        graph
            .add_edge(StageName::Apply, StageName::ParseDocument)
            .set_finish(StageName::Finalize);
        assert_eq!(
            graph.compile().err(),
            Some(GraphError::UnknownStage("parse_document".to_string()))
        );
    }

    #[test]
    fn test_duplicate_stage() {
        let mut graph = two_stage_graph();
        graph.add_stage(stage(StageName::Apply));
        assert_eq!(
            graph.compile().err(),
            Some(GraphError::DuplicateStage("apply_recommendations".to_string()))
        );
    }

    #[test]
    fn test_missing_edge() {
        let mut graph = two_stage_graph();
        graph.set_finish(StageName::Finalize);
        assert_eq!(
            graph.compile().err(),
            Some(GraphError::MissingEdge("apply_recommendations".to_string()))
        );
    }

    #[test]
    fn test_unmapped_route_fails_at_compile_time() {
        let mut graph = two_stage_graph();
        graph
            .add_conditional_edges(
                StageName::Apply,
                Arc::new(ContinueOrAbort),
                [(Route::Continue, StageName::Finalize)],
            )
            .set_finish(StageName::Finalize);
        assert_eq!(
            graph.compile().err(),
            Some(GraphError::UnmappedRoute {
                stage: "apply_recommendations".to_string(),
                route: "abort".to_string(),
            })
        );
    }

    #[test]
    fn test_unknown_route_fails_at_compile_time() {
        let mut graph = two_stage_graph();
        graph
            .add_conditional_edges(
                StageName::Apply,
                Arc::new(ApplyOrSkip),
                [
                    (Route::ApplyEdits, StageName::Finalize),
                    (Route::SkipEdits, StageName::Finalize),
                    (Route::End, StageName::Finalize),
                ],
            )
            .set_finish(StageName::Finalize);
        assert_eq!(
            graph.compile().err(),
            Some(GraphError::UnknownRoute {
                stage: "apply_recommendations".to_string(),
                route: "end".to_string(),
            })
        );
    }

    #[test]
    fn test_no_terminal_and_cycle() {
        let mut graph = two_stage_graph();
        graph
            .add_edge(StageName::Apply, StageName::Finalize)
            .add_edge(StageName::Finalize, StageName::Apply);
        assert_eq!(
            graph.compile().err(),
            Some(GraphError::NoTerminal("test".to_string()))
        );

        let mut graph = StateGraph::new("loop");
        graph
            .add_stage(stage(StageName::Validate))
            .add_stage(stage(StageName::Apply))
            .add_stage(stage(StageName::Finalize))
            .set_entry(StageName::Validate)
            .add_edge(StageName::Validate, StageName::Apply)
            .add_conditional_edges(
                StageName::Apply,
                Arc::new(ContinueOrAbort),
                [
                    (Route::Continue, StageName::Validate),
                    (Route::Abort, StageName::Finalize),
                ],
            )
            .set_finish(StageName::Finalize);
        assert_eq!(
            graph.compile().err(),
            Some(GraphError::CircularDependency(vec![
                "validate_inputs".to_string(),
                "apply_recommendations".to_string(),
                "validate_inputs".to_string(),
            ]))
        );
    }

    #[test]
    fn test_unreachable_stage() {
        let mut graph = two_stage_graph();
        graph
            .add_stage(stage(StageName::SelectGaps))
            .add_edge(StageName::Apply, StageName::Finalize)
            .add_edge(StageName::SelectGaps, StageName::Finalize)
            .set_finish(StageName::Finalize);
        assert_eq!(
            graph.compile().err(),
            Some(GraphError::Unreachable("select_gaps".to_string()))
        );
    }

    #[test]
    fn test_multiple_terminals() {
        let mut graph = two_stage_graph();
        graph
            .set_finish(StageName::Apply)
            .set_finish(StageName::Finalize);
        assert_eq!(
            graph.compile().err(),
            Some(GraphError::MultipleTerminals(vec![
                "apply_recommendations".to_string(),
                "finalize".to_string(),
            ]))
        );
    }
}
