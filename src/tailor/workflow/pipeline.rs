// SPDX-License-Identifier: MIT

//! Pipeline facade
//!
//! Wires the stages into the full graph and the apply-only graph, and
//! implements the two-phase checkpoint protocol on top of them.

use crate::adk::analyst::Analyst;
use crate::adk::error::{GraphError, TailorError};
use crate::tailor::config::PipelineConfig;
use crate::tailor::stages::{
    AnalyzeGaps, AnalyzeRequirements, ApplyRecommendations, Finalize, GenerateRecommendations,
    ParseDocument, SelectGaps, ValidateInputs,
};
use crate::tailor::workflow::checkpoint::{ApprovalPolicy, Selector};
use crate::tailor::workflow::graph::{CompiledGraph, GraphRun, StateGraph};
use crate::tailor::workflow::router::{
    AbortFirst, ApplyOrSkip, ContinueOrAbort, ContinueOrEnd, Route, SelectOrSkipSelection,
};
use crate::tailor::workflow::stage::Stage;
use crate::tailor::workflow::state::PipelineState;
use crate::tailor::workflow::types::{Severity, StageName};
use std::sync::Arc;

/// One instance of every stage, shared by both graphs
pub struct StageSet {
    pub validate: Arc<dyn Stage>,
    pub parse: Arc<dyn Stage>,
    pub requirements: Arc<dyn Stage>,
    pub gaps: Arc<dyn Stage>,
    pub select_gaps: Arc<dyn Stage>,
    pub recommend: Arc<dyn Stage>,
    pub apply: Arc<dyn Stage>,
    pub finalize: Arc<dyn Stage>,
}

impl StageSet {
    pub fn new(
        analyst: Arc<dyn Analyst>,
        config: &PipelineConfig,
        gap_selector: Option<Arc<dyn Selector>>,
        approval: ApprovalPolicy,
    ) -> Self {
        let tokens = &config.tokens;
        Self {
            validate: Arc::new(ValidateInputs::new(config.limits.clone())),
            parse: Arc::new(ParseDocument::new(analyst.clone(), tokens.parse)),
            requirements: Arc::new(AnalyzeRequirements::new(
                analyst.clone(),
                tokens.requirements,
            )),
            gaps: Arc::new(AnalyzeGaps::new(analyst.clone(), tokens.gaps)),
            select_gaps: Arc::new(SelectGaps::new(gap_selector)),
            recommend: Arc::new(GenerateRecommendations::new(
                analyst.clone(),
                tokens.recommendations,
            )),
            apply: Arc::new(ApplyRecommendations::new(analyst, tokens.apply, approval)),
            finalize: Arc::new(Finalize),
        }
    }
}

/// validate → parse → requirements → gaps → [select] → recommend → [apply] → finalize
pub fn full_graph(stages: &StageSet) -> Result<CompiledGraph, GraphError> {
    let mut graph = StateGraph::new("tailor");
    graph
        .add_stage(stages.validate.clone())
        .add_stage(stages.parse.clone())
        .add_stage(stages.requirements.clone())
        .add_stage(stages.gaps.clone())
        .add_stage(stages.select_gaps.clone())
        .add_stage(stages.recommend.clone())
        .add_stage(stages.apply.clone())
        .add_stage(stages.finalize.clone())
        .set_entry(StageName::Validate)
        .add_conditional_edges(
            StageName::Validate,
            Arc::new(ContinueOrEnd),
            [
                (Route::Continue, StageName::ParseDocument),
                (Route::End, StageName::Finalize),
            ],
        )
        .add_conditional_edges(
            StageName::ParseDocument,
            Arc::new(ContinueOrAbort),
            [
                (Route::Continue, StageName::AnalyzeRequirements),
                (Route::Abort, StageName::Finalize),
            ],
        )
        .add_conditional_edges(
            StageName::AnalyzeRequirements,
            Arc::new(ContinueOrAbort),
            [
                (Route::Continue, StageName::AnalyzeGaps),
                (Route::Abort, StageName::Finalize),
            ],
        )
        .add_conditional_edges(
            StageName::AnalyzeGaps,
            Arc::new(AbortFirst::new(SelectOrSkipSelection)),
            [
                (Route::Abort, StageName::Finalize),
                (Route::SelectGaps, StageName::SelectGaps),
                (
                    Route::GenerateRecommendations,
                    StageName::GenerateRecommendations,
                ),
            ],
        )
        .add_conditional_edges(
            StageName::SelectGaps,
            Arc::new(ContinueOrAbort),
            [
                (Route::Continue, StageName::GenerateRecommendations),
                (Route::Abort, StageName::Finalize),
            ],
        )
        .add_conditional_edges(
            StageName::GenerateRecommendations,
            Arc::new(AbortFirst::new(ApplyOrSkip)),
            [
                (Route::Abort, StageName::Finalize),
                (Route::ApplyEdits, StageName::Apply),
                (Route::SkipEdits, StageName::Finalize),
            ],
        )
        .add_edge(StageName::Apply, StageName::Finalize)
        .set_finish(StageName::Finalize);
    graph.compile()
}

/// apply → finalize, for resuming from a saved state
pub fn apply_only_graph(stages: &StageSet) -> Result<CompiledGraph, GraphError> {
    let mut graph = StateGraph::new("tailor-apply");
    graph
        .add_stage(stages.apply.clone())
        .add_stage(stages.finalize.clone())
        .set_entry(StageName::Apply)
        .add_edge(StageName::Apply, StageName::Finalize)
        .set_finish(StageName::Finalize);
    graph.compile()
}

/// Raw inputs of a run
#[derive(Debug, Clone, Default)]
pub struct PipelineInputs {
    pub document: String,
    pub requirements: String,
    pub document_path: Option<String>,
    pub requirements_path: Option<String>,
}

impl PipelineInputs {
    pub fn new(document: impl Into<String>, requirements: impl Into<String>) -> Self {
        Self {
            document: document.into(),
            requirements: requirements.into(),
            ..Default::default()
        }
    }
}

/// Gap checkpoint behavior for a run
#[derive(Debug, Clone, Copy)]
pub struct RunOptions {
    pub interactive_gap_selection: bool,
    pub auto_gap_severity: Option<Severity>,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            interactive_gap_selection: true,
            auto_gap_severity: None,
        }
    }
}

pub struct Pipeline {
    full: CompiledGraph,
    apply_only: CompiledGraph,
}

impl Pipeline {
    pub fn new(stages: StageSet) -> Result<Self, TailorError> {
        Ok(Self {
            full: full_graph(&stages)?,
            apply_only: apply_only_graph(&stages)?,
        })
    }

    pub fn initial_state(inputs: &PipelineInputs, options: &RunOptions) -> PipelineState {
        PipelineState::new(inputs.document.clone(), inputs.requirements.clone())
            .with_paths(
                inputs.document_path.clone(),
                inputs.requirements_path.clone(),
            )
            .with_gap_selection(options.interactive_gap_selection, options.auto_gap_severity)
    }

    /// Run the full graph on fresh inputs
    pub async fn run(
        &self,
        inputs: &PipelineInputs,
        options: &RunOptions,
    ) -> Result<GraphRun, TailorError> {
        self.full.invoke(Self::initial_state(inputs, options)).await
    }

    /// Resume with the caller's recommendation choice
    ///
    /// A resumable `previous` state goes through the apply-only graph. Anything
    /// else falls back to a full run with the selection pre-supplied.
    pub async fn apply_selection(
        &self,
        previous: Option<PipelineState>,
        inputs: &PipelineInputs,
        accepted: Vec<String>,
    ) -> Result<GraphRun, TailorError> {
        match previous {
            Some(mut state) if state.is_resumable() => {
                log::info!(
                    "Resuming run {} with {} accepted recommendations",
                    state.run_id,
                    accepted.len()
                );
                state.accepted_recommendations = Some(accepted);
                state.awaiting_selection = false;
                self.apply_only.invoke(state).await
            }
            previous => {
                log::warn!(
                    "{}, re-running the full pipeline with the selection pre-supplied",
                    if previous.is_some() {
                        "Saved state has no recommendations or no source document"
                    } else {
                        "No saved state"
                    }
                );
                let options = RunOptions {
                    interactive_gap_selection: false,
                    auto_gap_severity: None,
                };
                let mut state = Self::initial_state(inputs, &options);
                state.accepted_recommendations = Some(accepted);
                self.full.invoke(state).await
            }
        }
    }

    /// Finish a run suspended at the pre-apply checkpoint
    ///
    /// Declining every recommendation ends the run as suspended: no edit
    /// phase, no modified document.
    pub async fn resume_deferred(
        &self,
        mut run: GraphRun,
        inputs: &PipelineInputs,
        accepted: Vec<String>,
    ) -> Result<GraphRun, TailorError> {
        if !run.state.awaiting_selection {
            return Ok(run);
        }
        if !accepted.is_empty() {
            return self.apply_selection(Some(run.state), inputs, accepted).await;
        }

        log::info!("No recommendations accepted, skipping the edit phase");
        let state = &mut run.state;
        state.awaiting_selection = false;
        state.accepted_recommendations = Some(Vec::new());
        state.rejected_recommendations =
            Some(state.recommendations.iter().map(|r| r.id.clone()).collect());
        Ok(run)
    }

    pub fn full_graph(&self) -> &CompiledGraph {
        &self.full
    }

    pub fn apply_only_graph(&self) -> &CompiledGraph {
        &self.apply_only
    }
}
