// SPDX-License-Identifier: MIT

use crate::tailor::workflow::stage::{Stage, StageOutput};
use crate::tailor::workflow::state::{Field, PipelineState, StateUpdate};
use crate::tailor::workflow::types::{RunSummary, StageName, WorkflowStage};
use async_trait::async_trait;

/// Terminal stage: marks the run complete and writes its summary
pub struct Finalize;

impl Finalize {
    pub fn summarize(state: &PipelineState) -> RunSummary {
        RunSummary {
            similarity_score: state.similarity_score.unwrap_or(0.0),
            gap_count: state.gaps.len(),
            selected_gap_count: state.selected_gaps.as_ref().map(Vec::len),
            recommendation_count: state.recommendations.len(),
            applied_change_count: state
                .modified_document
                .as_ref()
                .map(|_| state.applied_changes.len()),
            errors: state.error_messages(),
        }
    }
}

#[async_trait]
impl Stage for Finalize {
    fn name(&self) -> StageName {
        StageName::Finalize
    }

    fn writes(&self) -> &'static [Field] {
        &[Field::Summary, Field::WorkflowStage]
    }

    async fn run(&self, state: &PipelineState) -> StageOutput {
        let summary = Self::summarize(state);

        if summary.errors.is_empty() {
            log::info!(
                "Run {} complete: score {:.1}, {} gaps, {} recommendations",
                state.run_id,
                summary.similarity_score,
                summary.gap_count,
                summary.recommendation_count
            );
        } else {
            log::warn!(
                "Run {} finished with {} errors",
                state.run_id,
                summary.errors.len()
            );
        }
        if state.awaiting_selection {
            log::info!("Recommendation selection is pending");
        }

        let mut update = StateUpdate::stage(WorkflowStage::Complete);
        update.summary = Some(summary);
        StageOutput::ok(update)
    }
}
