// SPDX-License-Identifier: MIT

use crate::tailor::workflow::checkpoint::{normalize_selection, SelectionPrompt, Selector};
use crate::tailor::workflow::stage::{Stage, StageOutput};
use crate::tailor::workflow::state::{Field, PipelineState, StateUpdate};
use crate::tailor::workflow::types::{StageError, StageName, WorkflowStage};
use async_trait::async_trait;
use std::sync::Arc;

/// Gap checkpoint
///
/// Resolves by severity threshold when `auto_gap_severity` is set, otherwise
/// waits on the selector. Without a selector every gap is kept.
pub struct SelectGaps {
    selector: Option<Arc<dyn Selector>>,
}

impl SelectGaps {
    pub fn new(selector: Option<Arc<dyn Selector>>) -> Self {
        Self { selector }
    }
}

#[async_trait]
impl Stage for SelectGaps {
    fn name(&self) -> StageName {
        StageName::SelectGaps
    }

    fn writes(&self) -> &'static [Field] {
        &[Field::SelectedGaps, Field::WorkflowStage]
    }

    async fn run(&self, state: &PipelineState) -> StageOutput {
        let prompt = SelectionPrompt::for_gaps(&state.gaps);
        let mut update = StateUpdate::stage(WorkflowStage::SelectingGaps);
        let mut failures = Vec::new();

        let selected = if let Some(severity) = state.auto_gap_severity {
            let ids = prompt.ids_up_to_rank(severity.rank());
            log::info!(
                "Auto-selected {} of {} gaps at severity {} or above",
                ids.len(),
                prompt.items.len(),
                severity
            );
            ids
        } else if let Some(selector) = &self.selector {
            match selector.select(&prompt).await {
                Ok(ids) => normalize_selection(&prompt, ids),
                Err(e) => {
                    failures.push(StageError::interaction(self.name(), e.to_string()));
                    prompt.ids()
                }
            }
        } else {
            log::warn!("No gap selector configured, keeping all gaps");
            prompt.ids()
        };

        log::info!("Selected {}/{} gaps", selected.len(), prompt.items.len());
        update.selected_gaps = Some(selected);
        StageOutput { update, failures }
    }
}
