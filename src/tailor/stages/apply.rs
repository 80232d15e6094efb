// SPDX-License-Identifier: MIT

use super::{decode, non_blank};
use crate::adk::analyst::Analyst;
use crate::adk::error::TailorError;
use crate::tailor::prompts;
use crate::tailor::workflow::checkpoint::{normalize_selection, ApprovalPolicy, SelectionPrompt};
use crate::tailor::workflow::stage::{Stage, StageOutput};
use crate::tailor::workflow::state::{Field, PipelineState, StateUpdate};
use crate::tailor::workflow::types::{
    AppliedChange, Recommendation, StageError, StageName, WorkflowStage,
};
use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct EditDraft {
    #[serde(alias = "modified_document")]
    modified_resume_tex: Option<String>,
    applied_changes: Vec<AppliedChange>,
}

/// Applies accepted recommendations to the source document
///
/// Hosts the pre-apply checkpoint: when the state carries no accepted ids the
/// [`ApprovalPolicy`] decides which recommendations to apply, or defers the
/// choice back to the caller.
pub struct ApplyRecommendations {
    analyst: Arc<dyn Analyst>,
    max_tokens: u32,
    policy: ApprovalPolicy,
}

impl ApplyRecommendations {
    pub fn new(analyst: Arc<dyn Analyst>, max_tokens: u32, policy: ApprovalPolicy) -> Self {
        Self {
            analyst,
            max_tokens,
            policy,
        }
    }

    async fn edit(
        &self,
        state: &PipelineState,
        selected: &[&Recommendation],
    ) -> Result<(String, Vec<AppliedChange>), TailorError> {
        let prompt = prompts::apply_recommendations_prompt(
            &state.source_document,
            selected,
            &state.document_sections,
        );
        let response = self
            .analyst
            .generate_structured(&prompt, prompts::APPLY_SYSTEM_PROMPT, self.max_tokens)
            .await?;
        let draft: EditDraft = decode(response)?;

        let modified = match non_blank(draft.modified_resume_tex) {
            Some(text) => text,
            None => {
                log::warn!("Editor returned no document, keeping the source unchanged");
                state.source_document.clone()
            }
        };
        Ok((modified, draft.applied_changes))
    }

    /// Ids to apply, or `None` when the choice is handed back to the caller
    async fn resolve_selection(
        &self,
        state: &PipelineState,
        prompt: &SelectionPrompt,
    ) -> Result<Option<Vec<String>>, StageError> {
        if let Some(accepted) = &state.accepted_recommendations {
            return Ok(Some(accepted.clone()));
        }

        let ids = match &self.policy {
            ApprovalPolicy::ApplyAll => prompt.ids(),
            ApprovalPolicy::AutoPriority(max) => {
                let ids = prompt.ids_up_to_rank(*max);
                log::info!(
                    "Auto-selected {} recommendations at priority P{} or above",
                    ids.len(),
                    max
                );
                ids
            }
            ApprovalPolicy::Interactive(selector) => selector
                .select(prompt)
                .await
                .map_err(|e| StageError::interaction(self.name(), e.to_string()))?,
            ApprovalPolicy::Deferred => return Ok(None),
        };
        Ok(Some(ids))
    }
}

#[async_trait]
impl Stage for ApplyRecommendations {
    fn name(&self) -> StageName {
        StageName::Apply
    }

    fn writes(&self) -> &'static [Field] {
        &[
            Field::ModifiedDocument,
            Field::AppliedChanges,
            Field::AcceptedRecommendations,
            Field::RejectedRecommendations,
            Field::AwaitingSelection,
            Field::WorkflowStage,
        ]
    }

    async fn run(&self, state: &PipelineState) -> StageOutput {
        let mut update = StateUpdate::stage(WorkflowStage::Editing);
        let prompt = SelectionPrompt::for_recommendations(&state.recommendations);

        let accepted = match self.resolve_selection(state, &prompt).await {
            Ok(Some(ids)) => normalize_selection(&prompt, ids),
            Ok(None) => {
                log::info!(
                    "Awaiting selection of {} recommendations",
                    state.recommendations.len()
                );
                update.awaiting_selection = Some(true);
                return StageOutput::ok(update);
            }
            Err(failure) => {
                update.modified_document = Some(state.source_document.clone());
                update.applied_changes = Some(Vec::new());
                update.awaiting_selection = Some(false);
                return StageOutput::failed(update, failure);
            }
        };

        let rejected: Vec<String> = prompt
            .ids()
            .into_iter()
            .filter(|id| !accepted.contains(id))
            .collect();
        let selected: Vec<&Recommendation> = state
            .recommendations
            .iter()
            .filter(|r| accepted.contains(&r.id))
            .collect();

        update.accepted_recommendations = Some(accepted);
        update.rejected_recommendations = Some(rejected);
        update.awaiting_selection = Some(false);

        if selected.is_empty() {
            log::info!("No recommendations accepted, document left unchanged");
            update.modified_document = Some(state.source_document.clone());
            update.applied_changes = Some(Vec::new());
            return StageOutput::ok(update);
        }

        match self.edit(state, &selected).await {
            Ok((modified, changes)) => {
                log::info!(
                    "Applied {} changes for {} recommendations",
                    changes.len(),
                    selected.len()
                );
                update.modified_document = Some(modified);
                update.applied_changes = Some(changes);
                StageOutput::ok(update)
            }
            Err(e) => {
                update.modified_document = Some(state.source_document.clone());
                update.applied_changes = Some(Vec::new());
                StageOutput::failed(update, StageError::capability(self.name(), e.to_string()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tailor::stages::testing::ScriptedAnalyst;
    use crate::tailor::workflow::checkpoint::{FixedSelector, Selector};
    use serde_json::json;

    const SOURCE: &str = "\\section{Skills} Rust";

    fn rec(id: &str, priority: u8) -> Recommendation {
        Recommendation {
            id: id.to_string(),
            priority,
            category: "skills".to_string(),
            description: format!("description of {}", id),
            action: "edit".to_string(),
            rationale: "because".to_string(),
            modification: None,
        }
    }

    fn state() -> PipelineState {
        let mut state = PipelineState::new(SOURCE, "reqs");
        state.recommendations = vec![rec("rec_001", 1), rec("rec_002", 2), rec("rec_003", 4)];
        state
    }

    fn editor() -> Arc<ScriptedAnalyst> {
        Arc::new(ScriptedAnalyst::new().respond(
            prompts::APPLY_SYSTEM_PROMPT,
            json!({
                "modified_resume_tex": "\\section{Skills} Rust, Kubernetes",
                "applied_changes": [
                    {"recommendation_id": "rec_001", "change_description": "Added k8s",
                     "section_modified": "Skills", "original_text": "Rust",
                     "new_text": "Rust, Kubernetes"}
                ]
            }),
        ))
    }

    #[tokio::test]
    async fn test_apply_all() {
        let analyst = editor();
        let stage = ApplyRecommendations::new(analyst.clone(), 8192, ApprovalPolicy::ApplyAll);

        let output = stage.run(&state()).await;
        assert!(!output.is_failure());
        assert_eq!(
            output.update.modified_document.as_deref(),
            Some("\\section{Skills} Rust, Kubernetes")
        );
        let changes = output.update.applied_changes.unwrap();
        assert_eq!(changes[0].description, "Added k8s");
        assert_eq!(changes[0].section, "Skills");
        assert_eq!(output.update.rejected_recommendations, Some(vec![]));
        assert_eq!(output.update.awaiting_selection, Some(false));
    }

    #[tokio::test]
    async fn test_accepted_ids_win_over_policy() {
        let analyst = editor();
        let stage = ApplyRecommendations::new(analyst.clone(), 8192, ApprovalPolicy::Deferred);

        let mut s = state();
        s.accepted_recommendations = Some(vec!["rec_002".to_string(), "rec_404".to_string()]);

        let output = stage.run(&s).await;
        assert_eq!(
            output.update.accepted_recommendations,
            Some(vec!["rec_002".to_string()])
        );
        assert_eq!(
            output.update.rejected_recommendations,
            Some(vec!["rec_001".to_string(), "rec_003".to_string()])
        );
        assert!(analyst.prompts()[0].contains("description of rec_002"));
        assert!(!analyst.prompts()[0].contains("description of rec_001"));
    }

    #[tokio::test]
    async fn test_auto_priority() {
        let analyst = editor();
        let stage = ApplyRecommendations::new(analyst, 8192, ApprovalPolicy::AutoPriority(2));
        let output = stage.run(&state()).await;
        assert_eq!(
            output.update.accepted_recommendations,
            Some(vec!["rec_001".to_string(), "rec_002".to_string()])
        );
    }

    #[tokio::test]
    async fn test_empty_acceptance_leaves_document_unchanged() {
        let analyst = editor();
        let selector: Arc<dyn Selector> = Arc::new(FixedSelector::new(Vec::<String>::new()));
        let stage =
            ApplyRecommendations::new(analyst.clone(), 8192, ApprovalPolicy::Interactive(selector));

        let output = stage.run(&state()).await;
        assert!(!output.is_failure());
        assert_eq!(analyst.call_count(), 0);
        assert_eq!(output.update.modified_document.as_deref(), Some(SOURCE));
        assert_eq!(output.update.applied_changes, Some(vec![]));
        assert_eq!(output.update.rejected_recommendations.map(|r| r.len()), Some(3));
    }

    #[tokio::test]
    async fn test_deferred_suspends_without_editing() {
        let analyst = editor();
        let stage = ApplyRecommendations::new(analyst.clone(), 8192, ApprovalPolicy::Deferred);

        let output = stage.run(&state()).await;
        assert_eq!(analyst.call_count(), 0);
        assert_eq!(output.update.awaiting_selection, Some(true));
        assert_eq!(output.update.modified_document, None);
        assert_eq!(output.update.accepted_recommendations, None);
    }

    #[tokio::test]
    async fn test_capability_failure_keeps_source() {
        let analyst = Arc::new(ScriptedAnalyst::new().fail(prompts::APPLY_SYSTEM_PROMPT, "overloaded"));
        let stage = ApplyRecommendations::new(analyst, 8192, ApprovalPolicy::ApplyAll);

        let output = stage.run(&state()).await;
        assert_eq!(output.failures.len(), 1);
        assert!(output.failures[0].to_string().starts_with("Document Editor error:"));
        assert_eq!(output.update.modified_document.as_deref(), Some(SOURCE));
        assert_eq!(output.update.applied_changes, Some(vec![]));
    }

    #[tokio::test]
    async fn test_missing_document_in_response_keeps_source() {
        let analyst = Arc::new(
            ScriptedAnalyst::new().respond(prompts::APPLY_SYSTEM_PROMPT, json!({"applied_changes": []})),
        );
        let stage = ApplyRecommendations::new(analyst, 8192, ApprovalPolicy::ApplyAll);
        let output = stage.run(&state()).await;
        assert!(!output.is_failure());
        assert_eq!(output.update.modified_document.as_deref(), Some(SOURCE));
    }
}
