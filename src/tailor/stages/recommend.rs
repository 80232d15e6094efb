// SPDX-License-Identifier: MIT

use super::{decode, lenient_f64, lenient_text, non_blank};
use crate::adk::analyst::Analyst;
use crate::adk::error::TailorError;
use crate::tailor::prompts;
use crate::tailor::workflow::stage::{Stage, StageOutput};
use crate::tailor::workflow::state::{Field, PipelineState, StateUpdate};
use crate::tailor::workflow::types::{
    recommendation_id, Gap, Recommendation, StageError, StageName, WorkflowStage,
    PRIORITY_HIGHEST, PRIORITY_LOWEST,
};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashSet;
use std::sync::Arc;

const DEFAULT_PRIORITY: u8 = 3;

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RecommendationsDraft {
    recommendations: Vec<RecommendationDraft>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RecommendationDraft {
    #[serde(alias = "id")]
    recommendation_id: Option<String>,
    priority: Value,
    category: String,
    description: String,
    #[serde(alias = "action")]
    specific_action: Value,
    rationale: Value,
    #[serde(alias = "modification")]
    latex_modification: Option<String>,
}

/// Clamp a model-provided priority into 1..=5
fn priority(value: &Value) -> u8 {
    match lenient_f64(value) {
        Some(p) => p.round().clamp(PRIORITY_HIGHEST as f64, PRIORITY_LOWEST as f64) as u8,
        None => DEFAULT_PRIORITY,
    }
}

/// Turns the selected gaps into prioritized recommendations
pub struct GenerateRecommendations {
    analyst: Arc<dyn Analyst>,
    max_tokens: u32,
}

impl GenerateRecommendations {
    pub fn new(analyst: Arc<dyn Analyst>, max_tokens: u32) -> Self {
        Self {
            analyst,
            max_tokens,
        }
    }

    async fn generate(
        &self,
        state: &PipelineState,
        gaps: &[&Gap],
    ) -> Result<Vec<Recommendation>, TailorError> {
        let prompt = prompts::generate_recommendations_prompt(
            gaps,
            &state.document_sections,
            &state.requirements,
            state.similarity_score,
        );
        let response = self
            .analyst
            .generate_structured(&prompt, prompts::RECOMMEND_SYSTEM_PROMPT, self.max_tokens)
            .await?;
        let draft: RecommendationsDraft = decode(response)?;

        let mut ordinal = state.recommendations.len();
        let mut used: HashSet<String> =
            state.recommendations.iter().map(|r| r.id.clone()).collect();

        let mut batch: Vec<Recommendation> = draft
            .recommendations
            .into_iter()
            .map(|r| {
                ordinal += 1;
                // Model-supplied ids are kept unless blank or already taken
                let id = match non_blank(r.recommendation_id) {
                    Some(id) if !used.contains(&id) => id,
                    _ => {
                        while used.contains(&recommendation_id(ordinal)) {
                            ordinal += 1;
                        }
                        recommendation_id(ordinal)
                    }
                };
                used.insert(id.clone());
                Recommendation {
                    id,
                    priority: priority(&r.priority),
                    category: r.category,
                    description: r.description,
                    action: lenient_text(&r.specific_action),
                    rationale: lenient_text(&r.rationale),
                    modification: non_blank(r.latex_modification),
                }
            })
            .collect();

        // Stable: equal priorities keep model order
        batch.sort_by_key(|r| r.priority);
        Ok(batch)
    }
}

#[async_trait]
impl Stage for GenerateRecommendations {
    fn name(&self) -> StageName {
        StageName::GenerateRecommendations
    }

    fn writes(&self) -> &'static [Field] {
        &[Field::Recommendations, Field::WorkflowStage]
    }

    async fn run(&self, state: &PipelineState) -> StageOutput {
        let mut update = StateUpdate::stage(WorkflowStage::Generating);
        let gaps = state.selected_gap_records();

        if state.selected_gaps.as_ref().is_some_and(|ids| ids.is_empty()) {
            log::info!("No gaps selected, skipping recommendation generation");
            update.recommendations = Some(Vec::new());
            return StageOutput::ok(update);
        }

        match self.generate(state, &gaps).await {
            Ok(batch) => {
                log::info!(
                    "Generated {} recommendations for {} gaps",
                    batch.len(),
                    gaps.len()
                );
                update.recommendations = Some(batch);
                StageOutput::ok(update)
            }
            Err(e) => {
                update.recommendations = Some(Vec::new());
                StageOutput::failed(update, StageError::capability(self.name(), e.to_string()))
            }
        }
    }
}
