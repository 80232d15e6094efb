// SPDX-License-Identifier: MIT

use super::{decode, lenient_f64, non_blank};
use crate::adk::analyst::Analyst;
use crate::adk::error::TailorError;
use crate::tailor::prompts;
use crate::tailor::workflow::stage::{Stage, StageOutput};
use crate::tailor::workflow::state::{Field, PipelineState, StateUpdate};
use crate::tailor::workflow::types::{gap_id, Gap, Severity, StageError, StageName, WorkflowStage};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct GapsDraft {
    similarity_score: Value,
    keyword_overlap: Value,
    gaps: Vec<GapDraft>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct GapDraft {
    #[serde(alias = "type")]
    gap_type: String,
    description: String,
    severity: String,
    related_requirement: Option<String>,
}

fn percentage(value: &Value) -> f64 {
    lenient_f64(value).unwrap_or(0.0).clamp(0.0, 100.0)
}

/// Scores document/requirements similarity and lists gaps
pub struct AnalyzeGaps {
    analyst: Arc<dyn Analyst>,
    max_tokens: u32,
}

impl AnalyzeGaps {
    pub fn new(analyst: Arc<dyn Analyst>, max_tokens: u32) -> Self {
        Self {
            analyst,
            max_tokens,
        }
    }

    async fn analyze(&self, state: &PipelineState) -> Result<GapsDraft, TailorError> {
        let document_keywords = state
            .parsed_document
            .as_ref()
            .map(|p| p.keywords.as_slice())
            .unwrap_or_default();
        let prompt = prompts::analyze_gaps_prompt(
            document_keywords,
            &state.requirement_keywords,
            &state.document_sections,
            &state.requirements,
        );

        let response = self
            .analyst
            .generate_structured(&prompt, prompts::GAPS_SYSTEM_PROMPT, self.max_tokens)
            .await?;
        decode(response)
    }
}

#[async_trait]
impl Stage for AnalyzeGaps {
    fn name(&self) -> StageName {
        StageName::AnalyzeGaps
    }

    fn writes(&self) -> &'static [Field] {
        &[
            Field::SimilarityScore,
            Field::KeywordOverlap,
            Field::Gaps,
            Field::WorkflowStage,
        ]
    }

    async fn run(&self, state: &PipelineState) -> StageOutput {
        let mut update = StateUpdate::stage(WorkflowStage::Analyzing);

        let draft = match self.analyze(state).await {
            Ok(draft) => draft,
            Err(e) => {
                update.similarity_score = Some(0.0);
                update.keyword_overlap = Some(0.0);
                update.gaps = Some(Vec::new());
                return StageOutput::failed(
                    update,
                    StageError::capability(self.name(), e.to_string()),
                );
            }
        };

        // Ids continue from whatever is already accumulated
        let offset = state.gaps.len();
        let gaps: Vec<Gap> = draft
            .gaps
            .into_iter()
            .enumerate()
            .map(|(i, g)| Gap {
                id: gap_id(offset + i),
                gap_type: g.gap_type,
                description: g.description,
                severity: Severity::parse_lenient(&g.severity),
                related_requirement: non_blank(g.related_requirement),
            })
            .collect();

        let score = percentage(&draft.similarity_score);
        let high = gaps.iter().filter(|g| g.severity == Severity::High).count();
        log::info!(
            "Similarity score {:.1}, {} gaps ({} high)",
            score,
            gaps.len(),
            high
        );

        update.similarity_score = Some(score);
        update.keyword_overlap = Some(percentage(&draft.keyword_overlap));
        update.gaps = Some(gaps);
        StageOutput::ok(update)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tailor::stages::testing::ScriptedAnalyst;
    use serde_json::json;

    fn stage(response: Value) -> AnalyzeGaps {
        let analyst = ScriptedAnalyst::new().respond(prompts::GAPS_SYSTEM_PROMPT, response);
        AnalyzeGaps::new(Arc::new(analyst), 4096)
    }

    #[tokio::test]
    async fn test_gap_ids_and_clamping() {
        let stage = stage(json!({
            "similarity_score": 140,
            "keyword_overlap": "55.5",
            "gaps": [
                {"gap_type": "missing_skill", "description": "Kubernetes", "severity": "HIGH"},
                {"gap_type": "formatting", "description": "Tables", "severity": "cosmetic",
                 "related_requirement": ""}
            ]
        }));

        let mut state = PipelineState::new("doc", "reqs");
        state.gaps.push(Gap {
            id: "gap_0".to_string(),
            gap_type: "earlier".to_string(),
            description: "from a prior run".to_string(),
            severity: Severity::Low,
            related_requirement: None,
        });

        let output = stage.run(&state).await;
        assert!(!output.is_failure());
        assert_eq!(output.update.similarity_score, Some(100.0));
        assert_eq!(output.update.keyword_overlap, Some(55.5));

        let gaps = output.update.gaps.unwrap();
        assert_eq!(gaps[0].id, "gap_1");
        assert_eq!(gaps[0].severity, Severity::High);
        assert_eq!(gaps[1].id, "gap_2");
        assert_eq!(gaps[1].severity, Severity::Low);
        assert_eq!(gaps[1].related_requirement, None);
    }

    #[tokio::test]
    async fn test_missing_scores_default_to_zero() {
        let output = stage(json!({ "gaps": [] }))
            .run(&PipelineState::new("doc", "reqs"))
            .await;
        assert_eq!(output.update.similarity_score, Some(0.0));
        assert_eq!(output.update.gaps, Some(vec![]));
    }

    #[tokio::test]
    async fn test_failure() {
        let analyst = ScriptedAnalyst::new();
        let output = AnalyzeGaps::new(Arc::new(analyst), 4096)
            .run(&PipelineState::new("doc", "reqs"))
            .await;
        assert_eq!(output.failures.len(), 1);
        assert_eq!(output.failures[0].stage, StageName::AnalyzeGaps);
        assert_eq!(output.update.gaps, Some(vec![]));
    }
}
