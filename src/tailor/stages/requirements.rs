// SPDX-License-Identifier: MIT

use super::{decode, non_blank};
use crate::adk::analyst::Analyst;
use crate::adk::error::TailorError;
use crate::tailor::prompts;
use crate::tailor::workflow::stage::{Stage, StageOutput};
use crate::tailor::workflow::state::{Field, PipelineState, StateUpdate};
use crate::tailor::workflow::types::{
    Requirement, RequirementPriority, StageError, StageName, WorkflowStage,
};
use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RequirementsDraft {
    #[serde(alias = "title")]
    job_title: Option<String>,
    #[serde(alias = "organization")]
    company_name: Option<String>,
    requirements: Vec<RequirementDraft>,
    all_keywords: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RequirementDraft {
    category: String,
    #[serde(alias = "text")]
    requirement: String,
    priority: String,
    keywords: Vec<String>,
}

/// Extracts categorized requirements and keywords from the requirements text
pub struct AnalyzeRequirements {
    analyst: Arc<dyn Analyst>,
    max_tokens: u32,
}

impl AnalyzeRequirements {
    pub fn new(analyst: Arc<dyn Analyst>, max_tokens: u32) -> Self {
        Self {
            analyst,
            max_tokens,
        }
    }

    async fn analyze(&self, text: &str) -> Result<RequirementsDraft, TailorError> {
        let response = self
            .analyst
            .generate_structured(
                &prompts::analyze_requirements_prompt(text),
                prompts::REQUIREMENTS_SYSTEM_PROMPT,
                self.max_tokens,
            )
            .await?;
        decode(response)
    }
}

#[async_trait]
impl Stage for AnalyzeRequirements {
    fn name(&self) -> StageName {
        StageName::AnalyzeRequirements
    }

    fn writes(&self) -> &'static [Field] {
        &[
            Field::Requirements,
            Field::RequirementKeywords,
            Field::RequirementsTitle,
            Field::Organization,
            Field::WorkflowStage,
        ]
    }

    async fn run(&self, state: &PipelineState) -> StageOutput {
        let mut update = StateUpdate::stage(WorkflowStage::AnalyzingRequirements);

        let draft = match self.analyze(&state.requirements_text).await {
            Ok(draft) => draft,
            Err(e) => {
                update.requirements = Some(Vec::new());
                update.requirement_keywords = Some(Vec::new());
                return StageOutput::failed(
                    update,
                    StageError::capability(self.name(), e.to_string()),
                );
            }
        };

        let requirements: Vec<Requirement> = draft
            .requirements
            .into_iter()
            .filter(|r| !r.requirement.trim().is_empty())
            .map(|r| Requirement {
                category: if r.category.is_empty() {
                    "other".to_string()
                } else {
                    r.category
                },
                text: r.requirement,
                priority: RequirementPriority::parse_lenient(&r.priority),
                keywords: r.keywords,
            })
            .collect();

        let required = requirements
            .iter()
            .filter(|r| r.priority == RequirementPriority::Required)
            .count();
        log::info!(
            "Extracted {} requirements ({} required), {} keywords",
            requirements.len(),
            required,
            draft.all_keywords.len()
        );

        update.requirements = Some(requirements);
        update.requirement_keywords = Some(draft.all_keywords);
        update.requirements_title = non_blank(draft.job_title);
        update.organization = non_blank(draft.company_name);
        StageOutput::ok(update)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tailor::stages::testing::ScriptedAnalyst;
    use serde_json::json;

    #[tokio::test]
    async fn test_extracts_requirements() {
        let analyst = ScriptedAnalyst::new().respond(
            prompts::REQUIREMENTS_SYSTEM_PROMPT,
            json!({
                "job_title": "Platform Engineer",
                "company_name": "",
                "requirements": [
                    {"category": "technical_skills", "requirement": "Kubernetes",
                     "priority": "Required", "keywords": ["k8s"]},
                    {"requirement": "Go", "priority": "nice to have"},
                    {"requirement": "  "}
                ],
                "all_keywords": ["kubernetes", "go"]
            }),
        );
        let stage = AnalyzeRequirements::new(Arc::new(analyst), 4096);

        let output = stage.run(&PipelineState::new("doc", "reqs")).await;
        assert!(!output.is_failure());

        let reqs = output.update.requirements.unwrap();
        assert_eq!(reqs.len(), 2);
        assert_eq!(reqs[0].priority, RequirementPriority::Required);
        assert_eq!(reqs[1].priority, RequirementPriority::Preferred);
        assert_eq!(reqs[1].category, "other");
        assert_eq!(output.update.requirements_title.as_deref(), Some("Platform Engineer"));
        assert_eq!(output.update.organization, None);
        assert_eq!(output.update.requirement_keywords.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_failure_writes_empty_defaults() {
        let analyst = ScriptedAnalyst::new().fail(prompts::REQUIREMENTS_SYSTEM_PROMPT, "503");
        let stage = AnalyzeRequirements::new(Arc::new(analyst), 4096);

        let output = stage.run(&PipelineState::new("doc", "reqs")).await;
        assert_eq!(output.failures.len(), 1);
        assert_eq!(output.update.requirements, Some(vec![]));
        assert_eq!(output.update.requirement_keywords, Some(vec![]));
    }
}
