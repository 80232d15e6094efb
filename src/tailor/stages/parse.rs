// SPDX-License-Identifier: MIT

use super::{decode, lenient_text};
use crate::adk::analyst::Analyst;
use crate::adk::error::TailorError;
use crate::tailor::prompts;
use crate::tailor::workflow::stage::{Stage, StageOutput};
use crate::tailor::workflow::state::{Field, PipelineState, StateUpdate};
use crate::tailor::workflow::types::{
    DocumentSection, ParsedDocument, StageError, StageName, WorkflowStage,
};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Map, Value};
use std::sync::Arc;

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ParseDraft {
    contact_info: Map<String, Value>,
    sections: Vec<SectionDraft>,
    all_keywords: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct SectionDraft {
    #[serde(alias = "name")]
    section_name: String,
    #[serde(alias = "kind")]
    section_type: String,
    content: Value,
    keywords: Vec<String>,
}

/// Splits the source document into sections and collects its keywords
pub struct ParseDocument {
    analyst: Arc<dyn Analyst>,
    max_tokens: u32,
}

impl ParseDocument {
    pub fn new(analyst: Arc<dyn Analyst>, max_tokens: u32) -> Self {
        Self {
            analyst,
            max_tokens,
        }
    }

    async fn parse(&self, document: &str) -> Result<(ParsedDocument, Vec<DocumentSection>), TailorError> {
        let response = self
            .analyst
            .generate_structured(
                &prompts::parse_document_prompt(document),
                prompts::PARSE_SYSTEM_PROMPT,
                self.max_tokens,
            )
            .await?;
        let draft: ParseDraft = decode(response)?;

        let sections: Vec<DocumentSection> = draft
            .sections
            .into_iter()
            .map(|s| DocumentSection {
                name: s.section_name,
                kind: if s.section_type.is_empty() {
                    "other".to_string()
                } else {
                    s.section_type
                },
                content: lenient_text(&s.content),
                keywords: s.keywords,
            })
            .collect();

        let parsed = ParsedDocument {
            contact_info: draft.contact_info,
            keywords: draft.all_keywords,
            section_count: sections.len(),
        };
        Ok((parsed, sections))
    }
}

#[async_trait]
impl Stage for ParseDocument {
    fn name(&self) -> StageName {
        StageName::ParseDocument
    }

    fn writes(&self) -> &'static [Field] {
        &[
            Field::ParsedDocument,
            Field::DocumentSections,
            Field::WorkflowStage,
        ]
    }

    async fn run(&self, state: &PipelineState) -> StageOutput {
        let mut update = StateUpdate::stage(WorkflowStage::Parsing);

        match self.parse(&state.source_document).await {
            Ok((parsed, sections)) => {
                log::info!(
                    "Parsed {} sections, {} keywords",
                    sections.len(),
                    parsed.keywords.len()
                );
                update.parsed_document = Some(parsed);
                update.document_sections = Some(sections);
                StageOutput::ok(update)
            }
            Err(e) => {
                update.document_sections = Some(Vec::new());
                StageOutput::failed(update, StageError::capability(self.name(), e.to_string()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tailor::stages::testing::ScriptedAnalyst;
    use serde_json::json;

    #[tokio::test]
    async fn test_parse_sections() {
        let analyst = ScriptedAnalyst::new().respond(
            prompts::PARSE_SYSTEM_PROMPT,
            json!({
                "contact_info": {"name": "Ada"},
                "sections": [
                    {"section_name": "Experience", "section_type": "experience",
                     "content": "Built compilers", "keywords": ["compilers"]},
                    {"section_name": "Misc", "content": {"x": 1}}
                ],
                "all_keywords": ["compilers", "rust"]
            }),
        );
        let stage = ParseDocument::new(Arc::new(analyst), 4096);

        let output = stage.run(&PipelineState::new("doc", "reqs")).await;
        assert!(!output.is_failure());

        let sections = output.update.document_sections.unwrap();
        assert_eq!(sections.len(), 2);
        assert_eq!(sections[1].kind, "other");
        assert_eq!(sections[1].content, "{\"x\":1}");

        let parsed = output.update.parsed_document.unwrap();
        assert_eq!(parsed.section_count, 2);
        assert_eq!(parsed.contact_info["name"], "Ada");
        assert_eq!(output.update.workflow_stage, Some(WorkflowStage::Parsing));
    }

    #[tokio::test]
    async fn test_capability_failure() {
        let analyst = ScriptedAnalyst::new().fail(prompts::PARSE_SYSTEM_PROMPT, "timeout");
        let stage = ParseDocument::new(Arc::new(analyst), 4096);

        let output = stage.run(&PipelineState::new("doc", "reqs")).await;
        assert_eq!(output.failures.len(), 1);
        assert_eq!(output.failures[0].stage, StageName::ParseDocument);
        assert!(output.failures[0].to_string().starts_with("Document Parser error:"));
        assert_eq!(output.update.document_sections, Some(vec![]));
        assert!(output.update.parsed_document.is_none());
    }
}
