// SPDX-License-Identifier: MIT

//! State schema: the fixed field set and each field's merge policy

use serde::{Deserialize, Serialize};
use std::fmt;

/// Merge policy for a state field
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum FieldKind {
    /// Replace the value; last writer wins
    Overwrite,
    /// Append to the existing ordered sequence
    Accumulator,
    /// Set by the caller or by checkpoint resumption, read by routers
    Control,
}

/// Every field of [`PipelineState`](super::PipelineState)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Field {
    RunId,
    SourceDocument,
    RequirementsText,
    DocumentPath,
    RequirementsPath,
    ParsedDocument,
    DocumentSections,
    Requirements,
    RequirementKeywords,
    RequirementsTitle,
    Organization,
    SimilarityScore,
    KeywordOverlap,
    Gaps,
    SelectedGaps,
    Recommendations,
    AcceptedRecommendations,
    RejectedRecommendations,
    ModifiedDocument,
    AppliedChanges,
    CurrentStage,
    WorkflowStage,
    Summary,
    Errors,
    InteractiveGapSelection,
    AutoGapSeverity,
    AwaitingSelection,
}

impl Field {
    pub const ALL: [Field; 27] = [
        Field::RunId,
        Field::SourceDocument,
        Field::RequirementsText,
        Field::DocumentPath,
        Field::RequirementsPath,
        Field::ParsedDocument,
        Field::DocumentSections,
        Field::Requirements,
        Field::RequirementKeywords,
        Field::RequirementsTitle,
        Field::Organization,
        Field::SimilarityScore,
        Field::KeywordOverlap,
        Field::Gaps,
        Field::SelectedGaps,
        Field::Recommendations,
        Field::AcceptedRecommendations,
        Field::RejectedRecommendations,
        Field::ModifiedDocument,
        Field::AppliedChanges,
        Field::CurrentStage,
        Field::WorkflowStage,
        Field::Summary,
        Field::Errors,
        Field::InteractiveGapSelection,
        Field::AutoGapSeverity,
        Field::AwaitingSelection,
    ];

    /// Merge policy of this field
    pub fn kind(&self) -> FieldKind {
        match self {
            Field::Errors | Field::Gaps | Field::Recommendations => FieldKind::Accumulator,

            Field::RunId
            | Field::SourceDocument
            | Field::RequirementsText
            | Field::DocumentPath
            | Field::RequirementsPath
            | Field::SelectedGaps
            | Field::AcceptedRecommendations
            | Field::RejectedRecommendations
            | Field::InteractiveGapSelection
            | Field::AutoGapSeverity
            | Field::AwaitingSelection => FieldKind::Control,

            Field::ParsedDocument
            | Field::DocumentSections
            | Field::Requirements
            | Field::RequirementKeywords
            | Field::RequirementsTitle
            | Field::Organization
            | Field::SimilarityScore
            | Field::KeywordOverlap
            | Field::ModifiedDocument
            | Field::AppliedChanges
            | Field::CurrentStage
            | Field::WorkflowStage
            | Field::Summary => FieldKind::Overwrite,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Field::RunId => "run_id",
            Field::SourceDocument => "source_document",
            Field::RequirementsText => "requirements_text",
            Field::DocumentPath => "document_path",
            Field::RequirementsPath => "requirements_path",
            Field::ParsedDocument => "parsed_document",
            Field::DocumentSections => "document_sections",
            Field::Requirements => "requirements",
            Field::RequirementKeywords => "requirement_keywords",
            Field::RequirementsTitle => "requirements_title",
            Field::Organization => "organization",
            Field::SimilarityScore => "similarity_score",
            Field::KeywordOverlap => "keyword_overlap",
            Field::Gaps => "gaps",
            Field::SelectedGaps => "selected_gaps",
            Field::Recommendations => "recommendations",
            Field::AcceptedRecommendations => "accepted_recommendations",
            Field::RejectedRecommendations => "rejected_recommendations",
            Field::ModifiedDocument => "modified_document",
            Field::AppliedChanges => "applied_changes",
            Field::CurrentStage => "current_stage",
            Field::WorkflowStage => "workflow_stage",
            Field::Summary => "summary",
            Field::Errors => "errors",
            Field::InteractiveGapSelection => "interactive_gap_selection",
            Field::AutoGapSeverity => "auto_gap_severity",
            Field::AwaitingSelection => "awaiting_selection",
        }
    }

    /// Look up a field by its serialized name
    pub fn from_name(name: &str) -> Option<Field> {
        Field::ALL.iter().copied().find(|f| f.as_str() == name)
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
