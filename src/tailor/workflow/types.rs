// SPDX-License-Identifier: MIT

//! Domain records carried in the pipeline state

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Identifies a stage in a compiled graph
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageName {
    #[serde(rename = "validate_inputs")]
    Validate,
    ParseDocument,
    AnalyzeRequirements,
    AnalyzeGaps,
    SelectGaps,
    GenerateRecommendations,
    #[serde(rename = "apply_recommendations")]
    Apply,
    Finalize,
}

impl StageName {
    /// Stable identifier used in graphs and logs
    pub fn as_str(&self) -> &'static str {
        match self {
            StageName::Validate => "validate_inputs",
            StageName::ParseDocument => "parse_document",
            StageName::AnalyzeRequirements => "analyze_requirements",
            StageName::AnalyzeGaps => "analyze_gaps",
            StageName::SelectGaps => "select_gaps",
            StageName::GenerateRecommendations => "generate_recommendations",
            StageName::Apply => "apply_recommendations",
            StageName::Finalize => "finalize",
        }
    }

    /// Human-readable label used in error messages
    pub fn label(&self) -> &'static str {
        match self {
            StageName::Validate => "Input Validator",
            StageName::ParseDocument => "Document Parser",
            StageName::AnalyzeRequirements => "Requirements Analyzer",
            StageName::AnalyzeGaps => "Gap Analyzer",
            StageName::SelectGaps => "Gap Selector",
            StageName::GenerateRecommendations => "Recommendation Generator",
            StageName::Apply => "Document Editor",
            StageName::Finalize => "Finalizer",
        }
    }
}

impl fmt::Display for StageName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Coarse progress label written by stages
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowStage {
    #[default]
    Pending,
    Parsing,
    AnalyzingRequirements,
    Analyzing,
    SelectingGaps,
    Generating,
    Editing,
    /// Terminal marker set by Finalize
    Complete,
}

/// Category of a recorded stage failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Missing or too-short inputs, detected before any external call
    Validation,
    /// Analysis capability transport or parse failure
    Capability,
    /// The interactive collaborator failed to return a selection
    Interaction,
}

/// One entry of the error accumulator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageError {
    pub stage: StageName,
    pub kind: ErrorKind,
    pub message: String,
}

impl StageError {
    pub fn validation(stage: StageName, message: impl Into<String>) -> Self {
        Self {
            stage,
            kind: ErrorKind::Validation,
            message: message.into(),
        }
    }

    pub fn capability(stage: StageName, message: impl Into<String>) -> Self {
        Self {
            stage,
            kind: ErrorKind::Capability,
            message: message.into(),
        }
    }

    pub fn interaction(stage: StageName, message: impl Into<String>) -> Self {
        Self {
            stage,
            kind: ErrorKind::Interaction,
            message: message.into(),
        }
    }
}

impl fmt::Display for StageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            ErrorKind::Validation => f.write_str(&self.message),
            _ => write!(f, "{} error: {}", self.stage.label(), self.message),
        }
    }
}

/// Gap severity. Lower rank is more severe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    High,
    Medium,
    Low,
}

impl Severity {
    pub fn rank(&self) -> u8 {
        match self {
            Severity::High => 1,
            Severity::Medium => 2,
            Severity::Low => 3,
        }
    }

    /// Parse a model-provided severity; anything unrecognized ranks as low
    pub fn parse_lenient(s: &str) -> Self {
        s.parse().unwrap_or(Severity::Low)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::High => "high",
            Severity::Medium => "medium",
            Severity::Low => "low",
        }
    }
}

impl std::str::FromStr for Severity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "high" => Ok(Severity::High),
            "medium" => Ok(Severity::Medium),
            "low" => Ok(Severity::Low),
            other => Err(format!("unknown severity '{}'", other)),
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A section of the source document
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct DocumentSection {
    pub name: String,
    pub kind: String,
    pub content: String,
    pub keywords: Vec<String>,
}

/// Document-level structure extracted by the parser
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ParsedDocument {
    pub contact_info: Map<String, Value>,
    pub keywords: Vec<String>,
    pub section_count: usize,
}

/// Whether a requirement is mandatory
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequirementPriority {
    Required,
    #[default]
    Preferred,
}

impl RequirementPriority {
    pub fn parse_lenient(s: &str) -> Self {
        if s.trim().eq_ignore_ascii_case("required") {
            RequirementPriority::Required
        } else {
            RequirementPriority::Preferred
        }
    }
}

/// A single requirement extracted from the requirements document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Requirement {
    pub category: String,
    pub text: String,
    pub priority: RequirementPriority,
    pub keywords: Vec<String>,
}

/// A gap between the document and the requirements
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Gap {
    pub id: String,
    pub gap_type: String,
    pub description: String,
    pub severity: Severity,
    pub related_requirement: Option<String>,
}

/// Identifier of the gap at `index` in the accumulator
pub fn gap_id(index: usize) -> String {
    format!("gap_{}", index)
}

/// Highest and lowest recommendation priority
pub const PRIORITY_HIGHEST: u8 = 1;
pub const PRIORITY_LOWEST: u8 = 5;

/// An actionable edit suggestion
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    pub id: String,
    /// 1 (highest) to 5 (lowest)
    pub priority: u8,
    pub category: String,
    pub description: String,
    pub action: String,
    pub rationale: String,
    pub modification: Option<String>,
}

/// Default identifier for the recommendation at 1-based `ordinal`
pub fn recommendation_id(ordinal: usize) -> String {
    format!("rec_{:03}", ordinal)
}

/// A change the editor reports having made
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppliedChange {
    pub recommendation_id: String,
    #[serde(alias = "change_description")]
    pub description: String,
    #[serde(alias = "section_modified")]
    pub section: String,
    pub original_text: String,
    pub new_text: String,
}

/// Summary written by the terminal stage
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RunSummary {
    pub similarity_score: f64,
    pub gap_count: usize,
    pub selected_gap_count: Option<usize>,
    pub recommendation_count: usize,
    pub applied_change_count: Option<usize>,
    pub errors: Vec<String>,
}
