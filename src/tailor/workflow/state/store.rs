// SPDX-License-Identifier: MIT

//! Runtime state storage for pipeline execution

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::schema::{Field, FieldKind};
use crate::tailor::workflow::types::{
    AppliedChange, DocumentSection, Gap, ParsedDocument, Recommendation, Requirement, RunSummary,
    Severity, StageError, StageName, WorkflowStage,
};

/// The record threaded through every stage of one pipeline run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineState {
    pub run_id: String,

    // Inputs
    pub source_document: String,
    pub requirements_text: String,
    pub document_path: Option<String>,
    pub requirements_path: Option<String>,

    // Document parsing
    pub parsed_document: Option<ParsedDocument>,
    pub document_sections: Vec<DocumentSection>,

    // Requirements analysis
    pub requirements: Vec<Requirement>,
    pub requirement_keywords: Vec<String>,
    pub requirements_title: Option<String>,
    pub organization: Option<String>,

    // Gap analysis
    pub similarity_score: Option<f64>,
    pub keyword_overlap: Option<f64>,
    pub gaps: Vec<Gap>,
    pub selected_gaps: Option<Vec<String>>,

    // Recommendations
    pub recommendations: Vec<Recommendation>,
    pub accepted_recommendations: Option<Vec<String>>,
    pub rejected_recommendations: Option<Vec<String>>,

    // Editing
    pub modified_document: Option<String>,
    pub applied_changes: Vec<AppliedChange>,

    // Workflow control
    pub current_stage: Option<StageName>,
    pub workflow_stage: WorkflowStage,
    pub summary: Option<RunSummary>,
    pub errors: Vec<StageError>,
    pub interactive_gap_selection: bool,
    pub auto_gap_severity: Option<Severity>,
    pub awaiting_selection: bool,
}

impl Default for PipelineState {
    fn default() -> Self {
        Self {
            run_id: uuid::Uuid::new_v4().to_string(),
            source_document: String::new(),
            requirements_text: String::new(),
            document_path: None,
            requirements_path: None,
            parsed_document: None,
            document_sections: Vec::new(),
            requirements: Vec::new(),
            requirement_keywords: Vec::new(),
            requirements_title: None,
            organization: None,
            similarity_score: None,
            keyword_overlap: None,
            gaps: Vec::new(),
            selected_gaps: None,
            recommendations: Vec::new(),
            accepted_recommendations: None,
            rejected_recommendations: None,
            modified_document: None,
            applied_changes: Vec::new(),
            current_stage: None,
            workflow_stage: WorkflowStage::Pending,
            summary: None,
            errors: Vec::new(),
            interactive_gap_selection: true,
            auto_gap_severity: None,
            awaiting_selection: false,
        }
    }
}

impl PipelineState {
    /// Fresh state for a new run
    pub fn new(source_document: impl Into<String>, requirements_text: impl Into<String>) -> Self {
        Self {
            source_document: source_document.into(),
            requirements_text: requirements_text.into(),
            ..Default::default()
        }
    }

    pub fn with_paths(
        mut self,
        document_path: Option<String>,
        requirements_path: Option<String>,
    ) -> Self {
        self.document_path = document_path;
        self.requirements_path = requirements_path;
        self
    }

    pub fn with_gap_selection(mut self, interactive: bool, auto_severity: Option<Severity>) -> Self {
        self.interactive_gap_selection = interactive;
        self.auto_gap_severity = auto_severity;
        self
    }

    /// Merge a partial update, returning the new state
    pub fn merge(mut self, update: StateUpdate) -> Self {
        self.apply_update(update);
        self
    }

    /// Merge a partial update in place
    ///
    /// Accumulator fields are extended, every other present field is replaced,
    /// absent fields are left untouched. Never fails.
    pub fn apply_update(&mut self, update: StateUpdate) {
        merge_value(&mut self.source_document, update.source_document);
        merge_value(&mut self.requirements_text, update.requirements_text);
        merge_value(&mut self.document_path, update.document_path.map(Some));
        merge_value(&mut self.requirements_path, update.requirements_path.map(Some));

        merge_value(&mut self.parsed_document, update.parsed_document.map(Some));
        merge_list(
            Field::DocumentSections,
            &mut self.document_sections,
            update.document_sections,
        );

        merge_list(Field::Requirements, &mut self.requirements, update.requirements);
        merge_list(
            Field::RequirementKeywords,
            &mut self.requirement_keywords,
            update.requirement_keywords,
        );
        merge_value(
            &mut self.requirements_title,
            update.requirements_title.map(Some),
        );
        merge_value(&mut self.organization, update.organization.map(Some));

        merge_value(&mut self.similarity_score, update.similarity_score.map(Some));
        merge_value(&mut self.keyword_overlap, update.keyword_overlap.map(Some));
        merge_list(Field::Gaps, &mut self.gaps, update.gaps);
        merge_value(&mut self.selected_gaps, update.selected_gaps.map(Some));

        merge_list(
            Field::Recommendations,
            &mut self.recommendations,
            update.recommendations,
        );
        merge_value(
            &mut self.accepted_recommendations,
            update.accepted_recommendations.map(Some),
        );
        merge_value(
            &mut self.rejected_recommendations,
            update.rejected_recommendations.map(Some),
        );

        merge_value(
            &mut self.modified_document,
            update.modified_document.map(Some),
        );
        merge_list(
            Field::AppliedChanges,
            &mut self.applied_changes,
            update.applied_changes,
        );

        merge_value(&mut self.workflow_stage, update.workflow_stage);
        merge_value(&mut self.summary, update.summary.map(Some));
        merge_list(Field::Errors, &mut self.errors, update.errors);
        merge_value(
            &mut self.interactive_gap_selection,
            update.interactive_gap_selection,
        );
        merge_value(
            &mut self.auto_gap_severity,
            update.auto_gap_severity.map(Some),
        );
        merge_value(&mut self.awaiting_selection, update.awaiting_selection);
    }

    /// Both required inputs are present
    pub fn has_inputs(&self) -> bool {
        !self.source_document.trim().is_empty() && !self.requirements_text.trim().is_empty()
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    /// Whether the apply-only graph can run from this state
    pub fn is_resumable(&self) -> bool {
        !self.recommendations.is_empty() && !self.source_document.trim().is_empty()
    }

    /// Gaps narrowed to the current selection (all gaps when nothing was selected)
    pub fn selected_gap_records(&self) -> Vec<&Gap> {
        match &self.selected_gaps {
            Some(ids) => self.gaps.iter().filter(|g| ids.contains(&g.id)).collect(),
            None => self.gaps.iter().collect(),
        }
    }

    /// Human-readable error strings, in the order they were recorded
    pub fn error_messages(&self) -> Vec<String> {
        self.errors.iter().map(|e| e.to_string()).collect()
    }

    /// Convert state to a JSON value (every field, accumulators in full)
    pub fn to_json(&self) -> Result<Value, serde_json::Error> {
        serde_json::to_value(self)
    }

    /// Restore state from a JSON value
    pub fn from_json(value: Value) -> Result<Self, serde_json::Error> {
        serde_json::from_value(value)
    }
}

fn merge_value<T>(slot: &mut T, incoming: Option<T>) {
    if let Some(value) = incoming {
        *slot = value;
    }
}

fn merge_list<T>(field: Field, slot: &mut Vec<T>, incoming: Option<Vec<T>>) {
    let Some(values) = incoming else {
        return;
    };
    match field.kind() {
        FieldKind::Accumulator => slot.extend(values),
        FieldKind::Overwrite | FieldKind::Control => *slot = values,
    }
}

/// A partial state update; `None` means "not written"
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StateUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_document: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub requirements_text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub document_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub requirements_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parsed_document: Option<ParsedDocument>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub document_sections: Option<Vec<DocumentSection>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub requirements: Option<Vec<Requirement>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub requirement_keywords: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub requirements_title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub organization: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub similarity_score: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub keyword_overlap: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gaps: Option<Vec<Gap>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub selected_gaps: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recommendations: Option<Vec<Recommendation>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub accepted_recommendations: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rejected_recommendations: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub modified_document: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub applied_changes: Option<Vec<AppliedChange>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub workflow_stage: Option<WorkflowStage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<RunSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub errors: Option<Vec<StageError>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub interactive_gap_selection: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auto_gap_severity: Option<Severity>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub awaiting_selection: Option<bool>,
}

impl StateUpdate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stage(workflow_stage: WorkflowStage) -> Self {
        Self {
            workflow_stage: Some(workflow_stage),
            ..Default::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.fields().is_empty()
    }

    /// Fields this update writes
    pub fn fields(&self) -> Vec<Field> {
        Field::ALL
            .iter()
            .copied()
            .filter(|f| self.writes(*f))
            .collect()
    }

    fn writes(&self, field: Field) -> bool {
        match field {
            Field::SourceDocument => self.source_document.is_some(),
            Field::RequirementsText => self.requirements_text.is_some(),
            Field::DocumentPath => self.document_path.is_some(),
            Field::RequirementsPath => self.requirements_path.is_some(),
            Field::ParsedDocument => self.parsed_document.is_some(),
            Field::DocumentSections => self.document_sections.is_some(),
            Field::Requirements => self.requirements.is_some(),
            Field::RequirementKeywords => self.requirement_keywords.is_some(),
            Field::RequirementsTitle => self.requirements_title.is_some(),
            Field::Organization => self.organization.is_some(),
            Field::SimilarityScore => self.similarity_score.is_some(),
            Field::KeywordOverlap => self.keyword_overlap.is_some(),
            Field::Gaps => self.gaps.is_some(),
            Field::SelectedGaps => self.selected_gaps.is_some(),
            Field::Recommendations => self.recommendations.is_some(),
            Field::AcceptedRecommendations => self.accepted_recommendations.is_some(),
            Field::RejectedRecommendations => self.rejected_recommendations.is_some(),
            Field::ModifiedDocument => self.modified_document.is_some(),
            Field::AppliedChanges => self.applied_changes.is_some(),
            Field::WorkflowStage => self.workflow_stage.is_some(),
            Field::Summary => self.summary.is_some(),
            Field::Errors => self.errors.is_some(),
            Field::InteractiveGapSelection => self.interactive_gap_selection.is_some(),
            Field::AutoGapSeverity => self.auto_gap_severity.is_some(),
            Field::AwaitingSelection => self.awaiting_selection.is_some(),
            // Written by the caller and the engine only
            Field::RunId | Field::CurrentStage => false,
        }
    }

    fn clear(&mut self, field: Field) {
        match field {
            Field::SourceDocument => self.source_document = None,
            Field::RequirementsText => self.requirements_text = None,
            Field::DocumentPath => self.document_path = None,
            Field::RequirementsPath => self.requirements_path = None,
            Field::ParsedDocument => self.parsed_document = None,
            Field::DocumentSections => self.document_sections = None,
            Field::Requirements => self.requirements = None,
            Field::RequirementKeywords => self.requirement_keywords = None,
            Field::RequirementsTitle => self.requirements_title = None,
            Field::Organization => self.organization = None,
            Field::SimilarityScore => self.similarity_score = None,
            Field::KeywordOverlap => self.keyword_overlap = None,
            Field::Gaps => self.gaps = None,
            Field::SelectedGaps => self.selected_gaps = None,
            Field::Recommendations => self.recommendations = None,
            Field::AcceptedRecommendations => self.accepted_recommendations = None,
            Field::RejectedRecommendations => self.rejected_recommendations = None,
            Field::ModifiedDocument => self.modified_document = None,
            Field::AppliedChanges => self.applied_changes = None,
            Field::WorkflowStage => self.workflow_stage = None,
            Field::Summary => self.summary = None,
            Field::Errors => self.errors = None,
            Field::InteractiveGapSelection => self.interactive_gap_selection = None,
            Field::AutoGapSeverity => self.auto_gap_severity = None,
            Field::AwaitingSelection => self.awaiting_selection = None,
            Field::RunId | Field::CurrentStage => {}
        }
    }

    /// Drop every written field not in `allowed`, returning what was dropped
    pub fn retain_fields(&mut self, allowed: &[Field]) -> Vec<Field> {
        let dropped: Vec<Field> = self
            .fields()
            .into_iter()
            .filter(|f| !allowed.contains(f))
            .collect();
        for field in &dropped {
            self.clear(*field);
        }
        dropped
    }

    /// Build an update from loosely-typed JSON
    ///
    /// Unknown keys and values of the wrong shape are skipped with a warning
    /// instead of failing the whole update.
    pub fn from_json_lossy(value: &Value) -> Self {
        let Some(obj) = value.as_object() else {
            log::warn!("Ignoring non-object state update: {}", value);
            return Self::default();
        };

        let mut accepted = Map::new();
        for (key, v) in obj {
            if Field::from_name(key).is_none() {
                log::warn!("Ignoring unknown state field '{}'", key);
                continue;
            }
            let mut single = Map::new();
            single.insert(key.clone(), v.clone());
            match serde_json::from_value::<StateUpdate>(Value::Object(single)) {
                Ok(_) => {
                    accepted.insert(key.clone(), v.clone());
                }
                Err(e) => log::warn!("Ignoring malformed value for '{}': {}", key, e),
            }
        }

        serde_json::from_value(Value::Object(accepted)).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tailor::workflow::types::{ErrorKind, RequirementPriority};
    use serde_json::json;

    fn gap(id: &str, severity: Severity) -> Gap {
        Gap {
            id: id.to_string(),
            gap_type: "missing_skill".to_string(),
            description: format!("gap {}", id),
            severity,
            related_requirement: None,
        }
    }

    #[test]
    fn test_new_state_defaults() {
        let state = PipelineState::new("doc", "reqs");
        assert_eq!(state.source_document, "doc");
        assert!(state.interactive_gap_selection);
        assert!(state.errors.is_empty());
        assert_eq!(state.workflow_stage, WorkflowStage::Pending);
        assert!(!state.run_id.is_empty());
    }

    #[test]
    fn test_overwrite_field() {
        let mut state = PipelineState::new("doc", "reqs");

        state.apply_update(StateUpdate {
            similarity_score: Some(40.0),
            ..Default::default()
        });
        state.apply_update(StateUpdate {
            similarity_score: Some(75.5),
            ..Default::default()
        });

        assert_eq!(state.similarity_score, Some(75.5));
    }

    #[test]
    fn test_accumulator_appends_in_order() {
        let mut state = PipelineState::new("doc", "reqs");

        state.apply_update(StateUpdate {
            gaps: Some(vec![gap("gap_0", Severity::High)]),
            ..Default::default()
        });
        state.apply_update(StateUpdate {
            gaps: Some(vec![gap("gap_1", Severity::Low), gap("gap_0", Severity::High)]),
            ..Default::default()
        });

        let ids: Vec<&str> = state.gaps.iter().map(|g| g.id.as_str()).collect();
        assert_eq!(ids, vec!["gap_0", "gap_1", "gap_0"]);
    }

    #[test]
    fn test_empty_update_is_prefix_stable() {
        let mut state = PipelineState::new("doc", "reqs");
        state.apply_update(StateUpdate {
            gaps: Some(vec![gap("gap_0", Severity::High), gap("gap_1", Severity::Low)]),
            errors: Some(vec![StageError::capability(StageName::ParseDocument, "x")]),
            ..Default::default()
        });
        let before = state.clone();

        let after = state.merge(StateUpdate::default());
        assert_eq!(after, before);
    }

    #[test]
    fn test_absent_fields_untouched() {
        let mut state = PipelineState::new("doc", "reqs");
        state.requirements_title = Some("Engineer".to_string());

        state.apply_update(StateUpdate {
            organization: Some("Acme".to_string()),
            ..Default::default()
        });

        assert_eq!(state.requirements_title.as_deref(), Some("Engineer"));
        assert_eq!(state.organization.as_deref(), Some("Acme"));
    }

    #[test]
    fn test_overwrite_list_replaces() {
        let mut state = PipelineState::new("doc", "reqs");
        let req = |text: &str| Requirement {
            category: "technical_skills".to_string(),
            text: text.to_string(),
            priority: RequirementPriority::Required,
            keywords: vec![],
        };

        state.apply_update(StateUpdate {
            requirements: Some(vec![req("Rust"), req("Go")]),
            ..Default::default()
        });
        state.apply_update(StateUpdate {
            requirements: Some(vec![req("Python")]),
            ..Default::default()
        });

        assert_eq!(state.requirements.len(), 1);
        assert_eq!(state.requirements[0].text, "Python");
    }

    #[test]
    fn test_fields_and_retain() {
        let mut update = StateUpdate {
            gaps: Some(vec![]),
            similarity_score: Some(1.0),
            modified_document: Some("x".to_string()),
            ..Default::default()
        };
        assert_eq!(
            update.fields(),
            vec![Field::SimilarityScore, Field::Gaps, Field::ModifiedDocument]
        );

        let dropped = update.retain_fields(&[Field::Gaps, Field::SimilarityScore]);
        assert_eq!(dropped, vec![Field::ModifiedDocument]);
        assert!(update.modified_document.is_none());
        assert_eq!(update.fields(), vec![Field::SimilarityScore, Field::Gaps]);
    }

    #[test]
    fn test_lossy_json_ignores_unknown_and_malformed() {
        let update = StateUpdate::from_json_lossy(&json!({
            "similarity_score": 80,
            "job_title": "Engineer",
            "gaps": "not a list",
            "selected_gaps": ["gap_0"]
        }));

        assert_eq!(update.similarity_score, Some(80.0));
        assert_eq!(update.selected_gaps, Some(vec!["gap_0".to_string()]));
        assert!(update.gaps.is_none());
        assert_eq!(
            update.fields(),
            vec![Field::SimilarityScore, Field::SelectedGaps]
        );
    }

    #[test]
    fn test_lossy_json_non_object() {
        assert!(StateUpdate::from_json_lossy(&json!([1, 2])).is_empty());
    }

    #[test]
    fn test_selected_gap_records() {
        let mut state = PipelineState::new("doc", "reqs");
        state.gaps = vec![gap("gap_0", Severity::High), gap("gap_1", Severity::Low)];
        assert_eq!(state.selected_gap_records().len(), 2);

        state.selected_gaps = Some(vec!["gap_1".to_string()]);
        let selected = state.selected_gap_records();
        assert_eq!(selected.len(), 1);
        assert_eq!(selected[0].id, "gap_1");

        state.selected_gaps = Some(vec![]);
        assert!(state.selected_gap_records().is_empty());
    }

    #[test]
    fn test_json_snapshot_keeps_accumulators() {
        let mut state = PipelineState::new("doc", "reqs");
        state.gaps = vec![gap("gap_0", Severity::Medium)];
        state.errors = vec![StageError::validation(StageName::Validate, "too short")];
        state.accepted_recommendations = Some(vec!["rec_001".to_string()]);

        let restored = PipelineState::from_json(state.to_json().unwrap()).unwrap();
        assert_eq!(restored, state);
        assert_eq!(restored.errors[0].kind, ErrorKind::Validation);
    }
}
