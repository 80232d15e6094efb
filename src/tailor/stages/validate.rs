// SPDX-License-Identifier: MIT

use crate::tailor::config::InputLimits;
use crate::tailor::workflow::stage::{Stage, StageOutput};
use crate::tailor::workflow::state::{Field, PipelineState, StateUpdate};
use crate::tailor::workflow::types::{StageError, StageName};
use async_trait::async_trait;

/// Checks both inputs are present and long enough
pub struct ValidateInputs {
    limits: InputLimits,
}

impl ValidateInputs {
    pub fn new(limits: InputLimits) -> Self {
        Self { limits }
    }

    fn check(&self, state: &PipelineState) -> Vec<StageError> {
        let mut failures = Vec::new();

        if state.source_document.trim().is_empty() {
            failures.push(StageError::validation(
                StageName::Validate,
                "Document content is empty",
            ));
        } else if state.source_document.chars().count() < self.limits.min_document_len {
            failures.push(StageError::validation(
                StageName::Validate,
                format!(
                    "Document appears too short (less than {} characters)",
                    self.limits.min_document_len
                ),
            ));
        }

        if state.requirements_text.trim().is_empty() {
            failures.push(StageError::validation(
                StageName::Validate,
                "Requirements text is empty",
            ));
        } else if state.requirements_text.chars().count() < self.limits.min_requirements_len {
            failures.push(StageError::validation(
                StageName::Validate,
                format!(
                    "Requirements text appears too short (less than {} characters)",
                    self.limits.min_requirements_len
                ),
            ));
        }

        failures
    }
}

impl Default for ValidateInputs {
    fn default() -> Self {
        Self::new(InputLimits::default())
    }
}

#[async_trait]
impl Stage for ValidateInputs {
    fn name(&self) -> StageName {
        StageName::Validate
    }

    fn writes(&self) -> &'static [Field] {
        &[]
    }

    async fn run(&self, state: &PipelineState) -> StageOutput {
        let failures = self.check(state);
        if failures.is_empty() {
            log::info!("Inputs validated");
        }
        StageOutput {
            update: StateUpdate::new(),
            failures,
        }
    }
}
