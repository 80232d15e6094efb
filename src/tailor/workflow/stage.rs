// SPDX-License-Identifier: MIT

//! Stage trait - one unit of pipeline work

use crate::tailor::workflow::state::{Field, PipelineState, StateUpdate};
use crate::tailor::workflow::types::{StageError, StageName};
use async_trait::async_trait;

/// What a stage hands back to the engine
///
/// Failures travel as values next to the partial update; the engine appends
/// them to the error accumulator.
#[derive(Debug, Clone, Default)]
pub struct StageOutput {
    pub update: StateUpdate,
    pub failures: Vec<StageError>,
}

impl StageOutput {
    pub fn ok(update: StateUpdate) -> Self {
        Self {
            update,
            failures: Vec::new(),
        }
    }

    pub fn failed(update: StateUpdate, failure: StageError) -> Self {
        Self {
            update,
            failures: vec![failure],
        }
    }

    pub fn is_failure(&self) -> bool {
        !self.failures.is_empty()
    }
}

/// Core trait for pipeline stages
#[async_trait]
pub trait Stage: Send + Sync {
    /// Name of this stage in the graph
    fn name(&self) -> StageName;

    /// Fields this stage may write
    ///
    /// The error accumulator is not listed here; failures are reported
    /// through [`StageOutput::failures`].
    fn writes(&self) -> &'static [Field];

    /// Run the stage against the current state
    async fn run(&self, state: &PipelineState) -> StageOutput;
}
