// SPDX-License-Identifier: MIT

//! State management for the pipeline
//!
//! This module provides:
//! - `Field` / `FieldKind` - the fixed field set and each field's merge policy
//! - `PipelineState` - the record threaded through every stage
//! - `StateUpdate` - a stage's partial output, merged by the engine

mod schema;
mod store;

pub use schema::{Field, FieldKind};
pub use store::{PipelineState, StateUpdate};
