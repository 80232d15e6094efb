// SPDX-License-Identifier: MIT

//! Graph-based workflow execution
//!
//! Stages are wired into a `StateGraph`, validated once by `compile`, and the
//! resulting `CompiledGraph` walks edges from the entry stage to the terminal.

mod builder;
pub mod executor;

pub use builder::{Edge, StateGraph};
pub use executor::{CompiledGraph, CompiledNode, GraphRun, MAX_STEPS};
