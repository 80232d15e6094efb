// SPDX-License-Identifier: MIT

//! tailor-rs: tailor a structured document to a requirements document
//! through a checkpointed, LLM-backed workflow graph.

pub mod adk;
pub mod tailor;
