// SPDX-License-Identifier: MIT

//! Model access layer: provider clients, the structured analysis capability,
//! and the crate-wide error types.

pub mod analyst;
pub mod error;
pub mod model;
