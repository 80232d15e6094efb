// SPDX-License-Identifier: MIT

pub mod checkpoint;
pub mod graph;
pub mod pipeline;
pub mod router;
pub mod stage;
pub mod state;
pub mod types;
