// SPDX-License-Identifier: MIT

pub mod config;
pub mod documents;
pub mod prompts;
pub mod stages;
pub mod ui;
pub mod workflow;
