// SPDX-License-Identifier: MIT

//! Routers - predicates over state that pick the next edge
//!
//! Each router declares the full set of routes it can return so the graph
//! compiler can check every route has a successor before anything runs.

use crate::tailor::workflow::state::PipelineState;
use std::fmt;

/// Edge label returned by a router
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Route {
    Continue,
    End,
    Abort,
    SelectGaps,
    GenerateRecommendations,
    ApplyEdits,
    SkipEdits,
}

impl Route {
    pub fn as_str(&self) -> &'static str {
        match self {
            Route::Continue => "continue",
            Route::End => "end",
            Route::Abort => "abort",
            Route::SelectGaps => "select_gaps",
            Route::GenerateRecommendations => "generate_recommendations",
            Route::ApplyEdits => "apply_edits",
            Route::SkipEdits => "skip_edits",
        }
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Chooses the outgoing edge of a stage
pub trait Router: Send + Sync {
    fn name(&self) -> &str;

    /// Every route `decide` can return
    fn routes(&self) -> Vec<Route>;

    fn decide(&self, state: &PipelineState) -> Route;
}

/// `end` when any error was recorded or an input is missing, else `continue`
pub struct ContinueOrEnd;

impl Router for ContinueOrEnd {
    fn name(&self) -> &str {
        "continue_or_end"
    }

    fn routes(&self) -> Vec<Route> {
        vec![Route::Continue, Route::End]
    }

    fn decide(&self, state: &PipelineState) -> Route {
        if let Some(last) = state.errors.last() {
            log::warn!("Stopping workflow due to error: {}", last);
            return Route::End;
        }
        if !state.has_inputs() {
            return Route::End;
        }
        Route::Continue
    }
}

/// `abort` on the first recorded error, else `continue`
pub struct ContinueOrAbort;

impl Router for ContinueOrAbort {
    fn name(&self) -> &str {
        "continue_or_abort"
    }

    fn routes(&self) -> Vec<Route> {
        vec![Route::Continue, Route::Abort]
    }

    fn decide(&self, state: &PipelineState) -> Route {
        match state.errors.last() {
            Some(last) => {
                log::warn!("Error detected, aborting before further analysis: {}", last);
                Route::Abort
            }
            None => Route::Continue,
        }
    }
}

/// Whether the gap checkpoint should run
pub struct SelectOrSkipSelection;

impl Router for SelectOrSkipSelection {
    fn name(&self) -> &str {
        "select_or_skip_selection"
    }

    fn routes(&self) -> Vec<Route> {
        vec![Route::SelectGaps, Route::GenerateRecommendations]
    }

    fn decide(&self, state: &PipelineState) -> Route {
        if state.gaps.is_empty() {
            return Route::GenerateRecommendations;
        }
        // Already selected, e.g. when resuming
        if state.selected_gaps.is_some() {
            return Route::GenerateRecommendations;
        }
        if state.interactive_gap_selection {
            Route::SelectGaps
        } else {
            Route::GenerateRecommendations
        }
    }
}

/// Whether there is anything to apply
pub struct ApplyOrSkip;

impl Router for ApplyOrSkip {
    fn name(&self) -> &str {
        "apply_or_skip"
    }

    fn routes(&self) -> Vec<Route> {
        vec![Route::ApplyEdits, Route::SkipEdits]
    }

    fn decide(&self, state: &PipelineState) -> Route {
        match &state.accepted_recommendations {
            Some(accepted) if !accepted.is_empty() => Route::ApplyEdits,
            Some(_) => {
                log::warn!("No recommendations accepted, skipping edits");
                Route::SkipEdits
            }
            None if !state.recommendations.is_empty() => Route::ApplyEdits,
            None => {
                log::warn!("No recommendations generated, skipping edits");
                Route::SkipEdits
            }
        }
    }
}

/// Runs [`ContinueOrAbort`] first and defers to `inner` only when not aborting
pub struct AbortFirst<R> {
    name: String,
    inner: R,
}

impl<R: Router> AbortFirst<R> {
    pub fn new(inner: R) -> Self {
        Self {
            name: format!("abort_then_{}", inner.name()),
            inner,
        }
    }
}

impl<R: Router> Router for AbortFirst<R> {
    fn name(&self) -> &str {
        &self.name
    }

    fn routes(&self) -> Vec<Route> {
        let mut routes = vec![Route::Abort];
        routes.extend(self.inner.routes().into_iter().filter(|r| *r != Route::Abort));
        routes
    }

    fn decide(&self, state: &PipelineState) -> Route {
        if ContinueOrAbort.decide(state) == Route::Abort {
            return Route::Abort;
        }
        self.inner.decide(state)
    }
}
