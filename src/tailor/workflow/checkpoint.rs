// SPDX-License-Identifier: MIT

//! Human checkpoints
//!
//! A checkpoint either resolves on its own from a threshold, asks a
//! [`Selector`] and waits, or (for recommendations) is deferred back to the
//! caller, who later resumes through the apply-only graph.

use crate::adk::error::TailorError;
use crate::tailor::workflow::types::{Gap, Recommendation};
use async_trait::async_trait;
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

/// What is being chosen
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionKind {
    Gaps,
    Recommendations,
}

/// One choosable entry
#[derive(Debug, Clone, PartialEq)]
pub struct SelectionItem {
    pub id: String,
    pub label: String,
    pub detail: String,
    /// Short marker such as `HIGH` or `P1`
    pub badge: String,
    /// Lower is more important
    pub rank: u8,
    /// Extra name/value pairs shown when reviewing one item at a time
    pub extra: Vec<(&'static str, String)>,
}

/// Everything a selector needs to render a choice
#[derive(Debug, Clone, PartialEq)]
pub struct SelectionPrompt {
    pub title: String,
    pub kind: SelectionKind,
    pub items: Vec<SelectionItem>,
}

impl SelectionPrompt {
    pub fn for_gaps(gaps: &[Gap]) -> Self {
        let items = gaps
            .iter()
            .map(|gap| {
                let mut extra = Vec::new();
                if let Some(req) = &gap.related_requirement {
                    extra.push(("Related requirement", req.clone()));
                }
                SelectionItem {
                    id: gap.id.clone(),
                    label: gap.gap_type.clone(),
                    detail: gap.description.clone(),
                    badge: gap.severity.as_str().to_ascii_uppercase(),
                    rank: gap.severity.rank(),
                    extra,
                }
            })
            .collect();

        Self {
            title: format!("Identified {} gaps", gaps.len()),
            kind: SelectionKind::Gaps,
            items,
        }
    }

    pub fn for_recommendations(recommendations: &[Recommendation]) -> Self {
        let items = recommendations
            .iter()
            .map(|rec| {
                let mut extra = vec![
                    ("Action", rec.action.clone()),
                    ("Rationale", rec.rationale.clone()),
                ];
                if let Some(modification) = &rec.modification {
                    extra.push(("Modification", modification.clone()));
                }
                SelectionItem {
                    id: rec.id.clone(),
                    label: rec.category.clone(),
                    detail: rec.description.clone(),
                    badge: format!("P{}", rec.priority),
                    rank: rec.priority,
                    extra,
                }
            })
            .collect();

        Self {
            title: format!("Generated {} recommendations", recommendations.len()),
            kind: SelectionKind::Recommendations,
            items,
        }
    }

    pub fn ids(&self) -> Vec<String> {
        self.items.iter().map(|i| i.id.clone()).collect()
    }

    /// Ids whose rank is at or below `max_rank`, in prompt order
    pub fn ids_up_to_rank(&self, max_rank: u8) -> Vec<String> {
        self.items
            .iter()
            .filter(|i| i.rank <= max_rank)
            .map(|i| i.id.clone())
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// Interactive collaborator that picks ids from a prompt
#[async_trait]
pub trait Selector: Send + Sync {
    async fn select(&self, prompt: &SelectionPrompt) -> Result<Vec<String>, TailorError>;
}

/// Selector that always answers with the same ids
pub struct FixedSelector {
    ids: Vec<String>,
}

impl FixedSelector {
    pub fn new<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            ids: ids.into_iter().map(Into::into).collect(),
        }
    }
}

#[async_trait]
impl Selector for FixedSelector {
    async fn select(&self, _prompt: &SelectionPrompt) -> Result<Vec<String>, TailorError> {
        Ok(self.ids.clone())
    }
}

/// Drop ids the prompt does not offer and repeated ids, keeping selector order
pub fn normalize_selection(prompt: &SelectionPrompt, raw: Vec<String>) -> Vec<String> {
    let offered: HashSet<&str> = prompt.items.iter().map(|i| i.id.as_str()).collect();
    let mut seen = HashSet::new();
    let mut selected = Vec::with_capacity(raw.len());

    for id in raw {
        if !offered.contains(id.as_str()) {
            log::warn!("Ignoring unknown selection id '{}'", id);
            continue;
        }
        if seen.insert(id.clone()) {
            selected.push(id);
        }
    }
    selected
}

/// How the Apply stage resolves which recommendations to apply when no
/// selection was supplied up front
#[derive(Clone, Default)]
pub enum ApprovalPolicy {
    /// Apply every recommendation
    #[default]
    ApplyAll,
    /// Apply recommendations with priority at or below the threshold
    AutoPriority(u8),
    /// Ask a selector and wait
    Interactive(Arc<dyn Selector>),
    /// Suspend: record that a selection is awaited and return to the caller
    Deferred,
}

impl fmt::Debug for ApprovalPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApprovalPolicy::ApplyAll => f.write_str("ApplyAll"),
            ApprovalPolicy::AutoPriority(p) => f.debug_tuple("AutoPriority").field(p).finish(),
            ApprovalPolicy::Interactive(_) => f.write_str("Interactive(..)"),
            ApprovalPolicy::Deferred => f.write_str("Deferred"),
        }
    }
}
