// SPDX-License-Identifier: MIT

//! Terminal rendering and the interactive selector

use crate::adk::error::TailorError;
use crate::tailor::prompts::truncate_chars;
use crate::tailor::workflow::checkpoint::{SelectionItem, SelectionKind, SelectionPrompt, Selector};
use crate::tailor::workflow::state::PipelineState;
use crate::tailor::workflow::types::AppliedChange;
use async_trait::async_trait;
use comfy_table::{presets::UTF8_FULL_CONDENSED, Cell, Color, ContentArrangement, Table};
use similar::TextDiff;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader, Lines, Stdin};
use tokio::sync::Mutex;

const DETAIL_WIDTH: usize = 60;
const DIFF_CONTEXT_LINES: usize = 3;

fn new_table(headers: &[&str]) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL_CONDENSED)
        .set_content_arrangement(ContentArrangement::Dynamic);

    let header_cells: Vec<Cell> = headers
        .iter()
        .map(|h| Cell::new(h).fg(Color::Cyan))
        .collect();
    table.set_header(header_cells);
    table
}

fn rank_color(rank: u8) -> Color {
    match rank {
        1 => Color::Red,
        2 => Color::Yellow,
        3 => Color::Cyan,
        _ => Color::Grey,
    }
}

fn shorten(text: &str, width: usize) -> String {
    if text.chars().count() > width {
        format!("{}...", truncate_chars(text, width))
    } else {
        text.to_string()
    }
}

/// Table of choosable items
pub fn selection_table(prompt: &SelectionPrompt) -> Table {
    let label = match prompt.kind {
        SelectionKind::Gaps => "Type",
        SelectionKind::Recommendations => "Category",
    };
    let rank = match prompt.kind {
        SelectionKind::Gaps => "Severity",
        SelectionKind::Recommendations => "Priority",
    };

    let mut table = new_table(&["ID", rank, label, "Description"]);
    for item in &prompt.items {
        table.add_row(vec![
            Cell::new(&item.id),
            Cell::new(&item.badge).fg(rank_color(item.rank)),
            Cell::new(&item.label),
            Cell::new(shorten(&item.detail, DETAIL_WIDTH)),
        ]);
    }
    table
}

/// Final results of a run
pub fn summary_table(state: &PipelineState) -> Table {
    let mut table = new_table(&["Metric", "Value"]);

    if let Some(title) = &state.requirements_title {
        let target = match &state.organization {
            Some(org) => format!("{} at {}", title, org),
            None => title.clone(),
        };
        table.add_row(vec!["Target".to_string(), target]);
    }

    if let Some(summary) = &state.summary {
        table.add_row(vec![
            "Similarity score".to_string(),
            format!("{:.1}/100", summary.similarity_score),
        ]);
        table.add_row(vec!["Gaps".to_string(), summary.gap_count.to_string()]);
        if let Some(selected) = summary.selected_gap_count {
            table.add_row(vec!["Gaps selected".to_string(), selected.to_string()]);
        }
        table.add_row(vec![
            "Recommendations".to_string(),
            summary.recommendation_count.to_string(),
        ]);
        if let Some(applied) = summary.applied_change_count {
            table.add_row(vec!["Changes applied".to_string(), applied.to_string()]);
        }
        table.add_row(vec![
            Cell::new("Errors"),
            Cell::new(summary.errors.len()).fg(if summary.errors.is_empty() {
                Color::Green
            } else {
                Color::Red
            }),
        ]);
    }
    table
}

pub fn changes_table(changes: &[AppliedChange]) -> Table {
    let mut table = new_table(&["Recommendation", "Section", "Change"]);
    for change in changes {
        table.add_row(vec![
            change.recommendation_id.clone(),
            change.section.clone(),
            shorten(&change.description, DETAIL_WIDTH),
        ]);
    }
    table
}

/// Unified diff of the source and edited documents, `None` when they match
pub fn unified_diff(original: &str, modified: &str) -> Option<String> {
    if original == modified {
        return None;
    }
    let diff = TextDiff::from_lines(original, modified)
        .unified_diff()
        .context_radius(DIFF_CONTEXT_LINES)
        .header("Original Resume", "Optimized Resume")
        .to_string();
    Some(diff)
}

fn item_details(item: &SelectionItem) -> String {
    let mut out = format!(
        "{} [{}] {}\n\n{}\n",
        item.id, item.badge, item.label, item.detail
    );
    for (name, value) in &item.extra {
        out.push_str(&format!("\n{}:\n{}\n", name, value));
    }
    out
}

/// [`Selector`] that renders to stdout and reads answers line by line
pub struct TerminalSelector<R = BufReader<Stdin>> {
    input: Mutex<Lines<R>>,
}

impl TerminalSelector {
    pub fn stdin() -> Self {
        Self::new(BufReader::new(tokio::io::stdin()))
    }
}

impl<R: AsyncBufRead + Unpin + Send> TerminalSelector<R> {
    pub fn new(reader: R) -> Self {
        Self {
            input: Mutex::new(reader.lines()),
        }
    }

    /// Ask until the answer is one of `choices`; blank means `default`
    async fn ask(&self, question: &str, choices: &[&str], default: &str) -> Result<String, TailorError> {
        let mut lines = self.input.lock().await;
        loop {
            println!("{} [{}] ({}): ", question, choices.join("/"), default);
            let line = lines
                .next_line()
                .await?
                .ok_or_else(|| TailorError::selection("input closed before a choice was made"))?;

            let answer = line.trim().to_ascii_lowercase();
            if answer.is_empty() {
                return Ok(default.to_string());
            }
            if choices.contains(&answer.as_str()) {
                return Ok(answer);
            }
            println!("Please choose one of: {}", choices.join(", "));
        }
    }

    async fn review_individually(&self, prompt: &SelectionPrompt) -> Result<Vec<String>, TailorError> {
        let total = prompt.items.len();
        let mut selected = Vec::new();
        for (i, item) in prompt.items.iter().enumerate() {
            println!("\n--- {}/{} ---\n{}", i + 1, total, item_details(item));
            if self.ask("Include this item?", &["y", "n"], "y").await? == "y" {
                selected.push(item.id.clone());
            }
        }
        println!("Selected {}/{}", selected.len(), total);
        Ok(selected)
    }

    async fn select_by_threshold(&self, prompt: &SelectionPrompt) -> Result<Vec<String>, TailorError> {
        let max_rank: u8 = match prompt.kind {
            SelectionKind::Gaps => {
                println!("  1. HIGH severity only");
                println!("  2. HIGH + MEDIUM severity");
                println!("  3. All severities");
                self.ask("Choose severity threshold", &["1", "2", "3"], "2")
                    .await?
                    .parse()
                    .unwrap_or(2)
            }
            SelectionKind::Recommendations => self
                .ask("Select recommendations with priority up to", &["1", "2", "3", "4", "5"], "2")
                .await?
                .parse()
                .unwrap_or(2),
        };
        Ok(prompt.ids_up_to_rank(max_rank))
    }
}

#[async_trait]
impl<R: AsyncBufRead + Unpin + Send> Selector for TerminalSelector<R> {
    async fn select(&self, prompt: &SelectionPrompt) -> Result<Vec<String>, TailorError> {
        if prompt.is_empty() {
            println!("Nothing to select.");
            return Ok(Vec::new());
        }

        println!("\n{}:\n{}", prompt.title, selection_table(prompt));

        let noun = match prompt.kind {
            SelectionKind::Gaps => "gaps",
            SelectionKind::Recommendations => "recommendations",
        };
        println!("\nSelection options:");
        println!("  1. Accept all {}", noun);
        println!("  2. Review and select individually");
        println!("  3. Select by threshold");
        println!("  4. Skip all");

        let selected = match self.ask("Choose an option", &["1", "2", "3", "4"], "2").await?.as_str() {
            "1" => prompt.ids(),
            "2" => self.review_individually(prompt).await?,
            "3" => self.select_by_threshold(prompt).await?,
            _ => Vec::new(),
        };
        println!("Selected {} of {} {}", selected.len(), prompt.items.len(), noun);
        Ok(selected)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tailor::workflow::types::{Gap, Recommendation, RunSummary, Severity};

    fn gaps_prompt() -> SelectionPrompt {
        let gaps: Vec<Gap> = [Severity::High, Severity::Low, Severity::Medium]
            .into_iter()
            .enumerate()
            .map(|(i, severity)| Gap {
                id: format!("gap_{}", i),
                gap_type: "missing_skill".to_string(),
                description: "x".repeat(80),
                severity,
                related_requirement: None,
            })
            .collect();
        SelectionPrompt::for_gaps(&gaps)
    }

    fn selector(input: &'static str) -> TerminalSelector<&'static [u8]> {
        TerminalSelector::new(input.as_bytes())
    }

    #[tokio::test]
    async fn test_accept_all() {
        let ids = selector("1\n").select(&gaps_prompt()).await.unwrap();
        assert_eq!(ids, vec!["gap_0", "gap_1", "gap_2"]);
    }

    #[tokio::test]
    async fn test_individual_review_with_defaults() {
        // Blank picks the default option (review), then y / n / blank(y)
        let ids = selector("\ny\nn\n\n").select(&gaps_prompt()).await.unwrap();
        assert_eq!(ids, vec!["gap_0", "gap_2"]);
    }

    #[tokio::test]
    async fn test_threshold_and_invalid_answers() {
        let ids = selector("9\n3\n1\n").select(&gaps_prompt()).await.unwrap();
        assert_eq!(ids, vec!["gap_0"]);
    }

    #[tokio::test]
    async fn test_skip_all() {
        let ids = selector("4\n").select(&gaps_prompt()).await.unwrap();
        assert!(ids.is_empty());
    }

    #[tokio::test]
    async fn test_closed_input_is_an_error() {
        let err = selector("").select(&gaps_prompt()).await.unwrap_err();
        assert!(matches!(err, TailorError::Selection(_)));
    }

    #[test]
    fn test_unified_diff() {
        let before = "\\section{Skills}\nRust, Python\n\\end{document}\n";
        let after = "\\section{Skills}\nRust, Python, Go\n\\end{document}\n";

        let diff = unified_diff(before, after).unwrap();
        assert!(diff.starts_with("--- Original Resume\n+++ Optimized Resume\n"));
        assert!(diff.contains("@@"));
        assert!(diff.contains("\n-Rust, Python\n"));
        assert!(diff.contains("\n+Rust, Python, Go\n"));
        assert!(diff.contains(" \\section{Skills}"));

        assert_eq!(unified_diff(before, before), None);
    }

    #[test]
    fn test_tables_render() {
        let table = selection_table(&gaps_prompt()).to_string();
        assert!(table.contains("gap_1"));
        assert!(table.contains("LOW"));
        assert!(table.contains("..."));

        let rec = Recommendation {
            id: "rec_001".to_string(),
            priority: 1,
            category: "skills".to_string(),
            description: "Add Rust".to_string(),
            action: "List it".to_string(),
            rationale: "Required".to_string(),
            modification: None,
        };
        let table = selection_table(&SelectionPrompt::for_recommendations(&[rec])).to_string();
        assert!(table.contains("Priority"));
        assert!(table.contains("P1"));

        let mut state = PipelineState::new("doc", "reqs");
        state.requirements_title = Some("Engineer".to_string());
        state.summary = Some(RunSummary {
            similarity_score: 72.0,
            gap_count: 3,
            ..Default::default()
        });
        let table = summary_table(&state).to_string();
        assert!(table.contains("72.0/100"));
        assert!(table.contains("Engineer"));
    }
}
