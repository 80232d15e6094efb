// SPDX-License-Identifier: MIT

//! Prompt templates for the analysis stages
//!
//! System prompts are public so scripted analysts in tests can tell stages
//! apart. Context blocks are truncated to keep requests bounded.

use crate::tailor::workflow::types::{DocumentSection, Gap, Recommendation, Requirement};
use serde_json::{json, Value};

/// Characters of section content sent when generating recommendations
pub const RECOMMEND_SECTION_CHARS: usize = 200;
/// Characters of section content sent when applying edits
pub const APPLY_SECTION_CHARS: usize = 300;
/// Keywords per side sent to gap analysis
pub const GAP_KEYWORD_LIMIT: usize = 50;
/// Requirements sent when generating recommendations
pub const RECOMMEND_REQUIREMENT_LIMIT: usize = 10;

pub const PARSE_SYSTEM_PROMPT: &str = "You are an expert LaTeX parser specialized in resume analysis.

Parse the resume into its sections (contact information, summary, experience, \
education, skills and any additional sections), extract the keywords and key \
phrases of each section, and keep the content faithful to the original source.";

pub const REQUIREMENTS_SYSTEM_PROMPT: &str = "You are an expert job description analyzer and recruiter.

Extract the requirements of the posting, separate required from preferred \
qualifications, and collect the technical skills, tools, soft skills and \
industry terms an applicant tracking system would look for.";

pub const GAPS_SYSTEM_PROMPT: &str = "You are an expert ATS (Applicant Tracking System) analyzer and resume consultant.

Compare resume content against job requirements, score their similarity, and \
report missing keywords, skills and experience. Rate each gap high, medium or low \
severity according to how much it matters for the role.";

pub const RECOMMEND_SYSTEM_PROMPT: &str = "You are an expert resume consultant and career coach.

Generate specific, actionable recommendations ranked by impact. Each one names \
where in the resume to change, why it matters, and a LaTeX modification when \
possible. Never suggest fabricating experience.";

pub const APPLY_SYSTEM_PROMPT: &str = "You are an expert LaTeX editor specialized in resume formatting.

Apply approved recommendations with precise, minimal edits. Keep the document \
compilable, preserve its structure and formatting, never fabricate experience, \
and report every change you make.";

/// First `max` characters of `text`
pub fn truncate_chars(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

fn pretty(value: &Value) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
}

pub fn parse_document_prompt(document: &str) -> String {
    format!(
        r#"Parse the following LaTeX resume and extract structured information.

Resume:
{document}

For each section identify its name, type, content and keywords.

Return JSON in this format:
{{
  "contact_info": {{"name": "...", "email": "..."}},
  "sections": [
    {{
      "section_name": "...",
      "section_type": "experience|education|skills|other",
      "content": "...",
      "keywords": ["..."]
    }}
  ],
  "all_keywords": ["..."]
}}"#
    )
}

pub fn analyze_requirements_prompt(requirements: &str) -> String {
    format!(
        r#"Analyze the following job description and extract all requirements and keywords.

Job Description:
{requirements}

Return JSON in this format:
{{
  "job_title": "...",
  "company_name": "...",
  "requirements": [
    {{
      "category": "technical_skills|experience|education|soft_skills|other",
      "requirement": "...",
      "priority": "required|preferred",
      "keywords": ["..."]
    }}
  ],
  "all_keywords": ["..."]
}}"#
    )
}

pub fn analyze_gaps_prompt(
    document_keywords: &[String],
    requirement_keywords: &[String],
    sections: &[DocumentSection],
    requirements: &[Requirement],
) -> String {
    let doc_keywords = document_keywords
        .iter()
        .take(GAP_KEYWORD_LIMIT)
        .cloned()
        .collect::<Vec<_>>()
        .join(", ");
    let req_keywords = requirement_keywords
        .iter()
        .take(GAP_KEYWORD_LIMIT)
        .cloned()
        .collect::<Vec<_>>()
        .join(", ");

    let sections = Value::Array(
        sections
            .iter()
            .map(|s| json!({ "section": s.name, "keywords": s.keywords }))
            .collect(),
    );
    let requirements = Value::Array(
        requirements
            .iter()
            .map(|r| {
                json!({
                    "category": r.category,
                    "requirement": r.text,
                    "priority": r.priority,
                })
            })
            .collect(),
    );

    format!(
        r#"Compare this resume against the job requirements and identify gaps.

Resume Keywords:
{doc_keywords}

Job Keywords:
{req_keywords}

Resume Sections:
{sections}

Job Requirements:
{requirements}

Severity guide:
- high: required qualifications or critical keywords missing
- medium: preferred qualifications or important skills missing
- low: minor keyword mismatches or formatting issues

Return JSON in this format:
{{
  "similarity_score": 75.5,
  "keyword_overlap": 60.0,
  "gaps": [
    {{
      "gap_type": "missing_keyword|missing_skill|missing_experience|formatting",
      "description": "...",
      "severity": "high|medium|low",
      "related_requirement": "..."
    }}
  ]
}}"#,
        sections = pretty(&sections),
        requirements = pretty(&requirements),
    )
}

pub fn generate_recommendations_prompt(
    gaps: &[&Gap],
    sections: &[DocumentSection],
    requirements: &[Requirement],
    similarity_score: Option<f64>,
) -> String {
    let gaps = Value::Array(
        gaps.iter()
            .map(|g| {
                json!({
                    "type": g.gap_type,
                    "description": g.description,
                    "severity": g.severity,
                })
            })
            .collect(),
    );
    let sections = Value::Array(
        sections
            .iter()
            .map(|s| {
                json!({
                    "section": s.name,
                    "content": truncate_chars(&s.content, RECOMMEND_SECTION_CHARS),
                })
            })
            .collect(),
    );
    let requirements = Value::Array(
        requirements
            .iter()
            .take(RECOMMEND_REQUIREMENT_LIMIT)
            .map(|r| json!({ "requirement": r.text, "priority": r.priority }))
            .collect(),
    );
    let score = similarity_score
        .map(|s| format!("{:.1}", s))
        .unwrap_or_else(|| "unknown".to_string());

    format!(
        r#"Generate prioritized recommendations to improve this resume for the target job.

Identified Gaps:
{gaps}

Resume Sections:
{sections}

Job Requirements:
{requirements}

Current Similarity Score: {score}

Address high-severity gaps first and add missing keywords naturally.

Return JSON in this format:
{{
  "recommendations": [
    {{
      "recommendation_id": "rec_001",
      "priority": 1,
      "category": "keyword|experience|skills|formatting|other",
      "description": "...",
      "specific_action": "...",
      "rationale": "...",
      "latex_modification": "..."
    }}
  ]
}}"#,
        gaps = pretty(&gaps),
        sections = pretty(&sections),
        requirements = pretty(&requirements),
    )
}

pub fn apply_recommendations_prompt(
    document: &str,
    recommendations: &[&Recommendation],
    sections: &[DocumentSection],
) -> String {
    let recommendations = Value::Array(
        recommendations
            .iter()
            .map(|r| {
                json!({
                    "id": r.id,
                    "priority": r.priority,
                    "description": r.description,
                    "action": r.action,
                    "modification": r.modification,
                })
            })
            .collect(),
    );
    let sections = Value::Array(
        sections
            .iter()
            .map(|s| {
                json!({
                    "section": s.name,
                    "content": truncate_chars(&s.content, APPLY_SECTION_CHARS),
                })
            })
            .collect(),
    );

    format!(
        r#"Apply the following approved recommendations to the LaTeX resume.

Original Resume:
{document}

Approved Recommendations:
{recommendations}

Parsed Resume Structure:
{sections}

Return JSON in this format:
{{
  "modified_resume_tex": "...",
  "applied_changes": [
    {{
      "recommendation_id": "...",
      "change_description": "...",
      "section_modified": "...",
      "original_text": "...",
      "new_text": "..."
    }}
  ]
}}"#,
        recommendations = pretty(&recommendations),
        sections = pretty(&sections),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tailor::workflow::types::RequirementPriority;

    fn section(content: &str) -> DocumentSection {
        DocumentSection {
            name: "Experience".to_string(),
            kind: "experience".to_string(),
            content: content.to_string(),
            keywords: vec!["rust".to_string()],
        }
    }

    #[test]
    fn test_truncate_chars_is_char_safe() {
        assert_eq!(truncate_chars("héllo", 2), "hé");
        assert_eq!(truncate_chars("abc", 10), "abc");
        assert_eq!(truncate_chars("", 3), "");
    }

    #[test]
    fn test_gap_prompt_limits_keywords() {
        let keywords: Vec<String> = (0..60).map(|i| format!("kw{}", i)).collect();
        let prompt = analyze_gaps_prompt(&keywords, &[], &[section("x")], &[]);
        assert!(prompt.contains("kw49"));
        assert!(!prompt.contains("kw50"));
    }

    #[test]
    fn test_recommend_prompt_truncates_context() {
        let requirements: Vec<Requirement> = (0..12)
            .map(|i| Requirement {
                category: "technical_skills".to_string(),
                text: format!("requirement-{}", i),
                priority: RequirementPriority::Required,
                keywords: vec![],
            })
            .collect();
        let long = "y".repeat(250);
        let prompt =
            generate_recommendations_prompt(&[], &[section(&long)], &requirements, Some(42.0));

        assert!(prompt.contains(&"y".repeat(200)));
        assert!(!prompt.contains(&"y".repeat(201)));
        assert!(prompt.contains("requirement-9"));
        assert!(!prompt.contains("requirement-10"));
        assert!(prompt.contains("Current Similarity Score: 42.0"));
    }

    #[test]
    fn test_apply_prompt_includes_document() {
        let rec = Recommendation {
            id: "rec_001".to_string(),
            priority: 1,
            category: "skills".to_string(),
            description: "Add Rust".to_string(),
            action: "List Rust".to_string(),
            rationale: "Required".to_string(),
            modification: None,
        };
        let prompt = apply_recommendations_prompt("\\section{Skills}", &[&rec], &[]);
        assert!(prompt.contains("\\section{Skills}"));
        assert!(prompt.contains("rec_001"));
    }
}
