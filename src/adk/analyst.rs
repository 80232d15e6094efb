// SPDX-License-Identifier: MIT

//! Structured analysis capability
//!
//! Pipeline stages never talk to a model directly. They receive an
//! `Arc<dyn Analyst>` at construction time and ask it for a JSON object.
//! `ModelAnalyst` adapts any [`Model`] to that contract; tests substitute a
//! scripted fake.

use crate::adk::error::{ModelError, TailorError};
use crate::adk::model::{Content, GenerationConfig, Model};
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::sync::Arc;

const JSON_INSTRUCTION: &str = "Please respond with valid JSON only, no additional text.";

/// Temperature used for structured output unless configured otherwise
pub const STRUCTURED_TEMPERATURE: f32 = 0.3;

/// Produces a structured (JSON object) answer for a prompt
///
/// Implementations must fail on transport errors and when no JSON object can
/// be parsed from the raw response. Deciding how to degrade is the caller's job.
#[async_trait]
pub trait Analyst: Send + Sync {
    async fn generate_structured(
        &self,
        prompt: &str,
        system_prompt: &str,
        max_tokens: u32,
    ) -> Result<Map<String, Value>, TailorError>;
}

/// [`Analyst`] backed by an LLM [`Model`]
pub struct ModelAnalyst {
    model: Arc<dyn Model>,
    temperature: f32,
}

impl ModelAnalyst {
    pub fn new(model: Arc<dyn Model>) -> Self {
        Self {
            model,
            temperature: STRUCTURED_TEMPERATURE,
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }
}

#[async_trait]
impl Analyst for ModelAnalyst {
    async fn generate_structured(
        &self,
        prompt: &str,
        system_prompt: &str,
        max_tokens: u32,
    ) -> Result<Map<String, Value>, TailorError> {
        let history = vec![
            Content::text("system", system_prompt),
            Content::text("user", format!("{}\n\n{}", prompt, JSON_INSTRUCTION)),
        ];
        let config = GenerationConfig {
            temperature: Some(self.temperature),
            max_output_tokens: Some(max_tokens),
            ..Default::default()
        };

        let response = self.model.generate_content(&history, Some(&config)).await?;
        let text = response.joined_text();

        log::debug!(
            "{} returned {} characters of structured output",
            self.model.provider(),
            text.len()
        );

        parse_json_object(&text)
    }
}

/// Parse a JSON object out of a raw model response
///
/// Tolerates surrounding whitespace and a Markdown code fence
/// (` ```json ... ``` ` or bare ` ``` ... ``` `).
pub fn parse_json_object(raw: &str) -> Result<Map<String, Value>, TailorError> {
    let cleaned = strip_code_fence(raw);

    let value: Value = serde_json::from_str(cleaned).map_err(|e| {
        ModelError::InvalidResponse(format!(
            "Failed to parse JSON response: {}\nResponse: {}",
            e, raw
        ))
    })?;

    match value {
        Value::Object(map) => Ok(map),
        other => Err(ModelError::InvalidResponse(format!(
            "Expected a JSON object, got: {}",
            other
        ))
        .into()),
    }
}

fn strip_code_fence(raw: &str) -> &str {
    let mut cleaned = raw.trim();
    if let Some(rest) = cleaned.strip_prefix("```json") {
        cleaned = rest;
    } else if let Some(rest) = cleaned.strip_prefix("```") {
        cleaned = rest;
    }
    if let Some(rest) = cleaned.strip_suffix("```") {
        cleaned = rest;
    }
    cleaned.trim()
}
