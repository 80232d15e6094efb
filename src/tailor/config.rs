// SPDX-License-Identifier: MIT

//! Pipeline configuration
//!
//! Loaded from an optional YAML file, then overridden from the environment.
//! Credentials are never read from the file.

use crate::adk::error::TailorError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

pub const DEFAULT_MODEL: &str = "claude-sonnet-4-5-20250929";

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub model: ModelSettings,
    pub limits: InputLimits,
    pub tokens: TokenBudgets,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelSettings {
    pub name: String,
    pub base_url: Option<String>,
    pub temperature: f32,
}

impl Default for ModelSettings {
    fn default() -> Self {
        Self {
            name: DEFAULT_MODEL.to_string(),
            base_url: None,
            temperature: crate::adk::analyst::STRUCTURED_TEMPERATURE,
        }
    }
}

/// Minimum input sizes, in characters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InputLimits {
    pub min_document_len: usize,
    pub min_requirements_len: usize,
}

impl Default for InputLimits {
    fn default() -> Self {
        Self {
            min_document_len: 100,
            min_requirements_len: 50,
        }
    }
}

/// `max_tokens` per analysis stage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TokenBudgets {
    pub parse: u32,
    pub requirements: u32,
    pub gaps: u32,
    pub recommendations: u32,
    pub apply: u32,
}

impl Default for TokenBudgets {
    fn default() -> Self {
        Self {
            parse: 4096,
            requirements: 4096,
            gaps: 4096,
            recommendations: 4096,
            apply: 8192,
        }
    }
}

impl PipelineConfig {
    /// Load from a YAML file and apply environment overrides
    pub fn load<P: AsRef<Path>>(path: Option<P>) -> Result<Self, TailorError> {
        let mut config = match path {
            Some(path) => {
                let path = path.as_ref();
                let content = fs::read_to_string(path).map_err(|e| {
                    TailorError::config(format!("cannot read {}: {}", path.display(), e))
                })?;
                Self::parse_yaml(&content)?
            }
            None => Self::default(),
        };
        config.apply_env_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    pub fn parse_yaml(content: &str) -> Result<Self, TailorError> {
        let config: PipelineConfig = serde_yaml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Override settings from `CLAUDE_MODEL` and `ANTHROPIC_BASE_URL`
    pub fn apply_env_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(model) = lookup("CLAUDE_MODEL").filter(|v| !v.trim().is_empty()) {
            log::debug!("Model overridden from environment: {}", model);
            self.model.name = model;
        }
        if let Some(url) = lookup("ANTHROPIC_BASE_URL").filter(|v| !v.trim().is_empty()) {
            self.model.base_url = Some(url);
        }
    }

    fn validate(&self) -> Result<(), TailorError> {
        if self.model.name.trim().is_empty() {
            return Err(TailorError::config("model.name must not be empty"));
        }
        if !(0.0..=1.0).contains(&self.model.temperature) {
            return Err(TailorError::config(format!(
                "model.temperature must be between 0 and 1, got {}",
                self.model.temperature
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults() {
        let config = PipelineConfig::default();
        assert_eq!(config.model.name, DEFAULT_MODEL);
        assert_eq!(config.limits.min_document_len, 100);
        assert_eq!(config.limits.min_requirements_len, 50);
        assert_eq!(config.tokens.apply, 8192);
        assert_eq!(config.tokens.gaps, 4096);
    }

    #[test]
    fn test_partial_yaml() {
        let yaml = r#"
model:
  temperature: 0.1
tokens:
  apply: 16000
"#;
        let config = PipelineConfig::parse_yaml(yaml).unwrap();
        assert_eq!(config.model.name, DEFAULT_MODEL);
        assert_eq!(config.model.temperature, 0.1);
        assert_eq!(config.tokens.apply, 16000);
        assert_eq!(config.tokens.parse, 4096);
        assert_eq!(config.limits, InputLimits::default());
    }

    #[test]
    fn test_invalid_temperature() {
        let err = PipelineConfig::parse_yaml("model:\n  temperature: 3.0\n").unwrap_err();
        assert!(err.to_string().contains("temperature"));
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = [
            ("CLAUDE_MODEL", "claude-test"),
            ("ANTHROPIC_BASE_URL", "http://localhost:9999"),
        ]
        .into_iter()
        .collect();

        let mut config = PipelineConfig::default();
        config.apply_env_overrides(|k| env.get(k).map(|v| v.to_string()));
        assert_eq!(config.model.name, "claude-test");
        assert_eq!(config.model.base_url.as_deref(), Some("http://localhost:9999"));

        // Blank values are ignored
        let mut config = PipelineConfig::default();
        config.apply_env_overrides(|_| Some(" ".to_string()));
        assert_eq!(config.model.name, DEFAULT_MODEL);
        assert!(config.model.base_url.is_none());
    }

    #[test]
    fn test_load_missing_file() {
        let err = PipelineConfig::load(Some("/nonexistent/tailor.yaml")).unwrap_err();
        assert!(matches!(err, TailorError::Config(_)));
    }
}
