// SPDX-License-Identifier: MIT

//! Pipeline stages
//!
//! Each stage reads the state, optionally asks the analyst, and returns a
//! partial update. Capability failures become a single recorded error plus
//! safe defaults for the stage's own fields.

mod apply;
mod finalize;
mod gaps;
mod parse;
mod recommend;
mod requirements;
mod select_gaps;
mod validate;

pub use apply::ApplyRecommendations;
pub use finalize::Finalize;
pub use gaps::AnalyzeGaps;
pub use parse::ParseDocument;
pub use recommend::GenerateRecommendations;
pub use requirements::AnalyzeRequirements;
pub use select_gaps::SelectGaps;
pub use validate::ValidateInputs;

use crate::adk::error::{ModelError, TailorError};
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

/// Deserialize an analyst response into a stage draft
fn decode<T: DeserializeOwned>(response: Map<String, Value>) -> Result<T, TailorError> {
    serde_json::from_value(Value::Object(response))
        .map_err(|e| ModelError::InvalidResponse(format!("unexpected response shape: {}", e)).into())
}

/// A number, or a string holding one
fn lenient_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().trim_end_matches('%').trim().parse().ok(),
        _ => None,
    }
}

/// Text form of a loosely-typed value; null becomes empty
fn lenient_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Empty or whitespace-only strings count as absent
fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|s| !s.trim().is_empty())
}


#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_lenient_f64() {
        assert_eq!(lenient_f64(&json!(72.5)), Some(72.5));
        assert_eq!(lenient_f64(&json!("64")), Some(64.0));
        assert_eq!(lenient_f64(&json!("80%")), Some(80.0));
        assert_eq!(lenient_f64(&json!("high")), None);
        assert_eq!(lenient_f64(&Value::Null), None);
    }

    #[test]
    fn test_lenient_text() {
        assert_eq!(lenient_text(&Value::Null), "");
        assert_eq!(lenient_text(&json!("abc")), "abc");
        assert_eq!(lenient_text(&json!(["a"])), "[\"a\"]");
    }

    #[test]
    fn test_decode_wrong_shape() {
        #[derive(serde::Deserialize)]
        struct Draft {
            #[allow(dead_code)]
            items: Vec<String>,
        }
        let map = json!({ "items": 3 }).as_object().cloned().unwrap();
        let err = decode::<Draft>(map).err().unwrap();
        assert!(err.to_string().contains("unexpected response shape"));
    }
}
