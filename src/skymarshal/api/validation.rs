//! Request-body validation for the async surface (C8), ported from
//! `src/utils/validation.py` and `src/api/lambda_handler_async.py`'s
//! `RequestValidator`.

use serde::{Deserialize, Serialize};

const MAX_PROMPT_LENGTH: usize = 4000;

/// Generic validation result, mirroring the Python `OrchestratorValidation`
/// dataclass used across the original's request and per-agent precondition
/// checks.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestratorValidation {
    pub is_valid: bool,
    pub missing_fields: Vec<String>,
    pub validation_errors: Vec<String>,
}

impl OrchestratorValidation {
    pub fn ok() -> Self {
        Self { is_valid: true, missing_fields: vec![], validation_errors: vec![] }
    }

    pub fn missing_field(field: &str, description: &str) -> Self {
        Self {
            is_valid: false,
            missing_fields: vec![field.to_string()],
            validation_errors: vec![format!("Missing required field '{}'. Expected: {}", field, description)],
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct InvokeRequestBody {
    pub prompt: Option<String>,
    pub session_id: Option<uuid::Uuid>,
}

/// `prompt` is required and must be non-empty once trimmed (spec.md §4.8,
/// §8 point 5).
pub fn validate_invoke_request(body: &InvokeRequestBody) -> OrchestratorValidation {
    match &body.prompt {
        None => OrchestratorValidation::missing_field("prompt", "free-text description of the disruption"),
        Some(prompt) if prompt.trim().is_empty() => {
            OrchestratorValidation::missing_field("prompt", "free-text description of the disruption")
        }
        Some(_) => OrchestratorValidation::ok(),
    }
}

/// Trims surrounding whitespace and caps length; the orchestrator never sees
/// an oversized or padded prompt.
pub fn sanitize_prompt(prompt: &str) -> String {
    let trimmed = prompt.trim();
    if trimmed.chars().count() > MAX_PROMPT_LENGTH {
        trimmed.chars().take(MAX_PROMPT_LENGTH).collect()
    } else {
        trimmed.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_prompt_is_invalid() {
        let body = InvokeRequestBody { prompt: None, session_id: None };
        assert!(!validate_invoke_request(&body).is_valid);
    }

    #[test]
    fn blank_prompt_is_invalid() {
        let body = InvokeRequestBody { prompt: Some("   ".to_string()), session_id: None };
        assert!(!validate_invoke_request(&body).is_valid);
    }

    #[test]
    fn sanitize_trims_whitespace() {
        assert_eq!(sanitize_prompt("  flight EY123 delayed  "), "flight EY123 delayed");
    }

    #[test]
    fn sanitize_caps_length() {
        let long = "a".repeat(MAX_PROMPT_LENGTH + 500);
        assert_eq!(sanitize_prompt(&long).chars().count(), MAX_PROMPT_LENGTH);
    }
}
