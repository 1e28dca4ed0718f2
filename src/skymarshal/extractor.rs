//! Flight-Info Extractor (C3): LLM-driven structured extraction of flight
//! number, ISO date, and disruption event from free text (spec.md §4.3).

use std::fmt;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use lazy_static::lazy_static;
use regex::Regex;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::skymarshal::llm::{LlmClient, LlmMessage};
use crate::skymarshal::model::FlightInfo;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractionErrorKind {
    Validation,
    Timeout,
    Provider,
    EmptyPrompt,
}

#[derive(Debug, Clone)]
pub struct ExtractionError {
    pub kind: ExtractionErrorKind,
    pub hint: Option<String>,
}

impl ExtractionError {
    fn validation() -> Self {
        Self {
            kind: ExtractionErrorKind::Validation,
            hint: Some("expected flight number format and ISO date".to_string()),
        }
    }

    fn timeout() -> Self {
        Self { kind: ExtractionErrorKind::Timeout, hint: None }
    }

    fn provider(message: impl Into<String>) -> Self {
        Self { kind: ExtractionErrorKind::Provider, hint: Some(message.into()) }
    }

    fn empty_prompt() -> Self {
        Self { kind: ExtractionErrorKind::EmptyPrompt, hint: None }
    }
}

impl fmt::Display for ExtractionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.hint {
            Some(hint) => write!(f, "extraction failed ({:?}): {}", self.kind, hint),
            None => write!(f, "extraction failed ({:?})", self.kind),
        }
    }
}

impl std::error::Error for ExtractionError {}

lazy_static! {
    static ref FLIGHT_NUMBER_PATTERN: Regex = Regex::new(r"^[A-Z]{2,3}[0-9]{3,4}$").unwrap();
}

#[derive(Debug, Deserialize)]
struct RawFlightInfo {
    flight_number: String,
    date: String,
    disruption_event: String,
}

fn response_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "flight_number": {"type": "string"},
            "date": {"type": "string"},
            "disruption_event": {"type": "string"},
        },
        "required": ["flight_number", "date", "disruption_event"],
    })
}

/// Resolves "yesterday"/"today"/"tomorrow" against `now` (spec.md §4.3). Any
/// other value is passed through unchanged for ISO-8601 validation.
fn resolve_relative_date(raw: &str, now: DateTime<Utc>) -> String {
    match raw.trim().to_lowercase().as_str() {
        "today" => now.date_naive().format("%Y-%m-%d").to_string(),
        "yesterday" => (now.date_naive() - Duration::days(1)).format("%Y-%m-%d").to_string(),
        "tomorrow" => (now.date_naive() + Duration::days(1)).format("%Y-%m-%d").to_string(),
        _ => raw.trim().to_string(),
    }
}

/// Extracts and validates [`FlightInfo`] from a free-text prompt (C3).
///
/// Fails fast on an empty prompt before invoking the LLM. Validation failure,
/// provider timeout, and other provider errors map to distinct
/// [`ExtractionErrorKind`] values per spec.md §4.3.
pub async fn extract_flight_info(
    llm: &dyn LlmClient,
    prompt: &str,
    now: DateTime<Utc>,
) -> Result<FlightInfo, ExtractionError> {
    if prompt.trim().is_empty() {
        return Err(ExtractionError::empty_prompt());
    }

    let messages = vec![
        LlmMessage::system(
            "Extract the flight number, date, and disruption event from the operator's report. \
             Respond with structured JSON matching the given schema.",
        ),
        LlmMessage::user(prompt),
    ];

    let completion = llm
        .complete(&messages, &[], Some(&response_schema()))
        .await
        .map_err(|err| match err {
            crate::skymarshal::llm::LlmError::Timeout => ExtractionError::timeout(),
            crate::skymarshal::llm::LlmError::Provider(msg) => ExtractionError::provider(msg),
        })?;

    let raw: RawFlightInfo =
        serde_json::from_str(&completion.content).map_err(|_| ExtractionError::validation())?;

    let flight_number = raw.flight_number.trim().to_uppercase();
    if !FLIGHT_NUMBER_PATTERN.is_match(&flight_number) {
        return Err(ExtractionError::validation());
    }

    let date = resolve_relative_date(&raw.date, now);
    if NaiveDate::parse_from_str(&date, "%Y-%m-%d").is_err() {
        return Err(ExtractionError::validation());
    }

    let disruption_event = raw.disruption_event.trim().to_string();
    if disruption_event.is_empty() {
        return Err(ExtractionError::validation());
    }

    Ok(FlightInfo { flight_number, date, disruption_event })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::skymarshal::llm::mock::ScriptedLlmClient;
    use crate::skymarshal::llm::LlmCompletion;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 1, 20, 12, 0, 0).unwrap()
    }

    #[tokio::test]
    async fn empty_prompt_fails_fast_without_calling_llm() {
        let llm = ScriptedLlmClient::new(vec![]);
        let err = extract_flight_info(&llm, "   ", now()).await.unwrap_err();
        assert_eq!(err.kind, ExtractionErrorKind::EmptyPrompt);
    }

    #[tokio::test]
    async fn valid_structured_output_is_normalized() {
        let body = json!({"flight_number": "ey123", "date": "2026-01-20", "disruption_event": "hydraulic fault"});
        let llm = ScriptedLlmClient::new(vec![Ok(LlmCompletion { content: body.to_string(), tool_calls: vec![] })]);
        let info = extract_flight_info(&llm, "Flight EY123 had a hydraulic fault", now()).await.unwrap();
        assert_eq!(info.flight_number, "EY123");
        assert_eq!(info.date, "2026-01-20");
    }

    #[tokio::test]
    async fn relative_date_resolves_against_clock() {
        let body = json!({"flight_number": "EY123", "date": "today", "disruption_event": "delay"});
        let llm = ScriptedLlmClient::new(vec![Ok(LlmCompletion { content: body.to_string(), tool_calls: vec![] })]);
        let info = extract_flight_info(&llm, "Flight EY123 delayed today", now()).await.unwrap();
        assert_eq!(info.date, "2026-01-20");
    }

    #[tokio::test]
    async fn malformed_flight_number_is_validation_error() {
        let body = json!({"flight_number": "123", "date": "2026-01-20", "disruption_event": "delay"});
        let llm = ScriptedLlmClient::new(vec![Ok(LlmCompletion { content: body.to_string(), tool_calls: vec![] })]);
        let err = extract_flight_info(&llm, "prompt", now()).await.unwrap_err();
        assert_eq!(err.kind, ExtractionErrorKind::Validation);
    }
}
