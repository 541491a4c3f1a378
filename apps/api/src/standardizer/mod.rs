//! Standardizer: rewrites parsed resume text into a [`CanonicalRecord`] via the LLM.
//!
//! Flow: empty check → prompt → one awaited completion → sanitize → JSON parse
//! → schema validation → provenance stamp. Sanitizing ("is there a JSON object
//! in this text") and validating ("is it our schema") are separate steps.

pub mod prompts;
pub mod sanitize;

use std::path::Path;
use std::sync::Arc;

use chrono::Utc;
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

use crate::llm_client::{CompletionModel, LlmError};
use crate::models::resume::{
    validate_canonical, CanonicalRecord, ParsedRecord, SchemaError, PROVENANCE_FIELDS,
};
use prompts::build_standardize_prompt;
use sanitize::{extract_json, SanitizeError};

#[derive(Debug, Error)]
pub enum ResponseError {
    #[error(transparent)]
    Sanitize(#[from] SanitizeError),

    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("schema mismatch: {0}")]
    Schema(#[from] SchemaError),
}

#[derive(Debug, Error)]
pub enum StandardizeError {
    #[error("parsed content is empty")]
    EmptyContent,

    #[error("LLM call failed: {0}")]
    LlmCall(#[from] LlmError),

    #[error("malformed LLM response: {cause}")]
    MalformedResponse {
        cause: ResponseError,
        raw_response: String,
    },
}

/// A validated record plus the untouched model output it came from.
#[derive(Debug, Clone)]
pub struct Standardized {
    pub record: CanonicalRecord,
    pub raw_response: String,
}

#[derive(Clone)]
pub struct Standardizer {
    model: Arc<dyn CompletionModel>,
}

impl Standardizer {
    pub fn new(model: Arc<dyn CompletionModel>) -> Self {
        Self { model }
    }

    pub fn ensure_ready(&self) -> Result<(), LlmError> {
        self.model.ensure_ready()
    }

    /// Standardizes one parsed record. Issues at most one model call and
    /// none at all for blank content.
    pub async fn standardize(
        &self,
        parsed: &ParsedRecord,
        source_file: &Path,
    ) -> Result<Standardized, StandardizeError> {
        if parsed.content.trim().is_empty() {
            return Err(StandardizeError::EmptyContent);
        }

        let prompt = build_standardize_prompt(&parsed.content, &parsed.links);
        let raw_response = self.model.complete(&prompt).await?;
        debug!(
            "Model returned {} chars for {}",
            raw_response.len(),
            parsed.original_filename
        );

        let mut record = match parse_response(&raw_response) {
            Ok(record) => record,
            Err(cause) => {
                return Err(StandardizeError::MalformedResponse {
                    cause,
                    raw_response,
                })
            }
        };

        record.timestamp = Some(Utc::now());
        record.source_file = Some(source_file.display().to_string());
        record.original_filename = Some(parsed.original_filename.clone());

        Ok(Standardized {
            record,
            raw_response,
        })
    }
}

/// Sanitizes, parses and validates a raw model response.
/// Provenance keys the model may have emitted are dropped.
pub fn parse_response(raw: &str) -> Result<CanonicalRecord, ResponseError> {
    let json = extract_json(raw)?;
    let mut value: Value = serde_json::from_str(json)?;
    if let Value::Object(object) = &mut value {
        for field in PROVENANCE_FIELDS {
            object.remove(*field);
        }
    }
    Ok(validate_canonical(value)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm_client::testing::ScriptedModel;

    fn parsed(content: &str) -> ParsedRecord {
        ParsedRecord {
            content: content.to_string(),
            links: vec!["https://github.com/jane".to_string()],
            timestamp: Utc::now(),
            original_filename: "jane.pdf".to_string(),
        }
    }

    fn standardizer(model: ScriptedModel) -> (Standardizer, Arc<ScriptedModel>) {
        let model = Arc::new(model);
        (Standardizer::new(model.clone()), model)
    }

    #[tokio::test]
    async fn test_empty_content_never_calls_model() {
        let (s, model) = standardizer(ScriptedModel::default().reply("{}"));
        for content in ["", "   \n\t "] {
            let err = s
                .standardize(&parsed(content), Path::new("parsed/jane.json"))
                .await
                .unwrap_err();
            assert!(matches!(err, StandardizeError::EmptyContent));
        }
        assert_eq!(model.calls(), 0);
    }

    #[tokio::test]
    async fn test_success_stamps_provenance() {
        let (s, model) = standardizer(ScriptedModel::default().reply(
            "```json\n{\"name\": \"Jane Doe\", \"email\": \"jane@example.com\", \"timestamp\": \"yesterday\"}\n```",
        ));
        let out = s
            .standardize(&parsed("Jane Doe resume"), Path::new("/stage/parsed/jane.json"))
            .await
            .unwrap();

        assert_eq!(model.calls(), 1);
        assert_eq!(out.record.name.as_deref(), Some("Jane Doe"));
        assert_eq!(out.record.source_file.as_deref(), Some("/stage/parsed/jane.json"));
        assert_eq!(out.record.original_filename.as_deref(), Some("jane.pdf"));
        assert!(out.record.timestamp.is_some());
        assert!(out.raw_response.starts_with("```json"));

        let prompts = model.prompts.lock().unwrap();
        assert!(prompts[0].contains("Jane Doe resume"));
        assert!(prompts[0].contains("- https://github.com/jane"));
    }

    #[tokio::test]
    async fn test_transport_error_is_llm_call_error() {
        let (s, _) = standardizer(ScriptedModel::default().fail(LlmError::Api {
            status: 401,
            message: "invalid x-api-key".to_string(),
        }));
        let err = s
            .standardize(&parsed("text"), Path::new("p.json"))
            .await
            .unwrap_err();
        assert!(matches!(err, StandardizeError::LlmCall(LlmError::Api { status: 401, .. })));
    }

    #[tokio::test]
    async fn test_malformed_response_keeps_raw_text() {
        let raw = "{\"name\": \"Jane\", \"skills\": [\"Go\"";
        let (s, _) = standardizer(ScriptedModel::default().reply(raw));
        let err = s
            .standardize(&parsed("text"), Path::new("p.json"))
            .await
            .unwrap_err();
        match err {
            StandardizeError::MalformedResponse {
                cause,
                raw_response,
            } => {
                assert!(matches!(cause, ResponseError::Sanitize(SanitizeError::Unbalanced { .. })));
                assert_eq!(raw_response, raw);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_parse_response_reports_invalid_json() {
        let err = parse_response("{\"name\": Jane}").unwrap_err();
        assert!(matches!(err, ResponseError::Json(_)));
    }

    #[test]
    fn test_parse_response_reports_schema_mismatch() {
        let err = parse_response("{\"skills\": \"Go\"}").unwrap_err();
        assert!(matches!(err, ResponseError::Schema(_)));
    }

    #[test]
    fn test_fenced_and_unwrapped_parse_identically() {
        let body = r#"{"name": "Jane", "experience": [{"title": "Dev", "company": "Acme"}]}"#;
        let fenced = format!("```json\n{body}\n```");
        assert_eq!(parse_response(&fenced).unwrap(), parse_response(body).unwrap());
    }
}
