//! Chat-completions translation adapter.
//!
//! Talks to an OpenAI-compatible chat-completions endpoint and asks for a
//! strict-JSON array of plan specifications. The model's answer is parsed
//! against [`PlanSpec`] and re-validated; anything else is an
//! `InvalidResponse`, and generated custom SQL still has to pass the
//! read-only guard before the engine will execute it.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, instrument};

use crate::config::Secret;
use crate::core::{PlanHints, ValidationPlan};
use crate::translate::{PlanSpec, TranslationError, TranslationResult, Translator};

/// Configuration for [`ChatTranslator`].
#[derive(Debug, Clone)]
pub struct ChatTranslatorConfig {
    /// Chat-completions base URL, e.g. `https://llm-gateway.internal/v1`.
    pub endpoint: String,
    /// API token.
    pub api_key: Secret,
    /// Model identifier.
    pub model: String,
    /// Sampling temperature; low keeps the JSON shape stable.
    pub temperature: f32,
    /// Request timeout.
    pub timeout: Duration,
}

impl ChatTranslatorConfig {
    /// Creates a configuration for the given endpoint and token.
    pub fn new(endpoint: impl Into<String>, api_key: Secret) -> Self {
        Self {
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            api_key,
            model: "claude-3-5-sonnet-20241022".to_string(),
            temperature: 0.1,
            timeout: Duration::from_secs(60),
        }
    }

    /// Sets the model identifier.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Sets the sampling temperature.
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }
}

/// [`Translator`] over an OpenAI-compatible chat-completions endpoint.
pub struct ChatTranslator {
    config: ChatTranslatorConfig,
    client: Client,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    content: String,
}

const SYSTEM_PROMPT: &str = "You are a migration validation planner for a columnar SQL engine. \
You always answer with a JSON array and nothing else.";

impl ChatTranslator {
    /// Creates a translator from configuration.
    pub fn new(config: ChatTranslatorConfig) -> TranslationResult<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| TranslationError::unavailable(format!("failed to create HTTP client: {e}")))?;
        Ok(Self { config, client })
    }

    fn build_prompt(&self, request: &str, hints: &PlanHints) -> String {
        let hint_doc = serde_json::to_string_pretty(hints).unwrap_or_else(|_| "{}".to_string());
        format!(
            r#"Translate the validation request below into a JSON array of plan objects.

Each plan object has this shape (omit fields you do not need):
{{
  "rule": "row_count | key_uniqueness | schema_comparison | mismatch_detection | missing_records | profile | custom_sql",
  "tables": ["database.table", "database.table"],
  "keys": ["key_column"],
  "date_column": "col", "start_date": "YYYY-MM-DD", "end_date": "YYYY-MM-DD",
  "compare_columns": ["col"],
  "profile_columns": ["col"],
  "category_columns": ["col"],
  "legacy_sql": "SELECT ...", "prod_sql": "SELECT ...", "explanation": "..."
}}

Rules:
- List the legacy table first, the production table second.
- Use only the rule identifiers above; decompose compound requests into
  several plan objects.
- Use "custom_sql" only when no other rule fits, and generate read-only
  SELECT statements without semicolons or comments.
- Known context (reuse it for fields the request does not mention):
{hint_doc}

Request: "{request}"

Return only the JSON array, no other text."#
        )
    }

    /// Strips markdown code fences the model sometimes wraps JSON in.
    fn extract_json(content: &str) -> &str {
        let trimmed = content.trim();
        let trimmed = trimmed
            .strip_prefix("```json")
            .or_else(|| trimmed.strip_prefix("```"))
            .unwrap_or(trimmed);
        trimmed.strip_suffix("```").unwrap_or(trimmed).trim()
    }

    fn parse_specs(content: &str) -> TranslationResult<Vec<PlanSpec>> {
        let json = Self::extract_json(content);
        // Accept a bare object as a one-element array.
        if json.starts_with('{') {
            serde_json::from_str::<PlanSpec>(json)
                .map(|spec| vec![spec])
                .map_err(|e| TranslationError::invalid_response(e.to_string()))
        } else {
            serde_json::from_str::<Vec<PlanSpec>>(json)
                .map_err(|e| TranslationError::invalid_response(e.to_string()))
        }
    }
}

#[async_trait]
impl Translator for ChatTranslator {
    #[instrument(skip(self, request, hints), fields(model = %self.config.model))]
    async fn translate(
        &self,
        request: &str,
        hints: &PlanHints,
    ) -> TranslationResult<Vec<ValidationPlan>> {
        if self.config.api_key.is_empty() {
            return Err(TranslationError::NoCredentials);
        }

        let url = format!("{}/chat/completions", self.config.endpoint);
        let body = serde_json::json!({
            "model": self.config.model,
            "messages": [
                {"role": "system", "content": SYSTEM_PROMPT},
                {"role": "user", "content": self.build_prompt(request, hints)}
            ],
            "temperature": self.config.temperature,
        });

        let response = self
            .client
            .post(&url)
            .bearer_auth(self.config.api_key.expose())
            .json(&body)
            .send()
            .await
            .map_err(|e| TranslationError::unavailable(e.to_string()))?;

        let status = response.status();
        if status.as_u16() == 401 || status.as_u16() == 403 {
            return Err(TranslationError::NoCredentials);
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(TranslationError::unavailable(format!(
                "service returned {status}: {body}"
            )));
        }

        let chat: ChatResponse = response
            .json()
            .await
            .map_err(|e| TranslationError::invalid_response(e.to_string()))?;
        let content = chat
            .choices
            .first()
            .map(|c| c.message.content.as_str())
            .ok_or_else(|| TranslationError::invalid_response("response has no choices"))?;

        let specs = Self::parse_specs(content)?;
        if specs.is_empty() {
            return Err(TranslationError::invalid_response(
                "translator returned no plans",
            ));
        }
        debug!(plans = specs.len(), "request translated");

        specs
            .into_iter()
            .map(|spec| spec.into_plan(request, hints))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_json_strips_fences() {
        assert_eq!(ChatTranslator::extract_json("[1]"), "[1]");
        assert_eq!(ChatTranslator::extract_json("```json\n[1]\n```"), "[1]");
        assert_eq!(ChatTranslator::extract_json("```\n[1]\n```"), "[1]");
    }

    #[test]
    fn test_parse_array_of_specs() {
        let content = r#"[
            {"rule": "row_count", "tables": ["legacy.orders", "prod.orders"]},
            {"rule": "key_uniqueness", "tables": ["legacy.orders"], "keys": ["id"]}
        ]"#;
        let specs = ChatTranslator::parse_specs(content).unwrap();
        assert_eq!(specs.len(), 2);
        assert_eq!(specs[0].rule, "row_count");
    }

    #[test]
    fn test_parse_bare_object() {
        let content = r#"{"rule": "row_count", "tables": ["legacy.orders"]}"#;
        let specs = ChatTranslator::parse_specs(content).unwrap();
        assert_eq!(specs.len(), 1);
    }

    #[test]
    fn test_parse_rejects_prose() {
        let err = ChatTranslator::parse_specs("Sure! Here is your validation:").unwrap_err();
        assert!(matches!(err, TranslationError::InvalidResponse { .. }));
    }

    #[test]
    fn test_parse_rejects_unknown_fields() {
        let content = r#"[{"rule": "row_count", "tables": [], "surprise": true}]"#;
        assert!(ChatTranslator::parse_specs(content).is_err());
    }

    #[tokio::test]
    async fn test_missing_credentials() {
        let translator = ChatTranslator::new(ChatTranslatorConfig::new(
            "http://127.0.0.1:1/v1",
            Secret::new(""),
        ))
        .unwrap();
        let err = translator
            .translate("compare row counts", &PlanHints::default())
            .await
            .unwrap_err();
        assert!(matches!(err, TranslationError::NoCredentials));
    }
}
