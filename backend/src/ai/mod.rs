//! AI Module for mapping suggestions
//!
//! Sends the column headers and a free-text instruction to the Anthropic
//! Messages API and turns the answer into mapping rules.
//!
//! ```text
//! SuggestionRequest ──▶ MappingSuggester ──▶ Vec<CandidateField>
//!  {headers,              (AiClient or          │
//!   userInstruction}       a test fake)         ▼
//!                                      accept_suggestions(headers)
//!                                               │
//!                                               ▼
//!                                        Vec<MappingRule>
//! ```
//!
//! ## Usage
//!
//! ```rust,ignore
//! use sheetjson::ai::{accept_suggestions, AiClient, MappingSuggester, SuggestionRequest};
//! use sheetjson::config::AiConfig;
//!
//! let client = AiClient::new(AiConfig::from_env()?);
//! let request = SuggestionRequest::new(headers.clone(), "one object per customer");
//! let rules = accept_suggestions(client.suggest(&request).await?, &headers);
//! ```

pub mod prompt;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::future::Future;
use std::time::Duration;

use crate::api::logs::{log_info_indent, log_warning_indent};
use crate::config::{AiConfig, RETRY_DELAY_MS};
use crate::error::{AiError, AiResult};
use crate::transform::mapping::{FieldType, MappingRule};

pub use prompt::{build_messages, system_prompt, user_prompt};

/// Input of a suggestion call
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SuggestionRequest {
    pub headers: Vec<String>,
    pub user_instruction: String,
}

impl SuggestionRequest {
    pub fn new(headers: Vec<String>, user_instruction: impl Into<String>) -> Self {
        Self {
            headers,
            user_instruction: user_instruction.into(),
        }
    }
}

/// One field proposed by the model, not yet validated.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CandidateField {
    #[serde(default)]
    pub target_key: String,
    #[serde(default)]
    pub source_column: String,
    /// Free-form type label
    #[serde(rename = "type", default)]
    pub field_type: String,
}

/// Anything that proposes mapping fields for a set of headers.
pub trait MappingSuggester: Send + Sync {
    fn suggest(
        &self,
        request: &SuggestionRequest,
    ) -> impl Future<Output = AiResult<Vec<CandidateField>>> + Send;
}

/// Turn candidates into rules for the given headers.
///
/// Every rule gets a fresh id. A source column that is not one of `headers`
/// (exact match) is reset to `""`, leaving the rule inert. Type labels are
/// parsed with [`FieldType::from_label`].
pub fn accept_suggestions(candidates: Vec<CandidateField>, headers: &[String]) -> Vec<MappingRule> {
    candidates
        .into_iter()
        .map(|c| {
            let source = if headers.contains(&c.source_column) {
                c.source_column.as_str()
            } else {
                ""
            };
            MappingRule::new(&c.target_key, source, FieldType::from_label(&c.field_type))
        })
        .collect()
}

// =============================================================================
// Anthropic client
// =============================================================================

/// Anthropic API client
#[derive(Clone)]
pub struct AiClient {
    config: AiConfig,
    http: reqwest::Client,
}

/// Anthropic API response structure
#[derive(Debug, Deserialize)]
struct AnthropicResponse {
    content: Vec<ContentBlock>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    content_type: String,
    #[serde(default)]
    text: String,
}

/// Anthropic API error response
#[derive(Debug, Deserialize)]
struct AnthropicError {
    error: ErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    message: String,
}

impl AiClient {
    pub fn new(config: AiConfig) -> Self {
        Self {
            config,
            http: reqwest::Client::new(),
        }
    }

    pub fn config(&self) -> &AiConfig {
        &self.config
    }

    /// Ask for candidates, retrying failed attempts.
    ///
    /// An empty answer is not a failure: it yields no candidates.
    pub async fn suggest_fields(&self, request: &SuggestionRequest) -> AiResult<Vec<CandidateField>> {
        let attempts = self.config.max_retries.max(1);
        let mut last_error = None;

        for attempt in 1..=attempts {
            match self.try_suggest(request).await {
                Ok(candidates) => return Ok(candidates),
                Err(e) => {
                    log_warning_indent(format!("Attempt {}/{} failed: {}", attempt, attempts, e), 1);
                    last_error = Some(e);

                    if attempt < attempts {
                        log_info_indent(format!("↻ Retrying in {}ms...", RETRY_DELAY_MS), 1);
                        tokio::time::sleep(Duration::from_millis(RETRY_DELAY_MS)).await;
                    }
                }
            }
        }

        Err(last_error.unwrap_or_else(|| AiError::ApiError("Unknown error".to_string())))
    }

    async fn try_suggest(&self, request: &SuggestionRequest) -> AiResult<Vec<CandidateField>> {
        let text = self.call_api(request).await?;
        if text.trim().is_empty() {
            return Ok(Vec::new());
        }
        parse_candidates(&text)
    }

    /// Call Anthropic API, returning the concatenated text blocks
    async fn call_api(&self, request: &SuggestionRequest) -> AiResult<String> {
        log_info_indent(
            format!(
                "📡 Calling Anthropic API (model {}, {} columns)",
                self.config.model,
                request.headers.len()
            ),
            1,
        );

        let body = serde_json::json!({
            "model": self.config.model,
            "max_tokens": self.config.max_tokens,
            "temperature": 0,
            "system": system_prompt(),
            "messages": build_messages(&request.headers, &request.user_instruction)
        });

        let response = self
            .http
            .post(&self.config.endpoint)
            .header("Content-Type", "application/json")
            .header("x-api-key", &self.config.api_key)
            .header("anthropic-version", "2023-06-01")
            .json(&body)
            .send()
            .await
            .map_err(|e| AiError::RequestFailed(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| AiError::RequestFailed(e.to_string()))?;

        if !status.is_success() {
            if let Ok(error) = serde_json::from_str::<AnthropicError>(&body) {
                return Err(AiError::ApiError(error.error.message));
            }
            return Err(AiError::ApiError(format!("HTTP {}: {}", status, body)));
        }

        let response: AnthropicResponse =
            serde_json::from_str(&body).map_err(|e| AiError::InvalidJson(e.to_string()))?;

        let text = response
            .content
            .iter()
            .filter(|c| c.content_type == "text")
            .map(|c| c.text.as_str())
            .collect::<Vec<_>>()
            .join("");

        log_info_indent(format!("✓ Received {} bytes", text.len()), 1);
        Ok(text)
    }
}

impl MappingSuggester for AiClient {
    async fn suggest(&self, request: &SuggestionRequest) -> AiResult<Vec<CandidateField>> {
        self.suggest_fields(request).await
    }
}

/// Parse candidates from the model's text.
///
/// Accepts a bare array or an object wrapping one under `fields` or
/// `mappings`. Elements that are not candidate objects are dropped; text
/// that is not JSON at all is an error.
pub fn parse_candidates(response: &str) -> AiResult<Vec<CandidateField>> {
    let json_str = extract_json(response);
    let value: Value = serde_json::from_str(&json_str).map_err(|e| {
        AiError::InvalidJson(format!(
            "{}. Response was: {}",
            e,
            response.chars().take(500).collect::<String>()
        ))
    })?;

    let items = match value {
        Value::Array(items) => items,
        Value::Object(mut obj) => match obj.remove("fields").or_else(|| obj.remove("mappings")) {
            Some(Value::Array(items)) => items,
            _ => Vec::new(),
        },
        _ => Vec::new(),
    };

    Ok(items
        .into_iter()
        .filter_map(|item| serde_json::from_value::<CandidateField>(item).ok())
        .collect())
}

/// Extract JSON from a response that may contain markdown code blocks
fn extract_json(text: &str) -> String {
    if let Some(start) = text.find("```json") {
        let json_start = start + 7; // len of "```json"
        if let Some(end) = text[json_start..].find("```") {
            return text[json_start..json_start + end].trim().to_string();
        }
    }

    if let Some(start) = text.find("```") {
        let after_start = start + 3;
        // Skip language identifier if present
        let content_start = text[after_start..]
            .find('\n')
            .map(|i| after_start + i + 1)
            .unwrap_or(after_start);

        if let Some(end) = text[content_start..].find("```") {
            return text[content_start..content_start + end].trim().to_string();
        }
    }

    // Raw JSON: whichever of array or object opens first
    let (open, close) = match (text.find('['), text.find('{')) {
        (Some(a), Some(o)) if o < a => ('{', '}'),
        (Some(_), _) => ('[', ']'),
        (None, Some(_)) => ('{', '}'),
        (None, None) => return text.trim().to_string(),
    };
    if let (Some(start), Some(end)) = (text.find(open), text.rfind(close)) {
        if start < end {
            return text[start..=end].to_string();
        }
    }

    text.trim().to_string()
}
