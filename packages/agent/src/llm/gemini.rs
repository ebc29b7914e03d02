//! Google Generative Language API backend.

use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::header::CONTENT_TYPE;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::config::AgentConfig;
use crate::error::{FormAgentError, Result};
use crate::llm::client::{
    BackendResponse, GenerationRequest, LlmBackend, SafetyFeedback, SafetyRating,
};

/// User agent string identifying this client.
const USER_AGENT: &str = concat!("formagent/", env!("CARGO_PKG_VERSION"));

/// Candidate finish reasons meaning the provider refused to generate.
const REFUSAL_FINISH_REASONS: &[&str] = &["SAFETY", "PROHIBITED_CONTENT", "BLOCKLIST", "SPII"];

/// Gemini REST client.
///
/// NOTE: Do NOT derive `Debug` on this struct, `api_key` would be exposed.
pub struct GeminiBackend {
    http: Client,
    api_key: String,
    api_base_url: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest<'a> {
    contents: [Content<'a>; 1],
    generation_config: GenerationConfig,
}

#[derive(Serialize)]
struct Content<'a> {
    role: &'a str,
    parts: [Part<'a>; 1],
}

#[derive(Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f64,
    max_output_tokens: u32,
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
struct GenerateContentResponse {
    candidates: Vec<Candidate>,
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
struct Candidate {
    content: Option<CandidateContent>,
    finish_reason: Option<String>,
    safety_ratings: Vec<Rating>,
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct CandidateContent {
    parts: Vec<ResponsePart>,
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct ResponsePart {
    text: Option<String>,
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
struct PromptFeedback {
    block_reason: Option<String>,
    safety_ratings: Vec<Rating>,
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct Rating {
    category: String,
    probability: String,
}

impl From<Rating> for SafetyRating {
    fn from(rating: Rating) -> Self {
        SafetyRating {
            category: rating.category,
            probability: rating.probability,
        }
    }
}

#[derive(Deserialize)]
struct ErrorResponse {
    error: Option<ErrorDetail>,
}

#[derive(Deserialize)]
struct ErrorDetail {
    message: String,
}

impl GeminiBackend {
    /// Build a backend from configuration. An empty API key is a fatal
    /// configuration error.
    pub fn new(config: &AgentConfig) -> Result<Self> {
        if config.api_key.trim().is_empty() {
            return Err(FormAgentError::Config("API key is empty".into()));
        }

        let http = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(USER_AGENT)
            .build()?;

        Ok(Self {
            http,
            api_key: config.api_key.clone(),
            api_base_url: config.api_base_url.trim_end_matches('/').to_string(),
        })
    }

    fn endpoint(&self, model: &str) -> String {
        format!("{}/v1beta/models/{model}:generateContent", self.api_base_url)
    }
}

impl LlmBackend for GeminiBackend {
    fn generate(&self, request: &GenerationRequest) -> Result<BackendResponse> {
        let body = GenerateContentRequest {
            contents: [Content {
                role: "user",
                parts: [Part {
                    text: &request.prompt,
                }],
            }],
            generation_config: GenerationConfig {
                temperature: request.temperature,
                max_output_tokens: request.max_output_tokens,
            },
        };

        let response = self
            .http
            .post(self.endpoint(&request.model))
            .header("x-goog-api-key", &self.api_key)
            .header(CONTENT_TYPE, "application/json")
            .body(serde_json::to_vec(&body)?)
            .send()?;

        let status = response.status();
        let body_text = response.text()?;

        if !status.is_success() {
            let message = serde_json::from_str::<ErrorResponse>(&body_text)
                .ok()
                .and_then(|r| r.error)
                .map(|e| e.message)
                .unwrap_or(body_text);
            return Err(FormAgentError::ProviderStatus {
                status: status.as_u16(),
                message,
            });
        }

        let raw: Value = serde_json::from_str(&body_text)
            .map_err(|e| FormAgentError::ResponseParse(e.to_string()))?;

        debug!(bytes = body_text.len(), "decoded provider response");
        Ok(interpret(raw))
    }
}

/// Split a decoded body into direct text, safety metadata and the raw value.
///
/// A body that does not match the expected shape still comes back with
/// `raw` intact so the transport can search it.
fn interpret(raw: Value) -> BackendResponse {
    let parsed = GenerateContentResponse::deserialize(&raw).unwrap_or_default();

    let first = parsed.candidates.into_iter().next();

    let text = first
        .as_ref()
        .and_then(|c| c.content.as_ref())
        .map(|content| {
            content
                .parts
                .iter()
                .filter_map(|p| p.text.as_deref())
                .collect::<String>()
        })
        .filter(|t| !t.is_empty());

    let prompt_safety = parsed.prompt_feedback.and_then(|feedback| {
        (feedback.block_reason.is_some() || !feedback.safety_ratings.is_empty()).then(|| {
            SafetyFeedback {
                block_reason: feedback.block_reason,
                ratings: feedback.safety_ratings.into_iter().map(Into::into).collect(),
            }
        })
    });

    let candidate_safety = first.and_then(|c| {
        let refused = c
            .finish_reason
            .as_deref()
            .is_some_and(|reason| REFUSAL_FINISH_REASONS.contains(&reason));
        refused.then(|| SafetyFeedback {
            block_reason: c.finish_reason,
            ratings: c.safety_ratings.into_iter().map(Into::into).collect(),
        })
    });

    BackendResponse {
        text,
        safety: prompt_safety.or(candidate_safety),
        raw,
    }
}
