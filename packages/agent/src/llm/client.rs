use serde_json::Value;

use crate::error::Result;

/// One generation request as sent to the provider.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationRequest {
    pub model: String,
    pub prompt: String,
    pub temperature: f64,
    pub max_output_tokens: u32,
}

/// A single safety rating attached by the provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SafetyRating {
    pub category: String,
    pub probability: String,
}

/// Safety metadata signalling that the provider refused to generate.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SafetyFeedback {
    pub block_reason: Option<String>,
    pub ratings: Vec<SafetyRating>,
}

impl SafetyFeedback {
    /// Human-readable reason, e.g. `HARM_CATEGORY_HARASSMENT:HIGH`.
    pub fn reason(&self) -> String {
        if !self.ratings.is_empty() {
            return self
                .ratings
                .iter()
                .map(|r| format!("{}:{}", r.category, r.probability))
                .collect::<Vec<_>>()
                .join(", ");
        }
        self.block_reason
            .clone()
            .unwrap_or_else(|| "unspecified".to_string())
    }
}

/// What a backend got back from one attempt.
///
/// `text` is the provider's own direct accessor; `raw` keeps the full decoded
/// body so the transport can dig for text when the accessor comes up empty.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BackendResponse {
    pub text: Option<String>,
    pub safety: Option<SafetyFeedback>,
    pub raw: Value,
}

/// A text-generation endpoint. One call is one attempt; retries live in the
/// transport. Implementations enable mocking in tests.
pub trait LlmBackend: Send + Sync {
    fn generate(&self, request: &GenerationRequest) -> Result<BackendResponse>;
}

impl<B: LlmBackend + ?Sized> LlmBackend for Box<B> {
    fn generate(&self, request: &GenerationRequest) -> Result<BackendResponse> {
        (**self).generate(request)
    }
}
