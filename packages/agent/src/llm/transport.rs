//! Bounded-retry LLM call that always yields a string.
//!
//! A call either returns model text or a JSON diagnostic; the only error
//! that escapes is a fatal configuration problem.

use std::time::Duration;

use serde_json::Value;
use tracing::{debug, warn};

use crate::config::AgentConfig;
use crate::error::Result;
use crate::llm::client::{BackendResponse, GenerationRequest, LlmBackend};
use crate::llm::diagnostic::{FailureKind, LlmOutcome};
use crate::prompt::truncate_chars;

/// Temperature is pinned to keep JSON-shaped output as deterministic as possible.
pub const TEMPERATURE: f64 = 0.0;

/// Maximum characters of the raw response kept in a no-content diagnostic.
pub const RAW_PREVIEW_CHARS: usize = 2000;

/// Depth limit of the recursive `text` field search.
pub const TEXT_SEARCH_MAX_DEPTH: usize = 32;

/// Waits between attempts. Swappable so tests can observe backoff without sleeping.
pub trait Backoff: Send + Sync {
    fn wait(&self, delay: Duration);
}

/// Blocks the current thread.
#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadSleep;

impl Backoff for ThreadSleep {
    fn wait(&self, delay: Duration) {
        std::thread::sleep(delay);
    }
}

/// Per-call settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallOptions {
    pub model: String,
    pub max_output_tokens: u32,
    /// Extra attempts after the first.
    pub retries: u32,
}

impl CallOptions {
    pub fn from_config(config: &AgentConfig) -> Self {
        Self {
            model: config.model.clone(),
            max_output_tokens: config.max_output_tokens,
            retries: config.retries,
        }
    }
}

/// LLM transport: retries, truncation on retry, and text resolution.
pub struct LlmTransport<B: LlmBackend, S: Backoff = ThreadSleep> {
    backend: B,
    backoff: S,
    retry_truncate_chars: usize,
    backoff_unit: Duration,
}

impl<B: LlmBackend> LlmTransport<B> {
    pub fn new(backend: B, config: &AgentConfig) -> Self {
        Self::with_backoff(backend, ThreadSleep, config)
    }
}

impl<B: LlmBackend, S: Backoff> LlmTransport<B, S> {
    pub fn with_backoff(backend: B, backoff: S, config: &AgentConfig) -> Self {
        Self {
            backend,
            backoff,
            retry_truncate_chars: config.retry_truncate_chars,
            backoff_unit: config.backoff_unit,
        }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backoff(&self) -> &S {
        &self.backoff
    }

    /// Call the model and flatten the outcome to text: model output on
    /// success, a JSON diagnostic otherwise.
    pub fn call(
        &self,
        system_instructions: &str,
        user_prompt: &str,
        options: &CallOptions,
    ) -> Result<String> {
        Ok(self
            .call_outcome(system_instructions, user_prompt, options)?
            .into_response_text())
    }

    /// Call the model, keeping the success/failure distinction.
    pub fn call_outcome(
        &self,
        system_instructions: &str,
        user_prompt: &str,
        options: &CallOptions,
    ) -> Result<LlmOutcome> {
        let prompt_full = format!("{system_instructions}\n\n{user_prompt}");
        let attempts = options.retries.saturating_add(1);

        let mut last_failure = (FailureKind::NoContent, String::new());

        for attempt in 0..attempts {
            // Oversized prompts are a suspected cause of malformed responses.
            let prompt = if attempt == 0 {
                prompt_full.as_str()
            } else {
                truncate_chars(&prompt_full, self.retry_truncate_chars)
            };

            let request = GenerationRequest {
                model: options.model.clone(),
                prompt: prompt.to_string(),
                temperature: TEMPERATURE,
                max_output_tokens: options.max_output_tokens,
            };

            debug!(
                attempt,
                model = %request.model,
                prompt_chars = prompt.chars().count(),
                "LLM request"
            );

            let failure = match self.backend.generate(&request) {
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => {
                    warn!(attempt, error = %e, "LLM call failed");
                    (FailureKind::TransportError, e.to_string())
                }
                Ok(response) => match resolve(&response) {
                    Resolution::Text(text) => {
                        debug!(attempt, chars = text.chars().count(), "LLM returned text");
                        return Ok(LlmOutcome::Success { text });
                    }
                    Resolution::Blocked(reason) => {
                        warn!(attempt, reason = %reason, "LLM response blocked by safety filter");
                        return Ok(LlmOutcome::Failure {
                            kind: FailureKind::SafetyRejection,
                            detail: reason,
                        });
                    }
                    Resolution::Nothing => {
                        warn!(attempt, "LLM returned no content");
                        (FailureKind::NoContent, raw_preview(&response.raw))
                    }
                },
            };

            if attempt + 1 < attempts {
                let delay = backoff_delay(self.backoff_unit, attempt);
                let delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX);
                debug!(attempt, delay_ms, "retrying after delay");
                self.backoff.wait(delay);
            }
            last_failure = failure;
        }

        let (kind, detail) = last_failure;
        Ok(LlmOutcome::Failure { kind, detail })
    }
}

/// Wait before the attempt following `attempt`: `(1 + 2 * attempt)` units,
/// saturating at `Duration::MAX`.
fn backoff_delay(unit: Duration, attempt: u32) -> Duration {
    let factor = attempt.saturating_mul(2).saturating_add(1);
    unit.checked_mul(factor).unwrap_or(Duration::MAX)
}

enum Resolution {
    Text(String),
    Blocked(String),
    Nothing,
}

/// Resolution order: direct accessor, candidate list, safety metadata, then
/// any `text` field anywhere in the body.
fn resolve(response: &BackendResponse) -> Resolution {
    if let Some(text) = response.text.as_ref().filter(|t| !t.is_empty()) {
        return Resolution::Text(text.clone());
    }
    if let Some(text) = candidate_text(&response.raw) {
        return Resolution::Text(text.to_string());
    }
    if let Some(safety) = &response.safety {
        return Resolution::Blocked(safety.reason());
    }
    match find_text_field(&response.raw, TEXT_SEARCH_MAX_DEPTH) {
        Some(text) => Resolution::Text(text.to_string()),
        None => Resolution::Nothing,
    }
}

/// Text of the first candidate, in any of the shapes providers use.
fn candidate_text(raw: &Value) -> Option<&str> {
    let first = raw.get("candidates")?.as_array()?.first()?;

    let content = first.get("content");
    let nested = content
        .and_then(|c| c.as_array())
        .and_then(|items| items.first())
        .and_then(|item| item.get("text"))
        .or_else(|| {
            content
                .and_then(|c| c.get("parts"))
                .and_then(|parts| parts.as_array())
                .and_then(|parts| parts.first())
                .and_then(|part| part.get("text"))
        })
        .and_then(Value::as_str)
        .filter(|t| !t.is_empty());

    nested.or_else(|| {
        first
            .get("text")
            .and_then(Value::as_str)
            .filter(|t| !t.is_empty())
    })
}

/// First non-empty string stored under a key named `text`, searching at most
/// `max_depth` levels deep.
pub fn find_text_field(value: &Value, max_depth: usize) -> Option<&str> {
    if max_depth == 0 {
        return None;
    }
    match value {
        Value::Object(map) => map.iter().find_map(|(key, child)| match child {
            Value::String(s) if key == "text" && !s.is_empty() => Some(s.as_str()),
            _ => find_text_field(child, max_depth - 1),
        }),
        Value::Array(items) => items
            .iter()
            .find_map(|item| find_text_field(item, max_depth - 1)),
        _ => None,
    }
}

fn raw_preview(raw: &Value) -> String {
    truncate_chars(&raw.to_string(), RAW_PREVIEW_CHARS).to_string()
}
