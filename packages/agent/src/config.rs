//! Runtime configuration for the form agent.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::error::{FormAgentError, Result};

/// Environment variable holding the provider credential.
pub const API_KEY_VAR: &str = "GOOGLE_API_KEY";

/// Default model used for both question answering and summaries.
pub const DEFAULT_MODEL: &str = "gemini-flash-lite-latest";

/// Default base URL of the Generative Language API.
pub const DEFAULT_API_BASE_URL: &str = "https://generativelanguage.googleapis.com";

/// Default per-document character cap applied when building question prompts.
pub const DEFAULT_PER_FILE_CHAR_LIMIT: usize = 3000;

/// Default cutoff for the prompt resent on retry attempts.
pub const DEFAULT_RETRY_TRUNCATE_CHARS: usize = 3000;

/// Default directory of the form store.
pub const DEFAULT_STORE_DIR: &str = "data/forms_db";

/// Configuration for the LLM-backed query pipeline.
///
/// `Debug` is implemented by hand so the API key never ends up in logs.
#[derive(Clone)]
pub struct AgentConfig {
    pub api_key: String,
    pub model: String,
    pub api_base_url: String,
    pub max_output_tokens: u32,
    /// Extra attempts after the first one.
    pub retries: u32,
    pub retry_truncate_chars: usize,
    pub per_file_char_limit: usize,
    pub timeout_secs: u64,
    /// One backoff "time unit"; attempt `n` waits `(1 + 2n)` units.
    pub backoff_unit: Duration,
}

impl fmt::Debug for AgentConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AgentConfig")
            .field("api_key", &"[redacted]")
            .field("model", &self.model)
            .field("api_base_url", &self.api_base_url)
            .field("max_output_tokens", &self.max_output_tokens)
            .field("retries", &self.retries)
            .field("retry_truncate_chars", &self.retry_truncate_chars)
            .field("per_file_char_limit", &self.per_file_char_limit)
            .field("timeout_secs", &self.timeout_secs)
            .field("backoff_unit", &self.backoff_unit)
            .finish()
    }
}

impl AgentConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let api_key = lookup(API_KEY_VAR)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .ok_or_else(|| FormAgentError::Config(format!("{API_KEY_VAR} not set")))?;

        let model = lookup("FORMAGENT_MODEL").unwrap_or_else(|| DEFAULT_MODEL.into());

        let api_base_url =
            lookup("FORMAGENT_API_BASE_URL").unwrap_or_else(|| DEFAULT_API_BASE_URL.into());

        let backoff_unit_ms: u64 = parsed_var(&lookup, "FORMAGENT_BACKOFF_UNIT_MS").unwrap_or(1000);

        Ok(Self {
            api_key,
            model,
            api_base_url,
            max_output_tokens: parsed_var(&lookup, "FORMAGENT_MAX_OUTPUT_TOKENS").unwrap_or(1024),
            retries: parsed_var(&lookup, "FORMAGENT_RETRIES").unwrap_or(1),
            retry_truncate_chars: parsed_var(&lookup, "FORMAGENT_RETRY_TRUNCATE_CHARS")
                .unwrap_or(DEFAULT_RETRY_TRUNCATE_CHARS),
            per_file_char_limit: parsed_var(&lookup, "FORMAGENT_PER_FILE_CHAR_LIMIT")
                .unwrap_or(DEFAULT_PER_FILE_CHAR_LIMIT),
            timeout_secs: parsed_var(&lookup, "FORMAGENT_TIMEOUT_SECS").unwrap_or(60),
            backoff_unit: Duration::from_millis(backoff_unit_ms),
        })
    }

    /// Create a config builder for testing.
    pub fn builder(api_key: impl Into<String>) -> AgentConfigBuilder {
        AgentConfigBuilder {
            config: AgentConfig {
                api_key: api_key.into(),
                model: DEFAULT_MODEL.into(),
                api_base_url: DEFAULT_API_BASE_URL.into(),
                max_output_tokens: 1024,
                retries: 1,
                retry_truncate_chars: DEFAULT_RETRY_TRUNCATE_CHARS,
                per_file_char_limit: DEFAULT_PER_FILE_CHAR_LIMIT,
                timeout_secs: 60,
                backoff_unit: Duration::from_secs(1),
            },
        }
    }
}

/// Numeric variable; unset or unparsable values yield `None`.
fn parsed_var<F, T>(lookup: &F, name: &str) -> Option<T>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    lookup(name).and_then(|v| v.trim().parse().ok())
}

/// Builder for constructing `AgentConfig` in tests.
pub struct AgentConfigBuilder {
    config: AgentConfig,
}

impl AgentConfigBuilder {
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = model.into();
        self
    }

    pub fn api_base_url(mut self, api_base_url: impl Into<String>) -> Self {
        self.config.api_base_url = api_base_url.into();
        self
    }

    pub fn max_output_tokens(mut self, max_output_tokens: u32) -> Self {
        self.config.max_output_tokens = max_output_tokens;
        self
    }

    pub fn retries(mut self, retries: u32) -> Self {
        self.config.retries = retries;
        self
    }

    pub fn retry_truncate_chars(mut self, chars: usize) -> Self {
        self.config.retry_truncate_chars = chars;
        self
    }

    pub fn per_file_char_limit(mut self, chars: usize) -> Self {
        self.config.per_file_char_limit = chars;
        self
    }

    pub fn timeout_secs(mut self, timeout_secs: u64) -> Self {
        self.config.timeout_secs = timeout_secs;
        self
    }

    pub fn backoff_unit(mut self, backoff_unit: Duration) -> Self {
        self.config.backoff_unit = backoff_unit;
        self
    }

    pub fn build(self) -> AgentConfig {
        self.config
    }
}

/// Resolve the form store directory: explicit flag, then
/// `FORMAGENT_STORE_DIR`, then the default.
pub fn store_dir(explicit: Option<PathBuf>) -> PathBuf {
    explicit
        .or_else(|| std::env::var_os("FORMAGENT_STORE_DIR").map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from(DEFAULT_STORE_DIR))
}
