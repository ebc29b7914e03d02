//! Question answering and summaries over OCR'd forms.
//!
//! Each query runs `build -> call -> extract`. Provider failures arrive as
//! diagnostic text from the transport, so the only branch taken here is on
//! whether the model output parsed as JSON.

use std::fmt;

use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::answer::{ExtractedAnswer, FromRecovered, SummaryReport};
use crate::config::AgentConfig;
use crate::document::Document;
use crate::error::Result;
use crate::extract::{extract, ParseOutcome};
use crate::llm::{
    Backoff, CallOptions, Diagnostic, GeminiBackend, LlmBackend, LlmTransport, ThreadSleep,
};
use crate::prompt::{self, PromptRequest};

/// Error message reported when no extraction strategy succeeds.
pub const UNPARSED_ERROR: &str = "Could not parse LLM output as JSON";

/// Lifecycle of a single query. Only used for logging; nothing is kept
/// between queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryPhase {
    Building,
    Calling,
    Extracting,
    Succeeded,
    Failed,
}

impl fmt::Display for QueryPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            QueryPhase::Building => "BUILDING",
            QueryPhase::Calling => "CALLING",
            QueryPhase::Extracting => "EXTRACTING",
            QueryPhase::Succeeded => "SUCCEEDED",
            QueryPhase::Failed => "FAILED",
        })
    }
}

/// Outcome of one query. `raw` always holds the text the transport returned.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryResult<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<T>,
    /// The recovered JSON, before interpretation.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub raw: String,
}

impl<T> QueryResult<T> {
    fn parsed(result: T, value: Value, raw: String) -> Self {
        Self {
            success: true,
            result: Some(result),
            value: Some(value),
            error: None,
            raw,
        }
    }

    fn unparsed(raw: String) -> Self {
        Self {
            success: false,
            result: None,
            value: None,
            error: Some(UNPARSED_ERROR.to_string()),
            raw,
        }
    }

    /// Transport diagnostic hiding behind a successful parse, if any.
    pub fn diagnostic(&self) -> Option<Diagnostic> {
        self.value.as_ref().and_then(Diagnostic::from_value)
    }
}

/// Composes prompt building, the LLM transport and JSON recovery.
pub struct QueryOrchestrator<B: LlmBackend, S: Backoff = ThreadSleep> {
    transport: LlmTransport<B, S>,
    options: CallOptions,
    per_file_char_limit: usize,
}

impl QueryOrchestrator<GeminiBackend> {
    /// Orchestrator talking to the Gemini API.
    pub fn from_config(config: &AgentConfig) -> Result<Self> {
        let backend = GeminiBackend::new(config)?;
        Ok(Self::new(backend, config))
    }
}

impl<B: LlmBackend> QueryOrchestrator<B> {
    pub fn new(backend: B, config: &AgentConfig) -> Self {
        Self::with_transport(LlmTransport::new(backend, config), config)
    }
}

impl<B: LlmBackend, S: Backoff> QueryOrchestrator<B, S> {
    pub fn with_transport(transport: LlmTransport<B, S>, config: &AgentConfig) -> Self {
        Self {
            transport,
            options: CallOptions::from_config(config),
            per_file_char_limit: config.per_file_char_limit,
        }
    }

    pub fn transport(&self) -> &LlmTransport<B, S> {
        &self.transport
    }

    /// Answer a question over one or more forms.
    pub fn answer_question(
        &self,
        documents: &[Document],
        question: &str,
    ) -> Result<QueryResult<ExtractedAnswer>> {
        info!(forms = documents.len(), "answering question");
        self.run(&PromptRequest::answer(documents, question))
    }

    /// Summarize one or more forms.
    pub fn summarize(&self, documents: &[Document]) -> Result<QueryResult<SummaryReport>> {
        info!(forms = documents.len(), "summarizing forms");
        self.run(&PromptRequest::summarize(documents))
    }

    fn run<T: FromRecovered>(&self, request: &PromptRequest<'_>) -> Result<QueryResult<T>> {
        debug!(phase = %QueryPhase::Building, intent = ?request.intent, "building prompt");
        let rendered = prompt::build(request, self.per_file_char_limit)?;

        debug!(phase = %QueryPhase::Calling, prompt_chars = rendered.text.chars().count(), "calling LLM");
        let raw = self
            .transport
            .call(request.system_instructions, &rendered.text, &self.options)?;

        debug!(phase = %QueryPhase::Extracting, raw_chars = raw.chars().count(), "extracting JSON");
        match extract(&raw) {
            ParseOutcome::Parsed { value, strategy } => {
                info!(phase = %QueryPhase::Succeeded, strategy = %strategy, "query finished");
                let result = T::from_value(&value);
                let outcome = QueryResult::parsed(result, value, raw);
                if let Some(diagnostic) = outcome.diagnostic() {
                    warn!(kind = ?diagnostic.kind(), detail = diagnostic.detail(), "LLM call failed");
                }
                Ok(outcome)
            }
            ParseOutcome::Unparsed => {
                warn!(phase = %QueryPhase::Failed, "{}", UNPARSED_ERROR);
                Ok(QueryResult::unparsed(raw))
            }
        }
    }
}
