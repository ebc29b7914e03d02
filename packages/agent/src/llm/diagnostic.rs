//! Failure-as-data: the transport never raises for ordinary provider
//! failures, it hands back a JSON diagnostic string instead.

use serde::Deserialize;
use serde_json::{json, Value};

/// Why an LLM call produced no usable text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// Provider refused to generate. Not retried.
    SafetyRejection,
    /// Provider answered but no text could be found.
    NoContent,
    /// Network or provider error.
    TransportError,
}

/// Outcome of a transport call before it is flattened to a string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LlmOutcome {
    Success { text: String },
    Failure { kind: FailureKind, detail: String },
}

impl LlmOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, LlmOutcome::Success { .. })
    }

    /// Model text on success, a JSON-encoded [`Diagnostic`] otherwise.
    pub fn into_response_text(self) -> String {
        match self {
            LlmOutcome::Success { text } => text,
            LlmOutcome::Failure { kind, detail } => Diagnostic::from_failure(kind, detail).to_json(),
        }
    }
}

/// Diagnostic object emitted in place of model text.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "error", rename_all = "snake_case")]
pub enum Diagnostic {
    BlockedBySafety { safety_reason: String },
    NoContentGenerated { raw_response_preview: String },
    ExceptionCallingApi { details: String },
}

impl Diagnostic {
    pub fn from_failure(kind: FailureKind, detail: String) -> Self {
        match kind {
            FailureKind::SafetyRejection => Diagnostic::BlockedBySafety {
                safety_reason: detail,
            },
            FailureKind::NoContent => Diagnostic::NoContentGenerated {
                raw_response_preview: detail,
            },
            FailureKind::TransportError => Diagnostic::ExceptionCallingApi { details: detail },
        }
    }

    /// Recognise a diagnostic that made it through JSON recovery.
    pub fn from_value(value: &Value) -> Option<Self> {
        Diagnostic::deserialize(value).ok()
    }

    pub fn kind(&self) -> FailureKind {
        match self {
            Diagnostic::BlockedBySafety { .. } => FailureKind::SafetyRejection,
            Diagnostic::NoContentGenerated { .. } => FailureKind::NoContent,
            Diagnostic::ExceptionCallingApi { .. } => FailureKind::TransportError,
        }
    }

    pub fn detail(&self) -> &str {
        match self {
            Diagnostic::BlockedBySafety { safety_reason } => safety_reason,
            Diagnostic::NoContentGenerated {
                raw_response_preview,
            } => raw_response_preview,
            Diagnostic::ExceptionCallingApi { details } => details,
        }
    }

    pub fn to_value(&self) -> Value {
        match self {
            Diagnostic::BlockedBySafety { safety_reason } => {
                json!({"error": "blocked_by_safety", "safety_reason": safety_reason})
            }
            Diagnostic::NoContentGenerated {
                raw_response_preview,
            } => json!({
                "error": "no_content_generated",
                "raw_response_preview": raw_response_preview,
            }),
            Diagnostic::ExceptionCallingApi { details } => {
                json!({"error": "exception_calling_api", "details": details})
            }
        }
    }

    pub fn to_json(&self) -> String {
        self.to_value().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failure_renders_as_json() {
        let outcome = LlmOutcome::Failure {
            kind: FailureKind::SafetyRejection,
            detail: "HARM_CATEGORY_HARASSMENT:HIGH".into(),
        };
        let text = outcome.into_response_text();
        let value: Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value["error"], "blocked_by_safety");
        assert_eq!(value["safety_reason"], "HARM_CATEGORY_HARASSMENT:HIGH");
    }

    #[test]
    fn test_success_is_passed_through() {
        let outcome = LlmOutcome::Success {
            text: "{\"a\":1}".into(),
        };
        assert!(outcome.is_success());
        assert_eq!(outcome.into_response_text(), "{\"a\":1}");
    }

    #[test]
    fn test_diagnostic_round_trip_through_value() {
        for kind in [
            FailureKind::SafetyRejection,
            FailureKind::NoContent,
            FailureKind::TransportError,
        ] {
            let diagnostic = Diagnostic::from_failure(kind, "detail".into());
            let recovered = Diagnostic::from_value(&diagnostic.to_value()).unwrap();
            assert_eq!(recovered.kind(), kind);
            assert_eq!(recovered.detail(), "detail");
        }
    }

    #[test]
    fn test_answers_are_not_diagnostics() {
        let answer = json!({"mode": "single", "answer": "Alex"});
        assert!(Diagnostic::from_value(&answer).is_none());
        assert!(Diagnostic::from_value(&json!({"error": "something_else"})).is_none());
        assert!(Diagnostic::from_value(&json!([])).is_none());
    }
}
