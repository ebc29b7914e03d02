mod client;
mod diagnostic;
mod gemini;
mod transport;

pub use client::{
    BackendResponse, GenerationRequest, LlmBackend, SafetyFeedback, SafetyRating,
};
pub use diagnostic::{Diagnostic, FailureKind, LlmOutcome};
pub use gemini::GeminiBackend;
pub use transport::{
    find_text_field, Backoff, CallOptions, LlmTransport, ThreadSleep, RAW_PREVIEW_CHARS,
    TEMPERATURE, TEXT_SEARCH_MAX_DEPTH,
};
