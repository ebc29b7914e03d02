//! Form agent - Ask questions about OCR'd forms.
//!
//! This crate answers natural-language questions over the text of scanned
//! forms by prompting an LLM, and recovers structured JSON from whatever the
//! model sends back: clean JSON, fenced blocks, sentinel-wrapped output or
//! JSON buried in prose.
//!
//! # Example
//!
//! ```
//! use formagent::extract::{extract, Strategy};
//!
//! let outcome = extract("Here you go: <JSON>{\"answer\": \"42\"}</JSON>");
//! assert!(outcome.is_parsed());
//! assert_eq!(outcome.value().unwrap()["answer"], "42");
//! assert_eq!(Strategy::ALL.len(), 6);
//! ```
//!
//! # Architecture
//!
//! - [`prompt`]: Prompt rendering with per-document truncation
//! - [`llm`]: LLM transport with bounded retries and diagnostics
//! - [`extract`]: Ordered JSON recovery strategies
//! - [`answer`]: Typed views over recovered JSON
//! - [`query`]: Orchestration of build, call and extract
//! - [`store`]: Directory-backed form store
//! - [`render`]: Terminal rendering
//! - [`cli`]: Command-line interface

pub mod answer;
pub mod cli;
pub mod config;
pub mod document;
pub mod error;
pub mod extract;
pub mod llm;
pub mod prompt;
pub mod query;
pub mod render;
pub mod store;

pub use answer::{Confidence, ExtractedAnswer, SummaryReport};
pub use config::AgentConfig;
pub use document::Document;
pub use error::{FormAgentError, Result};
pub use extract::{extract, ParseOutcome, Strategy};
pub use llm::{Diagnostic, GeminiBackend, LlmBackend, LlmTransport};
pub use query::{QueryOrchestrator, QueryResult};
pub use store::FormStore;
