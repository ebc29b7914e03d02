//! Prompt construction for question answering and summaries.

use std::collections::HashSet;

use crate::document::Document;
use crate::error::{FormAgentError, Result};

const SYSTEM_UNIFIED: &str = include_str!("../prompts/system_unified.txt");
const SYSTEM_SUMMARY: &str = include_str!("../prompts/system_summary.txt");

/// Opening sentinel the model is told to place before its JSON answer.
pub const JSON_OPEN: &str = "<JSON>";
/// Closing sentinel.
pub const JSON_CLOSE: &str = "</JSON>";

/// System instructions for question answering over one or many forms.
pub fn unified_system_prompt() -> &'static str {
    SYSTEM_UNIFIED.trim()
}

/// System instructions for form summaries.
pub fn summary_system_prompt() -> &'static str {
    SYSTEM_SUMMARY.trim()
}

/// What the caller wants from the model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Intent {
    Answer,
    Summarize,
}

/// Everything needed to render one prompt.
#[derive(Debug, Clone)]
pub struct PromptRequest<'a> {
    pub system_instructions: &'static str,
    pub documents: &'a [Document],
    pub question: Option<&'a str>,
    pub intent: Intent,
}

impl<'a> PromptRequest<'a> {
    /// Question over the given documents, using the unified answer contract.
    pub fn answer(documents: &'a [Document], question: &'a str) -> Self {
        Self {
            system_instructions: unified_system_prompt(),
            documents,
            question: Some(question),
            intent: Intent::Answer,
        }
    }

    /// Summary of the given documents, using the summary contract.
    pub fn summarize(documents: &'a [Document]) -> Self {
        Self {
            system_instructions: summary_system_prompt(),
            documents,
            question: None,
            intent: Intent::Summarize,
        }
    }

    /// Check the request invariants: at least one document, unique ids, and a
    /// non-blank question exactly when answering.
    pub fn validate(&self) -> Result<()> {
        if self.documents.is_empty() {
            return Err(FormAgentError::InvalidInput(
                "at least one document is required".into(),
            ));
        }

        let mut seen = HashSet::new();
        for doc in self.documents {
            if !seen.insert(doc.id.as_str()) {
                return Err(FormAgentError::InvalidInput(format!(
                    "duplicate document id: {}",
                    doc.id
                )));
            }
        }

        let has_question = self.question.is_some_and(|q| !q.trim().is_empty());
        match (self.intent, has_question) {
            (Intent::Answer, false) => Err(FormAgentError::InvalidInput(
                "a question is required to answer".into(),
            )),
            (Intent::Summarize, true) => Err(FormAgentError::InvalidInput(
                "summaries do not take a question".into(),
            )),
            _ => Ok(()),
        }
    }
}

/// The flattened user prompt sent alongside the system instructions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedPrompt {
    pub text: String,
}

/// Render a prompt. `per_file_char_limit` caps each document excerpt in
/// question prompts; summaries always carry full text.
pub fn build(request: &PromptRequest<'_>, per_file_char_limit: usize) -> Result<RenderedPrompt> {
    request.validate()?;

    let text = match (request.intent, request.question) {
        (Intent::Answer, Some(question)) => {
            build_question_prompt(request.documents, question, per_file_char_limit)
        }
        _ => build_summary_prompt(request.documents),
    };

    Ok(RenderedPrompt { text })
}

/// Label each document and cap its text at `per_file_char_limit` characters,
/// measured after normalizing CRLF line endings.
pub fn label_and_truncate(documents: &[Document], per_file_char_limit: usize) -> String {
    documents
        .iter()
        .map(|doc| {
            let normalized = doc.text.replace("\r\n", "\n");
            let excerpt = truncate_chars(&normalized, per_file_char_limit);
            format!("--- FILE: {} ---\n{}\n", doc.id, excerpt)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn build_question_prompt(documents: &[Document], question: &str, per_file_char_limit: usize) -> String {
    let mut prompt = String::new();

    prompt.push_str("FILES:\n");
    prompt.push_str(&label_and_truncate(documents, per_file_char_limit));
    prompt.push_str("---QUESTION---\n");
    prompt.push_str(question);
    prompt.push_str("\n\n");

    prompt.push_str("IMPORTANT: Output JSON ONLY.\n");
    prompt.push_str("Wrap the output JSON inside the markers:\n\n");
    prompt.push_str(&format!("{JSON_OPEN}\n{{ ... }}\n{JSON_CLOSE}\n\n"));
    prompt.push_str("Do NOT include any text outside these markers.\n");

    prompt
}

fn build_summary_prompt(documents: &[Document]) -> String {
    if let [doc] = documents {
        return format!(
            "Form: {}\n\nOCR Text:\n{}\n\nGenerate a comprehensive summary of this form.",
            doc.display_name, doc.text
        );
    }

    let mut prompt = String::from("Multiple Forms:\n\n");
    for doc in documents {
        prompt.push_str(&format!("--- Form: {} ---\n{}\n", doc.display_name, doc.text));
    }
    prompt.push_str("\nGenerate a comprehensive summary for each form.");
    prompt
}

/// Longest prefix of `text` holding at most `max_chars` characters.
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => &text[..byte_idx],
        None => text,
    }
}
