//! Terminal rendering of query results.

use console::style;
use serde_json::Value;
use textwrap::Options;

use crate::answer::{Confidence, Evidence, ExtractedAnswer, SummaryReport};
use crate::document::{display_name_for, Document};
use crate::llm::Diagnostic;
use crate::query::QueryResult;

/// Wrap width for free text.
const WRAP_WIDTH: usize = 100;

/// Render an answer, mapping form ids to display names.
pub fn render_answer(result: &QueryResult<ExtractedAnswer>, documents: &[Document]) -> String {
    if let Some(diagnostic) = result.diagnostic() {
        return render_diagnostic(&diagnostic);
    }

    let answer = match (&result.result, result.success) {
        (Some(answer), true) => answer,
        _ => return render_unparsed(result.error.as_deref(), &result.raw),
    };

    let mut lines = Vec::new();
    match answer {
        ExtractedAnswer::Single(single) => {
            match &single.answer {
                Some(text) => {
                    lines.push(style("Answer").bold().to_string());
                    lines.push(wrap(text, "  "));
                }
                None => lines.push(
                    style("No answer found in the selected forms.")
                        .yellow()
                        .to_string(),
                ),
            }
            lines.push(format!("Confidence: {}", styled_confidence(single.confidence)));
            if let Some(file) = &single.file {
                lines.push(format!(
                    "Form: {}",
                    style(display_name_for(documents, file)).cyan()
                ));
            }
            lines.extend(evidence_lines(
                &single.evidence,
                documents,
                single.file.as_deref(),
            ));
            if let Some(note) = &single.note {
                lines.push(style("Note").dim().to_string());
                lines.push(wrap(note, "  "));
            }
        }
        ExtractedAnswer::Multi(items) => {
            lines.push(
                style(format!("Found {} matching form(s)", items.len()))
                    .bold()
                    .to_string(),
            );
            for item in items {
                let name = item
                    .file
                    .as_deref()
                    .map(|id| display_name_for(documents, id))
                    .unwrap_or("(unknown form)");
                lines.push(String::new());
                lines.push(format!(
                    "{} [{}]",
                    style(name).cyan().bold(),
                    styled_confidence(item.confidence)
                ));
                lines.extend(item.extracted.iter().map(|(key, value)| {
                    format!(
                        "  {}: {}",
                        title_case(key),
                        value.as_ref().map(value_text).unwrap_or_else(|| "-".into())
                    )
                }));
                lines.extend(evidence_lines(&item.evidence, documents, item.file.as_deref()));
            }
        }
        ExtractedAnswer::Empty => {
            lines.push(style("No matching forms found.").yellow().to_string());
        }
    }
    join_lines(lines)
}

/// Render a summary. Output that did not parse is shown as plain text.
pub fn render_summary(result: &QueryResult<SummaryReport>) -> String {
    if let Some(diagnostic) = result.diagnostic() {
        return render_diagnostic(&diagnostic);
    }

    let fallback;
    let report = match (&result.result, result.success) {
        (Some(report), true) => report,
        _ => {
            fallback = SummaryReport::unstructured(&result.raw);
            &fallback
        }
    };

    let mut lines = Vec::new();
    if let Some(form_type) = &report.form_type {
        lines.push(format!("Form type: {}", style(form_type).cyan()));
    }
    lines.push(style("Summary").bold().to_string());
    lines.push(wrap(
        report.summary.as_deref().unwrap_or("(no summary)"),
        "  ",
    ));

    if !report.key_fields.is_empty() {
        lines.push(style("Key fields").bold().to_string());
        lines.extend(report.key_fields.iter().map(|(key, value)| {
            format!("  {}: {}", title_case(key), value.as_deref().unwrap_or("-"))
        }));
    }

    if !report.warnings.is_empty() {
        lines.push(style("Warnings").yellow().bold().to_string());
        lines.extend(report.warnings.iter().map(|warning| wrap(warning, "  - ")));
    }

    if !report.structured {
        lines.push(
            style("(model output was not structured JSON)")
                .dim()
                .to_string(),
        );
    }
    join_lines(lines)
}

fn evidence_lines(
    evidence: &[Evidence],
    documents: &[Document],
    default_file: Option<&str>,
) -> Vec<String> {
    if evidence.is_empty() {
        return Vec::new();
    }

    let mut lines = vec![style("Evidence").dim().to_string()];
    lines.extend(evidence.iter().map(|item| {
        let source = item
            .file
            .as_deref()
            .or(default_file)
            .map(|id| display_name_for(documents, id));
        let line = match source {
            Some(name) => format!("[{name}] {}", item.snippet),
            None => item.snippet.clone(),
        };
        wrap(&line, "  ")
    }));
    lines
}

/// One line per entry, newline-terminated.
fn join_lines(lines: Vec<String>) -> String {
    let mut out = lines.join("\n");
    out.push('\n');
    out
}

fn render_diagnostic(diagnostic: &Diagnostic) -> String {
    let label = match diagnostic {
        Diagnostic::BlockedBySafety { .. } => "Blocked by safety filter",
        Diagnostic::NoContentGenerated { .. } => "The model returned no content",
        Diagnostic::ExceptionCallingApi { .. } => "Calling the LLM API failed",
    };
    format!(
        "{}\n{}\n",
        style(label).red().bold(),
        wrap(diagnostic.detail(), "  ")
    )
}

fn render_unparsed(error: Option<&str>, raw: &str) -> String {
    format!(
        "{}\n{}\n{}\n",
        style(error.unwrap_or("No result")).red().bold(),
        style("Raw model output:").dim(),
        raw
    )
}

fn styled_confidence(confidence: Confidence) -> String {
    let label = style(confidence.as_str());
    match confidence {
        Confidence::High => label.green().bold(),
        Confidence::Medium => label.yellow().bold(),
        Confidence::Low => label.red().bold(),
        Confidence::Unknown => label.dim(),
    }
    .to_string()
}

fn wrap(text: &str, indent: &str) -> String {
    let subsequent = " ".repeat(indent.chars().count());
    textwrap::fill(
        text,
        Options::new(WRAP_WIDTH)
            .initial_indent(indent)
            .subsequent_indent(&subsequent),
    )
}

/// `gross_income` -> `Gross Income`.
pub fn title_case(key: &str) -> String {
    key.split(|c: char| c == '_' || c.is_whitespace())
        .filter(|word| !word.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

fn value_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
