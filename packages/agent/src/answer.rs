//! Typed views over the JSON recovered from model output.
//!
//! Nothing the model returns is trusted to be present: every field is
//! optional and missing values are replaced with explicit defaults.

use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;
use serde_json::{Map, Value};

/// Interpretation of a recovered JSON value into a typed result.
pub trait FromRecovered: Sized {
    fn from_value(value: &Value) -> Self;
}

/// Self-reported model confidence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Confidence {
    High,
    Medium,
    Low,
    /// Absent or not one of the three literals.
    #[default]
    Unknown,
}

impl Confidence {
    pub fn from_value(value: Option<&Value>) -> Self {
        match value
            .and_then(Value::as_str)
            .map(|s| s.trim().to_ascii_uppercase())
            .as_deref()
        {
            Some("HIGH") => Confidence::High,
            Some("MEDIUM") => Confidence::Medium,
            Some("LOW") => Confidence::Low,
            _ => Confidence::Unknown,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Confidence::High => "HIGH",
            Confidence::Medium => "MEDIUM",
            Confidence::Low => "LOW",
            Confidence::Unknown => "UNKNOWN",
        }
    }
}

impl fmt::Display for Confidence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Provenance: which file and excerpt back an answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Evidence {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
    pub snippet: String,
}

/// Answer to a question about one form.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SingleAnswer {
    pub file: Option<String>,
    pub answer: Option<String>,
    pub evidence: Vec<Evidence>,
    pub confidence: Confidence,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

/// One matching form in a multi-form answer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MultiAnswerItem {
    pub file: Option<String>,
    pub extracted: BTreeMap<String, Option<Value>>,
    pub evidence: Vec<Evidence>,
    pub confidence: Confidence,
}

/// Classified answer: structural shape only, object is single, array is multi.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "mode", content = "answer", rename_all = "lowercase")]
pub enum ExtractedAnswer {
    Single(SingleAnswer),
    Multi(Vec<MultiAnswerItem>),
    Empty,
}

impl FromRecovered for ExtractedAnswer {
    fn from_value(value: &Value) -> Self {
        match value {
            Value::Object(obj) => ExtractedAnswer::Single(single_from(obj)),
            Value::Array(items) => {
                let items: Vec<MultiAnswerItem> = items
                    .iter()
                    .filter_map(Value::as_object)
                    .map(multi_item_from)
                    .collect();
                if items.is_empty() {
                    ExtractedAnswer::Empty
                } else {
                    ExtractedAnswer::Multi(items)
                }
            }
            _ => ExtractedAnswer::Empty,
        }
    }
}

fn single_from(obj: &Map<String, Value>) -> SingleAnswer {
    SingleAnswer {
        file: text_field(obj, "file"),
        answer: text_field(obj, "answer"),
        evidence: evidence_list(obj.get("evidence")),
        confidence: Confidence::from_value(obj.get("confidence")),
        note: text_field(obj, "note"),
    }
}

fn multi_item_from(obj: &Map<String, Value>) -> MultiAnswerItem {
    let extracted = obj
        .get("extracted")
        .and_then(Value::as_object)
        .map(|fields| {
            fields
                .iter()
                .map(|(k, v)| (k.clone(), (!v.is_null()).then(|| v.clone())))
                .collect()
        })
        .unwrap_or_default();

    MultiAnswerItem {
        file: text_field(obj, "file"),
        extracted,
        evidence: evidence_list(obj.get("evidence")),
        confidence: Confidence::from_value(obj.get("confidence")),
    }
}

fn evidence_list(value: Option<&Value>) -> Vec<Evidence> {
    let Some(items) = value.and_then(Value::as_array) else {
        return Vec::new();
    };

    items
        .iter()
        .filter_map(|item| match item {
            Value::Object(obj) => Some(Evidence {
                file: text_field(obj, "file"),
                snippet: text_field(obj, "snippet").unwrap_or_default(),
            }),
            Value::String(s) => Some(Evidence {
                file: None,
                snippet: s.clone(),
            }),
            _ => None,
        })
        .collect()
}

/// Non-empty string field; numbers and booleans are rendered as text.
fn text_field(obj: &Map<String, Value>, key: &str) -> Option<String> {
    scalar_text(obj.get(key)?)
}

fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Structured summary of one or more forms.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct SummaryReport {
    pub summary: Option<String>,
    pub key_fields: BTreeMap<String, Option<String>>,
    pub warnings: Vec<String>,
    pub form_type: Option<String>,
    /// False when the model output could not be parsed and `summary`
    /// carries the raw text.
    pub structured: bool,
}

impl SummaryReport {
    /// Fallback for output that is not JSON: show the text as the summary.
    pub fn unstructured(raw: &str) -> Self {
        Self {
            summary: Some(raw.trim().to_string()).filter(|s| !s.is_empty()),
            structured: false,
            ..Default::default()
        }
    }

    fn from_object(obj: &Map<String, Value>) -> Self {
        let key_fields = obj
            .get("key_fields")
            .and_then(Value::as_object)
            .map(|fields| {
                fields
                    .iter()
                    .map(|(k, v)| (k.clone(), scalar_text(v)))
                    .collect()
            })
            .unwrap_or_default();

        let warnings = obj
            .get("warnings")
            .and_then(Value::as_array)
            .map(|items| items.iter().filter_map(scalar_text).collect())
            .unwrap_or_default();

        Self {
            summary: text_field(obj, "summary"),
            key_fields,
            warnings,
            form_type: text_field(obj, "form_type"),
            structured: true,
        }
    }

    /// Fold per-form summaries (an array answer) into one report.
    fn merge(reports: Vec<SummaryReport>) -> Self {
        let mut merged = SummaryReport {
            structured: true,
            ..Default::default()
        };
        let mut summaries = Vec::new();
        let mut form_types: Vec<String> = Vec::new();

        for report in reports {
            summaries.extend(report.summary);
            for (key, value) in report.key_fields {
                merged.key_fields.entry(key).or_insert(value);
            }
            merged.warnings.extend(report.warnings);
            if let Some(form_type) = report.form_type {
                if !form_types.contains(&form_type) {
                    form_types.push(form_type);
                }
            }
        }

        merged.summary = (!summaries.is_empty()).then(|| summaries.join("\n\n"));
        merged.form_type = (!form_types.is_empty()).then(|| form_types.join(", "));
        merged
    }
}

impl FromRecovered for SummaryReport {
    fn from_value(value: &Value) -> Self {
        match value {
            Value::Object(obj) => SummaryReport::from_object(obj),
            Value::Array(items) => SummaryReport::merge(
                items
                    .iter()
                    .filter_map(Value::as_object)
                    .map(SummaryReport::from_object)
                    .collect(),
            ),
            Value::String(s) => SummaryReport::unstructured(s),
            _ => SummaryReport {
                structured: true,
                ..Default::default()
            },
        }
    }
}
