//! Recovery of structured JSON from free-form LLM output.
//!
//! Models are told to answer with bare JSON between sentinel markers, but in
//! practice they wrap it in markdown fences, surround it with prose, or skip
//! the markers entirely. Recovery runs an ordered list of strategies, from
//! "trust the model" down to best-effort text mining, and stops at the first
//! one that yields valid JSON.

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;
use tracing::debug;

#[allow(clippy::expect_used)] // Static regex that is guaranteed to be valid
static SENTINEL_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<JSON>\s*(.*?)\s*</JSON>").expect("valid regex"));

#[allow(clippy::expect_used)] // Static regex that is guaranteed to be valid
static JSON_FENCE_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)```json\s*(.*?)\s*```").expect("valid regex"));

#[allow(clippy::expect_used)] // Static regex that is guaranteed to be valid
static ANY_FENCE_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)```\s*(.*?)\s*```").expect("valid regex"));

/// Object with at most one level of nested objects.
#[allow(clippy::expect_used)] // Static regex that is guaranteed to be valid
static LOOSE_OBJECT_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)\{[^{}]*(?:\{[^{}]*\}[^{}]*)*\}").expect("valid regex")
});

/// Array with at most one level of nested arrays.
#[allow(clippy::expect_used)] // Static regex that is guaranteed to be valid
static LOOSE_ARRAY_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)\[[^\[\]]*(?:\[[^\[\]]*\][^\[\]]*)*\]").expect("valid regex")
});

/// One way of locating JSON inside model output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    /// The whole (trimmed) text is JSON.
    Direct,
    /// First `<JSON> ... </JSON>` pair.
    Sentinel,
    /// First fenced block tagged `json`.
    JsonFence,
    /// First fenced block with any tag, minus a leading `json` label.
    AnyFence,
    /// Balanced span starting at the first `{` or `[`.
    Balanced,
    /// One-level-nested regex match. Deeply nested JSON is left to
    /// [`Strategy::Balanced`].
    LooseRegex,
}

impl Strategy {
    /// All strategies in the order they are tried.
    pub const ALL: [Strategy; 6] = [
        Strategy::Direct,
        Strategy::Sentinel,
        Strategy::JsonFence,
        Strategy::AnyFence,
        Strategy::Balanced,
        Strategy::LooseRegex,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Strategy::Direct => "direct",
            Strategy::Sentinel => "sentinel",
            Strategy::JsonFence => "json_fence",
            Strategy::AnyFence => "any_fence",
            Strategy::Balanced => "balanced",
            Strategy::LooseRegex => "loose_regex",
        }
    }

    /// Run this strategy alone. Never fails; `None` means "no JSON here".
    pub fn apply(self, raw: &str) -> Option<Value> {
        match self {
            Strategy::Direct => parse(raw.trim()),
            Strategy::Sentinel => capture(&SENTINEL_PATTERN, raw).and_then(parse),
            Strategy::JsonFence => capture(&JSON_FENCE_PATTERN, raw).and_then(parse),
            Strategy::AnyFence => capture(&ANY_FENCE_PATTERN, raw).and_then(|inner| {
                let inner = inner.trim();
                parse(inner.strip_prefix("json").unwrap_or(inner))
            }),
            Strategy::Balanced => balanced_span(raw).and_then(parse),
            Strategy::LooseRegex => first_match(&LOOSE_OBJECT_PATTERN, raw)
                .and_then(parse)
                .or_else(|| first_match(&LOOSE_ARRAY_PATTERN, raw).and_then(parse)),
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of running the extractor over one piece of model output.
#[derive(Debug, Clone, PartialEq)]
pub enum ParseOutcome {
    Parsed { value: Value, strategy: Strategy },
    Unparsed,
}

impl ParseOutcome {
    pub fn is_parsed(&self) -> bool {
        matches!(self, ParseOutcome::Parsed { .. })
    }

    pub fn value(&self) -> Option<&Value> {
        match self {
            ParseOutcome::Parsed { value, .. } => Some(value),
            ParseOutcome::Unparsed => None,
        }
    }

    pub fn into_value(self) -> Option<Value> {
        match self {
            ParseOutcome::Parsed { value, .. } => Some(value),
            ParseOutcome::Unparsed => None,
        }
    }
}

/// Deepest nesting the JSON parser accepts.
pub const MAX_NESTING_DEPTH: usize = 127;

/// Recover a JSON value from raw model output.
///
/// Output nested deeper than [`MAX_NESTING_DEPTH`] is `Unparsed`: no strategy
/// can parse it whole, and the loose regex would only return a fragment.
pub fn extract(raw: &str) -> ParseOutcome {
    let depth = nesting_depth(raw);
    if depth > MAX_NESTING_DEPTH {
        debug!(depth, "LLM output nested too deeply to parse");
        return ParseOutcome::Unparsed;
    }

    for strategy in Strategy::ALL {
        if let Some(value) = strategy.apply(raw) {
            debug!(strategy = %strategy, "recovered JSON from LLM output");
            return ParseOutcome::Parsed { value, strategy };
        }
    }

    debug!(len = raw.len(), "no extraction strategy produced JSON");
    ParseOutcome::Unparsed
}

fn parse(candidate: &str) -> Option<Value> {
    serde_json::from_str(candidate).ok()
}

fn capture<'t>(pattern: &Regex, text: &'t str) -> Option<&'t str> {
    pattern
        .captures(text)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim())
}

fn first_match<'t>(pattern: &Regex, text: &'t str) -> Option<&'t str> {
    pattern.find(text).map(|m| m.as_str())
}

/// Maximum `{`/`[` nesting outside string literals.
fn nesting_depth(text: &str) -> usize {
    let mut depth = 0usize;
    let mut max_depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for c in text.chars() {
        if in_string {
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '{' | '[' => {
                depth += 1;
                max_depth = max_depth.max(depth);
            }
            '}' | ']' => depth = depth.saturating_sub(1),
            _ => {}
        }
    }
    max_depth
}

/// Span from the first `{` or `[` to its balancing delimiter.
///
/// Only the opening delimiter's own type is counted; braces and brackets are
/// not cross-matched, and string contents are not special-cased.
fn balanced_span(text: &str) -> Option<&str> {
    let (start, open) = text.char_indices().find(|(_, c)| *c == '{' || *c == '[')?;
    let close = if open == '{' { '}' } else { ']' };

    let mut depth = 0usize;
    for (idx, c) in text[start..].char_indices() {
        if c == open {
            depth += 1;
        } else if c == close {
            depth = depth.saturating_sub(1);
            if depth == 0 {
                return Some(&text[start..start + idx + c.len_utf8()]);
            }
        }
    }
    None
}
