//! Heuristic extraction of a [`DecisionRecord`] from free-form analysis text.
//!
//! The reasoning engine is asked to answer with labelled sections, but nothing
//! guarantees it does. Every extraction here degrades to a default instead of
//! failing; callers always get a fully populated record.

use std::sync::LazyLock;

use regex::Regex;

use crate::decision::{Confidence, DecisionRecord, SEE_ANALYSIS};

/// A labelled section the interpreter looks for.
///
/// Labels are searched in `ALL` order. A label that is a substring of another
/// would match at the first occurrence of the shorter text, so new labels must
/// be placed with that in mind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SectionLabel {
    RootCause,
    Remediation,
}

impl SectionLabel {
    pub const ALL: [SectionLabel; 2] = [SectionLabel::RootCause, SectionLabel::Remediation];

    /// Lowercase ASCII search text.
    pub fn needle(&self) -> &'static str {
        match self {
            SectionLabel::RootCause => "root cause",
            SectionLabel::Remediation => "remediation",
        }
    }
}

/// Markers that end a section, searched after the label.
pub const SECTION_BOUNDARIES: [&str; 3] = ["\n## ", "\n# ", "\n\n## "];

/// Phrases that turn the verdict into "do not promote".
pub const NEGATIVE_SIGNALS: [&str; 3] = ["do not promote", "abort", "rollback"];

static FIX_LINK_PATTERNS: LazyLock<[Regex; 2]> = LazyLock::new(|| {
    [
        Regex::new(r"github\.com/.+/pull/\d+").expect("valid pull request url regex"),
        Regex::new(r"PR: https?://[^\s]+").expect("valid labelled pr regex"),
    ]
});

static EXPLICIT_CONFIDENCE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\bconfidence(?:\s+level)?\s*[:=]\s*(\d{1,3})\s*%?")
        .expect("valid confidence regex")
});

#[derive(Debug, Clone, Copy, Default)]
pub struct ResponseInterpreter {
    explicit_confidence: bool,
}

impl ResponseInterpreter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Let a stated `confidence: NN` override the verdict-derived value.
    pub fn with_explicit_confidence(mut self, enabled: bool) -> Self {
        self.explicit_confidence = enabled;
        self
    }

    pub fn interpret(&self, raw: &str) -> DecisionRecord {
        // ASCII folding keeps byte offsets identical between `raw` and `folded`.
        let folded = raw.to_ascii_lowercase();

        let root_cause = extract_section(raw, &folded, SectionLabel::RootCause)
            .unwrap_or_else(|| SEE_ANALYSIS.to_string());
        let remediation = extract_section(raw, &folded, SectionLabel::Remediation)
            .unwrap_or_else(|| SEE_ANALYSIS.to_string());

        let promote = promotion_verdict(&folded);
        let confidence = self
            .explicit_confidence
            .then(|| explicit_confidence(raw))
            .flatten()
            .unwrap_or_else(|| Confidence::for_verdict(promote));

        DecisionRecord {
            analysis: raw.to_string(),
            root_cause,
            remediation,
            fix_link: extract_fix_link(raw),
            promote,
            confidence,
        }
    }
}

/// Interpret with the default settings.
pub fn interpret(raw: &str) -> DecisionRecord {
    ResponseInterpreter::default().interpret(raw)
}

/// Span from the label's start to the nearest boundary marker (or end of
/// text), trimmed. `folded` must be `text.to_ascii_lowercase()`.
fn extract_section(text: &str, folded: &str, label: SectionLabel) -> Option<String> {
    let needle = label.needle();
    let start = folded.find(needle)?;
    let search_from = start + needle.len();

    let end = SECTION_BOUNDARIES
        .iter()
        .filter_map(|marker| text[search_from..].find(marker).map(|pos| search_from + pos))
        .min()
        .unwrap_or(text.len());

    let span = text[start..end].trim();
    if span.is_empty() {
        None
    } else {
        Some(span.to_string())
    }
}

/// Promote unless an explicit negative phrase appears.
fn promotion_verdict(folded: &str) -> bool {
    !NEGATIVE_SIGNALS.iter().any(|phrase| folded.contains(phrase))
}

fn explicit_confidence(text: &str) -> Option<Confidence> {
    EXPLICIT_CONFIDENCE_RE
        .captures_iter(text)
        .filter_map(|caps| caps.get(1)?.as_str().parse::<u32>().ok())
        .find_map(Confidence::new)
}

/// Full text of the first pattern (in pattern order) that matches.
pub fn extract_fix_link(text: &str) -> Option<String> {
    FIX_LINK_PATTERNS
        .iter()
        .find_map(|re| re.find(text))
        .map(|m| m.as_str().to_string())
}
