//! Heuristic field suggestions for a page that has not been configured yet.

use std::sync::LazyLock;

use regex::Regex;

const PATTERNS: &[(&str, &str)] = &[
    ("Name", r"\b[A-Z][a-z]+ (?:[A-Z][a-z]+ )?[A-Z][a-z]+\b"),
    (
        "Product",
        r"\b[A-Z][a-z]+(?: [A-Z][a-z]+)* (?:Model|Version|Edition|Series)\b|\b[A-Z0-9]+-[A-Z0-9]+\b",
    ),
    ("Price", r"\$\d+(?:\.\d{2})?|\d+(?:\.\d{2})? USD"),
    ("Email", r"\b[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}\b"),
    (
        "Phone",
        r"\b(?:\+\d{1,2}\s?)?(?:\(\d{3}\)|\d{3})[-.\s]?\d{3}[-.\s]?\d{4}\b",
    ),
    (
        "Address",
        r"\d+\s+(?:North|South|East|West|NW|SW|NE|SE)?\s*[\w\s]+(?:Street|St|Avenue|Ave|Road|Rd|Boulevard|Blvd|Drive|Dr|Lane|Ln|Way|Court|Ct|Plaza|Pl|Terrace|Ter|Circle|Cir)\.?(?:,\s*[A-Z][a-z]+(?:,\s*[A-Z]{2})?)?\s*\d{5}(?:-\d{4})?",
    ),
];

static COMPILED: LazyLock<Vec<(&'static str, Regex)>> = LazyLock::new(|| {
    PATTERNS
        .iter()
        .filter_map(|(field, pattern)| Regex::new(pattern).ok().map(|re| (*field, re)))
        .collect()
});

/// Names of the common fields whose pattern occurs somewhere in `text`,
/// in a fixed order.
pub fn suggest_fields(text: &str) -> Vec<&'static str> {
    COMPILED
        .iter()
        .filter(|(_, re)| re.is_match(text))
        .map(|(field, _)| *field)
        .collect()
}
