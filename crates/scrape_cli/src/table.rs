//! Plain-text rendering of a run for the terminal.

use std::fmt::Write as _;

use scrape_engine::PipelineResult;

const TRUNCATED_MARKER: &str = "…";
pub const MAX_CELL_CHARS: usize = 120;

pub fn render(result: &PipelineResult) -> String {
    let mut out = String::new();
    for record in &result.records {
        let _ = writeln!(out, "{}", record.url);
        for (name, value) in &record.fields {
            let _ = writeln!(out, "  {name}: {}", truncate(&value.to_string(), MAX_CELL_CHARS));
        }
    }
    if !result.failures.is_empty() {
        let _ = writeln!(out, "\nfailed:");
        for failure in &result.failures {
            let _ = writeln!(
                out,
                "  {} [{}] {}",
                failure.url,
                failure.kind,
                truncate(&failure.message, MAX_CELL_CHARS)
            );
        }
    }
    let _ = write!(
        out,
        "\n{} record(s), {} failure(s)",
        result.records.len(),
        result.failures.len()
    );
    if let Some(kind) = result.interruption() {
        let _ = write!(out, ", run {kind}");
    }
    out.push('\n');
    out
}

/// Shortens `text` to at most `max` characters plus a marker.
pub fn truncate(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((end, _)) => format!("{}{TRUNCATED_MARKER}", &text[..end]),
        None => text.to_string(),
    }
}
