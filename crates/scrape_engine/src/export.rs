//! File exports of a [`PipelineResult`]: JSON, CSV, markdown.

use std::path::{Path, PathBuf};

use scrape_logging::scrape_info;
use serde_json::{json, Map, Value};

use crate::filename::page_filename;
use crate::persist::{ExportDir, PersistError};
use crate::selector::SelectorSpec;
use crate::types::{FieldValue, PipelineResult};

const DOC_START: &str = "===== DOC START =====";
const DOC_END: &str = "===== DOC END =====";

#[derive(Debug, Clone)]
pub struct ExportOptions {
    /// Prefix shared by every file of one export, e.g. a run timestamp.
    pub stem: String,
    pub json: bool,
    pub csv: bool,
    /// Concatenated markdown of records that captured it.
    pub markdown: bool,
    /// Additionally write one markdown file per page under `pages/`.
    pub page_files: bool,
    /// Joins multiple matches into one CSV cell.
    pub multi_value_separator: String,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self {
            stem: "scrape".to_string(),
            json: true,
            csv: true,
            markdown: true,
            page_files: false,
            multi_value_separator: "; ".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExportSummary {
    pub written: Vec<PathBuf>,
}

#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("persist error: {0}")]
    Persist(#[from] PersistError),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

pub fn to_json(result: &PipelineResult, spec: &SelectorSpec) -> Value {
    let records: Vec<Value> = result
        .records
        .iter()
        .map(|record| {
            let fields: Map<String, Value> = record
                .fields
                .iter()
                .map(|(name, value)| (name.clone(), field_json(value)))
                .collect();
            json!({ "url": record.url, "fields": fields })
        })
        .collect();
    let failures: Vec<Value> = result
        .failures
        .iter()
        .map(|failure| {
            json!({
                "url": failure.url,
                "reason": failure.kind.to_string(),
                "message": failure.message,
            })
        })
        .collect();
    json!({
        "fields": spec.field_names(),
        "cancelled": result.cancelled,
        "records": records,
        "failures": failures,
    })
}

fn field_json(value: &FieldValue) -> Value {
    match value {
        FieldValue::Single(text) => Value::String(text.clone()),
        FieldValue::Multiple(values) => json!(values),
    }
}

/// One row per record: `url` followed by the selector spec's fields in order.
pub fn records_csv(result: &PipelineResult, spec: &SelectorSpec, separator: &str) -> String {
    let mut out = String::new();
    let mut header = vec!["url".to_string()];
    header.extend(spec.field_names().into_iter().map(str::to_string));
    push_row(&mut out, &header);
    for record in &result.records {
        let mut row = vec![record.url.clone()];
        for name in spec.field_names() {
            row.push(
                record
                    .get(name)
                    .map(|value| value.joined(separator))
                    .unwrap_or_default(),
            );
        }
        push_row(&mut out, &row);
    }
    out
}

pub fn failures_csv(result: &PipelineResult) -> String {
    let mut out = String::new();
    push_row(&mut out, &["url".to_string(), "reason".to_string(), "message".to_string()]);
    for failure in &result.failures {
        push_row(
            &mut out,
            &[
                failure.url.clone(),
                failure.kind.to_string(),
                failure.message.clone(),
            ],
        );
    }
    out
}

/// Concatenates captured page markdown between delimiters, input order.
pub fn markdown_bundle(result: &PipelineResult) -> String {
    let mut buffer = String::new();
    for record in &result.records {
        let Some(markdown) = record.markdown.as_deref() else {
            continue;
        };
        buffer.push_str(DOC_START);
        buffer.push('\n');
        buffer.push_str(&format!("url: {}\n\n", record.url));
        buffer.push_str(markdown.trim_end());
        buffer.push('\n');
        buffer.push_str(DOC_END);
        buffer.push_str("\n\n");
    }
    buffer
}

/// Writes the enabled exports into `dir` as `{stem}_data.json`,
/// `{stem}_data.csv`, `{stem}_failures.csv`, `{stem}_data.md` and
/// `pages/*.md`.
pub fn write_exports(
    dir: &Path,
    result: &PipelineResult,
    spec: &SelectorSpec,
    options: &ExportOptions,
) -> Result<ExportSummary, ExportError> {
    let out = ExportDir::open(dir)?;
    let stem = &options.stem;
    let mut summary = ExportSummary::default();

    if options.json {
        let text = serde_json::to_string_pretty(&to_json(result, spec))?;
        summary
            .written
            .push(out.write(&format!("{stem}_data.json"), text.as_bytes())?);
    }
    if options.csv {
        let rows = records_csv(result, spec, &options.multi_value_separator);
        summary
            .written
            .push(out.write(&format!("{stem}_data.csv"), rows.as_bytes())?);
        if !result.failures.is_empty() {
            summary.written.push(out.write(
                &format!("{stem}_failures.csv"),
                failures_csv(result).as_bytes(),
            )?);
        }
    }
    let has_markdown = result.records.iter().any(|r| r.markdown.is_some());
    if options.markdown && has_markdown {
        summary.written.push(out.write(
            &format!("{stem}_data.md"),
            markdown_bundle(result).as_bytes(),
        )?);
    }
    if options.page_files && has_markdown {
        let pages = ExportDir::open(out.path().join("pages"))?;
        for record in &result.records {
            if let Some(markdown) = record.markdown.as_deref() {
                let doc = format!("---\nurl: {}\n---\n\n{}", record.url, markdown);
                summary
                    .written
                    .push(pages.write(&page_filename(&record.url), doc.as_bytes())?);
            }
        }
    }

    scrape_info!(
        "exported {} file(s) to {}",
        summary.written.len(),
        out.path().display()
    );
    Ok(summary)
}

fn push_row(out: &mut String, row: &[String]) {
    let cells: Vec<String> = row.iter().map(|cell| quote_cell(cell)).collect();
    out.push_str(&cells.join(","));
    out.push_str("\r\n");
}

fn quote_cell(cell: &str) -> String {
    if cell.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", cell.replace('"', "\"\""))
    } else {
        cell.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cells_with_separators_or_quotes_are_quoted() {
        assert_eq!(quote_cell("plain"), "plain");
        assert_eq!(quote_cell("a,b"), "\"a,b\"");
        assert_eq!(quote_cell("say \"hi\""), "\"say \"\"hi\"\"\"");
        assert_eq!(quote_cell("two\nlines"), "\"two\nlines\"");
    }
}
