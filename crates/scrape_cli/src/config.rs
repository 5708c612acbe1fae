//! Run configuration: an optional RON file merged with command-line flags.
//!
//! ```ron
//! (
//!     urls: ["https://example.com/products"],
//!     fields: [
//!         (name: "title", selector: "h1"),
//!         (name: "link", selector: "a.more", attribute: Some("href")),
//!     ],
//!     concurrency: Some(3),
//!     capture_markdown: Some(true),
//! )
//! ```

use std::fs;
use std::path::Path;

use anyhow::{bail, Context, Result};
use scrape_engine::{PipelineConfig, SelectorRule, SelectorSpec};
use scrape_logging::scrape_info;
use serde::{Deserialize, Serialize};

use crate::cli::RunArgs;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScrapeFile {
    pub urls: Vec<String>,
    pub fields: Vec<FieldConfig>,
    pub timeout_ms: Option<u64>,
    pub max_retries: Option<u32>,
    pub concurrency: Option<usize>,
    pub capture_markdown: Option<bool>,
    pub requests_per_second: Option<u32>,
    pub burst: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldConfig {
    pub name: String,
    pub selector: String,
    #[serde(default)]
    pub attribute: Option<String>,
}

/// Everything a run needs, after merging file and flags.
#[derive(Debug)]
pub struct RunPlan {
    pub urls: Vec<String>,
    pub spec: SelectorSpec,
    pub config: PipelineConfig,
}

pub fn load_file(path: &Path) -> Result<ScrapeFile> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("failed to read config file {}", path.display()))?;
    let file: ScrapeFile = ron::from_str(&text)
        .with_context(|| format!("failed to parse config file {}", path.display()))?;
    scrape_info!("loaded config from {}", path.display());
    Ok(file)
}

/// Merges `file` with `args`. URLs accumulate; a `--field` replaces a file
/// field of the same name; scalar flags win over file values.
pub fn build_plan(file: ScrapeFile, args: &RunArgs) -> Result<RunPlan> {
    let mut urls = file.urls;
    urls.extend(args.urls.iter().cloned());
    if urls.is_empty() {
        bail!("no urls given, pass --url or list them in a config file");
    }

    let mut fields: Vec<(String, SelectorRule)> = Vec::new();
    for field in &file.fields {
        let rule = SelectorRule::new(&field.selector, field.attribute.as_deref())
            .with_context(|| format!("field `{}` in config file", field.name))?;
        fields.push((field.name.trim().to_string(), rule));
    }
    for definition in &args.fields {
        let (name, rule) = SelectorSpec::parse_definition(definition)
            .with_context(|| format!("field definition `{definition}`"))?;
        match fields.iter_mut().find(|(existing, _)| *existing == name) {
            Some(slot) => slot.1 = rule,
            None => fields.push((name, rule)),
        }
    }
    let spec = SelectorSpec::new(fields).context("invalid field definitions")?;

    let mut config = PipelineConfig::default();
    if let Some(value) = args.timeout_ms.or(file.timeout_ms) {
        config.timeout_ms = value;
    }
    if let Some(value) = args.max_retries.or(file.max_retries) {
        config.max_retries = value;
    }
    if let Some(value) = args.concurrency.or(file.concurrency) {
        config.concurrency = value;
    }
    config.capture_markdown = args.markdown || file.capture_markdown.unwrap_or(false);
    if let Some(value) = args.rate.or(file.requests_per_second) {
        config.rate_limit.requests_per_second = value;
    }
    if let Some(value) = file.burst {
        config.rate_limit.burst = value;
    }
    config.validate()?;

    Ok(RunPlan { urls, spec, config })
}
