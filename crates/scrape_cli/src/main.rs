//! `scrape`: command-line front end for the scrape engine.

use std::path::Path;
use std::process::ExitCode;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::Parser;
use scrape_engine::{
    decode_text, dedupe, suggest_fields, visible_text, write_exports, CancellationToken,
    ExportOptions, FetchRequest, FetchSettings, Fetcher, Pipeline, PipelineEvent, ProgressSink,
    ReqwestFetcher,
};
use scrape_logging::{level_for_verbosity, scrape_debug, scrape_info, scrape_warn};

mod cli;
mod config;
mod logging;
mod table;

use cli::{Cli, Command, RunArgs};
use config::{build_plan, load_file, ScrapeFile};

const STEM_FORMAT: &str = "%Y%m%d_%H%M%S";

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    let log_file = cli.log_file.then(|| Path::new(logging::LOG_FILE));
    logging::initialize(level_for_verbosity(cli.verbose), log_file);

    let outcome = match cli.command {
        Command::Run(args) => run(args).await,
        Command::Suggest { url, timeout_ms } => suggest(&url, timeout_ms).await,
    };
    if let Err(e) = outcome {
        eprintln!("Error: {:#}", e);
        return ExitCode::from(1);
    }
    ExitCode::SUCCESS
}

/// Logs per-URL progress as `[done/total]`.
struct LogProgress {
    total: usize,
    done: AtomicUsize,
}

impl ProgressSink for LogProgress {
    fn emit(&self, event: PipelineEvent) {
        match event {
            PipelineEvent::Started { url, .. } => scrape_debug!("fetching {}", url),
            PipelineEvent::Completed { url, result, .. } => {
                let done = self.done.fetch_add(1, Ordering::Relaxed) + 1;
                match result {
                    Ok(()) => scrape_info!("[{}/{}] {}", done, self.total, url),
                    Err(kind) => scrape_info!("[{}/{}] {} ({})", done, self.total, url, kind),
                }
            }
        }
    }
}

async fn run(args: RunArgs) -> Result<()> {
    let file = match &args.config {
        Some(path) => load_file(path)?,
        None => ScrapeFile::default(),
    };
    let plan = build_plan(file, &args)?;
    let pipeline = Pipeline::with_http(plan.config.clone(), FetchSettings::default())?;

    let cancel = CancellationToken::new();
    let watcher = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            scrape_warn!("interrupt received, cancelling run");
            watcher.cancel();
        }
    });

    let progress = LogProgress {
        total: dedupe(&plan.urls).len(),
        done: AtomicUsize::new(0),
    };
    let result = pipeline
        .run_with(&plan.urls, &plan.spec, &cancel, &progress)
        .await;

    print!("{}", table::render(&result));

    if args.no_export {
        return Ok(());
    }
    let stem = args
        .stem
        .clone()
        .unwrap_or_else(|| chrono::Local::now().format(STEM_FORMAT).to_string());
    let options = ExportOptions {
        stem,
        page_files: plan.config.capture_markdown,
        ..ExportOptions::default()
    };
    let summary = write_exports(&args.out, &result, &plan.spec, &options)
        .with_context(|| format!("failed to write exports to {}", args.out.display()))?;
    for path in &summary.written {
        println!("wrote {}", path.display());
    }
    Ok(())
}

async fn suggest(url: &str, timeout_ms: u64) -> Result<()> {
    let fetcher = ReqwestFetcher::new(FetchSettings::default())?;
    let request = FetchRequest::new(url, Duration::from_millis(timeout_ms), 2);
    let page = fetcher
        .fetch(&request)
        .await
        .with_context(|| format!("failed to fetch {url}"))?;
    if !page.is_success() {
        bail!("{url} answered with status {}", page.status);
    }
    let decoded = decode_text(&page.body, &page.content_type)
        .with_context(|| format!("{url} is not readable text"))?;
    let suggestions = suggest_fields(&visible_text(&decoded.text));
    if suggestions.is_empty() {
        println!("no common fields detected");
    }
    for field in suggestions {
        println!("{field}");
    }
    Ok(())
}
