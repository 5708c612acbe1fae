use std::path::PathBuf;

use clap::{ArgAction, Args, Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "scrape")]
#[command(about = "Fetch web pages politely and extract fields with CSS selectors")]
#[command(version)]
pub struct Cli {
    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Also write the log to ./scrape.log
    #[arg(long, global = true)]
    pub log_file: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Fetch URLs and extract fields
    Run(RunArgs),

    /// Fetch one page and list the kinds of data it appears to contain
    Suggest {
        /// Page to inspect
        url: String,

        /// Per-attempt timeout in milliseconds
        #[arg(long, default_value_t = 10_000)]
        timeout_ms: u64,
    },
}

#[derive(Args, Debug, Default, Clone)]
pub struct RunArgs {
    /// RON file with urls, fields and options
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// URL to scrape (repeatable)
    #[arg(short, long = "url")]
    pub urls: Vec<String>,

    /// Field definition `name=css` or `name=css@attribute` (repeatable)
    #[arg(short, long = "field")]
    pub fields: Vec<String>,

    #[arg(long)]
    pub timeout_ms: Option<u64>,

    #[arg(long)]
    pub max_retries: Option<u32>,

    #[arg(long)]
    pub concurrency: Option<usize>,

    /// Requests per second per host; 0 disables throttling
    #[arg(long)]
    pub rate: Option<u32>,

    /// Capture cleaned page markdown and write per-page files
    #[arg(long)]
    pub markdown: bool,

    /// Directory for exported files
    #[arg(short, long, default_value = "output")]
    pub out: PathBuf,

    /// File name prefix for exports; defaults to a timestamp
    #[arg(long)]
    pub stem: Option<String>,

    /// Print results without writing files
    #[arg(long)]
    pub no_export: bool,
}
