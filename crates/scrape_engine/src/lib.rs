//! Scrape engine: polite fetching, selector-based extraction and the
//! bounded-concurrency pipeline that ties them together.
mod convert;
mod decode;
mod export;
mod extract;
mod fetch;
mod filename;
mod persist;
mod pipeline;
mod rate_limit;
mod retry;
mod selector;
mod suggest;
mod types;

pub use convert::{strip_boilerplate, visible_text, Converter, Html2MdConverter};
pub use decode::{decode_text, DecodeError, DecodedText};
pub use export::{
    failures_csv, markdown_bundle, records_csv, to_json, write_exports, ExportError,
    ExportOptions, ExportSummary,
};
pub use extract::{extract, extract_document};
pub use fetch::{validate_url, FetchSettings, Fetcher, ReqwestFetcher, DEFAULT_USER_AGENT};
pub use filename::page_filename;
pub use persist::{ExportDir, PersistError};
pub use pipeline::{
    dedupe, run, ChannelProgressSink, NoopSink, Pipeline, PipelineConfig, PipelineError,
    ProgressSink, RateLimitSettings,
};
pub use rate_limit::HostRateLimiter;
pub use retry::{is_throttling_status, parse_retry_after, Backoff};
pub use selector::{SelectorRule, SelectorSpec, SpecError};
pub use suggest::suggest_fields;
pub use types::{
    ErrorKind, FetchError, FetchRequest, FetchResult, FetchedPage, FieldValue, PipelineEvent,
    PipelineResult, Record, UrlFailure, UrlIndex,
};

/// Re-exported so callers can cancel [`Pipeline::run_with`] without a direct
/// `tokio-util` dependency.
pub use tokio_util::sync::CancellationToken;
