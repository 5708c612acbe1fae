use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use futures_util::stream::{self, StreamExt};
use scrape_logging::{scrape_debug, scrape_info, scrape_warn};
use tokio_util::sync::CancellationToken;

use crate::convert::{Converter, Html2MdConverter};
use crate::decode::{decode_text, DecodeError};
use crate::extract::extract_document;
use crate::fetch::{FetchSettings, Fetcher, ReqwestFetcher};
use crate::rate_limit::HostRateLimiter;
use crate::selector::{SelectorSpec, SpecError};
use crate::types::{
    ErrorKind, FetchError, FetchRequest, FetchedPage, PipelineEvent, PipelineResult, Record,
    UrlFailure,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitSettings {
    /// Sustained requests per second per host; zero disables throttling.
    pub requests_per_second: u32,
    pub burst: u32,
}

impl Default for RateLimitSettings {
    fn default() -> Self {
        Self {
            requests_per_second: 2,
            burst: 2,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineConfig {
    pub timeout_ms: u64,
    pub max_retries: u32,
    pub concurrency: usize,
    /// Also render each page as cleaned markdown.
    pub capture_markdown: bool,
    /// Make `href`/`src`-style attribute values absolute.
    pub resolve_urls: bool,
    pub rate_limit: RateLimitSettings,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 10_000,
            max_retries: 2,
            concurrency: 5,
            capture_markdown: false,
            resolve_urls: true,
            rate_limit: RateLimitSettings::default(),
        }
    }
}

impl PipelineConfig {
    pub fn validate(&self) -> Result<(), PipelineError> {
        if self.concurrency == 0 {
            return Err(PipelineError::InvalidConfig(
                "concurrency must be at least 1".into(),
            ));
        }
        if self.timeout_ms == 0 {
            return Err(PipelineError::InvalidConfig(
                "timeout_ms must be greater than zero".into(),
            ));
        }
        Ok(())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("invalid selector spec: {0}")]
    InvalidSpec(#[from] SpecError),
    #[error("failed to set up the http client: {0}")]
    Client(FetchError),
}

impl PipelineError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            PipelineError::InvalidConfig(_) | PipelineError::InvalidSpec(_) => {
                ErrorKind::InvalidInput
            }
            PipelineError::Client(err) => err.kind,
        }
    }
}

pub trait ProgressSink: Send + Sync {
    fn emit(&self, event: PipelineEvent);
}

/// Discards all events.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopSink;

impl ProgressSink for NoopSink {
    fn emit(&self, _event: PipelineEvent) {}
}

pub struct ChannelProgressSink {
    tx: std::sync::mpsc::Sender<PipelineEvent>,
}

impl ChannelProgressSink {
    pub fn new(tx: std::sync::mpsc::Sender<PipelineEvent>) -> Self {
        Self { tx }
    }
}

impl ProgressSink for ChannelProgressSink {
    fn emit(&self, event: PipelineEvent) {
        let _ = self.tx.send(event);
    }
}

/// Runs fetch + extract over many URLs with bounded concurrency.
pub struct Pipeline {
    config: PipelineConfig,
    fetcher: Arc<dyn Fetcher>,
    converter: Html2MdConverter,
}

impl Pipeline {
    pub fn new(config: PipelineConfig, fetcher: Arc<dyn Fetcher>) -> Result<Self, PipelineError> {
        config.validate()?;
        Ok(Self {
            config,
            fetcher,
            converter: Html2MdConverter,
        })
    }

    /// Builds a pipeline around a [`ReqwestFetcher`] throttled by the
    /// process-wide limiter for `config.rate_limit`, so consecutive and
    /// concurrent pipelines share per-host budgets.
    pub fn with_http(
        config: PipelineConfig,
        settings: FetchSettings,
    ) -> Result<Self, PipelineError> {
        config.validate()?;
        let mut fetcher = ReqwestFetcher::new(settings).map_err(PipelineError::Client)?;
        if let Some(limiter) = HostRateLimiter::shared(
            config.rate_limit.requests_per_second,
            config.rate_limit.burst,
        ) {
            fetcher = fetcher.with_rate_limiter(limiter);
        }
        Self::new(config, Arc::new(fetcher))
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub async fn run(&self, urls: &[String], spec: &SelectorSpec) -> PipelineResult {
        self.run_with(urls, spec, &CancellationToken::new(), &NoopSink)
            .await
    }

    /// Processes every distinct URL once and reassembles results in input
    /// order.
    ///
    /// When `cancel` fires, in-flight work is dropped and only URLs that had
    /// already completed are reported.
    pub async fn run_with(
        &self,
        urls: &[String],
        spec: &SelectorSpec,
        cancel: &CancellationToken,
        sink: &dyn ProgressSink,
    ) -> PipelineResult {
        let distinct = dedupe(urls);
        if distinct.len() < urls.len() {
            scrape_debug!(
                "skipped {} duplicate url(s)",
                urls.len() - distinct.len()
            );
        }
        scrape_info!(
            "pipeline start: {} url(s), {} field(s), concurrency {}",
            distinct.len(),
            spec.len(),
            self.config.concurrency
        );

        let mut slots: Vec<Option<Result<Record, UrlFailure>>> =
            distinct.iter().map(|_| None).collect();

        let mut in_flight = stream::iter(distinct.iter().enumerate())
            .map(|(index, url)| async move {
                sink.emit(PipelineEvent::Started {
                    index,
                    url: url.to_string(),
                });
                (index, self.process(url, spec).await)
            })
            .buffer_unordered(self.config.concurrency);

        let mut cancelled = false;
        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    cancelled = true;
                    break;
                }
                next = in_flight.next() => match next {
                    Some((index, outcome)) => {
                        sink.emit(PipelineEvent::Completed {
                            index,
                            url: distinct[index].to_string(),
                            result: outcome.as_ref().map(|_| ()).map_err(|f| f.kind),
                        });
                        slots[index] = Some(outcome);
                    }
                    None => break,
                }
            }
        }
        drop(in_flight);

        let mut result = PipelineResult {
            cancelled,
            ..PipelineResult::default()
        };
        for outcome in slots.into_iter().flatten() {
            match outcome {
                Ok(record) => result.records.push(record),
                Err(failure) => result.failures.push(failure),
            }
        }

        if cancelled {
            scrape_warn!(
                "pipeline cancelled with {}/{} url(s) completed",
                result.accounted(),
                distinct.len()
            );
        } else {
            scrape_info!(
                "pipeline done: {} record(s), {} failure(s)",
                result.records.len(),
                result.failures.len()
            );
        }
        result
    }

    async fn process(&self, url: &str, spec: &SelectorSpec) -> Result<Record, UrlFailure> {
        let request = FetchRequest::new(url, self.config.timeout(), self.config.max_retries);
        let page = self
            .fetcher
            .fetch(&request)
            .await
            .map_err(|err| failure(url, err.kind, err.message))?;

        if !page.is_success() {
            return Err(failure(
                url,
                ErrorKind::HttpError(page.status),
                format!("server answered {}", page.status),
            ));
        }

        self.extract_page(url, &page, spec)
            .map_err(|err| failure(url, ErrorKind::ParseError, err.to_string()))
    }

    fn extract_page(
        &self,
        url: &str,
        page: &FetchedPage,
        spec: &SelectorSpec,
    ) -> Result<Record, DecodeError> {
        let decoded = decode_text(&page.body, &page.content_type)?;
        if decoded.lossy {
            scrape_debug!(
                "{} decoded lossily as {}",
                url,
                decoded.encoding_label
            );
        }
        let base = self.config.resolve_urls.then_some(page.final_url.as_str());
        let fields = extract_document(&decoded.text, base, spec);
        let markdown = self
            .config
            .capture_markdown
            .then(|| self.converter.to_markdown(&decoded.text));
        Ok(Record {
            url: url.to_string(),
            fields,
            markdown,
        })
    }
}

/// Builds a throttled HTTP pipeline from `config` and runs it once.
pub async fn run(
    urls: &[String],
    spec: &SelectorSpec,
    config: PipelineConfig,
) -> Result<PipelineResult, PipelineError> {
    let pipeline = Pipeline::with_http(config, FetchSettings::default())?;
    Ok(pipeline.run(urls, spec).await)
}

/// Exact, case-sensitive deduplication keeping first occurrences.
pub fn dedupe(urls: &[String]) -> Vec<&str> {
    let mut seen = HashSet::new();
    urls.iter()
        .map(String::as_str)
        .filter(|url| seen.insert(*url))
        .collect()
}

fn failure(url: &str, kind: ErrorKind, message: impl Into<String>) -> UrlFailure {
    let message = message.into();
    scrape_warn!("{} failed: {} ({})", url, kind, message);
    UrlFailure {
        url: url.to_string(),
        kind,
        message,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dedupe_is_exact_and_keeps_first_occurrence() {
        let urls: Vec<String> = ["https://x", "https://X", "https://x", "https://y"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        assert_eq!(dedupe(&urls), vec!["https://x", "https://X", "https://y"]);
    }

    #[test]
    fn zero_concurrency_and_timeout_are_invalid_input() {
        let config = PipelineConfig {
            concurrency: 0,
            ..PipelineConfig::default()
        };
        assert_eq!(config.validate().unwrap_err().kind(), ErrorKind::InvalidInput);

        let config = PipelineConfig {
            timeout_ms: 0,
            ..PipelineConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(PipelineError::InvalidConfig(_))
        ));
    }

    #[test]
    fn defaults_match_documented_values() {
        let config = PipelineConfig::default();
        assert_eq!(config.timeout_ms, 10_000);
        assert_eq!(config.max_retries, 2);
        assert_eq!(config.concurrency, 5);
    }
}
