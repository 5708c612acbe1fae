use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use futures_util::StreamExt;
use reqwest::header::{CONTENT_TYPE, RETRY_AFTER};
use reqwest::Url;
use scrape_logging::{scrape_debug, scrape_warn};

use crate::rate_limit::HostRateLimiter;
use crate::retry::{is_throttling_status, parse_retry_after, Backoff};
use crate::types::{ErrorKind, FetchError, FetchRequest, FetchResult, FetchedPage};

pub const DEFAULT_USER_AGENT: &str = concat!("scrape/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Clone)]
pub struct FetchSettings {
    pub connect_timeout: Duration,
    pub redirect_limit: usize,
    pub max_bytes: u64,
    pub user_agent: String,
    pub backoff: Backoff,
}

impl Default for FetchSettings {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            redirect_limit: 5,
            max_bytes: 5 * 1024 * 1024,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            backoff: Backoff::default(),
        }
    }
}

#[async_trait::async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, request: &FetchRequest) -> FetchResult;
}

/// HTTP fetcher with per-host throttling and transport-level retries.
#[derive(Debug, Clone)]
pub struct ReqwestFetcher {
    client: reqwest::Client,
    settings: FetchSettings,
    limiter: Option<Arc<HostRateLimiter>>,
}

impl ReqwestFetcher {
    pub fn new(settings: FetchSettings) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .connect_timeout(settings.connect_timeout)
            .redirect(reqwest::redirect::Policy::limited(settings.redirect_limit))
            .user_agent(settings.user_agent.clone())
            .build()
            .map_err(|err| FetchError::new(ErrorKind::NetworkError, err.to_string()))?;
        Ok(Self {
            client,
            settings,
            limiter: None,
        })
    }

    /// Shares `limiter` with every other fetcher holding the same `Arc`.
    pub fn with_rate_limiter(mut self, limiter: Arc<HostRateLimiter>) -> Self {
        self.limiter = Some(limiter);
        self
    }

    async fn attempt(&self, url: &Url, timeout: Duration) -> Result<Attempt, AttemptError> {
        let response = self
            .client
            .get(url.clone())
            .timeout(timeout)
            .send()
            .await
            .map_err(classify_reqwest_error)?;

        let status = response.status().as_u16();
        if let Some(content_len) = response.content_length() {
            if content_len > self.settings.max_bytes {
                return Err(self.too_large(content_len));
            }
        }

        let final_url = response.url().to_string();
        let content_type = header_value(&response, CONTENT_TYPE).unwrap_or_default();
        let retry_after = header_value(&response, RETRY_AFTER)
            .and_then(|value| parse_retry_after(&value, Utc::now()));

        let mut body = Vec::new();
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(classify_reqwest_error)?;
            let next_len = body.len() as u64 + chunk.len() as u64;
            if next_len > self.settings.max_bytes {
                return Err(self.too_large(next_len));
            }
            body.extend_from_slice(&chunk);
        }

        Ok(Attempt {
            page: FetchedPage {
                status,
                body,
                content_type,
                final_url,
            },
            retry_after,
        })
    }

    fn too_large(&self, actual: u64) -> AttemptError {
        AttemptError::Fatal(FetchError::new(
            ErrorKind::NetworkError,
            format!(
                "response too large (max {}, actual {actual})",
                self.settings.max_bytes
            ),
        ))
    }
}

#[async_trait::async_trait]
impl Fetcher for ReqwestFetcher {
    async fn fetch(&self, request: &FetchRequest) -> FetchResult {
        let url = validate_url(request.url())?;
        if request.timeout().is_zero() {
            return Err(FetchError::new(
                ErrorKind::InvalidInput,
                "timeout must be greater than zero",
            ));
        }
        let host = url.host_str().unwrap_or_default().to_string();
        let backoff = self.settings.backoff;
        let max_retries = request.max_retries();

        let mut attempt: u32 = 0;
        loop {
            if let Some(limiter) = &self.limiter {
                limiter.acquire(&host).await;
            }
            scrape_debug!("GET {} attempt={}", url, attempt + 1);

            match self.attempt(&url, request.timeout()).await {
                Ok(Attempt { page, retry_after })
                    if is_throttling_status(page.status) && attempt < max_retries =>
                {
                    let delay = backoff.throttled_delay(attempt, retry_after);
                    scrape_warn!(
                        "{} answered {}, retrying in {:?} ({}/{})",
                        url,
                        page.status,
                        delay,
                        attempt + 1,
                        max_retries
                    );
                    tokio::time::sleep(delay).await;
                }
                Ok(Attempt { page, .. }) => return Ok(page),
                Err(AttemptError::Transport(message)) if attempt < max_retries => {
                    let delay = backoff.delay(attempt);
                    scrape_warn!(
                        "{} failed: {}, retrying in {:?} ({}/{})",
                        url,
                        message,
                        delay,
                        attempt + 1,
                        max_retries
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(AttemptError::Transport(message)) => {
                    return Err(FetchError::new(
                        ErrorKind::NetworkError,
                        format!("{message} (gave up after {} attempts)", attempt + 1),
                    ));
                }
                Err(AttemptError::Fatal(err)) => return Err(err),
            }
            attempt += 1;
        }
    }
}

struct Attempt {
    page: FetchedPage,
    retry_after: Option<Duration>,
}

enum AttemptError {
    /// Worth retrying: connect, DNS, timeout, interrupted body.
    Transport(String),
    Fatal(FetchError),
}

/// Accepts absolute `http`/`https` URLs with a host.
pub fn validate_url(raw: &str) -> Result<Url, FetchError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(FetchError::new(ErrorKind::InvalidInput, "empty url"));
    }
    let url = Url::parse(trimmed)
        .map_err(|err| FetchError::new(ErrorKind::InvalidInput, format!("{err}: {trimmed}")))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(FetchError::new(
            ErrorKind::InvalidInput,
            format!("unsupported scheme `{}`", url.scheme()),
        ));
    }
    if url.host_str().map_or(true, str::is_empty) {
        return Err(FetchError::new(ErrorKind::InvalidInput, "url has no host"));
    }
    Ok(url)
}

fn header_value(response: &reqwest::Response, name: reqwest::header::HeaderName) -> Option<String> {
    response
        .headers()
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(|value| value.to_string())
}

fn classify_reqwest_error(err: reqwest::Error) -> AttemptError {
    if err.is_redirect() {
        return AttemptError::Fatal(FetchError::new(
            ErrorKind::NetworkError,
            format!("redirect limit exceeded: {err}"),
        ));
    }
    if err.is_builder() {
        return AttemptError::Fatal(FetchError::new(ErrorKind::InvalidInput, err.to_string()));
    }
    if err.is_timeout() {
        return AttemptError::Transport(format!("timeout: {err}"));
    }
    AttemptError::Transport(err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_http_urls_with_hosts_are_accepted() {
        assert!(validate_url("https://example.com/a").is_ok());
        assert!(validate_url("  http://example.com  ").is_ok());
        for bad in ["", "example.com", "ftp://example.com/file", "mailto:a@b.c", "http://"] {
            let err = validate_url(bad).unwrap_err();
            assert_eq!(err.kind, ErrorKind::InvalidInput, "{bad}");
        }
    }
}
