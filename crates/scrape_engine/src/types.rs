use std::fmt;
use std::time::Duration;

/// Why a single URL did not produce a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Malformed URL or option; no network call was attempted.
    InvalidInput,
    /// Transport failure after all retries were spent.
    NetworkError,
    /// Non-2xx response. Carries the status code.
    HttpError(u16),
    /// Content could not be decoded as text.
    ParseError,
    /// The run was aborted before this work finished.
    Cancelled,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorKind::InvalidInput => write!(f, "InvalidInput"),
            ErrorKind::NetworkError => write!(f, "NetworkError"),
            ErrorKind::HttpError(code) => write!(f, "HttpError:{code}"),
            ErrorKind::ParseError => write!(f, "ParseError"),
            ErrorKind::Cancelled => write!(f, "Cancelled"),
        }
    }
}

/// A single fetch, immutable once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchRequest {
    url: String,
    timeout: Duration,
    max_retries: u32,
}

impl FetchRequest {
    pub fn new(url: impl Into<String>, timeout: Duration, max_retries: u32) -> Self {
        Self {
            url: url.into(),
            timeout,
            max_retries,
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }
}

/// Response of a completed HTTP exchange, whatever its status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedPage {
    pub status: u16,
    pub body: Vec<u8>,
    /// Raw `Content-Type` header value, empty when the server sent none.
    pub content_type: String,
    /// URL after redirects.
    pub final_url: String,
}

impl FetchedPage {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{kind}: {message}")]
pub struct FetchError {
    pub kind: ErrorKind,
    pub message: String,
}

impl FetchError {
    pub(crate) fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

pub type FetchResult = Result<FetchedPage, FetchError>;

/// Extracted value of one field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldValue {
    /// Zero matches (empty string) or exactly one match.
    Single(String),
    /// Two or more matches, in document order.
    Multiple(Vec<String>),
}

impl FieldValue {
    pub fn empty() -> Self {
        FieldValue::Single(String::new())
    }

    pub fn is_empty(&self) -> bool {
        match self {
            FieldValue::Single(value) => value.is_empty(),
            FieldValue::Multiple(values) => values.is_empty(),
        }
    }

    /// Flattens the value for single-cell output, joining multiple values with `separator`.
    pub fn joined(&self, separator: &str) -> String {
        match self {
            FieldValue::Single(value) => value.clone(),
            FieldValue::Multiple(values) => values.join(separator),
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.joined("; "))
    }
}

/// Structured fields extracted from one page.
///
/// `fields` holds exactly one entry per selector-spec field, in spec order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    pub url: String,
    pub fields: Vec<(String, FieldValue)>,
    /// Cleaned markdown rendering of the page, when capture was requested.
    pub markdown: Option<String>,
}

impl Record {
    pub fn get(&self, field: &str) -> Option<&FieldValue> {
        self.fields
            .iter()
            .find(|(name, _)| name == field)
            .map(|(_, value)| value)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UrlFailure {
    pub url: String,
    pub kind: ErrorKind,
    pub message: String,
}

/// Outcome of one pipeline run.
///
/// Without cancellation every distinct input URL appears in exactly one of
/// `records` or `failures`. Both keep input order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PipelineResult {
    pub records: Vec<Record>,
    pub failures: Vec<UrlFailure>,
    /// Set when the run was cancelled; URLs still pending at that point are
    /// absent from both sequences.
    pub cancelled: bool,
}

impl PipelineResult {
    pub fn accounted(&self) -> usize {
        self.records.len() + self.failures.len()
    }

    /// Marker kind for a cancelled run.
    pub fn interruption(&self) -> Option<ErrorKind> {
        self.cancelled.then_some(ErrorKind::Cancelled)
    }
}

pub type UrlIndex = usize;

/// Progress reported while a pipeline runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineEvent {
    Started {
        index: UrlIndex,
        url: String,
    },
    Completed {
        index: UrlIndex,
        url: String,
        result: Result<(), ErrorKind>,
    },
}
