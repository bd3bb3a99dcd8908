use std::num::ParseIntError;

/// All errors that can occur while scraping, aggregating or persisting
/// match results.
#[derive(thiserror::Error, Debug)]
pub enum ScrapeError {
    /// HTTP request failed (network, DNS, TLS, timeout, etc.).
    #[error("http request failed for {url}: {source}")]
    Http {
        url: String,
        source: reqwest::Error,
    },

    /// Server returned a non-success HTTP status code.
    #[error("unexpected status {status} for {url}")]
    UnexpectedStatus {
        url: String,
        status: reqwest::StatusCode,
    },

    /// Failed to read the response body as text.
    #[error("failed to read response body from {url}: {source}")]
    ResponseBody {
        url: String,
        source: reqwest::Error,
    },

    /// All retry attempts for a URL were used up on transient failures.
    #[error("retries exhausted for {url} after {attempts} attempts: {last}")]
    RetriesExhausted {
        url: String,
        attempts: u32,
        last: Box<ScrapeError>,
    },

    /// A result block matched the fixture pattern but was missing its
    /// date anchor.
    #[error("parse failure in block {block_index}: {reason}")]
    Parse { reason: String, block_index: usize },

    /// Requested season lies outside the configured bounds.
    #[error("season {year} out of range ({min}-{max})")]
    SeasonOutOfRange { year: u16, min: u16, max: u16 },

    /// The season index page could not be fetched; the whole season is
    /// abandoned (a range scrape carries on with the next year).
    #[error("season {year} index unavailable: {source}")]
    SeasonIndexUnavailable {
        year: u16,
        source: Box<ScrapeError>,
    },

    /// Failed to parse an integer from scraped text.
    #[error("failed to parse integer: {0}")]
    IntParse(#[from] ParseIntError),

    /// Failed to parse a date from scraped text.
    #[error("failed to parse date: {0}")]
    DateParse(#[from] chrono::ParseError),

    /// Relational sink failure (connection or constraint violation).
    #[error("sink error: {0}")]
    Sink(#[from] sqlx::Error),

    /// Parquet snapshot export failure.
    #[error("export error: {0}")]
    Export(#[from] parquet::errors::ParquetError),

    /// Filesystem failure while writing an export.
    #[error("export io error: {0}")]
    ExportIo(#[from] std::io::Error),

    /// Snapshot manifest could not be serialized.
    #[error("manifest error: {0}")]
    Manifest(#[from] serde_json::Error),

    /// The HTTP client itself could not be built.
    #[error("failed to build http client: {0}")]
    Client(reqwest::Error),
}

impl ScrapeError {
    /// Transient failure classes worth retrying: connection-level errors,
    /// timeouts, 5xx responses and 429. Everything else fails immediately.
    pub(crate) fn is_retryable(&self) -> bool {
        match self {
            ScrapeError::Http { source, .. } => source.is_timeout() || source.is_connect(),
            ScrapeError::UnexpectedStatus { status, .. } => {
                status.is_server_error() || *status == reqwest::StatusCode::TOO_MANY_REQUESTS
            }
            ScrapeError::ResponseBody { .. } => true,
            _ => false,
        }
    }

    /// A hard 404 on a page. For round and finals pages this means the page
    /// simply does not exist (future rounds, short pre-2007 seasons) and is
    /// treated as zero matches rather than a failure.
    pub(crate) fn is_not_found(&self) -> bool {
        matches!(
            self,
            ScrapeError::UnexpectedStatus { status, .. }
                if *status == reqwest::StatusCode::NOT_FOUND
        )
    }
}

pub type Result<T> = std::result::Result<T, ScrapeError>;
