//! Error taxonomy of the ingestion pipeline.
//!
//! Every per-source error ends up as a `SourceError` inside the run
//! summary. None of them aborts a run; only `RunError` does, and only
//! before any source has been touched.

use thiserror::Error;

/// Network / HTTP failure while fetching a source.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request to {url} failed: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{url} answered with HTTP {status}")]
    Status { url: String, status: u16 },

    #[error("giving up on {url} after {attempts} attempts: {last}")]
    Exhausted {
        url: String,
        attempts: u32,
        last: Box<FetchError>,
    },

    #[error("could not build HTTP client: {0}")]
    Client(#[source] reqwest::Error),

    /// Pagination discovery failed on the first page.
    #[error("could not read pagination: {0}")]
    Pagination(#[from] ParseError),
}

/// The payload does not have the shape the adapter expects.
///
/// Aborts the adapter's run: an empty or half-read record set would
/// wipe good data on replace.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("invalid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),

    #[error("expected container not found: {0}")]
    MissingContainer(&'static str),

    #[error("invalid CSS selector {selector:?}: {reason}")]
    Selector {
        selector: &'static str,
        reason: String,
    },

    #[error("unexpected payload, expected {expected}")]
    UnexpectedPayload { expected: &'static str },
}

/// A single listing is unusable. The entry is dropped, parsing continues.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RecordFieldError {
    #[error("missing field `{0}`")]
    Missing(&'static str),

    #[error("invalid field `{field}`: {reason}")]
    Invalid { field: &'static str, reason: String },
}

/// Persistence failure. The prior record set is left untouched.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("redis: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("could not encode listings: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("corrupt stored listing {url}: {reason}")]
    Corrupt { url: String, reason: String },

    #[error("storage backend failure: {0}")]
    Backend(String),
}

/// Terminal failure of one source within a run.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("fetch failed: {0}")]
    Fetch(#[from] FetchError),

    #[error("parse failed: {0}")]
    Parse(#[from] ParseError),

    #[error("storage failed: {0}")]
    Storage(#[from] StorageError),

    #[error("source task aborted: {0}")]
    Aborted(String),
}

/// The run could not start at all.
#[derive(Debug, Error)]
pub enum RunError {
    #[error("concurrency must be at least 1")]
    InvalidConcurrency,

    #[error("source id '{0}' is registered more than once")]
    DuplicateSource(String),
}
