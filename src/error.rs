//! Outcome kinds for every recoverable failure in the pipeline.
//!
//! None of these escape the component that produced them: the caller logs
//! the cause and collapses it to an absent value or an empty partition.

use thiserror::Error;

/// A single HTTP round trip that did not yield a usable body.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Connect/read failure or timeout
    #[error("request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("HTTP {status} for {url}")]
    Status {
        url: String,
        status: reqwest::StatusCode,
    },

    #[error("failed to read body from {url}: {source}")]
    Body {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("invalid JSON from {url}: {source}")]
    Json {
        url: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("cannot build request URL from {base}")]
    BadUrl { base: String },
}

/// The listing page arrived but does not have the expected table layout.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ListingError {
    #[error("no statistics table in page")]
    MissingTable,

    #[error("statistics table has no body")]
    MissingBody,
}

/// A listing row that cannot become a fighter record.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RowError {
    #[error("row has no data cells")]
    Empty,

    #[error("row has {found} cells, expected at least {expected}")]
    TooFewCells { found: usize, expected: usize },

    #[error("row is missing a first or last name")]
    MissingName,
}
