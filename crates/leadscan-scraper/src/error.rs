use leadscan_core::Source;
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ScraperError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("throttled by {origin}: {reason}")]
    Throttled { origin: Source, reason: String },

    #[error("endpoint not found: {url}")]
    NotFound { url: String },

    #[error("unexpected HTTP status {status} from {url}")]
    UnexpectedStatus { status: u16, url: String },

    #[error("JSON deserialization error for {context}: {source}")]
    Deserialize {
        context: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("malformed response from {origin}: {reason}")]
    Malformed { origin: Source, reason: String },

    #[error("could not parse listing from {origin}: {reason}")]
    Parse { origin: Source, reason: String },

    #[error("request quota of {limit} exhausted for {origin}")]
    QuotaExhausted { origin: Source, limit: u32 },

    #[error("no API credential configured for {origin}")]
    MissingCredential { origin: Source },

    #[error("{origin} API rejected the request ({status}): {message}")]
    Api {
        origin: Source,
        status: String,
        message: String,
    },

    #[error("invalid URL \"{url}\": {reason}")]
    InvalidUrl { url: String, reason: String },
}

/// How the scan loop should react to a [`ScraperError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// Network hiccup, timeout, 5xx or malformed body. Retried with backoff.
    Transient,
    /// Rate-limit or block signal. Triggers a cooldown, then one more try.
    Throttled,
    /// A single listing could not be turned into a record. Skipped.
    Parse,
    /// The source's request ceiling was reached. Stops that source cleanly.
    QuotaExhausted,
    /// Retrying cannot help (404, rejected or missing credential).
    Permanent,
}

impl ScraperError {
    #[must_use]
    pub fn kind(&self) -> FailureKind {
        match self {
            ScraperError::Http(_)
            | ScraperError::Deserialize { .. }
            | ScraperError::Malformed { .. } => FailureKind::Transient,
            ScraperError::UnexpectedStatus { status, .. } => {
                if *status >= 500 {
                    FailureKind::Transient
                } else {
                    FailureKind::Permanent
                }
            }
            ScraperError::Throttled { .. } => FailureKind::Throttled,
            ScraperError::Parse { .. } => FailureKind::Parse,
            ScraperError::QuotaExhausted { .. } => FailureKind::QuotaExhausted,
            ScraperError::NotFound { .. }
            | ScraperError::MissingCredential { .. }
            | ScraperError::Api { .. }
            | ScraperError::InvalidUrl { .. } => FailureKind::Permanent,
        }
    }
}

/// Fatal scan outcome surfaced to the caller.
#[derive(Debug, Error)]
pub enum ScanError {
    #[error("no data collected: all {attempted} source runs yielded nothing ({})", .degraded.join("; "))]
    NoDataCollected {
        attempted: usize,
        degraded: Vec<String>,
    },
}
