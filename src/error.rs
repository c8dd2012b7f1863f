use thiserror::Error;

/// Source-level failures. Individual malformed records never surface here;
/// they are skipped where they occur so the rest of the feed still parses.
#[derive(Debug, Error)]
pub enum Error {
    #[error("request failed: {0}")]
    Http(#[from] ureq::Error),

    #[error("non-success status {status} fetching {url}")]
    Status { status: u16, url: String },

    #[error("invalid url {url}: {reason}")]
    Url { url: String, reason: String },
}
