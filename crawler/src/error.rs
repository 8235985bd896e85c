use thiserror::Error;

/// Problems with the crawl configuration. These are the only errors that abort a crawl,
/// and they are always reported before the first page is dispatched.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("empty seed URL")]
    EmptySeed,

    #[error("bad seed URL {url:?}: {reason}")]
    InvalidSeed { url: String, reason: String },

    #[error("seed URL {0:?} is missing a scheme")]
    MissingScheme(String),

    #[error("unsupported seed URL scheme {0:?}, expected http or https")]
    UnsupportedScheme(String),

    #[error("seed URL {0:?} has no host")]
    MissingHost(String),
}

/// Transport level failures reported by a fetcher
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request timed out")]
    Timeout,

    #[error("network error: {0}")]
    Network(String),

    #[error("unacceptable content type {0:?}")]
    UnacceptableContentType(Option<String>),

    #[error("failed to read response body: {0}")]
    Body(String),
}

impl From<reqwest::Error> for FetchError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_timeout() {
            FetchError::Timeout
        } else {
            FetchError::Network(error.to_string())
        }
    }
}

/// The page body could not be turned into links
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("malformed page: {0}")]
pub struct ParseError(pub String);

/// Why a single page produced no links. Recorded against that page only; the crawl carries on.
#[derive(Debug, Error)]
pub enum PageError {
    #[error("invalid page URL {0:?}")]
    InvalidLink(String),

    #[error("fetch failed: {0}")]
    Fetch(#[from] FetchError),

    #[error("got status code {0}")]
    Status(u16),

    #[error("unacceptable content type {0:?}")]
    ContentType(Option<String>),

    #[error("parse failed: {0}")]
    Parse(#[from] ParseError),

    #[error("page task ended without producing a result")]
    Aborted,
}
