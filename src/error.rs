use thiserror::Error;

/// Failure taxonomy for playlist aggregation.
///
/// `RateLimited` and `Transient` are recoverable at the page/batch level via
/// backoff; everything else terminates the operation that raised it.
#[derive(Debug, Error)]
pub enum Error {
    /// The playlist does not exist or is private.
    #[error("playlist not found or private: {0}")]
    NotFound(String),

    /// The API rejected our credentials.
    #[error("authentication rejected: {0}")]
    Auth(String),

    /// The API asked us to slow down.
    #[error("rate limited by the API")]
    RateLimited,

    /// A network or server hiccup worth retrying.
    #[error("transient network failure: {0}")]
    Transient(String),

    /// A duration token that does not follow ISO-8601 interval notation.
    #[error("malformed duration token: {0:?}")]
    DurationParse(String),

    /// A retryable error persisted past the configured attempt budget.
    #[error("retry budget exhausted after {attempts} attempts: {source}")]
    ExhaustedRetries {
        attempts: u32,
        #[source]
        source: Box<Error>,
    },

    /// The caller cancelled the operation or a deadline passed.
    #[error("operation cancelled")]
    Cancelled,
}

impl Error {
    /// Whether the same request may be reissued.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::RateLimited | Error::Transient(_))
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        Error::Transient(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
