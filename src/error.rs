use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced by the Cloud DNS client.
///
/// `Network`, `Status` and `Decode` form the transport family: the exchange
/// itself failed and nothing about the remote job or listing is known.
#[derive(Debug, Error)]
pub enum Error {
    #[error("request to {url} failed: {source}")]
    Network {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{method} {url} returned HTTP {status}: {body}")]
    Status {
        method: String,
        url: String,
        status: u16,
        body: String,
    },

    #[error("failed to decode response from {url}: {source}")]
    Decode {
        url: String,
        #[source]
        source: serde_json::Error,
    },

    /// The polled job reached `ERROR` with an error document attached.
    #[error("{0}")]
    JobFailed(String),

    #[error("operation cancelled")]
    Cancelled,

    #[error("job {job_id} did not reach {target} after {attempts} polls")]
    PollLimitReached {
        job_id: String,
        target: String,
        attempts: u32,
    },

    #[error("job {job_id} has no callback URL")]
    InvalidJob { job_id: String },

    #[error("invalid URL {url}: {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("invalid list filter: {0}")]
    InvalidQuery(String),

    #[error("response is missing {0}")]
    MissingField(&'static str),

    #[error("authentication failed: {0}")]
    Auth(String),
}

impl Error {
    /// True for failures of the request/response exchange itself.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            Error::Network { .. } | Error::Status { .. } | Error::Decode { .. }
        )
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Error::Cancelled)
    }

    pub(crate) fn decode(url: &str, source: serde_json::Error) -> Self {
        Error::Decode {
            url: url.to_string(),
            source,
        }
    }
}
