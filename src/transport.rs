use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Method};
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::error::{Error, Result};

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// A single request/response exchange against the Cloud DNS API.
///
/// Implementations must be safe to share between concurrent callers.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn request(&self, method: Method, url: &str, body: Option<&Value>) -> Result<Value>;
}

/// Run one exchange, giving up with [`Error::Cancelled`] as soon as `cancel` fires.
pub async fn send(
    transport: &dyn Transport,
    method: Method,
    url: &str,
    body: Option<&Value>,
    cancel: &CancellationToken,
) -> Result<Value> {
    if cancel.is_cancelled() {
        return Err(Error::Cancelled);
    }

    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(Error::Cancelled),
        result = transport.request(method, url, body) => result,
    }
}

/// reqwest-backed transport carrying an identity token.
pub struct HttpTransport {
    client: Client,
    token: String,
}

impl HttpTransport {
    pub fn new(token: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|source| Error::Network {
                url: String::new(),
                source,
            })?;

        Ok(Self {
            client,
            token: token.into(),
        })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn request(&self, method: Method, url: &str, body: Option<&Value>) -> Result<Value> {
        debug!(%method, url, "sending request");

        let mut request = self
            .client
            .request(method.clone(), url)
            .header("X-Auth-Token", &self.token)
            .header("Accept", "application/json");
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await.map_err(|source| Error::Network {
            url: url.to_string(),
            source,
        })?;

        let status = response.status();
        let text = response.text().await.map_err(|source| Error::Network {
            url: url.to_string(),
            source,
        })?;

        debug!(%method, url, status = status.as_u16(), "received response");

        if !status.is_success() {
            return Err(Error::Status {
                method: method.to_string(),
                url: url.to_string(),
                status: status.as_u16(),
                body: text,
            });
        }

        decode_body(url, &text)
    }
}

/// Parse a response body; an empty body (e.g. `204 No Content`) is JSON `null`.
pub(crate) fn decode_body(url: &str, text: &str) -> Result<Value> {
    if text.trim().is_empty() {
        return Ok(Value::Null);
    }
    serde_json::from_str(text).map_err(|e| Error::decode(url, e))
}
