use std::sync::Arc;

use reqwest::Method;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::auth;
use crate::config::ClientConfig;
use crate::error::{Error, Result};
use crate::job::{self, JobDescriptor, JobStatus, PollOptions};
use crate::pagination::{self, Pager};
use crate::secrets::Credentials;
use crate::transport::{self, HttpTransport, Transport};

/// Cloud DNS service client bound to one account endpoint.
#[derive(Clone)]
pub struct CloudDns {
    transport: Arc<dyn Transport>,
    endpoint: String,
    poll: PollOptions,
}

impl CloudDns {
    pub fn new(transport: Arc<dyn Transport>, endpoint: impl Into<String>) -> Self {
        let endpoint: String = endpoint.into();
        Self {
            transport,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            poll: PollOptions::default(),
        }
    }

    /// Authenticate against the identity service and bind to the account's DNS endpoint.
    pub async fn connect(config: &ClientConfig, credentials: &Credentials) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|source| Error::Network {
                url: config.identity_url.clone(),
                source,
            })?;

        let session =
            auth::authenticate(&http, &config.identity_url, credentials, config.region.as_deref()).await?;
        let transport = HttpTransport::new(session.token, config.timeout())?;

        Ok(Self::new(Arc::new(transport), session.endpoint))
    }

    pub fn with_poll_options(mut self, poll: PollOptions) -> Self {
        self.poll = poll;
        self
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn service_url(&self, parts: &[&str]) -> String {
        let mut url = self.endpoint.clone();
        for part in parts {
            url.push('/');
            url.push_str(part);
        }
        url
    }

    pub(crate) fn pager<Q: Serialize>(&self, base: String, filter: &Q, items_key: &str) -> Result<Pager> {
        let url = pagination::with_query(&base, filter)?;
        debug!(url = %url, "listing");
        Ok(Pager::new(self.transport.clone(), url, items_key))
    }

    pub(crate) async fn fetch(&self, url: &str, cancel: &CancellationToken) -> Result<Value> {
        transport::send(self.transport.as_ref(), Method::GET, url, None, cancel).await
    }

    /// Issue a mutating call and wait for its job to complete.
    ///
    /// Returns the body of the poll response that reported `COMPLETED`.
    pub(crate) async fn submit(
        &self,
        method: Method,
        url: &str,
        body: Option<&Value>,
        cancel: &CancellationToken,
    ) -> Result<Value> {
        debug!(%method, url, "submitting");

        let accepted = transport::send(self.transport.as_ref(), method, url, body, cancel).await?;
        let job = JobDescriptor::deserialize(&accepted).map_err(|e| Error::decode(url, e))?;

        debug!(job_id = %job.job_id, status = %job.status, "job accepted");

        job::await_status(
            self.transport.as_ref(),
            &job,
            &JobStatus::Completed,
            cancel,
            &self.poll,
        )
        .await
    }
}

/// Pull the first element of `response.<key>` out of a completed job body.
pub(crate) fn first_result<T: DeserializeOwned>(url: &str, body: &Value, key: &'static str) -> Result<T> {
    let item = body
        .get("response")
        .and_then(|response| response.get(key))
        .and_then(|items| items.get(0))
        .ok_or(Error::MissingField(key))?;

    T::deserialize(item).map_err(|e| Error::decode(url, e))
}
