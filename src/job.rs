//! Asynchronous job tracking.
//!
//! Mutating Cloud DNS calls answer immediately with a job descriptor. The real
//! outcome is read by polling the job's callback URL until the reported
//! status is terminal.

use std::fmt;
use std::time::Duration;

use reqwest::{Method, Url};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::transport::{self, Transport};

const GENERIC_JOB_ERROR: &str = "Unknown error has occurred.";

/// Job status as reported by the server. Unknown values are intermediate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum JobStatus {
    Running,
    Completed,
    Error,
    Other(String),
}

impl From<String> for JobStatus {
    fn from(value: String) -> Self {
        match value.as_str() {
            "RUNNING" => JobStatus::Running,
            "COMPLETED" => JobStatus::Completed,
            "ERROR" => JobStatus::Error,
            _ => JobStatus::Other(value),
        }
    }
}

impl From<JobStatus> for String {
    fn from(value: JobStatus) -> Self {
        value.to_string()
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobStatus::Running => write!(f, "RUNNING"),
            JobStatus::Completed => write!(f, "COMPLETED"),
            JobStatus::Error => write!(f, "ERROR"),
            JobStatus::Other(s) => write!(f, "{}", s),
        }
    }
}

/// One snapshot of a server-side job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobDescriptor {
    #[serde(default)]
    pub callback_url: String,
    #[serde(default)]
    pub job_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<Value>,
    #[serde(default)]
    pub request_url: String,
    #[serde(default)]
    pub verb: String,
    // Required: a snapshot without a status cannot be classified.
    pub status: JobStatus,
}

/// Human-readable parts of a job's error document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ErrorDetail {
    pub details: Option<String>,
    pub message: Option<String>,
}

impl ErrorDetail {
    /// Non-string values are treated as absent.
    pub fn from_value(value: &Value) -> Self {
        let field = |key: &str| value.get(key).and_then(Value::as_str).map(str::to_string);
        Self {
            details: field("details"),
            message: field("message"),
        }
    }

    /// `details`, then `message`, then a generic fallback.
    pub fn into_message(self) -> String {
        self.details
            .or(self.message)
            .unwrap_or_else(|| GENERIC_JOB_ERROR.to_string())
    }
}

/// What a single poll snapshot means for the waiting caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Reached,
    Failed(String),
    Pending,
}

impl JobDescriptor {
    pub fn error_detail(&self) -> Option<ErrorDetail> {
        self.error.as_ref().map(ErrorDetail::from_value)
    }

    pub fn outcome(&self, target: &JobStatus) -> Outcome {
        if &self.status == target {
            return Outcome::Reached;
        }

        if self.status == JobStatus::Error {
            match self.error_detail() {
                Some(detail) => return Outcome::Failed(detail.into_message()),
                // Legacy behavior: ERROR without an error document keeps polling.
                None => warn!(job_id = %self.job_id, "job reported ERROR without details, polling again"),
            }
        }

        Outcome::Pending
    }
}

/// Pacing for the poll loop. The default polls back to back with no limit,
/// leaving the caller's cancellation token as the only bound.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PollOptions {
    pub interval: Duration,
    pub max_attempts: Option<u32>,
}

pub fn poll_url(callback_url: &str) -> Result<String> {
    let mut url = Url::parse(callback_url).map_err(|e| Error::InvalidUrl {
        url: callback_url.to_string(),
        reason: e.to_string(),
    })?;
    url.query_pairs_mut().append_pair("showDetails", "true");
    Ok(url.into())
}

/// Poll `job` until it reports `target`, returning the body of that response.
pub async fn await_status(
    transport: &dyn Transport,
    job: &JobDescriptor,
    target: &JobStatus,
    cancel: &CancellationToken,
    options: &PollOptions,
) -> Result<Value> {
    if job.callback_url.is_empty() {
        return Err(Error::InvalidJob {
            job_id: job.job_id.clone(),
        });
    }

    let url = poll_url(&job.callback_url)?;
    let mut attempts: u32 = 0;

    loop {
        if let Some(max) = options.max_attempts {
            if attempts >= max {
                return Err(Error::PollLimitReached {
                    job_id: job.job_id.clone(),
                    target: target.to_string(),
                    attempts,
                });
            }
        }

        if attempts > 0 && !options.interval.is_zero() {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(Error::Cancelled),
                _ = tokio::time::sleep(options.interval) => {}
            }
        }

        attempts += 1;
        let body = transport::send(transport, Method::GET, &url, None, cancel).await?;
        let latest = JobDescriptor::deserialize(&body).map_err(|e| Error::decode(&url, e))?;

        debug!(job_id = %latest.job_id, status = %latest.status, attempt = attempts, "polled job");

        match latest.outcome(target) {
            Outcome::Reached => {
                info!(job_id = %latest.job_id, status = %latest.status, "job finished");
                return Ok(body);
            }
            Outcome::Failed(message) => return Err(Error::JobFailed(message)),
            Outcome::Pending => {}
        }
    }
}
