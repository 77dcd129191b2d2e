use reqwest::Method;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::json;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::client::{first_result, CloudDns};
use crate::error::{Error, Result};
use crate::pagination::Pager;
use crate::records::Record;

pub const DEFAULT_DOMAIN_TTL: u32 = 3600;

/// Domain as it appears in listings and create results.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Domain {
    #[serde(deserialize_with = "numeric_id")]
    pub id: u64,
    pub name: String,
    #[serde(default)]
    pub email_address: String,
    #[serde(default, deserialize_with = "numeric_id")]
    pub account_id: u64,
    #[serde(default)]
    pub created: String,
    #[serde(default)]
    pub updated: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
}

/// Full domain view returned by a direct lookup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DomainDetail {
    #[serde(deserialize_with = "numeric_id")]
    pub id: u64,
    pub name: String,
    #[serde(default)]
    pub email_address: String,
    #[serde(default, deserialize_with = "numeric_id")]
    pub account_id: u64,
    #[serde(default)]
    pub ttl: u32,
    #[serde(default)]
    pub comment: String,
    #[serde(default)]
    pub created: String,
    #[serde(default)]
    pub updated: String,
    #[serde(default)]
    pub nameservers: Vec<Nameserver>,
    #[serde(default)]
    pub records_list: RecordsList,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Nameserver {
    pub name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordsList {
    #[serde(default)]
    pub total_entries: u32,
    #[serde(default)]
    pub records: Vec<Record>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct DomainListOpts {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateDomain {
    pub name: String,
    pub email_address: String,
    pub ttl: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateDomain {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email_address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ttl: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
}

impl UpdateDomain {
    pub fn is_empty(&self) -> bool {
        self.email_address.is_none() && self.ttl.is_none() && self.comment.is_none()
    }
}

/// Ids arrive as JSON numbers from some endpoints and numeric strings from others.
pub(crate) fn numeric_id<'de, D>(deserializer: D) -> std::result::Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Id {
        Number(u64),
        Text(String),
    }

    match Id::deserialize(deserializer)? {
        Id::Number(n) => Ok(n),
        Id::Text(s) => s.trim().parse().map_err(serde::de::Error::custom),
    }
}

impl CloudDns {
    pub fn list_domains(&self, opts: &DomainListOpts) -> Result<Pager> {
        self.pager(self.service_url(&["domains"]), opts, "domains")
    }

    pub async fn get_domain(&self, id: u64, cancel: &CancellationToken) -> Result<DomainDetail> {
        let url = self.service_url(&["domains", &id.to_string()]);
        let body = self.fetch(&url, cancel).await?;
        DomainDetail::deserialize(&body).map_err(|e| Error::decode(&url, e))
    }

    /// Create a domain and wait for the job to finish. A zero TTL means the default.
    pub async fn create_domain(&self, mut opts: CreateDomain, cancel: &CancellationToken) -> Result<Domain> {
        if opts.ttl == 0 {
            opts.ttl = DEFAULT_DOMAIN_TTL;
        }

        let url = self.service_url(&["domains"]);
        let body = json!({ "domains": [opts] });
        let completed = self.submit(Method::POST, &url, Some(&body), cancel).await?;
        let domain: Domain = first_result(&url, &completed, "domains")?;

        info!(id = domain.id, name = %domain.name, "domain created");
        Ok(domain)
    }

    pub async fn update_domain(&self, id: u64, opts: &UpdateDomain, cancel: &CancellationToken) -> Result<()> {
        let url = self.service_url(&["domains", &id.to_string()]);
        let body = serde_json::to_value(opts).map_err(|e| Error::InvalidQuery(e.to_string()))?;
        self.submit(Method::PUT, &url, Some(&body), cancel).await?;

        info!(id, "domain updated");
        Ok(())
    }

    pub async fn delete_domain(&self, id: u64, cancel: &CancellationToken) -> Result<()> {
        let url = self.service_url(&["domains", &id.to_string()]);
        self.submit(Method::DELETE, &url, None, cancel).await?;

        info!(id, "domain deleted");
        Ok(())
    }
}
