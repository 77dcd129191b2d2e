use reqwest::Method;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::client::{first_result, CloudDns};
use crate::error::{Error, Result};
use crate::pagination::Pager;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub record_type: String,
    pub data: String,
    #[serde(default)]
    pub ttl: u32,
    /// Only meaningful for MX and SRV records.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub created: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub updated: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct RecordListOpts {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<String>,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub record_type: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CreateRecord {
    pub name: String,
    #[serde(rename = "type")]
    pub record_type: String,
    pub data: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ttl: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority: Option<u32>,
}

/// Name and data are always sent; the API rejects updates without them.
#[derive(Debug, Clone, Serialize)]
pub struct UpdateRecord {
    pub name: String,
    pub data: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ttl: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority: Option<u32>,
}

impl UpdateRecord {
    /// Start an update that keeps the record's current name and data.
    pub fn from_record(record: &Record) -> Self {
        Self {
            name: record.name.clone(),
            data: record.data.clone(),
            ttl: None,
            comment: None,
            priority: None,
        }
    }
}

impl CloudDns {
    pub fn list_records(&self, domain_id: u64, opts: &RecordListOpts) -> Result<Pager> {
        let url = self.service_url(&["domains", &domain_id.to_string(), "records"]);
        self.pager(url, opts, "records")
    }

    pub async fn get_record(&self, domain_id: u64, id: &str, cancel: &CancellationToken) -> Result<Record> {
        let url = self.service_url(&["domains", &domain_id.to_string(), "records", id]);
        let body = self.fetch(&url, cancel).await?;
        Record::deserialize(&body).map_err(|e| Error::decode(&url, e))
    }

    pub async fn create_record(
        &self,
        domain_id: u64,
        opts: &CreateRecord,
        cancel: &CancellationToken,
    ) -> Result<Record> {
        let url = self.service_url(&["domains", &domain_id.to_string(), "records"]);
        let body = json!({ "records": [opts] });
        let completed = self.submit(Method::POST, &url, Some(&body), cancel).await?;
        let record: Record = first_result(&url, &completed, "records")?;

        info!(domain_id, id = %record.id, name = %record.name, "record created");
        Ok(record)
    }

    pub async fn update_record(
        &self,
        domain_id: u64,
        id: &str,
        opts: &UpdateRecord,
        cancel: &CancellationToken,
    ) -> Result<()> {
        let url = self.service_url(&["domains", &domain_id.to_string(), "records", id]);
        let body = serde_json::to_value(opts).map_err(|e| Error::InvalidQuery(e.to_string()))?;
        self.submit(Method::PUT, &url, Some(&body), cancel).await?;

        info!(domain_id, id, "record updated");
        Ok(())
    }

    pub async fn delete_record(&self, domain_id: u64, id: &str, cancel: &CancellationToken) -> Result<()> {
        let url = self.service_url(&["domains", &domain_id.to_string(), "records", id]);
        self.submit(Method::DELETE, &url, None, cancel).await?;

        info!(domain_id, id, "record deleted");
        Ok(())
    }
}
