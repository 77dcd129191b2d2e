//! Link-chained listing traversal.
//!
//! A listing response carries one batch of items under a resource-specific
//! key plus a `links` array. The entry with `rel == "next"` points at the
//! following batch; its absence ends the listing.

use std::sync::Arc;

use reqwest::{Method, Url};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::error::{Error, Result};
use crate::transport::{self, Transport};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Link {
    #[serde(default)]
    pub rel: String,
    #[serde(default)]
    pub href: String,
}

/// One fetched batch of a listing.
#[derive(Debug, Clone, PartialEq)]
pub struct Page {
    pub items: Vec<Value>,
    pub links: Vec<Link>,
}

#[derive(Deserialize)]
struct PageLinks {
    #[serde(default)]
    links: Option<Vec<Link>>,
}

impl Page {
    /// Split a raw listing response into its items and next-page link.
    ///
    /// A missing items key is an empty batch, and missing or `null` links mean
    /// no further pages. A present items key that is not an array is a
    /// decode error.
    pub fn from_response(body: &Value, items_key: &str) -> std::result::Result<Self, serde_json::Error> {
        let items = match body.get(items_key) {
            None | Some(Value::Null) => Vec::new(),
            Some(items) => Vec::<Value>::deserialize(items)?,
        };
        let links = PageLinks::deserialize(body)?.links.unwrap_or_default();

        Ok(Self { items, links })
    }

    /// URL of the following page, if any.
    pub fn next(&self) -> Option<&str> {
        next_link(&self.links)
    }

    /// Re-encode as a listing document with the items under `items_key`.
    pub fn to_document(&self, items_key: &str) -> Value {
        let mut doc = serde_json::Map::new();
        doc.insert(items_key.to_string(), Value::Array(self.items.clone()));
        doc.insert(
            "links".to_string(),
            Value::Array(
                self.links
                    .iter()
                    .map(|link| json!({"rel": link.rel, "href": link.href}))
                    .collect(),
            ),
        );
        Value::Object(doc)
    }

    /// Decode every item of this page into `T`.
    pub fn extract<T: DeserializeOwned>(&self) -> std::result::Result<Vec<T>, serde_json::Error> {
        self.items.iter().map(|item| T::deserialize(item)).collect()
    }
}

pub fn next_link(links: &[Link]) -> Option<&str> {
    links
        .iter()
        .find(|link| link.rel == "next")
        .map(|link| link.href.as_str())
        .filter(|href| !href.is_empty())
}

/// What a page consumer wants after seeing one page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Stop,
}

/// Append a filter document to `base` as query parameters.
///
/// The filter must serialize to a JSON object; `null` and empty-string
/// fields are skipped.
pub fn with_query<Q: Serialize>(base: &str, filter: &Q) -> Result<String> {
    let value = serde_json::to_value(filter).map_err(|e| Error::InvalidQuery(e.to_string()))?;
    let fields = match value {
        Value::Object(fields) => fields,
        Value::Null => return Ok(base.to_string()),
        other => {
            return Err(Error::InvalidQuery(format!(
                "expected an object, got {}",
                other
            )))
        }
    };

    let mut url = Url::parse(base).map_err(|e| Error::InvalidUrl {
        url: base.to_string(),
        reason: e.to_string(),
    })?;

    let mut appended = false;
    {
        let mut pairs = url.query_pairs_mut();
        for (key, value) in fields {
            let value = match value {
                Value::Null => continue,
                Value::String(s) if s.is_empty() => continue,
                Value::String(s) => s,
                Value::Bool(b) => b.to_string(),
                Value::Number(n) => n.to_string(),
                other => {
                    return Err(Error::InvalidQuery(format!(
                        "field {} is not a scalar: {}",
                        key, other
                    )))
                }
            };
            pairs.append_pair(&key, &value);
            appended = true;
        }
    }

    if !appended {
        return Ok(base.to_string());
    }
    Ok(url.into())
}

/// A restartable listing. Every traversal starts again from the first page.
#[derive(Clone)]
pub struct Pager {
    transport: Arc<dyn Transport>,
    start_url: String,
    items_key: String,
}

impl Pager {
    pub fn new(transport: Arc<dyn Transport>, start_url: impl Into<String>, items_key: impl Into<String>) -> Self {
        Self {
            transport,
            start_url: start_url.into(),
            items_key: items_key.into(),
        }
    }

    pub fn start_url(&self) -> &str {
        &self.start_url
    }

    /// Begin a fresh forward-only traversal.
    pub fn pages(&self) -> PageCursor<'_> {
        PageCursor {
            pager: self,
            next_url: Some(self.start_url.clone()),
        }
    }

    /// Feed each page to `consumer` in server order until the listing ends,
    /// the consumer returns [`Flow::Stop`], or an error occurs.
    pub async fn each_page<F>(&self, cancel: &CancellationToken, mut consumer: F) -> Result<()>
    where
        F: FnMut(Page) -> Result<Flow>,
    {
        let mut cursor = self.pages();
        while let Some(page) = cursor.next(cancel).await? {
            if consumer(page)? == Flow::Stop {
                debug!(url = %self.start_url, "listing stopped by consumer");
                break;
            }
        }
        Ok(())
    }

    /// Collect and decode every item of the listing.
    pub async fn all<T: DeserializeOwned>(&self, cancel: &CancellationToken) -> Result<Vec<T>> {
        let mut items = Vec::new();
        self.each_page(cancel, |page| {
            let decoded = page
                .extract::<T>()
                .map_err(|e| Error::decode(&self.start_url, e))?;
            items.extend(decoded);
            Ok(Flow::Continue)
        })
        .await?;
        Ok(items)
    }
}

/// Forward-only position within one traversal of a [`Pager`].
pub struct PageCursor<'a> {
    pager: &'a Pager,
    next_url: Option<String>,
}

impl PageCursor<'_> {
    /// Fetch the next page, or `None` once the link chain is exhausted.
    ///
    /// After an error the cursor is exhausted.
    pub async fn next(&mut self, cancel: &CancellationToken) -> Result<Option<Page>> {
        let Some(url) = self.next_url.take() else {
            return Ok(None);
        };

        let body = transport::send(self.pager.transport.as_ref(), Method::GET, &url, None, cancel).await?;
        let page = Page::from_response(&body, &self.pager.items_key).map_err(|e| Error::decode(&url, e))?;

        debug!(url = %url, items = page.items.len(), has_next = page.next().is_some(), "fetched page");

        self.next_url = page.next().map(str::to_string);
        Ok(Some(page))
    }
}
