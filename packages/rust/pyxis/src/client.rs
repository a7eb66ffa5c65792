//! Thin REST client over the catalog's `v1/images` collection.

use std::time::Duration;

use reqwest::{Client, RequestBuilder};
use serde::{Deserialize, Serialize};
use tracing::debug;

use operatorcert_shared::Result;
use operatorcert_shared::http::{self, DEFAULT_TIMEOUT_SECS};

/// Header carrying the catalog API key.
const API_KEY_HEADER: &str = "X-API-KEY";

/// One page of a filtered image query.
#[derive(Debug, Clone, Deserialize)]
pub struct ImagePage {
    /// Records on this page.
    #[serde(default)]
    pub data: Vec<ImageSummary>,
    /// Number of records matching the filter across all pages.
    #[serde(default)]
    pub total: u64,
}

/// The parts of an image record the existence check looks at.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ImageSummary {
    /// Catalog-assigned identifier.
    #[serde(rename = "_id", default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Soft-delete marker. Absent or null means live.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deleted: Option<bool>,
}

impl ImageSummary {
    /// Whether the record has been soft-deleted.
    pub fn is_deleted(&self) -> bool {
        self.deleted.unwrap_or(false)
    }
}

/// Catalog API client.
#[derive(Debug, Clone)]
pub struct PyxisClient {
    http: Client,
    base_url: String,
    api_key: Option<String>,
}

impl PyxisClient {
    /// Create a client for the catalog rooted at `base_url`.
    pub fn new(base_url: &str, api_key: Option<String>) -> Result<Self> {
        // Validate eagerly so a bad flag fails before any request.
        http::join_url(base_url, "v1/images")?;
        Ok(Self {
            http: http::build_client(Duration::from_secs(DEFAULT_TIMEOUT_SECS))?,
            base_url: base_url.to_string(),
            api_key,
        })
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.api_key {
            Some(key) => request.header(API_KEY_HEADER, key),
            None => request,
        }
    }

    /// Run a filtered query against `v1/images`.
    pub async fn query_images(&self, filter: &str, page_size: u32) -> Result<ImagePage> {
        let mut url = http::join_url(&self.base_url, "v1/images")?;
        url.query_pairs_mut()
            .append_pair("page_size", &page_size.to_string())
            .append_pair("filter", filter);

        debug!(%url, "querying images");
        http::send_json(self.authorize(self.http.get(url))).await
    }

    /// Create an image record; returns the server's JSON response.
    pub async fn create_image<T: Serialize + ?Sized>(&self, payload: &T) -> Result<serde_json::Value> {
        let url = http::join_url(&self.base_url, "v1/images")?;

        debug!(%url, "creating image");
        http::send_json(self.authorize(self.http.post(url).json(payload))).await
    }
}
