//! REST client for the IIB `api/v1/builds` endpoints.

use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use operatorcert_shared::Result;
use operatorcert_shared::http::{self, DEFAULT_TIMEOUT_SECS};

/// Body of `POST api/v1/builds/add`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AddBuildRequest {
    /// Base index pullspec.
    pub from_index: String,
    /// Bundle pullspecs to add to the index.
    pub bundles: Vec<String>,
    pub cnr_token: String,
    pub force_backport: bool,
    /// Organization index the bundle is released to.
    pub organization: String,
    pub overwrite_from_index: bool,
    pub add_arches: Vec<String>,
    /// `<user>:<token>` allowed to overwrite `from_index`.
    pub overwrite_from_index_token: String,
}

/// Remote build state as reported by IIB.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BuildState {
    Complete,
    Failed,
    /// Any non-terminal state (`in_progress`, `queued`, ...).
    Pending(String),
}

impl BuildState {
    fn parse(state: &str) -> Self {
        match state {
            "complete" => Self::Complete,
            "failed" => Self::Failed,
            other => Self::Pending(other.to_string()),
        }
    }
}

/// One entry of a build's state history.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StateHistoryEntry {
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub state_reason: Option<String>,
}

/// Build representation returned by both build endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildResponse {
    pub id: u64,
    #[serde(default)]
    pub state: String,
    /// Most recent entry first.
    #[serde(default)]
    pub state_history: Vec<StateHistoryEntry>,
    /// Resulting index pullspec, once built.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index_image: Option<String>,
    /// Remaining fields, kept for diagnostics.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl BuildResponse {
    /// Typed view of [`BuildResponse::state`].
    pub fn build_state(&self) -> BuildState {
        BuildState::parse(&self.state)
    }

    /// Reason attached to the most recent state transition, if any.
    pub fn latest_reason(&self) -> Option<&str> {
        self.state_history
            .first()
            .and_then(|entry| entry.state_reason.as_deref())
    }
}

/// IIB API client.
#[derive(Debug, Clone)]
pub struct IibClient {
    http: Client,
    base_url: String,
}

impl IibClient {
    /// Create a client for the IIB instance at `base_url`.
    pub fn new(base_url: &str) -> Result<Self> {
        http::join_url(base_url, "api/v1/builds")?;
        Ok(Self {
            http: http::build_client(Duration::from_secs(DEFAULT_TIMEOUT_SECS))?,
            base_url: base_url.to_string(),
        })
    }

    /// Submit an add-bundles build.
    #[instrument(skip_all, fields(from_index = %request.from_index))]
    pub async fn add_build(&self, request: &AddBuildRequest) -> Result<BuildResponse> {
        let url = http::join_url(&self.base_url, "api/v1/builds/add")?;
        debug!(%url, bundles = ?request.bundles, "submitting IIB build");
        http::send_json(self.http.post(url).json(request)).await
    }

    /// Fetch the current representation of a build.
    pub async fn get_build(&self, build_id: u64) -> Result<BuildResponse> {
        let url = http::join_url(&self.base_url, &format!("api/v1/builds/{build_id}"))?;
        http::send_json(self.http.get(url)).await
    }
}
