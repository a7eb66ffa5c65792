//! Container image creation payload.

use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use tracing::{info, instrument};

use operatorcert_shared::{OperatorCertError, Result};

use crate::IdentityKey;
use crate::client::PyxisClient;

/// Tag added next to the version tag when the bundle is the latest one.
const LATEST_TAG: &str = "latest";

// ---------------------------------------------------------------------------
// Inputs
// ---------------------------------------------------------------------------

/// Image metadata extracted from `skopeo inspect` output.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParsedData {
    #[serde(default, alias = "DockerVersion", deserialize_with = "null_as_default")]
    pub docker_version: String,
    #[serde(default, alias = "Layers", deserialize_with = "null_as_default")]
    pub layers: Vec<String>,
    #[serde(default, alias = "Architecture", deserialize_with = "null_as_default")]
    pub architecture: String,
    #[serde(default, alias = "Env", deserialize_with = "null_as_default")]
    pub env_variables: Vec<String>,
}

/// skopeo writes `null` for unset fields (e.g. `Env` on scratch images).
fn null_as_default<'de, D, T>(deserializer: D) -> std::result::Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

impl ParsedData {
    /// Read a `skopeo inspect` result file. Missing or null keys default to
    /// empty.
    pub fn from_inspect_file(path: &Path) -> Result<Self> {
        let content =
            std::fs::read_to_string(path).map_err(|e| OperatorCertError::io(path, e))?;
        serde_json::from_str(&content).map_err(|e| {
            OperatorCertError::parse(format!("invalid skopeo result {}: {e}", path.display()))
        })
    }
}

/// Everything needed to create one image record.
#[derive(Debug, Clone)]
pub struct NewContainerImage {
    pub key: IdentityKey,
    pub registry: String,
    pub repository: String,
    /// Whether the repository is published.
    pub repo_published: bool,
    pub certified: bool,
    /// Version tag always attached to the repository entry.
    pub bundle_version: String,
    pub parsed_data: ParsedData,
    pub sum_layer_size_bytes: u64,
    /// Also tag the repository entry as `latest`.
    pub is_latest: bool,
}

// ---------------------------------------------------------------------------
// Wire payload
// ---------------------------------------------------------------------------

/// Body of `POST v1/images`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContainerImagePayload {
    pub isv_pid: String,
    pub repositories: Vec<RepositoryEntry>,
    pub certified: bool,
    pub docker_image_digest: String,
    pub architecture: String,
    pub parsed_data: ParsedData,
    pub sum_layer_size_bytes: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepositoryEntry {
    pub published: bool,
    pub registry: String,
    pub repository: String,
    pub push_date: String,
    pub tags: Vec<TagEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TagEntry {
    pub added_date: String,
    pub name: String,
}

/// Catalog date format: microsecond precision with an explicit UTC offset.
pub fn format_timestamp(now: DateTime<Utc>) -> String {
    now.format("%Y-%m-%dT%H:%M:%S%.6f+00:00").to_string()
}

/// Build the creation payload. `now` is used for every date in the payload.
///
/// `latest` is only ever added here; it is not removed from the record that
/// carried it before.
pub fn build_payload(image: &NewContainerImage, now: DateTime<Utc>) -> ContainerImagePayload {
    let date = format_timestamp(now);

    let mut tags = vec![TagEntry {
        added_date: date.clone(),
        name: image.bundle_version.clone(),
    }];
    if image.is_latest {
        tags.push(TagEntry {
            added_date: date.clone(),
            name: LATEST_TAG.to_string(),
        });
    }

    ContainerImagePayload {
        isv_pid: image.key.isv_pid.clone(),
        repositories: vec![RepositoryEntry {
            published: image.repo_published,
            registry: image.registry.clone(),
            repository: image.repository.clone(),
            push_date: date,
            tags,
        }],
        certified: image.certified,
        docker_image_digest: image.key.docker_image_digest.clone(),
        architecture: image.parsed_data.architecture.clone(),
        parsed_data: image.parsed_data.clone(),
        sum_layer_size_bytes: image.sum_layer_size_bytes,
    }
}

/// Submit a new image record. Callers must have checked that the identity
/// key is free.
#[instrument(skip_all, fields(isv_pid = %image.key.isv_pid, version = %image.bundle_version))]
pub async fn create_container_image(
    client: &PyxisClient,
    image: &NewContainerImage,
) -> Result<serde_json::Value> {
    info!("creating new container image");
    let payload = build_payload(image, Utc::now());
    client.create_image(&payload).await
}
