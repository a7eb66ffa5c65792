//! Catalog (Pyxis) client: idempotent container image creation.
//!
//! A container image record is identified by its [`IdentityKey`]. Creation is
//! guarded by an existence check so that retried pipeline runs never produce
//! a second live record for the same key:
//!
//! 1. [`image_exists`] — query for a non-deleted record with the key
//! 2. [`create_container_image`] — only when the key is free
//!
//! [`ensure_container_image`] runs both steps.

mod client;
mod exists;
mod image;

use tracing::{info, instrument};

use operatorcert_shared::{DeletionFilter, Result};

pub use client::{ImagePage, ImageSummary, PyxisClient};
pub use exists::{identity_filter, image_exists};
pub use image::{
    ContainerImagePayload, NewContainerImage, ParsedData, RepositoryEntry, TagEntry,
    build_payload, create_container_image, format_timestamp,
};

/// Uniquely identifies a logical image record regardless of soft-delete state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentityKey {
    /// Certification project identifier (`isv_pid`).
    pub isv_pid: String,
    /// Content digest of the image manifest.
    pub docker_image_digest: String,
}

/// Outcome of [`ensure_container_image`].
#[derive(Debug, Clone)]
pub enum EnsureOutcome {
    /// A live record already exists; nothing was created.
    AlreadyExists,
    /// A new record was created; carries the server response.
    Created(serde_json::Value),
}

/// Create the image record unless a live one already exists for its key.
#[instrument(skip_all, fields(isv_pid = %image.key.isv_pid, digest = %image.key.docker_image_digest))]
pub async fn ensure_container_image(
    client: &PyxisClient,
    image: &NewContainerImage,
    filter: DeletionFilter,
) -> Result<EnsureOutcome> {
    if image_exists(client, &image.key, filter).await? {
        info!("image with given docker_image_digest and isv_pid already exists, skipping creation");
        return Ok(EnsureOutcome::AlreadyExists);
    }

    info!("image with given docker_image_digest and isv_pid doesn't exist yet");
    let created = create_container_image(client, image).await?;
    Ok(EnsureOutcome::Created(created))
}
