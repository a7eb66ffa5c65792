//! Existence check guarding image creation.
//!
//! At most one non-deleted record may exist per [`IdentityKey`], while any
//! number of soft-deleted ones may. Two query strategies are supported and a
//! deployment picks one through [`DeletionFilter`]:
//!
//! - [`DeletionFilter::ServerSide`]: the catalog evaluates
//!   `not(deleted==true)` and a single query answers the question.
//! - [`DeletionFilter::Compensated`]: the filter language cannot negate. The
//!   first match is fetched regardless of deletion state; when it is deleted,
//!   the deleted matches are counted and compared with all matches. Equal
//!   counts mean every match is deleted and the key is free.

use tracing::{debug, info, instrument};

use operatorcert_shared::{DeletionFilter, Result};

use crate::IdentityKey;
use crate::client::PyxisClient;

/// Filter expression matching every record with `key`, deleted or not.
pub fn identity_filter(key: &IdentityKey) -> String {
    format!(
        "isv_pid=={};docker_image_digest=={}",
        key.isv_pid, key.docker_image_digest
    )
}

/// Whether a live (non-deleted) record exists for `key`.
#[instrument(skip_all, fields(isv_pid = %key.isv_pid, digest = %key.docker_image_digest, filter = ?filter))]
pub async fn image_exists(
    client: &PyxisClient,
    key: &IdentityKey,
    filter: DeletionFilter,
) -> Result<bool> {
    match filter {
        DeletionFilter::ServerSide => exists_server_side(client, key).await,
        DeletionFilter::Compensated => exists_compensated(client, key).await,
    }
}

async fn exists_server_side(client: &PyxisClient, key: &IdentityKey) -> Result<bool> {
    let filter = format!("{};not(deleted==true)", identity_filter(key));
    let page = client.query_images(&filter, 1).await?;
    Ok(!page.data.is_empty())
}

async fn exists_compensated(client: &PyxisClient, key: &IdentityKey) -> Result<bool> {
    let page = client.query_images(&identity_filter(key), 1).await?;

    let Some(first) = page.data.first() else {
        return Ok(false);
    };

    if !first.is_deleted() {
        return Ok(true);
    }

    let all_deleted = are_all_deleted(client, key, page.total).await?;
    Ok(!all_deleted)
}

/// Count deleted matches for `key` and compare with `total` matches.
async fn are_all_deleted(client: &PyxisClient, key: &IdentityKey, total: u64) -> Result<bool> {
    let filter = format!("{};deleted==true", identity_filter(key));
    let deleted = client.query_images(&filter, 1).await?.total;

    debug!(total, deleted, "compared deleted matches with all matches");
    if deleted == total {
        info!("every image with given docker_image_digest and isv_pid is deleted");
    }
    Ok(deleted == total)
}
