//! Publish a bundle into an organization's index image.

use std::time::Instant;

use tracing::{info, instrument, warn};

use operatorcert_shared::{IibCredentials, OperatorCertError, Result};

use crate::client::{AddBuildRequest, BuildResponse, IibClient};
use crate::poll::{PollObserver, PollOutcome, PollSettings, wait_for_build};

/// What to publish and where.
#[derive(Debug, Clone)]
pub struct PublishRequest {
    /// Organization index where the bundle is released.
    pub organization: String,
    /// Operator bundle pullspec.
    pub bundle_pullspec: String,
    /// Base index pullspec.
    pub from_index: String,
}

/// Build the add-build payload. Missing credentials are sent empty; IIB
/// decides whether it can proceed without them.
pub fn build_add_request(
    request: &PublishRequest,
    credentials: &IibCredentials,
    add_arches: &[String],
) -> AddBuildRequest {
    let cnr_token = credentials.cnr_token.as_deref().unwrap_or_default();
    let quay_user = credentials.quay_user.as_deref().unwrap_or_default();
    let quay_token = credentials.quay_token.as_deref().unwrap_or_default();

    AddBuildRequest {
        from_index: request.from_index.clone(),
        bundles: vec![request.bundle_pullspec.clone()],
        cnr_token: format!("basic {cnr_token}"),
        force_backport: true,
        organization: request.organization.clone(),
        overwrite_from_index: true,
        add_arches: add_arches.to_vec(),
        overwrite_from_index_token: format!("{quay_user}:{quay_token}"),
    }
}

/// Submit the build and wait for it.
///
/// Returns the completed build. A failed build and an exhausted wait budget
/// are reported as [`OperatorCertError::BuildFailed`] and
/// [`OperatorCertError::BuildTimedOut`] respectively.
#[instrument(skip_all, fields(organization = %request.organization, bundle = %request.bundle_pullspec))]
pub async fn publish_bundle(
    client: &IibClient,
    request: &PublishRequest,
    credentials: &IibCredentials,
    add_arches: &[String],
    settings: PollSettings,
    observer: &dyn PollObserver,
) -> Result<BuildResponse> {
    if credentials.cnr_token.is_none() {
        warn!("CNR token is not set");
    }
    if credentials.quay_user.is_none() || credentials.quay_token.is_none() {
        warn!("Quay credentials are not set");
    }

    let payload = build_add_request(request, credentials, add_arches);
    let submitted_at = Instant::now();
    let submitted = client.add_build(&payload).await?;
    let build_id = submitted.id;
    info!(build_id, "IIB build submitted");

    match wait_for_build(client, build_id, submitted_at, settings, observer).await? {
        PollOutcome::Success(response) => Ok(response),
        PollOutcome::Failed { reason, .. } => {
            Err(OperatorCertError::BuildFailed { build_id, reason })
        }
        PollOutcome::TimedOut { waited, .. } => {
            Err(OperatorCertError::BuildTimedOut { build_id, waited })
        }
    }
}
